mod demo_scenes;

use demo_scenes::PartShowcase;

fn main() {
    if let Err(err) = part_renderer::run(PartShowcase::new()) {
        eprintln!("Application error: {err}");
    }
}
