pub mod app;
pub mod asset;
pub mod error;
pub mod render_application;
pub mod renderer;
pub mod scene;
pub mod settings;

use app::App;
use render_application::RenderApplication;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Opens a window and drives `application` until it closes.
pub fn run<T: RenderApplication>(application: T) -> Result<(), winit::error::EventLoopError> {
    init_logging();

    let settings = RenderSettings::load();
    log::info!("Starting {}", application.name());

    let event_loop = EventLoop::new()?;
    let mut app = App::new(application, settings);

    let result = event_loop.run_app(&mut app);

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }

    log::info!("Application shutdown complete");

    result
}
