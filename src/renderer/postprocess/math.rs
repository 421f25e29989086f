use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::Rng;

pub const SSAO_KERNEL_SIZE: usize = 64;
pub const NOISE_TEXTURE_SIZE: u32 = 4;

/// Hemisphere samples around +Z, denser near the origin.
pub fn ssao_kernel<R: Rng>(rng: &mut R) -> [Vec4; SSAO_KERNEL_SIZE] {
    let mut kernel = [Vec4::ZERO; SSAO_KERNEL_SIZE];
    for (i, slot) in kernel.iter_mut().enumerate() {
        let direction = loop {
            let candidate = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(0.0..=1.0),
            );
            if candidate.length_squared() > 1e-6 {
                break candidate.normalize();
            }
        };
        let t = i as f32 / SSAO_KERNEL_SIZE as f32;
        let scale = 0.1 + 0.9 * t * t;
        *slot = (direction * rng.gen_range(0.0..=1.0) * scale).extend(0.0);
    }
    kernel
}

/// 4x4 tile of random tangent-plane rotations, encoded as `v * 0.5 + 0.5` RGBA8.
pub fn ssao_noise<R: Rng>(rng: &mut R) -> Vec<[u8; 4]> {
    let encode = |v: f32| ((v * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
    (0..NOISE_TEXTURE_SIZE * NOISE_TEXTURE_SIZE)
        .map(|_| {
            let x = rng.gen_range(-1.0f32..=1.0);
            let y = rng.gen_range(-1.0f32..=1.0);
            [encode(x), encode(y), encode(0.0), 255]
        })
        .collect()
}

/// Where the sun lands on screen in top-left uv space, or `None` when it is behind the camera.
pub fn sun_screen_position(view_proj: Mat4, to_sun: Vec3) -> Option<Vec2> {
    let clip = view_proj * to_sun.extend(0.0);
    if !(clip.w > 1e-6) {
        return None;
    }
    let ndc = clip.truncate().truncate() / clip.w;
    Some(Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5))
}

/// Distance along the view axis for a [0,1] depth buffer value.
pub fn linearize_depth(depth: f32, near: f32, far: f32) -> f32 {
    near * far / (far - depth * (far - near))
}
