use std::f32::consts::{FRAC_PI_4, TAU};

use glam::Vec3;

use crate::scene::safe_normalize;

/// Direction used when no usable sun vector is available.
pub const DEFAULT_SUN_DIRECTION: Vec3 = Vec3::new(0.577_350_3, -0.577_350_3, 0.577_350_3);

/// Where the sun direction comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SunSource {
    /// Explicit sun-to-scene vector; normalised on use.
    Fixed(Vec3),
    /// Hours since midnight, wrapped to [0, 24).
    ClockTime(f32),
}

/// Scene lighting parameters supplied by the host each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingState {
    pub sun: SunSource,
    pub brightness: f32,
    pub ambient: Vec3,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            sun: SunSource::ClockTime(14.0),
            brightness: 4.0,
            ambient: Vec3::new(0.5, 0.5, 0.6),
        }
    }
}

impl LightingState {
    pub fn resolve(&self) -> DirectionalLight {
        let direction = match self.sun {
            SunSource::Fixed(dir) => safe_normalize(dir, DEFAULT_SUN_DIRECTION),
            SunSource::ClockTime(hours) => sun_direction_from_clock(hours),
        };
        DirectionalLight {
            direction,
            brightness: self.brightness,
            ambient: self.ambient,
        }
    }
}

/// The single directional light of a frame, pointing from the sun into the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub brightness: f32,
    pub ambient: Vec3,
}

impl DirectionalLight {
    /// Diffuse multiplier fed to the lit shader.
    pub fn sun_strength(&self) -> f32 {
        self.brightness * 0.5 * 0.6
    }

    /// Unit vector from the scene toward the sun.
    pub fn to_sun(&self) -> Vec3 {
        -self.direction
    }
}

/// Sun direction for a time of day: rises at 6h, peaks at noon, sets at 18h.
///
/// The azimuth is fixed at 45 degrees and the noon elevation is `asin(1/sqrt(3))`,
/// which makes noon coincide with [`DEFAULT_SUN_DIRECTION`].
pub fn sun_direction_from_clock(hours: f32) -> Vec3 {
    let hours = if hours.is_finite() { hours } else { 0.0 };
    let t = hours.max(0.0) % 24.0;
    let azimuth = FRAC_PI_4;
    let noon_elevation = (1.0 / 3f32.sqrt()).asin();
    let w = TAU / 24.0 * (t - 6.0);
    let elevation = noon_elevation * w.sin();

    let dir = Vec3::new(
        elevation.cos() * azimuth.cos(),
        -elevation.sin(),
        elevation.cos() * azimuth.sin(),
    );
    safe_normalize(dir, DEFAULT_SUN_DIRECTION)
}

/// Gradient colors for the sky backdrop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyColors {
    pub inner: Vec3,
    pub outer: Vec3,
}

impl SkyColors {
    const DAY_INNER: Vec3 = Vec3::new(0.25, 0.45, 0.65);
    const DAY_OUTER: Vec3 = Vec3::new(0.05, 0.25, 0.55);
    const SUNSET_INNER: Vec3 = Vec3::new(0.8, 0.4, 0.2);
    const SUNSET_OUTER: Vec3 = Vec3::new(0.3, 0.15, 0.1);

    /// Shifts toward sunset tints as the sun approaches the horizon.
    pub fn for_sun(direction: Vec3) -> Self {
        let sunset = (1.0 - direction.y.abs()).clamp(0.0, 1.0);
        Self {
            inner: Self::DAY_INNER.lerp(Self::SUNSET_INNER, sunset),
            outer: Self::DAY_OUTER.lerp(Self::SUNSET_OUTER, sunset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noon_matches_default_direction() {
        let noon = sun_direction_from_clock(12.0);
        assert!(noon.abs_diff_eq(DEFAULT_SUN_DIRECTION, 1e-5), "{noon:?}");
    }

    #[test]
    fn sunrise_and_sunset_are_horizontal() {
        for hours in [6.0, 18.0] {
            let dir = sun_direction_from_clock(hours);
            assert!(dir.y.abs() < 1e-5, "{hours}: {dir:?}");
            assert!(dir.is_normalized());
        }
    }

    #[test]
    fn midnight_sun_is_below_horizon() {
        assert!(sun_direction_from_clock(0.0).y > 0.0);
        assert!(sun_direction_from_clock(24.0).abs_diff_eq(sun_direction_from_clock(0.0), 1e-5));
    }

    #[test]
    fn negative_and_nan_hours_stay_finite() {
        assert!(sun_direction_from_clock(-3.0).is_finite());
        assert!(sun_direction_from_clock(f32::NAN).is_finite());
    }

    #[test]
    fn zero_fixed_direction_falls_back() {
        let light = LightingState {
            sun: SunSource::Fixed(Vec3::ZERO),
            ..LightingState::default()
        }
        .resolve();
        assert_eq!(light.direction, DEFAULT_SUN_DIRECTION);
    }

    #[test]
    fn sun_strength_scales_brightness() {
        let light = LightingState::default().resolve();
        assert!((light.sun_strength() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn horizon_sun_gives_sunset_colors() {
        let sky = SkyColors::for_sun(Vec3::X);
        assert!(sky.inner.abs_diff_eq(Vec3::new(0.8, 0.4, 0.2), 1e-6));
        let overhead = SkyColors::for_sun(Vec3::NEG_Y);
        assert!(overhead.outer.abs_diff_eq(Vec3::new(0.05, 0.25, 0.55), 1e-6));
    }
}
