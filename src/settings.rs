use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Upper bound on shadow cascades; the lit shader samples a fixed-size array.
pub const MAX_CASCADES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_resolution")]
    pub shadow_map_resolution: u32,
    #[serde(default = "RenderSettings::default_cascade_count")]
    pub cascade_count: u32,
    #[serde(default = "RenderSettings::default_shadow_max_distance")]
    pub shadow_max_distance: f32,
    #[serde(default = "RenderSettings::default_cascade_split_lambda")]
    pub cascade_split_lambda: f32,
    /// Fraction of each split distance blended between neighbouring cascades.
    #[serde(default = "RenderSettings::default_cascade_transition")]
    pub cascade_transition: f32,
    #[serde(default = "RenderSettings::default_pcf_step")]
    pub pcf_step: f32,
    #[serde(default = "RenderSettings::default_bias_min")]
    pub bias_min: f32,
    #[serde(default = "RenderSettings::default_bias_max")]
    pub bias_max: f32,
    #[serde(default = "RenderSettings::default_shadow_bias_multiplier")]
    pub shadow_bias_multiplier: f32,
    #[serde(default = "RenderSettings::enabled")]
    pub shadows_enabled: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub ssao_enabled: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub bloom_enabled: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub fog_enabled: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub volumetric_enabled: bool,
    #[serde(default = "RenderSettings::default_ssao_radius")]
    pub ssao_radius: f32,
    #[serde(default = "RenderSettings::default_ssao_bias")]
    pub ssao_bias: f32,
    #[serde(default = "RenderSettings::default_ssao_strength")]
    pub ssao_strength: f32,
    #[serde(default = "RenderSettings::default_bloom_threshold")]
    pub bloom_threshold: f32,
    #[serde(default = "RenderSettings::default_fog_density")]
    pub fog_density: f32,
    #[serde(default = "RenderSettings::default_fog_color")]
    pub fog_color: [f32; 3],
    #[serde(default = "RenderSettings::default_volumetric_strength")]
    pub volumetric_strength: f32,
    #[serde(default = "RenderSettings::default_exposure")]
    pub exposure: f32,
    #[serde(default = "RenderSettings::default_max_draw_distance")]
    pub max_draw_distance: f32,
    /// Extra angle added to the half field of view by the optional cone test.
    #[serde(default = "RenderSettings::default_fov_padding_degrees")]
    pub fov_padding_degrees: f32,
    #[serde(default)]
    pub cone_culling: bool,
    #[serde(default)]
    pub show_shadow_debug: bool,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_resolution: Self::default_shadow_map_resolution(),
            cascade_count: Self::default_cascade_count(),
            shadow_max_distance: Self::default_shadow_max_distance(),
            cascade_split_lambda: Self::default_cascade_split_lambda(),
            cascade_transition: Self::default_cascade_transition(),
            pcf_step: Self::default_pcf_step(),
            bias_min: Self::default_bias_min(),
            bias_max: Self::default_bias_max(),
            shadow_bias_multiplier: Self::default_shadow_bias_multiplier(),
            shadows_enabled: true,
            ssao_enabled: true,
            bloom_enabled: true,
            fog_enabled: true,
            volumetric_enabled: true,
            ssao_radius: Self::default_ssao_radius(),
            ssao_bias: Self::default_ssao_bias(),
            ssao_strength: Self::default_ssao_strength(),
            bloom_threshold: Self::default_bloom_threshold(),
            fog_density: Self::default_fog_density(),
            fog_color: Self::default_fog_color(),
            volumetric_strength: Self::default_volumetric_strength(),
            exposure: Self::default_exposure(),
            max_draw_distance: Self::default_max_draw_distance(),
            fov_padding_degrees: Self::default_fov_padding_degrees(),
            cone_culling: false,
            show_shadow_debug: false,
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|err| {
                warn!(
                    "Failed to parse {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    /// Parses and validates a JSON settings document.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let settings = serde_json::from_str::<RenderSettings>(contents)?;
        Ok(settings.validate())
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_resolution == 0 {
            warn!("Shadow map resolution must be greater than zero. Using default value.");
            self.shadow_map_resolution = Self::default_shadow_map_resolution();
        }

        if self.cascade_count == 0 || self.cascade_count > MAX_CASCADES {
            let clamped = self.cascade_count.clamp(1, MAX_CASCADES);
            warn!(
                "Cascade count {} out of range. Using {} instead.",
                self.cascade_count, clamped
            );
            self.cascade_count = clamped;
        }

        if !(self.shadow_max_distance > 0.0) {
            warn!("Shadow max distance must be positive. Using default value.");
            self.shadow_max_distance = Self::default_shadow_max_distance();
        }

        self.cascade_split_lambda = self.cascade_split_lambda.clamp(0.0, 1.0);
        self.cascade_transition = self.cascade_transition.clamp(0.0, 0.5);

        if self.bias_min > self.bias_max {
            warn!(
                "bias_min ({}) exceeds bias_max ({}). Swapping.",
                self.bias_min, self.bias_max
            );
            std::mem::swap(&mut self.bias_min, &mut self.bias_max);
        }
        self.shadow_bias_multiplier = self.shadow_bias_multiplier.clamp(
            Self::MIN_BIAS_MULTIPLIER,
            Self::MAX_BIAS_MULTIPLIER,
        );

        if !(self.exposure > 0.0) {
            warn!("Exposure must be positive. Using default value.");
            self.exposure = Self::default_exposure();
        }
        self.fog_density = self.fog_density.max(0.0);
        self.volumetric_strength = self.volumetric_strength.max(0.0);
        self.ssao_radius = self.ssao_radius.max(0.0);
        self.ssao_strength = self.ssao_strength.max(0.0);

        if !(self.max_draw_distance > 0.0) {
            warn!("Max draw distance must be positive. Using default value.");
            self.max_draw_distance = Self::default_max_draw_distance();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        self
    }

    /// Applies one runtime debug command to these settings.
    pub fn apply(&mut self, command: DebugCommand) {
        match command {
            DebugCommand::ToggleShadowDebug => {
                self.show_shadow_debug = !self.show_shadow_debug;
                info!("Shadow debug overlay: {}", self.show_shadow_debug);
            }
            DebugCommand::ToggleShadows => {
                self.shadows_enabled = !self.shadows_enabled;
                info!("Shadows enabled: {}", self.shadows_enabled);
            }
            DebugCommand::DecreaseBias => {
                self.shadow_bias_multiplier =
                    (self.shadow_bias_multiplier - 0.1).max(Self::MIN_BIAS_MULTIPLIER);
                info!("Shadow bias multiplier: {:.2}", self.shadow_bias_multiplier);
            }
            DebugCommand::IncreaseBias => {
                self.shadow_bias_multiplier =
                    (self.shadow_bias_multiplier + 0.1).min(Self::MAX_BIAS_MULTIPLIER);
                info!("Shadow bias multiplier: {:.2}", self.shadow_bias_multiplier);
            }
        }
    }

    /// Depth bias range scaled by the runtime multiplier.
    pub fn effective_bias(&self) -> (f32, f32) {
        (
            self.bias_min * self.shadow_bias_multiplier,
            self.bias_max * self.shadow_bias_multiplier,
        )
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const MIN_BIAS_MULTIPLIER: f32 = 0.1;
    const MAX_BIAS_MULTIPLIER: f32 = 5.0;

    const fn enabled() -> bool {
        true
    }

    const fn default_shadow_map_resolution() -> u32 {
        2048
    }

    const fn default_cascade_count() -> u32 {
        MAX_CASCADES
    }

    const fn default_shadow_max_distance() -> f32 {
        300.0
    }

    const fn default_cascade_split_lambda() -> f32 {
        0.6
    }

    const fn default_cascade_transition() -> f32 {
        0.15
    }

    const fn default_pcf_step() -> f32 {
        0.8
    }

    const fn default_bias_min() -> f32 {
        0.000_06
    }

    const fn default_bias_max() -> f32 {
        0.0008
    }

    const fn default_shadow_bias_multiplier() -> f32 {
        1.0
    }

    const fn default_ssao_radius() -> f32 {
        0.5
    }

    const fn default_ssao_bias() -> f32 {
        0.025
    }

    const fn default_ssao_strength() -> f32 {
        1.0
    }

    const fn default_bloom_threshold() -> f32 {
        1.0
    }

    const fn default_fog_density() -> f32 {
        0.02
    }

    const fn default_fog_color() -> [f32; 3] {
        [0.7, 0.8, 0.9]
    }

    const fn default_volumetric_strength() -> f32 {
        0.3
    }

    const fn default_exposure() -> f32 {
        1.0
    }

    const fn default_max_draw_distance() -> f32 {
        10_000.0
    }

    const fn default_fov_padding_degrees() -> f32 {
        20.0
    }
}

/// Runtime toggles bound to debug keys by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    ToggleShadowDebug,
    ToggleShadows,
    DecreaseBias,
    IncreaseBias,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            shadow_map_resolution: 0,
            cascade_count: 7,
            shadow_max_distance: -5.0,
            bias_min: 0.01,
            bias_max: 0.001,
            exposure: 0.0,
            fog_density: -1.0,
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            present_mode: PresentModeSetting::Immediate,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RenderSettings::default();

        assert_eq!(
            validated.shadow_map_resolution,
            defaults.shadow_map_resolution
        );
        assert_eq!(validated.cascade_count, MAX_CASCADES);
        assert_eq!(validated.shadow_max_distance, defaults.shadow_max_distance);
        assert_eq!(validated.exposure, defaults.exposure);
        assert_eq!(validated.fog_density, 0.0);
        assert!(validated.bias_min <= validated.bias_max);
        assert_eq!(validated.resolution.width, Resolution::default().width);
        assert_eq!(validated.resolution.height, Resolution::default().height);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            shadow_map_resolution: 1024,
            cascade_count: 2,
            shadow_max_distance: 150.0,
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.shadow_map_resolution, 1024);
        assert_eq!(validated.cascade_count, 2);
        assert_eq!(validated.shadow_max_distance, 150.0);
        assert_eq!(validated.resolution.width, valid.resolution.width);
        assert_eq!(validated.resolution.height, valid.resolution.height);
    }

    #[test]
    fn zero_cascades_clamp_to_one() {
        let settings = RenderSettings {
            cascade_count: 0,
            ..RenderSettings::default()
        }
        .validate();
        assert_eq!(settings.cascade_count, 1);
    }

    #[test]
    fn partial_json_fills_missing_fields_with_defaults() {
        let settings =
            RenderSettings::from_json(r#"{ "fog_enabled": false, "exposure": 1.5 }"#).unwrap();
        assert!(!settings.fog_enabled);
        assert_eq!(settings.exposure, 1.5);
        assert!(settings.shadows_enabled);
        assert_eq!(settings.shadow_map_resolution, 2048);
        assert_eq!(settings.fog_color, [0.7, 0.8, 0.9]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RenderSettings::from_json("{ not json").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.cascade_count, MAX_CASCADES);
    }

    #[test]
    fn debug_commands_toggle_and_clamp() {
        let mut settings = RenderSettings::default();
        settings.apply(DebugCommand::ToggleShadows);
        assert!(!settings.shadows_enabled);
        settings.apply(DebugCommand::ToggleShadowDebug);
        assert!(settings.show_shadow_debug);

        for _ in 0..100 {
            settings.apply(DebugCommand::IncreaseBias);
        }
        assert_eq!(settings.shadow_bias_multiplier, 5.0);
        for _ in 0..100 {
            settings.apply(DebugCommand::DecreaseBias);
        }
        assert_eq!(settings.shadow_bias_multiplier, 0.1);
    }

    #[test]
    fn effective_bias_scales_both_ends() {
        let settings = RenderSettings {
            shadow_bias_multiplier: 2.0,
            ..RenderSettings::default()
        };
        let (min, max) = settings.effective_bias();
        assert!((min - 0.000_12).abs() < 1e-9);
        assert!((max - 0.0016).abs() < 1e-9);
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }
}
