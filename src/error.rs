use thiserror::Error;

/// Failures surfaced by renderer construction and per-frame work.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible graphics adapter found: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("failed to create {label}: {message}")]
    Shader { label: &'static str, message: String },
}

impl RendererError {
    /// True when the caller should reconfigure the surface and retry next frame.
    pub fn is_surface_lost(&self) -> bool {
        matches!(
            self,
            RendererError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_and_outdated_surfaces_are_recoverable() {
        assert!(RendererError::Surface(wgpu::SurfaceError::Lost).is_surface_lost());
        assert!(RendererError::Surface(wgpu::SurfaceError::Outdated).is_surface_lost());
        assert!(!RendererError::Surface(wgpu::SurfaceError::Timeout).is_surface_lost());
    }

    #[test]
    fn shader_error_names_the_resource() {
        let err = RendererError::Shader {
            label: "ShadowPipeline",
            message: "bad entry point".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create ShadowPipeline: bad entry point"
        );
    }
}
