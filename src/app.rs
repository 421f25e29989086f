use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::asset::Assets;
use crate::render_application::{RenderApplication, StartupContext, UpdateContext};
use crate::renderer::Renderer;
use crate::scene::{Camera, LightingState};
use crate::settings::{DebugCommand, RenderSettings};

/// How often frame statistics are written to the log.
const STATS_LOG_INTERVAL_SECS: f32 = 5.0;

pub struct App<T: RenderApplication> {
    application: T,
    settings: RenderSettings,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    assets: Assets,
    camera: Camera,
    lighting: LightingState,
    start: Instant,
    last_frame: Instant,
    last_stats_log: f32,
}

impl<T: RenderApplication> App<T> {
    pub fn new(application: T, settings: RenderSettings) -> Self {
        let now = Instant::now();
        Self {
            application,
            settings,
            window: None,
            renderer: None,
            assets: Assets::new(),
            camera: Camera::default(),
            lighting: LightingState::default(),
            start: now,
            last_frame: now,
            last_stats_log: 0.0,
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        let elapsed = (now - self.start).as_secs_f32();
        self.last_frame = now;

        self.application.update(&mut UpdateContext {
            dt,
            elapsed,
            camera: &mut self.camera,
            lighting: &mut self.lighting,
        });

        let snapshot = self.application.snapshot();
        match renderer.render_frame(&self.camera, &snapshot, &self.lighting, &self.assets) {
            Ok(frame) => {
                let stats = frame.stats;
                frame.present();
                if elapsed - self.last_stats_log >= STATS_LOG_INTERVAL_SECS {
                    self.last_stats_log = elapsed;
                    log::info!(
                        "{} parts, {} culled, {} batches, {} draw calls, {} shadow draws",
                        stats.parts,
                        stats.culled,
                        stats.batches,
                        stats.draw_calls,
                        stats.shadow_draw_calls
                    );
                }
            }
            Err(err) if err.is_surface_lost() => {
                log::warn!("{}; reconfiguring surface", err);
                renderer.reconfigure_surface();
            }
            Err(crate::error::RendererError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("Out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
            }
        }
    }

    fn handle_key(&mut self, key: &Key) {
        let command = match key {
            Key::Named(NamedKey::F1) => DebugCommand::ToggleShadowDebug,
            Key::Named(NamedKey::F2) => DebugCommand::ToggleShadows,
            Key::Character(c) if c.as_str() == "[" => DebugCommand::DecreaseBias,
            Key::Character(c) if c.as_str() == "]" => DebugCommand::IncreaseBias,
            _ => return,
        };
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.apply_debug(command);
        }
    }
}

impl<T: RenderApplication> ApplicationHandler for App<T> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let resolution = &self.settings.resolution;
        let attributes = Window::default_attributes()
            .with_title(self.application.name())
            .with_inner_size(PhysicalSize::new(resolution.width, resolution.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        let renderer = match pollster::block_on(Renderer::new(
            window.clone(),
            self.settings.clone(),
        )) {
            Ok(renderer) => renderer,
            Err(err) => {
                log::error!("Failed to initialise renderer: {}", err);
                event_loop.exit();
                return;
            }
        };

        self.application.setup(&mut StartupContext {
            renderer: &renderer,
            assets: &mut self.assets,
            camera: &mut self.camera,
            lighting: &mut self.lighting,
        });

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        self.last_frame = Instant::now();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != id {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(window.inner_size());
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
                window.request_redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.handle_key(&logical_key);
            }
            _ => {}
        }
    }
}
