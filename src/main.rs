use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

// Import from the library crate
use walkthrough::{
    assets::{DecodeBackend, FileBackend},
    config::SceneConfig,
    controller::{FrameLoop, InputEvent},
    logging,
    view::{GpuContext, WgpuRenderer},
};

/// Scene file from the first argument, then `WALKTHROUGH_SCENE`, else the
/// built-in gallery.
fn load_config() -> Result<SceneConfig, walkthrough::error::ConfigError> {
    let path = std::env::args().nth(1).or_else(|| std::env::var("WALKTHROUGH_SCENE").ok());
    match path {
        Some(path) => {
            tracing::info!("Loading scene from {path}");
            SceneConfig::from_path(path)
        }
        None => SceneConfig::embedded(),
    }
}

/// Browser-style key names so one set of bindings serves both targets.
fn key_name(code: KeyCode) -> Option<&'static str> {
    Some(match code {
        KeyCode::KeyW => "w",
        KeyCode::KeyA => "a",
        KeyCode::KeyS => "s",
        KeyCode::KeyD => "d",
        KeyCode::Space => " ",
        KeyCode::ShiftLeft | KeyCode::ShiftRight => "Shift",
        KeyCode::Escape => "Escape",
        _ => return None,
    })
}

struct App {
    window: Arc<Window>,
    frame_loop: FrameLoop<WgpuRenderer>,
    started: Instant,
}

impl App {
    async fn new(window: Arc<Window>, config: &SceneConfig) -> Result<Self, wgpu::CreateSurfaceError> {
        let size = window.inner_size();
        let gpu = GpuContext::new_native(window.clone(), size.width, size.height).await?;
        let mut renderer = WgpuRenderer::new(gpu);
        renderer.set_pixels_per_point(window.scale_factor() as f32);

        let backend: Rc<dyn DecodeBackend> = Rc::new(FileBackend::new(&config.asset_root));
        let frame_loop = FrameLoop::from_config(config, backend, renderer, size.width, size.height);

        Ok(Self { window, frame_loop, started: Instant::now() })
    }

    fn set_engaged(&mut self, engaged: bool) {
        if engaged {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                tracing::warn!("Cursor grab refused: {e}");
                return;
            }
        } else {
            let _ = self.window.set_cursor_grab(CursorGrabMode::None);
        }
        self.window.set_cursor_visible(!engaged);
        self.send(InputEvent::PointerLockChanged { locked: engaged });
    }

    fn send(&mut self, event: InputEvent) {
        self.frame_loop.input().borrow_mut().process_event(&event);
    }

    fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event: KeyEvent { state, physical_key, repeat, .. }, .. } => {
                let PhysicalKey::Code(code) = physical_key else {
                    return false;
                };
                let Some(key) = key_name(*code) else {
                    return false;
                };
                match state {
                    ElementState::Pressed => {
                        if *code == KeyCode::Escape {
                            self.set_engaged(false);
                        }
                        if !repeat {
                            self.send(InputEvent::KeyDown(key.to_string()));
                        }
                    }
                    ElementState::Released => self.send(InputEvent::KeyUp(key.to_string())),
                }
                true
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                self.send(InputEvent::MouseClick);
                self.set_engaged(true);
                true
            }
            WindowEvent::Focused(false) => {
                self.send(InputEvent::FocusLost);
                self.set_engaged(false);
                true
            }
            WindowEvent::Occluded(occluded) => {
                self.send(InputEvent::VisibilityChanged { visible: !occluded });
                true
            }
            _ => false,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = load_config()?;
    config.validate()?;

    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("Walkthrough")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut app = pollster::block_on(App::new(window.clone(), &config))?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
            if !app.input(event) {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(physical_size) => {
                        app.frame_loop.resize(physical_size.width, physical_size.height);
                    }
                    WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                        app.frame_loop.renderer_mut().set_pixels_per_point(*scale_factor as f32);
                    }
                    WindowEvent::RedrawRequested => {
                        let now_ms = app.started.elapsed().as_secs_f64() * 1000.0;
                        app.frame_loop.tick(now_ms);
                    }
                    _ => {}
                }
            }
        }
        Event::DeviceEvent { event: DeviceEvent::MouseMotion { delta }, .. } => {
            app.send(InputEvent::MouseMove { dx: delta.0 as f32, dy: delta.1 as f32 });
        }
        Event::AboutToWait => {
            app.window.request_redraw();
        }
        _ => {}
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use walkthrough::controller::{Action, KeyBindings};

    #[test]
    fn native_keys_map_onto_default_bindings() {
        let bindings = KeyBindings::default();
        let action = |code| key_name(code).and_then(|k| bindings.action_for(k));
        assert_eq!(action(KeyCode::KeyW), Some(Action::Forward));
        assert_eq!(action(KeyCode::Space), Some(Action::Up));
        assert_eq!(action(KeyCode::ShiftRight), Some(Action::Down));
        assert_eq!(action(KeyCode::KeyQ), None);
        assert!(bindings.is_escape(key_name(KeyCode::Escape).unwrap_or_default()));
    }
}
