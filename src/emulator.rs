use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Event, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowBuilder};
use winit_input_helper::WinitInputHelper;

use frameshell::cartridge::Cartridge;
use frameshell::engine::{Console, Engine};
use frameshell::gamepad;
use frameshell::gfx::{PresentationPipeline, WgpuDevice};
use frameshell::input::{DeviceRegistry, InputEvent, InputRouter};
use frameshell::joypad::Port;
use frameshell::session::Session;
use frameshell::touch::{TouchTracker, MOUSE_POINTER};
use frameshell::{MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH};

const TITLE: &str = "frameshell";

#[derive(Debug, Clone)]
pub struct Options {
    pub scale: u32,
    pub port: Port,
    pub gamepad: bool,
}

/// The object that pulls everything together: it owns the window, drives the console once per
/// display refresh and feeds it input from the touch overlay and the gamepad thread.
pub struct Emulator<E: Engine> {
    options: Options,
    session: Arc<Session>,
    console: Option<Console<E>>,
    pipeline: PresentationPipeline,
    device: Option<WgpuDevice>,
    router: InputRouter<DeviceRegistry>,
    touch: TouchTracker,
    cursor: Option<(f32, f32)>,
    mouse_down: bool,
    rendering: bool,
    gamepad: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl<E: Engine> Emulator<E> {
    pub fn new(engine: E, options: Options) -> Self {
        let session = Arc::new(Session::new());
        let router = InputRouter::new(Arc::clone(&session), options.port, DeviceRegistry::new());
        Self {
            console: Some(Console::new(engine)),
            session,
            pipeline: PresentationPipeline::new(),
            device: None,
            router,
            touch: TouchTracker::default(),
            cursor: None,
            mouse_down: false,
            rendering: true,
            gamepad: None,
            options,
        }
    }

    /// Load a program image from disk. On failure whatever was running keeps running.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let cartridge = Cartridge::load(path)?;
        let console = self.console.as_mut().context("Console already shut down")?;
        console
            .load(cartridge.data(), &self.session)
            .with_context(|| format!("Failed to start {}", cartridge.name()))?;
        info!("Running {}", cartridge.name());
        Ok(())
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;
        let scale = self.options.scale.max(1);
        let window = WindowBuilder::new()
            .with_title(TITLE)
            .with_inner_size(LogicalSize::new(
                MAX_FRAME_WIDTH.saturating_mul(scale),
                MAX_FRAME_HEIGHT.saturating_mul(scale),
            ))
            .with_min_inner_size(LogicalSize::new(MAX_FRAME_WIDTH, MAX_FRAME_HEIGHT))
            .build(&event_loop)
            .context("Failed to create window")?;
        let window = Arc::new(window);

        if self.options.gamepad {
            self.start_gamepad()?;
        }

        let mut input = WinitInputHelper::new();
        let mut fatal = None;
        event_loop.run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            if let Err(e) = self.handle_event(&event, elwt, &window) {
                fatal = Some(e);
                self.rendering = false;
                elwt.exit();
            }

            if input.update(&event) {
                self.hotkeys(&input, elwt);
            }
        })?;

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn start_gamepad(&mut self) -> Result<()> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = gamepad::spawn(
            Arc::clone(&self.session),
            self.options.port,
            Arc::clone(&stop),
        )?;
        self.gamepad = Some((stop, handle));
        Ok(())
    }

    fn handle_event(
        &mut self,
        event: &Event<()>,
        elwt: &EventLoopWindowTarget<()>,
        window: &Arc<Window>,
    ) -> Result<()> {
        match event {
            Event::Resumed => {
                let mut device = WgpuDevice::new(Arc::clone(window))?;
                self.pipeline
                    .surface_created(&mut device)
                    .context("Failed to set up rendering")?;
                self.device = Some(device);
            }
            Event::Suspended => {
                self.pipeline.surface_lost();
                self.device = None;
            }
            Event::AboutToWait => {
                if self.rendering {
                    window.request_redraw();
                }
            }
            Event::WindowEvent { event, .. } => self.window_event(event, elwt, window)?,
            Event::LoopExiting => self.shutdown(),
            _ => {}
        }
        Ok(())
    }

    fn window_event(
        &mut self,
        event: &WindowEvent,
        elwt: &EventLoopWindowTarget<()>,
        window: &Window,
    ) -> Result<()> {
        match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::RedrawRequested => self.render()?,
            WindowEvent::Resized(size) => {
                if let Some(device) = self.device.as_mut() {
                    device.resize(size.width, size.height)?;
                }
            }
            WindowEvent::DroppedFile(path) => match self.load(path) {
                Ok(()) => {
                    let name = path.file_name().unwrap_or(path.as_os_str());
                    window.set_title(&format!("{} - {}", TITLE, name.to_string_lossy()));
                }
                Err(e) => error!("{:#}", e),
            },
            WindowEvent::Focused(false) => {
                for event in self.touch.cancel_all() {
                    self.router.route(&event);
                }
                self.mouse_down = false;
            }
            WindowEvent::Touch(touch) => self.touch_event(touch, window),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(normalise(*position, window));
                if self.mouse_down {
                    if let Some((x, y)) = self.cursor {
                        let event = self.touch.motion(MOUSE_POINTER, x, y);
                        self.route(event);
                    }
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                if self.mouse_down {
                    let event = self.touch.cancel(MOUSE_POINTER);
                    self.route(event);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.mouse_down = true;
                    if let Some((x, y)) = self.cursor {
                        let event = self.touch.press(MOUSE_POINTER, x, y);
                        self.route(event);
                    }
                }
                ElementState::Released => {
                    self.mouse_down = false;
                    let event = self.touch.release(MOUSE_POINTER);
                    self.route(event);
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn touch_event(&mut self, touch: &Touch, window: &Window) {
        let (x, y) = normalise(touch.location, window);
        let event = match touch.phase {
            TouchPhase::Started => self.touch.press(touch.id, x, y),
            TouchPhase::Moved => self.touch.motion(touch.id, x, y),
            TouchPhase::Ended => self.touch.release(touch.id),
            TouchPhase::Cancelled => self.touch.cancel(touch.id),
        };
        self.route(event);
    }

    fn route(&self, event: Option<InputEvent>) {
        if let Some(event) = event {
            self.router.route(&event);
        }
    }

    fn render(&mut self) -> Result<()> {
        if !self.rendering {
            return Ok(());
        }
        let (Some(device), Some(console)) = (self.device.as_mut(), self.console.as_mut()) else {
            return Ok(());
        };
        self.pipeline
            .render_tick(device, console, &self.session)
            .context("Rendering failed")?;
        Ok(())
    }

    /// Host handling for keys the joypad does not use.
    fn hotkeys(&mut self, input: &WinitInputHelper, elwt: &EventLoopWindowTarget<()>) {
        if input.key_pressed(KeyCode::Escape) || input.close_requested() || input.destroyed() {
            elwt.exit();
            return;
        }
        let Some(console) = self.console.as_mut() else {
            return;
        };
        if input.key_pressed(KeyCode::F5) {
            console.reset();
        }
        if input.key_pressed(KeyCode::F8) {
            console.unload(&self.session);
        }
    }

    /// Tear everything down, render loop first and GPU resources last.
    fn shutdown(&mut self) {
        info!("Shutting down");
        self.rendering = false;

        if let Some((stop, handle)) = self.gamepad.take() {
            stop.store(true, Ordering::Release);
            if handle.join().is_err() {
                warn!("Gamepad thread panicked");
            }
        }
        self.session.controllers().release_all();

        if let Some(console) = self.console.take() {
            console.shutdown(&self.session);
        }
        if let Some(mut device) = self.device.take() {
            self.pipeline.release(&mut device);
            debug!("Dropping graphics device");
        }
    }
}

/// Window coordinates to the `[0, 1]` range the touch layout uses.
fn normalise(position: PhysicalPosition<f64>, window: &Window) -> (f32, f32) {
    let size = window.inner_size();
    let x = position.x / f64::from(size.width.max(1));
    let y = position.y / f64::from(size.height.max(1));
    (x as f32, y as f32)
}
