use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Sender;
use softbuffer::{Context as SoftContext, Surface};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Fullscreen, Window, WindowId};

use crate::config::WindowConfig;
use crate::engine::Screen;
use crate::events::RawInput;
use crate::media::{SURFACE_HEIGHT, SURFACE_WIDTH};
use crate::render::Canvas;

/// Messages from the engine thread to the window thread.
#[derive(Debug)]
pub enum ScreenEvent {
    Present(Vec<u32>),
    Close,
}

/// Engine-side handle that forwards canvases to the window thread.
pub struct WindowScreen {
    proxy: EventLoopProxy<ScreenEvent>,
}

impl WindowScreen {
    pub fn new(proxy: EventLoopProxy<ScreenEvent>) -> Self {
        Self { proxy }
    }
}

impl Screen for WindowScreen {
    fn present(&mut self, canvas: &Canvas) -> Result<()> {
        self.proxy
            .send_event(ScreenEvent::Present(canvas.pixels().to_vec()))
            .map_err(|_| anyhow!("window event loop has exited"))
    }

    fn close(&mut self) {
        let _ = self.proxy.send_event(ScreenEvent::Close);
    }
}

/// Placement of the 320x240 surface inside a window of any size: uniform
/// scale, centered, black bars on the spare axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    pub fn fit(width: u32, height: u32) -> Self {
        let sw = f64::from(SURFACE_WIDTH);
        let sh = f64::from(SURFACE_HEIGHT);
        let scale = (f64::from(width.max(1)) / sw).min(f64::from(height.max(1)) / sh);
        Self {
            scale,
            offset_x: (f64::from(width) - sw * scale) / 2.0,
            offset_y: (f64::from(height) - sh * scale) / 2.0,
        }
    }

    /// Surface coordinates of a window position; `None` on the bars.
    pub fn to_surface(&self, x: f64, y: f64) -> Option<(i32, i32)> {
        let sx = ((x - self.offset_x) / self.scale).floor();
        let sy = ((y - self.offset_y) / self.scale).floor();
        let inside = (0.0..f64::from(SURFACE_WIDTH)).contains(&sx)
            && (0.0..f64::from(SURFACE_HEIGHT)).contains(&sy);
        inside.then_some((sx as i32, sy as i32))
    }
}

pub fn build_event_loop() -> Result<EventLoop<ScreenEvent>> {
    EventLoop::<ScreenEvent>::with_user_event()
        .build()
        .context("failed to build window event loop")
}

/// Run the window on the calling thread until the engine closes it.
pub fn run(event_loop: EventLoop<ScreenEvent>, cfg: WindowConfig, input: Sender<RawInput>) -> Result<()> {
    let mut app = WindowApp::new(cfg, input);
    event_loop
        .run_app(&mut app)
        .context("window event loop failed")?;
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

type WindowHandle = Arc<Window>;

struct WindowApp {
    cfg: WindowConfig,
    input: Sender<RawInput>,
    window: Option<WindowHandle>,
    context: Option<SoftContext<WindowHandle>>,
    surface: Option<Surface<WindowHandle, WindowHandle>>,
    frame: Vec<u32>,
    cursor: Option<PhysicalPosition<f64>>,
    failure: Option<anyhow::Error>,
}

impl WindowApp {
    fn new(cfg: WindowConfig, input: Sender<RawInput>) -> Self {
        Self {
            cfg,
            input,
            window: None,
            context: None,
            surface: None,
            frame: vec![0; SURFACE_WIDTH as usize * SURFACE_HEIGHT as usize],
            cursor: None,
            failure: None,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }
        let mut attrs = Window::default_attributes()
            .with_title(self.cfg.title.clone())
            .with_inner_size(LogicalSize::new(SURFACE_WIDTH, SURFACE_HEIGHT));
        if self.cfg.fullscreen {
            attrs = attrs
                .with_decorations(false)
                .with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = WindowHandle::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );
        if self.cfg.hide_cursor {
            window.set_cursor_visible(false);
        }

        let context = SoftContext::new(window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer context: {err}"))?;
        let surface = Surface::new(&context, window.clone())
            .map_err(|err| anyhow!("failed to create softbuffer surface: {err}"))?;
        self.context = Some(context);
        self.surface = Some(surface);
        self.handle_resize(window.inner_size());
        info!(size = ?window.inner_size(), "window created");
        self.window = Some(window);
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(surface) = self.surface.as_mut()
            && let (Some(width), Some(height)) = (
                NonZeroU32::new(size.width.max(1)),
                NonZeroU32::new(size.height.max(1)),
            )
            && let Err(err) = surface.resize(width, height)
        {
            warn!(error = %err, "failed to resize surface");
        }
    }

    fn render(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let viewport = Viewport::fit(width, height);
        let mut buffer = match surface.buffer_mut() {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %err, "no surface buffer");
                return;
            }
        };
        for y in 0..height {
            let row = (y * width) as usize;
            for x in 0..width {
                let px = viewport
                    .to_surface(f64::from(x) + 0.5, f64::from(y) + 0.5)
                    .map(|(sx, sy)| self.frame[sy as usize * SURFACE_WIDTH as usize + sx as usize])
                    .unwrap_or(0);
                if let Some(slot) = buffer.get_mut(row + x as usize) {
                    *slot = px;
                }
            }
        }
        if let Err(err) = buffer.present() {
            warn!(error = %err, "failed to present frame");
        }
    }

    fn forward_touch(&self, position: PhysicalPosition<f64>) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let size = window.inner_size();
        let viewport = Viewport::fit(size.width, size.height);
        if let Some((x, y)) = viewport.to_surface(position.x, position.y) {
            debug!(x, y, "touch released");
            let _ = self.input.send(RawInput::Touch { x, y });
        }
    }
}

impl ApplicationHandler<ScreenEvent> for WindowApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.ensure_window(event_loop) {
            error!(error = %err, "window setup failed");
            self.failure = Some(err);
            let _ = self.input.send(RawInput::Interrupt);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != window_id {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                info!("window close requested");
                let _ = self.input.send(RawInput::Interrupt);
            }
            WindowEvent::Destroyed => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.handle_resize(size);
                window.request_redraw();
            }
            WindowEvent::RedrawRequested => self.render(),
            WindowEvent::CursorMoved { position, .. } => self.cursor = Some(position),
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(position) = self.cursor {
                    self.forward_touch(position);
                }
            }
            WindowEvent::Touch(touch) if touch.phase == TouchPhase::Ended => {
                self.forward_touch(touch.location);
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ScreenEvent) {
        match event {
            ScreenEvent::Present(pixels) => {
                if pixels.len() == self.frame.len() {
                    self.frame = pixels;
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            ScreenEvent::Close => {
                info!("closing window");
                event_loop.exit();
            }
        }
    }
}
