//! Desktop host: one winit window playing the page that embeds the viewer.

mod input;
mod timing;

use crate::assets::GltfLoader;
use crate::config::ViewerConfig;
use crate::dom::Element;
use crate::render::GpuBackend;
use crate::signal::{FrameQueue, ResizeSignal, WindowMetrics};
use crate::viewer::{Viewer, ViewerContext, MOUNT_POINT_ID};
use input::{wheel_steps, PointerState};
use timing::FrameTiming;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "hero-viewer";
const INITIAL_WINDOW_SIZE: u32 = 800;
/// How often pending asset loads are polled while nothing is animating.
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// The page the viewer is mounted into.
struct Page {
    container: Element,
    viewer: Viewer<GpuBackend>,
}

pub struct App {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    page: Option<Page>,
    loader: Rc<GltfLoader>,
    frames: FrameQueue,
    resize: ResizeSignal,
    pointer: PointerState,
    timing: FrameTiming,
    started: Instant,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    close_requested: bool,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let now = Instant::now();
        Self {
            config,
            window: None,
            page: None,
            loader: Rc::new(GltfLoader::new(base_dir)),
            frames: FrameQueue::new(),
            resize: ResizeSignal::new(WindowMetrics::new(
                INITIAL_WINDOW_SIZE,
                INITIAL_WINDOW_SIZE,
                1.0,
            )),
            pointer: PointerState::default(),
            timing: FrameTiming::new(WINDOW_TITLE.to_string(), now),
            started: now,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: now,
            close_requested: false,
        }
    }

    fn mount_page(&mut self, window: &Arc<Window>) {
        let metrics = window_metrics(window);
        self.resize.emit(metrics);

        let container = Element::new("main");
        let viewer = Viewer::new(
            self.config.clone(),
            GpuBackend::new(window.clone()),
            ViewerContext {
                loader: self.loader.clone(),
                frames: self.frames.clone(),
                resize: self.resize.clone(),
            },
        );
        viewer.render_markup(&container);
        layout_page(&container, metrics);
        viewer.on_mount();

        self.page = Some(Page { container, viewer });
    }

    fn handle_resize(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let metrics = window_metrics(&window);
        if let Some(page) = &self.page {
            layout_page(&page.container, metrics);
        }
        self.resize.emit(metrics);
        self.update_target_frame_duration(&window);
        window.request_redraw();
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let time_ms = now.saturating_duration_since(self.started).as_secs_f64() * 1000.0;
        if self.frames.run_frame(time_ms) > 0 {
            self.timing.record_frame(now);
        }

        let status = self
            .page
            .as_ref()
            .and_then(|page| page.viewer.overlay())
            .map(|overlay| overlay.text());
        if let Some(window) = &self.window {
            self.timing.update_title(window, status.as_deref(), now);
        }
    }

    fn shutdown(&mut self) {
        if let Some(page) = self.page.take() {
            page.viewer.on_unmount();
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.close_requested = true;
        self.shutdown();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(INITIAL_WINDOW_SIZE, INITIAL_WINDOW_SIZE))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        self.mount_page(&window);
        self.update_target_frame_duration(&window);
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.request_exit(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                    && event.state == ElementState::Pressed
                {
                    log::info!("Escape pressed, shutting down...");
                    self.request_exit(event_loop);
                }
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.handle_resize();
            }
            WindowEvent::Focused(false) | WindowEvent::CursorLeft { .. } => {
                self.pointer.reset();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let scale_factor = self
                    .window
                    .as_ref()
                    .map(|window| window.scale_factor())
                    .unwrap_or(1.0);
                let logical = position.to_logical::<f32>(scale_factor);
                if let Some((dx, dy)) = self.pointer.handle_move(logical.x, logical.y) {
                    if let Some(page) = &self.page {
                        page.viewer.pointer_drag(dx, dy);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.pointer
                    .handle_button(button, state == ElementState::Pressed);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(page) = &self.page {
                    page.viewer.zoom(wheel_steps(delta));
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.close_requested {
            return;
        }
        self.loader.poll();

        let now = Instant::now();
        if self.frames.pending() > 0 {
            if now >= self.next_frame_time {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
                self.next_frame_time = now + self.target_frame_duration;
            }
            event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
        } else if self.loader.in_flight() > 0 {
            event_loop.set_control_flow(ControlFlow::WaitUntil(now + LOAD_POLL_INTERVAL));
            // keep the title in step with the overlay
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn window_metrics(window: &Window) -> WindowMetrics {
    let scale_factor = window.scale_factor();
    let logical: LogicalSize<u32> = window.inner_size().to_logical(scale_factor);
    WindowMetrics::new(logical.width, logical.height, scale_factor)
}

/// Stretches the page to the window. The swapchain always covers the whole
/// window, so the mount point does too.
fn layout_page(container: &Element, metrics: WindowMetrics) {
    container.set_client_size(metrics.width, metrics.height);
    for placeholder in container.children() {
        placeholder.set_client_size(metrics.width, metrics.height);
    }
    if let Some(mount_point) = container.find_by_id(MOUNT_POINT_ID) {
        mount_point.set_client_size(metrics.width, metrics.height);
    }
}

pub fn run(config: ViewerConfig) -> Result<(), AppError> {
    log::info!("Viewing {}", config.asset_path);
    log::info!("   Drag to orbit, scroll to zoom, ESC to exit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::layout_page;
    use crate::dom::Element;
    use crate::signal::WindowMetrics;
    use crate::viewer::MOUNT_POINT_ID;

    #[test]
    fn layout_fills_the_window() {
        let container = Element::new("main");
        let placeholder = Element::new("div");
        let mount_point = Element::new("div").with_id(MOUNT_POINT_ID);
        placeholder.append_child(&mount_point);
        container.append_child(&placeholder);

        layout_page(&container, WindowMetrics::new(1024, 640, 2.0));
        assert_eq!(container.client_size(), (1024, 640));
        assert_eq!(placeholder.client_size(), (1024, 640));
        assert_eq!(mount_point.client_size(), (1024, 640));
    }
}
