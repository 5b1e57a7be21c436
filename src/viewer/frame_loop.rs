use crate::config::ViewerConfig;
use crate::dom::Element;
use crate::render::{OrbitControls, PerspectiveCamera, RenderSurface};
use crate::signal::WindowMetrics;

/// Largest step fed to the controls, so a stalled window doesn't spin the
/// model through several turns at once.
const MAX_FRAME_DELTA: f32 = 0.25;
const FIRST_FRAME_DELTA: f32 = 1.0 / 60.0;

/// Viewport decisions derived from one resize pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportPolicy {
    pub compact: bool,
    pub width: u32,
    pub height: u32,
    pub aspect: f32,
    pub pixel_ratio: f64,
}

impl ViewportPolicy {
    pub fn compute(config: &ViewerConfig, mount_point: &Element, window: WindowMetrics) -> Self {
        let (measured_w, measured_h) = mount_point.client_size();
        let (width, height) = if measured_w > 0 && measured_h > 0 {
            (measured_w, measured_h)
        } else {
            let parent_width = mount_point
                .parent()
                .map(|parent| parent.client_size().0)
                .filter(|w| *w > 0)
                .unwrap_or(window.width);
            let side = (parent_width as f32 * config.fallback_width_fraction)
                .min(config.fallback_max_size as f32)
                .round()
                .max(1.0) as u32;
            (side, side)
        };

        Self {
            compact: window.width < config.compact_breakpoint,
            width,
            height,
            aspect: width as f32 / height as f32,
            pixel_ratio: window.scale_factor,
        }
    }

    pub fn apply<S: RenderSurface>(
        &self,
        surface: &mut S,
        camera: &mut PerspectiveCamera,
        controls: &mut OrbitControls,
    ) {
        surface.set_pixel_ratio(self.pixel_ratio);
        surface.set_size(self.width, self.height);
        camera.aspect = self.aspect;
        camera.update_projection_matrix();
        controls.enabled = !self.compact;
    }
}

/// Turns frame timestamps (milliseconds) into clamped deltas (seconds).
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    pub fn tick(&mut self, time_ms: f64) -> f32 {
        let dt = match self.last {
            Some(last) => ((time_ms - last) / 1000.0) as f32,
            None => FIRST_FRAME_DELTA,
        };
        self.last = Some(time_ms);
        dt.clamp(0.0, MAX_FRAME_DELTA)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
