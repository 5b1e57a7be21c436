mod camera;
mod controls;
pub mod gpu;

pub use camera::PerspectiveCamera;
pub use controls::OrbitControls;
pub use gpu::{GpuBackend, GpuSurface};

use crate::dom::Element;
use crate::scene::{MeshId, Scene};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create rendering surface: {0}")]
    SurfaceCreateFailed(String),
    #[error("no compatible graphics adapter")]
    NoAdapter,
    #[error("failed to create graphics device: {0}")]
    DeviceCreateFailed(String),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}

/// A rendering context plus the canvas element it draws into.
///
/// Sizes passed to and returned from the surface are logical pixels; the
/// backing store is `size × pixel_ratio`.
pub trait RenderSurface {
    fn canvas(&self) -> &Element;

    fn size(&self) -> (u32, u32);

    fn pixel_ratio(&self) -> f64;

    /// Resizes the backing store. A call with the current size does nothing.
    fn set_size(&mut self, width: u32, height: u32);

    /// Rescales the backing store when the window moves to a display with a
    /// different density. Non-positive or unchanged ratios are ignored.
    fn set_pixel_ratio(&mut self, pixel_ratio: f64);

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera);

    /// Drops any GPU buffers held for `mesh`.
    fn release_mesh(&mut self, mesh: MeshId);

    /// Releases context-level resources. Rendering afterwards is a no-op.
    fn dispose(&mut self);
}

pub trait RenderBackend {
    type Surface: RenderSurface;

    fn create_surface(
        &self,
        width: u32,
        height: u32,
        pixel_ratio: f64,
    ) -> Result<Self::Surface, RenderError>;
}

/// Logical size to backing-store pixels, never zero.
pub fn physical_size(width: u32, height: u32, pixel_ratio: f64) -> (u32, u32) {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio
    } else {
        1.0
    };
    (
        ((width as f64 * ratio).round() as u32).max(1),
        ((height as f64 * ratio).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::physical_size;

    #[test]
    fn physical_size_scales_and_clamps() {
        assert_eq!(physical_size(400, 400, 2.0), (800, 800));
        assert_eq!(physical_size(0, 10, 1.5), (1, 15));
        assert_eq!(physical_size(300, 200, f64::NAN), (300, 200));
    }
}
