//! The rotating model viewer: lifecycle, bootstrap, normalization and the
//! render loop.
//!
//! Every callback handed to a collaborator (frame queue, resize signal,
//! asset loader) holds a `Weak` to the viewer core and checks the liveness
//! flag before touching state, so callbacks that outlive the viewer do
//! nothing.

mod bootstrap;
mod frame_loop;
mod normalize;

pub use bootstrap::{create_lights, initial_size};
pub use frame_loop::{FrameClock, ViewportPolicy};
pub use normalize::{normalize, AssetBounds, Normalization};

use crate::assets::{AssetError, AssetLoader, LoadRequest};
use crate::config::ViewerConfig;
use crate::dom::{Element, WeakElement};
use crate::render::{OrbitControls, PerspectiveCamera, RenderBackend, RenderError, RenderSurface};
use crate::scene::{Aabb, Node, NodeId, Scene, Transform};
use crate::signal::{FrameHandle, FrameQueue, ResizeSignal, Subscription, WindowMetrics};
use glam::Mat4;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub const OVERLAY_ID: &str = "loading-overlay";
pub const MOUNT_POINT_ID: &str = "model-container";
pub const PULSE_CLASS: &str = "animate-pulse";
pub const LOADING_TEXT: &str = "Loading 3D Model...";
pub const ERROR_TEXT: &str = "Error loading model.";

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("mount point #model-container is not attached")]
    MissingMountPoint,
    #[error("failed to load model {path}: {source}")]
    AssetLoad {
        path: String,
        #[source]
        source: AssetError,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    Unmounted,
    Loading,
    Ready,
    LoadFailed,
    Destroyed,
}

/// Host-side services the viewer schedules work on.
#[derive(Clone)]
pub struct ViewerContext {
    pub loader: Rc<dyn AssetLoader>,
    pub frames: FrameQueue,
    pub resize: ResizeSignal,
}

struct ViewerCore<B: RenderBackend> {
    config: ViewerConfig,
    backend: B,
    context: ViewerContext,
    phase: ViewerPhase,
    mount_requested: bool,
    alive: bool,
    self_ref: Weak<RefCell<ViewerCore<B>>>,

    mount_point: WeakElement,
    overlay: WeakElement,
    surface: Option<B::Surface>,
    camera: Option<PerspectiveCamera>,
    controls: Option<OrbitControls>,
    scene: Option<Scene>,
    asset: Option<NodeId>,
    normalization: Option<Normalization>,
    frame: Option<FrameHandle>,
    subscription: Option<Subscription>,
    policy: Option<ViewportPolicy>,
    clock: FrameClock,
}

/// Handle to one viewer instance. Dropping it without unmounting releases
/// the resize subscription and turns pending callbacks into no-ops.
pub struct Viewer<B: RenderBackend> {
    core: Rc<RefCell<ViewerCore<B>>>,
}

impl<B: RenderBackend + 'static> Viewer<B> {
    pub fn new(config: ViewerConfig, backend: B, context: ViewerContext) -> Self {
        let core = Rc::new_cyclic(|self_ref| {
            RefCell::new(ViewerCore {
                config,
                backend,
                context,
                phase: ViewerPhase::Unmounted,
                mount_requested: false,
                alive: false,
                self_ref: self_ref.clone(),
                mount_point: WeakElement::default(),
                overlay: WeakElement::default(),
                surface: None,
                camera: None,
                controls: None,
                scene: None,
                asset: None,
                normalization: None,
                frame: None,
                subscription: None,
                policy: None,
                clock: FrameClock::default(),
            })
        });
        Self { core }
    }

    /// Renders the placeholder, loading overlay and mount point into
    /// `container` and returns the placeholder.
    pub fn render_markup(&self, container: &Element) -> Element {
        let placeholder = Element::new("div")
            .with_style("touch-action", "pan-y")
            .with_style("width", "100%")
            .with_style("height", "100%")
            .with_style("max-width", "400px")
            .with_style("aspect-ratio", "1 / 1")
            .with_style("position", "relative")
            .with_style("overflow", "hidden");
        let overlay = Element::new("div")
            .with_id(OVERLAY_ID)
            .with_class(PULSE_CLASS)
            .with_text(LOADING_TEXT);
        let mount_point = Element::new("div")
            .with_id(MOUNT_POINT_ID)
            .with_style("width", "100%")
            .with_style("height", "100%");

        placeholder.append_child(&overlay);
        placeholder.append_child(&mount_point);
        container.append_child(&placeholder);

        let mut core = self.core.borrow_mut();
        core.overlay = overlay.downgrade();
        core.mount_point = mount_point.downgrade();
        placeholder
    }

    pub fn on_mount(&self) {
        self.core.borrow_mut().mount();
    }

    pub fn on_unmount(&self) {
        self.core.borrow_mut().unmount();
    }

    /// Forwards a pointer drag in logical pixels. Returns false when
    /// interaction is disabled or the viewer isn't mounted.
    pub fn pointer_drag(&self, dx: f32, dy: f32) -> bool {
        let mut core = self.core.borrow_mut();
        let core = &mut *core;
        match (core.controls.as_mut(), core.surface.as_ref()) {
            (Some(controls), Some(surface)) if core.alive => {
                controls.rotate_by_pixels(dx, dy, surface.size().1)
            }
            _ => false,
        }
    }

    /// Forwards wheel steps; positive zooms in.
    pub fn zoom(&self, steps: f32) -> bool {
        let mut core = self.core.borrow_mut();
        let core = &mut *core;
        match core.controls.as_mut() {
            Some(controls) if core.alive => controls.zoom_by(steps),
            _ => false,
        }
    }

    pub fn phase(&self) -> ViewerPhase {
        self.core.borrow().phase
    }

    pub fn is_alive(&self) -> bool {
        self.core.borrow().alive
    }

    pub fn camera(&self) -> Option<PerspectiveCamera> {
        self.core.borrow().camera
    }

    pub fn controls(&self) -> Option<OrbitControls> {
        self.core.borrow().controls
    }

    pub fn viewport_policy(&self) -> Option<ViewportPolicy> {
        self.core.borrow().policy
    }

    pub fn normalization(&self) -> Option<Normalization> {
        self.core.borrow().normalization
    }

    pub fn scheduled_frame(&self) -> Option<FrameHandle> {
        self.core.borrow().frame
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.core.borrow().surface.as_ref().map(RenderSurface::size)
    }

    pub fn surface_pixel_ratio(&self) -> Option<f64> {
        self.core.borrow().surface.as_ref().map(RenderSurface::pixel_ratio)
    }

    pub fn asset_transform(&self) -> Option<Transform> {
        let core = self.core.borrow();
        let id = core.asset?;
        core.scene.as_ref()?.get(id).map(|node| node.transform)
    }

    /// World-space bounds of the posed asset.
    pub fn asset_bounds(&self) -> Option<Aabb> {
        let core = self.core.borrow();
        let id = core.asset?;
        core.scene.as_ref()?.get(id)?.world_bounds(&Mat4::IDENTITY)
    }

    pub fn overlay(&self) -> Option<Element> {
        self.core.borrow().overlay.upgrade()
    }
}

impl<B: RenderBackend + 'static> ViewerCore<B> {
    fn mount(&mut self) {
        if self.mount_requested {
            log::warn!("Viewer mounted twice; ignoring");
            return;
        }
        self.mount_requested = true;

        let Some(mount_point) = self.mount_point.upgrade() else {
            log::error!("{}", ViewerError::MissingMountPoint);
            return;
        };

        let metrics = self.context.resize.current();
        let parts = match bootstrap::bootstrap(
            &self.config,
            &self.backend,
            &mount_point,
            metrics.scale_factor,
        ) {
            Ok(parts) => parts,
            Err(e) => {
                log::error!("{}", ViewerError::from(e));
                return;
            }
        };

        self.surface = Some(parts.surface);
        self.camera = Some(parts.camera);
        self.controls = Some(parts.controls);
        self.scene = Some(parts.scene);
        self.alive = true;
        self.phase = ViewerPhase::Loading;

        self.request_asset();

        if let (Some(controls), Some(camera)) = (self.controls.as_mut(), self.camera.as_mut()) {
            controls.update(camera, 0.0);
        }
        self.handle_resize(metrics);

        let weak = self.self_ref.clone();
        self.subscription = Some(self.context.resize.subscribe(move |metrics| {
            let Some(core) = weak.upgrade() else {
                return;
            };
            // Emitting from inside a viewer call would re-enter; the
            // synchronous pass at mount already covers that case.
            match core.try_borrow_mut() {
                Ok(mut core) => core.handle_resize(metrics),
                Err(_) => log::debug!("Skipping re-entrant resize"),
            };
        }));

        log::info!("Viewer mounted; loading {}", self.config.asset_path);
    }

    fn request_asset(&mut self) {
        let weak = self.self_ref.clone();
        let path = self.config.asset_path.clone();
        self.context.loader.load(LoadRequest::new(
            path,
            Box::new(move |result| {
                let Some(core) = weak.upgrade() else {
                    log::debug!("Asset load finished after viewer was dropped");
                    return;
                };
                match core.try_borrow_mut() {
                    Ok(mut core) => core.on_asset_loaded(result),
                    Err(_) => log::error!("Asset load completed re-entrantly; ignoring"),
                };
            }),
        ));
    }

    fn on_asset_loaded(&mut self, result: Result<Node, AssetError>) {
        if !self.alive {
            log::debug!("Ignoring asset load for a torn-down viewer");
            return;
        }
        if self.phase != ViewerPhase::Loading {
            log::warn!("Unexpected asset completion in phase {:?}", self.phase);
            return;
        }

        let mut root = match result {
            Ok(root) => root,
            Err(source) => {
                let error = ViewerError::AssetLoad {
                    path: self.config.asset_path.clone(),
                    source,
                };
                log::error!("{error}");
                if let Some(overlay) = self.overlay.upgrade() {
                    overlay.set_text(ERROR_TEXT);
                    overlay.remove_class(PULSE_CLASS);
                }
                self.phase = ViewerPhase::LoadFailed;
                return;
            }
        };

        let (Some(camera), Some(controls), Some(scene)) =
            (self.camera.as_mut(), self.controls.as_mut(), self.scene.as_mut())
        else {
            return;
        };

        let normalization = normalize(&mut root, camera, &self.config);
        controls.update(camera, 0.0);
        self.asset = Some(scene.add(root));
        self.normalization = Some(normalization);

        if let Some(overlay) = self.overlay.upgrade() {
            overlay.remove();
        }
        self.phase = ViewerPhase::Ready;
        log::info!(
            "Model ready (scale {:.4}, camera distance {:.4})",
            normalization.scale,
            normalization.camera_distance
        );
        self.start_loop();
    }

    /// Schedules the first frame. Does nothing if a frame is already queued.
    fn start_loop(&mut self) {
        if !self.alive || self.asset.is_none() || self.frame.is_some() {
            return;
        }
        self.clock.reset();
        self.schedule_frame();
    }

    fn schedule_frame(&mut self) {
        let weak = self.self_ref.clone();
        let frames = self.context.frames.clone();
        let handle = self.context.frames.request_frame(Box::new(move |handle, time| {
            deliver_frame(weak, frames, handle, time)
        }));
        self.frame = Some(handle);
    }

    fn on_frame(&mut self, handle: FrameHandle, time: f64) {
        if !self.alive {
            log::debug!("Ignoring frame {} after teardown", handle.id());
            return;
        }
        if self.frame != Some(handle) {
            log::debug!("Ignoring stale frame {}", handle.id());
            return;
        }
        self.frame = None;

        let dt = self.clock.tick(time);
        if let (Some(controls), Some(camera), Some(surface), Some(scene)) = (
            self.controls.as_mut(),
            self.camera.as_mut(),
            self.surface.as_mut(),
            self.scene.as_ref(),
        ) {
            controls.update(camera, dt);
            surface.render(scene, camera);
        }
        self.schedule_frame();
    }

    fn handle_resize(&mut self, metrics: WindowMetrics) {
        if !self.alive {
            return;
        }
        let Some(mount_point) = self.mount_point.upgrade() else {
            log::debug!("Resize with detached mount point");
            return;
        };
        let policy = ViewportPolicy::compute(&self.config, &mount_point, metrics);
        if let (Some(surface), Some(camera), Some(controls)) = (
            self.surface.as_mut(),
            self.camera.as_mut(),
            self.controls.as_mut(),
        ) {
            policy.apply(surface, camera, controls);
        }
        if self.policy != Some(policy) {
            log::debug!(
                "Viewport {}x{} (compact: {})",
                policy.width,
                policy.height,
                policy.compact
            );
        }
        self.policy = Some(policy);
    }

    fn unmount(&mut self) {
        if self.phase == ViewerPhase::Destroyed {
            return;
        }
        self.alive = false;

        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        if let Some(handle) = self.frame.take() {
            self.context.frames.cancel_frame(handle);
        }
        if let Some(controls) = self.controls.as_mut() {
            controls.dispose();
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.dispose();
        }
        if let Some(scene) = self.scene.as_mut() {
            release_scene_resources(scene, self.surface.as_mut());
            if let Some(asset) = self.asset.take() {
                scene.remove(asset);
            }
        }
        if let (Some(mount_point), Some(surface)) = (self.mount_point.upgrade(), self.surface.as_ref()) {
            mount_point.remove_child(surface.canvas());
        }

        self.surface = None;
        self.camera = None;
        self.controls = None;
        self.scene = None;
        self.normalization = None;
        self.policy = None;
        self.mount_point = WeakElement::default();
        self.overlay = WeakElement::default();
        self.phase = ViewerPhase::Destroyed;
        log::info!("Viewer unmounted");
    }
}

/// Runs a frame on the core. A frame that lands while the core is already
/// borrowed is retried on the next frame under its original handle.
fn deliver_frame<B: RenderBackend + 'static>(
    weak: Weak<RefCell<ViewerCore<B>>>,
    frames: FrameQueue,
    handle: FrameHandle,
    time: f64,
) {
    let Some(core) = weak.upgrade() else {
        log::debug!("Frame {} fired after viewer was dropped", handle.id());
        return;
    };
    let borrowed = core.try_borrow_mut();
    match borrowed {
        Ok(mut core) => core.on_frame(handle, time),
        Err(_) => {
            log::warn!("Frame {} arrived while the viewer was busy; retrying", handle.id());
            let retry_frames = frames.clone();
            frames.request_frame(Box::new(move |_, time| {
                deliver_frame(weak, retry_frames, handle, time)
            }));
        }
    }
}

/// Drops every mesh's GPU buffers and disposes its geometry and material.
fn release_scene_resources<S: RenderSurface>(scene: &mut Scene, mut surface: Option<&mut S>) {
    scene.visit_meshes_mut(|mesh| {
        if let Some(surface) = surface.as_mut() {
            surface.release_mesh(mesh.id());
        }
        mesh.geometry.dispose();
        mesh.material.dispose();
    });
}
