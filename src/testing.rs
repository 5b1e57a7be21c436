//! Test doubles for the render backend and asset loader.

use crate::assets::{AssetError, AssetLoader, LoadRequest};
use crate::dom::Element;
use crate::render::{PerspectiveCamera, RenderBackend, RenderError, RenderSurface};
use crate::scene::{Geometry, Material, Mesh, MeshId, Node, Scene};
use glam::Vec3;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Created {
        width: u32,
        height: u32,
        pixel_ratio: f64,
    },
    Resized {
        width: u32,
        height: u32,
    },
    PixelRatioChanged(f64),
    Rendered {
        meshes: usize,
        camera_position: Vec3,
    },
    ReleasedMesh(MeshId),
    Disposed,
}

pub type EventLog = Rc<RefCell<Vec<SurfaceEvent>>>;

#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub events: EventLog,
    pub fail: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.borrow().clone()
    }

    pub fn render_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Rendered { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl RenderBackend for RecordingBackend {
    type Surface = RecordingSurface;

    fn create_surface(
        &self,
        width: u32,
        height: u32,
        pixel_ratio: f64,
    ) -> Result<RecordingSurface, RenderError> {
        if self.fail {
            return Err(RenderError::NoAdapter);
        }
        self.events.borrow_mut().push(SurfaceEvent::Created {
            width,
            height,
            pixel_ratio,
        });
        let canvas = Element::new("canvas");
        canvas.set_client_size(width, height);
        Ok(RecordingSurface {
            canvas,
            size: (width, height),
            pixel_ratio,
            events: self.events.clone(),
            disposed: false,
        })
    }
}

pub struct RecordingSurface {
    canvas: Element,
    size: (u32, u32),
    pixel_ratio: f64,
    events: EventLog,
    disposed: bool,
}

impl RenderSurface for RecordingSurface {
    fn canvas(&self) -> &Element {
        &self.canvas
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if self.size == (width, height) {
            return;
        }
        self.size = (width, height);
        self.canvas.set_client_size(width, height);
        self.events
            .borrow_mut()
            .push(SurfaceEvent::Resized { width, height });
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 || self.pixel_ratio == pixel_ratio {
            return;
        }
        self.pixel_ratio = pixel_ratio;
        self.events
            .borrow_mut()
            .push(SurfaceEvent::PixelRatioChanged(pixel_ratio));
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        if self.disposed {
            return;
        }
        let mut meshes = 0;
        scene.visit_meshes(|_, _| meshes += 1);
        self.events.borrow_mut().push(SurfaceEvent::Rendered {
            meshes,
            camera_position: camera.position,
        });
    }

    fn release_mesh(&mut self, mesh: MeshId) {
        self.events.borrow_mut().push(SurfaceEvent::ReleasedMesh(mesh));
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.events.borrow_mut().push(SurfaceEvent::Disposed);
        }
    }
}

/// Holds load requests until the test resolves them.
#[derive(Default)]
pub struct ManualLoader {
    requests: RefCell<VecDeque<LoadRequest>>,
}

impl ManualLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.path.clone()).collect()
    }

    /// Completes the oldest request. Returns false if none is pending.
    pub fn resolve(&self, result: Result<Node, AssetError>) -> bool {
        let request = self.requests.borrow_mut().pop_front();
        match request {
            Some(request) => {
                (request.on_complete)(result);
                true
            }
            None => false,
        }
    }
}

impl AssetLoader for ManualLoader {
    fn load(&self, request: LoadRequest) {
        self.requests.borrow_mut().push_back(request);
    }
}

/// A node holding one box mesh spanning `min..max`.
pub fn box_asset(min: Vec3, max: Vec3) -> Node {
    Node::new("asset").with_mesh(Mesh::new(
        Geometry::cuboid(min, max),
        Material::new([0.8, 0.8, 0.8, 1.0]),
    ))
}

pub fn missing_asset_error() -> AssetError {
    AssetError::Read {
        path: "./scene.gltf".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    }
}
