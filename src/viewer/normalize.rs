use crate::config::ViewerConfig;
use crate::render::PerspectiveCamera;
use crate::scene::{Aabb, Node};
use glam::{Mat4, Vec3};

const MIN_DIMENSION: f32 = 1e-6;

/// Bounds of a freshly loaded asset, measured once before it is posed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetBounds {
    pub aabb: Aabb,
    pub center: Vec3,
    pub max_dimension: f32,
}

impl AssetBounds {
    pub fn measure(root: &Node) -> Option<Self> {
        let aabb = root.world_bounds(&Mat4::IDENTITY)?;
        let size = aabb.size();
        Some(Self {
            aabb,
            center: aabb.center(),
            max_dimension: size.x.max(size.y).max(size.z),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub bounds: Option<AssetBounds>,
    pub scale: f32,
    pub camera_distance: f32,
}

/// Centers `root` on the origin, scales it per `config.scale_mode` and puts
/// the camera on +Z far enough back to frame it.
pub fn normalize(root: &mut Node, camera: &mut PerspectiveCamera, config: &ViewerConfig) -> Normalization {
    let bounds = AssetBounds::measure(root);

    let (scale, extent) = match bounds {
        Some(b) if b.max_dimension > MIN_DIMENSION => {
            let scale = config.scale_mode.scale_for(b.max_dimension);
            // world = s * (old_world - center)
            root.transform.translation = (root.transform.translation - b.center) * scale;
            root.transform.scale *= scale;
            (scale, b.max_dimension)
        }
        Some(b) => {
            log::warn!(
                "Asset has zero extent at {:?}; leaving it unscaled",
                b.center
            );
            root.transform.translation -= b.center;
            (1.0, 1.0)
        }
        None => {
            log::warn!("Asset has no geometry; leaving it unscaled");
            (1.0, 1.0)
        }
    };

    let camera_distance = if bounds.map_or(false, |b| b.max_dimension > MIN_DIMENSION) {
        extent * scale * config.camera_distance_multiplier
    } else {
        config.scale_mode.scale_for(extent) * config.camera_distance_multiplier
    };

    camera.position = Vec3::new(0.0, 0.0, camera_distance);
    camera.look_at(Vec3::ZERO);

    Normalization {
        bounds,
        scale,
        camera_distance,
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize, AssetBounds};
    use crate::config::{ScaleMode, ViewerConfig};
    use crate::render::PerspectiveCamera;
    use crate::scene::{Geometry, Material, Mesh, Node};
    use glam::{Mat4, Vec3};

    fn box_node(min: Vec3, max: Vec3) -> Node {
        Node::new("asset").with_mesh(Mesh::new(Geometry::cuboid(min, max), Material::new([1.0; 4])))
    }

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0)
    }

    #[test]
    fn fit_largest_centers_and_scales() {
        let mut root = box_node(Vec3::new(4.0, 4.5, 4.5), Vec3::new(6.0, 5.5, 5.5));
        let mut camera = camera();
        let result = normalize(&mut root, &mut camera, &ViewerConfig::hero());

        let bounds = result.bounds.unwrap();
        assert!((bounds.center - Vec3::splat(5.0)).length() < 1e-5);
        assert!((bounds.max_dimension - 2.0).abs() < 1e-6);
        assert!((result.scale - 0.25).abs() < 1e-6);
        assert!((result.camera_distance - 0.65).abs() < 1e-6);
        assert_eq!(root.transform.scale, Vec3::splat(0.25));

        let after = root.world_bounds(&Mat4::IDENTITY).unwrap();
        assert!(after.center().length() < 1e-5);
        assert!((after.size() - Vec3::new(0.5, 0.25, 0.25)).length() < 1e-5);
        assert!((camera.position - Vec3::new(0.0, 0.0, 0.65)).length() < 1e-6);
    }

    #[test]
    fn fixed_scale_ignores_asset_size() {
        let mut root = box_node(Vec3::splat(-10.0), Vec3::splat(10.0));
        let mut camera = camera();
        let mut config = ViewerConfig::showcase();
        config.camera_distance_multiplier = 2.0;
        let result = normalize(&mut root, &mut camera, &config);
        assert_eq!(result.scale, 1.3);
        assert!((result.camera_distance - 20.0 * 1.3 * 2.0).abs() < 1e-4);
    }

    #[test]
    fn offset_root_transform_is_respected() {
        let mut root = box_node(Vec3::splat(-1.0), Vec3::splat(1.0));
        root.transform.translation = Vec3::new(3.0, 0.0, 0.0);
        root.transform.scale = Vec3::splat(2.0);
        let mut camera = camera();
        let config = ViewerConfig {
            scale_mode: ScaleMode::FitLargest { target: 1.0 },
            ..ViewerConfig::hero()
        };
        normalize(&mut root, &mut camera, &config);
        let after = root.world_bounds(&Mat4::IDENTITY).unwrap();
        assert!(after.center().length() < 1e-5);
        assert!((after.size().max_element() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_asset_keeps_finite_camera() {
        let mut root = Node::new("empty");
        let mut camera = camera();
        let result = normalize(&mut root, &mut camera, &ViewerConfig::hero());
        assert!(result.bounds.is_none());
        assert_eq!(result.scale, 1.0);
        assert!((result.camera_distance - 0.5 * 1.3).abs() < 1e-6);
        assert_eq!(root.transform.scale, Vec3::ONE);
    }

    #[test]
    fn flat_asset_still_measures_largest_axis() {
        let root = box_node(Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 1.0));
        let bounds = AssetBounds::measure(&root).unwrap();
        assert_eq!(bounds.max_dimension, 4.0);
    }
}
