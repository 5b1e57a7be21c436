use crate::config::ViewerConfig;
use crate::dom::Element;
use crate::render::{OrbitControls, PerspectiveCamera, RenderBackend, RenderError, RenderSurface};
use crate::scene::{Light, Scene};
use glam::Vec3;

pub(super) struct Bootstrapped<S> {
    pub surface: S,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub scene: Scene,
}

/// Mount point size, or the configured default for an axis that has not
/// been laid out yet.
pub fn initial_size(config: &ViewerConfig, mount_point: &Element) -> (u32, u32) {
    let (width, height) = mount_point.client_size();
    let width = if width > 0 { width } else { config.default_size };
    let height = if height > 0 { height } else { config.default_size };
    (width, height)
}

pub fn create_lights(config: &ViewerConfig) -> [Light; 2] {
    [
        Light::Ambient {
            color: config.ambient.color,
            intensity: config.ambient.intensity,
        },
        Light::Directional {
            color: config.directional.color,
            intensity: config.directional.intensity,
            position: Vec3::from(config.directional_position),
        },
    ]
}

/// Builds camera, surface, controls and lit scene, and appends the canvas to
/// `mount_point`. Nothing is attached if the surface can't be created.
pub(super) fn bootstrap<B: RenderBackend>(
    config: &ViewerConfig,
    backend: &B,
    mount_point: &Element,
    pixel_ratio: f64,
) -> Result<Bootstrapped<B::Surface>, RenderError> {
    let (width, height) = initial_size(config, mount_point);
    let camera = PerspectiveCamera::new(
        config.fov_deg,
        width as f32 / height as f32,
        config.near,
        config.far,
    );

    let surface = backend.create_surface(width, height, pixel_ratio)?;
    mount_point.append_child(surface.canvas());

    let mut controls = OrbitControls::new(&camera);
    controls.enable_damping = true;
    controls.damping_factor = config.damping_factor;
    controls.auto_rotate = true;
    controls.auto_rotate_speed = config.auto_rotate_speed;

    let mut scene = Scene::new();
    for light in create_lights(config) {
        scene.add_light(light);
    }

    log::debug!(
        "Bootstrapped {}x{} surface at pixel ratio {}",
        width,
        height,
        pixel_ratio
    );

    Ok(Bootstrapped {
        surface,
        camera,
        controls,
        scene,
    })
}

#[cfg(test)]
mod tests {
    use super::{create_lights, initial_size};
    use crate::config::ViewerConfig;
    use crate::dom::Element;
    use crate::scene::Light;
    use glam::Vec3;

    #[test]
    fn zero_axes_fall_back_independently() {
        let config = ViewerConfig::hero();
        let el = Element::new("div");
        assert_eq!(initial_size(&config, &el), (400, 400));
        el.set_client_size(320, 0);
        assert_eq!(initial_size(&config, &el), (320, 400));
    }

    #[test]
    fn default_lighting() {
        let [ambient, directional] = create_lights(&ViewerConfig::hero());
        assert_eq!(
            ambient,
            Light::Ambient {
                color: [1.0, 1.0, 1.0],
                intensity: 1.5
            }
        );
        match directional {
            Light::Directional {
                intensity, position, ..
            } => {
                assert_eq!(intensity, 2.0);
                assert_eq!(position, Vec3::new(2.0, 5.0, 3.0));
            }
            other => panic!("unexpected light {other:?}"),
        }
    }
}
