use glam::{Mat4, Vec3};

/// Perspective camera with a cached projection matrix.
///
/// Changing `fov_deg`, `aspect`, `near` or `far` has no effect on
/// [`PerspectiveCamera::projection`] until
/// [`PerspectiveCamera::update_projection_matrix`] runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub up: Vec3,
    target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov_deg,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            up: Vec3::Y,
            target: Vec3::NEG_Z,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn update_projection_matrix(&mut self) {
        let aspect = if self.aspect.is_finite() && self.aspect > 0.0 {
            self.aspect
        } else {
            1.0
        };
        self.projection = Mat4::perspective_rh(self.fov_deg.to_radians(), aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn view(&self) -> Mat4 {
        let forward = self.target - self.position;
        let up = if forward.cross(self.up).length_squared() > 1e-12 {
            self.up
        } else {
            Vec3::Z
        };
        Mat4::look_at_rh(self.position, self.target, up)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }

    pub fn distance_to_target(&self) -> f32 {
        (self.position - self.target).length()
    }
}

#[cfg(test)]
mod tests {
    use super::PerspectiveCamera;
    use glam::Vec3;

    #[test]
    fn projection_is_cached_until_updated() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
        let before = camera.projection();
        camera.aspect = 2.0;
        assert_eq!(camera.projection(), before);
        camera.update_projection_matrix();
        assert_ne!(camera.projection(), before);
        // x scale halves when aspect doubles
        let ratio = before.x_axis.x / camera.projection().x_axis.x;
        assert!((ratio - 2.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_aspect_stays_finite() {
        let mut camera = PerspectiveCamera::new(75.0, 0.0, 0.1, 1000.0);
        camera.aspect = f32::NAN;
        camera.update_projection_matrix();
        assert!(camera.projection().to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn view_is_finite_when_looking_straight_down() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
        camera.position = Vec3::new(0.0, 5.0, 0.0);
        camera.look_at(Vec3::ZERO);
        assert!(camera.view().to_cols_array().iter().all(|v| v.is_finite()));
        assert!((camera.distance_to_target() - 5.0).abs() < 1e-6);
    }
}
