use super::camera::PerspectiveCamera;
use glam::Vec3;
use std::f32::consts::{PI, TAU};

const POLAR_EPSILON: f32 = 1e-6;

/// Damped orbit controls around a fixed target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitControls {
    /// When false, pointer input is ignored. Auto-rotation still runs.
    pub enabled: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    /// 2.0 is one full turn every 30 seconds.
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub target: Vec3,
    theta_delta: f32,
    phi_delta: f32,
    zoom_scale: f32,
    radius: f32,
    theta: f32,
    phi: f32,
    disposed: bool,
}

impl OrbitControls {
    pub fn new(camera: &PerspectiveCamera) -> Self {
        let mut controls = Self {
            enabled: true,
            enable_damping: false,
            damping_factor: 0.05,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            target: Vec3::ZERO,
            theta_delta: 0.0,
            phi_delta: 0.0,
            zoom_scale: 1.0,
            radius: 0.0,
            theta: 0.0,
            phi: PI / 2.0,
            disposed: false,
        };
        controls.sync_from_camera(camera);
        controls
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Azimuth around +Y, measured from +Z.
    pub fn azimuth(&self) -> f32 {
        self.theta
    }

    pub fn polar(&self) -> f32 {
        self.phi
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Pointer drag in surface pixels. `height` is the surface height.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32, height: u32) -> bool {
        if !self.enabled || self.disposed {
            return false;
        }
        let h = height.max(1) as f32;
        self.theta_delta -= TAU * dx / h * self.rotate_speed;
        self.phi_delta -= TAU * dy / h * self.rotate_speed;
        true
    }

    /// Positive `steps` dolly in, negative dolly out.
    pub fn zoom_by(&mut self, steps: f32) -> bool {
        if !self.enabled || self.disposed || steps == 0.0 {
            return false;
        }
        let factor = 0.95f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.zoom_scale *= factor;
        } else {
            self.zoom_scale /= factor;
        }
        true
    }

    /// Advances auto-rotation and damping by `dt` seconds and writes the
    /// result to `camera`. Picks up any external change of the camera
    /// position first.
    pub fn update(&mut self, camera: &mut PerspectiveCamera, dt: f32) {
        if self.disposed {
            return;
        }
        self.sync_from_camera(camera);

        if self.auto_rotate {
            self.theta_delta -= TAU / 60.0 * self.auto_rotate_speed * dt.max(0.0);
        }

        if self.enable_damping {
            self.theta += self.theta_delta * self.damping_factor;
            self.phi += self.phi_delta * self.damping_factor;
        } else {
            self.theta += self.theta_delta;
            self.phi += self.phi_delta;
        }
        self.phi = self.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        self.theta = (self.theta + PI).rem_euclid(TAU) - PI;

        self.radius = (self.radius * self.zoom_scale).clamp(self.min_distance, self.max_distance);

        if self.enable_damping {
            self.theta_delta *= 1.0 - self.damping_factor;
            self.phi_delta *= 1.0 - self.damping_factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
        }
        self.zoom_scale = 1.0;

        let sin_phi = self.phi.sin();
        let offset = Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        );
        camera.position = self.target + offset;
        camera.look_at(self.target);
    }

    pub fn dispose(&mut self) {
        self.enabled = false;
        self.disposed = true;
        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.zoom_scale = 1.0;
    }

    fn sync_from_camera(&mut self, camera: &PerspectiveCamera) {
        let offset = camera.position - self.target;
        self.radius = offset.length();
        if self.radius > 0.0 {
            self.theta = offset.x.atan2(offset.z);
            self.phi = (offset.y / self.radius).clamp(-1.0, 1.0).acos();
        }
    }
}
