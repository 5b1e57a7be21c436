use winit::event::{MouseButton, MouseScrollDelta};

const PIXELS_PER_LINE: f32 = 40.0;

/// Left-button drag tracking in logical pixels.
#[derive(Default, Debug, Clone, Copy)]
pub struct PointerState {
    dragging: bool,
    last: Option<(f32, f32)>,
}

impl PointerState {
    pub fn handle_button(&mut self, button: MouseButton, pressed: bool) {
        if button == MouseButton::Left {
            self.dragging = pressed;
        }
    }

    /// Returns the drag delta since the previous position while the left
    /// button is held.
    pub fn handle_move(&mut self, x: f32, y: f32) -> Option<(f32, f32)> {
        let delta = match (self.dragging, self.last) {
            (true, Some((last_x, last_y))) => Some((x - last_x, y - last_y)),
            _ => None,
        };
        self.last = Some((x, y));
        delta
    }

    pub fn reset(&mut self) {
        self.dragging = false;
        self.last = None;
    }
}

/// Wheel delta in lines; positive scrolls away from the user.
pub fn wheel_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
    }
}

#[cfg(test)]
mod tests {
    use super::{wheel_steps, PointerState};
    use winit::dpi::PhysicalPosition;
    use winit::event::{MouseButton, MouseScrollDelta};

    #[test]
    fn drag_reports_deltas_only_while_pressed() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.handle_move(10.0, 10.0), None);
        pointer.handle_button(MouseButton::Left, true);
        assert_eq!(pointer.handle_move(15.0, 8.0), Some((5.0, -2.0)));
        pointer.handle_button(MouseButton::Right, false);
        assert_eq!(pointer.handle_move(16.0, 8.0), Some((1.0, 0.0)));
        pointer.handle_button(MouseButton::Left, false);
        assert_eq!(pointer.handle_move(20.0, 8.0), None);
    }

    #[test]
    fn reset_forgets_last_position() {
        let mut pointer = PointerState::default();
        pointer.handle_button(MouseButton::Left, true);
        pointer.handle_move(1.0, 1.0);
        pointer.reset();
        pointer.handle_button(MouseButton::Left, true);
        assert_eq!(pointer.handle_move(50.0, 50.0), None);
    }

    #[test]
    fn pixel_wheel_is_scaled_to_lines() {
        assert_eq!(wheel_steps(MouseScrollDelta::LineDelta(0.0, -2.0)), -2.0);
        assert_eq!(
            wheel_steps(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 80.0))),
            2.0
        );
    }
}
