use crate::model::Camera;

use super::input::{Action, InputState};

/// Per-tick camera displacement in camera-relative axes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Displacement {
    /// Along the flattened look direction.
    pub forward: f32,
    pub right: f32,
    /// Straight world-space height change.
    pub up: f32,
}

impl Displacement {
    pub const ZERO: Displacement = Displacement { forward: 0.0, right: 0.0, up: 0.0 };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Length of the planar plus vertical move.
    pub fn magnitude(&self) -> f32 {
        (self.forward * self.forward + self.right * self.right + self.up * self.up).sqrt()
    }
}

/// Turns held movement actions into camera motion.
///
/// Speed is a fixed amount per tick, so motion runs faster on faster
/// displays. Diagonals are not renormalized.
pub struct Navigator {
    pub speed: f32,
    pub look_sensitivity: f32,
}

impl Navigator {
    pub fn new(speed: f32, look_sensitivity: f32) -> Self {
        Self { speed, look_sensitivity }
    }

    pub fn step(&self, input: &InputState, engaged: bool) -> Displacement {
        if !engaged {
            return Displacement::ZERO;
        }
        let axis = |pos: Action, neg: Action| {
            let mut v = 0.0;
            if input.is_pressed(pos) {
                v += self.speed;
            }
            if input.is_pressed(neg) {
                v -= self.speed;
            }
            v
        };
        Displacement {
            forward: axis(Action::Forward, Action::Backward),
            right: axis(Action::Right, Action::Left),
            up: axis(Action::Up, Action::Down),
        }
    }

    pub fn apply(&self, camera: &mut Camera, d: Displacement) {
        if d.forward != 0.0 {
            camera.move_forward(d.forward);
        }
        if d.right != 0.0 {
            camera.move_right(d.right);
        }
        camera.eye.y += d.up;
    }

    /// Apply mouse look delta to camera
    pub fn apply_look(&self, camera: &mut Camera, dx: f32, dy: f32) {
        camera.rotate(dx * self.look_sensitivity, -dy * self.look_sensitivity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const SPEED: f32 = 0.2;

    fn pressed(actions: &[Action]) -> InputState {
        let mut input = InputState::default();
        for a in actions {
            input.set_pressed(*a, true);
        }
        input
    }

    #[test]
    fn forward_moves_along_the_look_axis_by_speed() {
        let nav = Navigator::new(SPEED, 0.002);
        let d = nav.step(&pressed(&[Action::Forward]), true);
        assert_eq!(d, Displacement { forward: SPEED, right: 0.0, up: 0.0 });

        let mut cam = Camera::new(800, 600);
        nav.apply(&mut cam, d);
        let moved = cam.eye;
        assert!((moved.length() - SPEED).abs() < 1e-6);
        assert!(moved.normalize().dot(cam.planar_forward()) > 0.9999);
    }

    #[test]
    fn diagonal_is_not_normalized() {
        let nav = Navigator::new(SPEED, 0.002);
        let d = nav.step(&pressed(&[Action::Forward, Action::Right]), true);
        assert!(d.magnitude() > SPEED);

        let mut cam = Camera::new(800, 600);
        nav.apply(&mut cam, d);
        assert!(cam.eye.length() > SPEED);
        assert!((cam.eye.length() - SPEED * 2f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn opposite_actions_cancel() {
        let nav = Navigator::new(SPEED, 0.002);
        let d = nav.step(&pressed(&[Action::Left, Action::Right, Action::Up, Action::Down]), true);
        assert!(d.is_zero());
    }

    #[test]
    fn disengaged_is_inert() {
        let nav = Navigator::new(SPEED, 0.002);
        let all = pressed(&Action::ALL);
        assert!(nav.step(&all, false).is_zero());
    }

    #[test]
    fn vertical_ignores_pitch() {
        let nav = Navigator::new(SPEED, 0.002);
        let mut cam = Camera::new(800, 600);
        cam.pitch = 0.8;
        nav.apply(&mut cam, nav.step(&pressed(&[Action::Up]), true));
        assert!((cam.eye - Vec3::new(0.0, SPEED, 0.0)).length() < 1e-6);
    }

    #[test]
    fn look_up_raises_pitch() {
        let nav = Navigator::new(SPEED, 0.002);
        let mut cam = Camera::new(800, 600);
        nav.apply_look(&mut cam, 0.0, -100.0);
        assert!(cam.pitch > 0.0);
    }
}
