use glam::Vec3;

use super::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Shines from `position` towards the origin.
    Directional { position: Vec3 },
    /// `distance` of zero means unbounded; `decay` is the falloff exponent.
    Point { position: Vec3, distance: f32, decay: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

impl Light {
    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self { kind: LightKind::Ambient, color, intensity }
    }

    pub fn directional(color: Color, intensity: f32, position: Vec3) -> Self {
        Self { kind: LightKind::Directional { position }, color, intensity }
    }

    pub fn point(color: Color, intensity: f32, position: Vec3, distance: f32, decay: f32) -> Self {
        Self { kind: LightKind::Point { position, distance, decay }, color, intensity }
    }
}

/// Flicker state for one light. The phase only ever grows; f64 keeps a small
/// step from rounding away once the phase gets large.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedLight {
    pub light: LightId,
    pub base_intensity: f32,
    pub amplitude: f32,
    phase: f64,
}

impl AnimatedLight {
    pub fn new(light: LightId, base_intensity: f32, amplitude: f32, phase: f64) -> Self {
        Self { light, base_intensity, amplitude, phase: phase.max(0.0) }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Advances the phase; negative or non-finite steps are ignored.
    pub fn advance(&mut self, step: f64) {
        if step.is_finite() && step > 0.0 {
            self.phase += step;
        }
    }

    pub fn intensity(&self) -> f32 {
        flicker_intensity(self.base_intensity, self.amplitude, self.phase)
    }
}

pub fn flicker_intensity(base: f32, amplitude: f32, phase: f64) -> f32 {
    (f64::from(base) + f64::from(amplitude) * phase.sin()) as f32
}
