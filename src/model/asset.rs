use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use serde::Deserialize;

use super::{Color, NodeId};

/// Placement of a loaded model. Rotation is XYZ Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Option<Vec3>,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self { position: Vec3::ZERO, rotation: None, scale: Vec3::ONE }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        let rotation = self
            .rotation
            .map(|r| Quat::from_euler(EulerRot::XYZ, r.x, r.y, r.z))
            .unwrap_or(Quat::IDENTITY);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Maps a looping video onto one material slot of a framed surface.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoSurface {
    pub video: String,
    #[serde(default = "default_video_material")]
    pub material: String,
    #[serde(default = "default_zoom")]
    pub zoom: f32,
    #[serde(default)]
    pub offset: Vec2,
    /// Width/height of the framed rectangle in texture space.
    pub surface_aspect: f32,
    /// Horizontal centering constant; compensates for frame padding.
    #[serde(default = "default_centering")]
    pub centering: f32,
    /// Volume applied when the first interaction unmutes the video.
    #[serde(default = "default_video_volume")]
    pub unmute_volume: f32,
}

fn default_video_material() -> String {
    "Material.001".to_string()
}

fn default_zoom() -> f32 {
    1.0
}

fn default_centering() -> f32 {
    1.0
}

fn default_video_volume() -> f32 {
    0.01
}

/// Emissive override for sub-meshes whose node name contains `node_contains`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GlowRule {
    pub node_contains: String,
    pub color: Color,
    pub strength: f32,
}

impl GlowRule {
    pub fn emissive(&self) -> [f32; 3] {
        let [r, g, b] = self.color.to_linear();
        [r * self.strength, g * self.strength, b * self.strength]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialBinding {
    Video(VideoSurface),
    Glow(GlowRule),
}

/// Flickering point light that appears together with its model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttachedLight {
    pub color: Color,
    #[serde(default)]
    pub offset: Vec3,
    pub distance: f32,
    pub decay: f32,
    #[serde(default = "default_base_intensity")]
    pub base_intensity: f32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
}

fn default_base_intensity() -> f32 {
    100.0
}

fn default_amplitude() -> f32 {
    20.0
}

/// One model to fetch, decode and place. Consumed once by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRequest {
    pub name: String,
    pub locator: String,
    pub transform: Transform,
    pub binding: Option<MaterialBinding>,
    pub light: Option<AttachedLight>,
}

impl AssetRequest {
    pub fn new(name: impl Into<String>, locator: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            transform,
            binding: None,
            light: None,
        }
    }

    pub fn video_surface(&self) -> Option<&VideoSurface> {
        match &self.binding {
            Some(MaterialBinding::Video(surface)) => Some(surface),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioRequest {
    pub path: String,
    #[serde(default = "default_audio_volume")]
    pub volume: f32,
    #[serde(default = "default_looped")]
    pub looped: bool,
}

fn default_audio_volume() -> f32 {
    0.2
}

fn default_looped() -> bool {
    true
}

/// A model that made it into the scene.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub node: NodeId,
    pub request: AssetRequest,
    /// World matrix the node was placed with.
    pub world: Mat4,
    pub materials: Vec<String>,
}
