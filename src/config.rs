//! Scene description: camera, atmosphere, lights, models and audio.
//!
//! The default scene is compiled in from `config/scene.json`. Everything the
//! runtime steps per tick (move speed, flicker step) lives here too, so the
//! pacing can be tuned without touching code.
use glam::Vec3;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{
    AssetRequest, Atmosphere, AttachedLight, AudioRequest, Color, GlowRule, Light, MaterialBinding, Transform,
    VideoSurface,
};

const EMBEDDED_SCENE: &str = include_str!("../config/scene.json");

#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    /// World units per tick.
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    /// Radians per pixel of mouse motion.
    #[serde(default = "default_look_sensitivity")]
    pub look_sensitivity: f32,
    /// Directory that locators resolve against on native.
    #[serde(default = "default_asset_root")]
    pub asset_root: String,
    pub camera: CameraConfig,
    #[serde(default)]
    pub atmosphere: AtmosphereConfig,
    #[serde(default)]
    pub lights: Vec<LightConfig>,
    #[serde(default)]
    pub flicker: FlickerConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub audio: Option<AudioRequest>,
}

fn default_move_speed() -> f32 {
    0.2
}

fn default_look_sensitivity() -> f32 {
    0.002
}

fn default_asset_root() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_fov")]
    pub fov_deg: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    pub position: Vec3,
    /// Initial look target; looks down -Z when absent.
    #[serde(default)]
    pub look_at: Option<Vec3>,
}

fn default_fov() -> f32 {
    75.0
}

fn default_near() -> f32 {
    0.1
}

fn default_far() -> f32 {
    1000.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtmosphereConfig {
    pub background: Color,
    pub fog_color: Color,
    pub fog_near: f32,
    pub fog_far: f32,
}

impl Default for AtmosphereConfig {
    fn default() -> Self {
        let a = Atmosphere::default();
        Self { background: a.background, fog_color: a.fog_color, fog_near: a.fog_near, fog_far: a.fog_far }
    }
}

impl AtmosphereConfig {
    pub fn to_atmosphere(&self) -> Atmosphere {
        Atmosphere {
            background: self.background,
            fog_color: self.fog_color,
            fog_near: self.fog_near,
            fog_far: self.fog_far,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LightConfig {
    Ambient {
        color: Color,
        intensity: f32,
    },
    Directional {
        color: Color,
        intensity: f32,
        position: Vec3,
    },
    Point {
        color: Color,
        intensity: f32,
        position: Vec3,
        #[serde(default)]
        distance: f32,
        #[serde(default = "default_decay")]
        decay: f32,
    },
}

fn default_decay() -> f32 {
    2.0
}

impl LightConfig {
    pub fn to_light(&self) -> Light {
        match *self {
            LightConfig::Ambient { color, intensity } => Light::ambient(color, intensity),
            LightConfig::Directional { color, intensity, position } => Light::directional(color, intensity, position),
            LightConfig::Point { color, intensity, position, distance, decay } => {
                Light::point(color, intensity, position, distance, decay)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlickerConfig {
    /// Phase advance per tick.
    #[serde(default = "default_flicker_step")]
    pub step: f32,
    /// Initial phases are drawn from `[0, phase_range)`.
    #[serde(default = "default_phase_range")]
    pub phase_range: f32,
}

impl Default for FlickerConfig {
    fn default() -> Self {
        Self { step: default_flicker_step(), phase_range: default_phase_range() }
    }
}

fn default_flicker_step() -> f32 {
    0.05
}

fn default_phase_range() -> f32 {
    100.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub position: Vec3,
    /// XYZ Euler angles in radians.
    #[serde(default)]
    pub rotation: Option<Vec3>,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub video: Option<VideoSurface>,
    #[serde(default)]
    pub glow: Option<GlowRule>,
    #[serde(default)]
    pub light: Option<AttachedLight>,
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

impl ModelConfig {
    pub fn to_request(&self) -> AssetRequest {
        let transform = Transform { position: self.position, rotation: self.rotation, scale: self.scale };
        let mut request = AssetRequest::new(self.name.clone(), self.path.clone(), transform);
        request.binding = match (&self.video, &self.glow) {
            (Some(video), _) => Some(MaterialBinding::Video(video.clone())),
            (None, Some(glow)) => Some(MaterialBinding::Glow(glow.clone())),
            (None, None) => None,
        };
        request.light = self.light.clone();
        request
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl SceneConfig {
    /// The scene shipped with the crate.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json(EMBEDDED_SCENE)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = |v: f32| v.is_finite() && v >= 0.0;
        let positive = |v: f32| v.is_finite() && v > 0.0;

        if !non_negative(self.move_speed) {
            return Err(invalid("move_speed", "must be finite and not negative"));
        }
        if !non_negative(self.look_sensitivity) {
            return Err(invalid("look_sensitivity", "must be finite and not negative"));
        }
        if !non_negative(self.flicker.step) || !non_negative(self.flicker.phase_range) {
            return Err(invalid("flicker", "step and phase_range must be finite and not negative"));
        }

        let cam = &self.camera;
        if !(positive(cam.fov_deg) && cam.fov_deg < 180.0) {
            return Err(invalid("camera.fov_deg", "must be between 0 and 180"));
        }
        if !(positive(cam.near) && cam.far > cam.near) {
            return Err(invalid("camera", "need 0 < near < far"));
        }

        let atmo = &self.atmosphere;
        if !(non_negative(atmo.fog_near) && atmo.fog_far > atmo.fog_near) {
            return Err(invalid("atmosphere", "need 0 <= fog_near < fog_far"));
        }

        for model in &self.models {
            let field = |f: &str| format!("models.{}.{f}", model.name);
            if model.scale.to_array().into_iter().any(|s| !positive(s)) {
                return Err(invalid(field("scale"), "components must be positive"));
            }
            if model.video.is_some() && model.glow.is_some() {
                return Err(invalid(field("video"), "a model takes either a video or a glow rule"));
            }
            if let Some(video) = &model.video {
                if !positive(video.zoom) {
                    return Err(invalid(field("video.zoom"), "must be positive"));
                }
                if !positive(video.surface_aspect) {
                    return Err(invalid(field("video.surface_aspect"), "must be positive"));
                }
                if !(0.0..=1.0).contains(&video.unmute_volume) {
                    return Err(invalid(field("video.unmute_volume"), "must be within 0..=1"));
                }
            }
            if let Some(light) = &model.light {
                if !non_negative(light.distance) || !non_negative(light.decay) {
                    return Err(invalid(field("light"), "distance and decay must not be negative"));
                }
            }
        }

        if let Some(audio) = &self.audio {
            if !(0.0..=1.0).contains(&audio.volume) {
                return Err(invalid("audio.volume", "must be within 0..=1"));
            }
        }
        Ok(())
    }

    pub fn requests(&self) -> Vec<AssetRequest> {
        self.models.iter().map(ModelConfig::to_request).collect()
    }
}
