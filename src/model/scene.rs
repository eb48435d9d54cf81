use std::collections::BTreeMap;
use std::rc::Rc;

use crate::assets::VideoStream;
use crate::error::UvMappingError;

use super::{AnimatedLight, Color, Light, LightId, LoadedAsset, UvTransform, VideoSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atmosphere {
    pub background: Color,
    pub fog_color: Color,
    pub fog_near: f32,
    pub fog_far: f32,
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self {
            background: Color::from_hex(0x3d4a59),
            fog_color: Color::from_hex(0x3d4a59),
            fog_near: 25.0,
            fog_far: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MappingState {
    /// Waiting for the first decoded frame to report dimensions.
    Deferred,
    Applied(UvTransform),
    Rejected(UvMappingError),
}

pub struct VideoBinding {
    pub id: VideoId,
    pub node: NodeId,
    pub surface: VideoSurface,
    pub stream: Rc<dyn VideoStream>,
    pub mapping: MappingState,
}

/// Everything the frame loop animates and the renderer draws.
///
/// Loaded assets, animated lights and video bindings are kept in separate
/// collections so no pass ever has to ask a node what kind it is.
pub struct SceneContext {
    pub atmosphere: Atmosphere,
    lights: BTreeMap<LightId, Light>,
    animated: Vec<AnimatedLight>,
    assets: Vec<LoadedAsset>,
    videos: Vec<VideoBinding>,
    next_light: u32,
    next_node: u32,
    next_video: u32,
}

impl SceneContext {
    pub fn new(atmosphere: Atmosphere) -> Self {
        Self {
            atmosphere,
            lights: BTreeMap::new(),
            animated: Vec::new(),
            assets: Vec::new(),
            videos: Vec::new(),
            next_light: 0,
            next_node: 0,
            next_video: 0,
        }
    }

    // Lights

    pub fn add_light(&mut self, light: Light) -> LightId {
        let id = LightId(self.next_light);
        self.next_light += 1;
        self.lights.insert(id, light);
        id
    }

    /// Removes a light together with its flicker state.
    pub fn remove_light(&mut self, id: LightId) -> Option<Light> {
        self.animated.retain(|a| a.light != id);
        self.lights.remove(&id)
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(&id)
    }

    pub fn lights(&self) -> impl Iterator<Item = (LightId, &Light)> {
        self.lights.iter().map(|(id, light)| (*id, light))
    }

    /// Returns false if the light does not exist or is already animated.
    pub fn register_animated(&mut self, animated: AnimatedLight) -> bool {
        if !self.lights.contains_key(&animated.light)
            || self.animated.iter().any(|a| a.light == animated.light)
        {
            return false;
        }
        self.animated.push(animated);
        true
    }

    pub fn deregister_animated(&mut self, light: LightId) -> Option<AnimatedLight> {
        let idx = self.animated.iter().position(|a| a.light == light)?;
        Some(self.animated.remove(idx))
    }

    pub fn animated(&self) -> &[AnimatedLight] {
        &self.animated
    }

    /// Runs `step` on every animated light and writes the returned
    /// intensity back to the light it drives.
    pub fn update_animated(&mut self, mut step: impl FnMut(&mut AnimatedLight) -> f32) {
        let Self { lights, animated, .. } = self;
        for anim in animated.iter_mut() {
            let intensity = step(anim);
            if let Some(light) = lights.get_mut(&anim.light) {
                light.intensity = intensity;
            }
        }
    }

    // Assets

    pub fn allocate_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn insert_asset(&mut self, asset: LoadedAsset) {
        self.assets.push(asset);
    }

    pub fn remove_asset(&mut self, node: NodeId) -> Option<LoadedAsset> {
        let idx = self.assets.iter().position(|a| a.node == node)?;
        self.videos.retain(|v| v.node != node);
        Some(self.assets.remove(idx))
    }

    pub fn assets(&self) -> &[LoadedAsset] {
        &self.assets
    }

    // Video surfaces

    pub fn bind_video(&mut self, node: NodeId, surface: VideoSurface, stream: Rc<dyn VideoStream>) -> VideoId {
        let id = VideoId(self.next_video);
        self.next_video += 1;
        self.videos.push(VideoBinding {
            id,
            node,
            surface,
            stream,
            mapping: MappingState::Deferred,
        });
        id
    }

    pub fn videos(&self) -> &[VideoBinding] {
        &self.videos
    }

    pub fn videos_mut(&mut self) -> &mut [VideoBinding] {
        &mut self.videos
    }

    pub fn video(&self, id: VideoId) -> Option<&VideoBinding> {
        self.videos.iter().find(|v| v.id == id)
    }
}
