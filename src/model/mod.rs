// MODEL: Scene data, camera and decoded assets
pub mod asset;
pub mod camera;
pub mod color;
pub mod light;
pub mod mesh;
pub mod scene;

pub use asset::{AssetRequest, AttachedLight, AudioRequest, GlowRule, LoadedAsset, MaterialBinding, Transform, VideoSurface};
pub use camera::Camera;
pub use color::Color;
pub use light::{flicker_intensity, AnimatedLight, Light, LightId, LightKind};
pub use mesh::{MaterialSlot, MeshData, Primitive, TextureData, UvTransform, Vertex};
pub use scene::{Atmosphere, MappingState, NodeId, SceneContext, VideoBinding, VideoId};
