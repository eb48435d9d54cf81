// VIEW: Rendering and graphics
pub mod gpu_init;
pub mod render;

use glam::Mat4;

use crate::error::RenderError;
use crate::model::{Camera, MeshData, NodeId, SceneContext, UvTransform, VideoId};

pub use gpu_init::GpuContext;
pub use render::WgpuRenderer;

/// Counters shown in the debug HUD.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub tick: u64,
    pub fps: f32,
    pub loaded: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Everything a backend needs to draw one frame.
pub struct Frame<'a> {
    pub scene: &'a SceneContext,
    pub camera: &'a Camera,
    pub engaged: bool,
    pub stats: FrameStats,
}

/// The drawing side of the runtime.
///
/// Nodes are handed over once, fully built, between ticks; `render` only
/// ever sees a scene that is not being mutated.
pub trait RenderBackend {
    /// Uploads a decoded model placed by `world`.
    fn insert_node(&mut self, node: NodeId, mesh: &MeshData, world: Mat4) -> Result<(), RenderError>;

    /// Replaces every slot named `material` on `node` with an unlit,
    /// clamp-to-edge video material. Returns how many slots matched.
    fn apply_video_material(&mut self, node: NodeId, material: &str, video: VideoId, uv: UvTransform) -> usize;

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn render(&mut self, frame: &Frame) -> Result<(), RenderError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub struct InsertedNode {
        pub node: NodeId,
        pub mesh: MeshData,
        pub world: Mat4,
    }

    /// Headless backend that remembers what it was asked to do.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub inserted: Vec<InsertedNode>,
        pub video_materials: Vec<(NodeId, String, VideoId, UvTransform)>,
        pub renders: usize,
        pub last_eye: Option<glam::Vec3>,
        pub sizes: Vec<(u32, u32)>,
        pub fail_renders: bool,
    }

    impl RenderBackend for RecordingBackend {
        fn insert_node(&mut self, node: NodeId, mesh: &MeshData, world: Mat4) -> Result<(), RenderError> {
            self.inserted.push(InsertedNode { node, mesh: mesh.clone(), world });
            Ok(())
        }

        fn apply_video_material(&mut self, node: NodeId, material: &str, video: VideoId, uv: UvTransform) -> usize {
            let Some(inserted) = self.inserted.iter().find(|n| n.node == node) else {
                return 0;
            };
            let slots = inserted
                .mesh
                .primitives
                .iter()
                .filter(|p| p.material.name.as_deref() == Some(material))
                .count();
            if slots > 0 {
                self.video_materials.push((node, material.to_string(), video, uv));
            }
            slots
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.sizes.push((width, height));
        }

        fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
            self.renders += 1;
            self.last_eye = Some(frame.camera.eye);
            if self.fail_renders {
                return Err(RenderError::Lost);
            }
            Ok(())
        }
    }
}
