use bytemuck::{Pod, Zeroable};
use glam::Vec2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Decoded RGBA8 image.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MaterialSlot {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    /// Index into `MeshData::textures`.
    pub base_color_texture: Option<usize>,
    /// Linear emissive color, already multiplied by its strength.
    pub emissive: [f32; 3],
    pub unlit: bool,
}

impl Default for MaterialSlot {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0; 4],
            base_color_texture: None,
            emissive: [0.0; 3],
            unlit: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Primitive {
    /// Name of the glTF node the primitive hangs off.
    pub node_name: Option<String>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: MaterialSlot,
}

/// CPU-side mesh with node transforms baked into the vertices.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub primitives: Vec<Primitive>,
    pub textures: Vec<TextureData>,
}

impl MeshData {
    pub fn is_empty(&self) -> bool {
        self.primitives.iter().all(|p| p.indices.is_empty())
    }

    /// Distinct material names, in first-seen order.
    pub fn material_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.primitives.iter().filter_map(|p| p.material.name.as_ref()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Makes every primitive under a node whose name contains `fragment`
    /// emissive. Returns how many primitives changed.
    pub fn apply_glow(&mut self, fragment: &str, emissive: [f32; 3]) -> usize {
        let mut changed = 0;
        for prim in &mut self.primitives {
            if prim.node_name.as_deref().is_some_and(|n| n.contains(fragment)) {
                prim.material.emissive = emissive;
                changed += 1;
            }
        }
        changed
    }
}

/// Texture-space sub-rectangle: `uv' = uv * repeat + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    pub repeat: Vec2,
    pub offset: Vec2,
}

impl UvTransform {
    pub const IDENTITY: UvTransform = UvTransform { repeat: Vec2::ONE, offset: Vec2::ZERO };

    pub fn apply(&self, uv: Vec2) -> Vec2 {
        uv * self.repeat + self.offset
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.repeat.x, self.repeat.y, self.offset.x, self.offset.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prim(node: &str, material: &str) -> Primitive {
        Primitive {
            node_name: Some(node.to_string()),
            vertices: Vec::new(),
            indices: vec![0, 1, 2],
            material: MaterialSlot { name: Some(material.to_string()), ..Default::default() },
        }
    }

    #[test]
    fn glow_only_touches_matching_nodes() {
        let mut mesh = MeshData {
            primitives: vec![prim("candle_body", "wax"), prim("flame_01", "fire"), prim("wick", "fire")],
            textures: Vec::new(),
        };
        assert_eq!(mesh.apply_glow("flame", [2.0, 1.2, 0.4]), 1);
        assert_eq!(mesh.primitives[1].material.emissive, [2.0, 1.2, 0.4]);
        assert_eq!(mesh.primitives[0].material.emissive, [0.0; 3]);
    }

    #[test]
    fn material_names_are_deduplicated() {
        let mesh = MeshData {
            primitives: vec![prim("a", "Material.001"), prim("b", "Frame"), prim("c", "Material.001")],
            textures: Vec::new(),
        };
        assert_eq!(mesh.material_names(), vec!["Material.001".to_string(), "Frame".to_string()]);
    }

    #[test]
    fn uv_transform_scales_then_offsets() {
        let t = UvTransform { repeat: Vec2::new(2.0, 0.5), offset: Vec2::new(-0.5, 0.25) };
        assert_eq!(t.apply(Vec2::new(1.0, 1.0)), Vec2::new(1.5, 0.75));
        assert_eq!(UvTransform::IDENTITY.apply(Vec2::new(0.3, 0.7)), Vec2::new(0.3, 0.7));
    }
}
