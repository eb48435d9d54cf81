//! Binary glTF decoding into `MeshData`.
//!
//! Node transforms are baked into vertex positions and normals so each
//! loaded model is one flat list of primitives placed by a single matrix.
use glam::{Mat3, Mat4, Vec3};
use image::{DynamicImage, ImageBuffer};
use tracing::warn;

use crate::error::AssetError;
use crate::model::{MaterialSlot, MeshData, Primitive, TextureData, Vertex};

pub fn decode_glb(locator: &str, bytes: &[u8]) -> Result<MeshData, AssetError> {
    let decode_err = |reason: String| AssetError::Decode { locator: locator.to_string(), reason };

    let (document, buffers, images) = gltf::import_slice(bytes).map_err(|e| decode_err(e.to_string()))?;
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| decode_err("document has no scene".to_string()))?;

    let textures = images
        .into_iter()
        .enumerate()
        .map(|(idx, data)| {
            to_rgba(data).unwrap_or_else(|| {
                warn!("{locator}: image {idx} has an unsupported pixel format, using white");
                TextureData { width: 1, height: 1, rgba: vec![255; 4] }
            })
        })
        .collect();

    let mut mesh = MeshData { primitives: Vec::new(), textures };
    for node in scene.nodes() {
        visit_node(&node, Mat4::IDENTITY, &buffers, &mut mesh);
    }

    if mesh.is_empty() {
        return Err(decode_err("no triangle geometry".to_string()));
    }
    Ok(mesh)
}

fn visit_node(node: &gltf::Node, parent: Mat4, buffers: &[gltf::buffer::Data], out: &mut MeshData) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        let node_name = node.name().or(mesh.name()).map(str::to_string);

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Vec<[f32; 3]> = reader.read_normals().map(|n| n.collect()).unwrap_or_default();
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().collect())
                .unwrap_or_default();
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|i| i.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, p)| Vertex {
                    pos: world.transform_point3(Vec3::from(*p)).to_array(),
                    normal: normals
                        .get(i)
                        .map(|n| (normal_matrix * Vec3::from(*n)).normalize_or_zero().to_array())
                        .unwrap_or([0.0, 1.0, 0.0]),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                })
                .collect();

            let material = primitive.material();
            let pbr = material.pbr_metallic_roughness();
            out.primitives.push(Primitive {
                node_name: node_name.clone(),
                vertices,
                indices,
                material: MaterialSlot {
                    name: material.name().map(str::to_string),
                    base_color: pbr.base_color_factor(),
                    base_color_texture: pbr.base_color_texture().map(|info| info.texture().source().index()),
                    emissive: material.emissive_factor(),
                    unlit: false,
                },
            });
        }
    }

    for child in node.children() {
        visit_node(&child, world, buffers, out);
    }
}

fn to_rgba(data: gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;

    let (width, height) = (data.width, data.height);
    let image = match data.format {
        Format::R8G8B8A8 => ImageBuffer::from_raw(width, height, data.pixels).map(DynamicImage::ImageRgba8),
        Format::R8G8B8 => ImageBuffer::from_raw(width, height, data.pixels).map(DynamicImage::ImageRgb8),
        Format::R8G8 => ImageBuffer::from_raw(width, height, data.pixels).map(DynamicImage::ImageLumaA8),
        Format::R8 => ImageBuffer::from_raw(width, height, data.pixels).map(DynamicImage::ImageLuma8),
        _ => None,
    }?;

    Some(TextureData { width, height, rgba: image.to_rgba8().into_raw() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = decode_glb("/models/missing.glb", b"definitely not a glb").unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
        assert_eq!(err.locator(), "/models/missing.glb");
    }

    #[test]
    fn rgb_images_are_expanded_to_rgba() {
        let data = gltf::image::Data {
            pixels: vec![255, 0, 0, 0, 255, 0],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let tex = to_rgba(data).unwrap();
        assert_eq!(tex.rgba, vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn short_pixel_buffers_are_rejected() {
        let data = gltf::image::Data {
            pixels: vec![1, 2, 3],
            format: gltf::image::Format::R8G8B8A8,
            width: 2,
            height: 2,
        };
        assert!(to_rgba(data).is_none());
    }
}
