use glam::Vec2;
use tracing::{info, warn};

use crate::error::UvMappingError;
use crate::model::{MappingState, SceneContext, UvTransform, VideoSurface};
use crate::view::RenderBackend;

/// Fits a video of any aspect ratio into the framed rectangle of a surface.
pub struct VideoSurfaceMapper;

impl VideoSurfaceMapper {
    /// Pure: identical inputs give bit-identical results.
    ///
    /// `repeat = (zoom, zoom * surface_aspect / video_aspect)` and the offset
    /// centres that window, horizontally against `centering` instead of 1
    /// to make up for the frame's padding.
    pub fn compute(surface: &VideoSurface, width: u32, height: u32) -> Result<UvTransform, UvMappingError> {
        if width == 0 || height == 0 {
            return Err(UvMappingError::InvalidDimensions { width, height });
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(surface.zoom) || !positive(surface.surface_aspect) {
            return Err(UvMappingError::InvalidZoom);
        }

        let video_aspect = width as f32 / height as f32;
        let ratio = surface.surface_aspect / video_aspect;
        let repeat = Vec2::new(surface.zoom, surface.zoom * ratio);
        let offset = Vec2::new(
            (surface.centering - repeat.x) / 2.0 + surface.offset.x,
            (1.0 - repeat.y) / 2.0 + surface.offset.y,
        );
        Ok(UvTransform { repeat, offset })
    }

    /// Like `compute`, for streams that may not have decoded a frame yet.
    pub fn try_map(surface: &VideoSurface, size: Option<(u32, u32)>) -> Result<UvTransform, UvMappingError> {
        let (width, height) = size.ok_or(UvMappingError::UnknownDimensions)?;
        Self::compute(surface, width, height)
    }

    /// Settles every deferred binding whose stream now knows its size and
    /// swaps the target material for the video. Each binding is applied at
    /// most once. Returns how many bindings were applied.
    pub fn resolve_pending<R: RenderBackend + ?Sized>(scene: &mut SceneContext, renderer: &mut R) -> usize {
        let mut applied = 0;
        for binding in scene.videos_mut().iter_mut().filter(|b| b.mapping == MappingState::Deferred) {
            match Self::try_map(&binding.surface, binding.stream.intrinsic_size()) {
                Err(UvMappingError::UnknownDimensions) => {}
                Err(e) => {
                    warn!("Video {} cannot be mapped: {e}", binding.surface.video);
                    binding.mapping = MappingState::Rejected(e);
                }
                Ok(uv) => {
                    let slots = renderer.apply_video_material(binding.node, &binding.surface.material, binding.id, uv);
                    if slots == 0 {
                        warn!(
                            "Video {}: no material named {:?} on node {:?}",
                            binding.surface.video, binding.surface.material, binding.node
                        );
                    } else {
                        info!(
                            "Video {} mapped: repeat ({:.4}, {:.4}) offset ({:.4}, {:.4})",
                            binding.surface.video, uv.repeat.x, uv.repeat.y, uv.offset.x, uv.offset.y
                        );
                    }
                    binding.mapping = MappingState::Applied(uv);
                    applied += 1;
                }
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_surface() -> VideoSurface {
        VideoSurface {
            video: "/videos/klcc.mp4".to_string(),
            material: "Material.001".to_string(),
            zoom: 1.7,
            offset: Vec2::ZERO,
            surface_aspect: 0.24,
            centering: 0.9,
            unmute_volume: 0.01,
        }
    }

    #[test]
    fn widescreen_video_on_the_gallery_frame() {
        let uv = VideoSurfaceMapper::compute(&frame_surface(), 1920, 1080).unwrap();
        assert_eq!(uv.repeat.x, 1.7);
        assert!((uv.repeat.y - 0.2295).abs() < 1e-4, "repeat.y = {}", uv.repeat.y);
        assert!((uv.offset.x - -0.4).abs() < 1e-6, "offset.x = {}", uv.offset.x);
        assert!((uv.offset.y - (1.0 - uv.repeat.y) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let a = VideoSurfaceMapper::compute(&frame_surface(), 1280, 720).unwrap();
        let b = VideoSurfaceMapper::compute(&frame_surface(), 1280, 720).unwrap();
        assert_eq!(a.repeat.x.to_bits(), b.repeat.x.to_bits());
        assert_eq!(a.repeat.y.to_bits(), b.repeat.y.to_bits());
        assert_eq!(a.offset.x.to_bits(), b.offset.x.to_bits());
        assert_eq!(a.offset.y.to_bits(), b.offset.y.to_bits());
    }

    #[test]
    fn authored_offsets_shift_the_window() {
        let mut surface = frame_surface();
        surface.offset = Vec2::new(0.1, -0.05);
        let base = VideoSurfaceMapper::compute(&frame_surface(), 1920, 1080).unwrap();
        let shifted = VideoSurfaceMapper::compute(&surface, 1920, 1080).unwrap();
        assert!((shifted.offset.x - base.offset.x - 0.1).abs() < 1e-6);
        assert!((shifted.offset.y - base.offset.y + 0.05).abs() < 1e-6);
        assert_eq!(shifted.repeat, base.repeat);
    }

    #[test]
    fn unknown_size_defers() {
        assert_eq!(
            VideoSurfaceMapper::try_map(&frame_surface(), None),
            Err(UvMappingError::UnknownDimensions)
        );
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert_eq!(
            VideoSurfaceMapper::compute(&frame_surface(), 0, 1080),
            Err(UvMappingError::InvalidDimensions { width: 0, height: 1080 })
        );
        let mut surface = frame_surface();
        surface.zoom = 0.0;
        assert_eq!(VideoSurfaceMapper::compute(&surface, 1920, 1080), Err(UvMappingError::InvalidZoom));
        surface.zoom = 1.0;
        surface.surface_aspect = f32::NAN;
        assert_eq!(VideoSurfaceMapper::compute(&surface, 1920, 1080), Err(UvMappingError::InvalidZoom));
    }
}
