use std::rc::Rc;

use super::LocalBoxFuture;
use crate::error::{AssetError, PlaybackError};
use crate::model::MeshData;

/// Advisory load progress. Skipping these never affects the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn fraction(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.loaded as f64 / total as f64).min(1.0) as f32),
            _ => None,
        }
    }
}

pub type ProgressFn = Rc<dyn Fn(LoadProgress)>;

/// Shared behaviour of anything that can be told to play.
pub trait MediaElement {
    fn label(&self) -> &str;
    /// Resolves once playback started, or fails if the host refused it.
    fn play(&self) -> LocalBoxFuture<Result<(), PlaybackError>>;
    fn is_muted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    fn set_volume(&self, volume: f32);
}

/// Latest decoded frame of a video stream.
pub enum VideoFrame {
    #[cfg(target_arch = "wasm32")]
    Element(web_sys::HtmlVideoElement),
    Rgba { width: u32, height: u32, pixels: Rc<[u8]> },
}

impl VideoFrame {
    pub fn size(&self) -> (u32, u32) {
        match self {
            #[cfg(target_arch = "wasm32")]
            VideoFrame::Element(video) => (video.video_width(), video.video_height()),
            VideoFrame::Rgba { width, height, .. } => (*width, *height),
        }
    }
}

pub trait VideoStream: MediaElement {
    /// `None` until the first frame has been decoded.
    fn intrinsic_size(&self) -> Option<(u32, u32)>;
    fn current_frame(&self) -> Option<VideoFrame>;
}

pub trait AudioTrack: MediaElement {
    fn set_looping(&self, looping: bool);
}

/// Fetch-and-decode capability the loader wraps.
pub trait DecodeBackend {
    fn decode_mesh(&self, locator: &str, progress: Option<ProgressFn>) -> LocalBoxFuture<Result<MeshData, AssetError>>;

    /// Opens a stream right away; its dimensions arrive with the first frame.
    fn open_video(&self, locator: &str) -> Result<Rc<dyn VideoStream>, AssetError>;

    fn decode_audio(&self, locator: &str) -> LocalBoxFuture<Result<Rc<dyn AudioTrack>, AssetError>>;
}
