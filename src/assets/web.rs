use std::rc::Rc;

use js_sys::{Function, Promise, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlAudioElement, HtmlMediaElement, HtmlVideoElement, Response};

use super::{decode_glb, AudioTrack, DecodeBackend, LoadProgress, LocalBoxFuture, MediaElement, ProgressFn, VideoFrame, VideoStream};
use crate::error::{AssetError, PlaybackError};
use crate::model::MeshData;

/// `HAVE_CURRENT_DATA`: at least one frame is decoded.
const HAVE_CURRENT_DATA: u16 = 2;

/// Browser-backed decoding: `fetch` for models, media elements for the rest.
#[derive(Default)]
pub struct WebBackend;

fn js_reason(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", String::from(err.name()), String::from(err.message()));
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

async fn fetch_bytes(locator: &str) -> Result<(Vec<u8>, Option<u64>), AssetError> {
    let fetch_err = |reason: String| AssetError::Fetch { locator: locator.to_string(), reason };

    let window = web_sys::window().ok_or_else(|| fetch_err("no global window".to_string()))?;
    let response = JsFuture::from(window.fetch_with_str(locator))
        .await
        .map_err(|e| fetch_err(js_reason(&e)))?;
    let response: Response = response
        .dyn_into()
        .map_err(|_| fetch_err("fetch did not return a Response".to_string()))?;
    if !response.ok() {
        return Err(fetch_err(format!("HTTP {} {}", response.status(), response.status_text())));
    }

    let total = response
        .headers()
        .get("content-length")
        .ok()
        .flatten()
        .and_then(|len| len.parse().ok());
    let buffer = response.array_buffer().map_err(|e| fetch_err(js_reason(&e)))?;
    let buffer = JsFuture::from(buffer).await.map_err(|e| fetch_err(js_reason(&e)))?;
    Ok((Uint8Array::new(&buffer).to_vec(), total))
}

fn play_element(element: &HtmlMediaElement, label: &str) -> LocalBoxFuture<Result<(), PlaybackError>> {
    let label = label.to_string();
    let promise = element.play();
    Box::pin(async move {
        let blocked = |e: JsValue| PlaybackError::Blocked { media: label.clone(), reason: js_reason(&e) };
        let promise = promise.map_err(blocked)?;
        JsFuture::from(promise).await.map(|_| ()).map_err(blocked)
    })
}

pub struct WebVideo {
    label: String,
    element: HtmlVideoElement,
}

impl WebVideo {
    /// Muted, looping and inline, so the browser lets it autoplay.
    pub fn open(locator: &str) -> Result<Self, AssetError> {
        let err = |reason: String| AssetError::Fetch { locator: locator.to_string(), reason };
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| err("no document".to_string()))?;
        let element: HtmlVideoElement = document
            .create_element("video")
            .map_err(|e| err(js_reason(&e)))?
            .dyn_into()
            .map_err(|_| err("created element is not a video".to_string()))?;

        element.set_cross_origin(Some("anonymous"));
        element.set_loop(true);
        element.set_muted(true);
        element.set_preload("auto");
        element.set_attribute("playsinline", "").map_err(|e| err(js_reason(&e)))?;
        element.set_src(locator);

        Ok(Self { label: locator.to_string(), element })
    }

    fn has_frame(&self) -> bool {
        self.element.ready_state() >= HAVE_CURRENT_DATA
    }
}

impl MediaElement for WebVideo {
    fn label(&self) -> &str {
        &self.label
    }

    fn play(&self) -> LocalBoxFuture<Result<(), PlaybackError>> {
        play_element(&self.element, &self.label)
    }

    fn is_muted(&self) -> bool {
        self.element.muted()
    }

    fn set_muted(&self, muted: bool) {
        self.element.set_muted(muted);
    }

    fn set_volume(&self, volume: f32) {
        self.element.set_volume(volume.clamp(0.0, 1.0) as f64);
    }
}

impl VideoStream for WebVideo {
    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        if !self.has_frame() {
            return None;
        }
        Some((self.element.video_width(), self.element.video_height()))
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.has_frame().then(|| VideoFrame::Element(self.element.clone()))
    }
}

pub struct WebAudio {
    label: String,
    element: HtmlAudioElement,
}

impl MediaElement for WebAudio {
    fn label(&self) -> &str {
        &self.label
    }

    fn play(&self) -> LocalBoxFuture<Result<(), PlaybackError>> {
        play_element(&self.element, &self.label)
    }

    fn is_muted(&self) -> bool {
        self.element.muted()
    }

    fn set_muted(&self, muted: bool) {
        self.element.set_muted(muted);
    }

    fn set_volume(&self, volume: f32) {
        self.element.set_volume(volume.clamp(0.0, 1.0) as f64);
    }
}

impl AudioTrack for WebAudio {
    fn set_looping(&self, looping: bool) {
        self.element.set_loop(looping);
    }
}

impl DecodeBackend for WebBackend {
    fn decode_mesh(&self, locator: &str, progress: Option<ProgressFn>) -> LocalBoxFuture<Result<MeshData, AssetError>> {
        let locator = locator.to_string();
        Box::pin(async move {
            let (bytes, total) = fetch_bytes(&locator).await?;
            if let Some(progress) = progress {
                progress(LoadProgress { loaded: bytes.len() as u64, total: total.or(Some(bytes.len() as u64)) });
            }
            decode_glb(&locator, &bytes)
        })
    }

    fn open_video(&self, locator: &str) -> Result<Rc<dyn VideoStream>, AssetError> {
        Ok(Rc::new(WebVideo::open(locator)?))
    }

    /// Resolves once the element reports `canplaythrough`.
    fn decode_audio(&self, locator: &str) -> LocalBoxFuture<Result<Rc<dyn AudioTrack>, AssetError>> {
        let locator = locator.to_string();
        Box::pin(async move {
            let err = |reason: String| AssetError::Fetch { locator: locator.clone(), reason };
            let element = HtmlAudioElement::new_with_src(&locator).map_err(|e| err(js_reason(&e)))?;
            element.set_preload("auto");

            let ready = Promise::new(&mut |resolve: Function, reject: Function| {
                element.set_oncanplaythrough(Some(&resolve));
                element.set_onerror(Some(&reject));
            });
            element.load();
            let outcome = JsFuture::from(ready).await;
            element.set_oncanplaythrough(None);
            element.set_onerror(None);
            outcome.map_err(|e| AssetError::Decode { locator: locator.clone(), reason: js_reason(&e) })?;

            Ok(Rc::new(WebAudio { label: locator.clone(), element }) as Rc<dyn AudioTrack>)
        })
    }
}
