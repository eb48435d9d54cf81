// ASSETS: Fetching and decoding models, video streams and audio
pub mod decode;
pub mod glb;
pub mod loader;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

pub use decode::{AudioTrack, DecodeBackend, LoadProgress, MediaElement, ProgressFn, VideoFrame, VideoStream};
pub use glb::decode_glb;
pub use loader::{AssetLoader, LoadFailure, LoadTicket, ReadyAsset, ReadyAudio};
#[cfg(not(target_arch = "wasm32"))]
pub use native::FileBackend;
#[cfg(target_arch = "wasm32")]
pub use web::WebBackend;

/// Single-threaded boxed future; everything here runs on the frame thread.
pub type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = T>>>;

/// Polls a future once without registering for wake-ups.
///
/// Loads are re-polled on every tick anyway, so nobody needs to be woken.
pub(crate) fn poll_now<T>(future: &mut LocalBoxFuture<T>) -> Poll<T> {
    let mut cx = Context::from_waker(Waker::noop());
    future.as_mut().poll(&mut cx)
}
