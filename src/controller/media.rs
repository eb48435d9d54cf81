use std::rc::Rc;
use std::task::Poll;

use tracing::{info, warn};

use crate::assets::{poll_now, AudioTrack, LocalBoxFuture, MediaElement, VideoStream};
use crate::error::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// First `play()` in flight.
    Starting,
    Playing,
    /// Refused by the host; waiting for a user gesture.
    Blocked,
    /// The one retry is in flight.
    Retrying,
    /// The retry was refused too. Stays paused.
    GaveUp,
}

pub enum MediaHandle {
    Video(Rc<dyn VideoStream>),
    Audio(Rc<dyn AudioTrack>),
}

macro_rules! delegate {
    ($self:ident, $media:ident => $call:expr) => {
        match $self {
            MediaHandle::Video($media) => $call,
            MediaHandle::Audio($media) => $call,
        }
    };
}

impl MediaHandle {
    fn label(&self) -> &str {
        delegate!(self, m => m.label())
    }

    fn play(&self) -> LocalBoxFuture<Result<(), PlaybackError>> {
        delegate!(self, m => m.play())
    }

    fn is_muted(&self) -> bool {
        delegate!(self, m => m.is_muted())
    }

    fn set_muted(&self, muted: bool) {
        delegate!(self, m => m.set_muted(muted))
    }

    fn set_volume(&self, volume: f32) {
        delegate!(self, m => m.set_volume(volume))
    }
}

struct Tracked {
    handle: MediaHandle,
    state: PlaybackState,
    attempt: Option<LocalBoxFuture<Result<(), PlaybackError>>>,
    /// Volume to unmute at on the first interaction (videos only).
    unmute_volume: Option<f32>,
}

/// Starts video and audio playback and handles autoplay refusals.
///
/// A refused `play()` leaves the media paused until the next click or key
/// press, which triggers exactly one retry. The first gesture also unmutes
/// videos, which have to start muted to be allowed to autoplay.
#[derive(Default)]
pub struct MediaController {
    media: Vec<Tracked>,
    unmuted: bool,
}

impl MediaController {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self, handle: MediaHandle, unmute_volume: Option<f32>) {
        let attempt = handle.play();
        self.media.push(Tracked {
            handle,
            state: PlaybackState::Starting,
            attempt: Some(attempt),
            unmute_volume,
        });
    }

    pub fn add_video(&mut self, stream: Rc<dyn VideoStream>, unmute_volume: f32) {
        stream.set_muted(true);
        self.start(MediaHandle::Video(stream), Some(unmute_volume));
    }

    pub fn add_audio(&mut self, track: Rc<dyn AudioTrack>, volume: f32, looped: bool) {
        track.set_looping(looped);
        track.set_volume(volume);
        self.start(MediaHandle::Audio(track), None);
    }

    /// Collects the outcome of any `play()` calls that finished.
    pub fn poll(&mut self) {
        for tracked in &mut self.media {
            let Some(attempt) = tracked.attempt.as_mut() else {
                continue;
            };
            let Poll::Ready(result) = poll_now(attempt) else {
                continue;
            };
            tracked.attempt = None;
            let label = tracked.handle.label();
            tracked.state = match (result, tracked.state) {
                (Ok(()), _) => {
                    info!("Playing {label}");
                    PlaybackState::Playing
                }
                (Err(e), PlaybackState::Retrying) => {
                    warn!("{e}; giving up on {label}");
                    PlaybackState::GaveUp
                }
                (Err(e), _) => {
                    warn!("{e}; will retry on the next interaction");
                    PlaybackState::Blocked
                }
            };
        }
    }

    /// Called on every qualifying user gesture.
    pub fn on_interaction(&mut self) {
        let first = !self.unmuted;
        self.unmuted = true;

        for tracked in &mut self.media {
            let element = &tracked.handle;
            if first {
                if let Some(volume) = tracked.unmute_volume {
                    if element.is_muted() {
                        element.set_muted(false);
                        element.set_volume(volume);
                        info!("Unmuted {} at volume {volume}", element.label());
                    }
                }
            }
            if tracked.state == PlaybackState::Blocked {
                info!("Retrying playback of {}", element.label());
                tracked.attempt = Some(element.play());
                tracked.state = PlaybackState::Retrying;
            }
        }
    }

    pub fn states(&self) -> impl Iterator<Item = (&str, PlaybackState)> {
        self.media.iter().map(|t| (t.handle.label(), t.state))
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }
}
