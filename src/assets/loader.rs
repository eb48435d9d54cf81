use std::collections::VecDeque;
use std::rc::Rc;
use std::task::Poll;

use tracing::{debug, error, info};

use super::{poll_now, AudioTrack, DecodeBackend, LoadProgress, LocalBoxFuture, VideoStream};
use crate::error::AssetError;
use crate::model::{AssetRequest, AudioRequest, MeshData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

/// A decoded model waiting to be spliced into the scene.
pub struct ReadyAsset {
    pub ticket: LoadTicket,
    pub request: AssetRequest,
    pub mesh: MeshData,
}

pub struct ReadyAudio {
    pub ticket: LoadTicket,
    pub request: AudioRequest,
    pub track: Rc<dyn AudioTrack>,
}

#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub ticket: LoadTicket,
    pub name: String,
    pub error: AssetError,
}

struct Pending<R, T> {
    ticket: LoadTicket,
    request: R,
    task: LocalBoxFuture<Result<T, AssetError>>,
}

type FailureHook = Box<dyn FnMut(&LoadFailure)>;

/// Non-blocking front end over a `DecodeBackend`.
///
/// Every load is a future owned by the loader. `pump` polls each one once;
/// finished loads land in a ready queue that the frame loop drains between
/// ticks, so nothing is ever spliced into the scene mid-render. Failed loads
/// are reported once and dropped; there are no retries.
pub struct AssetLoader {
    backend: Rc<dyn DecodeBackend>,
    meshes: Vec<Pending<AssetRequest, MeshData>>,
    audio: Vec<Pending<AudioRequest, Rc<dyn AudioTrack>>>,
    ready: VecDeque<ReadyAsset>,
    ready_audio: VecDeque<ReadyAudio>,
    failures: Vec<LoadFailure>,
    on_failure: Option<FailureHook>,
    next_ticket: u64,
}

impl AssetLoader {
    pub fn new(backend: Rc<dyn DecodeBackend>) -> Self {
        Self {
            backend,
            meshes: Vec::new(),
            audio: Vec::new(),
            ready: VecDeque::new(),
            ready_audio: VecDeque::new(),
            failures: Vec::new(),
            on_failure: None,
            next_ticket: 0,
        }
    }

    /// Extra side channel for failures, on top of the error log.
    pub fn set_failure_hook(&mut self, hook: impl FnMut(&LoadFailure) + 'static) {
        self.on_failure = Some(Box::new(hook));
    }

    fn ticket(&mut self) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    /// Starts loading a model and returns immediately.
    pub fn load(&mut self, request: AssetRequest) -> LoadTicket {
        let ticket = self.ticket();
        let name = request.name.clone();
        let progress = Rc::new(move |p: LoadProgress| match p.fraction() {
            Some(f) => debug!("Loading {name}: {:.2}%", f * 100.0),
            None => debug!("Loading {name}: {} bytes", p.loaded),
        });
        let task = self.backend.decode_mesh(&request.locator, Some(progress));
        self.meshes.push(Pending { ticket, request, task });
        ticket
    }

    pub fn load_audio(&mut self, request: AudioRequest) -> LoadTicket {
        let ticket = self.ticket();
        let task = self.backend.decode_audio(&request.path);
        self.audio.push(Pending { ticket, request, task });
        ticket
    }

    pub fn open_video(&self, locator: &str) -> Result<Rc<dyn VideoStream>, AssetError> {
        self.backend.open_video(locator)
    }

    /// Polls every in-flight load once.
    pub fn pump(&mut self) {
        let mut failed = Vec::new();

        self.meshes.retain_mut(|pending| match poll_now(&mut pending.task) {
            Poll::Pending => true,
            Poll::Ready(Ok(mesh)) => {
                info!("Model {} loaded ({} primitives)", pending.request.name, mesh.primitives.len());
                self.ready.push_back(ReadyAsset {
                    ticket: pending.ticket,
                    request: pending.request.clone(),
                    mesh,
                });
                false
            }
            Poll::Ready(Err(error)) => {
                failed.push(LoadFailure { ticket: pending.ticket, name: pending.request.name.clone(), error });
                false
            }
        });

        self.audio.retain_mut(|pending| match poll_now(&mut pending.task) {
            Poll::Pending => true,
            Poll::Ready(Ok(track)) => {
                info!("Audio {} loaded", pending.request.path);
                self.ready_audio.push_back(ReadyAudio {
                    ticket: pending.ticket,
                    request: pending.request.clone(),
                    track,
                });
                false
            }
            Poll::Ready(Err(error)) => {
                failed.push(LoadFailure { ticket: pending.ticket, name: pending.request.path.clone(), error });
                false
            }
        });

        for failure in failed {
            self.report(failure);
        }
    }

    /// Reports a failure that happened outside the loader's own tasks.
    pub fn report(&mut self, failure: LoadFailure) {
        error!("Failed to load {}: {}", failure.name, failure.error);
        if let Some(hook) = self.on_failure.as_mut() {
            hook(&failure);
        }
        self.failures.push(failure);
    }

    pub fn drain_ready(&mut self) -> impl Iterator<Item = ReadyAsset> + '_ {
        self.ready.drain(..)
    }

    pub fn drain_ready_audio(&mut self) -> impl Iterator<Item = ReadyAudio> + '_ {
        self.ready_audio.drain(..)
    }

    pub fn pending_count(&self) -> usize {
        self.meshes.len() + self.audio.len()
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted decode backend shared by loader and frame loop tests.
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::assets::{MediaElement, ProgressFn, VideoFrame};
    use crate::error::PlaybackError;
    use crate::model::{MaterialSlot, Primitive, Vertex};

    pub fn quad(material: &str) -> MeshData {
        let v = |x: f32, y: f32| Vertex { pos: [x, y, 0.0], normal: [0.0, 0.0, 1.0], uv: [x, y] };
        MeshData {
            primitives: vec![Primitive {
                node_name: Some("frame".to_string()),
                vertices: vec![v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)],
                indices: vec![0, 1, 2, 0, 2, 3],
                material: MaterialSlot { name: Some(material.to_string()), ..Default::default() },
            }],
            textures: Vec::new(),
        }
    }

    pub enum Script {
        Ready(MeshData),
        Fail,
        /// Stays pending until the shared flag is set.
        Gate(Rc<Cell<bool>>, MeshData),
    }

    pub struct FakeMedia {
        pub label: String,
        pub muted: Cell<bool>,
        pub volume: Cell<f32>,
        /// One entry per expected `play()` call; missing entries succeed.
        pub play_results: RefCell<Vec<Result<(), PlaybackError>>>,
        pub play_calls: Cell<usize>,
        pub size: Cell<Option<(u32, u32)>>,
        pub looping: Cell<bool>,
    }

    impl FakeMedia {
        pub fn new(label: &str) -> Rc<Self> {
            Rc::new(Self {
                label: label.to_string(),
                muted: Cell::new(true),
                volume: Cell::new(1.0),
                play_results: RefCell::new(Vec::new()),
                play_calls: Cell::new(0),
                size: Cell::new(None),
                looping: Cell::new(false),
            })
        }

        pub fn blocked(label: &str) -> PlaybackError {
            PlaybackError::Blocked { media: label.to_string(), reason: "NotAllowedError".to_string() }
        }
    }

    impl MediaElement for FakeMedia {
        fn label(&self) -> &str {
            &self.label
        }

        fn play(&self) -> LocalBoxFuture<Result<(), PlaybackError>> {
            self.play_calls.set(self.play_calls.get() + 1);
            let mut results = self.play_results.borrow_mut();
            let result = if results.is_empty() { Ok(()) } else { results.remove(0) };
            Box::pin(async move { result })
        }

        fn is_muted(&self) -> bool {
            self.muted.get()
        }

        fn set_muted(&self, muted: bool) {
            self.muted.set(muted);
        }

        fn set_volume(&self, volume: f32) {
            self.volume.set(volume);
        }
    }

    impl VideoStream for FakeMedia {
        fn intrinsic_size(&self) -> Option<(u32, u32)> {
            self.size.get()
        }

        fn current_frame(&self) -> Option<VideoFrame> {
            None
        }
    }

    impl AudioTrack for FakeMedia {
        fn set_looping(&self, looping: bool) {
            self.looping.set(looping);
        }
    }

    #[derive(Default)]
    pub struct ScriptedBackend {
        pub meshes: RefCell<HashMap<String, Script>>,
        pub videos: RefCell<HashMap<String, Rc<FakeMedia>>>,
        pub audio: RefCell<HashMap<String, Rc<FakeMedia>>>,
        pub progress_reports: Rc<Cell<usize>>,
    }

    impl ScriptedBackend {
        pub fn with_mesh(self, locator: &str, script: Script) -> Self {
            self.meshes.borrow_mut().insert(locator.to_string(), script);
            self
        }

        pub fn with_video(self, locator: &str, media: Rc<FakeMedia>) -> Self {
            self.videos.borrow_mut().insert(locator.to_string(), media);
            self
        }

        pub fn with_audio(self, locator: &str, media: Rc<FakeMedia>) -> Self {
            self.audio.borrow_mut().insert(locator.to_string(), media);
            self
        }
    }

    impl DecodeBackend for ScriptedBackend {
        fn decode_mesh(&self, locator: &str, progress: Option<ProgressFn>) -> LocalBoxFuture<Result<MeshData, AssetError>> {
            let locator = locator.to_string();
            let script = self.meshes.borrow_mut().remove(&locator);
            let reports = self.progress_reports.clone();
            Box::pin(std::future::poll_fn(move |_| {
                let result = match &script {
                    None | Some(Script::Fail) => Err(AssetError::Fetch {
                        locator: locator.clone(),
                        reason: "404 Not Found".to_string(),
                    }),
                    Some(Script::Ready(mesh)) => Ok(mesh.clone()),
                    Some(Script::Gate(open, mesh)) => {
                        if !open.get() {
                            return Poll::Pending;
                        }
                        Ok(mesh.clone())
                    }
                };
                if let Some(progress) = &progress {
                    reports.set(reports.get() + 1);
                    progress(LoadProgress { loaded: 1, total: Some(1) });
                }
                Poll::Ready(result)
            }))
        }

        fn open_video(&self, locator: &str) -> Result<Rc<dyn VideoStream>, AssetError> {
            match self.videos.borrow().get(locator) {
                Some(media) => Ok(media.clone()),
                None => Err(AssetError::Unsupported { locator: locator.to_string(), kind: "video" }),
            }
        }

        fn decode_audio(&self, locator: &str) -> LocalBoxFuture<Result<Rc<dyn AudioTrack>, AssetError>> {
            let found = self.audio.borrow().get(locator).cloned();
            let locator = locator.to_string();
            Box::pin(async move {
                match found {
                    Some(media) => Ok(media as Rc<dyn AudioTrack>),
                    None => Err(AssetError::Fetch { locator, reason: "404 Not Found".to_string() }),
                }
            })
        }
    }
}
