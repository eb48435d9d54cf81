use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, TryRecvError};
use std::task::Poll;
use std::thread;

use tracing::debug;

use super::{decode_glb, AudioTrack, DecodeBackend, LoadProgress, LocalBoxFuture, ProgressFn, VideoStream};
use crate::error::AssetError;
use crate::model::MeshData;

const CHUNK_SIZE: usize = 256 * 1024;

enum Message {
    Progress(LoadProgress),
    Done(Result<MeshData, AssetError>),
}

/// Reads assets from a directory on disk.
///
/// Models are read and decoded on a worker thread; the returned future only
/// drains the worker's channel, so polling it never blocks the frame. There
/// is no video or audio decoder on native, those requests fail as
/// unsupported and the scene keeps going without them.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locators are web-style absolute paths relative to the asset root.
    pub fn resolve(&self, locator: &str) -> PathBuf {
        self.root.join(locator.trim_start_matches('/'))
    }
}

fn read_with_progress(path: &Path, locator: &str, tx: &mpsc::Sender<Message>) -> Result<Vec<u8>, AssetError> {
    let fetch_err = |e: std::io::Error| AssetError::Fetch { locator: locator.to_string(), reason: e.to_string() };

    let mut file = File::open(path).map_err(fetch_err)?;
    let total = file.metadata().ok().map(|m| m.len());
    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut chunk).map_err(fetch_err)?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        // The receiver may already be gone; progress is advisory.
        let _ = tx.send(Message::Progress(LoadProgress { loaded: bytes.len() as u64, total }));
    }
    Ok(bytes)
}

impl DecodeBackend for FileBackend {
    fn decode_mesh(&self, locator: &str, progress: Option<ProgressFn>) -> LocalBoxFuture<Result<MeshData, AssetError>> {
        let path = self.resolve(locator);
        let locator = locator.to_string();
        let (tx, rx) = mpsc::channel();

        {
            let locator = locator.clone();
            thread::spawn(move || {
                debug!("Reading {}", path.display());
                let result = read_with_progress(&path, &locator, &tx).and_then(|bytes| decode_glb(&locator, &bytes));
                let _ = tx.send(Message::Done(result));
            });
        }

        Box::pin(std::future::poll_fn(move |_| loop {
            match rx.try_recv() {
                Ok(Message::Progress(p)) => {
                    if let Some(progress) = &progress {
                        progress(p);
                    }
                }
                Ok(Message::Done(result)) => return Poll::Ready(result),
                Err(TryRecvError::Empty) => return Poll::Pending,
                Err(TryRecvError::Disconnected) => {
                    return Poll::Ready(Err(AssetError::Fetch {
                        locator: locator.clone(),
                        reason: "loader thread exited".to_string(),
                    }))
                }
            }
        }))
    }

    fn open_video(&self, locator: &str) -> Result<Rc<dyn VideoStream>, AssetError> {
        Err(AssetError::Unsupported { locator: locator.to_string(), kind: "video" })
    }

    fn decode_audio(&self, locator: &str) -> LocalBoxFuture<Result<Rc<dyn AudioTrack>, AssetError>> {
        let err = AssetError::Unsupported { locator: locator.to_string(), kind: "audio" };
        Box::pin(async move { Err(err) })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::*;
    use crate::assets::poll_now;

    fn wait<T>(mut future: LocalBoxFuture<T>) -> T {
        for _ in 0..500 {
            if let Poll::Ready(value) = poll_now(&mut future) {
                return value;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("future never resolved");
    }

    #[test]
    fn locators_resolve_under_the_root() {
        let backend = FileBackend::new("public");
        assert_eq!(backend.resolve("/models/thearc.glb"), PathBuf::from("public/models/thearc.glb"));
    }

    #[test]
    fn missing_files_are_fetch_errors() {
        let backend = FileBackend::new(std::env::temp_dir().join("walkthrough-missing-root"));
        let err = wait(backend.decode_mesh("/models/nope.glb", None)).unwrap_err();
        assert!(matches!(err, AssetError::Fetch { .. }), "got {err:?}");
    }

    #[test]
    fn unreadable_content_is_a_decode_error_after_progress() {
        let dir = std::env::temp_dir().join(format!("walkthrough-native-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("models")).unwrap();
        std::fs::write(dir.join("models/bad.glb"), b"not a model").unwrap();

        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let progress: ProgressFn = Rc::new(move |_| counter.set(counter.get() + 1));

        let backend = FileBackend::new(&dir);
        let err = wait(backend.decode_mesh("/models/bad.glb", Some(progress))).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }), "got {err:?}");
        assert!(seen.get() >= 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn media_is_unsupported_on_native() {
        let backend = FileBackend::new("public");
        assert!(matches!(
            backend.open_video("/videos/klcc.mp4"),
            Err(AssetError::Unsupported { kind: "video", .. })
        ));
        let err = wait(backend.decode_audio("/audio/about_you.m4a")).err();
        assert!(matches!(err, Some(AssetError::Unsupported { kind: "audio", .. })));
    }
}
