use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use super::{LoadError, MeshDecoder, MeshDecoders};
use crate::scene::SceneNode;

#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Bytes read between progress events.
    pub chunk_size: usize,
    /// Codecs for compressed glTF primitives.
    pub decoders: MeshDecoders,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256 * 1024,
            decoders: MeshDecoders::default(),
        }
    }
}

impl LoaderConfig {
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Registers the decoder for a glTF compression extension.
    pub fn decoder(mut self, extension: impl Into<String>, decoder: impl MeshDecoder + 'static) -> Self {
        self.decoders = self.decoders.with(extension, decoder);
        self
    }
}

/// Messages from the loader thread, in order.
#[derive(Debug)]
pub enum LoadEvent {
    Started { total: Option<u64> },
    Progress { loaded: u64, total: Option<u64> },
    Completed(SceneNode),
    Failed(LoadError),
}

/// Bytes read so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn fraction(&self) -> Option<f32> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some(self.loaded as f32 / total as f32),
            None => None,
        }
    }
}

/// Result of polling a [`PendingLoad`].
#[derive(Debug)]
pub enum LoadStatus {
    Pending,
    /// The decoded model. Returned exactly once.
    Ready(SceneNode),
    /// The load failed. Returned exactly once.
    Failed(LoadError),
    /// The result has already been handed out.
    Consumed,
}

/// A model load in flight.
///
/// Poll once per frame from the thread that owns the scene.
pub struct PendingLoad {
    source: String,
    events: Option<Receiver<LoadEvent>>,
    progress: LoadProgress,
    started: bool,
}

impl PendingLoad {
    fn new(source: String, events: Receiver<LoadEvent>) -> Self {
        Self {
            source,
            events: Some(events),
            progress: LoadProgress::default(),
            started: false,
        }
    }

    /// A load that has already finished with `result`.
    pub fn resolved(result: Result<SceneNode, LoadError>) -> Self {
        let (tx, rx) = mpsc::channel();
        let source = match &result {
            Ok(node) => node.name.clone(),
            Err(_) => String::from("<failed>"),
        };
        let event = match result {
            Ok(node) => LoadEvent::Completed(node),
            Err(err) => LoadEvent::Failed(err),
        };
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(event);
        Self::new(source, rx)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn progress(&self) -> LoadProgress {
        self.progress
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_consumed(&self) -> bool {
        self.events.is_none()
    }

    /// Drains pending events and returns the outcome, if there is one yet.
    pub fn poll(&mut self) -> LoadStatus {
        let Some(events) = &self.events else {
            return LoadStatus::Consumed;
        };

        let status = loop {
            match events.try_recv() {
                Ok(LoadEvent::Started { total }) => {
                    self.started = true;
                    self.progress.total = total;
                    log::debug!("loading `{}` ({:?} bytes)", self.source, total);
                }
                Ok(LoadEvent::Progress { loaded, total }) => {
                    self.progress = LoadProgress { loaded, total };
                    if let Some(fraction) = self.progress.fraction() {
                        log::trace!("`{}` {:.0}% read", self.source, fraction * 100.0);
                    }
                }
                Ok(LoadEvent::Completed(node)) => break LoadStatus::Ready(node),
                Ok(LoadEvent::Failed(err)) => break LoadStatus::Failed(err),
                Err(TryRecvError::Empty) => return LoadStatus::Pending,
                Err(TryRecvError::Disconnected) => break LoadStatus::Failed(LoadError::LoaderGone),
            }
        };

        self.events = None;
        status
    }
}

/// Reads and decodes models off the main thread.
#[derive(Clone, Debug, Default)]
pub struct AssetLoader {
    config: LoaderConfig,
}

impl AssetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Starts loading `path` on a background thread.
    pub fn load(&self, path: impl AsRef<Path>) -> PendingLoad {
        let path = path.as_ref().to_path_buf();
        let source = path.display().to_string();

        if let Some(scheme) = remote_scheme(&source) {
            log::warn!("refusing to fetch `{source}` over {scheme}");
            return PendingLoad::resolved(Err(LoadError::UnsupportedScheme(source)));
        }

        let (tx, rx) = mpsc::channel();
        let chunk_size = self.config.chunk_size.max(1);
        let decoders = self.config.decoders.clone();

        let spawned = thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || run_load(&path, chunk_size, &decoders, &tx));

        match spawned {
            Ok(_) => PendingLoad::new(source, rx),
            Err(err) => PendingLoad::resolved(Err(LoadError::io(source, err))),
        }
    }
}

fn remote_scheme(source: &str) -> Option<&'static str> {
    let lower = source.to_ascii_lowercase();
    if lower.starts_with("https://") {
        Some("https")
    } else if lower.starts_with("http://") {
        Some("http")
    } else {
        None
    }
}

fn run_load(path: &Path, chunk_size: usize, decoders: &MeshDecoders, tx: &Sender<LoadEvent>) {
    let result = read_chunked(path, chunk_size, tx)
        .and_then(|bytes| super::decode_model(path, &bytes, decoders));

    let event = match result {
        Ok(node) => LoadEvent::Completed(node),
        Err(err) => LoadEvent::Failed(err),
    };
    // A closed channel means the viewer is gone; nothing left to report to.
    let _ = tx.send(event);
}

fn read_chunked(path: &Path, chunk_size: usize, tx: &Sender<LoadEvent>) -> Result<Vec<u8>, LoadError> {
    let mut file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let total = file.metadata().ok().map(|m| m.len());
    let _ = tx.send(LoadEvent::Started { total });

    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; chunk_size];
    loop {
        let read = file.read(&mut chunk).map_err(|e| LoadError::io(path, e))?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        let _ = tx.send(LoadEvent::Progress {
            loaded: bytes.len() as u64,
            total,
        });
    }

    Ok(bytes)
}
