mod gltf_import;

pub use gltf_import::import_gltf;

use crate::scene::Node;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read glTF at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF at {path}: {source}")]
    ParseGltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF at {path} contains no scene")]
    NoScene { path: String },
    #[error("glTF at {path} has node {node} among its own ancestors")]
    CyclicHierarchy { path: String, node: usize },
    #[error("asset worker for {path} stopped before finishing")]
    WorkerLost { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: u64,
}

pub type LoadCallback = Box<dyn FnOnce(Result<Node, AssetError>)>;
pub type ProgressCallback = Box<dyn FnMut(LoadProgress)>;

pub struct LoadRequest {
    pub path: String,
    pub on_complete: LoadCallback,
    pub on_progress: Option<ProgressCallback>,
}

impl LoadRequest {
    pub fn new(path: impl Into<String>, on_complete: LoadCallback) -> Self {
        Self {
            path: path.into(),
            on_complete,
            on_progress: None,
        }
    }
}

/// Asynchronous asset source. Completion is never delivered from inside
/// `load` itself.
pub trait AssetLoader {
    fn load(&self, request: LoadRequest);
}

struct PendingLoad {
    path: String,
    on_complete: LoadCallback,
    on_progress: Option<ProgressCallback>,
}

enum WorkerMessage {
    Progress { ticket: u64, progress: LoadProgress },
    Done { ticket: u64, result: Result<Node, AssetError> },
}

pub type Importer = fn(&Path) -> Result<Node, AssetError>;

/// Parses glTF files on worker threads. Completions run on the thread that
/// calls [`GltfLoader::poll`].
pub struct GltfLoader {
    base_dir: PathBuf,
    importer: Importer,
    tx: flume::Sender<WorkerMessage>,
    rx: flume::Receiver<WorkerMessage>,
    next_ticket: Cell<u64>,
    pending: RefCell<HashMap<u64, PendingLoad>>,
}

impl GltfLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_importer(base_dir, import_gltf)
    }

    pub fn with_importer(base_dir: impl Into<PathBuf>, importer: Importer) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            base_dir: base_dir.into(),
            importer,
            tx,
            rx,
            next_ticket: Cell::new(0),
            pending: RefCell::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn in_flight(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Delivers finished loads. Returns the number of completions run.
    pub fn poll(&self) -> usize {
        let mut completed = 0;
        while let Ok(message) = self.rx.try_recv() {
            if self.dispatch(message) {
                completed += 1;
            }
        }
        completed
    }

    /// Blocks until every in-flight load has completed.
    pub fn wait_all(&self) -> usize {
        let mut completed = 0;
        while self.in_flight() > 0 {
            match self.rx.recv() {
                Ok(message) => {
                    if self.dispatch(message) {
                        completed += 1;
                    }
                }
                Err(_) => break,
            }
        }
        completed
    }

    fn dispatch(&self, message: WorkerMessage) -> bool {
        match message {
            WorkerMessage::Progress { ticket, progress } => {
                let callback = self
                    .pending
                    .borrow_mut()
                    .get_mut(&ticket)
                    .and_then(|p| p.on_progress.take());
                if let Some(mut on_progress) = callback {
                    on_progress(progress);
                    if let Some(pending) = self.pending.borrow_mut().get_mut(&ticket) {
                        pending.on_progress = Some(on_progress);
                    }
                }
                false
            }
            WorkerMessage::Done { ticket, result } => {
                let pending = self.pending.borrow_mut().remove(&ticket);
                match pending {
                    Some(pending) => {
                        log::debug!("Asset load finished: {}", pending.path);
                        (pending.on_complete)(result);
                        true
                    }
                    None => false,
                }
            }
        }
    }
}

impl AssetLoader for GltfLoader {
    fn load(&self, request: LoadRequest) {
        let ticket = self.next_ticket.get() + 1;
        self.next_ticket.set(ticket);
        let resolved = self.resolve(&request.path);
        log::info!("Loading asset {}", resolved.display());

        self.pending.borrow_mut().insert(
            ticket,
            PendingLoad {
                path: request.path,
                on_complete: request.on_complete,
                on_progress: request.on_progress,
            },
        );

        let tx = self.tx.clone();
        let importer = self.importer;
        let spawned = std::thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || {
                let total = std::fs::metadata(&resolved).map(|m| m.len()).unwrap_or(0);
                let _ = tx.send(WorkerMessage::Progress {
                    ticket,
                    progress: LoadProgress { loaded: 0, total },
                });
                // A panicking import must still resolve the ticket.
                let result = catch_unwind(AssertUnwindSafe(|| importer(&resolved)))
                    .unwrap_or_else(|_| {
                        log::error!("Asset worker panicked on {}", resolved.display());
                        Err(AssetError::WorkerLost {
                            path: resolved.display().to_string(),
                        })
                    });
                let _ = tx.send(WorkerMessage::Progress {
                    ticket,
                    progress: LoadProgress {
                        loaded: total,
                        total,
                    },
                });
                let _ = tx.send(WorkerMessage::Done { ticket, result });
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn asset worker: {e}");
            let path = self
                .pending
                .borrow()
                .get(&ticket)
                .map(|p| p.path.clone())
                .unwrap_or_default();
            let _ = self.tx.send(WorkerMessage::Done {
                ticket,
                result: Err(AssetError::WorkerLost { path }),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetError, AssetLoader, GltfLoader, LoadRequest};
    use crate::scene::Node;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    fn exploding_import(_: &Path) -> Result<Node, AssetError> {
        panic!("importer blew up");
    }

    #[test]
    fn completion_only_runs_on_poll() {
        let loader = GltfLoader::new(std::env::temp_dir());
        let outcome = Rc::new(RefCell::new(None));
        let sink = outcome.clone();
        loader.load(LoadRequest::new(
            "hero_viewer_missing_asset.gltf",
            Box::new(move |result| {
                *sink.borrow_mut() = Some(result.map(|node| node.name));
            }),
        ));
        assert!(outcome.borrow().is_none());
        assert_eq!(loader.in_flight(), 1);

        assert_eq!(loader.wait_all(), 1);
        assert_eq!(loader.in_flight(), 0);
        let result = outcome.borrow_mut().take().unwrap();
        assert!(matches!(result, Err(AssetError::Read { .. })));
    }

    #[test]
    fn progress_callback_sees_start_and_end() {
        let loader = GltfLoader::new(std::env::temp_dir());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut request = LoadRequest::new("hero_viewer_missing_asset_2.gltf", Box::new(|_| {}));
        request.on_progress = Some(Box::new(move |p| sink.borrow_mut().push(p)));
        loader.load(request);
        loader.wait_all();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn panicking_import_still_completes() {
        let loader = GltfLoader::with_importer(std::env::temp_dir(), exploding_import);
        let outcome = Rc::new(RefCell::new(None));
        let sink = outcome.clone();
        loader.load(LoadRequest::new(
            "scene.gltf",
            Box::new(move |result| {
                *sink.borrow_mut() = Some(result.map(|node| node.name));
            }),
        ));

        assert_eq!(loader.wait_all(), 1);
        assert_eq!(loader.in_flight(), 0);
        let result = outcome.borrow_mut().take().unwrap();
        assert!(matches!(result, Err(AssetError::WorkerLost { .. })), "{result:?}");
    }

    #[test]
    fn resolve_joins_relative_paths_only() {
        let loader = GltfLoader::new("/srv/site");
        assert_eq!(
            loader.resolve("./scene.gltf"),
            std::path::Path::new("/srv/site/./scene.gltf")
        );
        #[cfg(unix)]
        assert_eq!(
            loader.resolve("/abs/scene.gltf"),
            std::path::Path::new("/abs/scene.gltf")
        );
    }
}
