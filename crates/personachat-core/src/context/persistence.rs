use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::ConfigStore;
use crate::context::transcript::{ConversationTurn, SessionSnapshot};
use crate::error::{PersonaError, Result};

/// One durable-persistence request. Each job fully replaces the history file.
#[derive(Debug, Clone)]
pub struct WriteJob {
    pub snapshot: SessionSnapshot,
}

enum WriterMessage {
    Write(WriteJob),
    Shutdown,
}

#[derive(Debug, Default)]
struct WriterStats {
    pending: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

/// Owns the current session snapshot and the single background thread that
/// writes it to the history file.
///
/// `save` updates memory and enqueues; it never waits on disk. `load` prefers
/// memory over the file, so it always reflects the latest `save` regardless
/// of how far the writer has got.
pub struct HistoryStore {
    history_file: PathBuf,
    current: Mutex<Option<SessionSnapshot>>,
    file_lock: Arc<Mutex<()>>,
    sender: Mutex<Option<Sender<WriterMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<WriterStats>,
}

impl HistoryStore {
    /// Start a store whose durable copy lives at `history_file`.
    pub fn new(history_file: impl Into<PathBuf>) -> Result<Self> {
        let history_file = history_file.into();
        let file_lock = Arc::new(Mutex::new(()));
        let stats = Arc::new(WriterStats::default());
        let (tx, rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("history-writer".into())
            .spawn({
                let path = history_file.clone();
                let file_lock = Arc::clone(&file_lock);
                let stats = Arc::clone(&stats);
                move || run_writer(&path, &file_lock, &stats, rx)
            })?;

        Ok(Self {
            history_file,
            current: Mutex::new(None),
            file_lock,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            stats,
        })
    }

    pub fn for_config(config: &ConfigStore) -> Result<Self> {
        Self::new(config.history_file())
    }

    pub fn history_file(&self) -> &Path {
        &self.history_file
    }

    /// Replace the in-memory snapshot and queue a durable write.
    ///
    /// The snapshot is updated even when queuing fails; the error tells the
    /// caller the file may lag behind.
    pub fn save(&self, preset_name: &str, history: Vec<ConversationTurn>) -> Result<()> {
        if preset_name.trim().is_empty() {
            return Err(PersonaError::Config("preset name must not be empty".into()));
        }
        let snapshot = SessionSnapshot::from_parts(preset_name, history);

        // Held across the enqueue so queue order matches snapshot order.
        let mut current = lock(&self.current);
        *current = Some(snapshot.clone());

        let result = match lock(&self.sender).as_ref() {
            Some(tx) => {
                self.stats.pending.fetch_add(1, Ordering::SeqCst);
                tx.send(WriterMessage::Write(WriteJob { snapshot })).map_err(|_| {
                    self.stats.pending.fetch_sub(1, Ordering::SeqCst);
                    PersonaError::Enqueue("history writer has stopped".into())
                })
            }
            None => Err(PersonaError::Enqueue("history store is shut down".into())),
        };
        drop(current);

        if let Err(ref e) = result {
            tracing::warn!("Conversation kept in memory only: {}", e);
        }
        result
    }

    pub fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.save(&snapshot.preset_name, snapshot.history.clone())
    }

    /// The latest snapshot, from memory if any `save` or successful `load`
    /// happened, otherwise from the history file. Failures read as "no
    /// previous session".
    pub fn load(&self) -> Option<SessionSnapshot> {
        if let Some(snapshot) = lock(&self.current).clone() {
            return Some(snapshot);
        }

        match self.read_durable() {
            Ok(Some(snapshot)) => {
                let mut current = lock(&self.current);
                // A save that raced this read is newer than the file.
                Some(current.get_or_insert(snapshot).clone())
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load conversation history: {}", e);
                None
            }
        }
    }

    /// Read the history file directly, bypassing the in-memory snapshot.
    /// A missing file is `Ok(None)`.
    pub fn read_durable(&self) -> Result<Option<SessionSnapshot>> {
        let _guard = lock(&self.file_lock);
        let contents = match fs::read_to_string(&self.history_file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| PersonaError::parse(&self.history_file, e.to_string()))
    }

    /// Jobs queued but not yet written.
    pub fn pending_writes(&self) -> usize {
        self.stats.pending.load(Ordering::SeqCst)
    }

    pub fn completed_writes(&self) -> usize {
        self.stats.completed.load(Ordering::SeqCst)
    }

    pub fn failed_writes(&self) -> usize {
        self.stats.failed.load(Ordering::SeqCst)
    }

    pub fn last_write_error(&self) -> Option<String> {
        lock(&self.stats.last_error).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.sender).is_some()
    }

    /// Stop accepting jobs, let the writer drain everything already queued,
    /// and join it. Safe to call more than once.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(tx) = lock(&self.sender).take() {
            // The receiver only disappears if the writer already exited.
            let _ = tx.send(WriterMessage::Shutdown);
        }

        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| PersonaError::Enqueue("history writer panicked".into()))?;
            tracing::debug!("History writer stopped");
        }
        Ok(())
    }
}

impl Drop for HistoryStore {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("History writer did not shut down cleanly: {}", e);
        }
    }
}

fn run_writer(
    path: &Path,
    file_lock: &Mutex<()>,
    stats: &WriterStats,
    rx: Receiver<WriterMessage>,
) {
    tracing::debug!("History writer started for {}", path.display());
    while let Ok(message) = rx.recv() {
        let job = match message {
            WriterMessage::Write(job) => job,
            WriterMessage::Shutdown => break,
        };

        match write_snapshot(path, file_lock, &job.snapshot) {
            Ok(()) => {
                stats.completed.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::error!(
                    "Failed to write conversation history to {}: {}",
                    path.display(),
                    e
                );
                stats.failed.fetch_add(1, Ordering::SeqCst);
                *lock(&stats.last_error) = Some(e.to_string());
            }
        }
        stats.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

fn write_snapshot(path: &Path, file_lock: &Mutex<()>, snapshot: &SessionSnapshot) -> Result<()> {
    let contents = serde_json::to_string_pretty(snapshot)?;

    let _guard = lock(file_lock);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_preset_rejected_without_mutation() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::new(temp.path().join("h.json")).unwrap();

        assert!(matches!(
            store.save("  ", vec![ConversationTurn::user("x")]),
            Err(PersonaError::Config(_))
        ));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_after_shutdown_keeps_memory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("h.json");
        let store = HistoryStore::new(&path).unwrap();
        store.shutdown().unwrap();
        assert!(!store.is_running());

        let err = store
            .save("p", vec![ConversationTurn::user("late")])
            .unwrap_err();
        assert!(matches!(err, PersonaError::Enqueue(_)));

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.history, vec![ConversationTurn::user("late")]);
        assert!(!path.exists());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::new(temp.path().join("h.json")).unwrap();
        store.shutdown().unwrap();
        store.shutdown().unwrap();
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("cfg").join("h.json");
        let store = HistoryStore::new(&path).unwrap();
        store.save("p", vec![ConversationTurn::user("q")]).unwrap();
        store.shutdown().unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(store.completed_writes(), 1);
        assert_eq!(store.pending_writes(), 0);
    }
}
