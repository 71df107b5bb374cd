use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ModelSettings;
use crate::error::{PersonaError, Result};

/// Parse-once cache of model settings files. Entries never expire: a settings
/// file is assumed stable for the rest of the process once it has been
/// selected. Failures are not cached.
#[derive(Debug, Default)]
pub struct SettingsCache {
    entries: Mutex<HashMap<PathBuf, Arc<ModelSettings>>>,
    reads: AtomicUsize,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock is held across the read, so concurrent first lookups of one
    /// path read the file once.
    pub fn get_settings(&self, path: &Path) -> Result<Arc<ModelSettings>> {
        let mut entries = self.lock()?;
        if let Some(settings) = entries.get(path) {
            tracing::debug!("Settings cache hit for {}", path.display());
            return Ok(Arc::clone(settings));
        }

        let settings = Arc::new(self.read_and_validate(path)?);
        entries.insert(path.to_path_buf(), Arc::clone(&settings));
        Ok(settings)
    }

    /// Number of settings files read from disk so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_and_validate(&self, path: &Path) -> Result<ModelSettings> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let text = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map_err(|e| PersonaError::parse(path, format!("not valid UTF-8: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersonaError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        ModelSettings::parse(path, &text)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<ModelSettings>>>> {
        self.entries
            .lock()
            .map_err(|_| PersonaError::Config("settings cache lock poisoned".into()))
    }
}
