use ignore::WalkBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::error::{PersonaError, Result};

#[derive(Debug, Clone)]
struct Listing {
    paths: Vec<PathBuf>,
    observed_mtime: SystemTime,
}

/// Caches the readable-file listing of settings directories, keyed by
/// directory and invalidated when the directory's modification time moves
/// past the one observed at scan time.
///
/// Only the directory's own mtime is consulted, so edits confined to a nested
/// subdirectory are not noticed until something changes at the top level.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    listings: Mutex<HashMap<PathBuf, Listing>>,
    scans: AtomicUsize,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted paths of every readable file under `directory`, recursively.
    /// A missing directory, or a path that is not a directory, yields an
    /// empty list.
    pub fn list_readable_files(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let current_mtime = match std::fs::metadata(directory) {
            Ok(meta) if meta.is_dir() => meta.modified()?,
            Ok(_) => {
                tracing::debug!("{} is not a directory", directory.display());
                return Ok(Vec::new());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut listings = self
            .listings
            .lock()
            .map_err(|_| PersonaError::Config("directory cache lock poisoned".into()))?;

        if let Some(listing) = listings.get(directory) {
            if current_mtime <= listing.observed_mtime {
                tracing::debug!("Directory listing cache hit for {}", directory.display());
                return Ok(listing.paths.clone());
            }
        }

        tracing::debug!("Scanning {}", directory.display());
        let paths = scan_readable(directory);
        self.scans.fetch_add(1, Ordering::SeqCst);

        listings.insert(
            directory.to_path_buf(),
            Listing {
                paths: paths.clone(),
                observed_mtime: current_mtime,
            },
        );
        Ok(paths)
    }

    /// Number of directory walks performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn invalidate(&self, directory: &Path) {
        if let Ok(mut listings) = self.listings.lock() {
            listings.remove(directory);
        }
    }
}

fn scan_readable(directory: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(directory)
        .standard_filters(false)
        .follow_links(true)
        .build();

    let mut paths: Vec<PathBuf> = walker
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| File::open(path).is_ok())
        .collect();

    paths.sort();
    paths
}
