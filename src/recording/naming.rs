use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Suffix source for names that are already taken
static COLLISION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Make a client id safe to embed in a file name.
///
/// ASCII alphanumerics, `-` and `_` pass through; everything else becomes `_`.
pub fn sanitize_client_id(client_id: &str) -> String {
    client_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `recording_<YYYYMMDD_HHMMSS>_<client_id>`
pub fn recording_stem(client_id: &str, at: DateTime<Local>) -> String {
    format!(
        "recording_{}_{}",
        at.format("%Y%m%d_%H%M%S"),
        sanitize_client_id(client_id)
    )
}

/// `temp_<client_id>`
pub fn scratch_stem(client_id: &str) -> String {
    format!("temp_{}", sanitize_client_id(client_id))
}

/// Create `<dir>/<stem>.<ext>` exclusively.
///
/// If that name exists, a `-<n>` suffix is added, `n` coming from a
/// process-wide counter, until an unused name is found.
pub fn create_unique(dir: &Path, stem: &str, ext: &str) -> io::Result<(File, PathBuf)> {
    let first = dir.join(format!("{}.{}", stem, ext));
    if let Some(file) = try_create(&first)? {
        return Ok((file, first));
    }

    loop {
        let n = COLLISION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let candidate = dir.join(format!("{}-{}.{}", stem, n, ext));
        debug!("{} taken, trying {}", first.display(), candidate.display());
        if let Some(file) = try_create(&candidate)? {
            return Ok((file, candidate));
        }
    }
}

fn try_create(path: &Path) -> io::Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e),
    }
}

/// A file that is deleted on drop unless kept.
///
/// Used for the transcode scratch file (never kept) and for output files
/// until they are completely written.
#[derive(Debug)]
pub struct FileGuard {
    path: PathBuf,
    keep: bool,
}

impl FileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm the guard and hand back the path
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
