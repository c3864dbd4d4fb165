//! Audio cache: where synthesized audio files are written.
//!
//! Layout: `<cache_dir>/<name>.<ext>`, shared by every session.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

const DEFAULT_NAME: &str = "temp";

#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for an artifact named `hint` (or `temp`) with extension `ext`.
    ///
    /// Creates the cache directory if needed. Concurrent callers are fine;
    /// they only collide if they pass the same hint.
    pub async fn path_for(&self, hint: Option<&str>, ext: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = hint.map(sanitize_name).unwrap_or_else(|| DEFAULT_NAME.to_string());
        Ok(self.dir.join(format!("{name}.{ext}")))
    }

    /// Generate a name that will not collide with other sessions.
    pub fn unique_hint() -> String {
        let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("tts_{ts}_{}", &id[..8])
    }

    /// Best-effort removal of a generated artifact. Never fails.
    pub fn remove(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed audio file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Audio file already gone");
            }
            Err(e) => error!(path = %path.display(), error = %e, "Failed to remove audio file"),
        }
    }
}

/// Keep hints inside the cache directory.
fn sanitize_name(hint: &str) -> String {
    let safe: String = hint
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if safe.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        safe
    }
}
