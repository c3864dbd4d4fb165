//! Loads `.txt` and `.md` documents from a directory tree.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{KnowledgeError, Result};

/// File extensions picked up, in load order.
pub const EXTENSIONS: [&str; 2] = ["txt", "md"];

/// A source file's full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: PathBuf,
    pub content: String,
}

/// Load every `.txt` then every `.md` file under `dir`, recursively.
///
/// Paths are sorted within each extension so builds are reproducible.
/// Files that are not valid UTF-8 are decoded lossily.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(KnowledgeError::SourceMissing(dir.to_path_buf()));
    }

    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut documents = Vec::new();

    for ext in EXTENSIONS {
        let pattern = format!("{base}/**/*.{ext}");
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable path");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let before = documents.len();
        for path in paths {
            let bytes = std::fs::read(&path)?;
            documents.push(Document {
                content: decode(&path, bytes),
                source: path,
            });
        }
        info!(ext, count = documents.len() - before, "Loaded documents");
    }

    Ok(documents)
}

fn decode(path: &Path, bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), "File is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
