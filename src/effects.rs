//! Effect storage and the effect-file codec.
//!
//! An effect file is a text stream: the first line is a JSON metadata object
//! (`frame_delay_ms`, `light_count` and the color dictionary), every further
//! line encodes one frame row, optionally wrapped as `<count>r[<row>]` to
//! repeat whole frames. Rows are comma-separated dictionary indices with
//! `<count>x<index>` pixel runs.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

mod format;
pub use format::{encode, EffectMetadata};

mod reader;
pub use reader::EffectReader;

/// File extension of effect files, without the dot.
pub const EFFECT_EXTENSION: &str = "effect";

/// Errors raised while encoding or decoding an effect stream.
///
/// None of these are fatal to the light: the consumer abandons the effect
/// and falls back to static color.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid metadata line: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("malformed row: {0:?}")]
    Grammar(String),
    #[error("color index {index} outside dictionary of {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("effect file contains no frame rows")]
    EmptyBody,
}

/// Names of the effects available in a storage directory.
#[derive(Debug, Clone)]
pub struct EffectLibrary {
    base_path: PathBuf,
    names: Vec<String>,
}

impl EffectLibrary {
    /// Scan `path` for `*.effect` files. A missing or unreadable directory
    /// leaves the library empty; the light still works without effects.
    pub async fn scan(path: impl AsRef<Path>) -> Self {
        let base_path = path.as_ref().to_owned();
        let mut names = Vec::new();

        match fs::read_dir(&base_path).await {
            Ok(mut read_dir) => loop {
                match read_dir.next_entry().await {
                    Ok(None) => break,
                    Ok(Some(entry)) => {
                        let path = entry.path();
                        if path.extension().and_then(std::ffi::OsStr::to_str)
                            != Some(EFFECT_EXTENSION)
                        {
                            continue;
                        }

                        match path.file_stem().and_then(std::ffi::OsStr::to_str) {
                            Some(stem) => names.push(stem.to_owned()),
                            None => {
                                warn!(path = %path.display(), "skipping effect with unreadable name")
                            }
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "error reading effects directory");
                        break;
                    }
                }
            },
            Err(err) => {
                warn!(
                    path = %base_path.display(),
                    error = %err,
                    "effects directory unavailable"
                );
            }
        }

        names.sort();

        Self { base_path, names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    /// Path of the effect file for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}", name, EFFECT_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_missing_directory_is_empty() {
        let library = EffectLibrary::scan("/nonexistent/strandlight-effects").await;
        assert!(library.names().is_empty());
        assert!(!library.contains("rainbow"));
    }

    #[tokio::test]
    async fn test_scan_lists_effect_files() {
        let dir = std::env::temp_dir().join(format!("strandlight-scan-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("rainbow.effect"), b"{}").await.unwrap();
        tokio::fs::write(dir.join("sweep.effect"), b"{}").await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), b"").await.unwrap();

        let library = EffectLibrary::scan(&dir).await;

        assert_eq!(library.names(), ["rainbow", "sweep"]);
        assert!(library.contains("rainbow"));
        assert!(!library.contains("notes"));
        assert_eq!(library.path_for("sweep"), dir.join("sweep.effect"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
