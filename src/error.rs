//! Error types for encoding lookup, conversion and save.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Everything that can go wrong while converting or saving a document.
///
/// The `Display` output is what the user sees in the host's error dialog.
#[derive(Debug, Error)]
pub enum Error {
    /// The encoding label is unknown, or cannot be used for both directions.
    #[error("Encoding {label} is not supported.")]
    UnsupportedEncoding { label: String },

    /// The file's bytes are not valid in the assumed encoding.
    #[error("Errors occurred while converting {file} with {encoding} encoding")]
    DecodeFailure { file: String, encoding: &'static str },

    /// The buffer holds characters the target encoding cannot represent.
    #[error("{file} contains characters that cannot be saved as {encoding}")]
    EncodeFailure { file: String, encoding: &'static str },

    /// Reading, writing or stat-ing the backing file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The bare file name used in user-facing messages.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failure_names_file_and_encoding() {
        let err = Error::DecodeFailure {
            file: "notes.txt".to_string(),
            encoding: "GBK",
        };
        assert_eq!(
            err.to_string(),
            "Errors occurred while converting notes.txt with GBK encoding"
        );
    }

    #[test]
    fn display_name_uses_basename() {
        assert_eq!(display_name(Path::new("/tmp/a/b.txt")), "b.txt");
        assert_eq!(display_name(Path::new("/")), "/");
    }
}
