use std::{io, path::PathBuf};

use itertools::Itertools;

use crate::process;

/// Everything that can abort discovery, change resolution or a build before the build engine
/// takes over.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A build recipe or metadata file that `build-one` requires is absent.
    #[error("missing {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("missing metadata: {}", path.display())]
    MissingMetadata { path: PathBuf },

    #[error("failed reading {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed scanning {}: {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("image directory name is not valid UTF-8: {}", path.display())]
    InvalidDirectoryName { path: PathBuf },

    #[error("failed parsing {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unknown keys in {}: {}", path.display(), keys.iter().join(", "))]
    UnknownKeys { path: PathBuf, keys: Vec<String> },

    #[error("{}: {key} must be {expected}", path.display())]
    InvalidKey {
        path: PathBuf,
        key: &'static str,
        expected: &'static str,
    },

    #[error("failed writing output: {source}")]
    Write { source: io::Error },

    #[error(transparent)]
    Tool(#[from] process::Error),
}

impl Error {
    /// True for the errors that mean the metadata file exists but does not describe an image.
    #[cfg(test)]
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Error::UnknownKeys { .. } | Error::InvalidKey { .. })
    }
}
