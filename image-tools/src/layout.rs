use std::path::{Path, PathBuf};

use constcat::concat;

/// The build recipe every image directory must contain.
pub const DOCKERFILE: &str = "Dockerfile";

/// The metadata file every image directory must contain.
pub const METADATA_FILE: &str = "image.toml";

/// Default name of the directory, relative to the repository root, holding one directory per image.
pub const IMAGES_DIR: &str = "images";

/// Toolchain pins shared by every image build.
pub const SHARED_CONFIG: &str = "mise.toml";

pub const SCRIPTS_DIR: &str = "scripts";

/// Paths starting with this prefix belong to the shared build scripts.
pub const SHARED_SCRIPTS_PREFIX: &str = concat!(SCRIPTS_DIR, "/");

/// Where things live in the monorepo. Threaded explicitly through every operation that touches the
/// filesystem or runs a tool, so nothing depends on the process working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    repo_root: PathBuf,
    images_dir: String,
}

impl RepoLayout {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            images_dir: IMAGES_DIR.to_owned(),
        }
    }

    /// Overrides the repo-relative, `/`-separated images directory.
    pub fn with_images_dir(mut self, images_dir: impl Into<String>) -> Self {
        self.images_dir = images_dir.into().trim_matches('/').to_owned();
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The images directory relative to the repository root, as it appears in git paths.
    pub fn images_dir(&self) -> &str {
        &self.images_dir
    }

    pub fn images_root(&self) -> PathBuf {
        self.repo_root.join(&self.images_dir)
    }

    pub fn image_dir(&self, name: &str) -> PathBuf {
        self.images_root().join(name)
    }

    /// The key identifying an image across discovery and change resolution, e.g. `images/base`.
    pub fn image_key(&self, name: &str) -> String {
        format!("{}/{name}", self.images_dir)
    }

    /// Maps a repo-relative path reported by git to the key of the image directory it lies in.
    /// Returns `None` for paths outside the images directory and for entries directly inside it.
    pub fn image_key_of_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path
            .strip_prefix(self.images_dir.as_str())?
            .strip_prefix('/')?;
        let name = rest.split('/').next()?;
        if name.is_empty() {
            return None;
        }
        Some(&path[..self.images_dir.len() + 1 + name.len()])
    }
}

/// True if a change to `path` can affect the build of every image.
pub fn is_shared_tooling(path: &str) -> bool {
    path == SHARED_CONFIG || path.starts_with(SHARED_SCRIPTS_PREFIX)
}
