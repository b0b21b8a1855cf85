use std::{collections::BTreeMap, fs, io, path::Path};

use log::debug;

use crate::{
    layout::{RepoLayout, DOCKERFILE, METADATA_FILE},
    metadata, Error, Result,
};

/// One buildable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Repo-relative key, e.g. `images/base`. Unique within one discovery.
    pub directory: String,
    pub image_name: String,
    pub version: Option<String>,
    pub platforms: Vec<String>,
    pub build_args: BTreeMap<String, String>,
}

impl ImageDescriptor {
    fn new(directory: String, dir_name: &str, metadata: metadata::ImageMetadata) -> Self {
        Self {
            image_name: metadata.image_name_or(dir_name).to_owned(),
            platforms: metadata.platforms_or_default(),
            directory,
            version: metadata.version,
            build_args: metadata.build_args,
        }
    }

    /// `KEY=VALUE` pairs, ordered by key.
    pub fn build_arg_pairs(&self) -> Vec<String> {
        metadata::build_arg_pairs(&self.build_args)
    }
}

/// Returns a descriptor for every directory below the images directory that contains both a
/// [`DOCKERFILE`] and a [`METADATA_FILE`], sorted by directory name. A missing images directory
/// yields no images. Any invalid metadata file fails the whole discovery.
pub fn discover(layout: &RepoLayout) -> Result<Vec<ImageDescriptor>> {
    let images_root = layout.images_root();
    if !images_root.is_dir() {
        debug!("no images directory at {images_root:?}");
        return Ok(Vec::new());
    }

    let read_dir_error = |source: io::Error| Error::ReadDir {
        path: images_root.clone(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in fs::read_dir(&images_root).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut images = Vec::with_capacity(dirs.len());
    for path in dirs {
        if !is_complete(&path) {
            debug!("skipping {path:?}, it needs both a {DOCKERFILE} and a {METADATA_FILE}");
            continue;
        }

        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return Err(Error::InvalidDirectoryName { path: path.clone() });
        };

        let metadata = metadata::load(&path.join(METADATA_FILE))?;
        let image = ImageDescriptor::new(layout.image_key(name), name, metadata);
        debug!("discovered {image:?}");
        images.push(image);
    }

    Ok(images)
}

fn is_complete(dir: &Path) -> bool {
    dir.join(DOCKERFILE).is_file() && dir.join(METADATA_FILE).is_file()
}
