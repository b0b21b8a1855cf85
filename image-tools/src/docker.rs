use std::{collections::BTreeMap, ffi::OsString, path::PathBuf};

use log::info;

use crate::{
    layout::{RepoLayout, DOCKERFILE, METADATA_FILE},
    metadata, process, Error, Result,
};

/// Tag given to locally built images when none is requested.
pub const DEFAULT_TAG: &str = "dev";

/// Registry-less prefix of locally built images, see [`BuildArgs::image_tag`].
pub const LOCAL_REGISTRY: &str = "local";

/// A `docker buildx build` of one image directory into the local image store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    pub repo_root: PathBuf,
    pub image_dir: PathBuf,
    pub name: String,
    pub tag: String,
    pub build_args: BTreeMap<String, String>,
}

impl BuildArgs {
    /// Locates the image directory `name` and reads its build arguments from the metadata file.
    /// Both the [`DOCKERFILE`] and the [`METADATA_FILE`] must exist.
    pub fn for_image(layout: &RepoLayout, name: &str, tag: &str) -> Result<Self> {
        let image_dir = layout.image_dir(name);
        for file in [DOCKERFILE, METADATA_FILE] {
            let path = image_dir.join(file);
            if !path.is_file() {
                return Err(Error::MissingFile { path });
            }
        }

        let metadata = metadata::load(&image_dir.join(METADATA_FILE))?;

        Ok(Self {
            repo_root: layout.repo_root().to_owned(),
            image_dir,
            name: name.to_owned(),
            tag: tag.to_owned(),
            build_args: metadata.build_args,
        })
    }

    pub fn image_tag(&self) -> String {
        format!(
            "{LOCAL_REGISTRY}/{name}:{tag}",
            name = self.name,
            tag = self.tag
        )
    }

    /// The arguments passed to `docker`.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["buildx", "build", "--load", "-t"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(self.image_tag().into());
        for pair in metadata::build_arg_pairs(&self.build_args) {
            args.push("--build-arg".into());
            args.push(pair.into());
        }
        args.push(self.image_dir.clone().into_os_string());
        args
    }

    fn command(&self) -> process::Command {
        process::command!("docker")
            .current_dir(&self.repo_root)
            .args(self.to_args())
    }
}

/// Runs the build with inherited stdio and returns docker's exit code unchanged. A build killed by
/// a signal has no exit code and is reported as `1`.
pub fn build(args: &BuildArgs) -> Result<i32> {
    info!("building {tag} from {dir:?}", tag = args.image_tag(), dir = args.image_dir);
    let status = args.command().try_status()?;
    Ok(status.code().unwrap_or(1))
}
