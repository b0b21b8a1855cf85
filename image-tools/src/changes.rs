//! Selection of the images affected by the changes between two revisions.
//!
//! The rules, in order, first match wins:
//!
//! 1. no base revision, or the all-zeros base some CI triggers send: all images;
//! 2. base or head is not a known commit: all images;
//! 3. base and head have no common ancestor: all images;
//! 4. a shared tooling file changed (see [`layout::is_shared_tooling`]): all images;
//! 5. otherwise the images whose directory contains a changed file, sorted by directory.
//!
//! Rules 1 to 4 rebuild too much rather than too little. They are not errors.

use std::{collections::BTreeSet, fmt};

use log::debug;

use crate::{
    discovery::ImageDescriptor,
    git::RevisionHistory,
    layout::{self, RepoLayout},
    Result,
};

/// The head revision used when the caller does not name one.
pub const DEFAULT_HEAD: &str = "HEAD";

const MIN_ZERO_SHA_LEN: usize = 7;

/// Why every image was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    NoBase,
    UnknownRevision(String),
    UnrelatedHistories,
    SharedToolingChanged(String),
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::NoBase => write!(f, "no base revision to compare against"),
            Fallback::UnknownRevision(rev) => write!(f, "revision {rev:?} is not a known commit"),
            Fallback::UnrelatedHistories => write!(f, "base and head share no history"),
            Fallback::SharedToolingChanged(path) => write!(f, "shared tooling {path:?} changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All(Fallback),
    /// Keys of the affected image directories, see [`RepoLayout::image_key`].
    Directories(BTreeSet<String>),
}

/// Returns true for revisions made up of at least seven zeros, which CI systems send when there is
/// no previous commit.
pub fn is_all_zeros(rev: &str) -> bool {
    let rev = rev.trim();
    rev.len() >= MIN_ZERO_SHA_LEN && rev.bytes().all(|byte| byte == b'0')
}

/// Decides which images the changes between `base` and `head` affect.
pub fn select(
    layout: &RepoLayout,
    history: &dyn RevisionHistory,
    base: Option<&str>,
    head: &str,
) -> Result<Selection> {
    let Some(base) = base.filter(|base| !base.trim().is_empty() && !is_all_zeros(base)) else {
        return Ok(Selection::All(Fallback::NoBase));
    };

    for rev in [base, head] {
        if !history.commit_exists(rev)? {
            return Ok(Selection::All(Fallback::UnknownRevision(rev.to_owned())));
        }
    }

    if !history.has_merge_base(base, head)? {
        return Ok(Selection::All(Fallback::UnrelatedHistories));
    }

    let changed = history.changed_paths(base, head)?;

    if let Some(path) = changed.iter().find(|path| layout::is_shared_tooling(path)) {
        return Ok(Selection::All(Fallback::SharedToolingChanged(path.clone())));
    }

    Ok(Selection::Directories(
        changed
            .iter()
            .filter_map(|path| layout.image_key_of_path(path))
            .map(str::to_owned)
            .collect(),
    ))
}

/// Narrows `images` down to those affected by the changes between `base` and `head`.
pub fn changed_images(
    layout: &RepoLayout,
    history: &dyn RevisionHistory,
    images: Vec<ImageDescriptor>,
    base: Option<&str>,
    head: &str,
) -> Result<Vec<ImageDescriptor>> {
    match select(layout, history, base, head)? {
        Selection::All(reason) => {
            debug!("selecting all {} images: {reason}", images.len());
            Ok(images)
        }
        Selection::Directories(dirs) => {
            debug!("changed image directories: {dirs:?}");
            let mut images = images
                .into_iter()
                .filter(|image| dirs.contains(&image.directory))
                .collect::<Vec<_>>();
            images.sort_by(|a, b| a.directory.cmp(&b.directory));
            Ok(images)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::BTreeMap};

    use super::*;
    use crate::{process, Error};

    /// In-memory history that records the queries made against it.
    #[derive(Default)]
    struct FakeHistory {
        commits: Vec<&'static str>,
        unrelated: bool,
        changed: Vec<&'static str>,
        fail_diff: bool,
        queries: RefCell<Vec<String>>,
    }

    impl FakeHistory {
        fn with_changes(changed: &[&'static str]) -> Self {
            Self {
                commits: vec!["base", "HEAD"],
                changed: changed.to_vec(),
                ..Default::default()
            }
        }
    }

    impl RevisionHistory for FakeHistory {
        fn commit_exists(&self, rev: &str) -> Result<bool> {
            self.queries.borrow_mut().push(format!("exists {rev}"));
            Ok(self.commits.iter().any(|commit| *commit == rev))
        }

        fn has_merge_base(&self, base: &str, head: &str) -> Result<bool> {
            self.queries
                .borrow_mut()
                .push(format!("merge-base {base} {head}"));
            Ok(!self.unrelated)
        }

        fn changed_paths(&self, base: &str, head: &str) -> Result<Vec<String>> {
            self.queries.borrow_mut().push(format!("diff {base} {head}"));
            if self.fail_diff {
                // Spawning a program that does not exist gives a genuine tool failure.
                let error = process::Command::new("image-tools-missing-git")
                    .try_output()
                    .unwrap_err();
                return Err(Error::Tool(error));
            }
            Ok(self.changed.iter().map(|path| path.to_string()).collect())
        }
    }

    fn image(name: &str) -> ImageDescriptor {
        ImageDescriptor {
            directory: format!("images/{name}"),
            image_name: name.to_owned(),
            version: None,
            platforms: vec!["linux/amd64".to_owned(), "linux/arm64".to_owned()],
            build_args: BTreeMap::new(),
        }
    }

    fn images() -> Vec<ImageDescriptor> {
        vec![image("a"), image("b")]
    }

    fn resolve(history: &FakeHistory, base: Option<&str>) -> Vec<String> {
        changed_images(
            &RepoLayout::new("/repo"),
            history,
            images(),
            base,
            DEFAULT_HEAD,
        )
        .unwrap()
        .into_iter()
        .map(|image| image.directory)
        .collect()
    }

    #[test]
    fn all_zeros_detection() {
        assert!(is_all_zeros("0000000"));
        assert!(is_all_zeros(" 0000000000000000000000000000000000000000\n"));
        assert!(!is_all_zeros("000000"));
        assert!(!is_all_zeros("0000000a"));
        assert!(!is_all_zeros(""));
    }

    #[test]
    fn missing_or_zero_base_selects_everything_without_querying_git() {
        for base in [None, Some(""), Some("0000000")] {
            let history = FakeHistory::with_changes(&["README.md"]);
            assert_eq!(resolve(&history, base), ["images/a", "images/b"]);
            assert!(history.queries.borrow().is_empty());
        }
    }

    #[test]
    fn unknown_revisions_select_everything() {
        let history = FakeHistory::with_changes(&["README.md"]);
        assert_eq!(resolve(&history, Some("gone")), ["images/a", "images/b"]);

        let history = FakeHistory {
            commits: vec!["base"],
            ..FakeHistory::with_changes(&["README.md"])
        };
        assert_eq!(
            select(
                &RepoLayout::new("/repo"),
                &history,
                Some("base"),
                DEFAULT_HEAD
            )
            .unwrap(),
            Selection::All(Fallback::UnknownRevision("HEAD".to_owned()))
        );
    }

    #[test]
    fn unrelated_histories_select_everything() {
        let history = FakeHistory {
            unrelated: true,
            ..FakeHistory::with_changes(&["README.md"])
        };
        assert_eq!(resolve(&history, Some("base")), ["images/a", "images/b"]);
        assert!(!history
            .queries
            .borrow()
            .iter()
            .any(|query| query.starts_with("diff")));
    }

    #[test]
    fn shared_tooling_changes_select_everything() {
        for path in ["scripts/ci_matrix.py", "mise.toml"] {
            let history = FakeHistory::with_changes(&[path]);
            assert_eq!(resolve(&history, Some("base")), ["images/a", "images/b"]);
        }
    }

    #[test]
    fn changes_are_scoped_to_image_directories() {
        let history = FakeHistory::with_changes(&["images/a/Dockerfile"]);
        assert_eq!(resolve(&history, Some("base")), ["images/a"]);

        let history =
            FakeHistory::with_changes(&["images/b/image.toml", "images/a/src/main.sh", "README.md"]);
        assert_eq!(resolve(&history, Some("base")), ["images/a", "images/b"]);
    }

    #[test]
    fn unrelated_changes_select_nothing() {
        let history = FakeHistory::with_changes(&["README.md"]);
        assert!(resolve(&history, Some("base")).is_empty());

        let history = FakeHistory::with_changes(&[
            "scripts-foo",
            "images/README.md",
            "images/unknown/Dockerfile",
        ]);
        assert!(resolve(&history, Some("base")).is_empty());
    }

    #[test]
    fn selection_reports_the_affected_directories() {
        let history = FakeHistory::with_changes(&[
            "images/b/Dockerfile",
            "images/b/image.toml",
            "images/unknown/x",
        ]);
        assert_eq!(
            select(
                &RepoLayout::new("/repo"),
                &history,
                Some("base"),
                DEFAULT_HEAD
            )
            .unwrap(),
            Selection::Directories(
                ["images/b", "images/unknown"]
                    .map(str::to_owned)
                    .into_iter()
                    .collect()
            )
        );
        assert_eq!(
            history.queries.borrow().as_slice(),
            [
                "exists base",
                "exists HEAD",
                "merge-base base HEAD",
                "diff base HEAD"
            ]
        );
    }

    #[test]
    fn diff_failures_are_not_fallbacks() {
        let history = FakeHistory {
            fail_diff: true,
            ..FakeHistory::with_changes(&[])
        };
        let error = changed_images(
            &RepoLayout::new("/repo"),
            &history,
            images(),
            Some("base"),
            DEFAULT_HEAD,
        )
        .unwrap_err();
        assert!(matches!(error, Error::Tool(_)), "{error:?}");
    }
}
