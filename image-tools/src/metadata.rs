//! Loading and validation of the per-image `image.toml`.
//!
//! The document is parsed into an untyped [`toml::Table`] first and then projected field by field,
//! so that every deviation from the schema is reported against the key that caused it:
//!
//! | key          | type                   | default                          |
//! |--------------|------------------------|----------------------------------|
//! | `image`      | string                 | the image directory name         |
//! | `version`    | string                 | none                             |
//! | `platforms`  | array of strings       | [`DEFAULT_PLATFORMS`]            |
//! | `build_args` | table, string → string | empty                            |

use std::{collections::BTreeMap, fs, io, path::Path};

use itertools::Itertools;
use toml::{Table, Value};

use crate::{Error, Result};

pub const DEFAULT_PLATFORMS: [&str; 2] = ["linux/amd64", "linux/arm64"];

const KEY_IMAGE: &str = "image";
const KEY_VERSION: &str = "version";
const KEY_PLATFORMS: &str = "platforms";
const KEY_BUILD_ARGS: &str = "build_args";

const KNOWN_KEYS: [&str; 4] = [KEY_IMAGE, KEY_VERSION, KEY_PLATFORMS, KEY_BUILD_ARGS];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub image: Option<String>,
    pub version: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub build_args: BTreeMap<String, String>,
}

impl ImageMetadata {
    /// The image name, falling back to `dir_name` when it is missing or empty.
    pub fn image_name_or<'a>(&'a self, dir_name: &'a str) -> &'a str {
        self.image
            .as_deref()
            .filter(|image| !image.is_empty())
            .unwrap_or(dir_name)
    }

    /// The target platforms, falling back to [`DEFAULT_PLATFORMS`] when missing or empty.
    pub fn platforms_or_default(&self) -> Vec<String> {
        match self.platforms.as_deref() {
            Some(platforms) if !platforms.is_empty() => platforms.to_vec(),
            _ => DEFAULT_PLATFORMS.map(str::to_owned).to_vec(),
        }
    }

    /// Build arguments rendered as `KEY=VALUE`, ordered by key.
    pub fn build_arg_pairs(&self) -> Vec<String> {
        build_arg_pairs(&self.build_args)
    }
}

/// Renders build arguments as `KEY=VALUE`, in map order.
pub fn build_arg_pairs(build_args: &BTreeMap<String, String>) -> Vec<String> {
    build_args
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect()
}

/// Reads and validates the metadata file at `path`.
pub fn load(path: &Path) -> Result<ImageMetadata> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(Error::MissingMetadata {
                path: path.to_owned(),
            })
        }
        Err(source) => {
            return Err(Error::Read {
                path: path.to_owned(),
                source,
            })
        }
    };
    parse(path, &content)
}

/// Validates metadata `content`. `path` is only used in error messages.
pub fn parse(path: &Path, content: &str) -> Result<ImageMetadata> {
    let table = content
        .parse::<Table>()
        .map_err(|error| Error::Parse {
            path: path.to_owned(),
            message: describe_syntax_error(content, &error),
        })?;
    from_table(path, table)
}

/// Renders a TOML syntax error on one line, prefixed with the 1-based line and column it points at.
fn describe_syntax_error(content: &str, error: &toml::de::Error) -> String {
    let message = error.message().split_whitespace().join(" ");
    let Some(span) = error.span() else {
        return message;
    };
    let before = content.get(..span.start).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |last| last.chars().count()) + 1;
    format!("line {line}, column {column}: {message}")
}

fn from_table(path: &Path, mut table: Table) -> Result<ImageMetadata> {
    let mut unknown = table
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(Error::UnknownKeys {
            path: path.to_owned(),
            keys: unknown,
        });
    }

    let invalid = |key: &'static str, expected: &'static str| Error::InvalidKey {
        path: path.to_owned(),
        key,
        expected,
    };

    let image = table
        .remove(KEY_IMAGE)
        .map(|value| into_string(value).ok_or_else(|| invalid(KEY_IMAGE, "a string")))
        .transpose()?;

    let version = table
        .remove(KEY_VERSION)
        .map(|value| into_string(value).ok_or_else(|| invalid(KEY_VERSION, "a string")))
        .transpose()?;

    let platforms = table
        .remove(KEY_PLATFORMS)
        .map(|value| {
            into_string_array(value).ok_or_else(|| invalid(KEY_PLATFORMS, "an array of strings"))
        })
        .transpose()?;

    let build_args = table
        .remove(KEY_BUILD_ARGS)
        .map(|value| {
            into_string_table(value)
                .ok_or_else(|| invalid(KEY_BUILD_ARGS, "a table of string keys and values"))
        })
        .transpose()?
        .unwrap_or_default();

    Ok(ImageMetadata {
        image,
        version,
        platforms,
        build_args,
    })
}

fn into_string(value: Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value),
        _ => None,
    }
}

fn into_string_array(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(values) => values.into_iter().map(into_string).collect(),
        _ => None,
    }
}

fn into_string_table(value: Value) -> Option<BTreeMap<String, String>> {
    match value {
        Value::Table(table) => table
            .into_iter()
            .map(|(key, value)| into_string(value).map(|value| (key, value)))
            .collect(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(content: &str) -> Result<ImageMetadata> {
        parse(Path::new("images/test/image.toml"), content)
    }

    #[test]
    fn parses_all_known_keys() {
        let metadata = parse_str(
            r#"
            image = "custom"
            version = "1.2.3"
            platforms = ["linux/amd64"]

            [build_args]
            FOO = "bar"
            BAZ = "qux"
            "#,
        )
        .unwrap();

        assert_eq!(metadata.image.as_deref(), Some("custom"));
        assert_eq!(metadata.version.as_deref(), Some("1.2.3"));
        assert_eq!(metadata.platforms, Some(vec!["linux/amd64".to_owned()]));
        assert_eq!(metadata.build_arg_pairs(), ["BAZ=qux", "FOO=bar"]);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let metadata = parse_str("").unwrap();
        assert_eq!(metadata, ImageMetadata::default());
        assert_eq!(metadata.image_name_or("base"), "base");
        assert_eq!(
            metadata.platforms_or_default(),
            ["linux/amd64", "linux/arm64"]
        );
        assert!(metadata.build_arg_pairs().is_empty());
    }

    #[test]
    fn empty_image_and_platforms_fall_back_to_defaults() {
        let metadata = parse_str("image = \"\"\nplatforms = []").unwrap();
        assert_eq!(metadata.image_name_or("base"), "base");
        assert_eq!(
            metadata.platforms_or_default(),
            ["linux/amd64", "linux/arm64"]
        );
    }

    #[test]
    fn unknown_keys_are_rejected_and_listed_sorted() {
        let error = parse_str("zeta = 1\nimage = \"x\"\nalpha = true").unwrap_err();
        assert!(error.is_schema_violation());
        assert_eq!(
            error.to_string(),
            "unknown keys in images/test/image.toml: alpha, zeta"
        );
    }

    #[test]
    fn wrong_types_name_the_offending_key() {
        let cases = [
            ("image = 1", "image must be a string"),
            ("version = 1.0", "version must be a string"),
            ("platforms = \"linux/amd64\"", "platforms must be an array of strings"),
            ("platforms = [\"linux/amd64\", 1]", "platforms must be an array of strings"),
            ("build_args = [\"FOO=bar\"]", "build_args must be a table of string keys and values"),
            ("[build_args]\nFOO = 1", "build_args must be a table of string keys and values"),
        ];
        for (content, message) in cases {
            let error = parse_str(content).unwrap_err();
            assert!(
                matches!(error, Error::InvalidKey { .. }),
                "{content:?} produced {error:?}"
            );
            assert_eq!(
                error.to_string(),
                format!("images/test/image.toml: {message}")
            );
        }
    }

    #[test]
    fn syntax_errors_are_parse_failures() {
        let error = parse_str("image = ").unwrap_err();
        assert!(matches!(error, Error::Parse { .. }), "{error:?}");
        assert!(error
            .to_string()
            .starts_with("failed parsing images/test/image.toml: line 1, column "));
    }

    #[test]
    fn syntax_errors_point_at_the_offending_line_on_one_line() {
        let error = parse_str("image = \"x\"\nversion = \"1\"\nplatforms = [\n").unwrap_err();
        let message = error.to_string();
        assert!(
            message.starts_with("failed parsing images/test/image.toml: line "),
            "{message}"
        );
        assert!(!message.contains("line 1,"), "{message}");
        assert!(!message.contains('\n'), "{message}");
    }

    #[test]
    fn missing_file_is_distinct_from_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.toml");
        let error = load(&path).unwrap_err();
        assert!(matches!(error, Error::MissingMetadata { .. }), "{error:?}");
        assert!(!error.is_schema_violation());

        fs::write(&path, "version = \"2\"").unwrap();
        assert_eq!(load(&path).unwrap().version.as_deref(), Some("2"));
    }
}
