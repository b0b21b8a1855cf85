use std::io::{self, Write};

use serde::Serialize;

use crate::discovery::ImageDescriptor;

/// A GitHub Actions `strategy.matrix` with one `include` entry per image.
#[derive(Debug, Serialize)]
pub struct Matrix<'a> {
    pub include: Vec<Entry<'a>>,
}

/// Fields are declared in alphabetical order so the JSON keys come out sorted.
#[derive(Debug, Serialize)]
pub struct Entry<'a> {
    pub build_args: Vec<String>,
    pub dir: &'a str,
    pub image_name: &'a str,
    pub platforms: &'a [String],
    pub version: Option<&'a str>,
}

impl<'a> From<&'a ImageDescriptor> for Entry<'a> {
    fn from(image: &'a ImageDescriptor) -> Self {
        Entry {
            build_args: image.build_arg_pairs(),
            dir: &image.directory,
            image_name: &image.image_name,
            platforms: &image.platforms,
            version: image.version.as_deref(),
        }
    }
}

impl<'a> Matrix<'a> {
    pub fn new(images: &'a [ImageDescriptor]) -> Self {
        Matrix {
            include: images.iter().map(Entry::from).collect(),
        }
    }
}

/// Writes the matrix as pretty printed JSON followed by a newline.
pub fn write_json(mut out: impl Write, images: &[ImageDescriptor]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut out, &Matrix::new(images))?;
    writeln!(out)
}

/// Writes one `<dir> image=<name> version=<version>` line per image.
pub fn write_text(mut out: impl Write, images: &[ImageDescriptor]) -> io::Result<()> {
    for image in images {
        writeln!(
            out,
            "{dir} image={name} version={version}",
            dir = image.directory,
            name = image.image_name,
            version = image.version.as_deref().unwrap_or("-"),
        )?;
    }
    Ok(())
}
