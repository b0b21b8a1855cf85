use std::process::ExitCode;

use clap::Parser;
use image_tools::cli::{self, BuildOneCli};

fn main() -> ExitCode {
    cli::init_logging();

    match BuildOneCli::parse().run() {
        // Exit codes outside of 0..=255 are truncated by the OS anyway.
        Ok(code) => ExitCode::from(code as u8),
        Err(error) => cli::report_error(&error),
    }
}
