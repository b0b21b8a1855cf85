use std::process::ExitCode;

use clap::Parser;
use image_tools::cli::{self, CiMatrixCli};

fn main() -> ExitCode {
    cli::init_logging();

    match CiMatrixCli::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => cli::report_error(&error),
    }
}
