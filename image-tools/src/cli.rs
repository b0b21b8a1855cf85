use std::{io::IsTerminal, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};

use crate::{
    changes::{self, DEFAULT_HEAD},
    discovery,
    docker::{self, DEFAULT_TAG},
    git::Git,
    layout::{RepoLayout, IMAGES_DIR},
    matrix, version, Result,
};

/// Exit status for usage and configuration errors. Matches the one clap uses for usage errors.
pub const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Debug, Args)]
pub struct LayoutArgs {
    /// Root of the images monorepo.
    #[arg(long = "repo-root", global = true, env = "IMAGE_TOOLS_REPO_ROOT", default_value = ".")]
    repo_root: PathBuf,

    /// Directory holding one directory per image, relative to the repository root.
    #[arg(long = "images-dir", global = true, default_value = IMAGES_DIR)]
    images_dir: String,
}

impl LayoutArgs {
    fn layout(&self) -> RepoLayout {
        RepoLayout::new(&self.repo_root).with_images_dir(&self.images_dir)
    }
}

/// Build one image from images/<IMAGE> into the local image store as local/<IMAGE>:<TAG>.
#[derive(Debug, Parser)]
#[command(name = "build-one", version = version::VERSION)]
pub struct BuildOneCli {
    /// Name of the image directory, e.g. `kube-tools`.
    image: String,

    /// Tag of the built image.
    #[arg(default_value = DEFAULT_TAG)]
    tag: String,

    #[command(flatten)]
    layout: LayoutArgs,
}

impl BuildOneCli {
    /// Returns the exit code of the build engine.
    pub fn run(self) -> Result<i32> {
        let args = docker::BuildArgs::for_image(&self.layout.layout(), &self.image, &self.tag)?;
        docker::build(&args)
    }
}

/// Generate the GitHub Actions build matrix for the images directory.
#[derive(Debug, Parser)]
#[command(name = "ci-matrix", version = version::VERSION)]
pub struct CiMatrixCli {
    #[command(subcommand)]
    command: MatrixCommand,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Debug, Subcommand)]
enum MatrixCommand {
    /// Matrix for all images
    All(OutputArgs),

    /// Matrix for the images changed between two revisions (git diff)
    Changed {
        /// Base ref or SHA. Omitted or all zeros selects every image.
        #[arg(long = "base")]
        base: Option<String>,

        /// Head ref or SHA.
        #[arg(long = "head", default_value = DEFAULT_HEAD)]
        head: String,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Print the JSON matrix instead of one line per image
    #[arg(long = "json")]
    json: bool,
}

impl CiMatrixCli {
    pub fn run(self) -> Result<()> {
        let layout = self.layout.layout();
        let images = discovery::discover(&layout)?;

        let (images, output) = match self.command {
            MatrixCommand::All(output) => (images, output),
            MatrixCommand::Changed { base, head, output } => {
                let git = Git::new(layout.repo_root());
                let images =
                    changes::changed_images(&layout, &git, images, base.as_deref(), &head)?;
                (images, output)
            }
        };

        let stdout = std::io::stdout().lock();
        let written = if output.json {
            matrix::write_json(stdout, &images)
        } else {
            matrix::write_text(stdout, &images)
        };
        // A closed pipe on stdout is the reader's business.
        match written {
            Err(error) if error.kind() != std::io::ErrorKind::BrokenPipe => {
                Err(crate::Error::Write { source: error })
            }
            _ => Ok(()),
        }
    }
}

/// Sets up logging the same way for both binaries.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Prints `error: <message>` to stderr and returns the configuration error exit code.
pub fn report_error(error: &dyn std::error::Error) -> ExitCode {
    if std::io::stderr().is_terminal() {
        const BOLD_RED: &str = "\x1b[1;31m";
        const BOLD: &str = "\x1b[1m";
        const RESET: &str = "\x1b[0m";
        eprintln!("{BOLD_RED}error{RESET}{BOLD}:{RESET} {error}");
    } else {
        eprintln!("error: {error}");
    }
    ExitCode::from(EXIT_CONFIG_ERROR)
}
