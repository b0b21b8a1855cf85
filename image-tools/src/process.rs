use std::{ffi::OsStr, fmt, io, num::NonZeroI32, path::Path, process};

use log::debug;

pub struct Command(process::Command);

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self(process::Command::new(program))
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.0.current_dir(dir);
        self
    }

    #[cfg(test)]
    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> {
        self.0.get_args()
    }

    /// Runs the command with inherited stdio and returns its exit status, whatever it is.
    pub fn try_status(mut self) -> Result<ExitStatus, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("running `{command:?}`...", command = &self.0);
        }

        match self.0.status() {
            Ok(status) => Ok(ExitStatus(status)),
            Err(error) => Err(Error::spawn(self, error)),
        }
    }

    /// Runs the command with stdout and stderr discarded. Only the exit status is of interest.
    pub fn try_status_quiet(mut self) -> Result<ExitStatus, Error> {
        self.0
            .stdout(process::Stdio::null())
            .stderr(process::Stdio::null());
        self.try_status()
    }

    pub fn try_output(mut self) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}`...", command = &self.0);
        }

        match self.0.output() {
            Ok(output) => Ok(Output {
                command: self,
                output,
            }),
            Err(error) => Err(Error::spawn(self, error)),
        }
    }

    pub fn output(self) -> Result<Output, Error> {
        self.try_output().and_then(Output::require_success)
    }
}

#[derive(Debug)]
pub struct ExitStatus(process::ExitStatus);

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.0.success()
    }

    /// `None` when the process was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.0.code()
    }
}

#[derive(Debug)]
pub struct Output {
    pub command: Command,
    pub output: process::Output,
}

impl Output {
    pub fn require_success(self) -> Result<Output, Error> {
        let Output { command, output } = self;
        if output.status.success() {
            Ok(Output { command, output })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            Err(Error {
                command,
                kind: ErrorKind::NonZeroExitStatus(output.status.code().and_then(NonZeroI32::new)),
                stderr: (!stderr.is_empty()).then_some(stderr),
            })
        }
    }

    pub fn stdout_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output.stdout)
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Io(io::Error),
    NonZeroExitStatus(Option<NonZeroI32>),
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Io(value),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
    /// Trimmed stderr of a captured command that exited unsuccessfully.
    pub stderr: Option<String>,
}

impl Error {
    fn spawn(command: Command, error: io::Error) -> Self {
        Error {
            command,
            kind: error.into(),
            stderr: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to run `{command:?}`: ",
            command = &self.command.0
        )?;
        match &self.kind {
            ErrorKind::NotFound => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is required but not available on your system, please install it")?;
            }
            ErrorKind::PermissionDenied => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is available but does not have the right permissions, please make sure the binary is executable")?;
            }
            ErrorKind::Io(error) => {
                write!(f, "{error}")?;
            }
            ErrorKind::NonZeroExitStatus(code) => {
                if let Some(code) = code {
                    write!(f, "exited with non-zero exit code `{code}`")?;
                } else {
                    write!(f, "did not run succesfully")?;
                }
            }
        }
        if let Some(stderr) = &self.stderr {
            write!(f, "\n{stderr}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Creates a new [`Command`] and supplies the provided arguments, if any, while calling
/// [`std::convert::AsRef::as_ref`] on each.
macro_rules! command {
    ($program:expr $(,)?) => {
        $crate::process::Command::new($program)
    };
    ($program:expr, $($arg:expr),+ $(,)?) => {
        $crate::process::Command::new($program).args([
            $(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$arg),)+
        ])
    };
}

pub(crate) use command;
