pub mod process;
pub(crate) mod version;

pub mod changes;
pub mod cli;
pub mod discovery;
pub mod docker;
pub mod error;
pub mod git;
pub mod layout;
pub mod matrix;
pub mod metadata;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
