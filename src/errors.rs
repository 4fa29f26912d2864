use std::{io, path::PathBuf};
use thiserror::Error;

/// Result type used throughout testagg.
pub type Result<T> = std::result::Result<T, Error>;

/// An error from testagg.
///
/// Only [Error::Definition] and [Error::Io] raised while loading the test
/// file abort a run. Every other variant is caught at the leaf (or group)
/// that produced it and reported as that test's output.
#[derive(Error, Debug)]
pub enum Error {
    /// A `{name}` reference that could not be resolved.
    #[error("{0}")]
    Substitution(String),

    /// An instruction string that does not tokenize into at least one word.
    #[error("malformed instruction: {0}")]
    MalformedInstruction(String),

    /// The process for a test could not be started.
    #[error("{program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A reference file that was required but not found.
    #[error("Ref file {} does not exist.", .0.display())]
    MissingReference(PathBuf),

    /// A group's directory could not be entered.
    #[error("cannot enter directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The test definition tree is malformed.
    #[error("{0}")]
    Definition(String),

    /// The worker task driving a process went away.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

// Helper method to collapse nested Results
pub trait RichResult<T, E> {
    fn collapse(self) -> std::result::Result<T, E>;
}

impl<T, E> RichResult<T, E>
    for std::result::Result<std::result::Result<T, E>, E>
{
    fn collapse(self) -> std::result::Result<T, E> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e),
        }
    }
}
