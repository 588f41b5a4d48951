use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::oracle::OracleError;
use crate::parser::ParseError;

/// Errors that abort a delta debugging session.
#[derive(Debug, Error)]
pub enum Error {
    /// The input file violates the QDIMACS grammar.
    #[error("{}:{source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// Invalid option values, or an input that cannot be made compliant.
    #[error("{0}")]
    Config(String),

    /// The solver could not be run or behaved unexpectedly.
    #[error(transparent)]
    Oracle(OracleError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The user interrupted the session.
    #[error("interrupted")]
    Interrupted,
}

impl From<OracleError> for Error {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::Interrupted => Error::Interrupted,
            e => Error::Oracle(e),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
