use std::{io, path::PathBuf};

use thiserror::Error;

use crate::sorter::SorterState;

/// Result type local to spillsort.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The operation is not permitted in the current sorter state.
    /// The call was ignored and the sorter is unchanged.
    #[error("cannot {operation} while the sorter is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SorterState,
    },

    #[error("a spill is required but no temp directory has been configured")]
    TempDirectoryUnset,

    #[error("invalid sorter configuration: {0}")]
    InvalidConfig(String),

    #[error("unable to open run file {}: {source}", .path.display())]
    RunFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("spill io error: {0}")]
    Io(#[from] io::Error),

    #[error("record codec error: {0}")]
    Codec(String),

    /// An earlier failure aborted the current sort. Records may be missing,
    /// so nothing more is handed out until the sorter is reset or closed.
    #[error("the sort was aborted by an earlier error, reset the sorter to start over")]
    SortAborted,
}

impl Error {
    /// returns true for errors after which the sorter can still be used
    /// as if the failing call was never made.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }
}
