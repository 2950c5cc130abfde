//! Unified error handling for tdiff
//!
//! This module provides the error type shared by the argument validator,
//! the branch locator and the comparison driver. Every variant is reported
//! to the user as a single `Error: ...` line.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error from a lower layer (parsers, decoders)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for all tdiff operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Argument Errors ====================

    /// Data file does not exist or is not a regular file
    #[error("Data file \"{}\" not found", .0.display())]
    FileNotFound(PathBuf),

    /// Both arguments name the same file
    #[error("Data files must differ: \"{}\" given twice", .0.display())]
    SamePath(PathBuf),

    // ==================== Lookup Errors ====================

    /// The container could not be opened or its directory is unreadable
    #[error("Cannot open file \"{}\": {source}", path.display())]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// No tree of that name in the file
    #[error("TTree \"{tree}\" not found in {}", path.display())]
    TreeNotFound {
        tree: String,
        path: PathBuf,
    },

    /// Branch missing from the tree, or present with zero entries
    #[error("Branch \"{branch}\" does not exist or has 0 entries in {}", path.display())]
    BranchNotFoundOrEmpty {
        branch: String,
        path: PathBuf,
    },

    // ==================== Read Errors ====================

    /// An entry could not be read or decoded
    #[error("Cannot read entry {entry} from {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        entry: u64,
        #[source]
        source: BoxError,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a "cannot open" error from any lower-level error
    pub fn cannot_open(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Error::CannotOpen {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create a read error for the given entry
    pub fn read_failed(path: impl Into<PathBuf>, entry: u64, source: impl Into<BoxError>) -> Self {
        Error::ReadFailed {
            path: path.into(),
            entry,
            source: source.into(),
        }
    }
}
