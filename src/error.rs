//! Error taxonomy.
//!
//! Each subsystem gets its own `thiserror` enum rather than one crate-wide
//! error, mirroring how `forest_db::Error` stays local to `node/db` instead
//! of folding into a crate-wide type. Callers that just want `?` across
//! subsystem boundaries (the `demos/` binary) use `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

use crate::value::ValueType;

/// Errors from the multi-file descriptor pool.
#[derive(Debug, Error)]
pub enum MultiFileError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Returned by `access` when the physical file could not be opened on
    /// first use; every operation against this ticket refuses.
    #[error("file could not be opened, ticket is a sentinel")]
    SentinelTicket,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the virtual word-addressable stream over a file family.
#[derive(Debug, Error)]
pub enum D3BufferError {
    #[error("no files with the name {0:?} exist")]
    NoFilesFound(PathBuf),
    #[error("the d3plot files are broken (word size could not be determined)")]
    BrokenFiles,
    #[error(
        "read past the end of the file family: requested {requested} words at word {at}, \
         family holds {available} words"
    )]
    FileFamilyShort {
        requested: u64,
        at: u64,
        available: u64,
    },
    #[error(transparent)]
    MultiFile(#[from] MultiFileError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from opening and parsing a binout file family.
#[derive(Debug, Error)]
pub enum BinoutError {
    #[error("no files matched pattern `{0}`")]
    NoFilesFound(String),
    #[error(transparent)]
    MultiFile(#[from] MultiFileError),
    #[error("unsupported binout header in {file}: {reason}")]
    FormatReject { file: PathBuf, reason: String },
    #[error("the given variable has not been found")]
    PathNotFound,
    #[error("variable `{path}` has type {actual:?}, requested type {requested:?}")]
    TypeMismatch {
        path: String,
        actual: ValueType,
        requested: ValueType,
    },
    #[error(
        "timed variable `{path}` has inconsistent payload sizes or types across timesteps"
    )]
    InconsistentTimesteps { path: String },
    #[error("path `{0}` must be absolute and have at least 3 elements")]
    InvalidPath(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from decoding a d3plot file family.
#[derive(Debug, Error)]
pub enum D3plotError {
    #[error(transparent)]
    Buffer(#[from] D3BufferError),
    #[error("unsupported NDIM value {0} (only 3, 4, 5 and 7 are recognised)")]
    UnsupportedNdim(i64),
    #[error("unsupported MATTYP value {0}")]
    UnsupportedMattyp(i64),
    #[error("unsupported ICODE value {0} (expected 2 or 6)")]
    UnsupportedIcode(i64),
    #[error("material type re-mapping (IALEMAT != 0) is not supported")]
    UnsupportedIalemat,
    #[error("SPH data (NMSPH > 0) is not supported")]
    UnsupportedSph,
    #[error("particle data (NPEFG > 0) is not supported")]
    UnsupportedParticle,
    #[error("the EXTRA DATA TYPES family (NCFDV1 == 67108864) is not supported")]
    UnsupportedExtraDataTypes,
    #[error("invalid MAXINT value {0}")]
    InvalidMaxint(i64),
    #[error("positive NSORT ({0}) is not supported")]
    UnsupportedPositiveNsort(i64),
    #[error("read past the end of the state section")]
    TruncatedState,
}

/// Errors from parsing a key file deck.
#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("include file {0:?} not found")]
    IncludeNotFound(PathBuf),
    #[error("circular inclusion detected: {0:?}")]
    CircularInclude(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
