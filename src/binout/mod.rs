//! Binout: a stream of tagged CD/DATA records, possibly split across a
//! family of files, presenting a virtual filesystem of named per-timestep
//! variables.

mod directory;
mod reader;
mod records;

pub use directory::{BinoutDirectory, Children, FileEntry, Folder};
pub use reader::{Binout, TimedSeries};
pub use records::{Command, Header};
