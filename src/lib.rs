//! Reader for LS-DYNA `binout`, `d3plot` and key file output.
//!
//! Three independent subsystems share the low-level building blocks in this
//! crate root: [`path_view`] (path tokenization shared by `binout` and
//! `key`), [`multi_file`] and [`d3_buffer`] (the virtual, thread-safe
//! multi-file byte/word stream underneath both `binout` and `d3plot`), and
//! [`line`]/[`card`] (the key file line and fixed-width field tokenizers).
//!
//! - [`binout::Binout`] opens a family of tagged-record files and exposes a
//!   virtual filesystem of typed, per-timestep variables.
//! - [`d3plot::D3plot`] opens a family of fixed-layout mesh/state dump files.
//! - [`key::KeyFile`] parses an ASCII `*KEYWORD` input deck, following
//!   `*INCLUDE` family keywords transitively.

pub mod binout;
pub mod card;
pub mod d3_buffer;
pub mod d3plot;
pub mod error;
pub mod key;
pub mod line;
pub mod multi_file;
pub mod path_view;
pub mod value;

pub use binout::Binout;
pub use d3plot::D3plot;
pub use key::KeyFile;
