//! # sdds
//!
//! Reading and writing **Self-Describing Data Sets** (SDDS), the file format
//! used across accelerator physics tooling for tabular, paged data.
//!
//! An SDDS file is a text header followed by pages of data. The header
//! names and types every field; each page then carries one value per
//! *parameter*, one n-dimensional block per *array*, and a table of rows
//! with one value per *column*. Data are stored as ASCII text or as binary
//! in either byte order, optionally gzip/xz/lzma compressed.
//!
//! ## Key features
//!
//! - **Both encodings** - ASCII and binary pages, big- and little-endian,
//!   row-major or column-major
//! - **Compressed files** - `.gz`, `.xz` and `.lzma` chosen by file name,
//!   with a pluggable codec registry
//! - **Incremental output** - `update_page` and append-to-page rewrite the
//!   row count in place while rows keep arriving
//! - **Appending** - add pages to, or rows to the last page of, an existing
//!   file under a lock sidecar
//! - **Selection** - columns and rows of interest with wildcard, range and
//!   string matching combined by logic modifiers
//! - **Recovery** - truncated pages come back as short pages on request
//!
//! ## Quick start
//!
//! ```no_run
//! use sdds::dataset::Dataset;
//! use sdds::layout::{ColumnDefinition, DataEncoding, ParameterDefinition};
//! use sdds::types::SddsType;
//! use std::path::Path;
//!
//! # fn main() -> sdds::error::Result<()> {
//! let path = Path::new("orbit.sdds");
//! let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, Some("orbit"), None, Some(path))?;
//! out.define_parameter(ParameterDefinition::new("Pass", SddsType::Int32))?;
//! out.define_column(ColumnDefinition::new("x", SddsType::Double).units("mm"))?;
//! out.write_layout()?;
//! for pass in 0..3 {
//!     out.start_page(4)?;
//!     out.set_parameter("Pass", pass)?;
//!     out.set_column("x", vec![0.1, 0.2, 0.3, 0.4])?;
//!     out.write_page()?;
//! }
//! out.terminate()?;
//!
//! let mut input = Dataset::initialize_input(Some(path))?;
//! while let Some(page) = input.read_page()? {
//!     let pass = input.get_parameter_as_i64("Pass")?;
//!     let x = input.get_column_in_doubles("x")?;
//!     println!("page {page} pass {pass}: {x:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core concepts
//!
//! ### Dataset
//!
//! A [`Dataset`] is bound to one file or standard stream and moves through
//! a small lifecycle: definitions are added, the layout is written, then
//! pages are started and written. Readers parse the header on open and
//! load one page per [`read_page`](Dataset::read_page) call.
//!
//! ### Layout
//!
//! The [`Layout`](layout::Layout) is the schema: definitions for parameters,
//! columns, arrays and associates, the description, and the data mode. Its
//! definition order is the on-disk order.
//!
//! ### Selection
//!
//! Columns and rows carry *of interest* flags. Writers only emit flagged
//! rows, and the columns flagged when the layout is written. See
//! [`selection::Logic`] for how successive selections combine.
//!
//! ## Errors
//!
//! Every fallible call returns [`error::Result`]. Errors also land on a
//! thread-local [`error_stack`] that command-line tools print on failure.
//! A write failure or an unrecoverable read leaves the dataset *inactive*;
//! later calls on it fail with [`ErrorKind::Inactive`](error::ErrorKind).
//!
//! ## Configuration
//!
//! Process-wide knobs (buffer size, compression levels, name validity,
//! error stack bound) live in [`config::LibraryConfig`]; per-dataset knobs
//! are methods on [`Dataset`].
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]: lifecycle events at `debug`, codec
//! detail at `trace`, recovered truncations at `warn`. No subscriber is
//! installed.

pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod error_stack;
pub mod format;
pub mod header;
pub mod io;
pub mod layout;
pub mod selection;
pub mod storage;
pub mod testing;
pub mod types;

pub use dataset::{Dataset, DefinitionKey, TransferMode};
pub use error::{ErrorKind, Result, SddsError};
pub use layout::{DataEncoding, Layout};
pub use selection::{ColumnSelector, FindType, Logic, NumScanMode};
pub use types::{SddsType, Value, ValueVec};
