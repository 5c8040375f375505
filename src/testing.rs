//! Test support for code that reads and writes SDDS files.
//!
//! - **Assertions**: float slice comparison and error-kind checks
//! - **Fixtures**: sample layouts and ready-made files in both encodings
//! - [`TestDir`]: a temporary directory that hands out file paths
//!
//! ```
//! use sdds::testing::{write_xy_file, TestDir, assert_f64_slices_close};
//! use sdds::dataset::Dataset;
//! use sdds::layout::DataEncoding;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = TestDir::new()?;
//! let path = dir.file("xy.sdds");
//! write_xy_file(&path, DataEncoding::Binary, &[(1.0, 2.0), (3.0, 4.0)])?;
//!
//! let mut input = Dataset::initialize_input(Some(&path))?;
//! input.read_page()?;
//! assert_f64_slices_close(&input.get_column_in_doubles("x")?, &[1.0, 3.0], 0.0);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory removed on drop.
#[derive(Debug)]
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Path of `name` inside the directory; the file is not created.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
