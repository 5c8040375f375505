//! Library-wide knobs.
//!
//! SDDS keeps a handful of settings that apply to every dataset opened
//! afterwards: the I/O buffer size, compression levels, how strictly names
//! are checked, and how many messages the error stack keeps. They live in a
//! [`LibraryConfig`] held per thread; the free functions below read and
//! change the current thread's copy.
//!
//! ```
//! use sdds::config::{self, NameValidity};
//!
//! let previous = config::set_default_io_buffer_size(65536);
//! assert_eq!(previous, 262144);
//! config::set_name_validity(NameValidity::AllowAny);
//! assert_eq!(config::current().io_buffer_size, 65536);
//! config::set(config::LibraryConfig::default());
//! ```

use crate::error::{IoContext, Result, SddsError};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;

thread_local! {
    static CONFIG: RefCell<LibraryConfig> = RefCell::new(LibraryConfig::default());
}

/// Rules applied to parameter, column and array names at definition time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameValidity {
    /// Letters, digits and `@:#+%-._$&/[]`, not starting with a digit,
    /// `.`, `+` or `-`.
    #[default]
    Strict,
    /// Any printable character except quotes, commas and whitespace.
    AllowV15,
    /// Anything non-empty without whitespace or quotes.
    AllowAny,
}

/// Settings shared by every dataset on the current thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Capacity of the buffer in front of each file stream.
    pub io_buffer_size: usize,
    /// Preset used for `.xz` and `.lzma` output (0-9).
    pub lzma_level: u32,
    /// Level used for `.gz` output (0-9).
    pub gzip_level: u32,
    pub name_validity: NameValidity,
    /// Soft bound on the number of stacked error messages.
    pub error_stack_limit: usize,
    /// Maximum nesting of `&include` namelists.
    pub max_include_depth: usize,
    /// Reject a first binary row count that is negative (usually a byte
    /// order mismatch).
    pub check_row_count_sanity: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            io_buffer_size: 262_144,
            lzma_level: 9,
            gzip_level: 6,
            name_validity: NameValidity::Strict,
            error_stack_limit: 100,
            max_include_depth: 16,
            check_row_count_sanity: true,
        }
    }
}

impl LibraryConfig {
    /// Load settings from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .io_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| SddsError::parse(format!("config {}: {e}", path.display())))
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Snapshot of the current thread's settings.
#[must_use]
pub fn current() -> LibraryConfig {
    CONFIG.with(|c| c.borrow().clone())
}

/// Replace the current thread's settings, returning the old ones.
pub fn set(config: LibraryConfig) -> LibraryConfig {
    CONFIG.with(|c| std::mem::replace(&mut *c.borrow_mut(), config))
}

/// Edit the current thread's settings in place.
pub fn update<F: FnOnce(&mut LibraryConfig)>(f: F) {
    CONFIG.with(|c| f(&mut c.borrow_mut()));
}

/// Set the default buffer size; zero restores the default. Returns the old value.
pub fn set_default_io_buffer_size(size: usize) -> usize {
    let size = if size == 0 {
        LibraryConfig::default().io_buffer_size
    } else {
        size
    };
    CONFIG.with(|c| std::mem::replace(&mut c.borrow_mut().io_buffer_size, size))
}

/// Set the xz/lzma preset, clamped to 0-9.
pub fn set_lzma_compression_level(level: u32) {
    update(|c| c.lzma_level = level.min(9));
}

#[must_use]
pub fn lzma_compression_level() -> u32 {
    CONFIG.with(|c| c.borrow().lzma_level)
}

pub fn set_name_validity(validity: NameValidity) {
    update(|c| c.name_validity = validity);
}

pub fn set_error_stack_limit(limit: usize) {
    update(|c| c.error_stack_limit = limit.max(1));
}
