//! Page codecs.
//!
//! [`binary`] and [`ascii`] turn a [`PageStore`](crate::storage::PageStore)
//! into bytes and back. Both report what they found with [`PageRead`]; the
//! [`PageFrame`] carries the offsets the dataset needs to revisit a page
//! (`goto_page`) or rewrite its row count (append-to-page, `update_page`).

pub mod ascii;
pub mod binary;

pub use ascii::AsciiCodec;
pub use binary::BinaryCodec;

/// Where a page lives in the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageFrame {
    /// Offset of the page's first byte.
    pub offset: u64,
    /// Offset of the row count, when the page has one.
    pub count_offset: Option<u64>,
    /// Rows the page declares.
    pub row_count: usize,
    /// Binary: the count uses the 64-bit form.
    pub wide: bool,
    /// ASCII: characters on the row-count line.
    pub count_width: usize,
}

/// Result of reading one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageRead {
    /// No more pages.
    End,
    Complete(PageFrame),
    /// Data ended inside the page; `rows` complete rows are in memory.
    Truncated { frame: PageFrame, rows: usize },
}
