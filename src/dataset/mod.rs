//! The dataset handle and its page lifecycle.
//!
//! A [`Dataset`] is bound to one file (or a standard stream) and carries the
//! layout, the page in memory, the selection state and the I/O stream.
//! Writers move through
//!
//! ```text
//! Idle --define_*--> Defining --write_layout--> Ready --start_page--> InPage
//!                                                 ^                     |
//!                                                 +------write_page-----+
//! ```
//!
//! and readers start in `Ready` once the header is parsed, entering `InPage`
//! each time [`read_page`](Dataset::read_page) loads a page.
//!
//! ```no_run
//! use sdds::dataset::Dataset;
//! use sdds::layout::{ColumnDefinition, DataEncoding};
//! use sdds::types::SddsType;
//! use std::path::Path;
//!
//! # fn main() -> sdds::error::Result<()> {
//! let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, None, None, Some(Path::new("run.sdds")))?;
//! out.define_column(ColumnDefinition::new("x", SddsType::Double).units("mm"))?;
//! out.write_layout()?;
//! out.start_page(3)?;
//! out.set_column("x", vec![1.0, 2.0, 3.0])?;
//! out.write_page()?;
//! out.terminate()?;
//!
//! let mut input = Dataset::initialize_input(Some(Path::new("run.sdds")))?;
//! while let Some(page) = input.read_page()? {
//!     println!("page {page}: {:?}", input.get_column_in_doubles("x")?);
//! }
//! # Ok(())
//! # }
//! ```

mod copy;
mod define;
mod page;
mod select;

pub use define::{DefinitionKey, TransferMode};
pub use crate::storage::{ArrayValue, RowCountMode};

use crate::codec::{AsciiCodec, BinaryCodec, PageFrame, PageRead};
use crate::config;
use crate::error::{IoContext, Result, SddsError};
use crate::header::{read_header, write_header};
use crate::io::compression::is_compressed_path;
use crate::io::endian::ByteOrder;
use crate::io::lock::FileLock;
use crate::io::{SddsReader, SddsWriter};
use crate::layout::{DataEncoding, Layout};
use crate::storage::PageStore;
use std::path::{Path, PathBuf};

/// Lifecycle state of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Output opened, nothing defined yet.
    Idle,
    /// Definitions being added.
    Defining,
    /// Layout written or read; no page in progress.
    Ready,
    /// A page is being filled or has been read.
    InPage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Writer,
    Reader,
}

enum Stream {
    Closed,
    Reader(SddsReader),
    Writer(SddsWriter),
}

/// One SDDS file being read or written.
pub struct Dataset {
    layout: Layout,
    saved_layout: Option<Layout>,
    store: PageStore,
    state: State,
    role: Role,
    stream: Stream,
    path: Option<PathBuf>,
    layout_written: bool,
    inactive: Option<String>,
    /// Pages started (writers) or read (readers).
    page_number: usize,
    /// Frames of the pages a reader has seen, in order.
    pages: Vec<PageFrame>,
    data_start: u64,
    column_flags: Vec<bool>,
    /// Columns of interest in the order they were selected.
    column_order: Vec<usize>,
    /// Columns listed in the written header, frozen by `write_layout`.
    written_columns: Vec<usize>,
    auto_recover: bool,
    end_after_recovery: bool,
    recovery_possible: bool,
    update_interval: usize,
    /// Writers: the page in progress once part of it is on disk.
    current_frame: Option<PageFrame>,
    lock: Option<FileLock>,
    fsync: bool,
    /// Stream offset saved by `disconnect`.
    resume_at: u64,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("page", &self.page_number)
            .field("rows", &self.store.n_rows)
            .field("inactive", &self.inactive)
            .finish_non_exhaustive()
    }
}

struct Existing {
    layout: Layout,
    pages: Vec<PageFrame>,
    store: PageStore,
    data_start: u64,
    end: u64,
}

fn binary_codec(layout: &Layout) -> BinaryCodec {
    BinaryCodec::new(layout.data_mode.effective_byte_order())
        .with_sanity_check(config::current().check_row_count_sanity)
}

fn read_one(reader: &mut SddsReader, layout: &Layout, store: &mut PageStore) -> Result<PageRead> {
    match layout.data_mode.encoding {
        DataEncoding::Binary => binary_codec(layout).read_page(reader, layout, store),
        DataEncoding::Ascii => AsciiCodec::new(layout).read_page(reader, store),
    }
}

/// Read every page of an existing file, keeping the last one in memory.
fn scan_existing(path: &Path) -> Result<Existing> {
    let mut reader = SddsReader::open(path)?;
    let layout = read_header(&mut reader)?;
    let data_start = reader.position();
    let mut store = PageStore::for_layout(&layout);
    let mut pages = Vec::new();
    loop {
        match read_one(&mut reader, &layout, &mut store)? {
            PageRead::End => break,
            PageRead::Complete(frame) => pages.push(frame),
            PageRead::Truncated { rows, .. } => {
                return Err(SddsError::unsupported(format!(
                    "cannot append to {}: page {} is truncated after {rows} rows",
                    path.display(),
                    pages.len() + 1
                )));
            }
        }
    }
    Ok(Existing {
        layout,
        pages,
        store,
        data_start,
        end: reader.position(),
    })
}

fn rewrite_at(writer: &mut SddsWriter, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    writer.seek_to(offset)?;
    writer.write_all(bytes)?;
    writer.seek_end()?;
    writer.flush()
}

impl Dataset {
    fn blank(role: Role, layout: Layout, stream: Stream, path: Option<&Path>) -> Self {
        let columns = layout.columns.len();
        Self {
            store: PageStore::for_layout(&layout),
            layout,
            saved_layout: None,
            state: State::Idle,
            role,
            stream,
            path: path.map(Path::to_path_buf),
            layout_written: false,
            inactive: None,
            page_number: 0,
            pages: Vec::new(),
            data_start: 0,
            column_flags: vec![true; columns],
            column_order: (0..columns).collect(),
            written_columns: (0..columns).collect(),
            auto_recover: false,
            end_after_recovery: false,
            recovery_possible: false,
            update_interval: 0,
            current_frame: None,
            lock: None,
            fsync: false,
            resume_at: 0,
        }
    }

    /// Open a new output file, or stdout when `path` is `None`.
    ///
    /// Binary output defaults to column-major order and the host byte order.
    pub fn initialize_output(
        encoding: DataEncoding,
        lines_per_row: i32,
        description: Option<&str>,
        contents: Option<&str>,
        path: Option<&Path>,
    ) -> Result<Self> {
        let writer = match path {
            Some(p) => SddsWriter::create(p)?,
            None => SddsWriter::stdout(),
        };
        let mut layout = Layout::new();
        layout.description.text = description.map(str::to_string);
        layout.description.contents = contents.map(str::to_string);
        layout.data_mode.encoding = encoding;
        layout.data_mode.lines_per_row = lines_per_row.max(1);
        layout.data_mode.column_major = encoding == DataEncoding::Binary;
        tracing::debug!(
            path = %path.map_or_else(|| "<stdout>".to_string(), |p| p.display().to_string()),
            mode = encoding.name(),
            "initialized output"
        );
        Ok(Self::blank(Role::Writer, layout, Stream::Writer(writer), path))
    }

    /// Open a file for reading, or stdin when `path` is `None`.
    pub fn initialize_input(path: Option<&Path>) -> Result<Self> {
        let mut reader = match path {
            Some(p) => SddsReader::open(p)?,
            None => SddsReader::stdin(),
        };
        let layout = read_header(&mut reader)?;
        let data_start = reader.position();
        let mut dataset = Self::blank(Role::Reader, layout, Stream::Reader(reader), path);
        dataset.layout_written = true;
        dataset.state = State::Ready;
        dataset.data_start = data_start;
        Ok(dataset)
    }

    /// Open an existing file to add pages after its last one.
    pub fn initialize_append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let lock = FileLock::acquire(path)?;
        let existing = scan_existing(path)?;
        let writer = Self::reopen_at_end(path, existing.end)?;
        let pages = existing.pages.len();
        let mut dataset = Self::blank(Role::Writer, existing.layout, Stream::Writer(writer), Some(path));
        dataset.layout_written = true;
        dataset.state = State::Ready;
        dataset.page_number = pages;
        dataset.data_start = existing.data_start;
        dataset.lock = Some(lock);
        tracing::debug!(path = %path.display(), pages, offset = existing.end, "appending pages");
        Ok(dataset)
    }

    /// Open an existing file to add rows to its last page.
    ///
    /// Rows continue at the last page's row count. Every `update_interval`
    /// rows set with [`set_row_values`](Self::set_row_values) are flushed
    /// and the row count is rewritten; `0` defers that to `write_page`.
    pub fn initialize_append_to_page(path: impl AsRef<Path>, update_interval: usize) -> Result<Self> {
        let path = path.as_ref();
        let lock = FileLock::acquire(path)?;
        let existing = scan_existing(path)?;
        let Some(frame) = existing.pages.last().copied() else {
            drop(lock);
            let mut dataset = Self::initialize_append(path)?;
            dataset.update_interval = update_interval;
            return Ok(dataset);
        };
        let mode = &existing.layout.data_mode;
        if mode.encoding == DataEncoding::Binary && mode.column_major && existing.layout.columns.len() > 1 {
            return Err(SddsError::unsupported(format!(
                "{}: column-major pages with several columns cannot be extended in place",
                path.display()
            )));
        }
        if frame.count_offset.is_none() {
            return Err(SddsError::unsupported(format!(
                "{}: pages without row counts cannot be extended in place",
                path.display()
            )));
        }
        if is_compressed_path(path) {
            return Err(SddsError::unsupported(format!(
                "{}: compressed files cannot be extended in place",
                path.display()
            )));
        }
        let writer = Self::reopen_at_end(path, existing.end)?;
        let pages = existing.pages.len();
        let mut dataset = Self::blank(Role::Writer, existing.layout, Stream::Writer(writer), Some(path));
        dataset.store = existing.store;
        for column in &mut dataset.store.columns {
            column.zero_fill();
        }
        dataset.store.row_flags.iter_mut().for_each(|f| *f = true);
        dataset.store.n_rows = 0;
        dataset.store.rows_flushed_in_mem = 0;
        dataset.store.first_row_in_mem = frame.row_count;
        dataset.store.n_rows_written = frame.row_count;
        dataset.layout_written = true;
        dataset.state = State::InPage;
        dataset.page_number = pages;
        dataset.data_start = existing.data_start;
        dataset.current_frame = Some(frame);
        dataset.update_interval = update_interval;
        dataset.lock = Some(lock);
        tracing::debug!(
            path = %path.display(),
            page = pages,
            rows = frame.row_count,
            update_interval,
            "appending to last page"
        );
        Ok(dataset)
    }

    fn reopen_at_end(path: &Path, end: u64) -> Result<SddsWriter> {
        let mut writer = SddsWriter::reopen_append(path, end)?;
        if writer.is_seekable() && writer.position() != end {
            writer
                .truncate(end)
                .io_context(|| format!("trim trailing bytes of {}", path.display()))?;
        }
        Ok(writer)
    }

    // ----- state helpers -----

    fn check_active(&self) -> Result<()> {
        match &self.inactive {
            Some(why) => Err(SddsError::inactive(why.clone())),
            None => Ok(()),
        }
    }

    /// Record a fatal error: the dataset becomes inactive and its stream closes.
    fn fail<T>(&mut self, error: SddsError) -> Result<T> {
        tracing::debug!(error = %error, "dataset invalidated");
        self.inactive = Some(error.to_string());
        self.stream = Stream::Closed;
        Err(error)
    }

    fn require_writer(&self, operation: &str) -> Result<()> {
        self.check_active()?;
        if self.role == Role::Writer {
            Ok(())
        } else {
            Err(SddsError::protocol(format!("{operation} needs an output dataset")))
        }
    }

    fn require_reader(&self, operation: &str) -> Result<()> {
        self.check_active()?;
        if self.role == Role::Reader {
            Ok(())
        } else {
            Err(SddsError::protocol(format!("{operation} needs an input dataset")))
        }
    }

    fn require_page(&self, operation: &str) -> Result<()> {
        self.check_active()?;
        if self.state == State::InPage {
            Ok(())
        } else {
            Err(SddsError::protocol(format!("{operation} called outside a page")))
        }
    }

    fn ensure_layout_editable(&self, operation: &str) -> Result<()> {
        self.check_active()?;
        if self.layout_written {
            Err(SddsError::schema(format!(
                "{operation}: the layout is already written"
            )))
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        let result = match &mut self.stream {
            Stream::Writer(w) => w.write_all(bytes).io_context(|| "write page"),
            _ => Err(SddsError::protocol("the dataset is disconnected")),
        };
        result.or_else(|e| self.fail(e))
    }

    fn flush_stream(&mut self) -> Result<()> {
        let result = match &mut self.stream {
            Stream::Writer(w) => w.flush().io_context(|| "flush page"),
            _ => Ok(()),
        };
        result.or_else(|e| self.fail(e))
    }

    fn writer_position(&self) -> Result<u64> {
        match &self.stream {
            Stream::Writer(w) => Ok(w.position()),
            _ => Err(SddsError::protocol("the dataset is disconnected")),
        }
    }

    // ----- accessors -----

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Pages started by a writer or read by a reader.
    #[must_use]
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inactive.is_none()
    }

    #[must_use]
    pub fn layout_written(&self) -> bool {
        self.layout_written
    }

    // ----- per-dataset settings -----

    /// Return truncated pages as short pages instead of failing.
    pub fn set_auto_read_recovery(&mut self, enabled: bool) {
        self.auto_recover = enabled;
    }

    /// True when the last read hit a truncated page.
    #[must_use]
    pub fn read_recovery_possible(&self) -> bool {
        self.recovery_possible
    }

    /// Sync plain output files to disk on every page.
    pub fn set_fsync(&mut self, enabled: bool) {
        self.fsync = enabled;
        if let Stream::Writer(w) = &mut self.stream {
            w.set_fsync(enabled);
        }
    }

    pub fn set_row_count_mode(&mut self, mode: RowCountMode) -> Result<()> {
        self.ensure_layout_editable("set_row_count_mode")?;
        let data_mode = &mut self.layout.data_mode;
        match mode {
            RowCountMode::Variable => {
                data_mode.fixed_row_count = false;
                data_mode.no_row_counts = false;
            }
            RowCountMode::Fixed => {
                data_mode.fixed_row_count = true;
                data_mode.no_row_counts = false;
            }
            RowCountMode::None => {
                if data_mode.encoding == DataEncoding::Binary {
                    return Err(SddsError::unsupported("binary data always carries row counts"));
                }
                data_mode.fixed_row_count = false;
                data_mode.no_row_counts = true;
            }
        }
        Ok(())
    }

    pub fn set_data_mode(&mut self, encoding: DataEncoding) -> Result<()> {
        self.ensure_layout_editable("set_data_mode")?;
        let data_mode = &mut self.layout.data_mode;
        if encoding == DataEncoding::Binary && data_mode.no_row_counts {
            return Err(SddsError::unsupported("binary data always carries row counts"));
        }
        if data_mode.encoding != encoding {
            data_mode.column_major = encoding == DataEncoding::Binary;
        }
        data_mode.encoding = encoding;
        Ok(())
    }

    /// Choose column-major (default) or row-major binary pages.
    pub fn set_column_major_order(&mut self, column_major: bool) -> Result<()> {
        self.ensure_layout_editable("set_column_major_order")?;
        self.layout.data_mode.column_major = column_major;
        Ok(())
    }

    /// Byte order of binary output.
    pub fn set_byte_order(&mut self, order: ByteOrder) -> Result<()> {
        self.ensure_layout_editable("set_byte_order")?;
        self.layout.data_mode.byte_order = Some(order);
        Ok(())
    }

    // ----- layout emission -----

    /// Write the header. Only columns of interest are listed, and only
    /// they are written on each page.
    pub fn write_layout(&mut self) -> Result<()> {
        self.require_writer("write_layout")?;
        if self.layout_written {
            return Err(SddsError::protocol("write_layout: the layout is already written"));
        }
        let mode = &mut self.layout.data_mode;
        match mode.encoding {
            DataEncoding::Binary => {
                mode.byte_order = Some(mode.effective_byte_order());
                mode.lines_per_row = 1;
            }
            DataEncoding::Ascii => {
                mode.column_major = false;
                mode.byte_order = None;
            }
        }
        self.written_columns = (0..self.layout.columns.len())
            .filter(|&c| self.column_flags.get(c).copied().unwrap_or(true))
            .collect();
        self.emit_header()?;
        self.layout_written = true;
        self.state = State::Ready;
        self.store.reshape(&self.layout, 0);
        tracing::debug!(
            parameters = self.layout.parameters.len(),
            columns = self.written_columns.len(),
            arrays = self.layout.arrays.len(),
            mode = self.layout.data_mode.encoding.name(),
            "layout written"
        );
        Ok(())
    }

    fn emit_header(&mut self) -> Result<()> {
        let result = match &mut self.stream {
            Stream::Writer(w) => write_header(w, &self.layout, &self.written_columns)
                .and_then(|start| w.flush().io_context(|| "flush header").map(|()| start)),
            _ => Err(SddsError::protocol("the dataset is disconnected")),
        };
        match result {
            Ok(start) => {
                self.data_start = start;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Change the layout of a written header before the first page starts.
    ///
    /// The edit runs on a copy; on success the header is rewritten in
    /// place. Needs a plain output file.
    pub fn append_layout<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Layout) -> Result<()>,
    {
        self.require_writer("append_layout")?;
        if !self.layout_written {
            return Err(SddsError::protocol("append_layout: the layout has not been written"));
        }
        if self.page_number > 0 || self.state != State::Ready {
            return Err(SddsError::schema("append_layout: a page was already started"));
        }
        if !matches!(&self.stream, Stream::Writer(w) if w.is_seekable()) {
            return Err(SddsError::unsupported(
                "append_layout needs a plain output file",
            ));
        }
        let mut layout = self.layout.clone();
        edit(&mut layout)?;
        let old_columns = self.layout.columns.len();
        self.layout = layout;
        let columns = self.layout.columns.len();
        self.column_flags.resize(columns, true);
        self.column_flags.truncate(columns);
        self.column_order.retain(|&c| c < columns);
        self.column_order.extend(old_columns..columns);
        self.written_columns.retain(|&c| c < columns);
        self.written_columns.extend(old_columns..columns);
        if let Stream::Writer(w) = &mut self.stream
            && let Err(e) = w.truncate(0)
        {
            return self.fail(SddsError::io("truncate output for new header", e));
        }
        self.emit_header()?;
        self.store.reshape(&self.layout, 0);
        tracing::debug!(columns, "layout rewritten");
        Ok(())
    }

    // ----- page output -----

    /// Emit the page in memory and return to `Ready`.
    pub fn write_page(&mut self) -> Result<()> {
        self.require_writer("write_page")?;
        self.require_page("write_page")?;
        if self.current_frame.is_some() {
            self.flush_rows(true)?;
        } else {
            let rows = self.store.flagged_rows_from(0);
            let bytes = match self.layout.data_mode.encoding {
                DataEncoding::Binary => binary_codec(&self.layout).encode_page(
                    &self.layout,
                    &self.store,
                    &self.written_columns,
                    &rows,
                    self.layout.data_mode.fixed_row_count,
                )?,
                DataEncoding::Ascii => AsciiCodec::new(&self.layout)
                    .encode_page(&self.store, &self.written_columns, &rows, self.page_number)
                    .into_bytes(),
            };
            self.emit(&bytes)?;
            self.store.n_rows_written = rows.len();
            self.flush_stream()?;
        }
        tracing::debug!(
            page = self.page_number,
            rows = self.store.n_rows_written,
            "page written"
        );
        self.current_frame = None;
        self.state = State::Ready;
        Ok(())
    }

    /// Write the rows added since the last update and rewrite the row count.
    ///
    /// With `flush` the written rows leave memory; later rows continue the
    /// virtual row numbering. Binary output on plain files only, and the
    /// page must be row-major or hold a single column.
    pub fn update_page(&mut self, flush: bool) -> Result<()> {
        self.require_writer("update_page")?;
        self.require_page("update_page")?;
        if self.layout.data_mode.encoding == DataEncoding::Ascii {
            return Err(SddsError::unsupported("update_page is not available for ASCII output"));
        }
        if !matches!(&self.stream, Stream::Writer(w) if w.is_seekable()) {
            return Err(SddsError::unsupported(
                "update_page needs a plain output file",
            ));
        }
        if self.layout.data_mode.column_major && self.written_columns.len() > 1 {
            return Err(SddsError::unsupported(
                "update_page needs row-major order when a page has several columns",
            ));
        }
        self.flush_rows(flush)
    }

    /// Append pending rows to the page on disk and rewrite its row count.
    fn flush_rows(&mut self, discard: bool) -> Result<()> {
        let start = self.store.rows_flushed_in_mem;
        let rows = self.store.flagged_rows_from(start);
        let binary = self.layout.data_mode.encoding == DataEncoding::Binary;
        let codec = binary_codec(&self.layout);
        match self.current_frame {
            None => {
                let wide = self.layout.data_mode.fixed_row_count;
                let bytes = codec.encode_page(&self.layout, &self.store, &self.written_columns, &rows, wide)?;
                let offset = self.writer_position()?;
                self.emit(&bytes)?;
                self.current_frame = Some(PageFrame {
                    offset,
                    count_offset: Some(offset),
                    row_count: rows.len(),
                    wide,
                    count_width: 0,
                });
                self.flush_stream()?;
            }
            Some(mut frame) => {
                let body = if binary {
                    let mut out = Vec::new();
                    codec.encode_columns(
                        &self.store,
                        &self.written_columns,
                        &rows,
                        self.layout.data_mode.column_major,
                        &mut out,
                    )?;
                    out
                } else {
                    AsciiCodec::new(&self.layout)
                        .encode_rows(&self.store, &self.written_columns, &rows)
                        .into_bytes()
                };
                let count = frame.row_count + rows.len();
                let count_bytes = if binary {
                    if !frame.wide && i32::try_from(count).is_err() {
                        return Err(SddsError::bounds(format!(
                            "row count {count} does not fit the page's 32-bit row count"
                        )));
                    }
                    let mut out = Vec::new();
                    codec.encode_row_count(count, frame.wide, &mut out)?;
                    out
                } else {
                    let width = frame.count_width;
                    let text = format!("{count:>width$}");
                    if text.len() > width {
                        return Err(SddsError::bounds(format!(
                            "row count {count} does not fit the existing {width}-character row-count line"
                        )));
                    }
                    text.into_bytes()
                };
                self.emit(&body)?;
                let offset = frame.count_offset.unwrap_or(frame.offset);
                let result = match &mut self.stream {
                    Stream::Writer(w) => {
                        rewrite_at(w, offset, &count_bytes).io_context(|| "rewrite row count")
                    }
                    _ => Err(SddsError::protocol("the dataset is disconnected")),
                };
                if let Err(e) = result {
                    return self.fail(e);
                }
                frame.row_count = count;
                self.current_frame = Some(frame);
            }
        }
        tracing::trace!(rows = rows.len(), page = self.page_number, "rows flushed");
        self.store.rows_flushed_in_mem = self.store.n_rows;
        self.store.n_rows_written += rows.len();
        if discard {
            self.store.discard_flushed();
        }
        Ok(())
    }

    /// Flush rows once `update_interval` of them are pending.
    fn auto_update(&mut self) -> Result<()> {
        if self.update_interval == 0 || self.current_frame.is_none() {
            return Ok(());
        }
        let pending = self.store.n_rows - self.store.rows_flushed_in_mem;
        if pending >= self.update_interval {
            self.flush_rows(true)?;
        }
        Ok(())
    }

    // ----- page input -----

    /// Load the next page. Returns its number, or `None` at end of data.
    pub fn read_page(&mut self) -> Result<Option<i32>> {
        self.require_reader("read_page")?;
        if self.end_after_recovery {
            self.state = State::Ready;
            return Ok(None);
        }
        let Stream::Reader(reader) = &mut self.stream else {
            return Err(SddsError::protocol("read_page: the dataset is disconnected"));
        };
        let read = match read_one(reader, &self.layout, &mut self.store) {
            Ok(read) => read,
            Err(e) => return self.fail(e),
        };
        match read {
            PageRead::End => {
                self.state = State::Ready;
                Ok(None)
            }
            PageRead::Complete(frame) => Ok(Some(self.page_loaded(frame))),
            PageRead::Truncated { frame, rows } => {
                self.recovery_possible = true;
                if self.auto_recover {
                    tracing::warn!(page = self.page_number + 1, rows, "recovered truncated page");
                    self.end_after_recovery = true;
                    Ok(Some(self.page_loaded(frame)))
                } else {
                    let error = SddsError::parse(format!(
                        "page {} is truncated after {rows} complete rows",
                        self.page_number + 1
                    ));
                    self.fail(error)
                }
            }
        }
    }

    fn page_loaded(&mut self, frame: PageFrame) -> i32 {
        if self.pages.len() == self.page_number {
            self.pages.push(frame);
        }
        self.page_number += 1;
        self.state = State::InPage;
        tracing::debug!(page = self.page_number, rows = self.store.n_rows, "page read");
        i32::try_from(self.page_number).unwrap_or(i32::MAX)
    }

    fn position_reader(&mut self, offset: u64) -> Result<()> {
        let path = self.path.clone();
        let Stream::Reader(reader) = &mut self.stream else {
            return Err(SddsError::protocol("the dataset is disconnected"));
        };
        if !reader.is_seekable() && offset < reader.position() {
            let Some(path) = path else {
                return Err(SddsError::unsupported("cannot rewind standard input"));
            };
            *reader = SddsReader::open(&path)?;
        }
        reader
            .seek_to(offset)
            .io_context(|| format!("seek to offset {offset}"))
    }

    /// Position the reader so the next `read_page` returns page `page` (1-based).
    pub fn goto_page(&mut self, page: usize) -> Result<()> {
        self.require_reader("goto_page")?;
        if page == 0 {
            return Err(SddsError::bounds("page numbers start at 1"));
        }
        self.end_after_recovery = false;
        if let Some(frame) = self.pages.get(page - 1).copied() {
            self.position_reader(frame.offset)?;
            self.page_number = page - 1;
            self.state = State::Ready;
            return Ok(());
        }
        let (offset, number) = match self.pages.last() {
            Some(frame) => (frame.offset, self.pages.len() - 1),
            None => (self.data_start, 0),
        };
        self.position_reader(offset)?;
        self.page_number = number;
        while self.page_number < page - 1 {
            if self.read_page()?.is_none() {
                return Err(SddsError::bounds(format!(
                    "page {page} requested but the file has {} pages",
                    self.page_number
                )));
            }
        }
        let at_end = match &mut self.stream {
            Stream::Reader(reader) if self.pages.len() < page => {
                reader.at_eof().io_context(|| "look for the next page")?
            }
            _ => false,
        };
        if at_end {
            return Err(SddsError::bounds(format!(
                "page {page} requested but the file has {} pages",
                self.page_number
            )));
        }
        self.state = State::Ready;
        Ok(())
    }

    // ----- stream management -----

    /// Close the stream, keeping layout and page state.
    pub fn disconnect(&mut self) -> Result<()> {
        self.check_active()?;
        if self.path.is_none() {
            return Err(SddsError::unsupported("standard streams cannot be disconnected"));
        }
        match std::mem::replace(&mut self.stream, Stream::Closed) {
            Stream::Writer(w) => {
                self.resume_at = w.position();
                if let Err(e) = w.finish() {
                    return self.fail(SddsError::io("close output", e));
                }
            }
            Stream::Reader(r) => self.resume_at = r.position(),
            Stream::Closed => {
                return Err(SddsError::protocol("disconnect: the dataset is already disconnected"));
            }
        }
        tracing::debug!(offset = self.resume_at, "disconnected");
        Ok(())
    }

    /// Reopen the stream closed by `disconnect`.
    pub fn reconnect(&mut self) -> Result<()> {
        self.check_active()?;
        if !matches!(self.stream, Stream::Closed) {
            return Err(SddsError::protocol("reconnect: the dataset is connected"));
        }
        let Some(path) = self.path.clone() else {
            return Err(SddsError::unsupported("standard streams cannot be reconnected"));
        };
        self.stream = match self.role {
            Role::Writer => {
                let mut writer = SddsWriter::reopen_append(&path, self.resume_at)?;
                writer.set_fsync(self.fsync);
                Stream::Writer(writer)
            }
            Role::Reader => {
                let mut reader = SddsReader::open(&path)?;
                reader
                    .seek_to(self.resume_at)
                    .io_context(|| format!("seek {}", path.display()))?;
                Stream::Reader(reader)
            }
        };
        tracing::debug!(offset = self.resume_at, "reconnected");
        Ok(())
    }

    /// Finish the dataset: a writer's page in progress is written, streams
    /// are closed and any append lock is released.
    pub fn terminate(mut self) -> Result<()> {
        if self.inactive.is_none() && self.role == Role::Writer && self.state == State::InPage {
            self.write_page()?;
        }
        if let Stream::Writer(w) = std::mem::replace(&mut self.stream, Stream::Closed) {
            w.finish().io_context(|| "close output")?;
        }
        if let Some(lock) = self.lock.take() {
            lock.release()?;
        }
        tracing::debug!(pages = self.page_number, "terminated");
        Ok(())
    }
}
