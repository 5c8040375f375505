//! Buffered byte streams under every dataset.
//!
//! [`SddsReader`] and [`SddsWriter`] sit between the codecs and the
//! backend: a plain file (seekable), a compressed stream, or the process's
//! standard streams. Both keep their own buffer, sized from
//! [`LibraryConfig::io_buffer_size`](crate::config::LibraryConfig), and
//! report positions in the uncompressed byte stream so page offsets mean
//! the same thing for every backend.

use crate::config;
use crate::error::{IoContext, Result, SddsError};
use crate::io::compression::{self, FinishWrite};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

enum ReadBackend {
    File(File),
    Stream(Box<dyn Read + Send>),
}

/// Buffered input over a file, compressed stream or stdin.
pub struct SddsReader {
    backend: ReadBackend,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
    /// Stream offset of `buf[0]`.
    base: u64,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SddsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SddsReader")
            .field("path", &self.path)
            .field("position", &self.position())
            .field("seekable", &self.is_seekable())
            .finish()
    }
}

impl SddsReader {
    fn with_backend(backend: ReadBackend, path: Option<PathBuf>) -> Self {
        let capacity = config::current().io_buffer_size.max(16);
        Self {
            backend,
            buf: vec![0; capacity],
            pos: 0,
            len: 0,
            base: 0,
            path,
        }
    }

    /// Open a file, decompressing when its name or leading bytes say so.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(codec) = compression::disabled_codec_for(path) {
            return Err(SddsError::unsupported(format!(
                "{}: {codec} support is not compiled in",
                path.display()
            )));
        }
        let mut file = File::open(path).io_context(|| format!("open {}", path.display()))?;
        let codec = match compression::detect_from_extension(path) {
            Some(codec) => Some(codec),
            None => {
                let mut head = [0u8; 8];
                let n = read_fully(&mut file, &mut head)
                    .io_context(|| format!("read {}", path.display()))?;
                file.seek(SeekFrom::Start(0))
                    .io_context(|| format!("rewind {}", path.display()))?;
                compression::detect_from_magic(&head[..n])
            }
        };
        let backend = match codec {
            Some(codec) => {
                tracing::debug!(path = %path.display(), codec = codec.name(), "opening compressed input");
                ReadBackend::Stream(
                    codec
                        .wrap_reader(Box::new(file))
                        .io_context(|| format!("wrap {} with {}", path.display(), codec.name()))?,
                )
            }
            None => ReadBackend::File(file),
        };
        Ok(Self::with_backend(backend, Some(path.to_path_buf())))
    }

    /// Read from standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::with_backend(ReadBackend::Stream(Box::new(io::stdin())), None)
    }

    /// Read from any byte source; the result cannot seek.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self::with_backend(ReadBackend::Stream(Box::new(reader)), None)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Plain files can seek; compressed streams and stdin cannot.
    #[must_use]
    pub fn is_seekable(&self) -> bool {
        matches!(self.backend, ReadBackend::File(_))
    }

    /// Offset of the next byte in the uncompressed stream.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn fill(&mut self) -> io::Result<usize> {
        if self.pos < self.len {
            return Ok(self.len - self.pos);
        }
        self.base += self.len as u64;
        self.pos = 0;
        self.len = 0;
        let n = loop {
            let result = match &mut self.backend {
                ReadBackend::File(f) => f.read(&mut self.buf),
                ReadBackend::Stream(s) => s.read(&mut self.buf),
            };
            match result {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other?,
            }
        };
        self.len = n;
        Ok(n)
    }

    /// Copy up to `out.len()` bytes; fewer only at end of stream.
    pub fn read_up_to(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let mut done = 0;
        while done < out.len() {
            if self.fill()? == 0 {
                break;
            }
            let n = (self.len - self.pos).min(out.len() - done);
            out[done..done + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            done += n;
        }
        Ok(done)
    }

    /// Fill `out` completely or fail with `UnexpectedEof`.
    pub fn read_exact(&mut self, out: &mut [u8]) -> io::Result<()> {
        let n = self.read_up_to(out)?;
        if n < out.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("needed {} bytes, got {n}", out.len()),
            ));
        }
        Ok(())
    }

    /// Next line without its terminator; `None` at end of stream.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        loop {
            if self.fill()? == 0 {
                if line.is_empty() {
                    return Ok(None);
                }
                break;
            }
            let chunk = &self.buf[self.pos..self.len];
            if let Some(i) = chunk.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&chunk[..i]);
                self.pos += i + 1;
                break;
            }
            line.extend_from_slice(chunk);
            self.pos = self.len;
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// True when no bytes remain.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.fill()? == 0)
    }

    /// Discard `count` bytes, stopping early at end of stream.
    pub fn skip(&mut self, mut count: u64) -> io::Result<u64> {
        let mut skipped = 0;
        while count > 0 {
            if self.fill()? == 0 {
                break;
            }
            let n = ((self.len - self.pos) as u64).min(count) as usize;
            self.pos += n;
            count -= n as u64;
            skipped += n as u64;
        }
        Ok(skipped)
    }

    /// Move to an absolute offset. Streams can only move forward.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        let here = self.position();
        if offset >= self.base && offset <= self.base + self.len as u64 {
            self.pos = (offset - self.base) as usize;
            return Ok(());
        }
        if let ReadBackend::File(f) = &mut self.backend {
            f.seek(SeekFrom::Start(offset))?;
            self.base = offset;
            self.pos = 0;
            self.len = 0;
            return Ok(());
        }
        if offset < here {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot seek backwards in a stream",
            ));
        }
        let want = offset - here;
        if self.skip(want)? < want {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended before seek target",
            ));
        }
        Ok(())
    }
}

/// Read until `buf` is full or the source ends.
fn read_fully(src: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match src.read(&mut buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

enum WriteBackend {
    File(File),
    Stream(Box<dyn FinishWrite>),
    Stdout(io::Stdout),
}

/// Buffered output over a file, compressed stream or stdout.
pub struct SddsWriter {
    backend: Option<WriteBackend>,
    buf: Vec<u8>,
    capacity: usize,
    /// Bytes already handed to the backend.
    flushed: u64,
    fsync: bool,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SddsWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SddsWriter")
            .field("path", &self.path)
            .field("position", &self.position())
            .field("seekable", &self.is_seekable())
            .finish()
    }
}

impl SddsWriter {
    fn with_backend(backend: WriteBackend, path: Option<PathBuf>, flushed: u64) -> Self {
        let capacity = config::current().io_buffer_size.max(16);
        Self {
            backend: Some(backend),
            buf: Vec::with_capacity(capacity),
            capacity,
            flushed,
            fsync: false,
            path,
        }
    }

    fn wrap(path: &Path, file: File) -> Result<WriteBackend> {
        if let Some(codec) = compression::disabled_codec_for(path) {
            return Err(SddsError::unsupported(format!(
                "{}: {codec} support is not compiled in",
                path.display()
            )));
        }
        match compression::detect_from_extension(path) {
            Some(codec) => Ok(WriteBackend::Stream(
                codec
                    .wrap_writer(Box::new(file))
                    .io_context(|| format!("wrap {} with {}", path.display(), codec.name()))?,
            )),
            None => Ok(WriteBackend::File(file)),
        }
    }

    /// Create or truncate a file; the name picks the compression.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).io_context(|| format!("create {}", path.display()))?;
        let backend = Self::wrap(path, file)?;
        Ok(Self::with_backend(backend, Some(path.to_path_buf()), 0))
    }

    /// Reopen an existing file for writing at its end.
    ///
    /// Plain files are positioned at their length. Compressed files get a
    /// new stream member appended; `logical_end` is the uncompressed length
    /// already present and becomes the starting position.
    pub fn reopen_append(path: impl AsRef<Path>, logical_end: u64) -> Result<Self> {
        let path = path.as_ref();
        if compression::is_compressed_path(path) {
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .io_context(|| format!("open {} for append", path.display()))?;
            let backend = Self::wrap(path, file)?;
            return Ok(Self::with_backend(backend, Some(path.to_path_buf()), logical_end));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .io_context(|| format!("open {} for update", path.display()))?;
        let end = file
            .seek(SeekFrom::End(0))
            .io_context(|| format!("seek {}", path.display()))?;
        Ok(Self::with_backend(
            WriteBackend::File(file),
            Some(path.to_path_buf()),
            end,
        ))
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::with_backend(WriteBackend::Stdout(io::stdout()), None, 0)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn is_seekable(&self) -> bool {
        matches!(self.backend, Some(WriteBackend::File(_)))
    }

    /// Offset of the next byte in the uncompressed stream.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    /// Call `fsync` on every flush of a plain file.
    pub fn set_fsync(&mut self, enabled: bool) {
        self.fsync = enabled;
    }

    fn backend(&mut self) -> io::Result<&mut WriteBackend> {
        self.backend
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stream already closed"))
    }

    fn drain(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.buf);
        let result = match self.backend()? {
            WriteBackend::File(f) => f.write_all(&buf),
            WriteBackend::Stream(s) => s.write_all(&buf),
            WriteBackend::Stdout(s) => s.write_all(&buf),
        };
        self.flushed += buf.len() as u64;
        self.buf = buf;
        self.buf.clear();
        result
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.buf.len() + data.len() > self.capacity {
            self.drain()?;
        }
        if data.len() >= self.capacity {
            let result = match self.backend()? {
                WriteBackend::File(f) => f.write_all(data),
                WriteBackend::Stream(s) => s.write_all(data),
                WriteBackend::Stdout(s) => s.write_all(data),
            };
            self.flushed += data.len() as u64;
            return result;
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Drain the buffer into the backend and flush it.
    pub fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        let fsync = self.fsync;
        match self.backend()? {
            WriteBackend::File(f) => {
                f.flush()?;
                if fsync {
                    f.sync_data()?;
                }
                Ok(())
            }
            WriteBackend::Stream(s) => s.flush(),
            WriteBackend::Stdout(s) => s.flush(),
        }
    }

    /// Move to an absolute offset of a plain file, flushing first.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.drain()?;
        match self.backend()? {
            WriteBackend::File(f) => {
                f.seek(SeekFrom::Start(offset))?;
                self.flushed = offset;
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot seek a compressed or standard stream",
            )),
        }
    }

    /// Move to the end of a plain file and return the offset.
    pub fn seek_end(&mut self) -> io::Result<u64> {
        self.drain()?;
        match self.backend()? {
            WriteBackend::File(f) => {
                let end = f.seek(SeekFrom::End(0))?;
                self.flushed = end;
                Ok(end)
            }
            _ => Ok(self.position()),
        }
    }

    /// Cut a plain file to `len` bytes and continue writing there.
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.drain()?;
        match self.backend()? {
            WriteBackend::File(f) => {
                f.set_len(len)?;
                f.seek(SeekFrom::Start(len))?;
                self.flushed = len;
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot truncate a compressed or standard stream",
            )),
        }
    }

    /// Flush everything, finish compressed streams and close the backend.
    pub fn finish(mut self) -> io::Result<()> {
        self.drain()?;
        match self.backend.take() {
            Some(WriteBackend::File(mut f)) => {
                f.flush()?;
                if self.fsync {
                    f.sync_all()?;
                }
                Ok(())
            }
            Some(WriteBackend::Stream(s)) => s.finish(),
            Some(WriteBackend::Stdout(mut s)) => s.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for SddsWriter {
    fn drop(&mut self) {
        if self.backend.is_some() {
            let _ = self.drain();
        }
    }
}
