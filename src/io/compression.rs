//! Pluggable stream compression for SDDS files.
//!
//! SDDS files are routinely stored compressed. The file name decides the
//! codec on output (`.gz`, `.xz`, `.lzma`); on input the name is checked
//! first and the leading magic bytes are used when the name says nothing.
//!
//! ## Built-in codecs
//!
//! - **Gzip** (`.gz`) via `flate2` (feature: `compression-gzip`). Reading
//!   accepts concatenated members.
//! - **Xz** (`.xz`) via `xz2` (feature: `compression-xz`). Reading accepts
//!   concatenated streams.
//! - **Lzma** (`.lzma`, legacy "lzma alone" container) via `xz2`
//!   (feature: `compression-xz`).
//!
//! Compression levels come from [`LibraryConfig`](crate::config::LibraryConfig).
//!
//! ## Custom codecs
//!
//! ```
//! use sdds::io::compression::{register_codec, CompressionCodec, FinishWrite};
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//!
//! struct Identity;
//!
//! struct Passthrough(Box<dyn Write + Send>);
//!
//! impl Write for Passthrough {
//!     fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.0.write(buf) }
//!     fn flush(&mut self) -> std::io::Result<()> { self.0.flush() }
//! }
//!
//! impl FinishWrite for Passthrough {
//!     fn finish(mut self: Box<Self>) -> std::io::Result<()> { self.0.flush() }
//! }
//!
//! impl CompressionCodec for Identity {
//!     fn name(&self) -> &str { "identity" }
//!     fn extensions(&self) -> &[&str] { &[".ident"] }
//!     fn magic_bytes(&self) -> Option<&[u8]> { None }
//!     fn wrap_reader(&self, r: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
//!         Ok(r)
//!     }
//!     fn wrap_writer(&self, w: Box<dyn Write + Send>) -> std::io::Result<Box<dyn FinishWrite>> {
//!         Ok(Box::new(Passthrough(w)))
//!     }
//! }
//!
//! register_codec(Arc::new(Identity));
//! ```

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
        #[cfg(feature = "compression-xz")]
        Arc::new(LzmaCodec),
    ]
}

fn registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).clone()
}

/// Register an additional codec for every thread.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).push(codec);
}

/// A compressing writer that must be finished to produce a valid stream.
pub trait FinishWrite: Write + Send {
    /// Write the stream trailer and flush the underlying sink.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Stream compression algorithm keyed by file extension and magic bytes.
pub trait CompressionCodec: Send + Sync {
    fn name(&self) -> &str;

    /// Lowercase extensions including the dot, e.g. `&[".gz"]`.
    fn extensions(&self) -> &[&str];

    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>>;

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>>;
}

/// Codec whose extension matches the path, case-insensitively.
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let name = path.as_ref().to_string_lossy().to_lowercase();
    registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
}

/// Codec whose magic bytes start `head`.
pub fn detect_from_magic(head: &[u8]) -> Option<Arc<dyn CompressionCodec>> {
    registry().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| !magic.is_empty() && head.starts_with(magic))
    })
}

/// True if the path names a compressed file.
#[must_use]
pub fn is_compressed_path(path: impl AsRef<Path>) -> bool {
    detect_from_extension(path).is_some()
}

/// Extension recognised by name but whose codec was compiled out.
pub(crate) fn disabled_codec_for(path: &Path) -> Option<&'static str> {
    let name = path.to_string_lossy().to_lowercase();
    let known: &[(&str, &str)] = &[
        (".gz", "gzip"),
        (".xz", "xz"),
        (".lzma", "lzma"),
    ];
    known
        .iter()
        .find(|(ext, _)| name.ends_with(ext))
        .map(|(_, codec)| *codec)
        .filter(|_| detect_from_extension(path).is_none())
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
struct GzipWriter(flate2::write::GzEncoder<Box<dyn Write + Send>>);

#[cfg(feature = "compression-gzip")]
impl Write for GzipWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(feature = "compression-gzip")]
impl FinishWrite for GzipWriter {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut inner = self.0.finish()?;
        inner.flush()
    }
}

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>> {
        let level = crate::config::current().gzip_level.min(9);
        Ok(Box::new(GzipWriter(flate2::write::GzEncoder::new(
            writer,
            flate2::Compression::new(level),
        ))))
    }
}

#[cfg(feature = "compression-xz")]
struct XzWriter(xz2::write::XzEncoder<Box<dyn Write + Send>>);

#[cfg(feature = "compression-xz")]
impl Write for XzWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(feature = "compression-xz")]
impl FinishWrite for XzWriter {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut inner = self.0.finish()?;
        inner.flush()
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)))
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>> {
        let level = crate::config::lzma_compression_level();
        Ok(Box::new(XzWriter(xz2::write::XzEncoder::new(writer, level))))
    }
}

#[cfg(feature = "compression-xz")]
struct LzmaCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for LzmaCodec {
    fn name(&self) -> &str {
        "lzma"
    }

    fn extensions(&self) -> &[&str] {
        &[".lzma"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        // lzma-alone headers start with the properties byte, usually 0x5d.
        Some(&[0x5d, 0x00, 0x00])
    }

    fn wrap_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(io::Error::other)?;
        Ok(Box::new(xz2::read::XzDecoder::new_stream(reader, stream)))
    }

    fn wrap_writer(&self, writer: Box<dyn Write + Send>) -> io::Result<Box<dyn FinishWrite>> {
        let level = crate::config::lzma_compression_level();
        let options = xz2::stream::LzmaOptions::new_preset(level).map_err(io::Error::other)?;
        let stream = xz2::stream::Stream::new_lzma_encoder(&options).map_err(io::Error::other)?;
        Ok(Box::new(XzWriter(xz2::write::XzEncoder::new_stream(
            writer, stream,
        ))))
    }
}
