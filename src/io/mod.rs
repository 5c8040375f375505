//! Byte-level I/O: buffered streams over plain or compressed files, byte
//! order conversion, and the append lock.

pub mod buffer;
pub mod compression;
pub mod endian;
pub mod lock;

pub use buffer::{SddsReader, SddsWriter};
pub use endian::ByteOrder;
pub use lock::FileLock;
