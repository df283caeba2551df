//! Byte sources backing an encoded list.
//!
//! A [`ByteSource`] is anything that can expose its contents as one
//! contiguous byte slice: an owned buffer for in-memory lists, or a
//! [`MappedBytes`] region for lists loaded from disk. Decoding code is the
//! same for both: γ codes are read from the contiguous view, and raw string
//! bytes are copied out with positioned reads.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{Error, Result};

/// Read-only access to a fixed run of bytes.
///
/// Implementors must hand out the whole content as one slice, which the bit
/// decoder walks; [`read_at`](Self::read_at) copies a range out of it and
/// can be overridden when a cheaper copy exists.
pub trait ByteSource {
    /// The whole content, contiguous.
    fn as_bytes(&self) -> &[u8];

    /// Number of bytes.
    #[inline]
    fn len(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    /// True if there are no bytes.
    #[inline]
    fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`, failing with
    /// [`Error::CorruptStore`] if the range is not inside the source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = self.as_bytes();
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= bytes.len() as u64)
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "read of {} bytes at {offset} past end of {} bytes",
                    buf.len(),
                    bytes.len()
                ))
            })?;
        buf.copy_from_slice(&bytes[offset as usize..end as usize]);
        Ok(())
    }
}

impl ByteSource for [u8] {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl ByteSource for Vec<u8> {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl ByteSource for Box<[u8]> {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        (**self).as_bytes()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        (**self).as_bytes()
    }
}

/// A read-only memory mapping of a file.
///
/// The mapping is released when the value is dropped. Zero-length files are
/// not mapped at all.
#[derive(Debug)]
pub struct MappedBytes {
    map: Option<Mmap>,
}

impl MappedBytes {
    /// Map the whole file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = open_file(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Self { map: None });
        }
        // SAFETY: the file is mapped read-only and never written through this
        // mapping; stored lists are not modified after they are built.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map: Some(map) })
    }
}

impl ByteSource for MappedBytes {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        match &self.map {
            Some(map) => &map[..],
            None => &[],
        }
    }
}

/// Open a file for reading, reporting a missing file as
/// [`Error::FileNotFound`].
pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| not_found_or_io(path, e))
}

pub(crate) fn not_found_or_io(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::FileNotFound(path.to_path_buf())
    } else {
        Error::Io(e)
    }
}
