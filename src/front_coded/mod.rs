//! Front-Coded (Prefix-Compressed) String List
//!
//! Front coding stores a sequence of strings by sharing common prefixes:
//! - Every `ratio`-th string: stored in full
//! - The strings in between: store (shared_prefix_len, suffix)
//!
//! Random access decodes the nearest preceding full copy and re-applies at
//! most `ratio - 1` deltas, so `get` costs O(ratio) regardless of length.
//!
//! Key properties:
//! - Built in one streaming pass (bulk load), immutable afterwards
//! - Input need not be sorted; sorted input just compresses better
//! - Storage is any [`ByteSource`]: an owned buffer or a memory mapping
//!
//! # Format
//!
//! Records are concatenated in input order. Each starts on a byte boundary:
//!
//! - full copy (`index % ratio == 0`): `γ(len)`, padding, `len` bytes
//! - delta: `γ(lcp)`, `γ(len - lcp)`, padding, `len - lcp` bytes
//!
//! The directory holds the byte offset of every full copy. In UTF-8 mode
//! `lcp` is cut back to a codepoint boundary, so no record starts inside a
//! multi-byte sequence.

use std::fmt;
use std::io::Write;

use tracing::debug;

use crate::encoding::{
    common_prefix_len, utf8_common_prefix_len, utf8_prefix_of_chars, CodeReader, CodeWriter,
};
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::Config;

/// Receives the directory (byte offset of each full copy) as it is built.
pub trait DirectorySink {
    /// Record the offset of the next full copy.
    fn push_pointer(&mut self, offset: u64) -> Result<()>;
}

impl DirectorySink for Vec<u64> {
    fn push_pointer(&mut self, offset: u64) -> Result<()> {
        self.push(offset);
        Ok(())
    }
}

/// What a finished [`FrontCodedBuilder`] hands back.
#[derive(Debug)]
pub struct BuildOutput<W, D> {
    /// Number of strings pushed.
    pub len: u64,
    /// Number of bytes written to `data`.
    pub data_bytes: u64,
    /// The data sink, flushed.
    pub data: W,
    /// The directory sink.
    pub directory: D,
}

/// Streaming encoder for a [`FrontCodedList`].
///
/// Only the previous string is retained, so the input may be far larger than
/// memory when the sinks are files.
pub struct FrontCodedBuilder<W: Write = Vec<u8>, D: DirectorySink = Vec<u64>> {
    config: Config,
    writer: CodeWriter<W>,
    directory: D,
    previous: Vec<u8>,
    len: u64,
}

impl FrontCodedBuilder {
    /// Create a builder encoding into memory.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_sinks(config, Vec::new(), Vec::new())
    }

    /// Finish building and return the list.
    pub fn build(self) -> Result<FrontCodedList> {
        let config = self.config;
        let out = self.finish()?;
        FrontCodedList::from_parts(
            config,
            out.len,
            out.data.into_boxed_slice(),
            out.directory.into_boxed_slice(),
        )
    }
}

impl<W: Write, D: DirectorySink> FrontCodedBuilder<W, D> {
    /// Create a builder writing records to `data` and full-copy offsets to
    /// `directory`.
    pub fn with_sinks(config: Config, data: W, directory: D) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            writer: CodeWriter::new(data),
            directory,
            previous: Vec::new(),
            len: 0,
        })
    }

    /// Number of strings pushed so far.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if nothing has been pushed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a string.
    ///
    /// In UTF-8 mode the bytes must be valid UTF-8.
    pub fn push(&mut self, bytes: impl AsRef<[u8]>) -> Result<()> {
        let bytes = bytes.as_ref();
        let index = self.len;
        if self.config.utf8 {
            if let Err(e) = std::str::from_utf8(bytes) {
                return Err(Error::InvalidInput {
                    index,
                    reason: e.to_string(),
                });
            }
        }

        if index % self.config.ratio as u64 == 0 {
            debug_assert!(self.writer.is_aligned());
            self.directory.push_pointer(self.writer.position() / 8)?;
            self.writer.write_gamma(bytes.len() as u64)?;
            self.writer.write_bytes(bytes)?;
        } else {
            let lcp = if self.config.utf8 {
                utf8_common_prefix_len(&self.previous, bytes)
            } else {
                common_prefix_len(&self.previous, bytes)
            };
            self.writer.write_gamma(lcp as u64)?;
            self.writer.write_gamma((bytes.len() - lcp) as u64)?;
            self.writer.write_bytes(&bytes[lcp..])?;
        }

        self.previous.clear();
        self.previous.extend_from_slice(bytes);
        self.len += 1;
        Ok(())
    }

    /// Append a string slice.
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.push(s.as_bytes())
    }

    /// Append every element of `iter`.
    pub fn extend<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        for item in iter {
            self.push(item)?;
        }
        Ok(())
    }

    /// Flush the data sink and hand back both sinks.
    pub fn finish(self) -> Result<BuildOutput<W, D>> {
        let data_bytes = self.writer.position().div_ceil(8);
        let data = self.writer.into_inner()?;
        debug!(
            len = self.len,
            ratio = self.config.ratio,
            data_bytes,
            "front-coded list encoded"
        );
        Ok(BuildOutput {
            len: self.len,
            data_bytes,
            data,
            directory: self.directory,
        })
    }
}

/// An immutable front-coded list of strings over a [`ByteSource`].
///
/// Accessors take `&self` and keep no scratch state, so a list can be shared
/// between threads whenever its source can; concurrent callers of
/// [`get_into`](Self::get_into) each bring their own buffer.
pub struct FrontCodedList<S = Box<[u8]>> {
    config: Config,
    len: u64,
    data: S,
    pointers: Box<[u64]>,
}

impl FrontCodedList {
    /// Build an in-memory list from a sequence of strings.
    pub fn from_strings<I>(config: Config, strings: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut builder = FrontCodedBuilder::new(config)?;
        builder.extend(strings)?;
        builder.build()
    }
}

impl<S: ByteSource> FrontCodedList<S> {
    /// Assemble a list from encoded data and its directory.
    ///
    /// The directory is validated eagerly: one entry per `ratio` strings,
    /// starting at zero, strictly increasing and inside the data.
    pub fn from_parts(config: Config, len: u64, data: S, pointers: Box<[u64]>) -> Result<Self> {
        config.validate()?;
        let expected = len.div_ceil(config.ratio as u64);
        if pointers.len() as u64 != expected {
            return Err(Error::corrupt(format!(
                "directory has {} entries, expected {expected} for {len} strings with ratio {}",
                pointers.len(),
                config.ratio
            )));
        }
        if let Some(&first) = pointers.first() {
            if first != 0 {
                return Err(Error::corrupt(format!("first pointer is {first}, expected 0")));
            }
        }
        if let Some(k) = pointers.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Error::corrupt(format!(
                "directory not increasing at entry {}: {} >= {}",
                k + 1,
                pointers[k],
                pointers[k + 1]
            )));
        }
        if let Some(&last) = pointers.last() {
            if last >= data.len() {
                return Err(Error::corrupt(format!(
                    "pointer {last} past end of {} data bytes",
                    data.len()
                )));
            }
        }
        Ok(Self {
            config,
            len,
            data,
            pointers,
        })
    }

    /// Number of strings.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance between full copies.
    #[inline]
    pub fn ratio(&self) -> u32 {
        self.config.ratio
    }

    /// Whether strings are UTF-8 text.
    #[inline]
    pub fn is_utf8(&self) -> bool {
        self.config.utf8
    }

    /// The configuration the list was built with.
    #[inline]
    pub fn config(&self) -> Config {
        self.config
    }

    /// Byte offsets of the full copies.
    #[inline]
    pub fn pointers(&self) -> &[u64] {
        &self.pointers
    }

    /// The encoded records.
    #[inline]
    pub fn data(&self) -> &S {
        &self.data
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Return the string at `index`.
    pub fn get(&self, index: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.get_into(index, &mut buf)?;
        Ok(buf)
    }

    /// Write the string at `index` into `buf`, replacing its contents.
    ///
    /// On error the contents of `buf` are unspecified.
    pub fn get_into(&self, index: u64, buf: &mut Vec<u8>) -> Result<()> {
        self.check_index(index)?;
        let ratio = self.config.ratio as u64;
        let block = index / ratio;
        let mut reader = CodeReader::at(self.data.as_bytes(), 8 * self.pointers[block as usize])
            .map_err(Error::into_corrupt)?;
        decode_full(&mut reader, &self.data, buf).map_err(Error::into_corrupt)?;
        for _ in 0..index % ratio {
            decode_delta(&mut reader, &self.data, buf).map_err(Error::into_corrupt)?;
        }
        Ok(())
    }

    /// Return the string at `index` as text.
    ///
    /// In UTF-8 mode the bytes are validated; otherwise each byte is taken as
    /// an ISO-8859-1 character.
    pub fn get_str(&self, index: u64) -> Result<String> {
        let buf = self.get(index)?;
        if self.config.utf8 {
            String::from_utf8(buf)
                .map_err(|e| Error::corrupt(format!("string {index} is not UTF-8: {e}")))
        } else {
            Ok(buf.into_iter().map(char::from).collect())
        }
    }

    /// Write at most `limit` leading units of the string at `index` into
    /// `buf`: codepoints in UTF-8 mode, bytes otherwise.
    pub fn get_prefix_into(&self, index: u64, limit: usize, buf: &mut Vec<u8>) -> Result<()> {
        self.get_into(index, buf)?;
        let keep = if self.config.utf8 {
            utf8_prefix_of_chars(buf, limit)
        } else {
            limit.min(buf.len())
        };
        buf.truncate(keep);
        Ok(())
    }

    /// Iterate over all strings in order.
    pub fn iter(&self) -> Iter<'_, S> {
        Iter {
            list: self,
            reader: CodeReader::new(self.data.as_bytes()),
            index: 0,
            buf: Vec::new(),
        }
    }

    /// Iterate over the strings starting at `from` (which may equal `len`).
    pub fn iter_from(&self, from: u64) -> Result<Iter<'_, S>> {
        if from > self.len {
            return Err(Error::IndexOutOfRange {
                index: from,
                len: self.len,
            });
        }
        let mut iter = self.iter();
        if from == self.len {
            iter.index = self.len;
            return Ok(iter);
        }
        let ratio = self.config.ratio as u64;
        let block = from / ratio;
        iter.reader
            .seek(8 * self.pointers[block as usize])
            .map_err(Error::into_corrupt)?;
        iter.index = block * ratio;
        while iter.index < from {
            iter.advance()?;
        }
        Ok(iter)
    }

    /// Memory usage statistics
    pub fn memory_stats(&self) -> FrontCodedStats {
        let data_bytes = self.data.len() as usize;
        let pointer_bytes = std::mem::size_of_val(&*self.pointers);
        let total_bytes = data_bytes + pointer_bytes;
        FrontCodedStats {
            data_bytes,
            pointer_bytes,
            total_bytes,
            num_blocks: self.pointers.len(),
            num_strings: self.len,
            bytes_per_string: if self.len > 0 {
                total_bytes as f64 / self.len as f64
            } else {
                0.0
            },
        }
    }
}

impl<S: ByteSource> fmt::Debug for FrontCodedList<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontCodedList")
            .field("len", &self.len)
            .field("ratio", &self.config.ratio)
            .field("utf8", &self.config.utf8)
            .field("data_bytes", &self.data.len())
            .finish()
    }
}

impl<'a, S: ByteSource> IntoIterator for &'a FrontCodedList<S> {
    type Item = Result<Vec<u8>>;
    type IntoIter = Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Append the `len` raw bytes at `offset` of `data` to `buf`.
fn append_run<S: ByteSource>(data: &S, offset: u64, len: u64, buf: &mut Vec<u8>) -> Result<()> {
    let old = buf.len();
    buf.resize(old + len as usize, 0);
    data.read_at(offset, &mut buf[old..])
}

fn decode_full<S: ByteSource>(
    reader: &mut CodeReader<'_>,
    data: &S,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let len = reader.read_gamma()?;
    let offset = reader.skip_block(len)?;
    buf.clear();
    append_run(data, offset, len, buf)
}

fn decode_delta<S: ByteSource>(
    reader: &mut CodeReader<'_>,
    data: &S,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let lcp = reader.read_gamma()?;
    if lcp > buf.len() as u64 {
        return Err(Error::corrupt(format!(
            "shared prefix {lcp} longer than previous string ({} bytes)",
            buf.len()
        )));
    }
    let suffix_len = reader.read_gamma()?;
    let offset = reader.skip_block(suffix_len)?;
    buf.truncate(lcp as usize);
    append_run(data, offset, suffix_len, buf)
}

/// Sequential iterator over a [`FrontCodedList`].
///
/// Decodes each record once, reusing a single buffer; stops after the first
/// error.
pub struct Iter<'a, S> {
    list: &'a FrontCodedList<S>,
    reader: CodeReader<'a>,
    index: u64,
    buf: Vec<u8>,
}

impl<'a, S: ByteSource> Iter<'a, S> {
    fn advance(&mut self) -> Result<()> {
        let result = if self.index % self.list.config.ratio as u64 == 0 {
            decode_full(&mut self.reader, &self.list.data, &mut self.buf)
        } else {
            decode_delta(&mut self.reader, &self.list.data, &mut self.buf)
        };
        match result {
            Ok(()) => {
                self.index += 1;
                Ok(())
            }
            Err(e) => {
                self.index = self.list.len;
                Err(e.into_corrupt())
            }
        }
    }

    /// Decode the next string and borrow it without allocating.
    pub fn next_bytes(&mut self) -> Option<Result<&[u8]>> {
        if self.index >= self.list.len {
            return None;
        }
        Some(self.advance().map(|()| self.buf.as_slice()))
    }
}

impl<S: ByteSource> Iterator for Iter<'_, S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_bytes().map(|r| r.map(<[u8]>::to_vec))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.list.len - self.index) as usize;
        (left, Some(left))
    }
}

impl<S: ByteSource> ExactSizeIterator for Iter<'_, S> {}

/// Memory statistics for a front-coded list
#[derive(Debug, Clone)]
pub struct FrontCodedStats {
    /// Bytes of encoded records
    pub data_bytes: usize,
    /// Bytes used by the directory
    pub pointer_bytes: usize,
    /// Total memory usage
    pub total_bytes: usize,
    /// Number of full copies
    pub num_blocks: usize,
    /// Number of strings
    pub num_strings: u64,
    /// Average bytes per string
    pub bytes_per_string: f64,
}
