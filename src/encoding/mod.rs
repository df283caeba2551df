//! Encoding utilities for compact representation.
//!
//! This module provides:
//! - Elias γ (gamma) codes, read and written with [`dsi_bitstream`]
//! - Common-prefix computation for front coding, byte-wise or on whole
//!   UTF-8 codepoints
//!
//! Streams are big-endian (most significant bit first in each byte) over
//! byte-sized words, so encoded data is any whole number of bytes with no
//! alignment requirement. [`CodeWriter`] and [`CodeReader`] keep an absolute
//! bit position on top of the buffered bit streams, move over byte-aligned
//! blocks of raw bytes, and turn the end of the data into
//! [`Error::MalformedStream`].
//!
//! γ codes encode natural numbers, zero included, up to [`MAX_GAMMA`].

use std::io::{Cursor, Write};

use dsi_bitstream::prelude::*;

use crate::error::{Error, Result};

pub use dsi_bitstream::codes::len_gamma;

/// Largest value with a γ code: the unary prefix of `x + 1` must stay below
/// 64 bits.
pub const MAX_GAMMA: u64 = u64::MAX - 1;

type BitWriterOver<W> = BufBitWriter<BE, WordAdapter<u8, W>>;
type BitReaderOver<'a> = BufBitReader<BE, WordAdapter<u8, Cursor<&'a [u8]>>>;

/// Writes γ codes and byte blocks to a byte sink.
pub struct CodeWriter<W: Write> {
    inner: BitWriterOver<W>,
    position: u64,
}

impl<W: Write> CodeWriter<W> {
    /// Create a writer positioned at bit 0 of `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            inner: BufBitWriter::new(WordAdapter::new(sink)),
            position: 0,
        }
    }

    /// Number of bits written so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the next bit starts a new byte.
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.position % 8 == 0
    }

    /// Write `value` as a γ code. `value` must not exceed [`MAX_GAMMA`].
    pub fn write_gamma(&mut self, value: u64) -> Result<()> {
        debug_assert!(value <= MAX_GAMMA);
        self.position += self.inner.write_gamma(value)? as u64;
        Ok(())
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align(&mut self) -> Result<()> {
        let pad = (8 - self.position % 8) % 8;
        if pad > 0 {
            self.inner.write_bits(0, pad as usize)?;
            self.position += pad;
        }
        Ok(())
    }

    /// Align, then copy `bytes` verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.align()?;
        let mut chunks = bytes.chunks_exact(4);
        for chunk in &mut chunks {
            let mut word = [0u8; 4];
            word.copy_from_slice(chunk);
            self.inner.write_bits(u32::from_be_bytes(word) as u64, 32)?;
        }
        for &b in chunks.remainder() {
            self.inner.write_bits(b as u64, 8)?;
        }
        self.position += 8 * bytes.len() as u64;
        Ok(())
    }

    /// Pad the last byte with zeros, flush, and return the sink.
    pub fn into_inner(mut self) -> Result<W> {
        BitWrite::flush(&mut self.inner)?;
        Ok(self.inner.into_inner()?.into_inner())
    }
}

/// Reads γ codes and byte blocks from a byte slice.
pub struct CodeReader<'a> {
    inner: BitReaderOver<'a>,
    data: &'a [u8],
    position: u64,
}

impl<'a> CodeReader<'a> {
    /// Create a reader positioned at bit 0 of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: BufBitReader::new(WordAdapter::new(Cursor::new(data))),
            data,
            position: 0,
        }
    }

    /// Create a reader positioned at `bit`.
    pub fn at(data: &'a [u8], bit: u64) -> Result<Self> {
        let mut reader = Self::new(data);
        reader.seek(bit)?;
        Ok(reader)
    }

    /// Current bit position.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Length of the data in bits.
    #[inline]
    pub fn bit_len(&self) -> u64 {
        8 * self.data.len() as u64
    }

    /// Bits left after the current position.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.bit_len() - self.position
    }

    /// Move to an absolute bit position, at most [`bit_len`](Self::bit_len).
    pub fn seek(&mut self, bit: u64) -> Result<()> {
        if bit > self.bit_len() {
            return Err(Error::MalformedStream { bit_offset: bit });
        }
        self.inner
            .set_bit_pos(bit)
            .map_err(|_| Error::MalformedStream { bit_offset: bit })?;
        self.position = bit;
        Ok(())
    }

    /// True if what is left is fewer than 8 bits, all zero: the padding
    /// after the last code of a stream.
    pub fn at_padding_end(&self) -> bool {
        match self.remaining() {
            0 => true,
            n if n < 8 => self.data.last().is_some_and(|&b| b & ((1u8 << n) - 1) == 0),
            _ => false,
        }
    }

    /// Rewind to `start` after a failed read and report it.
    fn malformed(&mut self, start: u64) -> Error {
        // `start` was reached before, so seeking back stays inside the data.
        let _ = self.seek(start);
        Error::MalformedStream { bit_offset: start }
    }

    /// Consume the unary prefix of a γ code and return its length, checking
    /// that the whole code fits in the data and describes a `u64`.
    fn gamma_prefix(&mut self) -> Result<u64> {
        let start = self.position;
        let zeros = match self.inner.read_unary() {
            Ok(zeros) => zeros,
            Err(_) => return Err(self.malformed(start)),
        };
        // A prefix of 64 zeros would describe a value of at least 2^64 - 1.
        if zeros >= 64 || zeros > self.bit_len() - (start + zeros + 1) {
            return Err(self.malformed(start));
        }
        Ok(zeros)
    }

    /// Read one γ code.
    ///
    /// Fails with [`Error::MalformedStream`], leaving the position unchanged,
    /// if the data ends inside the code or its prefix is too long for a
    /// `u64`.
    pub fn read_gamma(&mut self) -> Result<u64> {
        let start = self.position;
        self.gamma_prefix()?;
        self.seek(start)?;
        match self.inner.read_gamma() {
            Ok(value) => {
                self.position = start + len_gamma(value) as u64;
                Ok(value)
            }
            Err(_) => Err(self.malformed(start)),
        }
    }

    /// Skip `n` consecutive γ codes without computing their values.
    ///
    /// Only the unary prefixes are scanned; the binary parts are jumped over.
    pub fn skip_gammas(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            let start = self.position;
            let zeros = self.gamma_prefix()?;
            if zeros > 0 && self.inner.skip_bits(zeros as usize).is_err() {
                return Err(self.malformed(start));
            }
            self.position = start + 2 * zeros + 1;
        }
        Ok(())
    }

    /// Pad up to the next byte boundary.
    pub fn align(&mut self) -> Result<()> {
        self.seek(self.position.div_ceil(8) * 8)
    }

    /// Align, then step over a block of `len` raw bytes and return the byte
    /// offset where it starts.
    pub fn skip_block(&mut self, len: u64) -> Result<u64> {
        let start = self.position.div_ceil(8);
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.data.len() as u64)
            .ok_or(Error::MalformedStream {
                bit_offset: self.position,
            })?;
        self.seek(8 * end)?;
        Ok(start)
    }
}

/// Compute the shared prefix length between two byte slices.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[inline]
fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Shared prefix length of two UTF-8 byte strings, backed off so that it
/// ends on a codepoint boundary of both.
pub fn utf8_common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let mut n = common_prefix_len(a, b);
    while n > 0
        && (a.get(n).is_some_and(|&c| is_continuation(c))
            || b.get(n).is_some_and(|&c| is_continuation(c)))
    {
        n -= 1;
    }
    n
}

/// Byte length of the first `chars` codepoints of a UTF-8 byte string (the
/// whole string if it is shorter).
pub fn utf8_prefix_of_chars(bytes: &[u8], chars: usize) -> usize {
    let mut seen = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if !is_continuation(b) {
            if seen == chars {
                return i;
            }
            seen += 1;
        }
    }
    bytes.len()
}
