//! Semi-external random access to a γ-coded integer stream.
//!
//! The values stay compressed in their [`ByteSource`]; only the bit offset of
//! every `step`-th value is kept in memory. `get(i)` seeks to the offset of
//! value `step * (i / step)`, skips `i % step` codes and decodes one.
//!
//! A list keeps a read cursor so that scanning forward does not seek again;
//! this is why [`SemiExternalGammaList::get`] takes `&mut self`. Use
//! [`fork`](SemiExternalGammaList::fork) to get an independent cursor for
//! another thread, or [`SharedGammaList`] to share one behind a lock.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::encoding::{CodeReader, CodeWriter, MAX_GAMMA};
use crate::error::{Error, Result};
use crate::source::ByteSource;

/// Random-access view of a γ-coded stream of naturals.
pub struct SemiExternalGammaList<S> {
    source: S,
    step: u32,
    len: u64,
    /// Bit offset of every `step`-th value.
    positions: Arc<[u64]>,
    /// Index of the value starting at `cursor`.
    next_index: u64,
    cursor: u64,
}

impl<S: ByteSource> SemiExternalGammaList<S> {
    /// Index `count` values of `source`, keeping one offset every `step`.
    ///
    /// Without a `count` the stream is decoded until it ends. A clean end is
    /// the end of the data or fewer than 8 zero bits of alignment padding;
    /// any code cut short is reported as [`Error::MalformedStream`]. A stream
    /// truncated exactly on a byte boundary between two codes cannot be told
    /// apart from a complete one, so pass the count whenever it is known.
    pub fn build(source: S, step: u32, count: Option<u64>) -> Result<Self> {
        if step == 0 {
            return Err(Error::InvalidConfiguration(
                "step must be at least 1".to_string(),
            ));
        }
        let step64 = step as u64;
        let mut reader = CodeReader::new(source.as_bytes());
        let mut positions = Vec::new();
        let mut len = 0u64;

        match count {
            Some(count) => {
                // Every code takes at least one bit.
                if count > reader.bit_len() {
                    return Err(Error::MalformedStream {
                        bit_offset: reader.bit_len(),
                    });
                }
                positions.reserve(count.div_ceil(step64) as usize);
                while len < count {
                    positions.push(reader.position());
                    let in_block = step64.min(count - len);
                    reader.skip_gammas(in_block)?;
                    len += in_block;
                }
            }
            None => {
                warn!("gamma list length not given, scanning to the end of the stream");
                while !reader.at_padding_end() {
                    if len % step64 == 0 {
                        positions.push(reader.position());
                    }
                    reader.skip_gammas(1)?;
                    len += 1;
                }
            }
        }

        trace!(len, step, entries = positions.len(), "gamma list indexed");
        Ok(Self {
            source,
            step,
            len,
            positions: positions.into(),
            next_index: 0,
            cursor: 0,
        })
    }

    /// Number of values.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if the stream holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance between indexed values.
    #[inline]
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Bit offset of every `step`-th value.
    #[inline]
    pub fn positions(&self) -> &[u64] {
        &self.positions
    }

    /// Return the value at `index`.
    pub fn get(&mut self, index: u64) -> Result<u64> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let step = self.step as u64;
        let mut reader = CodeReader::new(self.source.as_bytes());
        if self.next_index <= index && self.next_index / step == index / step {
            reader.seek(self.cursor)?;
            reader.skip_gammas(index - self.next_index)?;
        } else {
            reader.seek(self.positions[(index / step) as usize])?;
            reader.skip_gammas(index % step)?;
        }
        let value = reader.read_gamma()?;
        self.next_index = index + 1;
        self.cursor = reader.position();
        Ok(value)
    }

    /// A list over a copy of the source handle with its own cursor, sharing
    /// the offsets with `self`.
    pub fn fork(&self) -> Self
    where
        S: Clone,
    {
        Self {
            source: self.source.clone(),
            step: self.step,
            len: self.len,
            positions: Arc::clone(&self.positions),
            next_index: 0,
            cursor: 0,
        }
    }

    /// Wrap the list in a lock so it can be shared.
    pub fn into_shared(self) -> SharedGammaList<S> {
        SharedGammaList {
            inner: Mutex::new(self),
        }
    }
}

/// A [`SemiExternalGammaList`] behind a mutex.
///
/// Every access serializes on the lock; prefer one forked list per thread
/// when lookups are frequent.
pub struct SharedGammaList<S> {
    inner: Mutex<SemiExternalGammaList<S>>,
}

impl<S: ByteSource> SharedGammaList<S> {
    /// Return the value at `index`.
    pub fn get(&self, index: u64) -> Result<u64> {
        self.inner.lock().get(index)
    }

    /// Number of values.
    pub fn len(&self) -> u64 {
        self.inner.lock().len()
    }

    /// True if the stream holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unwrap the inner list.
    pub fn into_inner(self) -> SemiExternalGammaList<S> {
        self.inner.into_inner()
    }
}

/// Writes naturals as a γ-coded stream.
pub struct GammaStreamBuilder<W: Write = Vec<u8>> {
    writer: CodeWriter<W>,
    len: u64,
}

impl GammaStreamBuilder {
    /// Create a builder writing to memory.
    pub fn new() -> Self {
        Self::with_writer(Vec::new())
    }
}

impl Default for GammaStreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> GammaStreamBuilder<W> {
    /// Create a builder writing to `inner`.
    pub fn with_writer(inner: W) -> Self {
        Self {
            writer: CodeWriter::new(inner),
            len: 0,
        }
    }

    /// Append a value; values above [`MAX_GAMMA`] are rejected.
    pub fn push(&mut self, value: u64) -> Result<()> {
        if value > MAX_GAMMA {
            return Err(Error::InvalidInput {
                index: self.len,
                reason: format!("{value} has no gamma code"),
            });
        }
        self.writer.write_gamma(value)?;
        self.len += 1;
        Ok(())
    }

    /// Number of values written.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pad to a byte boundary and return the value count and the sink.
    pub fn finish(self) -> Result<(u64, W)> {
        Ok((self.len, self.writer.into_inner()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::len_gamma;

    fn stream(values: &[u64]) -> Vec<u8> {
        let mut builder = GammaStreamBuilder::new();
        for &v in values {
            builder.push(v).unwrap();
        }
        builder.finish().unwrap().1
    }

    #[test]
    fn test_step_two() {
        let values = [5u64, 130_000, 7, 999_999_999_999];
        let data = stream(&values);
        let mut list = SemiExternalGammaList::build(data, 2, Some(4)).unwrap();

        assert_eq!(list.positions().len(), 2);
        assert_eq!(list.positions()[0], 0);
        assert_eq!(
            list.positions()[1],
            (len_gamma(5) + len_gamma(130_000)) as u64
        );
        assert_eq!(list.get(3).unwrap(), 999_999_999_999);
        assert_eq!(list.get(0).unwrap(), 5);
        assert_eq!(list.get(1).unwrap(), 130_000);
        assert_eq!(list.get(2).unwrap(), 7);
    }

    #[test]
    fn test_random_order_access() {
        let values: Vec<u64> = (0..1000u64).map(|i| (i * 7919) % 1013 + i / 3).collect();
        let data = stream(&values);
        for step in [1u32, 3, 64, 128, 2000] {
            let mut list = SemiExternalGammaList::build(data.as_slice(), step, None).unwrap();
            assert_eq!(list.len(), 1000);
            for i in (0..1000u64).rev().step_by(7) {
                assert_eq!(list.get(i).unwrap(), values[i as usize], "step {step}");
            }
            for (i, &v) in values.iter().enumerate() {
                assert_eq!(list.get(i as u64).unwrap(), v);
            }
        }
    }

    #[test]
    fn test_out_of_range_and_zero_step() {
        let data = stream(&[1, 2, 3]);
        let mut list = SemiExternalGammaList::build(data.clone(), 2, None).unwrap();
        assert!(matches!(
            list.get(3),
            Err(Error::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(matches!(
            SemiExternalGammaList::build(data, 0, Some(3)),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_stream() {
        let list = SemiExternalGammaList::build(Vec::new(), 4, None).unwrap();
        assert!(list.is_empty());
        assert!(list.positions().is_empty());
        let list = SemiExternalGammaList::build(Vec::new(), 4, Some(0)).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_count_longer_than_stream() {
        let data = stream(&[1, 2, 3]);
        assert!(matches!(
            SemiExternalGammaList::build(data, 2, Some(10)),
            Err(Error::MalformedStream { .. })
        ));
    }

    #[test]
    fn test_estimate_detects_truncation() {
        // 1_000_000 needs 39 bits; dropping a byte cuts its binary part.
        let data = stream(&[3, 1_000_000]);
        let cut = data[..data.len() - 1].to_vec();
        assert!(matches!(
            SemiExternalGammaList::build(cut, 8, None),
            Err(Error::MalformedStream { .. })
        ));

        // A full byte of zeros is not padding.
        let mut padded = stream(&[3, 4]);
        padded.push(0);
        assert!(SemiExternalGammaList::build(padded, 8, None).is_err());
    }

    #[test]
    fn test_rejects_values_without_code() {
        let mut builder = GammaStreamBuilder::new();
        builder.push(MAX_GAMMA).unwrap();
        assert!(matches!(
            builder.push(u64::MAX),
            Err(Error::InvalidInput { index: 1, .. })
        ));
        let (len, data) = builder.finish().unwrap();
        let mut list = SemiExternalGammaList::build(data, 4, Some(len)).unwrap();
        assert_eq!(list.get(0).unwrap(), MAX_GAMMA);
    }

    #[test]
    fn test_overlong_code_is_an_error() {
        // Three valid codes, then (with their padding) over 64 zeros before
        // the next one.
        let mut data = stream(&[1, 2, 3]);
        let end_of_codes = (len_gamma(1) + len_gamma(2) + len_gamma(3)) as u64;
        data.extend_from_slice(&[0; 8]);
        data.push(0x80);
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0x02, 0x80]);

        let mut list = SemiExternalGammaList::build(data.as_slice(), 2, Some(3)).unwrap();
        assert_eq!(list.get(2).unwrap(), 3);
        assert!(SemiExternalGammaList::build(data.as_slice(), 2, Some(4)).is_err());
        assert!(matches!(
            SemiExternalGammaList::build(data.as_slice(), 2, None),
            Err(Error::MalformedStream { bit_offset }) if bit_offset == end_of_codes
        ));
    }

    #[test]
    fn test_fork_and_shared() {
        let values: Vec<u64> = (0..100).collect();
        let data: Arc<[u8]> = stream(&values).into();
        let list = SemiExternalGammaList::build(data, 16, Some(100)).unwrap();
        let mut forked = list.fork();
        assert_eq!(forked.get(99).unwrap(), 99);

        let shared = list.into_shared();
        std::thread::scope(|s| {
            for t in 0..4u64 {
                let shared = &shared;
                s.spawn(move || {
                    for i in (t..100).step_by(4) {
                        assert_eq!(shared.get(i).unwrap(), i);
                    }
                });
            }
        });
        assert_eq!(shared.into_inner().len(), 100);
    }
}
