//! Error types for front-coded lists and gamma streams.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by list construction, access and persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// An index outside `[0, len)` was requested.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: u64,
        /// The number of elements.
        len: u64,
    },

    /// A structural invariant of the encoded data does not hold.
    #[error("corrupt store: {0}")]
    CorruptStore(String),

    /// Build parameters are unusable (e.g. a zero ratio).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An input element was rejected during construction.
    #[error("invalid input at element {index}: {reason}")]
    InvalidInput {
        /// Position of the element in construction order.
        index: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// A gamma code runs past the end of the stream, or its prefix is too
    /// long for a `u64`.
    #[error("malformed stream: invalid or truncated code at bit {bit_offset}")]
    MalformedStream {
        /// Bit offset at which decoding started failing.
        bit_offset: u64,
    },

    /// One of the files of a stored list does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// An I/O error from the underlying files or mapping.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptStore(msg.into())
    }

    /// Reinterprets a truncated code as corruption of a store whose length
    /// is known up front.
    pub(crate) fn into_corrupt(self) -> Self {
        match self {
            Error::MalformedStream { bit_offset } => Error::CorruptStore(format!(
                "record runs past the end of the data at bit {bit_offset}"
            )),
            other => other,
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_corrupt() {
        let err = Error::MalformedStream { bit_offset: 17 }.into_corrupt();
        assert!(matches!(err, Error::CorruptStore(ref m) if m.contains("17")));

        let err = Error::IndexOutOfRange { index: 3, len: 2 }.into_corrupt();
        assert!(matches!(err, Error::IndexOutOfRange { index: 3, len: 2 }));
    }

    #[test]
    fn test_display() {
        let err = Error::IndexOutOfRange { index: 5, len: 4 };
        assert_eq!(err.to_string(), "index 5 out of range for length 4");
        let err = Error::FileNotFound(PathBuf::from("/tmp/x.pointers"));
        assert_eq!(err.to_string(), "file not found: /tmp/x.pointers");
    }
}
