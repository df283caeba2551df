//! # frontcoded
//!
//! Compact, immutable, randomly accessible lists of strings compressed by
//! front coding, plus semi-external random access to γ-coded integer streams.
//!
//! ## Features
//!
//! - **Prefix sharing**: each string stores only the suffix that differs from
//!   the previous one, plus the length of the shared prefix
//! - **Bounded random access**: a full copy every `ratio` strings caps `get`
//!   at `ratio` record decodes
//! - **Two backends, one decoder**: owned bytes in memory, or a
//!   memory-mapped file built by streaming input straight to disk
//! - **UTF-8 aware**: shared prefixes never split a multi-byte sequence
//!
//! ## Example
//!
//! ```rust
//! use frontcoded::{Config, FrontCodedList};
//!
//! let list = FrontCodedList::from_strings(Config::new(2), ["abc", "abd", "abz", "xyz"])?;
//!
//! assert_eq!(list.len(), 4);
//! assert_eq!(list.get(1)?, b"abd");
//! assert_eq!(list.get_str(3)?, "xyz");
//!
//! // Reuse one buffer across lookups.
//! let mut buf = Vec::new();
//! list.get_into(2, &mut buf)?;
//! assert_eq!(buf, b"abz");
//! # Ok::<(), frontcoded::Error>(())
//! ```
//!
//! Lists too large for memory are built on disk and mapped back:
//!
//! ```rust,no_run
//! use frontcoded::{mapped, Config};
//!
//! let words = ["alpha", "alphabet", "beta"];
//! mapped::build("/tmp/words", Config::default(), words)?;
//! let list = mapped::load("/tmp/words")?;
//! assert_eq!(list.get_str(1)?, "alphabet");
//! # Ok::<(), frontcoded::Error>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod error;
pub mod front_coded;
pub mod mapped;
pub mod semi_external;
pub mod source;

pub use error::{Error, Result};
pub use front_coded::{FrontCodedBuilder, FrontCodedList, FrontCodedStats};
pub use mapped::MappedFrontCodedList;
pub use semi_external::{GammaStreamBuilder, SemiExternalGammaList, SharedGammaList};
pub use source::{ByteSource, MappedBytes};

/// Default distance between full copies.
pub const DEFAULT_RATIO: u32 = 8;

/// Configuration for building a front-coded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Distance between full copies; a `get` decodes at most this many
    /// records. Must be at least 1.
    pub ratio: u32,
    /// Treat strings as UTF-8 text: input is validated and shared prefixes
    /// end on codepoint boundaries. Otherwise strings are raw bytes.
    pub utf8: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            utf8: true,
        }
    }
}

impl Config {
    /// A UTF-8 configuration with the given ratio.
    pub fn new(ratio: u32) -> Self {
        Self {
            ratio,
            ..Self::default()
        }
    }

    /// Set whether strings are UTF-8 text.
    pub fn utf8(mut self, utf8: bool) -> Self {
        self.utf8 = utf8;
        self
    }

    /// Check that the configuration can be built.
    pub fn validate(&self) -> Result<()> {
        if self.ratio == 0 {
            return Err(Error::InvalidConfiguration(
                "ratio must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let config = Config::default();
        assert_eq!(config.ratio, DEFAULT_RATIO);
        assert!(config.utf8);
        assert!(config.validate().is_ok());

        let raw = Config::new(3).utf8(false);
        assert_eq!(raw, Config { ratio: 3, utf8: false });
        assert!(matches!(
            Config::new(0).validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}

#[cfg(test)]
mod proptests;
