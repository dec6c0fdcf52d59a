use crate::Generator;
use std::sync::atomic::{AtomicU64, Ordering};
use tinylink_core::shortcode::CODE_LENGTH;
use tinylink_core::{CoreError, ShortCode};

/// A short code generator using sequential counters.
///
/// This generator produces codes like "wh000000", "wh000001", etc. The
/// counter fills whatever the prefix leaves of the fixed code length and
/// wraps around once that width is exhausted, so codes repeat after
/// `10^(8 - prefix.len())` draws.
///
/// For multi-node deployments, each node should use a unique prefix.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
    modulus: u64,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
            prefix: self.prefix.clone(),
            modulus: self.modulus,
        }
    }
}

impl SeqGenerator {
    /// Creates a new sequential generator with a custom prefix.
    ///
    /// The prefix must be alphanumeric and shorter than a full code.
    pub fn with_prefix(prefix: impl Into<String>) -> Result<Self, CoreError> {
        Self::with_offset(prefix, 0)
    }

    /// Creates a new sequential generator starting from a specific counter value.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Result<Self, CoreError> {
        let prefix = prefix.into();

        if prefix.len() >= CODE_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "prefix must be shorter than {CODE_LENGTH} characters: '{prefix}'"
            )));
        }
        if !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidShortCode(format!(
                "prefix must be alphanumeric: '{prefix}'"
            )));
        }

        let width = (CODE_LENGTH - prefix.len()) as u32;
        Ok(Self {
            counter: AtomicU64::new(offset),
            prefix,
            modulus: 10_u64.pow(width),
        })
    }

    fn width(&self) -> usize {
        CODE_LENGTH - self.prefix.len()
    }
}

impl Generator for SeqGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let count = self.counter.fetch_add(1, Ordering::SeqCst) % self.modulus;
        let code = format!("{}{:0width$}", self.prefix, count, width = self.width());
        ShortCode::new_unchecked(code)
    }
}
