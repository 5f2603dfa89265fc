//! Key Validator Module
//!
//! Rejects malformed cache keys before they reach a backend.

use crate::error::{InvalidKeyError, KeyViolation};

/// Characters that must never appear in a key.
pub const RESERVED_CHARACTERS: &[char] = &['{', '}', '(', ')', '/', '\\', '@', ':'];

// == Key Validator ==
/// Validates keys against the supported charset `[A-Za-z0-9_.-]` and a
/// maximum byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyValidator {
    max_length: usize,
}

impl KeyValidator {
    /// Creates a validator accepting keys up to `max_length` bytes.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Maximum accepted key length in bytes.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    // == Validate ==
    /// Checks a key, returning the first rule it breaks.
    pub fn validate(&self, key: &str) -> Result<(), InvalidKeyError> {
        self.check(key).map_err(|violation| InvalidKeyError {
            key: key.to_string(),
            violation,
        })
    }

    /// Validates every key in `keys`, stopping at the first bad one.
    pub fn validate_all<'a, I>(&self, keys: I) -> Result<(), InvalidKeyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().try_for_each(|key| self.validate(key))
    }

    fn check(&self, key: &str) -> Result<(), KeyViolation> {
        if key.is_empty() {
            return Err(KeyViolation::Empty);
        }

        if key.len() > self.max_length {
            return Err(KeyViolation::TooLong {
                len: key.len(),
                max: self.max_length,
            });
        }

        if let Some(c) = key.chars().find(|c| RESERVED_CHARACTERS.contains(c)) {
            return Err(KeyViolation::ReservedCharacter(c));
        }

        if let Some(c) = key.chars().find(|c| !is_supported(*c)) {
            return Err(KeyViolation::UnsupportedCharacter(c));
        }

        // Would be rewritten by URL normalization on the remote backend.
        if key == "." || key == ".." {
            return Err(KeyViolation::DotSegment);
        }

        Ok(())
    }
}

impl Default for KeyValidator {
    fn default() -> Self {
        Self::new(super::MAX_KEY_LENGTH)
    }
}

fn is_supported(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}
