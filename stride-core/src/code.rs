//! Verification code input

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::{Validate, ValidationError, ValidationErrors};

/// An editable buffer for one fixed-length numeric code.
///
/// Per-cell entry widgets are a presentation affordance on top of this;
/// the underlying contract is a single bounded string of ASCII digits.
/// The protocol-facing value only exists once all positions are
/// populated, see [`CodeBuffer::complete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBuffer {
    digits: String,
}

impl CodeBuffer {
    /// Number of digits in a complete code
    pub const LENGTH: usize = 6;

    /// An empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one digit. Returns false (and leaves the buffer untouched)
    /// when the character is not an ASCII digit or the buffer is full.
    pub fn push(&mut self, c: char) -> bool {
        if c.is_ascii_digit() && self.digits.len() < Self::LENGTH {
            self.digits.push(c);
            true
        } else {
            false
        }
    }

    /// Delete the last entered digit
    pub fn pop(&mut self) -> Option<char> {
        self.digits.pop()
    }

    /// Drop all entered digits
    pub fn clear(&mut self) {
        self.digits.clear();
    }

    /// Append every ASCII digit found in `text` until the buffer is full.
    /// Separators (spaces, dashes) in pasted input are skipped.
    pub fn fill_from_str(&mut self, text: &str) {
        for c in text.chars() {
            if self.digits.len() == Self::LENGTH {
                break;
            }
            self.push(c);
        }
    }

    /// Number of populated positions
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    /// Whether nothing has been entered yet
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Whether all positions are populated
    pub fn is_complete(&self) -> bool {
        self.digits.len() == Self::LENGTH
    }

    /// The digits entered so far
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// The submittable value, available only when the buffer is full
    pub fn complete(&self) -> Option<DigitCode> {
        self.is_complete().then(|| DigitCode {
            inner: self.digits.clone(),
        })
    }
}

/// A complete 6-digit verification code.
///
/// Emailed device codes and authenticator (TOTP) codes share this shape.
#[derive(Clone, Serialize, Deserialize, Validate, Eq, PartialEq)]
#[serde(transparent)]
pub struct DigitCode {
    #[validate(length(equal = 6))]
    #[validate(custom = "all_ascii_digits")]
    inner: String,
}

impl std::fmt::Debug for DigitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DigitCode").field(&self.inner).finish()
    }
}

impl std::fmt::Display for DigitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl FromStr for DigitCode {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, ValidationErrors> {
        let code = Self {
            inner: s.to_string(),
        };
        code.validate()?;
        Ok(code)
    }
}

impl DigitCode {
    /// Get a string reference of this code
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    /// Consume the wrapper and return the plain code
    pub fn into_string(self) -> String {
        self.inner
    }
}

/// A single-use backup code for accounts with 2FA enabled.
///
/// Backup codes are free-form (the service decides their shape); the
/// client only requires them to be non-empty after trimming.
#[derive(Clone, Serialize, Deserialize, Validate, Eq, PartialEq)]
#[serde(transparent)]
pub struct BackupCode {
    #[validate(length(min = 1))]
    inner: String,
}

impl std::fmt::Debug for BackupCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BackupCode").field(&self.inner).finish()
    }
}

impl std::fmt::Display for BackupCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl FromStr for BackupCode {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, ValidationErrors> {
        let code = Self {
            inner: s.trim().to_string(),
        };
        code.validate()?;
        Ok(code)
    }
}

impl BackupCode {
    /// Get a string reference of this code
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    /// Consume the wrapper and return the plain code
    pub fn into_string(self) -> String {
        self.inner
    }
}

fn all_ascii_digits(s: &str) -> Result<(), ValidationError> {
    if s.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("verification codes are numeric"))
    }
}
