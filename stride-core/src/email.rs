//! Email addresses

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::{Validate, ValidationErrors};

/// A syntactically valid email address.
///
/// Construction goes through [`FromStr`], so holding a value of this
/// type means the address already passed validation. The service does
/// its own (stricter) checks; this only catches typos before a network
/// round trip is spent on them.
#[derive(Clone, Serialize, Deserialize, Validate, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EmailAddress {
    #[validate(email)]
    inner: String,
}

impl std::fmt::Debug for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EmailAddress").field(&self.inner).finish()
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for EmailAddress {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, ValidationErrors> {
        let email = Self {
            inner: s.trim().to_string(),
        };
        email.validate()?;
        Ok(email)
    }
}

impl EmailAddress {
    /// Get a string reference of this email address
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    /// Consume the wrapper and return the plain address
    pub fn into_string(self) -> String {
        self.inner
    }
}
