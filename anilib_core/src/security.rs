//! Secret handling for registry credentials
//!
//! `SecureString` zeros its buffer on drop and never prints its content through
//! `Debug`, so credentials can travel inside configuration structs that get
//! logged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

/// A string that zeros its memory when dropped
#[derive(Clone, Default, Zeroize)]
pub struct SecureString {
    inner: Vec<u8>,
}

impl SecureString {
    /// Create a new SecureString from a regular string
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            inner: s.into().into_bytes(),
        }
    }

    /// Try to get the string as a str reference
    pub fn to_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.inner)
    }

    /// Copy the secret out as a regular String.
    ///
    /// The copy is NOT zeroed on drop; keep its lifetime short.
    pub fn expose_secret(&self) -> String {
        String::from_utf8_lossy(&self.inner).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Constant-time comparison
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        if self.inner.len() != other.inner.len() {
            return false;
        }

        let mut result = 0u8;
        for (a, b) in self.inner.iter().zip(other.inner.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.constant_time_eq(other)
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for SecureString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(&self.inner))
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_does_not_leak() {
        let secret = SecureString::new("hunter2");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_expose_and_compare() {
        let a = SecureString::new("password");
        let b = SecureString::from("password");
        let c = SecureString::from("Password");

        assert_eq!(a.expose_secret(), "password");
        assert_eq!(a.to_str().unwrap(), "password");
        assert!(a.constant_time_eq(&b));
        assert!(!a.constant_time_eq(&c));
        assert!(!a.is_empty());
        assert!(SecureString::default().is_empty());
    }

    #[test]
    fn test_serde_roundtrip_as_plain_string() {
        let secret = SecureString::new("s3cret");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"s3cret\"");

        let back: SecureString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }
}
