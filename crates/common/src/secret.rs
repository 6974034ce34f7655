//! Secret wrapper for credential material

use std::fmt;

use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs, zeroized on drop.
///
/// Deserializes transparently from the inner type so credential records can
/// be read straight into `Secret<String>` fields without an intermediate
/// plain-text copy surviving the parse.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Whether the wrapped string is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<'de, T: Zeroize + Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Secret::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_redacts_debug() {
        let secret = Secret::new(String::from("consumer-secret"));
        let debug = format!("{:?}", secret);
        assert_eq!(debug, "[REDACTED]");
        assert!(!debug.contains("consumer-secret"));
    }

    #[test]
    fn test_secret_redacts_display() {
        let secret = Secret::new(String::from("consumer-secret"));
        assert_eq!(secret.to_string(), "[REDACTED]");
    }

    #[test]
    fn test_secret_exposes_value() {
        let secret = Secret::new(String::from("consumer-secret"));
        assert_eq!(secret.expose(), "consumer-secret");
    }

    #[test]
    fn test_secret_deserializes_from_inner_type() {
        #[derive(Deserialize)]
        struct Keys {
            token: Secret<String>,
        }

        let keys: Keys = serde_json::from_str(r#"{"token":"tok-123"}"#).unwrap();
        assert_eq!(keys.token.expose(), "tok-123");
        assert_eq!(format!("{:?}", keys.token), "[REDACTED]");
    }

    #[test]
    fn test_is_blank() {
        assert!(Secret::new(String::new()).is_blank());
        assert!(Secret::new(String::from("  \t")).is_blank());
        assert!(!Secret::new(String::from("x")).is_blank());
    }
}
