//! Secret material holder.

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A shared secret (app secret, merchant key, callback token, AES key).
///
/// Cleared from memory on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    ///
    /// Callers must not log the returned string.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacted() {
        let secret = Secret::new("hunter2");
        let debug = format!("{:?}", secret);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_zeroize_clears_value() {
        let mut secret = Secret::new("hunter2");
        secret.zeroize();
        assert!(secret.is_empty());
    }

    #[test]
    fn test_deserialize_transparent() {
        #[derive(Deserialize)]
        struct Wrapper {
            key: Secret,
        }
        let parsed: Wrapper = toml::from_str("key = \"abc\"").unwrap();
        assert_eq!(parsed.key.expose(), "abc");
    }
}
