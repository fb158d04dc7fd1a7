//! Canonical request signing for the merchant payment protocol.
//!
//! Every payment request and notification carries a `sign` field computed
//! over the remaining fields:
//! ```text
//! canonical = sort("k1=v1", "k2=v2", ...).join("&") + "&key=" + secret
//! sign      = UPPERHEX(MD5(canonical))            for sign_type MD5
//!           | UPPERHEX(HMAC-SHA256(secret, canonical)) for sign_type HMAC-SHA256
//! ```
//! Pairs are sorted by the full `name=value` string, byte-wise. The platform
//! verifies against exactly this rendering.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// Name of the field that carries the signature itself.
pub const SIGN_FIELD: &str = "sign";

/// Name of the field that declares the signature algorithm.
pub const SIGN_TYPE_FIELD: &str = "sign_type";

/// Signature algorithm of the payment protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignType {
    /// Unkeyed MD5 over the canonical string (platform default).
    #[default]
    Md5,
    /// HMAC-SHA256 keyed with the merchant secret.
    HmacSha256,
}

impl SignType {
    /// Wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::HmacSha256 => "HMAC-SHA256",
        }
    }
}

impl std::fmt::Display for SignType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MD5" => Ok(Self::Md5),
            "HMAC-SHA256" => Ok(Self::HmacSha256),
            other => Err(CryptoError::UnsupportedSignType(other.to_string())),
        }
    }
}

/// Build the canonical string that gets hashed.
///
/// The `sign` field is skipped wherever it appears.
///
/// # Example
/// ```
/// use wxbroker_crypto::canonical_string;
///
/// let fields = [("b", "2"), ("a", "1"), ("sign", "XYZ")];
/// assert_eq!(canonical_string(fields, "secret"), "a=1&b=2&key=secret");
/// ```
pub fn canonical_string<I, K, V>(fields: I, secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<String> = fields
        .into_iter()
        .filter(|(name, _)| name.as_ref() != SIGN_FIELD)
        .map(|(name, value)| format!("{}={}", name.as_ref(), value.as_ref()))
        .collect();
    pairs.sort_unstable();
    pairs.push(format!("key={}", secret));
    pairs.join("&")
}

/// Sign a field set with the shared secret.
///
/// Returns the uppercase hex digest, or `InvalidKeyLength` if the HMAC
/// implementation refuses the key.
///
/// # Example
/// ```
/// use wxbroker_crypto::{sign, verify, SignType};
///
/// let fields = [("appid", "wx123"), ("total_fee", "100")];
/// let signature = sign(fields, "merchant-key", SignType::HmacSha256).unwrap();
/// assert!(verify(fields, &signature, "merchant-key", SignType::HmacSha256));
/// ```
pub fn sign<I, K, V>(fields: I, secret: &str, sign_type: SignType) -> CryptoResult<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let canonical = canonical_string(fields, secret);
    match sign_type {
        SignType::Md5 => Ok(hex::encode_upper(md5::compute(canonical.as_bytes()).0)),
        SignType::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
                CryptoError::InvalidKeyLength {
                    expected: "HMAC-SHA256 key",
                    actual: secret.len(),
                }
            })?;
            mac.update(canonical.as_bytes());
            Ok(hex::encode_upper(mac.finalize().into_bytes()))
        }
    }
}

/// Verify a signature against a field set.
///
/// Comparison is case-sensitive and constant-time.
pub fn verify<I, K, V>(fields: I, expected: &str, secret: &str, sign_type: SignType) -> bool
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    sign(fields, secret, sign_type)
        .map(|computed| constant_time_eq(computed.as_bytes(), expected.as_bytes()))
        .unwrap_or(false)
}

/// Like [`verify`], but returns `CryptoError::SignatureMismatch` on failure.
pub fn require_valid<I, K, V>(
    fields: I,
    expected: &str,
    secret: &str,
    sign_type: SignType,
) -> CryptoResult<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    if verify(fields, expected, secret, sign_type) {
        Ok(())
    } else {
        Err(CryptoError::SignatureMismatch)
    }
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_canonical_sorts_by_full_pair() {
        // "a=2" < "a_b=1" because '=' (0x3d) sorts before '_' (0x5f)
        let fields = [("a_b", "1"), ("a", "2")];
        assert_eq!(canonical_string(fields, "k"), "a=2&a_b=1&key=k");
    }

    #[test]
    fn test_canonical_skips_sign() {
        let fields = [("sign", "ABC"), ("x", "1")];
        assert_eq!(canonical_string(fields, "k"), "x=1&key=k");
    }

    #[test]
    fn test_md5_known_vector() {
        // md5("a=1&key=k")
        let expected = hex::encode_upper(md5::compute(b"a=1&key=k").0);
        assert_eq!(sign([("a", "1")], "k", SignType::Md5).unwrap(), expected);
        assert_eq!(expected.len(), 32);
    }

    #[test]
    fn test_hmac_differs_from_md5() {
        let fields = [("a", "1")];
        let md5 = sign(fields, "k", SignType::Md5).unwrap();
        let hmac = sign(fields, "k", SignType::HmacSha256).unwrap();
        assert_ne!(md5, hmac);
        assert_eq!(hmac.len(), 64);
        assert!(hmac.chars().all(|c| !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let fields = [("a", "1")];
        let signature = sign(fields, "k", SignType::Md5).unwrap();
        assert!(verify(fields, &signature, "k", SignType::Md5));
        assert!(!verify(
            fields,
            &signature.to_lowercase(),
            "k",
            SignType::Md5
        ));
    }

    #[test]
    fn test_order_of_input_irrelevant() {
        let mut a = BTreeMap::new();
        a.insert("x", "1");
        a.insert("y", "2");
        let b = vec![("y", "2"), ("x", "1")];
        assert_eq!(
            sign(&a, "k", SignType::HmacSha256).unwrap(),
            sign(b, "k", SignType::HmacSha256).unwrap()
        );
    }

    #[test]
    fn test_sign_type_parse() {
        assert_eq!("MD5".parse::<SignType>().unwrap(), SignType::Md5);
        assert_eq!(
            "HMAC-SHA256".parse::<SignType>().unwrap(),
            SignType::HmacSha256
        );
        assert!(matches!(
            "SHA1".parse::<SignType>(),
            Err(CryptoError::UnsupportedSignType(_))
        ));
    }

    #[test]
    fn test_hmac_accepts_any_key_length() {
        let fields = [("a", "1")];
        let long_key = "k".repeat(200);
        for key in ["", "k", long_key.as_str()] {
            let signature = sign(fields, key, SignType::HmacSha256).unwrap();
            assert!(verify(fields, &signature, key, SignType::HmacSha256));
        }
    }

    #[test]
    fn test_require_valid() {
        let fields = [("a", "1")];
        let signature = sign(fields, "k", SignType::Md5).unwrap();
        assert!(require_valid(fields, &signature, "k", SignType::Md5).is_ok());
        assert_eq!(
            require_valid(fields, "BAD", "k", SignType::Md5),
            Err(CryptoError::SignatureMismatch)
        );
    }
}
