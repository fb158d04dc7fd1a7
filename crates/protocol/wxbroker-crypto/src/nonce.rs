//! Random nonce strings.

use rand::Rng;

/// Alphabet accepted for merchant `nonce_str` values.
pub const NONCE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Default nonce length (the platform's maximum for `nonce_str`).
pub const DEFAULT_NONCE_LEN: usize = 32;

/// Generate a random string of `len` characters from [`NONCE_ALPHABET`].
pub fn random_nonce(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_length_and_alphabet() {
        let nonce = random_nonce(DEFAULT_NONCE_LEN);
        assert_eq!(nonce.len(), 32);
        assert!(nonce.bytes().all(|b| NONCE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(random_nonce(32), random_nonce(32));
    }

    #[test]
    fn test_empty_nonce() {
        assert_eq!(random_nonce(0), "");
    }
}
