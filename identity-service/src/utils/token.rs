//! Authkey generation, format checks and digests.

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of every authkey, primary or advanced.
pub const AUTHKEY_LENGTH: usize = 40;

/// Separator between several keys presented in one header.
pub const AUTHKEY_SEPARATOR: char = ',';

pub fn generate_authkey() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTHKEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Exact length and ASCII alphanumerics only.
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == AUTHKEY_LENGTH && candidate.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Hex SHA-256 digest used as the stored form and lookup index of a key.
pub fn hash_authkey(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

pub fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// First and last four characters, kept for display.
pub fn display_parts(raw: &str) -> (String, String) {
    let start = raw.get(..4).unwrap_or(raw).to_string();
    let end = raw
        .len()
        .checked_sub(4)
        .and_then(|i| raw.get(i..))
        .unwrap_or(raw)
        .to_string();
    (start, end)
}

/// Splits a raw header value into candidate keys. Empty segments are dropped.
pub fn split_candidates(raw: &str) -> Vec<&str> {
    raw.split(AUTHKEY_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_well_formed_and_distinct() {
        let a = generate_authkey();
        let b = generate_authkey();
        assert!(is_well_formed(&a));
        assert!(is_well_formed(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let key = generate_authkey();
        assert!(!is_well_formed(&key[..39]));
        assert!(!is_well_formed(&format!("{}a", key)));
        assert!(!is_well_formed(&format!("{}-{}", &key[..20], &key[21..])));
        assert!(!is_well_formed(""));
    }

    #[test]
    fn hashing_is_stable_and_comparable() {
        let key = generate_authkey();
        let digest = hash_authkey(&key);
        assert_eq!(digest.len(), 64);
        assert!(digests_match(&digest, &hash_authkey(&key)));
        assert!(!digests_match(&digest, &hash_authkey(&generate_authkey())));
    }

    #[test]
    fn candidates_split_on_comma() {
        assert_eq!(split_candidates("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_candidates(" , ").is_empty());
    }

    #[test]
    fn display_parts_keep_edges() {
        let (start, end) = display_parts("abcdEFGH1234wxyz");
        assert_eq!(start, "abcd");
        assert_eq!(end, "wxyz");
    }
}
