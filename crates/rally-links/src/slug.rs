use rand::Rng;

pub const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random slug of `len` lowercase alphanumerics.
pub fn random_slug(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SLUG_ALPHABET[rng.gen_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// A custom alias must look exactly like a generated slug.
pub fn is_valid_slug(candidate: &str, min_len: usize, max_len: usize) -> bool {
    (min_len..=max_len).contains(&candidate.len())
        && candidate
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Coarse visitor fingerprint: a short Blake3 hash of ip + user agent. Only
/// approximates "the same visitor"; never treated as a credential.
pub fn fingerprint(ip: Option<&str>, user_agent: Option<&str>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ip.unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.unwrap_or("").as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_slug_shape() {
        for _ in 0..50 {
            let slug = random_slug(6);
            assert_eq!(slug.len(), 6);
            assert!(is_valid_slug(&slug, 6, 8));
        }
    }

    #[test]
    fn test_alias_validation() {
        assert!(is_valid_slug("abc123", 6, 8));
        assert!(is_valid_slug("abcd1234", 6, 8));
        assert!(!is_valid_slug("abc12", 6, 8)); // too short
        assert!(!is_valid_slug("abc123456", 6, 8)); // too long
        assert!(!is_valid_slug("ABC123", 6, 8)); // uppercase
        assert!(!is_valid_slug("abc-12", 6, 8)); // punctuation
    }

    #[test]
    fn test_fingerprint_is_stable_and_coarse() {
        let a = fingerprint(Some("10.0.0.1"), Some("Mozilla/5.0"));
        let b = fingerprint(Some("10.0.0.1"), Some("Mozilla/5.0"));
        let c = fingerprint(Some("10.0.0.2"), Some("Mozilla/5.0"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        // Missing parts still fingerprint
        assert_ne!(fingerprint(None, None), "");
    }
}
