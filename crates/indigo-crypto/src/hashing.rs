/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Hash a sequence of fields with length prefixes so that field boundaries
/// cannot be shifted between parts.
pub fn hash_parts(domain: &str, parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new_derive_key(domain);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash(b"indigo"), hash(b"indigo"));
        assert_ne!(hash(b"indigo"), hash(b"indigo!"));
    }

    #[test]
    fn test_hash_parts_boundaries_matter() {
        let a = hash_parts("test", &[b"ab", b"c"]);
        let b = hash_parts("test", &[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_parts_domain_separated() {
        let a = hash_parts("domain-a", &[b"x"]);
        let b = hash_parts("domain-b", &[b"x"]);
        assert_ne!(a, b);
    }
}
