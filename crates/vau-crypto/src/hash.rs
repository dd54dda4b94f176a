//! SHA-256 digests for transcript key confirmation.

use sha2::{Digest, Sha256};

/// SHA-256 digest length.
pub const DIGEST_LEN: usize = 32;

/// Compute SHA-256 over `data`.
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_abc() {
        let expected =
            hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap();
        assert_eq!(sha256(b"abc").to_vec(), expected);
    }
}
