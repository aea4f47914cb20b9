//! Ethereum address derivation.
//!
//! Maps a candidate private key to its EIP-55 checksummed account address:
//! secp256k1 public key, Keccak-256 of the uncompressed point (without the
//! 0x04 prefix byte), last 20 bytes of the digest. Deterministic: the same
//! candidate always yields the same address.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use sha3::{Digest, Keccak256};

use crate::keyspace::Candidate;

/// Derive the checksummed `0x…` address for a candidate key.
///
/// Fails only if the candidate is not a valid secp256k1 scalar (zero or not
/// below the group order) — a vanishingly small slice of the keyspace.
pub fn derive_address(candidate: &Candidate) -> anyhow::Result<String> {
    let secret = SecretKey::from_bytes(candidate.as_bytes().into()).map_err(|_| {
        anyhow::anyhow!(
            "candidate {} is not a valid secp256k1 private key",
            candidate.to_hex()
        )
    })?;

    let public = secret.public_key();
    let point = public.to_encoded_point(false);
    // Skip the 0x04 prefix, hash the 64 bytes of x || y
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);

    Ok(checksum_encode(&address))
}

/// EIP-55 checksum encode a raw 20-byte address.
///
/// Hex letters are uppercased wherever the corresponding nibble of the
/// Keccak-256 digest of the lowercase hex address is >= 8.
fn checksum_encode(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let digest = Keccak256::digest(lower.as_bytes());

    let mut encoded = String::with_capacity(42);
    encoded.push_str("0x");

    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            digest[i / 2] >> 4
        } else {
            digest[i / 2] & 0x0f
        };

        if c.is_ascii_alphabetic() && nibble >= 8 {
            encoded.push(c.to_ascii_uppercase());
        } else {
            encoded.push(c);
        }
    }

    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str) -> Candidate {
        Candidate::from_hex(text).unwrap()
    }

    #[test]
    fn test_known_key_vector() {
        // The address of private key 1 is a fixed point of the secp256k1 /
        // Keccak pipeline, verified against go-ethereum and standard wallets.
        let one = candidate(&format!("{}1", "0".repeat(63)));
        assert_eq!(
            derive_address(&one).unwrap(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let c = Candidate::from_password("correct horse battery staple");
        let first = derive_address(&c).unwrap();
        let second = derive_address(&c).unwrap();
        assert_eq!(first, second);

        let other = Candidate::from_password("correct horse battery stapler");
        assert_ne!(first, derive_address(&other).unwrap());
    }

    #[test]
    fn test_zero_key_is_rejected() {
        let zero = candidate(&"0".repeat(64));
        assert!(derive_address(&zero).is_err());
    }

    #[test]
    fn test_address_shape() {
        let c = candidate(&format!("{}2", "0".repeat(63)));
        let address = derive_address(&c).unwrap();
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
    }

    #[test]
    fn test_checksum_vectors() {
        // Vectors from the EIP-55 specification.
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let raw: [u8; 20] = hex::decode(expected[2..].to_lowercase())
                .unwrap()
                .try_into()
                .unwrap();
            assert_eq!(checksum_encode(&raw), expected);
        }
    }
}
