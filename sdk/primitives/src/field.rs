//! Field element encoding.
//!
//! All public values (roots, addresses, signature coordinates) live in the
//! BLS12-381 scalar field. Bytes are little-endian canonical representations;
//! hex strings are big-endian with a `0x` prefix so they read like integers.

use ark_ff::{BigInteger, PrimeField};
use thiserror::Error;

pub use ark_bls12_381::Fr;

/// Errors raised when decoding external field encodings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("value is not a canonical field element")]
    NonCanonical,
}

/// Convert a field element to its 32-byte little-endian representation
pub fn fr_to_bytes(f: &Fr) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

/// Decode a canonical little-endian field element.
///
/// Values at or above the modulus are rejected instead of reduced, so every
/// element has exactly one accepted encoding.
pub fn fr_from_bytes(bytes: &[u8; 32]) -> Result<Fr, FieldError> {
    let f = Fr::from_le_bytes_mod_order(bytes);
    if fr_to_bytes(&f) != *bytes {
        return Err(FieldError::NonCanonical);
    }
    Ok(f)
}

/// Big-endian `0x`-prefixed hex
pub fn fr_to_hex(f: &Fr) -> String {
    let mut bytes = fr_to_bytes(f);
    bytes.reverse();
    format!("0x{}", hex::encode(bytes))
}

/// Parse big-endian hex, with or without the `0x` prefix
pub fn fr_from_hex(s: &str) -> Result<Fr, FieldError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let raw = hex::decode(digits).map_err(|e| FieldError::InvalidHex(e.to_string()))?;
    if raw.len() != 32 {
        return Err(FieldError::InvalidLength(raw.len()));
    }
    let mut bytes = [0u8; 32];
    for (dst, src) in bytes.iter_mut().zip(raw.iter().rev()) {
        *dst = *src;
    }
    fr_from_bytes(&bytes)
}

/// Narrow a field element to `u64`, if it fits
pub fn fr_to_u64(f: &Fr) -> Option<u64> {
    let bytes = fr_to_bytes(f);
    if bytes[8..].iter().any(|b| *b != 0) {
        return None;
    }
    let mut le = [0u8; 8];
    le.copy_from_slice(&bytes[..8]);
    Some(u64::from_le_bytes(le))
}

/// Serde adapter: a single field element as a hex string
pub mod serde_fr {
    use super::{Fr, fr_from_hex, fr_to_hex};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(f: &Fr, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&fr_to_hex(f))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(d)?;
        fr_from_hex(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter: a vector of field elements as hex strings
pub mod serde_fr_vec {
    use super::{Fr, fr_from_hex, fr_to_hex};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(v: &[Fr], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(v.iter().map(fr_to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Fr>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter()
            .map(|s| fr_from_hex(s).map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn test_hex_is_big_endian() {
        let f = Fr::from(0x0102u64);
        let s = fr_to_hex(&f);
        assert!(s.starts_with("0x"));
        assert!(s.ends_with("0102"));
        assert_eq!(fr_from_hex(&s).unwrap(), f);
        assert_eq!(fr_from_hex(s.trim_start_matches("0x")).unwrap(), f);
    }

    #[test]
    fn test_non_canonical_rejected() {
        // 2^256 - 1 is far above the modulus
        let bytes = [0xffu8; 32];
        assert_eq!(fr_from_bytes(&bytes), Err(FieldError::NonCanonical));
    }

    #[test]
    fn test_bad_hex_length() {
        assert_eq!(fr_from_hex("0x0102"), Err(FieldError::InvalidLength(2)));
        assert!(matches!(fr_from_hex("0xzz"), Err(FieldError::InvalidHex(_))));
    }

    #[test]
    fn test_to_u64() {
        assert_eq!(fr_to_u64(&Fr::from(42u64)), Some(42));
        assert_eq!(fr_to_u64(&Fr::from(u64::MAX)), Some(u64::MAX));
        let big = Fr::from(u64::MAX) + Fr::from(1u64);
        assert_eq!(fr_to_u64(&big), None);
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Wrapper {
        #[serde(with = "serde_fr")]
        one: Fr,
        #[serde(with = "serde_fr_vec")]
        many: Vec<Fr>,
    }

    #[test]
    fn test_serde_adapters() {
        let w = Wrapper {
            one: Fr::from(7u64),
            many: vec![Fr::from(1u64), Fr::from(2u64)],
        };
        let json = serde_json::to_string(&w).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}
