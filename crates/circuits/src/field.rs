//! Field element conversions.
//!
//! Every value entering the hash oracle is an `Fr`. Raw inputs are
//! canonicalized by reduction modulo the BN254 scalar field order:
//! - bytes are read big-endian and reduced;
//! - decimal and `0x` hex strings are parsed as unsigned integers and reduced;
//! - negative or non-numeric strings are rejected.
//!
//! `keccak_to_field` mirrors the usual "keccak256 then drop the low byte"
//! mapping so the result is always below the modulus.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use num_traits::Num;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Size in bytes of a serialized field element.
pub const FIELD_BYTES: usize = 32;

/// Errors while parsing field elements from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("empty field element string")]
    Empty,
    #[error("negative values are not field elements: {0}")]
    Negative(String),
    #[error("invalid numeric string: {0}")]
    InvalidNumber(String),
    #[error("expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Reduce big-endian bytes of any length into the field.
pub fn fr_from_be_bytes(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Canonical 32-byte big-endian encoding.
pub fn fr_to_be_bytes(value: &Fr) -> [u8; FIELD_BYTES] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; FIELD_BYTES];
    out[FIELD_BYTES - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Decode a 32-byte word, rejecting values that are not below the modulus.
pub fn fr_from_canonical_bytes(bytes: &[u8]) -> Option<Fr> {
    if bytes.len() != FIELD_BYTES {
        return None;
    }
    let value = Fr::from_be_bytes_mod_order(bytes);
    (fr_to_be_bytes(&value).as_slice() == bytes).then_some(value)
}

/// Parse a decimal or `0x`-prefixed hex string, reducing modulo p.
pub fn parse_fr(input: &str) -> Result<Fr, FieldError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(FieldError::Negative(trimmed.to_string()));
    }

    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex_digits) => (hex_digits, 16),
        None => (trimmed, 10),
    };
    // from_str_radix also accepts `_` separators and a leading `+`
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(FieldError::InvalidNumber(trimmed.to_string()));
    }
    let value = BigUint::from_str_radix(digits, radix)
        .map_err(|_| FieldError::InvalidNumber(trimmed.to_string()))?;

    Ok(Fr::from_be_bytes_mod_order(&value.to_bytes_be()))
}

/// Format as a `0x`-prefixed 32-byte big-endian hex string.
pub fn fr_to_hex(value: &Fr) -> String {
    format!("0x{}", hex::encode(fr_to_be_bytes(value)))
}

/// Decimal representation, as used in JSON proof exports.
pub fn fr_to_decimal(value: &Fr) -> String {
    BigUint::from_bytes_be(&fr_to_be_bytes(value)).to_str_radix(10)
}

/// keccak256(data) >> 8, interpreted big-endian.
pub fn keccak_to_field(data: &[u8]) -> Fr {
    let digest = Keccak256::digest(data);
    Fr::from_be_bytes_mod_order(&digest[..FIELD_BYTES - 1])
}

/// Lossless conversion for small integers that must fit in a u64.
pub fn fr_to_u64(value: &Fr) -> Option<u64> {
    let bytes = fr_to_be_bytes(value);
    if bytes[..FIELD_BYTES - 8].iter().any(|b| *b != 0) {
        return None;
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&bytes[FIELD_BYTES - 8..]);
    Some(u64::from_be_bytes(tail))
}
