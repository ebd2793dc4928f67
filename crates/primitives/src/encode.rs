//! Canonical encoding and wire-field parsing for aggregation types.

use anyhow::{anyhow, Result};
use ff::{Field, PrimeField};
use num_bigint::BigUint;
use pasta_curves::vesta::Scalar as FrVesta;

use crate::types::FieldParseError;

// ——— Canonical encoding version ———

/// Version tag for canonical public-io encodings.
pub const ENC_V1: u8 = 1;

/// Modulus of the Pasta base field nullifiers live in, derived from the
/// field itself rather than a hard-coded constant.
pub fn field_modulus() -> BigUint {
    let neg_one = -FrVesta::ONE;
    BigUint::from_bytes_le(neg_one.to_repr().as_ref()) + 1u8
}

/// Parse a base-10 string into a canonical 32-byte big-endian field value.
/// Rejects non-numeric strings and values at or above the field modulus.
pub fn parse_field_decimal(s: &str) -> Result<[u8; 32], FieldParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldParseError::NonNumeric);
    }
    let value = BigUint::parse_bytes(s.as_bytes(), 10).ok_or(FieldParseError::NonNumeric)?;
    if value >= field_modulus() {
        return Err(FieldParseError::OutOfRange);
    }
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Format a 32-byte big-endian field value as its base-10 wire string.
pub fn format_field_decimal(bytes: &[u8; 32]) -> String {
    BigUint::from_bytes_be(bytes).to_str_radix(10)
}

// ——— Encoding primitives ———

pub fn encode_u8(v: u8, out: &mut Vec<u8>) {
    out.push(v);
}

pub fn encode_u32(v: u32, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn encode_u64(v: u64, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    encode_u32(bytes.len() as u32, out);
    out.extend_from_slice(bytes);
}

pub fn read_u8(data: &mut &[u8]) -> Result<u8> {
    if data.is_empty() {
        return Err(anyhow!("unexpected EOF"));
    }
    let v = data[0];
    *data = &data[1..];
    Ok(v)
}

pub fn read_u32(data: &mut &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(anyhow!("unexpected EOF"));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[..4]);
    *data = &data[4..];
    Ok(u32::from_be_bytes(buf))
}

pub fn read_u64(data: &mut &[u8]) -> Result<u64> {
    if data.len() < 8 {
        return Err(anyhow!("unexpected EOF"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[..8]);
    *data = &data[8..];
    Ok(u64::from_be_bytes(buf))
}

pub fn read_vec(data: &mut &[u8]) -> Result<Vec<u8>> {
    let len = read_u32(data)? as usize;
    if data.len() < len {
        return Err(anyhow!("unexpected EOF"));
    }
    let v = data[..len].to_vec();
    *data = &data[len..];
    Ok(v)
}

pub fn read_fixed<const N: usize>(data: &mut &[u8]) -> Result<[u8; N]> {
    if data.len() < N {
        return Err(anyhow!("unexpected EOF"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&data[..N]);
    *data = &data[N..];
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulus_matches_field_repr() {
        // p - 1 must round-trip through the field's own representation.
        let p = field_modulus();
        let p_minus_one = &p - 1u8;
        let bytes = p_minus_one.to_bytes_be();
        let mut be = [0u8; 32];
        be[32 - bytes.len()..].copy_from_slice(&bytes);
        let s = format_field_decimal(&be);
        assert_eq!(parse_field_decimal(&s).unwrap(), be);
        assert_eq!(
            parse_field_decimal(&p.to_str_radix(10)),
            Err(FieldParseError::OutOfRange)
        );
    }

    #[test]
    fn rejects_signs_and_whitespace() {
        assert!(parse_field_decimal("-5").is_err());
        assert!(parse_field_decimal("+5").is_err());
        assert!(parse_field_decimal(" 5").is_err());
    }

    #[test]
    fn read_write_roundtrip() {
        let mut out = Vec::new();
        encode_u8(7, &mut out);
        encode_u32(77, &mut out);
        encode_u64(777, &mut out);
        encode_bytes(b"abc", &mut out);
        let mut data = out.as_slice();
        assert_eq!(read_u8(&mut data).unwrap(), 7);
        assert_eq!(read_u32(&mut data).unwrap(), 77);
        assert_eq!(read_u64(&mut data).unwrap(), 777);
        assert_eq!(read_vec(&mut data).unwrap(), b"abc");
        assert!(data.is_empty());
    }
}
