//! Domain-separated hashing for the nullifier map (Pasta field domain).
//!
//! Node compression derives a Pasta field element via BLAKE2b-512 with wide
//! reduction and returns its 32-byte LE repr, so every interior node is a
//! canonical field value. Circuit adapters can replace this with an in-circuit
//! permutation later without changing the map layout.

use blake2b_simd::Params as Blake2bParams;
use ff::FromUniformBytes;
use pasta_curves::vesta::Scalar as FrVesta;

const DOM_MAP_NODE: &[u8] = b"vtally:map/node"; // 15

/// Hash 64 bytes to a Pasta field element and return its 32-byte LE repr.
pub fn hash64_to_field(personal: &[u8], input: &[u8; 64]) -> [u8; 32] {
    let hash = Blake2bParams::new()
        .hash_length(64)
        .personal(personal)
        .hash(input);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(hash.as_bytes());
    let f = <FrVesta as FromUniformBytes<64>>::from_uniform_bytes(&wide);
    let mut out = [0u8; 32];
    out.copy_from_slice(ff::PrimeField::to_repr(&f).as_ref());
    out
}

/// Combine two 32-byte child nodes into their parent node.
pub fn compress_nodes(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut input = [0u8; 64];
    input[..32].copy_from_slice(left);
    input[32..].copy_from_slice(right);
    hash64_to_field(DOM_MAP_NODE, &input)
}
