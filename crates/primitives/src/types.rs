//! Core types for anonymous vote aggregation.

use serde::{Deserialize, Serialize};

use crate::encode::{format_field_decimal, parse_field_decimal};

/// Maximum number of vote options per election (two packed 7-counter words).
pub const MAX_OPTIONS: usize = 14;

pub const NULLIFIER_LEN: usize = 32;
pub const ROOT_LEN: usize = 32;
pub const ELECTION_ID_LEN: usize = 32;

/// Deterministic per-voter-per-election nullifier, produced by the external
/// vote circuit. A canonical Pasta base-field value held as big-endian bytes,
/// so derived ordering is unsigned integer ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Nullifier(pub [u8; NULLIFIER_LEN]);

impl Nullifier {
    /// Parse the wire form: a base-10 string of the nullifier value.
    pub fn from_decimal(s: &str) -> Result<Self, FieldParseError> {
        parse_field_decimal(s).map(Nullifier)
    }

    pub fn to_decimal(&self) -> String {
        format_field_decimal(&self.0)
    }

    pub fn from_u64(v: u64) -> Self {
        let mut out = [0u8; NULLIFIER_LEN];
        out[NULLIFIER_LEN - 8..].copy_from_slice(&v.to_be_bytes());
        Nullifier(out)
    }

    pub fn as_bytes(&self) -> &[u8; NULLIFIER_LEN] {
        &self.0
    }

    /// Bit of the big-endian value at `depth`, counting from the most
    /// significant bit. Selects the merkle-map path at that tree level.
    pub fn bit(&self, depth: usize) -> bool {
        (self.0[depth / 8] >> (7 - depth % 8)) & 1 == 1
    }
}

impl core::fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Nullifier({})", self.to_decimal())
    }
}

impl Serialize for Nullifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Nullifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct NullifierVisitor;
        impl<'de> serde::de::Visitor<'de> for NullifierVisitor {
            type Value = Nullifier;
            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "a base-10 nullifier string")
            }
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Nullifier::from_decimal(v).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(NullifierVisitor)
    }
}

/// Opaque election identity, a 32-byte identifier carried as hex on the
/// wire. Upstream systems bind proofs to an election public key; the
/// aggregation engine only ever compares it for equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ElectionId(#[serde(with = "hex::serde")] pub [u8; ELECTION_ID_LEN]);

impl ElectionId {
    pub fn as_bytes(&self) -> &[u8; ELECTION_ID_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for ElectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ElectionId({})", hex::encode(self.0))
    }
}

/// Commitment to the registered-voter set, a field value like the nullifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VotersRoot(pub [u8; ROOT_LEN]);

impl VotersRoot {
    pub fn from_decimal(s: &str) -> Result<Self, FieldParseError> {
        parse_field_decimal(s).map(VotersRoot)
    }

    pub fn to_decimal(&self) -> String {
        format_field_decimal(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; ROOT_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for VotersRoot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "VotersRoot({})", self.to_decimal())
    }
}

impl Serialize for VotersRoot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for VotersRoot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct RootVisitor;
        impl<'de> serde::de::Visitor<'de> for RootVisitor {
            type Value = VotersRoot;
            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "a base-10 voters-root string")
            }
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                VotersRoot::from_decimal(v).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(RootVisitor)
    }
}

/// The pair scoping every proof to one election. All proofs merged into one
/// tally must carry an identical binding; comparison is exact equality of
/// both fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
pub struct ElectionBinding {
    pub election_id: ElectionId,
    pub voters_root: VotersRoot,
}

/// Zero-based vote option index, valid in `0..MAX_OPTIONS`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct OptionIndex(pub u8);

impl OptionIndex {
    pub fn new(v: u8) -> Option<Self> {
        if (v as usize) < MAX_OPTIONS {
            Some(OptionIndex(v))
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        (self.0 as usize) < MAX_OPTIONS
    }

    /// Value stored at the nullifier-map leaf. Offset by one so that zero
    /// keeps meaning "absent" in the seen-set commitment.
    pub fn leaf_value(&self) -> u64 {
        self.0 as u64 + 1
    }
}

/// Per-option counters for a running tally.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct VoteCounts(pub [u32; MAX_OPTIONS]);

impl VoteCounts {
    pub fn empty() -> Self {
        VoteCounts([0u32; MAX_OPTIONS])
    }

    /// Counter state after counting one vote for `option`.
    pub fn bumped(&self, option: OptionIndex) -> Self {
        let mut counts = self.0;
        counts[option.0 as usize] += 1;
        VoteCounts(counts)
    }

    /// Element-wise sum, used when merging disjoint tallies.
    pub fn merged(&self, other: &Self) -> Self {
        let mut counts = self.0;
        for (c, o) in counts.iter_mut().zip(other.0.iter()) {
            *c += *o;
        }
        VoteCounts(counts)
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|&c| c as u64).sum()
    }

    pub fn get(&self, option: OptionIndex) -> u32 {
        self.0[option.0 as usize]
    }
}

/// Wire-level field parse failures; both map to a bad request at the boundary.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldParseError {
    #[error("non-numeric field string")]
    NonNumeric,
    #[error("field value out of range")]
    OutOfRange,
}
