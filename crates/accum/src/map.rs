//! Sparse merkle map over nullifiers: the seen-set commitment.
//!
//! Keys are nullifier bits (most significant bit first), values are vote
//! options offset by one so an absent leaf reads as zero. A witness carries
//! the sibling path for one key and recomputes the root for any claimed leaf
//! value, which makes it double-duty: membership when the claimed value is
//! present, non-membership when it is absent.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use primitives::{format_field_decimal, parse_field_decimal, Nullifier, OptionIndex};

use crate::hash::compress_nodes;

/// Tree height: one level per nullifier bit.
pub const MAP_HEIGHT: usize = 256;

/// Subtrees larger than this hash their children on separate rayon threads.
const PAR_CUTOFF: usize = 1024;

/// 32-byte map root (LE field repr). Crosses the wire as a base-10 string,
/// like every other field value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Root(pub [u8; 32]);

impl Root {
    pub fn to_decimal(&self) -> String {
        let mut be = self.0;
        be.reverse();
        format_field_decimal(&be)
    }

    pub fn from_decimal(s: &str) -> Result<Self, primitives::FieldParseError> {
        let mut bytes = parse_field_decimal(s)?;
        bytes.reverse();
        Ok(Root(bytes))
    }
}

impl core::fmt::Debug for Root {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Root({})", self.to_decimal())
    }
}

impl Serialize for Root {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Root {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct RootVisitor;
        impl<'de> serde::de::Visitor<'de> for RootVisitor {
            type Value = Root;
            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "a base-10 map-root string")
            }
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Root::from_decimal(v).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(RootVisitor)
    }
}

/// Leaf bytes for a map value: the LE field repr of `option + 1`, all zeros
/// when the key is absent.
pub fn leaf_bytes(value: Option<OptionIndex>) -> [u8; 32] {
    let mut out = [0u8; 32];
    if let Some(option) = value {
        out[..8].copy_from_slice(&option.leaf_value().to_le_bytes());
    }
    out
}

/// Hash of the all-empty subtree at each height above the leaves.
fn empty_hash(height: usize) -> [u8; 32] {
    static EMPTY: OnceLock<Vec<[u8; 32]>> = OnceLock::new();
    let table = EMPTY.get_or_init(|| {
        let mut table = Vec::with_capacity(MAP_HEIGHT + 1);
        table.push(leaf_bytes(None));
        for h in 1..=MAP_HEIGHT {
            let child = table[h - 1];
            table.push(compress_nodes(&child, &child));
        }
        table
    });
    table[height]
}

/// Root of the subtree at `depth` covering the given sorted, distinct leaves.
fn subtree_root(leaves: &[(Nullifier, OptionIndex)], depth: usize) -> [u8; 32] {
    if leaves.is_empty() {
        return empty_hash(MAP_HEIGHT - depth);
    }
    if depth == MAP_HEIGHT {
        return leaf_bytes(Some(leaves[0].1));
    }
    let split = leaves.partition_point(|(k, _)| !k.bit(depth));
    let (lower, upper) = leaves.split_at(split);
    let (lh, rh) = if leaves.len() > PAR_CUTOFF {
        rayon::join(
            || subtree_root(lower, depth + 1),
            || subtree_root(upper, depth + 1),
        )
    } else {
        (
            subtree_root(lower, depth + 1),
            subtree_root(upper, depth + 1),
        )
    };
    compress_nodes(&lh, &rh)
}

/// In-memory nullifier map, rebuildable from the persisted
/// (nullifier, vote) list of every counted voter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NullifierMap {
    leaves: BTreeMap<Nullifier, OptionIndex>,
}

impl NullifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of the map with no nullifiers counted.
    pub fn empty_root() -> Root {
        Root(empty_hash(MAP_HEIGHT))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Nullifier, OptionIndex)>) -> Self {
        NullifierMap {
            leaves: pairs.into_iter().collect(),
        }
    }

    /// Set the leaf for `key`. Map semantics: inserting an existing key
    /// overwrites; callers enforce at-most-once counting before this point.
    pub fn insert(&mut self, key: Nullifier, value: OptionIndex) {
        self.leaves.insert(key, value);
    }

    pub fn get(&self, key: &Nullifier) -> Option<OptionIndex> {
        self.leaves.get(key).copied()
    }

    pub fn contains(&self, key: &Nullifier) -> bool {
        self.leaves.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn root(&self) -> Root {
        let entries: Vec<(Nullifier, OptionIndex)> =
            self.leaves.iter().map(|(k, v)| (*k, *v)).collect();
        Root(subtree_root(&entries, 0))
    }

    /// Sibling path for `key` against the current map contents.
    pub fn witness(&self, key: Nullifier) -> LeafWitness {
        let entries: Vec<(Nullifier, OptionIndex)> =
            self.leaves.iter().map(|(k, v)| (*k, *v)).collect();
        let mut siblings = Vec::with_capacity(MAP_HEIGHT);
        let mut slice = entries.as_slice();
        for depth in 0..MAP_HEIGHT {
            let split = slice.partition_point(|(k, _)| !k.bit(depth));
            let (lower, upper) = slice.split_at(split);
            if key.bit(depth) {
                siblings.push(subtree_root(lower, depth + 1));
                slice = upper;
            } else {
                siblings.push(subtree_root(upper, depth + 1));
                slice = lower;
            }
        }
        LeafWitness {
            key,
            value: self.get(&key),
            siblings,
        }
    }
}

/// Sibling path for one key, root level first, plus the leaf value the map
/// holds for that key (`None` when absent).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct LeafWitness {
    pub key: Nullifier,
    pub value: Option<OptionIndex>,
    pub siblings: Vec<[u8; 32]>,
}

impl LeafWitness {
    /// Root obtained by placing `leaf` at this witness's key position.
    pub fn compute_root(&self, leaf: [u8; 32]) -> Root {
        let mut acc = leaf;
        for (depth, sibling) in self.siblings.iter().enumerate().rev() {
            acc = if self.key.bit(depth) {
                compress_nodes(sibling, &acc)
            } else {
                compress_nodes(&acc, sibling)
            };
        }
        Root(acc)
    }

    pub fn root_with_value(&self, value: Option<OptionIndex>) -> Root {
        self.compute_root(leaf_bytes(value))
    }

    /// Whether this witness is consistent with `root` for its claimed value.
    pub fn matches(&self, root: &Root) -> bool {
        self.siblings.len() == MAP_HEIGHT && self.root_with_value(self.value) == *root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nf(v: u64) -> Nullifier {
        Nullifier::from_u64(v)
    }

    #[test]
    fn empty_root_is_stable() {
        assert_eq!(NullifierMap::new().root(), NullifierMap::empty_root());
    }

    #[test]
    fn insert_changes_root() {
        let mut map = NullifierMap::new();
        let r0 = map.root();
        map.insert(nf(10), OptionIndex(0));
        let r1 = map.root();
        assert_ne!(r0, r1);
        map.insert(nf(11), OptionIndex(1));
        assert_ne!(r1, map.root());
    }

    #[test]
    fn root_is_order_independent() {
        let a = NullifierMap::from_pairs([
            (nf(3), OptionIndex(0)),
            (nf(1), OptionIndex(1)),
            (nf(2), OptionIndex(2)),
        ]);
        let mut b = NullifierMap::new();
        b.insert(nf(2), OptionIndex(2));
        b.insert(nf(3), OptionIndex(0));
        b.insert(nf(1), OptionIndex(1));
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn witness_proves_absence_then_presence() {
        let mut map = NullifierMap::new();
        map.insert(nf(5), OptionIndex(2));
        map.insert(nf(9), OptionIndex(0));
        let root = map.root();

        // Absent key: witness matches with value None, and predicts the
        // post-insert root.
        let w = map.witness(nf(7));
        assert_eq!(w.value, None);
        assert!(w.matches(&root));
        let predicted = w.root_with_value(Some(OptionIndex(1)));
        map.insert(nf(7), OptionIndex(1));
        assert_eq!(map.root(), predicted);

        // Present key: witness carries the stored value.
        let w = map.witness(nf(7));
        assert_eq!(w.value, Some(OptionIndex(1)));
        assert!(w.matches(&map.root()));
    }

    #[test]
    fn witness_against_wrong_root_fails() {
        let mut map = NullifierMap::new();
        map.insert(nf(5), OptionIndex(2));
        let w = map.witness(nf(6));
        map.insert(nf(6), OptionIndex(0));
        assert!(!w.matches(&map.root()));
    }

    #[test]
    fn root_decimal_roundtrip() {
        let mut map = NullifierMap::new();
        map.insert(nf(123), OptionIndex(4));
        let root = map.root();
        let s = serde_json::to_string(&root).unwrap();
        let back: Root = serde_json::from_str(&s).unwrap();
        assert_eq!(back, root);
    }
}
