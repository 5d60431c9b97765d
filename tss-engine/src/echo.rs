//! Echo-broadcast wrapper (spec §4.5 component H): protects a round of
//! broadcasts whose contents are sensitive to split-brain delivery (a
//! compromised relay showing different parties different contents under
//! the same round). Every party hashes everything it received in that
//! round, in a fixed peer order, and re-broadcasts the hash in the
//! following round; any disagreement among the echoed hashes means at
//! least one party didn't see what everyone else saw, and the round is
//! aborted.
//!
//! This doesn't pinpoint which single party lied — a relay that forges one
//! consistent alternate view for a minority of parties is indistinguishable,
//! from the echo round alone, from those parties lying about what they
//! received — so every party whose echo disagrees with the majority is
//! blamed.

use std::collections::HashMap;

use digest::Digest;
use round_based::rounds_router::simple_store::RoundMsgs;

use crate::blame::AbortBlame;

/// Hash of everything a party received in an echoed round, in a fixed
/// (sender) order agreed by construction (e.g. party index order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoHash(Vec<u8>);

impl EchoHash {
    /// Hashes `entries` (one per sender, in a fixed order every party uses)
    /// with each entry's length framed in, so entries can't be confused by
    /// concatenation ambiguity.
    pub fn compute<D: Digest>(entries: impl IntoIterator<Item = impl AsRef<[u8]>>) -> Self {
        let mut hasher = D::new();
        for entry in entries {
            let bytes = entry.as_ref();
            hasher.update((bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
        Self(hasher.finalize().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Checks that every echoed message agrees with the majority, where
/// `hash_of` extracts the echoed hash bytes from each party's message.
/// Returns the parties whose echo disagreed (empty if everyone agrees,
/// which also covers the degenerate single-echo case).
pub fn verify_echoes<M>(echoes: &RoundMsgs<M>, hash_of: impl Fn(&M) -> &[u8]) -> Vec<AbortBlame> {
    let all: Vec<_> = echoes.iter_indexed().collect();
    let mut counts: HashMap<&[u8], usize> = HashMap::new();
    for (_, _, m) in &all {
        *counts.entry(hash_of(m)).or_insert(0) += 1;
    }
    let Some(majority) = counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(h, _)| h.to_vec())
    else {
        return Vec::new();
    };
    all.into_iter()
        .filter(|(_, _, m)| hash_of(m) != majority.as_slice())
        .map(|(j, id, _)| AbortBlame::new(j, id, id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_entries_in_same_order_hash_identically() {
        let a = EchoHash::compute::<sha2::Sha256>([b"one".as_slice(), b"two".as_slice()]);
        let b = EchoHash::compute::<sha2::Sha256>([b"one".as_slice(), b"two".as_slice()]);
        assert_eq!(a, b);
    }

    #[test]
    fn framing_prevents_concatenation_collisions() {
        let a = EchoHash::compute::<sha2::Sha256>([b"ab".as_slice(), b"c".as_slice()]);
        let b = EchoHash::compute::<sha2::Sha256>([b"a".as_slice(), b"bc".as_slice()]);
        assert_ne!(a, b);
    }

    #[test]
    fn different_order_hashes_differently() {
        let a = EchoHash::compute::<sha2::Sha256>([b"one".as_slice(), b"two".as_slice()]);
        let b = EchoHash::compute::<sha2::Sha256>([b"two".as_slice(), b"one".as_slice()]);
        assert_ne!(a, b);
    }
}
