//! Ledger hash chain and inclusion proofs
//!
//! The ledger accumulator is a running hash over the ordered sequence of
//! anchor leaf hashes:
//!
//! ```text
//! acc_0 = H("lineage-ledger-genesis")
//! acc_i = H(acc_{i-1} ‖ leaf_i)        leaf_i = H(canonical_json(anchor_i))
//! ```
//!
//! The published value is always independently reproducible from the ordered
//! anchor list alone; altering any prior entry changes every subsequent
//! accumulator value. This is the tamper-detection mechanism.
//!
//! ## Sibling-path format
//!
//! An inclusion proof for the anchor at position `i` carries:
//! - `prefix`: the accumulator over positions `0..i`
//! - `leaf`: the anchor's own leaf hash
//! - `suffix`: the leaf hashes at positions `i+1..n`, in order
//!
//! Verification folds `H(prefix ‖ leaf)` through the suffix and compares the
//! result to the claimed accumulator. It needs no access to the live ledger,
//! so proofs are verifiable offline.

use crate::hash::{sha256, sha256_pair, Digest};
use serde::{Deserialize, Serialize};

/// Domain-separation seed for the empty ledger
const GENESIS_SEED: &[u8] = b"lineage-ledger-genesis";

/// Accumulator value of the empty ledger
pub fn genesis() -> Digest {
    sha256(GENESIS_SEED)
}

/// One chaining step: fold a leaf into the accumulator
pub fn extend(accumulator: &Digest, leaf: &Digest) -> Digest {
    sha256_pair(accumulator, leaf)
}

/// Recompute the accumulator over an ordered leaf sequence from scratch
pub fn accumulate<'a, I>(leaves: I) -> Digest
where
    I: IntoIterator<Item = &'a Digest>,
{
    leaves.into_iter().fold(genesis(), |acc, leaf| extend(&acc, leaf))
}

/// Proof that one anchor is included in the ledger at a fixed position
///
/// Self-contained: everything needed to recompute the published accumulator
/// is carried in the proof itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Beacon id of the proven anchor
    pub beacon_id: String,

    /// Zero-based position in the ledger
    pub position: u64,

    /// Leaf hash of the proven anchor
    pub leaf: Digest,

    /// Accumulator over all entries preceding `position`
    pub prefix: Digest,

    /// Leaf hashes of all entries following `position`, in ledger order
    pub suffix: Vec<Digest>,
}

impl InclusionProof {
    /// Recompute the accumulator this proof commits to
    pub fn accumulator(&self) -> Digest {
        let mut acc = extend(&self.prefix, &self.leaf);
        for leaf in &self.suffix {
            acc = extend(&acc, leaf);
        }
        acc
    }

    /// Verify the proof against a claimed accumulator value
    ///
    /// Pure and offline: no ledger access required.
    pub fn verify(&self, claimed: &Digest) -> bool {
        self.accumulator() == *claimed
    }
}

/// Derive an inclusion proof from an ordered leaf sequence
///
/// Returns `None` when `position` is out of range. The caller (the ledger)
/// supplies the beacon id for the proven position.
pub fn prove(
    beacon_id: impl Into<String>,
    leaves: &[Digest],
    position: usize,
) -> Option<InclusionProof> {
    let leaf = *leaves.get(position)?;
    Some(InclusionProof {
        beacon_id: beacon_id.into(),
        position: position as u64,
        leaf,
        prefix: accumulate(&leaves[..position]),
        suffix: leaves[position + 1..].to_vec(),
    })
}

/// Hash-based non-revealing commitment to one ledger entry
///
/// `H(leaf ‖ accumulator)` binds the anchor's leaf hash to the ledger state
/// without disclosing the artifact content. A holder of the leaf hash and
/// the published accumulator can confirm presence by recomputing; nobody
/// else learns anything from the opaque value.
pub fn commitment(leaf: &Digest, accumulator: &Digest) -> Digest {
    sha256_pair(leaf, accumulator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Digest> {
        (0..n).map(|i| sha256(format!("leaf-{i}").as_bytes())).collect()
    }

    #[test]
    fn test_genesis_is_stable() {
        assert_eq!(genesis(), genesis());
        assert_eq!(accumulate(std::iter::empty::<&Digest>()), genesis());
    }

    #[test]
    fn test_accumulate_matches_incremental_extend() {
        let leaves = leaves(5);

        let mut acc = genesis();
        for leaf in &leaves {
            acc = extend(&acc, leaf);
        }

        assert_eq!(acc, accumulate(leaves.iter()));
    }

    #[test]
    fn test_every_append_changes_the_accumulator() {
        let leaves = leaves(4);
        let mut seen = vec![genesis()];
        for n in 1..=leaves.len() {
            let acc = accumulate(leaves[..n].iter());
            assert!(!seen.contains(&acc));
            seen.push(acc);
        }
    }

    #[test]
    fn test_prior_entry_alteration_cascades() {
        let mut leaves = leaves(4);
        let honest = accumulate(leaves.iter());

        leaves[1] = sha256(b"tampered");
        assert_ne!(honest, accumulate(leaves.iter()));
    }

    #[test]
    fn test_proof_verifies_for_every_position() {
        let leaves = leaves(7);
        let acc = accumulate(leaves.iter());

        for position in 0..leaves.len() {
            let proof = prove(format!("BG-AMOS-{position:04}"), &leaves, position).unwrap();
            assert!(proof.verify(&acc), "proof at position {position} failed");
        }
    }

    #[test]
    fn test_proof_rejects_wrong_accumulator() {
        let leaves = leaves(3);
        let proof = prove("BG-AMOS-0001", &leaves, 1).unwrap();

        assert!(!proof.verify(&genesis()));
        assert!(!proof.verify(&accumulate(leaves[..2].iter())));
    }

    #[test]
    fn test_proof_rejects_tampered_leaf() {
        let leaves = leaves(3);
        let acc = accumulate(leaves.iter());

        let mut proof = prove("BG-AMOS-0001", &leaves, 1).unwrap();
        proof.leaf = sha256(b"substituted");
        assert!(!proof.verify(&acc));
    }

    #[test]
    fn test_prove_out_of_range() {
        let leaves = leaves(2);
        assert!(prove("BG-AMOS-0009", &leaves, 2).is_none());
    }

    #[test]
    fn test_proof_survives_later_appends() {
        // A proof generated after later entries exist must verify against
        // the accumulator covering those entries.
        let leaves = leaves(2);
        let acc_two = accumulate(leaves.iter());

        let proof = prove("BG-AMOS-0000", &leaves, 0).unwrap();
        assert_eq!(proof.suffix.len(), 1);
        assert!(proof.verify(&acc_two));

        let acc_one = accumulate(leaves[..1].iter());
        assert_ne!(acc_one, acc_two);
    }

    #[test]
    fn test_commitment_is_opaque_but_reproducible() {
        let leaves = leaves(2);
        let acc = accumulate(leaves.iter());

        let c = commitment(&leaves[0], &acc);
        assert_eq!(c, commitment(&leaves[0], &acc));
        assert_ne!(c, commitment(&leaves[1], &acc));
        assert_ne!(c, leaves[0]);
        assert_ne!(c, acc);
    }

    #[test]
    fn test_proof_serialization_roundtrip() {
        let leaves = leaves(4);
        let proof = prove("BG-PAPER-0002", &leaves, 2).unwrap();

        let json = serde_json::to_string(&proof).unwrap();
        let restored: InclusionProof = serde_json::from_str(&json).unwrap();
        assert_eq!(proof, restored);
        assert!(restored.verify(&accumulate(leaves.iter())));
    }
}
