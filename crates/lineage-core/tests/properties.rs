//! Property-Based Tests for Ledger Invariants
//!
//! These tests verify that the hash-chain invariants hold for arbitrary
//! inputs:
//! 1. MONOTONICITY: after N appends, the accumulator equals the value
//!    recomputed purely from the ordered leaf list - for all N
//! 2. INCLUSION: a proof for any position verifies against the accumulator,
//!    and only against it
//! 3. TAMPER EVIDENCE: altering any prior leaf changes the final accumulator
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use lineage_core::{accumulate, extend, genesis, prove, sha256, Digest};
use proptest::prelude::*;

fn leaves_from(seeds: &[Vec<u8>]) -> Vec<Digest> {
    seeds.iter().map(|s| sha256(s)).collect()
}

proptest! {
    /// Incremental extension must agree with from-scratch recomputation at
    /// every intermediate length.
    #[test]
    fn prop_accumulator_monotonicity(
        seeds in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..24),
    ) {
        let leaves = leaves_from(&seeds);

        let mut acc = genesis();
        for (n, leaf) in leaves.iter().enumerate() {
            acc = extend(&acc, leaf);
            prop_assert_eq!(
                acc,
                accumulate(leaves[..=n].iter()),
                "incremental and recomputed accumulators diverged at N={}",
                n + 1
            );
        }
    }

    /// Every position in an arbitrary ledger must yield a verifying proof.
    #[test]
    fn prop_inclusion_proof_verifies_everywhere(
        seeds in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..24),
    ) {
        let leaves = leaves_from(&seeds);
        let acc = accumulate(leaves.iter());

        for position in 0..leaves.len() {
            let proof = prove("BG-AMOS-0001", &leaves, position)
                .expect("in-range position must prove");
            prop_assert!(proof.verify(&acc), "proof failed at position {}", position);
        }
    }

    /// A proof must not verify against the accumulator of any strict prefix.
    #[test]
    fn prop_proof_rejects_prefix_accumulators(
        seeds in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 2..16),
        position_seed in any::<usize>(),
    ) {
        let leaves = leaves_from(&seeds);
        let position = position_seed % leaves.len();
        let proof = prove("BG-AMOS-0001", &leaves, position).unwrap();

        for n in 0..leaves.len() {
            let partial = accumulate(leaves[..n].iter());
            prop_assert!(
                !proof.verify(&partial),
                "proof for full ledger verified against prefix of length {}",
                n
            );
        }
    }

    /// Changing any single leaf must change the final accumulator.
    #[test]
    fn prop_tamper_cascades_to_accumulator(
        seeds in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..16),
        victim_seed in any::<usize>(),
    ) {
        let leaves = leaves_from(&seeds);
        let honest = accumulate(leaves.iter());

        let victim = victim_seed % leaves.len();
        let mut tampered = leaves.clone();
        tampered[victim] = sha256(b"tampered-entry");
        prop_assume!(tampered[victim] != leaves[victim]);

        prop_assert_ne!(
            honest,
            accumulate(tampered.iter()),
            "tampering position {} left the accumulator unchanged",
            victim
        );
    }
}
