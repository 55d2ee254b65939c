//! # Lineage Core
//!
//! Core types, hash chaining, and validation for the lineage provenance
//! framework: tamper-evident tracking of mutable state tokens and immutable
//! lineage anchors.
//!
//! ## Key Concepts
//!
//! - **Token**: mutable, TTL-bounded record of transient agent state
//! - **Anchor**: immutable, permanently ordered citation record
//! - **Accumulator**: running hash over the ordered anchor sequence
//! - **Inclusion proof**: minimal data recomputing the accumulator to
//!   confirm one anchor's presence, verifiable offline
//!
//! ## Invariants
//!
//! 1. **Mutability boundary**: tokens and anchors are wholly separate types
//!    with disjoint operation sets; a mutable record can never be promoted
//!    into or confused with an immutable one
//! 2. **Bounded persistence**: every token carries a TTL > 0
//! 3. **Bounded amplification**: a token's ancestry chain has a maximum
//!    depth and never references itself
//! 4. **Chain integrity**: the published accumulator always equals the value
//!    derivable from the ordered anchor list alone

pub mod anchor;
pub mod chain;
pub mod error;
pub mod hash;
pub mod token;
pub mod validator;

pub use anchor::{Anchor, AnchorBuilder, AnchorFormatError, ArtifactHash, BeaconId, HashAlgorithm, Scope};
pub use chain::{accumulate, commitment, extend, genesis, prove, InclusionProof};
pub use error::{LedgerError, ValidationError};
pub use hash::{canonical_json, digest_canonical, sha256, sha256_pair, Digest};
pub use token::{Source, StateVector, Token, TokenBuilder, TokenClass};
pub use validator::{Credential, IdentityClaimFilter, Validator, DEFAULT_MAX_DEPTH};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
