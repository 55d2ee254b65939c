//! Lineage Plane
//!
//! The runtime plane of the lineage framework. It holds two stores with
//! opposite mutability guarantees behind one validation and audit boundary:
//!
//! - the **token store**: durable, transactional storage of mutable,
//!   TTL-bounded state tokens, mutated only through the transition engine
//! - the **lineage ledger**: an append-only registry of immutable anchors
//!   with hash chaining and offline-verifiable inclusion proofs
//!
//! The [`engine::Engine`] orchestrates both: every request is validated,
//! applied to exactly one store, and unconditionally recorded in the
//! append-only audit trail - rejections included.
//!
//! ## API Endpoints
//!
//! - `GET /health`, `GET /ready` - liveness and readiness
//! - `POST /v1/tokens`, `GET /v1/tokens` - create / list state tokens
//! - `POST /v1/tokens/{id}/mutate`, `DELETE /v1/tokens/{id}` - transitions
//! - `GET /v1/audit/report` - audit summary
//! - `POST /v1/anchors` - register an anchor (human-authorized only)
//! - `POST /v1/anchors/{id}/deprecate` - the one mutation anchors admit
//! - `GET /v1/anchors/{id}/verify|proof|commitment` - verification surface
//! - `GET /v1/ledger/accumulator`, `GET /v1/registry` - ledger reads
//! - `GET /v1/state` - read-only summary for downstream consumers

pub mod api;
pub mod audit;
pub mod engine;
pub mod ledger;
pub mod store;
pub mod transition;

pub use api::create_router;
pub use api::handlers::AppState;
pub use audit::{AuditEntry, AuditFilter, AuditLog, AuditOperation, AuditSummary, Outcome};
pub use engine::{
    CreateTokenRequest, Engine, EngineConfig, EngineError, RegisterAnchorRequest, StateSummary,
};
pub use ledger::{Ledger, VerificationReport};
pub use store::{FileStore, MemoryStore, StorageError, TokenStore};
pub use transition::{apply_mutation, state_at, MutationRequest, TokenState};
