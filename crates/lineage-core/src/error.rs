//! Error types for the lineage framework

use thiserror::Error;

/// Errors raised by governance validation of tokens and transitions
///
/// Every variant is recoverable by the caller correcting its input. The
/// engine never rewrites a rejected request into a valid form; the rejection
/// is audited and surfaced as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Token carries no TTL, or a non-positive one
    #[error("token has no TTL or a non-positive TTL")]
    MissingTtl,

    /// Ancestry chain too deep, or a token references itself
    #[error("recursive reference: {0}")]
    RecursiveReference(String),

    /// Explanation matched a forbidden identity pattern
    #[error("explanation matched forbidden identity pattern '{0}'")]
    IdentityClaim(String),

    /// Mutation lacked a credential matching the token's source
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Errors raised by the lineage ledger
///
/// `AccumulatorMismatch` is fatal for writes: it signals that the persisted
/// ledger diverges from the value derivable from the ordered anchor list,
/// i.e. tampering or corruption. The ledger refuses all further appends and
/// deprecations until the stored log is manually resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The beacon id is already present in the ledger
    #[error("anchor '{0}' already exists in the ledger")]
    DuplicateId(String),

    /// Caller requested an insertion position other than the end
    #[error("out-of-order append: ledger length is {length}, requested position {requested}")]
    OutOfOrder { length: u64, requested: u64 },

    /// Stored accumulator checkpoint diverges from the derivable value
    #[error("accumulator mismatch: stored {stored}, derived {derived}")]
    AccumulatorMismatch { stored: String, derived: String },

    /// No anchor with this beacon id
    #[error("anchor '{0}' not found")]
    NotFound(String),

    /// `deprecate` called on an anchor that is already deprecated
    #[error("anchor '{0}' is already deprecated")]
    AlreadyDeprecated(String),

    /// Durability failure while writing the ledger log
    #[error("ledger storage failure: {0}")]
    Storage(String),
}
