//! Token state machine
//!
//! ```text
//! Created → Active → {Mutated, Expired, Forgotten}
//!              ↑         |
//!              └─────────┘   (bounded by the amplification limit)
//! ```
//!
//! `Expired` and `Forgotten` are terminal for a token identity; a forgotten
//! token's prior existence stays visible through the audit trail. Expiry is
//! evaluated lazily from stored timestamps at read time - there are no
//! background timers, so the scheduler load stays flat as tokens accumulate.
//!
//! A mutation produces a new field snapshot under the same logical identity:
//! the ancestry depth is incremented and `created_at` is restamped. The
//! engine validates the candidate snapshot before it becomes visible, so a
//! transition is applied in full or not at all.

use chrono::{DateTime, Utc};
use lineage_core::{StateVector, Token, TokenClass};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a token identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    /// Candidate assembled, not yet validated
    Created,
    /// Live in the store
    Active,
    /// A validated mutation is being applied (loops back to `Active`)
    Mutated,
    /// TTL elapsed; terminal
    Expired,
    /// Explicitly removed; terminal
    Forgotten,
}

/// A requested mutation of an active token
///
/// All fields are optional; unset fields keep the current snapshot's value.
/// The kinds of change the original command set exposed (rotate, attenuate,
/// reframe, refresh) are all expressed through this one request shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Replace the state vector (rotate)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<StateVector>,

    /// Replace the intensity outright
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,

    /// Multiply intensity by a decay factor in [0, 1] (attenuate)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attenuate: Option<f64>,

    /// Replace the classification (reframe)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<TokenClass>,

    /// Replace the explanation (reframe)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    /// Extend the TTL by this many seconds (refresh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extend_ttl_seconds: Option<i64>,
}

impl MutationRequest {
    /// Whether the request changes anything at all
    pub fn is_empty(&self) -> bool {
        self.vector.is_none()
            && self.intensity.is_none()
            && self.attenuate.is_none()
            && self.class.is_none()
            && self.explanation.is_none()
            && self.extend_ttl_seconds.is_none()
    }
}

/// Current state of a stored token, evaluated lazily at `now`
pub fn state_at(token: &Token, now: DateTime<Utc>) -> TokenState {
    if token.is_expired_at(now) {
        TokenState::Expired
    } else {
        TokenState::Active
    }
}

/// Apply a validated mutation, producing the successor snapshot
///
/// The successor keeps the logical identity (`id`), records the predecessor
/// as its parent, increments the ancestry depth, and restamps `created_at`
/// to `now`. Intensity changes are clamped to [0, 1]; attenuation composes
/// after an outright intensity replacement.
pub fn apply_mutation(current: &Token, request: &MutationRequest, now: DateTime<Utc>) -> Token {
    let mut intensity = request.intensity.unwrap_or(current.intensity);
    if let Some(factor) = request.attenuate {
        intensity *= factor.clamp(0.0, 1.0);
    }

    Token {
        id: current.id.clone(),
        class: request.class.unwrap_or(current.class),
        vector: request.vector.unwrap_or(current.vector),
        intensity: intensity.clamp(0.0, 1.0),
        source: current.source,
        ttl_seconds: current.ttl_seconds + request.extend_ttl_seconds.unwrap_or(0),
        explanation: request
            .explanation
            .clone()
            .unwrap_or_else(|| current.explanation.clone()),
        created_at: now,
        parent_id: Some(current.id.clone()),
        depth: current.depth + 1,
    }
}
