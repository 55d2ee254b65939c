//! State token types
//!
//! A token is the mutable half of the system: a short-lived, TTL-bounded
//! record of an agent's current context. Tokens encode directional state,
//! never meaning, and never identity.
//!
//! Key invariants:
//! - Every token has a TTL; there is no unbounded persistence
//! - A token past its TTL is logically dead even before it is purged
//! - Tokens are mutated only through the transition engine, which replaces
//!   the field snapshot and increments the ancestry depth

use crate::error::ValidationError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default TTL for session tokens (24 hours)
pub const DEFAULT_TTL_SECS: i64 = 86_400;

/// Default TTL for persistent ("remember") tokens (7 days)
pub const PERSISTENT_TTL_SECS: i64 = 604_800;

/// Maximum explanation length in characters
pub const MAX_EXPLANATION_LEN: usize = 200;

/// Token classification
///
/// Note: the `Anchor` class marks a static-context token. It is unrelated to
/// the immutable ledger [`Anchor`](crate::anchor::Anchor) entity; the two
/// live in disjoint stores with disjoint operation sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    /// Static identity-free context
    Anchor,
    /// State transition marker
    Mutation,
    /// Flow control and alerts
    Warning,
    /// Reflective/introspective marker
    Audit,
    /// User approval gate
    Consent,
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenClass::Anchor => "anchor",
            TokenClass::Mutation => "mutation",
            TokenClass::Warning => "warning",
            TokenClass::Audit => "audit",
            TokenClass::Consent => "consent",
        };
        f.write_str(s)
    }
}

/// Origin of a token or request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Initiated by the user
    User,
    /// Initiated by a system rule
    System,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::User => f.write_str("user"),
            Source::System => f.write_str("system"),
        }
    }
}

/// Mechanistic 3D state vector
///
/// Deterministic axes, not semantic embeddings:
/// - `x`: urgency / TTL pressure
/// - `y`: complexity / load
/// - `z`: alignment / stability
///
/// Each component is clamped to [-1, 1] at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl StateVector {
    /// Create a vector, clamping each component to [-1, 1]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
            z: z.clamp(-1.0, 1.0),
        }
    }

    /// Euclidean magnitude
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl Default for StateVector {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// A mutable state token
///
/// Mutation replaces the whole field snapshot under the same logical `id`,
/// restamps `created_at`, and increments `depth`. The live set holds only
/// tokens whose TTL has not elapsed; expiry is evaluated lazily at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Stable, process-unique identifier (e.g. `T-0042`)
    pub id: String,

    /// Classification
    pub class: TokenClass,

    /// Mechanistic position
    #[serde(default)]
    pub vector: StateVector,

    /// Strength in [0, 1]
    pub intensity: f64,

    /// Origin of the token
    pub source: Source,

    /// Time-to-live in seconds, always > 0
    pub ttl_seconds: i64,

    /// One-sentence human-readable explanation
    ///
    /// Subject to the identity-claim filter; see [`crate::validator`].
    pub explanation: String,

    /// Creation (or last mutation) timestamp
    pub created_at: DateTime<Utc>,

    /// Ancestry link to the token this one was derived from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Ancestry depth, bounded by the amplification limit
    #[serde(default)]
    pub depth: u32,
}

impl Token {
    /// Create a builder
    pub fn builder(id: impl Into<String>, class: TokenClass) -> TokenBuilder {
        TokenBuilder::new(id, class)
    }

    /// The instant this token's TTL elapses
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(self.ttl_seconds)
    }

    /// Whether the token is expired at `now`
    ///
    /// A pure function of stored timestamps; there are no background timers.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Whether the token is expired at the current wall-clock time
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Plain-text rendering for the exported summary
    pub fn render_text(&self) -> String {
        format!(
            "[{}] {} (intensity: {:.2}, expires: {})",
            self.class.to_string().to_uppercase(),
            self.explanation,
            self.intensity,
            self.expires_at().to_rfc3339(),
        )
    }
}

/// Builder for [`Token`]
///
/// Validates structure only: bounds are clamped, the TTL must be positive,
/// and the explanation must fit the length limit. Governance checks (identity
/// claims, ancestry depth, authorization) belong to the validator.
#[derive(Debug)]
pub struct TokenBuilder {
    id: String,
    class: TokenClass,
    vector: StateVector,
    intensity: f64,
    source: Source,
    ttl_seconds: i64,
    explanation: Option<String>,
    created_at: Option<DateTime<Utc>>,
    parent_id: Option<String>,
    depth: u32,
}

impl TokenBuilder {
    /// Create a new builder with defaults
    pub fn new(id: impl Into<String>, class: TokenClass) -> Self {
        Self {
            id: id.into(),
            class,
            vector: StateVector::default(),
            intensity: 0.5,
            source: Source::User,
            ttl_seconds: DEFAULT_TTL_SECS,
            explanation: None,
            created_at: None,
            parent_id: None,
            depth: 0,
        }
    }

    /// Set the state vector
    pub fn vector(mut self, vector: StateVector) -> Self {
        self.vector = vector;
        self
    }

    /// Set the intensity (clamped to [0, 1])
    pub fn intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity.clamp(0.0, 1.0);
        self
    }

    /// Set the source
    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Set the TTL in seconds
    pub fn ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Set the explanation
    pub fn explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Set the creation timestamp (defaults to now)
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Set the ancestry link
    pub fn parent(mut self, parent_id: impl Into<String>, depth: u32) -> Self {
        self.parent_id = Some(parent_id.into());
        self.depth = depth;
        self
    }

    /// Build the token
    pub fn build(self) -> Result<Token, ValidationError> {
        if self.ttl_seconds <= 0 {
            return Err(ValidationError::MissingTtl);
        }

        let explanation = self.explanation.unwrap_or_default();

        Ok(Token {
            id: self.id,
            class: self.class,
            vector: self.vector,
            intensity: self.intensity.clamp(0.0, 1.0),
            source: self.source,
            ttl_seconds: self.ttl_seconds,
            explanation,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            parent_id: self.parent_id,
            depth: self.depth,
        })
    }
}
