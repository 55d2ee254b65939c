//! The orchestrating engine
//!
//! Composes validator, transition engine, token store, ledger, and audit
//! trail. Every external request enters here, is validated, is applied to
//! exactly one store (token store XOR ledger - never both), and is always
//! recorded in the audit trail regardless of accept/reject outcome.
//!
//! On rejection the operation's output is suppressed entirely: nothing is
//! corrected, rewritten, or partially applied. The audit entry is written
//! after the outcome is known and before the error is returned, so each call
//! either fully commits (store write + audit entry) or fully aborts with a
//! rejection entry and no state change.

use chrono::{NaiveDate, Utc};
use lineage_core::{
    Anchor, ArtifactHash, BeaconId, Credential, Digest, InclusionProof, LedgerError, Source,
    StateVector, Token, TokenClass, ValidationError, Validator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditFilter, AuditLog, AuditOperation, AuditSummary};
use crate::ledger::{Ledger, VerificationReport};
use crate::store::{FileStore, MemoryStore, StorageError, TokenStore};
use crate::transition::{apply_mutation, state_at, MutationRequest, TokenState};

/// Beacon id reserved for the genesis bootstrap token
const GENESIS_TOKEN_ID: &str = "T-0000";

/// Structural bound on explanations, checked before validation
fn check_explanation_length(explanation: &str) -> Result<(), EngineError> {
    let limit = lineage_core::token::MAX_EXPLANATION_LEN;
    if explanation.chars().count() > limit {
        return Err(EngineError::InvalidRequest(format!(
            "explanation exceeds {limit} characters"
        )));
    }
    Ok(())
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Data directory for durable state; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,

    /// Accretion limit: maximum number of live tokens
    pub max_active_tokens: usize,

    /// TTL applied by the persistent-token ("remember") pathway when the
    /// request does not carry one
    pub persistent_ttl_seconds: i64,

    /// Amplification limit: maximum ancestry depth
    pub max_depth: u32,

    /// Shared secret gating system-sourced mutations
    pub system_secret: Option<String>,

    /// Seed a system bootstrap token into an empty store
    pub bootstrap_genesis: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_active_tokens: 100,
            persistent_ttl_seconds: lineage_core::token::PERSISTENT_TTL_SECS,
            max_depth: lineage_core::DEFAULT_MAX_DEPTH,
            system_secret: None,
            bootstrap_genesis: true,
        }
    }
}

/// Request to create a state token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    pub class: TokenClass,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<StateVector>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// Mandatory for plain creation; the persistent pathway fills in its
    /// long default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<i64>,

    pub explanation: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Request to register a lineage anchor
///
/// Field set mirrors the anchor wire format; `position`, when present, must
/// name the current end of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAnchorRequest {
    pub beacon_id: String,
    pub artifact_name: String,
    pub canonical_owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<NaiveDate>,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
}

/// Read-only snapshot handed to downstream consumers
///
/// Grants no mutation capability: plain data, detached from the stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSummary {
    pub session_id: String,
    pub generated_at: chrono::DateTime<Utc>,
    pub active_tokens: Vec<Token>,
    pub token_limit: usize,
    pub anchor_count: usize,
    pub accumulator: Digest,
}

/// Engine error taxonomy
#[derive(Debug, Error)]
pub enum EngineError {
    /// Governance rejection; recoverable by the caller correcting input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Ledger integrity failure
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Durability failure; fatal, never silently retried
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No live token with this id
    #[error("token not found: {0}")]
    TokenNotFound(String),

    /// Accretion limit reached
    #[error("active token limit {0} reached")]
    TokenLimitReached(usize),

    /// Malformed request (bad identifiers, empty mutation, unknown parent)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<lineage_core::AnchorFormatError> for EngineError {
    fn from(err: lineage_core::AnchorFormatError) -> Self {
        EngineError::InvalidRequest(err.to_string())
    }
}

/// The engine
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn TokenStore>,
    ledger: Ledger,
    audit: AuditLog,
    validator: Validator,
    /// Per-identity write serialization for token mutations
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Next token id suffix; monotonic so purged ids are never reissued
    token_sequence: AtomicU32,
    session_id: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session_id", &self.session_id)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl Engine {
    /// Build an engine from configuration
    ///
    /// With a data directory, all three stores open durably; otherwise
    /// everything is in-memory. An empty token store is seeded with the
    /// genesis bootstrap token (audited like any create).
    pub async fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let (store, ledger, audit): (Arc<dyn TokenStore>, Ledger, AuditLog) =
            match &config.data_dir {
                Some(dir) => (
                    Arc::new(FileStore::open(dir)?),
                    Ledger::open(dir)?,
                    AuditLog::open(dir)?,
                ),
                None => (
                    Arc::new(MemoryStore::new()),
                    Ledger::in_memory(),
                    AuditLog::in_memory(),
                ),
            };

        let mut validator = Validator::new().with_max_depth(config.max_depth);
        if let Some(secret) = &config.system_secret {
            validator = validator.with_system_secret(secret.clone());
        }

        // Seed id assignment past everything the store holds and everything
        // the audit trail has ever seen, so forgotten ids are never reissued
        let stored_next = store.next_sequence().await?;
        let audited_next = audit
            .query(&AuditFilter::default())
            .iter()
            .filter_map(|entry| crate::store::id_sequence(&entry.target_id))
            .max()
            .map_or(1, |m| m + 1);

        let engine = Self {
            config,
            store,
            ledger,
            audit,
            validator,
            locks: StdMutex::new(HashMap::new()),
            token_sequence: AtomicU32::new(stored_next.max(audited_next)),
            session_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
        };

        if engine.config.bootstrap_genesis && engine.store.list_all().await?.is_empty() {
            engine.seed_genesis().await?;
        }

        info!(session_id = %engine.session_id, "Engine initialized");
        Ok(engine)
    }

    /// Seed the cold-start bootstrap token
    async fn seed_genesis(&self) -> Result<(), EngineError> {
        let genesis = Token::builder(GENESIS_TOKEN_ID, TokenClass::Anchor)
            .vector(StateVector::new(0.0, 0.0, 1.0))
            .intensity(1.0)
            .source(Source::System)
            .ttl_seconds(31_536_000) // one year
            .explanation("Genesis bootstrap state for cold start")
            .build()?;

        self.store.put(genesis).await?;
        self.audit
            .record(AuditEntry::accepted(AuditOperation::Create, GENESIS_TOKEN_ID))?;
        info!(id = GENESIS_TOKEN_ID, "Seeded genesis token");
        Ok(())
    }

    /// The engine's session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn lock_for(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Record a rejection and return the error, suppressing all output
    fn reject<T>(
        &self,
        operation: AuditOperation,
        target: &str,
        err: EngineError,
    ) -> Result<T, EngineError> {
        warn!(operation = %operation, target = %target, reason = %err, "Operation rejected");
        self.audit
            .record(AuditEntry::rejected(operation, target, err.to_string()))?;
        Err(err)
    }

    // =========================================================================
    // Token operations (mutable store)
    // =========================================================================

    /// Create a state token
    ///
    /// The request must carry a TTL; absence rejects with `MissingTtl`.
    pub async fn create_token(&self, request: CreateTokenRequest) -> Result<Token, EngineError> {
        self.create_token_inner(request).await
    }

    /// Create a persistent token
    ///
    /// Identical to [`create_token`](Self::create_token) except that a
    /// missing TTL is filled with the configured long default instead of
    /// rejecting.
    pub async fn create_persistent_token(
        &self,
        mut request: CreateTokenRequest,
    ) -> Result<Token, EngineError> {
        request.ttl_seconds = request
            .ttl_seconds
            .or(Some(self.config.persistent_ttl_seconds));
        self.create_token_inner(request).await
    }

    async fn create_token_inner(&self, request: CreateTokenRequest) -> Result<Token, EngineError> {
        self.sweep_expired().await?;

        let id = format!(
            "T-{:04}",
            self.token_sequence.fetch_add(1, Ordering::SeqCst)
        );

        let active = self.count_active().await?;
        if active >= self.config.max_active_tokens {
            return self.reject(
                AuditOperation::Create,
                &id,
                EngineError::TokenLimitReached(self.config.max_active_tokens),
            );
        }

        let Some(ttl_seconds) = request.ttl_seconds else {
            return self.reject(
                AuditOperation::Create,
                &id,
                ValidationError::MissingTtl.into(),
            );
        };

        if let Err(err) = check_explanation_length(&request.explanation) {
            return self.reject(AuditOperation::Create, &id, err);
        }

        // Resolve ancestry from the current store snapshot
        let (depth, ancestry) = match &request.parent_id {
            Some(parent_id) => match self.resolve_ancestry(parent_id).await? {
                Some(resolved) => resolved,
                None => {
                    return self.reject(
                        AuditOperation::Create,
                        &id,
                        EngineError::InvalidRequest(format!("parent token '{parent_id}' not found")),
                    );
                }
            },
            None => (0, Vec::new()),
        };

        if let Err(err) = self.validator.validate_ancestry(&id, &ancestry) {
            return self.reject(AuditOperation::Create, &id, err.into());
        }

        let mut builder = Token::builder(&id, request.class)
            .intensity(request.intensity.unwrap_or(0.5))
            .source(request.source.unwrap_or(Source::User))
            .ttl_seconds(ttl_seconds)
            .explanation(&request.explanation);
        if let Some(vector) = request.vector {
            builder = builder.vector(vector);
        }
        if let Some(parent_id) = &request.parent_id {
            builder = builder.parent(parent_id, depth);
        }

        let token = match builder.build() {
            Ok(token) => token,
            Err(err) => return self.reject(AuditOperation::Create, &id, err.into()),
        };

        if let Err(err) = self.validator.validate_token(&token) {
            return self.reject(AuditOperation::Create, &id, err.into());
        }

        self.store.put(token.clone()).await?;
        self.audit
            .record(AuditEntry::accepted(AuditOperation::Create, id.as_str()))?;
        info!(id = %id, class = %token.class, "Token created");
        Ok(token)
    }

    /// Mutate a live token through the transition engine
    ///
    /// Serialized per token identity: concurrent mutations of the same id
    /// apply in a well-defined order; different ids proceed in parallel.
    pub async fn mutate_token(
        &self,
        id: &str,
        request: MutationRequest,
        credential: Option<&Credential>,
    ) -> Result<Token, EngineError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(current) = self.load_live(id).await? else {
            return self.reject(
                AuditOperation::Mutate,
                id,
                EngineError::TokenNotFound(id.to_string()),
            );
        };

        if let Err(err) = self.validator.authorize(current.source, credential) {
            return self.reject(AuditOperation::Mutate, id, err.into());
        }

        if request.is_empty() {
            return self.reject(
                AuditOperation::Mutate,
                id,
                EngineError::InvalidRequest("mutation request changes nothing".into()),
            );
        }

        if let Some(explanation) = &request.explanation {
            if let Err(err) = check_explanation_length(explanation) {
                return self.reject(AuditOperation::Mutate, id, err);
            }
        }

        let candidate = apply_mutation(&current, &request, Utc::now());
        if let Err(err) = self.validator.validate_token(&candidate) {
            // Store left untouched: no partial write on rejection
            return self.reject(AuditOperation::Mutate, id, err.into());
        }

        self.store.put(candidate.clone()).await?;
        self.audit
            .record(AuditEntry::accepted(AuditOperation::Mutate, id))?;
        info!(id = %id, depth = candidate.depth, "Token mutated");
        Ok(candidate)
    }

    /// Explicitly remove a token - a logged, visible deletion
    pub async fn forget_token(
        &self,
        id: &str,
        credential: Option<&Credential>,
    ) -> Result<(), EngineError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let Some(current) = self.load_live(id).await? else {
            return self.reject(
                AuditOperation::Forget,
                id,
                EngineError::TokenNotFound(id.to_string()),
            );
        };

        if let Err(err) = self.validator.authorize(current.source, credential) {
            return self.reject(AuditOperation::Forget, id, err.into());
        }

        self.store.remove(id).await?;
        self.audit
            .record(AuditEntry::accepted(AuditOperation::Forget, id))?;
        info!(id = %id, "Token forgotten");
        Ok(())
    }

    /// Fetch a live token; expired tokens are purged (and audited) on access
    pub async fn get_token(&self, id: &str) -> Result<Option<Token>, EngineError> {
        self.load_live(id).await
    }

    /// All live tokens, ordered by creation time
    pub async fn list_active(&self) -> Result<Vec<Token>, EngineError> {
        self.sweep_expired().await?;
        let now = Utc::now();
        Ok(self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|t| !t.is_expired_at(now))
            .collect())
    }

    async fn count_active(&self) -> Result<usize, EngineError> {
        let now = Utc::now();
        Ok(self
            .store
            .list_all()
            .await?
            .iter()
            .filter(|t| !t.is_expired_at(now))
            .count())
    }

    /// Load a token, lazily purging it if its TTL has elapsed
    async fn load_live(&self, id: &str) -> Result<Option<Token>, EngineError> {
        let Some(token) = self.store.get(id).await? else {
            return Ok(None);
        };
        if state_at(&token, Utc::now()) == TokenState::Expired {
            if self.store.remove(id).await? {
                self.audit
                    .record(AuditEntry::accepted(AuditOperation::Expire, id))?;
                info!(id = %id, "Token expired");
            }
            return Ok(None);
        }
        Ok(Some(token))
    }

    /// Purge every expired token, auditing each expiry exactly once
    async fn sweep_expired(&self) -> Result<(), EngineError> {
        let now = Utc::now();
        for token in self.store.list_all().await? {
            if token.is_expired_at(now) {
                // `remove` reports whether this call actually deleted it, so
                // concurrent sweeps cannot double-audit one expiry
                if self.store.remove(&token.id).await? {
                    self.audit
                        .record(AuditEntry::accepted(AuditOperation::Expire, token.id.as_str()))?;
                    info!(id = %token.id, "Token expired");
                }
            }
        }
        Ok(())
    }

    /// Walk a parent chain from the store snapshot
    ///
    /// Returns the child depth and the ancestor id sequence (nearest first),
    /// or `None` when the named parent does not exist. The walk is capped
    /// just past the amplification limit; the validator turns an over-long
    /// or cyclic chain into a `RecursiveReference` rejection.
    async fn resolve_ancestry(
        &self,
        parent_id: &str,
    ) -> Result<Option<(u32, Vec<String>)>, EngineError> {
        let Some(parent) = self.store.get(parent_id).await? else {
            return Ok(None);
        };

        let mut ancestry = vec![parent.id.clone()];
        let mut cursor = parent.parent_id.clone();
        let cap = self.validator.max_depth() as usize + 2;

        while let Some(next_id) = cursor {
            if ancestry.len() >= cap || ancestry.contains(&next_id) {
                ancestry.push(next_id);
                break;
            }
            match self.store.get(&next_id).await? {
                Some(ancestor) => {
                    ancestry.push(ancestor.id.clone());
                    cursor = ancestor.parent_id.clone();
                }
                None => break,
            }
        }

        Ok(Some((parent.depth + 1, ancestry)))
    }

    // =========================================================================
    // Anchor operations (immutable ledger)
    // =========================================================================

    /// Register a lineage anchor - human-authorized only
    ///
    /// Returns the appended anchor and the new accumulator value.
    pub async fn register_anchor(
        &self,
        request: RegisterAnchorRequest,
        credential: Option<&Credential>,
    ) -> Result<(Anchor, Digest), EngineError> {
        let target = request.beacon_id.clone();

        match credential {
            Some(credential) if credential.subject == Source::User => {}
            _ => {
                return self.reject(
                    AuditOperation::Register,
                    &target,
                    ValidationError::Unauthorized(
                        "anchor registration requires a human-authorized credential".into(),
                    )
                    .into(),
                );
            }
        }

        let anchor = match self.build_anchor(&request) {
            Ok(anchor) => anchor,
            Err(err) => return self.reject(AuditOperation::Register, &target, err),
        };

        let result = match request.position {
            Some(position) => self.ledger.append_at(anchor.clone(), position),
            None => self.ledger.append(anchor.clone()),
        };

        match result {
            Ok(accumulator) => {
                self.audit
                    .record(AuditEntry::accepted(AuditOperation::Register, target.as_str()))?;
                Ok((anchor, accumulator))
            }
            Err(err) => self.reject(AuditOperation::Register, &target, err.into()),
        }
    }

    fn build_anchor(&self, request: &RegisterAnchorRequest) -> Result<Anchor, EngineError> {
        let beacon_id = BeaconId::parse(&request.beacon_id)?;
        let hash = ArtifactHash::parse(&request.hash)?;

        let mut builder = Anchor::builder(beacon_id)
            .artifact_name(&request.artifact_name)
            .canonical_owner(&request.canonical_owner)
            .hash(hash);
        if let Some(external_id) = &request.external_id {
            builder = builder.external_id(external_id);
        }
        if let Some(first_seen) = request.first_seen {
            builder = builder.first_seen(first_seen);
        }
        Ok(builder.build()?)
    }

    /// Deprecate an anchor (the only mutation anchors ever admit)
    pub async fn deprecate_anchor(&self, beacon_id: &str) -> Result<(), EngineError> {
        match self.ledger.deprecate(beacon_id) {
            Ok(()) => {
                self.audit
                    .record(AuditEntry::accepted(AuditOperation::Deprecate, beacon_id))?;
                Ok(())
            }
            Err(err) => self.reject(AuditOperation::Deprecate, beacon_id, err.into()),
        }
    }

    /// Verification report for a beacon id
    pub async fn verify_anchor(&self, beacon_id: &str) -> Result<VerificationReport, EngineError> {
        let report = self.ledger.verify(beacon_id);
        self.audit
            .record(AuditEntry::accepted(AuditOperation::Verify, beacon_id))?;
        Ok(report)
    }

    /// Inclusion proof for a beacon id
    pub fn prove(&self, beacon_id: &str) -> Result<InclusionProof, EngineError> {
        Ok(self.ledger.prove(beacon_id)?)
    }

    /// Non-revealing commitment for a beacon id
    pub fn commitment(&self, beacon_id: &str) -> Result<Digest, EngineError> {
        Ok(self.ledger.commitment(beacon_id)?)
    }

    /// Current ledger accumulator
    pub fn accumulator(&self) -> Digest {
        self.ledger.accumulator()
    }

    /// Recompute and cross-check the accumulator
    pub fn ledger_integrity(&self) -> Result<Digest, EngineError> {
        Ok(self.ledger.integrity()?)
    }

    /// Ordered snapshot of the full anchor registry
    pub fn anchors(&self) -> Vec<Anchor> {
        self.ledger.anchors()
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Audit summary counts
    pub fn audit_report(&self) -> AuditSummary {
        self.audit.summary()
    }

    /// Filtered audit query
    pub fn audit_query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.audit.query(filter)
    }

    /// Read-only state summary for downstream consumers
    pub async fn state_summary(&self) -> Result<StateSummary, EngineError> {
        Ok(StateSummary {
            session_id: self.session_id.clone(),
            generated_at: Utc::now(),
            active_tokens: self.list_active().await?,
            token_limit: self.config.max_active_tokens,
            anchor_count: self.ledger.len(),
            accumulator: self.ledger.accumulator(),
        })
    }
}
