//! API request handlers

use axum::extract::{Path, State};
use axum::Json;
use lineage_core::{Anchor, Credential, Digest, InclusionProof, Source, Token};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::audit::AuditSummary;
use crate::engine::{CreateTokenRequest, Engine, RegisterAnchorRequest, StateSummary};
use crate::ledger::VerificationReport;
use crate::transition::MutationRequest;

/// Shared application state
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Credential carried in mutation request bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialDto {
    pub subject: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl From<CredentialDto> for Credential {
    fn from(dto: CredentialDto) -> Self {
        Credential {
            subject: dto.subject,
            secret: dto.secret,
        }
    }
}

/// Body for `POST /v1/tokens`
#[derive(Debug, Deserialize)]
pub struct CreateTokenBody {
    #[serde(flatten)]
    pub request: CreateTokenRequest,
    /// Use the persistent (long-TTL) pathway
    #[serde(default)]
    pub persistent: bool,
}

/// Body for `POST /v1/tokens/{id}/mutate`
#[derive(Debug, Deserialize)]
pub struct MutateTokenBody {
    #[serde(flatten)]
    pub mutation: MutationRequest,
    pub credential: Option<CredentialDto>,
}

/// Body for `DELETE /v1/tokens/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct ForgetTokenBody {
    pub credential: Option<CredentialDto>,
}

/// Body for `POST /v1/anchors`
#[derive(Debug, Deserialize)]
pub struct RegisterAnchorBody {
    #[serde(flatten)]
    pub request: RegisterAnchorRequest,
    pub credential: Option<CredentialDto>,
}

/// Response for `POST /v1/anchors`
#[derive(Debug, Serialize)]
pub struct RegisterAnchorResponse {
    pub anchor: Anchor,
    pub accumulator: Digest,
}

/// Response for `POST /v1/anchors/{id}/deprecate`
#[derive(Debug, Serialize)]
pub struct DeprecateResponse {
    pub beacon_id: String,
    pub deprecated: bool,
}

/// Response for `GET /v1/anchors/{id}/commitment`
#[derive(Debug, Serialize)]
pub struct CommitmentResponse {
    pub beacon_id: String,
    pub commitment: Digest,
    pub accumulator: Digest,
}

/// Response for `GET /v1/ledger/accumulator`
#[derive(Debug, Serialize)]
pub struct AccumulatorResponse {
    pub accumulator: Digest,
    pub anchor_count: usize,
}

/// Response for `GET /v1/registry`
#[derive(Debug, Serialize)]
pub struct RegistryResponse {
    pub anchors: Vec<Anchor>,
    pub accumulator: Digest,
}

/// Create a state token
///
/// POST /v1/tokens
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTokenBody>,
) -> Result<Json<Token>, ApiError> {
    let token = if body.persistent {
        state.engine.create_persistent_token(body.request).await?
    } else {
        state.engine.create_token(body.request).await?
    };
    Ok(Json(token))
}

/// Mutate a live token
///
/// POST /v1/tokens/{id}/mutate
pub async fn mutate_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<MutateTokenBody>,
) -> Result<Json<Token>, ApiError> {
    let credential = body.credential.map(Credential::from);
    let token = state
        .engine
        .mutate_token(&id, body.mutation, credential.as_ref())
        .await?;
    Ok(Json(token))
}

/// Forget (remove) a token - a logged, visible deletion
///
/// DELETE /v1/tokens/{id}
pub async fn forget_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ForgetTokenBody>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let credential = body
        .and_then(|Json(b)| b.credential)
        .map(Credential::from);
    state.engine.forget_token(&id, credential.as_ref()).await?;
    Ok(Json(serde_json::json!({ "forgotten": id })))
}

/// List active tokens
///
/// GET /v1/tokens
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Token>>, ApiError> {
    Ok(Json(state.engine.list_active().await?))
}

/// Audit summary report
///
/// GET /v1/audit/report
pub async fn audit_report(State(state): State<Arc<AppState>>) -> Json<AuditSummary> {
    Json(state.engine.audit_report())
}

/// Register a lineage anchor (human-authorized only)
///
/// POST /v1/anchors
pub async fn register_anchor(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterAnchorBody>,
) -> Result<Json<RegisterAnchorResponse>, ApiError> {
    let credential = body.credential.map(Credential::from);
    let (anchor, accumulator) = state
        .engine
        .register_anchor(body.request, credential.as_ref())
        .await?;
    Ok(Json(RegisterAnchorResponse { anchor, accumulator }))
}

/// Deprecate an anchor
///
/// POST /v1/anchors/{id}/deprecate
pub async fn deprecate_anchor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeprecateResponse>, ApiError> {
    state.engine.deprecate_anchor(&id).await?;
    Ok(Json(DeprecateResponse {
        beacon_id: id,
        deprecated: true,
    }))
}

/// Verify an anchor
///
/// GET /v1/anchors/{id}/verify
pub async fn verify_anchor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VerificationReport>, ApiError> {
    Ok(Json(state.engine.verify_anchor(&id).await?))
}

/// Inclusion proof for an anchor
///
/// This proof can be verified offline against the published accumulator.
///
/// GET /v1/anchors/{id}/proof
pub async fn anchor_proof(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InclusionProof>, ApiError> {
    Ok(Json(state.engine.prove(&id)?))
}

/// Non-revealing commitment for an anchor
///
/// GET /v1/anchors/{id}/commitment
pub async fn anchor_commitment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CommitmentResponse>, ApiError> {
    let commitment = state.engine.commitment(&id)?;
    Ok(Json(CommitmentResponse {
        beacon_id: id,
        commitment,
        accumulator: state.engine.accumulator(),
    }))
}

/// Current ledger accumulator
///
/// GET /v1/ledger/accumulator
pub async fn ledger_accumulator(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AccumulatorResponse>, ApiError> {
    // Cross-check the stored value against the derivable one on every read
    let accumulator = state.engine.ledger_integrity()?;
    Ok(Json(AccumulatorResponse {
        accumulator,
        anchor_count: state.engine.anchors().len(),
    }))
}

/// Full anchor registry
///
/// GET /v1/registry
pub async fn registry(State(state): State<Arc<AppState>>) -> Json<RegistryResponse> {
    Json(RegistryResponse {
        anchors: state.engine.anchors(),
        accumulator: state.engine.accumulator(),
    })
}

/// Read-only state summary for downstream consumers
///
/// GET /v1/state
pub async fn state_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateSummary>, ApiError> {
    Ok(Json(state.engine.state_summary().await?))
}
