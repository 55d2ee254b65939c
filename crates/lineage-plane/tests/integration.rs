//! Integration Tests for the Lineage Engine
//!
//! These tests drive the engine end-to-end across both stores:
//! - token creation, mutation, expiry, and forgetting
//! - anchor registration, verification, proofs, and deprecation
//! - the audit trail recorded along the way

use lineage_core::{accumulate, Credential, Source, TokenClass};
use lineage_plane::{
    AuditFilter, AuditOperation, CreateTokenRequest, Engine, EngineConfig, MutationRequest,
    Outcome, RegisterAnchorRequest,
};

// =============================================================================
// Test Helpers
// =============================================================================

async fn engine() -> Engine {
    Engine::new(EngineConfig {
        bootstrap_genesis: false,
        ..EngineConfig::default()
    })
    .await
    .expect("engine")
}

fn token_request(explanation: &str) -> CreateTokenRequest {
    CreateTokenRequest {
        class: TokenClass::Anchor,
        vector: None,
        intensity: Some(0.5),
        source: Some(Source::User),
        ttl_seconds: Some(3600),
        explanation: explanation.into(),
        parent_id: None,
    }
}

fn anchor_request(beacon_id: &str, hash: &str) -> RegisterAnchorRequest {
    RegisterAnchorRequest {
        beacon_id: beacon_id.into(),
        artifact_name: format!("Artifact {beacon_id}"),
        canonical_owner: "mirror-lab".into(),
        external_id: None,
        first_seen: None,
        hash: hash.into(),
        position: None,
    }
}

fn user() -> Credential {
    Credential::user()
}

// =============================================================================
// Token Lifecycle
// =============================================================================

#[tokio::test]
async fn test_created_token_is_retrievable_until_ttl_elapses() {
    let engine = engine().await;

    let mut request = token_request("short lived focus state");
    request.ttl_seconds = Some(1);
    let token = engine.create_token(request).await.unwrap();

    assert!(engine.get_token(&token.id).await.unwrap().is_some());

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    assert!(engine.get_token(&token.id).await.unwrap().is_none());

    // The automatic expiry produced exactly one audit entry
    let expiries = engine.audit_query(&AuditFilter {
        target_id: Some(token.id.clone()),
        operation: Some(AuditOperation::Expire),
        ..Default::default()
    });
    assert_eq!(expiries.len(), 1);
    assert_eq!(expiries[0].outcome, Outcome::Accepted);
}

#[tokio::test]
async fn test_missing_ttl_rejected() {
    let engine = engine().await;

    let mut request = token_request("no ttl carried");
    request.ttl_seconds = None;
    let result = engine.create_token(request).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("TTL"));
}

#[tokio::test]
async fn test_overlong_explanation_rejected() {
    let engine = engine().await;

    let request = token_request(&"x".repeat(lineage_core::token::MAX_EXPLANATION_LEN + 1));
    let result = engine.create_token(request).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("exceeds"));
}

#[tokio::test]
async fn test_persistent_pathway_fills_long_ttl() {
    let engine = engine().await;

    let mut request = token_request("remember the deadline");
    request.ttl_seconds = None;
    let token = engine.create_persistent_token(request).await.unwrap();

    assert_eq!(token.ttl_seconds, lineage_core::token::PERSISTENT_TTL_SECS);
}

#[tokio::test]
async fn test_mutation_beyond_depth_limit_leaves_store_unchanged() {
    let engine = Engine::new(EngineConfig {
        bootstrap_genesis: false,
        max_depth: 2,
        ..EngineConfig::default()
    })
    .await
    .unwrap();

    let token = engine
        .create_token(token_request("baseline"))
        .await
        .unwrap();

    let attenuate = MutationRequest {
        attenuate: Some(0.9),
        ..Default::default()
    };

    // Depth 1 and 2 are fine
    engine
        .mutate_token(&token.id, attenuate.clone(), Some(&user()))
        .await
        .unwrap();
    let at_limit = engine
        .mutate_token(&token.id, attenuate.clone(), Some(&user()))
        .await
        .unwrap();
    assert_eq!(at_limit.depth, 2);

    // Depth 3 exceeds the amplification limit
    let result = engine
        .mutate_token(&token.id, attenuate, Some(&user()))
        .await;
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("amplification limit"));

    // No partial write: the stored snapshot is still the depth-2 one
    let stored = engine.get_token(&token.id).await.unwrap().unwrap();
    assert_eq!(stored.depth, 2);
    assert_eq!(stored.intensity, at_limit.intensity);
}

#[tokio::test]
async fn test_identity_claim_rejected_and_never_accepted_in_audit() {
    let engine = engine().await;

    let result = engine
        .create_token(token_request("I am conscious"))
        .await;
    assert!(result.is_err());

    // No audit entry for this request shows outcome accepted
    let accepted = engine.audit_query(&AuditFilter {
        outcome: Some(Outcome::Accepted),
        ..Default::default()
    });
    assert!(accepted.is_empty());

    let rejected = engine.audit_query(&AuditFilter {
        outcome: Some(Outcome::Rejected),
        ..Default::default()
    });
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("identity"));
}

#[tokio::test]
async fn test_mutation_requires_matching_credential() {
    let engine = engine().await;

    let mut request = token_request("system-held state");
    request.source = Some(Source::System);
    let token = engine.create_token(request).await.unwrap();

    let mutation = MutationRequest {
        intensity: Some(0.1),
        ..Default::default()
    };

    // No credential
    assert!(engine
        .mutate_token(&token.id, mutation.clone(), None)
        .await
        .is_err());

    // Wrong subject
    assert!(engine
        .mutate_token(&token.id, mutation.clone(), Some(&user()))
        .await
        .is_err());

    // Matching subject
    let mutated = engine
        .mutate_token(&token.id, mutation, Some(&Credential::system("any")))
        .await
        .unwrap();
    assert_eq!(mutated.intensity, 0.1);
}

#[tokio::test]
async fn test_forget_is_a_logged_visible_deletion() {
    let engine = engine().await;
    let token = engine
        .create_token(token_request("state to forget"))
        .await
        .unwrap();

    engine.forget_token(&token.id, Some(&user())).await.unwrap();
    assert!(engine.get_token(&token.id).await.unwrap().is_none());

    // The prior existence stays visible through the audit trail
    let history = engine.audit_query(&AuditFilter {
        target_id: Some(token.id.clone()),
        ..Default::default()
    });
    let operations: Vec<_> = history.iter().map(|e| e.operation).collect();
    assert_eq!(
        operations,
        vec![AuditOperation::Create, AuditOperation::Forget]
    );
}

#[tokio::test]
async fn test_active_list_is_creation_ordered() {
    let engine = engine().await;
    let first = engine.create_token(token_request("first")).await.unwrap();
    let second = engine.create_token(token_request("second")).await.unwrap();

    let active = engine.list_active().await.unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].id, first.id);
    assert_eq!(active[1].id, second.id);
}

#[tokio::test]
async fn test_accretion_limit_rejects_further_creates() {
    let engine = Engine::new(EngineConfig {
        bootstrap_genesis: false,
        max_active_tokens: 2,
        ..EngineConfig::default()
    })
    .await
    .unwrap();

    engine.create_token(token_request("one")).await.unwrap();
    engine.create_token(token_request("two")).await.unwrap();

    let result = engine.create_token(token_request("three")).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("limit"));
}

// =============================================================================
// Ledger
// =============================================================================

#[tokio::test]
async fn test_accumulator_is_recomputable_after_every_append() {
    let engine = engine().await;

    for n in 1..=5u32 {
        let (_, accumulator) = engine
            .register_anchor(
                anchor_request(&format!("BG-AMOS-{n:04}"), &format!("sha256:a{n:04}")),
                Some(&user()),
            )
            .await
            .unwrap();

        // Recompute purely from the ordered anchor list
        let leaves: Vec<_> = engine.anchors().iter().map(|a| a.leaf_hash()).collect();
        assert_eq!(accumulator, accumulate(leaves.iter()));
        assert_eq!(accumulator, engine.accumulator());
    }
}

#[tokio::test]
async fn test_duplicate_beacon_id_rejected_without_accumulator_change() {
    let engine = engine().await;

    engine
        .register_anchor(anchor_request("BG-AMOS-0001", "sha256:one"), Some(&user()))
        .await
        .unwrap();
    let accumulator = engine.accumulator();

    let result = engine
        .register_anchor(
            anchor_request("BG-AMOS-0001", "sha256:other"),
            Some(&user()),
        )
        .await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("already exists"));
    assert_eq!(engine.accumulator(), accumulator);

    // The original record is untouched: anchors admit no mutation entry
    // point other than deprecate
    let stored = engine.anchors();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].hash.to_string(), "sha256:one");
}

#[tokio::test]
async fn test_registration_scenario_with_proof_after_second_append() {
    let engine = engine().await;

    let (_, acc_one) = engine
        .register_anchor(
            anchor_request("BG-AMOS-0001", "sha256:scd31_0xf7a9e3b2"),
            Some(&user()),
        )
        .await
        .unwrap();

    let (_, acc_two) = engine
        .register_anchor(
            anchor_request("BG-AMOS-0002", "sha256:9b1e77_0xc44d10aa"),
            Some(&user()),
        )
        .await
        .unwrap();

    // The accumulator after both appends differs from after only the first
    assert_ne!(acc_one, acc_two);

    // A proof for the first anchor, generated after both appends, still
    // verifies against the two-entry accumulator
    let proof = engine.prove("BG-AMOS-0001").unwrap();
    assert!(proof.verify(&acc_two));
    assert!(!proof.verify(&acc_one));
}

#[tokio::test]
async fn test_every_anchor_proves_against_the_live_accumulator() {
    let engine = engine().await;

    for n in 1..=4u32 {
        engine
            .register_anchor(
                anchor_request(&format!("BG-REPO-{n:04}"), &format!("sha256:r{n}")),
                Some(&user()),
            )
            .await
            .unwrap();
    }

    let accumulator = engine.accumulator();
    for n in 1..=4u32 {
        let proof = engine.prove(&format!("BG-REPO-{n:04}")).unwrap();
        assert!(proof.verify(&accumulator));
    }

    assert!(engine.prove("BG-REPO-0099").is_err());
}

#[tokio::test]
async fn test_registration_is_human_authorized_only() {
    let engine = engine().await;

    let result = engine
        .register_anchor(anchor_request("BG-AMOS-0001", "sha256:x"), None)
        .await;
    assert!(result.is_err());

    let result = engine
        .register_anchor(
            anchor_request("BG-AMOS-0001", "sha256:x"),
            Some(&Credential::system("secret")),
        )
        .await;
    assert!(result.is_err());

    assert!(engine.anchors().is_empty());
}

#[tokio::test]
async fn test_deprecate_succeeds_once_then_rejects() {
    let engine = engine().await;
    engine
        .register_anchor(anchor_request("BG-SPEC-0001", "sha256:s1"), Some(&user()))
        .await
        .unwrap();

    engine.deprecate_anchor("BG-SPEC-0001").await.unwrap();

    let result = engine.deprecate_anchor("BG-SPEC-0001").await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("already deprecated"));

    // Deprecation never perturbs the chain
    assert!(engine.ledger_integrity().is_ok());
}

#[tokio::test]
async fn test_verification_report_carries_hash_and_accumulator() {
    let engine = engine().await;
    engine
        .register_anchor(
            anchor_request("BG-PAPER-0001", "sha256:p1"),
            Some(&user()),
        )
        .await
        .unwrap();

    let report = engine.verify_anchor("BG-PAPER-0001").await.unwrap();
    assert!(report.matched);
    assert_eq!(report.hash.unwrap().to_string(), "sha256:p1");
    assert_eq!(report.accumulator, engine.accumulator());

    let report = engine.verify_anchor("BG-PAPER-0099").await.unwrap();
    assert!(!report.matched);
    assert!(report.hash.is_none());
}

// =============================================================================
// Summary & Audit
// =============================================================================

#[tokio::test]
async fn test_state_summary_is_a_read_only_snapshot() {
    let engine = engine().await;
    engine.create_token(token_request("live state")).await.unwrap();
    engine
        .register_anchor(anchor_request("BG-AMOS-0001", "sha256:a1"), Some(&user()))
        .await
        .unwrap();

    let summary = engine.state_summary().await.unwrap();
    assert_eq!(summary.active_tokens.len(), 1);
    assert_eq!(summary.anchor_count, 1);
    assert_eq!(summary.accumulator, engine.accumulator());

    // Round-trips as plain data
    let json = serde_json::to_string(&summary).unwrap();
    let restored: lineage_plane::StateSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.active_tokens.len(), 1);
}

#[tokio::test]
async fn test_audit_report_counts_accepts_and_rejects() {
    let engine = engine().await;

    engine.create_token(token_request("fine")).await.unwrap();
    let _ = engine.create_token(token_request("I am conscious")).await;
    engine
        .register_anchor(anchor_request("BG-AMOS-0001", "sha256:a1"), Some(&user()))
        .await
        .unwrap();

    let report = engine.audit_report();
    assert_eq!(report.total_entries, 3);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.by_operation.get("create"), Some(&2));
    assert_eq!(report.by_operation.get("register"), Some(&1));
}

#[tokio::test]
async fn test_genesis_bootstrap_seeds_empty_store_once() {
    let engine = Engine::new(EngineConfig::default()).await.unwrap();

    let active = engine.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "T-0000");
    assert_eq!(active[0].source, Source::System);
}

#[tokio::test]
async fn test_anchor_export_round_trips_losslessly() {
    let engine = engine().await;
    let mut request = anchor_request("BG-DATASET-0003", "blake3:d3hash");
    request.external_id = Some("10.5281/zenodo.0000003".into());
    request.first_seen = chrono::NaiveDate::from_ymd_opt(2023, 11, 5);

    let (anchor, _) = engine.register_anchor(request, Some(&user())).await.unwrap();

    let json = serde_json::to_string(&anchor).unwrap();
    let restored: lineage_core::Anchor = serde_json::from_str(&json).unwrap();
    assert_eq!(anchor, restored);
    assert_eq!(restored.external_id.as_deref(), Some("10.5281/zenodo.0000003"));
    assert_eq!(restored.hash.to_string(), "blake3:d3hash");
}
