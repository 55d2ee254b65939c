//! Lineage CLI
//!
//! Thin command-line shell over the engine. All state lives under the data
//! directory; every invocation opens the same durable stores the service
//! uses.
//!
//! ```text
//! lineage state "Starting focused work" --class anchor
//! lineage remember "Project deadline is Friday"
//! lineage forget T-0003
//! lineage list
//! lineage audit
//! lineage register BG-AMOS-0001 --name "AMOS Paper" --owner mirror-lab \
//!     --hash sha256:scd31_0xf7a9e3b2
//! lineage verify BG-AMOS-0001
//! lineage export --format json
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use lineage_core::{Credential, Source, TokenClass};
use lineage_plane::{
    CreateTokenRequest, Engine, EngineConfig, MutationRequest, RegisterAnchorRequest,
};

#[derive(Parser)]
#[command(name = "lineage", about = "Provenance tracking: state tokens and lineage anchors")]
struct Cli {
    /// Data directory for durable stores
    #[arg(long, env = "LINEAGE_DATA_DIR", default_value = "./lineage-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ClassArg {
    Anchor,
    Mutation,
    Warning,
    Audit,
    Consent,
}

impl From<ClassArg> for TokenClass {
    fn from(arg: ClassArg) -> Self {
        match arg {
            ClassArg::Anchor => TokenClass::Anchor,
            ClassArg::Mutation => TokenClass::Mutation,
            ClassArg::Warning => TokenClass::Warning,
            ClassArg::Audit => TokenClass::Audit,
            ClassArg::Consent => TokenClass::Consent,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Command {
    /// Create a session state token
    State {
        /// One-sentence state description
        message: String,
        #[arg(long, value_enum, default_value = "anchor")]
        class: ClassArg,
        #[arg(long, default_value_t = 0.5)]
        intensity: f64,
        /// Time-to-live in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl: i64,
    },

    /// Create a persistent (long-TTL) token
    Remember {
        /// What to remember
        message: String,
    },

    /// Mutate a live token
    Mutate {
        token_id: String,
        #[arg(long)]
        intensity: Option<f64>,
        /// Multiply intensity by a decay factor
        #[arg(long)]
        attenuate: Option<f64>,
        #[arg(long, value_enum)]
        class: Option<ClassArg>,
        #[arg(long)]
        explanation: Option<String>,
        /// Extend the TTL by this many seconds
        #[arg(long)]
        extend_ttl: Option<i64>,
    },

    /// Remove a token (logged, visible deletion)
    Forget { token_id: String },

    /// List active tokens
    List,

    /// Show the audit report
    Audit,

    /// Register a lineage anchor (human-authorized)
    Register {
        beacon_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        owner: String,
        /// Algorithm-tagged content hash, e.g. sha256:...
        #[arg(long)]
        hash: String,
        #[arg(long)]
        external_id: Option<String>,
        /// First-seen date (YYYY-MM-DD)
        #[arg(long)]
        first_seen: Option<NaiveDate>,
    },

    /// Deprecate an anchor
    Deprecate { beacon_id: String },

    /// Verify an anchor against the ledger
    Verify { beacon_id: String },

    /// Print the inclusion proof for an anchor
    Proof { beacon_id: String },

    /// Print the current ledger accumulator
    Accumulator,

    /// Export the read-only state summary
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let engine = Engine::new(EngineConfig {
        data_dir: Some(cli.data_dir.clone()),
        system_secret: std::env::var("LINEAGE_SYSTEM_SECRET").ok(),
        ..EngineConfig::default()
    })
    .await
    .with_context(|| format!("opening data directory {}", cli.data_dir.display()))?;

    match cli.command {
        Command::State {
            message,
            class,
            intensity,
            ttl,
        } => {
            let token = engine
                .create_token(CreateTokenRequest {
                    class: class.into(),
                    vector: None,
                    intensity: Some(intensity),
                    source: Some(Source::User),
                    ttl_seconds: Some(ttl),
                    explanation: message,
                    parent_id: None,
                })
                .await?;
            println!("{}: {}", token.id, token.render_text());
        }

        Command::Remember { message } => {
            let token = engine
                .create_persistent_token(CreateTokenRequest {
                    class: TokenClass::Anchor,
                    vector: None,
                    intensity: Some(0.5),
                    source: Some(Source::User),
                    ttl_seconds: None,
                    explanation: message,
                    parent_id: None,
                })
                .await?;
            println!("Remembered: {}", token.id);
        }

        Command::Mutate {
            token_id,
            intensity,
            attenuate,
            class,
            explanation,
            extend_ttl,
        } => {
            let request = MutationRequest {
                vector: None,
                intensity,
                attenuate,
                class: class.map(TokenClass::from),
                explanation,
                extend_ttl_seconds: extend_ttl,
            };
            let token = engine
                .mutate_token(&token_id, request, Some(&Credential::user()))
                .await?;
            println!("{}: {}", token.id, token.render_text());
        }

        Command::Forget { token_id } => {
            engine
                .forget_token(&token_id, Some(&Credential::user()))
                .await?;
            println!("Forgot: {token_id}");
        }

        Command::List => {
            let active = engine.list_active().await?;
            if active.is_empty() {
                println!("No active tokens.");
            }
            for token in active {
                println!("{}  {}", token.id, token.render_text());
            }
        }

        Command::Audit => {
            let report = engine.audit_report();
            println!("AUDIT REPORT");
            println!("  total events: {}", report.total_entries);
            println!("  accepted:     {}", report.accepted);
            println!("  rejected:     {}", report.rejected);
            let mut operations: Vec<_> = report.by_operation.iter().collect();
            operations.sort();
            for (operation, count) in operations {
                println!("  {operation:<12} {count}");
            }
        }

        Command::Register {
            beacon_id,
            name,
            owner,
            hash,
            external_id,
            first_seen,
        } => {
            let (anchor, accumulator) = engine
                .register_anchor(
                    RegisterAnchorRequest {
                        beacon_id,
                        artifact_name: name,
                        canonical_owner: owner,
                        external_id,
                        first_seen,
                        hash,
                        position: None,
                    },
                    Some(&Credential::user()),
                )
                .await?;
            println!("Registered: {}", anchor.beacon_id);
            println!("Accumulator: {accumulator}");
        }

        Command::Deprecate { beacon_id } => {
            engine.deprecate_anchor(&beacon_id).await?;
            println!("Deprecated: {beacon_id}");
        }

        Command::Verify { beacon_id } => {
            let report = engine.verify_anchor(&beacon_id).await?;
            if report.matched {
                println!("VERIFIED: {}", report.beacon_id);
                if let Some(hash) = &report.hash {
                    println!("  hash:        {hash}");
                }
                if report.deprecated == Some(true) {
                    println!("  deprecated:  yes");
                }
                println!("  accumulator: {}", report.accumulator);
            } else {
                println!("NOT FOUND: {}", report.beacon_id);
                println!("  accumulator: {}", report.accumulator);
                std::process::exit(1);
            }
        }

        Command::Proof { beacon_id } => {
            let proof = engine.prove(&beacon_id)?;
            println!("{}", serde_json::to_string_pretty(&proof)?);
        }

        Command::Accumulator => {
            let accumulator = engine.ledger_integrity()?;
            println!("{accumulator}");
        }

        Command::Export { format } => {
            let summary = engine.state_summary().await?;
            match format {
                ExportFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                ExportFormat::Text => {
                    println!("ACTIVE TOKENS ({}):", summary.active_tokens.len());
                    for token in &summary.active_tokens {
                        println!("  {}  {}", token.id, token.render_text());
                    }
                    println!("ANCHORS: {}", summary.anchor_count);
                    println!("ACCUMULATOR: {}", summary.accumulator);
                }
            }
        }
    }

    Ok(())
}
