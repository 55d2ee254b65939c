//! The lineage ledger
//!
//! Append-only, strictly ordered registry of immutable anchors plus the
//! running hash-chain accumulator. `append` is the only way entries enter;
//! insertion position is always the end and is part of the permanent record.
//! `deprecate` flips exactly one boolean and is itself append-logged as an
//! event - never an in-place rewrite of the original record bytes.
//!
//! The ledger has exactly one logical writer at a time: every mutating call
//! takes the write lock for its full duration, so position assignment never
//! races. Reads share the read lock and run in parallel.
//!
//! ## Durable form
//!
//! A JSONL event log at `<data_dir>/ledger.jsonl`. Each `append` event
//! carries the accumulator checkpoint after that append; replay at open
//! re-derives the chain from the anchors alone and compares against every
//! checkpoint. Any divergence marks the ledger poisoned: reads still serve,
//! but all further writes are refused with `AccumulatorMismatch` until the
//! stored log is manually resolved.

use chrono::{DateTime, Utc};
use lineage_core::{
    chain, Anchor, ArtifactHash, Digest, InclusionProof, LedgerError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::RwLock;
use tracing::{info, warn};

/// One line of the durable ledger log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum LedgerEvent {
    /// An anchor entered the ledger; `accumulator` is the checkpoint after it
    Append { anchor: Anchor, accumulator: Digest },
    /// An anchor's deprecation flag flipped false → true
    Deprecate {
        beacon_id: String,
        at: DateTime<Utc>,
    },
}

/// Verification result for one anchor
///
/// Carries everything a caller needs to independently recheck with the
/// proof service: the matched flag, the anchor's stored hash, and the
/// current accumulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub beacon_id: String,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<ArtifactHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    pub accumulator: Digest,
}

struct Inner {
    anchors: Vec<Anchor>,
    leaves: Vec<Digest>,
    index: HashMap<String, usize>,
    accumulator: Digest,
    file: Option<File>,
    poisoned: Option<LedgerError>,
}

impl Inner {
    fn empty(file: Option<File>) -> Self {
        Self {
            anchors: Vec::new(),
            leaves: Vec::new(),
            index: HashMap::new(),
            accumulator: chain::genesis(),
            file,
            poisoned: None,
        }
    }

    fn write_event(&mut self, event: &LedgerEvent) -> Result<(), LedgerError> {
        if let Some(file) = self.file.as_mut() {
            let mut line = serde_json::to_string(event)
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            line.push('\n');
            file.write_all(line.as_bytes())
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            file.flush()
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

/// The lineage ledger
pub struct Ledger {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("Ledger")
            .field("anchors", &inner.anchors.len())
            .field("accumulator", &inner.accumulator)
            .field("poisoned", &inner.poisoned.is_some())
            .finish()
    }
}

impl Ledger {
    /// Create an in-memory (non-durable) ledger
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner::empty(None)),
        }
    }

    /// Open (or initialize) the durable ledger at `<data_dir>/ledger.jsonl`
    ///
    /// Replays the event log, re-deriving the accumulator from the ordered
    /// anchors and checking it against every stored checkpoint.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = data_dir.as_ref().join("ledger.jsonl");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::Storage(e.to_string()))?;
        }

        let mut inner = Inner::empty(None);

        if path.exists() {
            let reader = BufReader::new(
                File::open(&path).map_err(|e| LedgerError::Storage(e.to_string()))?,
            );
            for line in reader.lines() {
                let line = line.map_err(|e| LedgerError::Storage(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let event: LedgerEvent = serde_json::from_str(&line)
                    .map_err(|e| LedgerError::Storage(e.to_string()))?;
                match event {
                    LedgerEvent::Append { anchor, accumulator } => {
                        let leaf = anchor.leaf_hash();
                        let derived = chain::extend(&inner.accumulator, &leaf);
                        if derived != accumulator {
                            warn!(
                                beacon_id = %anchor.beacon_id,
                                stored = %accumulator,
                                derived = %derived,
                                "SECURITY: ledger checkpoint diverges from derivable accumulator"
                            );
                            inner.poisoned = Some(LedgerError::AccumulatorMismatch {
                                stored: accumulator.to_hex(),
                                derived: derived.to_hex(),
                            });
                            break;
                        }
                        inner.index.insert(anchor.beacon_id.to_string(), inner.anchors.len());
                        inner.anchors.push(anchor);
                        inner.leaves.push(leaf);
                        inner.accumulator = derived;
                    }
                    LedgerEvent::Deprecate { beacon_id, .. } => {
                        if let Some(&position) = inner.index.get(&beacon_id) {
                            inner.anchors[position].deprecated = true;
                        } else {
                            warn!(beacon_id = %beacon_id, "Deprecation event for unknown anchor");
                        }
                    }
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        inner.file = Some(file);

        info!(
            path = %path.display(),
            anchors = inner.anchors.len(),
            accumulator = %inner.accumulator,
            poisoned = inner.poisoned.is_some(),
            "Opened lineage ledger"
        );
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Append an anchor at the end of the ledger
    ///
    /// Returns the new accumulator value. Rejects a duplicate beacon id and
    /// leaves the accumulator unchanged in that case.
    pub fn append(&self, anchor: Anchor) -> Result<Digest, LedgerError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(poisoned) = &inner.poisoned {
            return Err(poisoned.clone());
        }

        let beacon_id = anchor.beacon_id.to_string();
        if inner.index.contains_key(&beacon_id) {
            return Err(LedgerError::DuplicateId(beacon_id));
        }

        let leaf = anchor.leaf_hash();
        let accumulator = chain::extend(&inner.accumulator, &leaf);

        // Durable record first: a failed write must leave no partial state
        inner.write_event(&LedgerEvent::Append {
            anchor: anchor.clone(),
            accumulator,
        })?;

        let position = inner.anchors.len();
        inner.index.insert(beacon_id.clone(), position);
        inner.anchors.push(anchor);
        inner.leaves.push(leaf);
        inner.accumulator = accumulator;

        info!(beacon_id = %beacon_id, position, accumulator = %accumulator, "Anchor appended");
        Ok(accumulator)
    }

    /// Append with an explicit position request
    ///
    /// The only valid position is the current end; anything else is an
    /// out-of-order insert and is refused.
    pub fn append_at(&self, anchor: Anchor, position: u64) -> Result<Digest, LedgerError> {
        let length = self.len() as u64;
        if position != length {
            return Err(LedgerError::OutOfOrder {
                length,
                requested: position,
            });
        }
        self.append(anchor)
    }

    /// Fetch an anchor by beacon id
    pub fn get(&self, beacon_id: &str) -> Option<Anchor> {
        let inner = self.inner.read().unwrap();
        let position = *inner.index.get(beacon_id)?;
        Some(inner.anchors[position].clone())
    }

    /// Flip an anchor's deprecation flag, monotonically false → true
    pub fn deprecate(&self, beacon_id: &str) -> Result<(), LedgerError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(poisoned) = &inner.poisoned {
            return Err(poisoned.clone());
        }

        let position = *inner
            .index
            .get(beacon_id)
            .ok_or_else(|| LedgerError::NotFound(beacon_id.to_string()))?;
        if inner.anchors[position].deprecated {
            return Err(LedgerError::AlreadyDeprecated(beacon_id.to_string()));
        }

        inner.write_event(&LedgerEvent::Deprecate {
            beacon_id: beacon_id.to_string(),
            at: Utc::now(),
        })?;
        inner.anchors[position].deprecated = true;

        info!(beacon_id = %beacon_id, "Anchor deprecated");
        Ok(())
    }

    /// Ordered snapshot of all anchors
    pub fn anchors(&self) -> Vec<Anchor> {
        self.inner.read().unwrap().anchors.clone()
    }

    /// Number of anchors in the ledger
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().anchors.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current accumulator value
    pub fn accumulator(&self) -> Digest {
        self.inner.read().unwrap().accumulator
    }

    /// Recompute the accumulator from the ordered anchor list and compare
    ///
    /// Returns the derived value, or `AccumulatorMismatch` when the stored
    /// value diverges from it (or the ledger was poisoned at open).
    pub fn integrity(&self) -> Result<Digest, LedgerError> {
        let inner = self.inner.read().unwrap();
        if let Some(poisoned) = &inner.poisoned {
            return Err(poisoned.clone());
        }

        let derived = chain::accumulate(inner.leaves.iter());
        if derived != inner.accumulator {
            return Err(LedgerError::AccumulatorMismatch {
                stored: inner.accumulator.to_hex(),
                derived: derived.to_hex(),
            });
        }
        Ok(derived)
    }

    /// Derive an inclusion proof for one anchor
    pub fn prove(&self, beacon_id: &str) -> Result<InclusionProof, LedgerError> {
        let inner = self.inner.read().unwrap();
        let position = *inner
            .index
            .get(beacon_id)
            .ok_or_else(|| LedgerError::NotFound(beacon_id.to_string()))?;
        chain::prove(beacon_id, &inner.leaves, position)
            .ok_or_else(|| LedgerError::NotFound(beacon_id.to_string()))
    }

    /// Non-revealing commitment to one anchor's presence
    pub fn commitment(&self, beacon_id: &str) -> Result<Digest, LedgerError> {
        let inner = self.inner.read().unwrap();
        let position = *inner
            .index
            .get(beacon_id)
            .ok_or_else(|| LedgerError::NotFound(beacon_id.to_string()))?;
        Ok(chain::commitment(&inner.leaves[position], &inner.accumulator))
    }

    /// Verification report for one beacon id
    ///
    /// `matched = false` (with no hash) when the id is absent; the current
    /// accumulator is always reported so the caller can recheck offline.
    pub fn verify(&self, beacon_id: &str) -> VerificationReport {
        let inner = self.inner.read().unwrap();
        match inner.index.get(beacon_id) {
            Some(&position) => {
                let anchor = &inner.anchors[position];
                VerificationReport {
                    beacon_id: beacon_id.to_string(),
                    matched: true,
                    hash: Some(anchor.hash.clone()),
                    deprecated: Some(anchor.deprecated),
                    accumulator: inner.accumulator,
                }
            }
            None => VerificationReport {
                beacon_id: beacon_id.to_string(),
                matched: false,
                hash: None,
                deprecated: None,
                accumulator: inner.accumulator,
            },
        }
    }
}
