//! Append-only audit trail
//!
//! Every accepted and rejected operation is recorded here, whether it
//! touched the token store or the ledger. Entries are never edited; this
//! component is the sole writer and the sole authoritative history of
//! rejected operations - rejections appear nowhere else.
//!
//! Durable form is JSONL: one entry per line, appended and flushed before
//! the operation's result is returned to the caller. A write failure is
//! storage exhaustion and is surfaced as fatal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::store::StorageError;

/// Operation kinds recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    Create,
    Mutate,
    Expire,
    Forget,
    Register,
    Deprecate,
    Verify,
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditOperation::Create => "create",
            AuditOperation::Mutate => "mutate",
            AuditOperation::Expire => "expire",
            AuditOperation::Forget => "forget",
            AuditOperation::Register => "register",
            AuditOperation::Deprecate => "deprecate",
            AuditOperation::Verify => "verify",
        };
        f.write_str(s)
    }
}

/// Accept/reject outcome of an audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Accepted,
    Rejected,
}

/// A single immutable audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the outcome was decided
    pub timestamp: DateTime<Utc>,

    /// What was attempted
    pub operation: AuditOperation,

    /// Token id or beacon id the operation targeted
    pub target_id: String,

    /// Whether the operation was applied
    pub outcome: Outcome,

    /// Populated only on rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    /// An accepted-operation entry
    pub fn accepted(operation: AuditOperation, target_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            target_id: target_id.into(),
            outcome: Outcome::Accepted,
            reason: None,
        }
    }

    /// A rejected-operation entry with its reason
    pub fn rejected(
        operation: AuditOperation,
        target_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            target_id: target_id.into(),
            outcome: Outcome::Rejected,
            reason: Some(reason.into()),
        }
    }
}

/// Filters for audit queries; unset fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub target_id: Option<String>,
    pub operation: Option<AuditOperation>,
    pub outcome: Option<Outcome>,
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(target) = &self.target_id {
            if &entry.target_id != target {
                return false;
            }
        }
        if let Some(operation) = self.operation {
            if entry.operation != operation {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if entry.outcome != outcome {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Summary counts for the audit report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total_entries: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub by_operation: HashMap<String, usize>,
}

struct Inner {
    entries: Vec<AuditEntry>,
    file: Option<File>,
}

/// The append-only audit log
///
/// In-memory entries mirror the durable JSONL file so queries never re-read
/// the disk.
pub struct AuditLog {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("AuditLog")
            .field("entries", &inner.entries.len())
            .field("durable", &inner.file.is_some())
            .finish()
    }
}

impl AuditLog {
    /// Create an in-memory (non-durable) log
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                file: None,
            }),
        }
    }

    /// Open (or initialize) the durable log at `<data_dir>/audit.jsonl`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = data_dir.as_ref().join("audit.jsonl");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                entries.push(serde_json::from_str(&line)?);
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                entries,
                file: Some(file),
            }),
        })
    }

    /// Append an entry (never edits, never reorders)
    ///
    /// The only failure mode is storage exhaustion, which is surfaced to the
    /// caller as fatal.
    pub fn record(&self, entry: AuditEntry) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(file) = inner.file.as_mut() {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }
        inner.entries.push(entry);
        Ok(())
    }

    /// Query entries matching a filter, oldest first
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Total number of recorded entries
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summary counts over the full log
    pub fn summary(&self) -> AuditSummary {
        let inner = self.inner.lock().unwrap();
        let mut by_operation: HashMap<String, usize> = HashMap::new();
        let mut accepted = 0;
        let mut rejected = 0;

        for entry in &inner.entries {
            *by_operation.entry(entry.operation.to_string()).or_default() += 1;
            match entry.outcome {
                Outcome::Accepted => accepted += 1,
                Outcome::Rejected => rejected += 1,
            }
        }

        AuditSummary {
            total_entries: inner.entries.len(),
            accepted,
            rejected,
            by_operation,
        }
    }
}
