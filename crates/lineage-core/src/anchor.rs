//! Lineage anchor types
//!
//! An anchor is the immutable half of the system: a permanent citation record
//! for an external artifact (paper, repository, specification). Once appended
//! to the ledger, every field except `deprecated` is bit-for-bit immutable,
//! and the insertion position is part of the permanent record.

use crate::hash::{digest_canonical, Digest};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing or assembling anchor identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorFormatError {
    /// Beacon id does not match `BG-{SCOPE}-{SEQUENCE}`
    #[error("invalid beacon id '{0}': expected BG-{{SCOPE}}-{{SEQUENCE}}")]
    InvalidBeaconId(String),

    /// Scope code is not in the registry
    #[error("unknown scope code '{0}'")]
    UnknownScope(String),

    /// Beacon id scope does not match the anchor's scope field
    #[error("beacon id '{id}' does not carry scope {scope}")]
    ScopeMismatch { id: String, scope: String },

    /// Artifact hash is not of the form `algorithm:value`
    #[error("invalid artifact hash '{0}': expected 'algorithm:value'")]
    InvalidHash(String),

    /// Hash algorithm tag is not in the registry
    #[error("unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// Required field missing at anchor assembly
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Scope codes for beacon identifiers
///
/// A fixed registry, extensible only additively: codes are never removed or
/// renamed once published, since they are embedded in permanent beacon ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    /// AMOS project artifacts
    Amos,
    /// Published papers
    Paper,
    /// Source repositories
    Repo,
    /// Specifications
    Spec,
    /// Datasets
    Dataset,
}

impl Scope {
    /// The uppercase code embedded in beacon ids
    pub fn code(&self) -> &'static str {
        match self {
            Scope::Amos => "AMOS",
            Scope::Paper => "PAPER",
            Scope::Repo => "REPO",
            Scope::Spec => "SPEC",
            Scope::Dataset => "DATASET",
        }
    }

    /// Look up a scope by its code
    pub fn from_code(code: &str) -> Result<Self, AnchorFormatError> {
        match code {
            "AMOS" => Ok(Scope::Amos),
            "PAPER" => Ok(Scope::Paper),
            "REPO" => Ok(Scope::Repo),
            "SPEC" => Ok(Scope::Spec),
            "DATASET" => Ok(Scope::Dataset),
            other => Err(AnchorFormatError::UnknownScope(other.to_string())),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Beacon identifier, format `BG-{SCOPE}-{SEQUENCE}`
///
/// Globally unique, assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeaconId {
    scope: Scope,
    sequence: u32,
}

impl BeaconId {
    /// Assemble a beacon id from its parts
    pub fn new(scope: Scope, sequence: u32) -> Self {
        Self { scope, sequence }
    }

    /// Parse from the canonical `BG-{SCOPE}-{SEQUENCE}` form
    pub fn parse(s: &str) -> Result<Self, AnchorFormatError> {
        let mut parts = s.split('-');
        let prefix = parts.next();
        let scope = parts.next();
        let sequence = parts.next();

        let (Some("BG"), Some(scope), Some(sequence), None) =
            (prefix, scope, sequence, parts.next())
        else {
            return Err(AnchorFormatError::InvalidBeaconId(s.to_string()));
        };

        let scope = Scope::from_code(scope)?;
        let sequence: u32 = sequence
            .parse()
            .map_err(|_| AnchorFormatError::InvalidBeaconId(s.to_string()))?;

        Ok(Self { scope, sequence })
    }

    /// The scope embedded in this id
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The sequence number embedded in this id
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl std::fmt::Display for BeaconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BG-{}-{:04}", self.scope, self.sequence)
    }
}

impl std::str::FromStr for BeaconId {
    type Err = AnchorFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BeaconId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BeaconId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BeaconId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Registered content-hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    #[serde(rename = "sha3-256")]
    Sha3_256,
    Blake3,
}

impl HashAlgorithm {
    /// The lowercase tag prefixed to artifact hashes
    pub fn tag(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha3_256 => "sha3-256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Look up an algorithm by its tag
    pub fn from_tag(tag: &str) -> Result<Self, AnchorFormatError> {
        match tag {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha3-256" => Ok(HashAlgorithm::Sha3_256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(AnchorFormatError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Algorithm-tagged artifact content hash, e.g. `sha256:f7a9e3b2...`
///
/// The value part is treated as opaque: it is whatever the registrar computed
/// over the artifact, and the ledger only ever compares it bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHash {
    algorithm: HashAlgorithm,
    value: String,
}

impl ArtifactHash {
    /// Assemble from parts
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Result<Self, AnchorFormatError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AnchorFormatError::InvalidHash(format!("{}:", algorithm.tag())));
        }
        Ok(Self { algorithm, value })
    }

    /// Parse from the tagged `algorithm:value` form
    pub fn parse(s: &str) -> Result<Self, AnchorFormatError> {
        let Some((tag, value)) = s.split_once(':') else {
            return Err(AnchorFormatError::InvalidHash(s.to_string()));
        };
        let algorithm = HashAlgorithm::from_tag(tag)?;
        Self::new(algorithm, value)
    }

    /// The algorithm tag
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The opaque hash value (without the tag)
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for ArtifactHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm.tag(), self.value)
    }
}

impl std::str::FromStr for ArtifactHash {
    type Err = AnchorFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ArtifactHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ArtifactHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ArtifactHash::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An immutable lineage anchor
///
/// The exact field set below round-trips losslessly on export/import; it is
/// the wire and storage format for anchor registration records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Permanent identifier
    pub beacon_id: BeaconId,

    /// Scope code; always equals `beacon_id.scope()`
    pub scope: Scope,

    /// Name of the cited artifact
    pub artifact_name: String,

    /// Canonical owner of the artifact
    pub canonical_owner: String,

    /// Optional external identifier (e.g. a DOI string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Date the artifact was first seen
    pub first_seen: NaiveDate,

    /// Algorithm-tagged content hash of the artifact
    pub hash: ArtifactHash,

    /// Deprecation flag, the only field allowed to change (false → true)
    #[serde(default)]
    pub deprecated: bool,
}

/// The immutable projection of an anchor hashed into the ledger chain
///
/// `deprecated` is excluded so that deprecation never perturbs the
/// accumulator.
#[derive(Serialize)]
struct CanonicalAnchor<'a> {
    beacon_id: &'a BeaconId,
    scope: &'a Scope,
    artifact_name: &'a str,
    canonical_owner: &'a str,
    external_id: Option<&'a str>,
    first_seen: &'a NaiveDate,
    hash: &'a ArtifactHash,
}

impl Anchor {
    /// Create a builder
    pub fn builder(beacon_id: BeaconId) -> AnchorBuilder {
        AnchorBuilder::new(beacon_id)
    }

    /// Leaf hash over the immutable fields, in canonical JSON form
    pub fn leaf_hash(&self) -> Digest {
        let canonical = CanonicalAnchor {
            beacon_id: &self.beacon_id,
            scope: &self.scope,
            artifact_name: &self.artifact_name,
            canonical_owner: &self.canonical_owner,
            external_id: self.external_id.as_deref(),
            first_seen: &self.first_seen,
            hash: &self.hash,
        };
        // Canonical serialization of plain strings and dates cannot fail
        digest_canonical(&canonical).expect("canonical anchor serialization")
    }
}

/// Builder for [`Anchor`]
#[derive(Debug)]
pub struct AnchorBuilder {
    beacon_id: BeaconId,
    artifact_name: Option<String>,
    canonical_owner: Option<String>,
    external_id: Option<String>,
    first_seen: Option<NaiveDate>,
    hash: Option<ArtifactHash>,
}

impl AnchorBuilder {
    /// Create a new builder; the anchor's scope is taken from the beacon id
    pub fn new(beacon_id: BeaconId) -> Self {
        Self {
            beacon_id,
            artifact_name: None,
            canonical_owner: None,
            external_id: None,
            first_seen: None,
            hash: None,
        }
    }

    /// Set the artifact name
    pub fn artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact_name = Some(name.into());
        self
    }

    /// Set the canonical owner
    pub fn canonical_owner(mut self, owner: impl Into<String>) -> Self {
        self.canonical_owner = Some(owner.into());
        self
    }

    /// Set the external identifier
    pub fn external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Set the first-seen date
    pub fn first_seen(mut self, date: NaiveDate) -> Self {
        self.first_seen = Some(date);
        self
    }

    /// Set the artifact hash
    pub fn hash(mut self, hash: ArtifactHash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Build the anchor
    ///
    /// `first_seen` defaults to today; `artifact_name`, `canonical_owner`,
    /// and `hash` are required.
    pub fn build(self) -> Result<Anchor, AnchorFormatError> {
        let artifact_name = self
            .artifact_name
            .ok_or_else(|| AnchorFormatError::MissingField("artifact_name".into()))?;
        let canonical_owner = self
            .canonical_owner
            .ok_or_else(|| AnchorFormatError::MissingField("canonical_owner".into()))?;
        let hash = self
            .hash
            .ok_or_else(|| AnchorFormatError::MissingField("hash".into()))?;

        Ok(Anchor {
            beacon_id: self.beacon_id,
            scope: self.beacon_id.scope(),
            artifact_name,
            canonical_owner,
            external_id: self.external_id,
            first_seen: self
                .first_seen
                .unwrap_or_else(|| chrono::Utc::now().date_naive()),
            hash,
            deprecated: false,
        })
    }
}
