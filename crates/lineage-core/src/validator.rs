//! Governance validation
//!
//! Pure, side-effect-free checks applied to every candidate token and
//! transition before any store is touched. Deterministic given the same
//! store snapshot: the caller passes in the ancestry it resolved, and the
//! validator never reads state itself.
//!
//! A rejection is final. The engine suppresses the operation's output
//! entirely; a rejected request is never corrected or rewritten into a valid
//! form.

use crate::error::ValidationError;
use crate::token::{Source, Token};
use regex::Regex;

/// Default amplification limit: maximum ancestry depth of a token
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// Authorization credential accompanying a mutation request
///
/// A mutation (anything other than a first-time creation) must carry a
/// credential whose subject matches the token's `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Who is asserting authority
    pub subject: Source,
    /// Shared secret, required for system-sourced mutations when configured
    pub secret: Option<String>,
}

impl Credential {
    /// A user credential
    pub fn user() -> Self {
        Self {
            subject: Source::User,
            secret: None,
        }
    }

    /// A system credential carrying the shared secret
    pub fn system(secret: impl Into<String>) -> Self {
        Self {
            subject: Source::System,
            secret: Some(secret.into()),
        }
    }
}

/// Compiled forbidden-pattern filter over token explanations
///
/// Flags first-person identity assertions and personality claims. All
/// patterns are compiled once at construction.
#[derive(Debug)]
pub struct IdentityClaimFilter {
    patterns: Vec<Regex>,
}

impl IdentityClaimFilter {
    /// Compile the built-in pattern set
    pub fn new() -> Self {
        let sources = [
            r"(?i)\bi\s+am\b",
            r"(?i)\bi['’]m\b",
            r"(?i)\bmy\s+name\s+is\b",
            r"(?i)\bidentity\b",
            r"(?i)\bmy\s+personality\b",
            r"(?i)\b(conscious|sentient)\b",
        ];
        Self {
            patterns: sources
                .iter()
                .map(|p| Regex::new(p).expect("built-in identity pattern"))
                .collect(),
        }
    }

    /// Scan a text; returns the first matching fragment
    pub fn scan(&self, text: &str) -> Option<String> {
        for pattern in &self.patterns {
            if let Some(m) = pattern.find(text) {
                return Some(m.as_str().to_string());
            }
        }
        None
    }
}

impl Default for IdentityClaimFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Governance validator
///
/// Contract: `validate(candidate) -> Ok | Err(reason)`. All checks must
/// pass; the first failure is returned.
#[derive(Debug)]
pub struct Validator {
    max_depth: u32,
    filter: IdentityClaimFilter,
    system_secret: Option<String>,
}

impl Validator {
    /// Create a validator with the default amplification limit
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            filter: IdentityClaimFilter::new(),
            system_secret: None,
        }
    }

    /// Override the amplification limit
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Configure the shared secret gating system-sourced mutations
    pub fn with_system_secret(mut self, secret: impl Into<String>) -> Self {
        self.system_secret = Some(secret.into());
        self
    }

    /// The configured amplification limit
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Validate a candidate token snapshot
    ///
    /// Checks TTL presence, the amplification limit on the candidate's own
    /// depth, and the identity-claim filter over the explanation.
    pub fn validate_token(&self, candidate: &Token) -> Result<(), ValidationError> {
        if candidate.ttl_seconds <= 0 {
            return Err(ValidationError::MissingTtl);
        }

        if candidate.depth > self.max_depth {
            return Err(ValidationError::RecursiveReference(format!(
                "ancestry depth {} exceeds amplification limit {}",
                candidate.depth, self.max_depth
            )));
        }

        if let Some(fragment) = self.filter.scan(&candidate.explanation) {
            return Err(ValidationError::IdentityClaim(fragment));
        }

        Ok(())
    }

    /// Validate a resolved ancestry chain
    ///
    /// `ancestry` is the sequence of ancestor ids the caller resolved from
    /// its store snapshot, nearest parent first. The chain may not contain
    /// the candidate itself (no self-reference, direct or transitive) and
    /// may not exceed the amplification limit.
    pub fn validate_ancestry(
        &self,
        candidate_id: &str,
        ancestry: &[String],
    ) -> Result<(), ValidationError> {
        if ancestry.iter().any(|ancestor| ancestor == candidate_id) {
            return Err(ValidationError::RecursiveReference(format!(
                "token '{candidate_id}' references itself through its ancestry",
            )));
        }

        if ancestry.len() as u32 > self.max_depth {
            return Err(ValidationError::RecursiveReference(format!(
                "ancestry chain of {} exceeds amplification limit {}",
                ancestry.len(),
                self.max_depth
            )));
        }

        Ok(())
    }

    /// Authorize a mutation of a token with the given source
    ///
    /// First-time creations are not mutations and skip this check.
    pub fn authorize(
        &self,
        source: Source,
        credential: Option<&Credential>,
    ) -> Result<(), ValidationError> {
        let Some(credential) = credential else {
            return Err(ValidationError::Unauthorized(
                "mutation carries no credential".into(),
            ));
        };

        if credential.subject != source {
            return Err(ValidationError::Unauthorized(format!(
                "credential subject '{}' does not match token source '{}'",
                credential.subject, source
            )));
        }

        if source == Source::System {
            if let Some(expected) = &self.system_secret {
                if credential.secret.as_deref() != Some(expected.as_str()) {
                    return Err(ValidationError::Unauthorized(
                        "invalid system credential".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenClass;

    fn token_with_explanation(explanation: &str) -> Token {
        Token::builder("T-0001", TokenClass::Anchor)
            .explanation(explanation)
            .build()
            .unwrap()
    }

    #[test]
    fn test_accepts_plain_state_description() {
        let validator = Validator::new();
        let token = token_with_explanation("Starting focused work on the parser");
        assert!(validator.validate_token(&token).is_ok());
    }

    #[test]
    fn test_rejects_identity_claim() {
        let validator = Validator::new();

        let token = token_with_explanation("I am conscious");
        assert!(matches!(
            validator.validate_token(&token),
            Err(ValidationError::IdentityClaim(_))
        ));

        let token = token_with_explanation("this marks my personality shift");
        assert!(matches!(
            validator.validate_token(&token),
            Err(ValidationError::IdentityClaim(_))
        ));
    }

    #[test]
    fn test_rejects_missing_ttl() {
        let validator = Validator::new();
        let mut token = token_with_explanation("fine otherwise");
        token.ttl_seconds = 0;
        assert_eq!(
            validator.validate_token(&token),
            Err(ValidationError::MissingTtl)
        );
    }

    #[test]
    fn test_rejects_excessive_depth() {
        let validator = Validator::new().with_max_depth(3);
        let mut token = token_with_explanation("deep");
        token.depth = 4;
        assert!(matches!(
            validator.validate_token(&token),
            Err(ValidationError::RecursiveReference(_))
        ));
    }

    #[test]
    fn test_rejects_self_reference_in_ancestry() {
        let validator = Validator::new();
        let ancestry = vec!["T-0002".to_string(), "T-0001".to_string()];
        assert!(matches!(
            validator.validate_ancestry("T-0001", &ancestry),
            Err(ValidationError::RecursiveReference(_))
        ));
        assert!(validator.validate_ancestry("T-0003", &ancestry).is_ok());
    }

    #[test]
    fn test_rejects_ancestry_beyond_limit() {
        let validator = Validator::new().with_max_depth(2);
        let ancestry: Vec<String> = (0..3).map(|i| format!("T-{i:04}")).collect();
        assert!(matches!(
            validator.validate_ancestry("T-9999", &ancestry),
            Err(ValidationError::RecursiveReference(_))
        ));
    }

    #[test]
    fn test_authorize_requires_credential() {
        let validator = Validator::new();
        assert!(matches!(
            validator.authorize(Source::User, None),
            Err(ValidationError::Unauthorized(_))
        ));
        assert!(validator
            .authorize(Source::User, Some(&Credential::user()))
            .is_ok());
    }

    #[test]
    fn test_authorize_requires_matching_subject() {
        let validator = Validator::new();
        assert!(matches!(
            validator.authorize(Source::System, Some(&Credential::user())),
            Err(ValidationError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_authorize_checks_system_secret() {
        let validator = Validator::new().with_system_secret("hunter2");

        assert!(validator
            .authorize(Source::System, Some(&Credential::system("hunter2")))
            .is_ok());
        assert!(matches!(
            validator.authorize(Source::System, Some(&Credential::system("wrong"))),
            Err(ValidationError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = IdentityClaimFilter::new();
        assert!(filter.scan("I AM the system").is_some());
        assert!(filter.scan("i'm different now").is_some());
        assert!(filter.scan("My Name Is Nobody").is_some());
        assert!(filter.scan("reviewing the quarterly report").is_none());
    }
}
