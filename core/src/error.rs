use thiserror::Error;

/// Failure to construct an auditor from configuration.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("extra rule `{id}` has an invalid pattern: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("extra rule `{id}` targets unknown style `{style}`")]
    UnknownRuleStyle { id: String, style: String },
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Failure inside a single rule's evaluation.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("input of {len} characters exceeds the rule limit of {limit}")]
    InputTooLarge { len: usize, limit: usize },
    #[error("rule `{rule}` failed: {reason}")]
    Failed { rule: String, reason: String },
}

/// Failure talking to the verification collaborator.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification transport failed: {0}")]
    Transport(String),
    #[error("verification response was malformed: {0}")]
    Malformed(String),
    #[error("verification was cancelled")]
    Cancelled,
}

/// Failure talking to the reference library collaborator.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("reference library rejected `{title}`: {reason}")]
    Rejected { title: String, reason: String },
    #[error("reference library unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("replacement {start}..{end} does not address a text range in the document")]
    InvalidRange { start: usize, end: usize },
    #[error("replacements {first} and {second} overlap")]
    Overlap { first: usize, second: usize },
}
