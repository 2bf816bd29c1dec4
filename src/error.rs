use thiserror::Error;

use crate::query::PatternKind;

/// Result type for query rewriting operations
pub type Result<T> = std::result::Result<T, RewriteError>;

/// Errors surfaced by the rewriting engine.
///
/// Every rewrite is all-or-nothing: when one of these is returned, no
/// partially rewritten query escapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The input text could not be parsed into a query tree
    #[error("malformed query at offset {offset}: {message}")]
    MalformedQuery { offset: usize, message: String },

    /// The query expands into more than one basic query, so no single
    /// repository can be attributed to it
    #[error("query not supported: it expands into multiple independent steps")]
    QueryNotSupported,

    /// More than one pattern could be the target of the rewrite
    #[error("ambiguous pattern: found {count} candidate patterns")]
    AmbiguousPattern { count: usize },

    /// The query has no pattern to rewrite
    #[error("query has no pattern to rewrite")]
    MissingPattern,

    /// A pattern cannot be replaced by nothing
    #[error("replacement value is empty")]
    EmptyReplacement,

    /// The rewrite cannot be applied to this kind of pattern
    #[error("unsupported pattern kind: {0}")]
    UnsupportedPatternKind(PatternKind),

    /// A repository name (or revision) cannot be embedded as a literal
    #[error("invalid repository name {name:?}: {reason}")]
    InvalidRepoName { name: String, reason: String },
}

impl RewriteError {
    /// Creates a malformed query error
    pub fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedQuery {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid repository name error
    pub fn invalid_repo(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRepoName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for the analyzer's conservative refusal, as opposed to a parse failure
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::QueryNotSupported)
    }
}
