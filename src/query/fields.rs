//! Field vocabulary of the query language.
//!
//! Only tokens whose field is listed here parse as parameters; anything else
//! that happens to contain a colon is pattern text.

pub const FIELD_REPO: &str = "repo";
pub const FIELD_FORK: &str = "fork";
pub const FIELD_ARCHIVED: &str = "archived";
pub const FIELD_PATTERN_TYPE: &str = "patterntype";
pub const FIELD_COUNT: &str = "count";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_LANG: &str = "lang";
pub const FIELD_FILE: &str = "file";
pub const FIELD_CASE: &str = "case";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_TIMEOUT: &str = "timeout";
pub const FIELD_VISIBILITY: &str = "visibility";
pub const FIELD_REV: &str = "rev";
pub const FIELD_CONTEXT: &str = "context";
pub const FIELD_SELECT: &str = "select";
pub const FIELD_AUTHOR: &str = "author";
pub const FIELD_COMMITTER: &str = "committer";
pub const FIELD_BEFORE: &str = "before";
pub const FIELD_AFTER: &str = "after";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_REPO_HAS_FILE: &str = "repohasfile";
pub const FIELD_INDEX: &str = "index";

/// Boolean-ish values accepted by `fork:` and `archived:`
pub const YES: &str = "yes";
pub const NO: &str = "no";
pub const ONLY: &str = "only";

const KNOWN_FIELDS: &[&str] = &[
    FIELD_REPO,
    FIELD_FORK,
    FIELD_ARCHIVED,
    FIELD_PATTERN_TYPE,
    FIELD_COUNT,
    FIELD_CONTENT,
    FIELD_LANG,
    FIELD_FILE,
    FIELD_CASE,
    FIELD_TYPE,
    FIELD_TIMEOUT,
    FIELD_VISIBILITY,
    FIELD_REV,
    FIELD_CONTEXT,
    FIELD_SELECT,
    FIELD_AUTHOR,
    FIELD_COMMITTER,
    FIELD_BEFORE,
    FIELD_AFTER,
    FIELD_MESSAGE,
    FIELD_REPO_HAS_FILE,
    FIELD_INDEX,
];

/// Resolve an alias to its canonical field name.
///
/// Expects a lowercased field; unknown fields are returned unchanged.
pub fn canonical(field: &str) -> &str {
    match field {
        "r" => FIELD_REPO,
        "f" => FIELD_FILE,
        "l" | "language" => FIELD_LANG,
        "revision" => FIELD_REV,
        "msg" | "m" => FIELD_MESSAGE,
        "since" => FIELD_AFTER,
        "until" => FIELD_BEFORE,
        other => other,
    }
}

/// Check whether a (lowercased) field name or alias is part of the language
pub fn is_known(field: &str) -> bool {
    KNOWN_FIELDS.contains(&canonical(field))
}
