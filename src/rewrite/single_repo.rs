use tracing::debug;

use crate::error::{Result, RewriteError};
use crate::query::fields::FIELD_REPO;
use crate::query::scope::{and_scope_parameters, step_count};
use crate::query::{BasicQuery, SearchKind};

/// Decide whether the query is provably scoped to exactly one repository.
///
/// Queries that expand into several independent steps are refused with
/// `QueryNotSupported`, even when every step names the same repository.
pub fn is_single_repo_query(query: &BasicQuery) -> Result<bool> {
    let nodes = query.parse(SearchKind::Standard)?;

    let steps = step_count(&nodes);
    if steps > 1 {
        debug!(steps, query = %query, "refusing multi-step query");
        return Err(RewriteError::QueryNotSupported);
    }

    let repos: Vec<_> = and_scope_parameters(&nodes)
        .into_iter()
        .filter(|p| p.is_field(FIELD_REPO))
        .collect();

    Ok(match repos.as_slice() {
        [repo] => !repo.negated && is_literal_repo_filter(&repo.value),
        _ => false,
    })
}

/// `^<escaped literal>$`, optionally followed by `@<revision>`.
///
/// Alternations, groups and predicates such as `contains.file(...)` are
/// rejected because they can match more than one repository.
pub fn is_literal_repo_filter(value: &str) -> bool {
    let pattern = match value.find("$@") {
        Some(end) => &value[..=end],
        None => value,
    };

    let Some(inner) = pattern
        .strip_prefix('^')
        .and_then(|rest| rest.strip_suffix('$'))
    else {
        return false;
    };
    if inner.is_empty() {
        return false;
    }

    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped) if escaped.is_ascii_punctuation() => {}
                _ => return false,
            },
            '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' => {
                return false;
            }
            ch if ch.is_whitespace() || ch.is_control() => return false,
            _ => {}
        }
    }
    true
}
