use regex::Regex;
use tracing::debug;

use crate::error::{Result, RewriteError};
use crate::query::fields::{FIELD_COUNT, FIELD_REPO};
use crate::query::{BasicQuery, Parameter};
use crate::rewrite::defaults::with_defaults;

/// Result count that lifts the limit for archived series
pub const COUNT_UNLIMITED: &str = "99999999";

/// Characters escaped when a repository name is embedded in a regexp
const REGEX_META: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

/// Restrict a query to an explicit list of repositories.
///
/// The query is normalized with `defaults` plus an unlimited `count:`, then
/// `repo:^(name1|name2|...)$` is appended as the final token.
pub fn multi_repo_query<S: AsRef<str>>(
    query: &BasicQuery,
    repos: &[S],
    defaults: &[Parameter],
) -> Result<BasicQuery> {
    let alternation = repo_alternation(repos)?;

    let mut defaults = defaults.to_vec();
    defaults.push(Parameter::new(FIELD_COUNT, COUNT_UNLIMITED));
    let normalized = with_defaults(query, &defaults)?;

    let rewritten = append_token(normalized, &format!("{FIELD_REPO}:{alternation}"));
    debug!(repos = repos.len(), output = %rewritten, "built multi-repo query");
    Ok(rewritten)
}

/// Restrict a query to one repository, optionally at a revision.
///
/// Produces `repo:^name$` (or `repo:^name$@revision`), the shape the
/// single-repo analyzer recognizes.
pub fn single_repo_query(
    query: &BasicQuery,
    repo: &str,
    revision: Option<&str>,
    defaults: &[Parameter],
) -> Result<BasicQuery> {
    let escaped = escape_repo_name(repo)?;
    let mut filter = format!("{FIELD_REPO}:^{escaped}$");
    if let Some(revision) = revision.filter(|r| !r.is_empty()) {
        if revision.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(RewriteError::invalid_repo(
                repo,
                format!("invalid revision {revision:?}"),
            ));
        }
        filter.push('@');
        filter.push_str(revision);
    }

    let normalized = with_defaults(query, defaults)?;
    Ok(append_token(normalized, &filter))
}

/// Escape the regexp metacharacters of a literal repository name
pub fn escape_repo_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(RewriteError::invalid_repo(name, "empty name"));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(RewriteError::invalid_repo(name, "contains a control character"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(RewriteError::invalid_repo(name, "contains whitespace"));
    }

    let mut escaped = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if REGEX_META.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    Ok(escaped)
}

/// `^(a|b|...)$` over the escaped names, in input order.
///
/// The alternation is compiled and checked against every name so that an
/// escaping mistake surfaces here instead of silently matching the wrong
/// repositories.
fn repo_alternation<S: AsRef<str>>(repos: &[S]) -> Result<String> {
    if repos.is_empty() {
        return Err(RewriteError::invalid_repo("", "no repositories given"));
    }

    let escaped = repos
        .iter()
        .map(|r| escape_repo_name(r.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let alternation = format!("^({})$", escaped.join("|"));

    let compiled = Regex::new(&alternation)
        .map_err(|e| RewriteError::invalid_repo(repos[0].as_ref(), e.to_string()))?;
    if let Some(unmatched) = repos.iter().find(|r| !compiled.is_match(r.as_ref())) {
        return Err(RewriteError::invalid_repo(
            unmatched.as_ref(),
            "escaped name does not match itself",
        ));
    }

    Ok(alternation)
}

fn append_token(query: BasicQuery, token: &str) -> BasicQuery {
    if query.as_str().is_empty() {
        return BasicQuery::new(token);
    }
    BasicQuery::new(format!("{query} {token}"))
}
