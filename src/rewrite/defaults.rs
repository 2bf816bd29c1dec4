use tracing::debug;

use crate::error::Result;
use crate::query::fields::{self, FIELD_ARCHIVED, FIELD_FORK, FIELD_PATTERN_TYPE};
use crate::query::scope::and_scope_parameters;
use crate::query::{BasicQuery, Node, Parameter, SearchKind};

/// Merge `defaults` into the query's top-level scope without overriding any
/// parameter the query already sets.
///
/// The result is rendered in canonical order: inserted defaults (in the
/// order given), then the original parameters in their original order, then
/// `patterntype:`, then the patterns.
pub fn with_defaults(query: &BasicQuery, defaults: &[Parameter]) -> Result<BasicQuery> {
    let nodes = query.parse(SearchKind::Standard)?;
    let ordered = merge_defaults(nodes, defaults);
    let rewritten = BasicQuery::from_nodes(&ordered);
    debug!(input = %query, output = %rewritten, "applied query defaults");
    Ok(rewritten)
}

/// Query for an insight that runs over every repository
pub fn global_query(query: &BasicQuery, defaults: &[Parameter]) -> Result<BasicQuery> {
    with_defaults(query, defaults)
}

/// Defaults every insight query gets: forks and archived repositories are
/// excluded when the insight covers all repositories, and included when the
/// user picked the repositories explicitly.
pub fn code_insights_query_defaults(all_repos: bool) -> Vec<Parameter> {
    let flag = if all_repos { fields::NO } else { fields::YES };
    vec![
        Parameter::new(FIELD_FORK, flag),
        Parameter::new(FIELD_ARCHIVED, flag),
        Parameter::new(FIELD_PATTERN_TYPE, "literal"),
    ]
}

fn merge_defaults(nodes: Vec<Node>, defaults: &[Parameter]) -> Vec<Node> {
    let present = and_scope_parameters(&nodes);
    let mut inserted: Vec<&Parameter> = Vec::with_capacity(defaults.len());
    for default in defaults {
        let set = present.iter().chain(inserted.iter()).any(|p| p.is_field(&default.field));
        if !set {
            inserted.push(default);
        }
    }
    let inserted: Vec<Node> = inserted.into_iter().cloned().map(Node::Parameter).collect();

    canonical_order(inserted, nodes)
}

/// Lay out the top-level scope. Done as explicit passes rather than a sort:
/// `patterntype:` is a parameter but belongs right before the patterns.
fn canonical_order(inserted: Vec<Node>, original: Vec<Node>) -> Vec<Node> {
    let mut parameters = inserted;
    let mut pattern_types = Vec::new();
    let mut terms = Vec::new();

    for node in original {
        if matches!(&node, Node::Parameter(p) if p.is_field(FIELD_PATTERN_TYPE)) {
            pattern_types.push(node);
        } else if node.is_plain_parameter() {
            parameters.push(node);
        } else {
            terms.push(node);
        }
    }

    parameters.extend(pattern_types);
    parameters.extend(terms);
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RewriteError;
    use crate::query::fields::FIELD_COUNT;

    fn defaults_of(pairs: &[(&str, &str)]) -> Vec<Parameter> {
        pairs.iter().map(|(f, v)| Parameter::new(f, *v)).collect()
    }

    fn apply(input: &str, defaults: &[Parameter]) -> String {
        with_defaults(&BasicQuery::from(input), defaults)
            .unwrap()
            .into_string()
    }

    #[test]
    fn test_no_defaults() {
        assert_eq!(apply("repo:myrepo testquery", &[]), "repo:myrepo testquery");
    }

    #[test]
    fn test_no_defaults_with_fork_archived() {
        assert_eq!(
            apply("repo:myrepo testquery fork:no archived:no", &[]),
            "repo:myrepo fork:no archived:no testquery"
        );
    }

    #[test]
    fn test_default_archived() {
        assert_eq!(
            apply("repo:myrepo testquery fork:no", &defaults_of(&[("archived", "yes")])),
            "archived:yes repo:myrepo fork:no testquery"
        );
    }

    #[test]
    fn test_default_fork_and_archived() {
        assert_eq!(
            apply(
                "repo:myrepo testquery",
                &defaults_of(&[("archived", "no"), ("fork", "no")])
            ),
            "archived:no fork:no repo:myrepo testquery"
        );
    }

    #[test]
    fn test_default_does_not_override() {
        assert_eq!(
            apply("repo:myrepo fork:yes testquery", &defaults_of(&[("fork", "no")])),
            "repo:myrepo fork:yes testquery"
        );
    }

    #[test]
    fn test_default_patterntype_sits_before_pattern() {
        assert_eq!(
            apply("repo:myrepo testquery", &defaults_of(&[("patterntype", "literal")])),
            "repo:myrepo patterntype:literal testquery"
        );
    }

    #[test]
    fn test_explicit_patterntype_is_kept() {
        assert_eq!(
            apply(
                "patterntype:standard repo:myrepo testquery",
                &defaults_of(&[("patterntype", "literal")])
            ),
            "repo:myrepo patterntype:standard testquery"
        );
    }

    #[test]
    fn test_duplicate_defaults_insert_once() {
        assert_eq!(
            apply("foo", &defaults_of(&[("count", "10"), ("count", "20")])),
            "count:10 foo"
        );
    }

    #[test]
    fn test_negated_parameter_counts_as_present() {
        assert_eq!(
            apply("-fork:yes foo", &defaults_of(&[("fork", "no")])),
            "-fork:yes foo"
        );
    }

    #[test]
    fn test_parameters_inside_and_group_count_as_present() {
        assert_eq!(
            apply("(fork:yes foo) and bar", &defaults_of(&[("fork", "no")])),
            "fork:yes foo AND bar"
        );
    }

    #[test]
    fn test_or_query_gets_defaults_in_front() {
        assert_eq!(
            apply("(repo:a foo) or (repo:b bar)", &defaults_of(&[("fork", "no")])),
            "fork:no (repo:a foo OR repo:b bar)"
        );
    }

    #[test]
    fn test_idempotent() {
        let defaults = defaults_of(&[("archived", "no"), ("fork", "no"), (FIELD_COUNT, "5")]);
        for input in [
            "repo:myrepo testquery",
            "testquery patterntype:regexp repo:x",
            "(repo:a foo) or (repo:b bar)",
            "",
        ] {
            let once = apply(input, &defaults);
            let twice = apply(&once, &defaults);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_lone_keyword_is_malformed() {
        for input in ["a (or) b", "a (not)", "x (and) y"] {
            assert!(matches!(
                with_defaults(&BasicQuery::from(input), &[]),
                Err(RewriteError::MalformedQuery { .. })
            ));
        }
    }

    #[test]
    fn test_negated_keyword_stays_idempotent() {
        let defaults = defaults_of(&[("fork", "no")]);
        let once = apply("NOT or foo", &defaults);
        assert_eq!(once, "fork:no -content:or foo");
        assert_eq!(apply(&once, &defaults), once);
    }

    #[test]
    fn test_malformed_input() {
        let err = with_defaults(&BasicQuery::from("(foo"), &[]).unwrap_err();
        assert!(matches!(err, RewriteError::MalformedQuery { .. }));
    }

    #[test]
    fn test_code_insights_query_defaults() {
        assert_eq!(
            code_insights_query_defaults(true),
            defaults_of(&[("fork", "no"), ("archived", "no"), ("patterntype", "literal")])
        );
        assert_eq!(
            code_insights_query_defaults(false),
            defaults_of(&[("fork", "yes"), ("archived", "yes"), ("patterntype", "literal")])
        );
    }
}
