use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, RewriteError};
use crate::query::fields::FIELD_CONTENT;
use crate::query::scope::{all_parameters, map_leaves, patterns};
use crate::query::{BasicQuery, Node, Parameter, SearchKind};

/// What a compute-powered insight groups its matches by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Lang,
    Repo,
    Path,
    Author,
    Date,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Lang,
        Dimension::Repo,
        Dimension::Path,
        Dimension::Author,
        Dimension::Date,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Dimension::Lang => "lang",
            Dimension::Repo => "repo",
            Dimension::Path => "path",
            Dimension::Author => "author",
            Dimension::Date => "date",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown dimension: {s} (expected lang, repo, path, author or date)")
            })
    }
}

/// Rewrite the query's pattern into an `output.extra` directive grouping
/// matches by `dimension`.
///
/// The pattern is the value of an explicit `content:` parameter when there
/// is one, otherwise the single pattern of the query. Everything else keeps
/// its place.
pub fn compute_insight_command_query(
    query: &BasicQuery,
    dimension: Dimension,
) -> Result<BasicQuery> {
    let nodes = query.parse(SearchKind::Standard)?;
    let target = locate_pattern(&nodes)?;

    let mut annotate = |node: Node| -> Result<Node> {
        let annotated = match node {
            Node::Parameter(p) if target == Target::Content && is_annotatable_content(&p) => {
                content_directive(&p.value, dimension)
            }
            Node::Pattern(p) if target == Target::Pattern && !p.negated => {
                content_directive(&p.value, dimension)
            }
            other => other,
        };
        Ok(annotated)
    };
    let rewritten = BasicQuery::from_nodes(&map_leaves(nodes, &mut annotate)?);

    debug!(%dimension, output = %rewritten, "built insight compute query");
    Ok(rewritten)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Content,
    Pattern,
}

/// Decide which leaf carries the pattern, refusing when it is not unique
fn locate_pattern(nodes: &[Node]) -> Result<Target> {
    let contents = all_parameters(nodes)
        .into_iter()
        .filter(|p| is_annotatable_content(p))
        .count();
    match contents {
        1 => return Ok(Target::Content),
        0 => {}
        count => return Err(RewriteError::AmbiguousPattern { count }),
    }

    match patterns(nodes).into_iter().filter(|p| !p.negated).count() {
        0 => Err(RewriteError::MissingPattern),
        1 => Ok(Target::Pattern),
        count => Err(RewriteError::AmbiguousPattern { count }),
    }
}

fn is_annotatable_content(parameter: &Parameter) -> bool {
    parameter.is_content() && !parameter.negated
}

fn content_directive(pattern: &str, dimension: Dimension) -> Node {
    Node::Parameter(Parameter::new(
        FIELD_CONTENT,
        format!("output.extra({pattern} -> ${})", dimension.tag()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotate(input: &str, dimension: Dimension) -> Result<String> {
        compute_insight_command_query(&BasicQuery::from(input), dimension)
            .map(BasicQuery::into_string)
    }

    #[test]
    fn test_every_dimension() {
        for dimension in Dimension::ALL {
            assert_eq!(
                annotate("repo:abc123@12346f fork:yes archived:yes findme", dimension).unwrap(),
                format!(
                    "repo:abc123@12346f fork:yes archived:yes content:output.extra(findme -> ${})",
                    dimension.tag()
                )
            );
        }
    }

    #[test]
    fn test_explicit_content_is_the_pattern() {
        assert_eq!(
            annotate("content:findme lang:go", Dimension::Repo).unwrap(),
            "lang:go content:output.extra(findme -> $repo)"
        );
    }

    #[test]
    fn test_content_wins_over_bare_patterns() {
        assert_eq!(
            annotate("content:findme /other/ lang:go", Dimension::Path).unwrap(),
            "lang:go content:output.extra(findme -> $path) /other/"
        );
    }

    #[test]
    fn test_multi_word_pattern() {
        assert_eq!(
            annotate("fork:no package search", Dimension::Author).unwrap(),
            "fork:no content:output.extra(package search -> $author)"
        );
    }

    #[test]
    fn test_pattern_inside_group() {
        assert_eq!(
            annotate("(repo:a OR repo:b) findme", Dimension::Lang).unwrap(),
            "(repo:a OR repo:b) content:output.extra(findme -> $lang)"
        );
    }

    #[test]
    fn test_ambiguous_patterns() {
        assert_eq!(
            annotate("foo /bar/", Dimension::Lang),
            Err(RewriteError::AmbiguousPattern { count: 2 })
        );
        assert_eq!(
            annotate("content:a content:b", Dimension::Lang),
            Err(RewriteError::AmbiguousPattern { count: 2 })
        );
    }

    #[test]
    fn test_missing_pattern() {
        assert_eq!(
            annotate("repo:x fork:yes", Dimension::Lang),
            Err(RewriteError::MissingPattern)
        );
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            annotate("(findme", Dimension::Lang),
            Err(RewriteError::MalformedQuery { .. })
        ));
    }

    #[test]
    fn test_dimension_from_str() {
        assert_eq!("LANG".parse::<Dimension>(), Ok(Dimension::Lang));
        assert_eq!("date".parse::<Dimension>(), Ok(Dimension::Date));
        assert!("size".parse::<Dimension>().is_err());
    }
}
