//! Pattern replacement over compound queries.
//!
//! Parameters of AND-combined nodes are hoisted into one shared prefix.
//! Every OR branch keeps its own parameters.

use std::fmt::Write;
use std::ops::Range;
use tracing::debug;

use crate::error::{Result, RewriteError};
use crate::query::printer::{print_parameter, print_pattern, scope_parameters};
use crate::query::scope::{effective_search_kind, map_leaves, patterns};
use crate::query::{BasicQuery, Node, Operator, OperatorKind, PatternKind, SearchKind};

/// Replaces every pattern of a query with a new value
#[derive(Debug, Clone)]
pub struct PatternReplacer {
    nodes: Vec<Node>,
    /// Kind the values of `content:` parameters are read with
    content_kind: PatternKind,
}

impl PatternReplacer {
    pub fn new(query: &BasicQuery, kind: SearchKind) -> Result<Self> {
        let nodes = query.parse(kind)?;

        if kind == SearchKind::Regexp
            && patterns(&nodes).iter().any(|p| p.kind == PatternKind::Structural)
        {
            return Err(RewriteError::UnsupportedPatternKind(PatternKind::Structural));
        }

        let content_kind = effective_search_kind(&nodes, kind).pattern_kind();
        if kind == SearchKind::Regexp && content_kind == PatternKind::Structural {
            return Err(RewriteError::UnsupportedPatternKind(PatternKind::Structural));
        }

        Ok(Self {
            nodes,
            content_kind,
        })
    }

    /// Render the query with every pattern replaced by `value`.
    ///
    /// Literal and structural patterns take `value` verbatim. A regexp
    /// pattern with a capturing group keeps everything around the first
    /// group and replaces the group by a non-capturing group matching
    /// `value` literally; without a group the whole regexp becomes `value`,
    /// escaped. A value that would not read back as a bare pattern is
    /// written as a quoted `content:` parameter.
    pub fn replace(&self, value: &str) -> Result<BasicQuery> {
        if value.is_empty() {
            return Err(RewriteError::EmptyReplacement);
        }

        let mut substitute = |node: Node| -> Result<Node> {
            Ok(match node {
                Node::Pattern(mut p) => {
                    p.value = substitute_value(&p.value, p.kind, value);
                    Node::Pattern(p)
                }
                Node::Parameter(mut p) if p.is_content() => {
                    p.value = substitute_value(&p.value, self.content_kind, value);
                    Node::Parameter(p)
                }
                other => other,
            })
        };
        let replaced = map_leaves(self.nodes.clone(), &mut substitute)?;

        let rendered = BasicQuery::new(render_root(&replaced));
        debug!(output = %rendered, "replaced query patterns");
        Ok(rendered)
    }
}

fn substitute_value(original: &str, kind: PatternKind, replacement: &str) -> String {
    match kind {
        PatternKind::Literal | PatternKind::Structural => replacement.to_string(),
        PatternKind::Regexp => {
            let escaped = escape_regexp(replacement);
            match first_capture_group(original) {
                Some(group) => format!(
                    "{}(?:{}){}",
                    &original[..group.start],
                    escaped,
                    &original[group.end..]
                ),
                None => escaped,
            }
        }
    }
}

/// `regex::escape`, with whitespace spelled as hex escapes so the regexp
/// stays one token
fn escape_regexp(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in regex::escape(value).chars() {
        if ch.is_whitespace() {
            let _ = write!(escaped, "\\x{{{:X}}}", u32::from(ch));
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

/// Byte range of the first capturing group, parentheses included
fn first_capture_group(pattern: &str) -> Option<Range<usize>> {
    // Open groups, with whether each one captures
    let mut open: Vec<(usize, bool)> = Vec::new();
    let mut first: Option<usize> = None;
    let mut in_class = false;

    let mut chars = pattern.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '[' if !in_class => {
                in_class = true;
                // A ']' right after '[' or '[^' is literal
                if matches!(chars.peek(), Some((_, '^'))) {
                    chars.next();
                }
                if matches!(chars.peek(), Some((_, ']'))) {
                    chars.next();
                }
            }
            ']' if in_class => in_class = false,
            '(' if !in_class => {
                let rest = &pattern[i + 1..];
                let capturing = !rest.starts_with('?')
                    || rest.starts_with("?P<")
                    || (rest.starts_with("?<")
                        && !rest.starts_with("?<=")
                        && !rest.starts_with("?<!"));
                if capturing && first.is_none() {
                    first = Some(open.len());
                }
                open.push((i, capturing));
            }
            ')' if !in_class => {
                let depth = open.len().checked_sub(1)?;
                let (start, _) = open.pop()?;
                if first == Some(depth) {
                    return Some(start..i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// The document root is an implicit AND whose terms need no parentheses
fn render_root(nodes: &[Node]) -> String {
    let mut parts = hoisted_parameters(nodes);
    let terms = and_terms(nodes);
    if !terms.is_empty() {
        parts.push(terms.join(" AND "));
    }
    parts.join(" ")
}

/// Parameters of this AND scope and of every AND-combined descendant, in
/// their original relative order
fn hoisted_parameters(nodes: &[Node]) -> Vec<String> {
    let mut parts = scope_parameters(nodes);
    for node in nodes {
        if let Node::Operator(Operator {
            kind: OperatorKind::And,
            operands,
        }) = node
        {
            parts.extend(hoisted_parameters(operands));
        }
    }
    parts
}

/// Non-parameter children of an AND scope, rendered. Nested ANDs have
/// already given up their parameters to the hoisted prefix.
fn and_terms(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .filter(|n| !n.is_plain_parameter())
        .flat_map(|node| match node {
            Node::Parameter(p) => vec![print_parameter(p)],
            Node::Pattern(p) => vec![print_pattern(p)],
            Node::Operator(Operator {
                kind: OperatorKind::And,
                operands,
            }) => {
                let inner = and_terms(operands);
                if inner.len() > 1 {
                    vec![format!("({})", inner.join(" AND "))]
                } else {
                    inner
                }
            }
            Node::Operator(Operator {
                kind: OperatorKind::Or,
                operands,
            }) => vec![render_or(operands)],
        })
        .collect()
}

/// An AND below an OR branch keeps its parameters local to the branch
fn render_and(operands: &[Node]) -> String {
    let mut parts = hoisted_parameters(operands);
    let terms = and_terms(operands);
    match terms.len() {
        0 => {}
        1 => parts.extend(terms),
        _ => parts.push(format!("({})", terms.join(" AND "))),
    }
    parts.join(" ")
}

fn render_or(operands: &[Node]) -> String {
    let branches: Vec<String> = operands
        .iter()
        .map(|node| match node {
            Node::Parameter(p) => print_parameter(p),
            Node::Pattern(p) => print_pattern(p),
            Node::Operator(Operator {
                kind: OperatorKind::And,
                operands,
            }) => render_and(operands),
            Node::Operator(Operator {
                kind: OperatorKind::Or,
                operands,
            }) => render_or(operands),
        })
        .collect();
    format!("({})", branches.join(" OR "))
}
