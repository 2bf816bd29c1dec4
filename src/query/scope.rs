//! Scope-level queries over a parsed tree.

use crate::error::Result;
use crate::query::fields;
use crate::query::types::{Node, Operator, OperatorKind, Parameter, Pattern, SearchKind};

/// Parameters that apply to the whole AND scope: those at this level plus
/// those of every AND-combined descendant. OR branches keep their own.
pub fn and_scope_parameters(nodes: &[Node]) -> Vec<&Parameter> {
    let mut parameters = Vec::new();
    collect_and_parameters(nodes, &mut parameters);
    parameters
}

fn collect_and_parameters<'a>(nodes: &'a [Node], out: &mut Vec<&'a Parameter>) {
    for node in nodes {
        match node {
            Node::Parameter(p) => out.push(p),
            Node::Operator(Operator {
                kind: OperatorKind::And,
                operands,
            }) => collect_and_parameters(operands, out),
            Node::Operator(_) | Node::Pattern(_) => {}
        }
    }
}

/// Every pattern leaf in the tree, in source order
pub fn patterns(nodes: &[Node]) -> Vec<&Pattern> {
    let mut found = Vec::new();
    collect_patterns(nodes, &mut found);
    found
}

fn collect_patterns<'a>(nodes: &'a [Node], out: &mut Vec<&'a Pattern>) {
    for node in nodes {
        match node {
            Node::Pattern(p) => out.push(p),
            Node::Operator(op) => collect_patterns(&op.operands, out),
            Node::Parameter(_) => {}
        }
    }
}

/// Every parameter in the tree, in source order, regardless of scope
pub fn all_parameters(nodes: &[Node]) -> Vec<&Parameter> {
    let mut found = Vec::new();
    collect_all_parameters(nodes, &mut found);
    found
}

fn collect_all_parameters<'a>(nodes: &'a [Node], out: &mut Vec<&'a Parameter>) {
    for node in nodes {
        match node {
            Node::Parameter(p) => out.push(p),
            Node::Operator(op) => collect_all_parameters(&op.operands, out),
            Node::Pattern(_) => {}
        }
    }
}

/// The kind patterns were read with: the query's own `patterntype:` if it
/// has one, otherwise `fallback`
pub fn effective_search_kind(nodes: &[Node], fallback: SearchKind) -> SearchKind {
    all_parameters(nodes)
        .into_iter()
        .find(|p| p.is_field(fields::FIELD_PATTERN_TYPE))
        .and_then(|p| p.value.parse().ok())
        .unwrap_or(fallback)
}

/// Number of basic queries the tree expands into once every OR that
/// involves a parameter is distributed over its AND context.
///
/// Sub-expressions made of patterns only stay a single step: they are
/// evaluated by the pattern matcher as a whole.
pub fn step_count(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(node_steps)
        .fold(1, usize::saturating_mul)
}

fn node_steps(node: &Node) -> usize {
    match node {
        Node::Parameter(_) | Node::Pattern(_) => 1,
        Node::Operator(op) if all_parameters(&op.operands).is_empty() => 1,
        Node::Operator(Operator {
            kind: OperatorKind::And,
            operands,
        }) => step_count(operands),
        Node::Operator(Operator {
            kind: OperatorKind::Or,
            operands,
        }) => operands
            .iter()
            .map(node_steps)
            .fold(0, usize::saturating_add),
    }
}

/// Rebuild the tree, passing every leaf through `f`.
///
/// Stops at the first error so that callers never observe a partially
/// rewritten tree.
pub fn map_leaves<F>(nodes: Vec<Node>, f: &mut F) -> Result<Vec<Node>>
where
    F: FnMut(Node) -> Result<Node>,
{
    nodes
        .into_iter()
        .map(|node| match node {
            Node::Operator(Operator { kind, operands }) => Ok(Node::Operator(Operator {
                kind,
                operands: map_leaves(operands, f)?,
            })),
            leaf => f(leaf),
        })
        .collect()
}
