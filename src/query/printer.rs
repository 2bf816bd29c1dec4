//! Renders query trees back into query text.
//!
//! Within every AND scope, filtering parameters come first in their original
//! relative order, then any `patterntype:` parameter, then the terms of the
//! scope (patterns, `content:` parameters, nested operators). Parentheses are
//! only emitted where the grammar needs them. Printing a reparsed query gives
//! back the same text.

use crate::query::fields;
use crate::query::parser::{
    is_whole_token, names_field, starts_with_keyword, strip_delimiters, token_len,
};
use crate::query::types::{Node, Operator, OperatorKind, Parameter, Pattern};

/// Render the top-level implicit AND scope
pub fn print(nodes: &[Node]) -> String {
    let wrap = nodes.len() > 1;
    let mut parts = scope_parameters(nodes);

    let terms: Vec<&Node> = nodes.iter().filter(|n| !n.is_plain_parameter()).collect();
    if !terms.is_empty() {
        // Two plain patterns side by side would merge when parsed again
        let separator = if mergeable_terms(&terms) { " AND " } else { " " };
        let rendered: Vec<String> = terms.iter().map(|n| print_term(n, wrap)).collect();
        parts.push(rendered.join(separator));
    }

    parts.join(" ")
}

/// Render the filtering parameters of one scope: the ordinary ones first,
/// then `patterntype:` so it sits right before the terms
pub(crate) fn scope_parameters(nodes: &[Node]) -> Vec<String> {
    let (pattern_types, others): (Vec<&Parameter>, Vec<&Parameter>) = nodes
        .iter()
        .filter(|n| n.is_plain_parameter())
        .filter_map(Node::as_parameter)
        .partition(|p| p.is_field(fields::FIELD_PATTERN_TYPE));

    others
        .into_iter()
        .chain(pattern_types)
        .map(print_parameter)
        .collect()
}

fn mergeable_terms(terms: &[&Node]) -> bool {
    terms
        .iter()
        .filter(|n| {
            matches!(n, Node::Pattern(p) if p.is_concatenable() && is_bare_pattern(&p.value, false))
        })
        .count()
        > 1
}

fn print_term(node: &Node, wrap: bool) -> String {
    match node {
        Node::Parameter(p) => print_parameter(p),
        Node::Pattern(p) => print_pattern(p),
        Node::Operator(op) if wrap => format!("({})", print_operator(op)),
        Node::Operator(op) => print_operator(op),
    }
}

fn print_operator(op: &Operator) -> String {
    match op.kind {
        OperatorKind::And => {
            let mut parts = scope_parameters(&op.operands);
            let terms: Vec<String> = op
                .operands
                .iter()
                .filter(|n| !n.is_plain_parameter())
                .map(|n| match n {
                    Node::Operator(inner) => format!("({})", print_operator(inner)),
                    leaf => print_term(leaf, false),
                })
                .collect();
            if !terms.is_empty() {
                parts.push(terms.join(" AND "));
            }
            parts.join(" ")
        }
        OperatorKind::Or => op
            .operands
            .iter()
            .map(|n| match n {
                Node::Operator(inner) if inner.kind == OperatorKind::Or => {
                    format!("({})", print_operator(inner))
                }
                Node::Operator(inner) => print_operator(inner),
                leaf => print_term(leaf, false),
            })
            .collect::<Vec<_>>()
            .join(" OR "),
    }
}

pub(crate) fn print_parameter(parameter: &Parameter) -> String {
    format!(
        "{}{}:{}",
        if parameter.negated { "-" } else { "" },
        parameter.field,
        print_value(&parameter.value)
    )
}

/// A pattern whose text would not scan back as the same bare pattern is
/// written as a quoted `content:` parameter instead.
pub(crate) fn print_pattern(pattern: &Pattern) -> String {
    if !pattern.delimited && !is_bare_pattern(&pattern.value, pattern.negated) {
        return print_parameter(&Parameter {
            field: fields::FIELD_CONTENT.to_string(),
            value: pattern.value.clone(),
            negated: pattern.negated,
        });
    }

    let text = if pattern.delimited {
        format!("/{}/", pattern.value)
    } else {
        pattern.value.clone()
    };
    if pattern.negated {
        format!("NOT {text}")
    } else {
        text
    }
}

/// Words joined by single spaces, each read back as pattern text. A negated
/// pattern only negates one word.
fn is_bare_pattern(value: &str, negated: bool) -> bool {
    let mut rest = value;
    loop {
        let len = token_len(rest);
        if !is_pattern_word(&rest[..len]) {
            return false;
        }
        rest = &rest[len..];
        if rest.is_empty() {
            return true;
        }
        if negated {
            return false;
        }
        match rest.strip_prefix(' ') {
            Some(next) if !next.starts_with(char::is_whitespace) => rest = next,
            _ => return false,
        }
    }
}

fn is_pattern_word(word: &str) -> bool {
    is_whole_token(word)
        && !word.starts_with('(')
        && !["and", "or", "not"]
            .iter()
            .any(|keyword| starts_with_keyword(word, keyword))
        && !names_field(word)
        && strip_delimiters(word).is_none()
}

/// Values that would not scan back to themselves are quoted
fn print_value(value: &str) -> String {
    if !value.starts_with('"') && is_whole_token(value) {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
