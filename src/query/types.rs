use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::query::fields;
use crate::query::{parser, printer};

/// Query text in the field:value + pattern language.
///
/// This is the unit every rewrite consumes and produces; the tree form only
/// lives for the duration of a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasicQuery(String);

impl BasicQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse into the top-level implicit AND scope
    pub fn parse(&self, kind: SearchKind) -> Result<Vec<Node>> {
        parser::parse(&self.0, kind)
    }

    /// Render a tree back into query text
    pub fn from_nodes(nodes: &[Node]) -> Self {
        Self(printer::print(nodes))
    }
}

impl fmt::Display for BasicQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BasicQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BasicQuery {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for BasicQuery {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// How bare pattern tokens are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Literal patterns, `/.../` delimits a regexp
    #[default]
    Standard,
    /// Everything is literal, including slashes
    Literal,
    /// Bare patterns are regular expressions
    Regexp,
    /// Bare patterns are structural templates
    Structural,
}

impl SearchKind {
    /// Kind given to a bare (undelimited) pattern
    pub fn pattern_kind(self) -> PatternKind {
        match self {
            SearchKind::Standard | SearchKind::Literal => PatternKind::Literal,
            SearchKind::Regexp => PatternKind::Regexp,
            SearchKind::Structural => PatternKind::Structural,
        }
    }

    /// Whether `/.../` tokens are read as delimited regexps
    pub fn delimits_regexp(self) -> bool {
        matches!(self, SearchKind::Standard | SearchKind::Regexp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::Standard => "standard",
            SearchKind::Literal => "literal",
            SearchKind::Regexp => "regexp",
            SearchKind::Structural => "structural",
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "keyword" => Ok(SearchKind::Standard),
            "literal" => Ok(SearchKind::Literal),
            "regexp" | "regex" => Ok(SearchKind::Regexp),
            "structural" => Ok(SearchKind::Structural),
            other => Err(format!("unknown pattern type: {other}")),
        }
    }
}

/// Interpretation of a single pattern leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Literal,
    Regexp,
    Structural,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternKind::Literal => "literal",
            PatternKind::Regexp => "regexp",
            PatternKind::Structural => "structural",
        })
    }
}

/// A `field:value` filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub field: String,
    pub value: String,
    #[serde(default)]
    pub negated: bool,
}

impl Parameter {
    /// Field names are case-insensitive and stored lowercased
    pub fn new(field: impl AsRef<str>, value: impl Into<String>) -> Self {
        Self {
            field: field.as_ref().to_lowercase(),
            value: value.into(),
            negated: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Field name with aliases resolved (`r` -> `repo`)
    pub fn canonical_field(&self) -> &str {
        fields::canonical(&self.field)
    }

    pub fn is_field(&self, field: &str) -> bool {
        self.canonical_field() == fields::canonical(&field.to_lowercase())
    }

    /// `content:` carries the search pattern rather than filtering on it
    pub fn is_content(&self) -> bool {
        self.is_field(fields::FIELD_CONTENT)
    }
}

/// The search term proper
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub value: String,
    pub kind: PatternKind,
    #[serde(default)]
    pub negated: bool,
    /// Written as `/value/` in the source
    #[serde(default)]
    pub delimited: bool,
}

impl Pattern {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: PatternKind::Literal,
            negated: false,
            delimited: false,
        }
    }

    /// Juxtaposed patterns of this shape merge into one pattern
    pub fn is_concatenable(&self) -> bool {
        !self.negated && !self.delimited
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatorKind {
    And,
    Or,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatorKind::And => "AND",
            OperatorKind::Or => "OR",
        })
    }
}

/// Boolean combination of nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operator {
    pub kind: OperatorKind,
    pub operands: Vec<Node>,
}

/// Query tree node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum Node {
    Parameter(Parameter),
    Pattern(Pattern),
    Operator(Operator),
}

impl Node {
    pub fn and(operands: Vec<Node>) -> Self {
        Node::Operator(Operator {
            kind: OperatorKind::And,
            operands,
        })
    }

    pub fn or(operands: Vec<Node>) -> Self {
        Node::Operator(Operator {
            kind: OperatorKind::Or,
            operands,
        })
    }

    /// A parameter that filters, i.e. anything but `content:`.
    ///
    /// These are the nodes that render ahead of the terms of their scope.
    pub fn is_plain_parameter(&self) -> bool {
        matches!(self, Node::Parameter(p) if !p.is_content())
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            Node::Parameter(p) => Some(p),
            _ => None,
        }
    }
}

impl From<Parameter> for Node {
    fn from(parameter: Parameter) -> Self {
        Node::Parameter(parameter)
    }
}

impl From<Pattern> for Node {
    fn from(pattern: Pattern) -> Self {
        Node::Pattern(pattern)
    }
}
