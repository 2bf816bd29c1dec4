use tracing::trace;

use crate::error::{Result, RewriteError};
use crate::query::fields;
use crate::query::types::{
    Node, Operator, OperatorKind, Parameter, Pattern, PatternKind, SearchKind,
};

/// Parse query text into the top-level implicit AND scope.
///
/// `kind` decides how bare patterns are read unless the query carries its own
/// `patterntype:` parameter.
pub fn parse(input: &str, kind: SearchKind) -> Result<Vec<Node>> {
    let mut parser = QueryParser::new(input);
    let Some(expr) = parser.parse()? else {
        return Ok(Vec::new());
    };

    let kind = match pattern_type(&expr) {
        Some((value, offset)) => value
            .parse::<SearchKind>()
            .map_err(|message| RewriteError::malformed(offset, message))?,
        None => kind,
    };
    trace!(%kind, "lowering query");

    let lowering = Lowering { kind };
    match expr {
        Expr::Seq(items) => lowering.lower_seq(items),
        other => Ok(vec![lowering.lower_node(other)?]),
    }
}

/// Syntax tree before pattern kinds are known
#[derive(Debug)]
enum Expr {
    Param { parameter: Parameter, offset: usize },
    Word { text: String, negated: bool, offset: usize },
    Group(Box<Expr>),
    Seq(Vec<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// First `patterntype:` value in the query, with its offset
fn pattern_type(expr: &Expr) -> Option<(&str, usize)> {
    match expr {
        Expr::Param { parameter, offset } if parameter.is_field(fields::FIELD_PATTERN_TYPE) => {
            Some((parameter.value.as_str(), *offset))
        }
        Expr::Param { .. } | Expr::Word { .. } => None,
        Expr::Group(inner) => pattern_type(inner),
        Expr::Seq(items) | Expr::And(items) | Expr::Or(items) => {
            items.iter().find_map(pattern_type)
        }
    }
}

/// Query parser
struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> Result<Option<Expr>> {
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if !self.is_eof() {
            return Err(RewriteError::malformed(
                self.pos,
                "unbalanced parenthesis: unexpected ')'",
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Option<Expr>> {
        self.parse_binary("or", Self::parse_and, Expr::Or)
    }

    fn parse_and(&mut self) -> Result<Option<Expr>> {
        self.parse_binary("and", Self::parse_seq, Expr::And)
    }

    fn parse_binary(
        &mut self,
        keyword: &str,
        operand: fn(&mut Self) -> Result<Option<Expr>>,
        combine: fn(Vec<Expr>) -> Expr,
    ) -> Result<Option<Expr>> {
        let start = self.pos;
        let first = operand(self)?;

        let mut nodes = Vec::new();
        self.skip_whitespace();
        while self.at_keyword(keyword) {
            let keyword_pos = self.pos;
            if nodes.is_empty() && first.is_none() {
                return Err(RewriteError::malformed(
                    keyword_pos,
                    format!("{} is missing a left operand", keyword.to_uppercase()),
                ));
            }
            self.pos += keyword.len();
            match operand(self)? {
                Some(node) => nodes.push(node),
                None => {
                    return Err(RewriteError::malformed(
                        keyword_pos,
                        format!("{} is missing a right operand", keyword.to_uppercase()),
                    ));
                }
            }
            self.skip_whitespace();
        }

        match (first, nodes.is_empty()) {
            (first, true) => Ok(first),
            (Some(first), false) => {
                nodes.insert(0, first);
                Ok(Some(combine(nodes)))
            }
            (None, false) => Err(RewriteError::malformed(start, "missing operand")),
        }
    }

    /// Juxtaposed units, an implicit AND
    fn parse_seq(&mut self) -> Result<Option<Expr>> {
        let mut nodes = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_eof()
                || self.peek_char() == Some(')')
                || self.at_keyword("and")
                || self.at_keyword("or")
            {
                break;
            }

            nodes.push(self.parse_unit()?);
        }

        Ok(match nodes.len() {
            0 => None,
            1 => nodes.pop(),
            _ => Some(Expr::Seq(nodes)),
        })
    }

    fn parse_unit(&mut self) -> Result<Expr> {
        let start = self.pos;

        // Parenthesized expression
        if self.consume_char('(') {
            self.skip_whitespace();
            if self.peek_char() == Some(')') {
                return Err(RewriteError::malformed(start, "empty group"));
            }
            let inner = self.parse_or()?;
            self.skip_whitespace();
            if !self.consume_char(')') {
                return Err(RewriteError::malformed(
                    start,
                    "unbalanced parenthesis: missing ')'",
                ));
            }
            return match inner {
                Some(inner) => Ok(Expr::Group(Box::new(inner))),
                None => Err(RewriteError::malformed(start, "empty group")),
            };
        }

        if self.at_keyword("not") {
            self.pos += 3;
            self.skip_whitespace();
            if self.is_eof() || self.peek_char() == Some(')') {
                return Err(RewriteError::malformed(start, "NOT is missing an operand"));
            }
            if self.peek_char() == Some('(') {
                return Err(RewriteError::malformed(
                    start,
                    "NOT cannot be applied to a group",
                ));
            }
            return Ok(match self.parse_leaf()? {
                Expr::Param { parameter, offset } => Expr::Param {
                    parameter: parameter.negate(),
                    offset,
                },
                Expr::Word { text, offset, .. } => Expr::Word {
                    text,
                    negated: true,
                    offset,
                },
                other => other,
            });
        }

        self.parse_leaf()
    }

    /// A parameter or a pattern word
    fn parse_leaf(&mut self) -> Result<Expr> {
        let start = self.pos;

        let negated = self.peek_char() == Some('-');
        let field_start = if negated { start + 1 } else { start };
        if let Some(field) = self.scan_field(field_start) {
            let field = field.to_lowercase();
            if fields::is_known(&field) {
                self.pos = field_start + field.len() + 1;
                let value = self.scan_value()?;
                let mut parameter = Parameter::new(field, value);
                parameter.negated = negated;
                return Ok(Expr::Param {
                    parameter,
                    offset: start,
                });
            }
        }

        let len = token_len(self.remaining());
        let text = self.remaining()[..len].to_string();
        self.pos += len;
        Ok(Expr::Word {
            text,
            negated: false,
            offset: start,
        })
    }

    /// Identifier followed by ':' at `from`, without consuming anything
    fn scan_field(&self, from: usize) -> Option<&'a str> {
        let rest = &self.input[from..];
        let len = rest
            .char_indices()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len > 0 && rest[len..].starts_with(':') {
            Some(&rest[..len])
        } else {
            None
        }
    }

    fn scan_value(&mut self) -> Result<String> {
        if self.peek_char() != Some('"') {
            let len = token_len(self.remaining());
            let value = self.remaining()[..len].to_string();
            self.pos += len;
            return Ok(value);
        }

        let start = self.pos;
        self.advance();
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(RewriteError::malformed(start, "unterminated quoted value"));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(ch) = self.peek_char() {
                        value.push(ch);
                        self.advance();
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        match self.peek_char() {
            None | Some(')') => Ok(value),
            Some(ch) if ch.is_whitespace() => Ok(value),
            Some(_) => Err(RewriteError::malformed(
                self.pos,
                "quoted value must be followed by whitespace",
            )),
        }
    }

    /// Case-insensitive keyword standing alone as a token
    fn at_keyword(&self, keyword: &str) -> bool {
        starts_with_keyword(self.remaining(), keyword)
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }
}

/// Byte length of the token at the start of `s`.
///
/// A token ends at whitespace or at a ')' that closes nothing opened inside
/// the token; parentheses opened inside it may enclose whitespace, so
/// `contains.file(a b)` is one token. Backslash escapes the next character.
pub(crate) fn token_len(s: &str) -> usize {
    let mut depth = 0usize;
    let mut chars = s.char_indices();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '(' => depth += 1,
            ')' if depth == 0 => return i,
            ')' => depth -= 1,
            ch if ch.is_whitespace() && depth == 0 => return i,
            _ => {}
        }
    }
    s.len()
}

/// `keyword` at the start of `s`, ended by whitespace, a parenthesis or the
/// end of input
pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    if s.len() < keyword.len() || !s.is_char_boundary(keyword.len()) {
        return false;
    }
    if !s[..keyword.len()].eq_ignore_ascii_case(keyword) {
        return false;
    }
    match s[keyword.len()..].chars().next() {
        None | Some('(') | Some(')') => true,
        Some(ch) => ch.is_whitespace(),
    }
}

/// Whether `s` scans as exactly one token whatever text follows it: no
/// unbalanced parenthesis, no trailing escape, no bare whitespace.
pub(crate) fn is_whole_token(s: &str) -> bool {
    let mut depth = 0usize;
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if chars.next().is_none() {
                    return false;
                }
            }
            '(' => depth += 1,
            ')' if depth == 0 => return false,
            ')' => depth -= 1,
            ch if ch.is_whitespace() && depth == 0 => return false,
            _ => {}
        }
    }
    depth == 0 && !s.is_empty()
}

/// Whether the word would be read as a `field:value` parameter
pub(crate) fn names_field(word: &str) -> bool {
    let word = word.strip_prefix('-').unwrap_or(word);
    match word.split_once(':') {
        Some((field, _)) => {
            !field.is_empty()
                && field.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
                && fields::is_known(&field.to_lowercase())
        }
        None => false,
    }
}

/// Turns syntax into nodes once the pattern kind is known
struct Lowering {
    kind: SearchKind,
}

impl Lowering {
    /// Lower a juxtaposition into the nodes of one AND scope, merging
    /// juxtaposed patterns
    fn lower_seq(&self, items: Vec<Expr>) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(items.len());
        let mut origins: Vec<Option<usize>> = Vec::with_capacity(items.len());
        let mut anchor: Option<usize> = None;

        for item in items {
            match item {
                Expr::Word {
                    text,
                    negated,
                    offset,
                } => {
                    let pattern = self.pattern(text, negated);
                    if pattern.is_concatenable() {
                        if let Some(Node::Pattern(merged)) = anchor.map(|i| &mut nodes[i]) {
                            merged.value.push(' ');
                            merged.value.push_str(&pattern.value);
                            continue;
                        }
                        anchor = Some(nodes.len());
                    }
                    nodes.push(Node::Pattern(pattern));
                    origins.push(Some(offset));
                }
                other => {
                    nodes.push(self.lower_node(other)?);
                    origins.push(None);
                }
            }
        }

        for (node, origin) in nodes.iter().zip(&origins) {
            if let (Node::Pattern(pattern), Some(offset)) = (node, origin) {
                validate(pattern, *offset)?;
            }
        }
        Ok(nodes)
    }

    fn lower_node(&self, expr: Expr) -> Result<Node> {
        match expr {
            Expr::Param { parameter, .. } => Ok(Node::Parameter(parameter)),
            Expr::Word {
                text,
                negated,
                offset,
            } => {
                let pattern = self.pattern(text, negated);
                validate(&pattern, offset)?;
                Ok(Node::Pattern(pattern))
            }
            Expr::Group(inner) => self.lower_node(*inner),
            Expr::Seq(items) => {
                let mut nodes = self.lower_seq(items)?;
                if nodes.len() == 1 {
                    return Ok(nodes.remove(0));
                }
                Ok(flatten(OperatorKind::And, nodes))
            }
            Expr::And(items) => self.lower_operator(OperatorKind::And, items),
            Expr::Or(items) => self.lower_operator(OperatorKind::Or, items),
        }
    }

    fn lower_operator(&self, kind: OperatorKind, items: Vec<Expr>) -> Result<Node> {
        let operands = items
            .into_iter()
            .map(|item| self.lower_node(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(flatten(kind, operands))
    }

    fn pattern(&self, text: String, negated: bool) -> Pattern {
        if self.kind.delimits_regexp() {
            if let Some(inner) = strip_delimiters(&text) {
                return Pattern {
                    value: inner.to_string(),
                    kind: PatternKind::Regexp,
                    negated,
                    delimited: true,
                };
            }
        }
        Pattern {
            value: text,
            kind: self.kind.pattern_kind(),
            negated,
            delimited: false,
        }
    }
}

/// Build an operator, absorbing operands of the same kind
fn flatten(kind: OperatorKind, operands: Vec<Node>) -> Node {
    let mut flat = Vec::with_capacity(operands.len());
    for operand in operands {
        match operand {
            Node::Operator(Operator {
                kind: inner,
                operands,
            }) if inner == kind => flat.extend(operands),
            other => flat.push(other),
        }
    }
    Node::Operator(Operator {
        kind,
        operands: flat,
    })
}

/// `/inner/` with an unescaped closing slash
pub(crate) fn strip_delimiters(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('/')?.strip_suffix('/')?;
    if inner.is_empty() {
        return None;
    }
    let trailing_backslashes = inner.chars().rev().take_while(|&c| c == '\\').count();
    if trailing_backslashes % 2 == 1 {
        return None;
    }
    Some(inner)
}

fn validate(pattern: &Pattern, offset: usize) -> Result<()> {
    if pattern.kind == PatternKind::Regexp {
        regex::Regex::new(&pattern.value).map_err(|e| {
            RewriteError::malformed(offset, format!("invalid regular expression: {e}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_std(input: &str) -> Vec<Node> {
        parse(input, SearchKind::Standard).unwrap()
    }

    fn param(field: &str, value: &str) -> Node {
        Node::Parameter(Parameter::new(field, value))
    }

    fn literal(value: &str) -> Node {
        Node::Pattern(Pattern::literal(value))
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_std("").is_empty());
        assert!(parse_std("   ").is_empty());
    }

    #[test]
    fn test_simple_query() {
        assert_eq!(parse_std("hello"), vec![literal("hello")]);
    }

    #[test]
    fn test_parameters_and_pattern() {
        assert_eq!(
            parse_std("repo:myrepo testquery fork:no"),
            vec![param("repo", "myrepo"), literal("testquery"), param("fork", "no")]
        );
    }

    #[test]
    fn test_juxtaposed_patterns_concatenate() {
        assert_eq!(parse_std("package search"), vec![literal("package search")]);
        assert_eq!(
            parse_std("foo repo:x bar"),
            vec![literal("foo bar"), param("repo", "x")]
        );
    }

    #[test]
    fn test_quotes_are_literal_in_patterns() {
        assert_eq!(
            parse_std(r#""license": "A"#),
            vec![literal(r#""license": "A"#)]
        );
    }

    #[test]
    fn test_field_case_and_alias() {
        let nodes = parse_std("R:myrepo foo");
        let Node::Parameter(p) = &nodes[0] else {
            panic!("expected parameter, got {:?}", nodes[0]);
        };
        assert_eq!(p.field, "r");
        assert!(p.is_field("repo"));
    }

    #[test]
    fn test_unknown_field_is_pattern() {
        assert_eq!(
            parse_std("http://example.com"),
            vec![literal("http://example.com")]
        );
    }

    #[test]
    fn test_negated_parameter() {
        let nodes = parse_std("-file:test foo");
        assert_eq!(nodes[0], Node::Parameter(Parameter::new("file", "test").negate()));
        let nodes = parse_std("NOT file:test foo");
        assert_eq!(nodes[0], Node::Parameter(Parameter::new("file", "test").negate()));
    }

    #[test]
    fn test_dash_word_is_literal() {
        assert_eq!(parse_std("-foo"), vec![literal("-foo")]);
    }

    #[test]
    fn test_negated_pattern() {
        let nodes = parse_std("foo NOT bar");
        assert_eq!(nodes.len(), 2);
        assert!(matches!(&nodes[1], Node::Pattern(p) if p.negated && p.value == "bar"));
    }

    #[test]
    fn test_value_with_balanced_parens() {
        assert_eq!(
            parse_std("repo:contains.file(CHANGELOG) TEST"),
            vec![param("repo", "contains.file(CHANGELOG)"), literal("TEST")]
        );
        assert_eq!(
            parse_std("content:output.extra(findme -> $lang)"),
            vec![param("content", "output.extra(findme -> $lang)")]
        );
    }

    #[test]
    fn test_quoted_value() {
        assert_eq!(
            parse_std(r#"file:"a b\"c" foo"#),
            vec![param("file", "a b\"c"), literal("foo")]
        );
    }

    #[test]
    fn test_unterminated_quoted_value() {
        let err = parse("file:\"abc", SearchKind::Standard).unwrap_err();
        assert_eq!(err, RewriteError::malformed(5, "unterminated quoted value"));
    }

    #[test]
    fn test_delimited_regexp() {
        let nodes = parse_std("/foo.*bar/");
        assert!(matches!(
            &nodes[0],
            Node::Pattern(p)
                if p.kind == PatternKind::Regexp && p.delimited && p.value == "foo.*bar"
        ));
    }

    #[test]
    fn test_slashes_are_literal_in_literal_kind() {
        let nodes = parse("/foo/", SearchKind::Literal).unwrap();
        assert_eq!(nodes, vec![literal("/foo/")]);
    }

    #[test]
    fn test_patterntype_overrides_kind() {
        let nodes = parse_std(r"file:go\.mod$ go\s*(\d\.\d+) patterntype:regexp");
        assert!(matches!(
            &nodes[1],
            Node::Pattern(p)
                if p.kind == PatternKind::Regexp
                    && !p.delimited
                    && p.value == r"go\s*(\d\.\d+)"
        ));
    }

    #[test]
    fn test_unknown_patterntype() {
        let err = parse("foo patterntype:fuzzy", SearchKind::Standard).unwrap_err();
        assert!(matches!(err, RewriteError::MalformedQuery { offset: 4, .. }));
    }

    #[test]
    fn test_invalid_regexp() {
        let err = parse("repo:x /foo(/", SearchKind::Standard).unwrap_err();
        assert!(matches!(err, RewriteError::MalformedQuery { offset: 7, .. }));
    }

    #[test]
    fn test_structural_parens_stay_in_pattern() {
        let nodes = parse("TODO(...)", SearchKind::Structural).unwrap();
        assert!(matches!(
            &nodes[0],
            Node::Pattern(p) if p.kind == PatternKind::Structural && p.value == "TODO(...)"
        ));
    }

    #[test]
    fn test_explicit_and_is_operator() {
        let nodes = parse_std("(content:match repo:myrepo lang:go) and (lang:ts match)");
        assert_eq!(
            nodes,
            vec![Node::and(vec![
                param("content", "match"),
                param("repo", "myrepo"),
                param("lang", "go"),
                param("lang", "ts"),
                literal("match"),
            ])]
        );
    }

    #[test]
    fn test_or_keeps_branches() {
        let nodes = parse_std("(repo:a foo) or (repo:b bar)");
        assert_eq!(
            nodes,
            vec![Node::or(vec![
                Node::and(vec![param("repo", "a"), literal("foo")]),
                Node::and(vec![param("repo", "b"), literal("bar")]),
            ])]
        );
    }

    #[test]
    fn test_group_next_to_pattern() {
        let nodes = parse_std("(repo:^a$ OR repo:^b$) test");
        assert_eq!(
            nodes,
            vec![
                Node::or(vec![param("repo", "^a$"), param("repo", "^b$")]),
                literal("test"),
            ]
        );
    }

    #[test]
    fn test_nested_or_flattens() {
        let nodes = parse_std("a or (b or c)");
        assert_eq!(
            nodes,
            vec![Node::or(vec![literal("a"), literal("b"), literal("c")])]
        );
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(matches!(
            parse("(foo", SearchKind::Standard),
            Err(RewriteError::MalformedQuery { offset: 0, .. })
        ));
        assert!(matches!(
            parse("foo)", SearchKind::Standard),
            Err(RewriteError::MalformedQuery { offset: 3, .. })
        ));
    }

    #[test]
    fn test_empty_group() {
        assert!(parse("foo ()", SearchKind::Standard).is_err());
    }

    #[test]
    fn test_dangling_operators() {
        assert!(parse("foo or", SearchKind::Standard).is_err());
        assert!(parse("and foo", SearchKind::Standard).is_err());
        assert!(parse("NOT", SearchKind::Standard).is_err());
        assert!(parse("NOT (a b)", SearchKind::Standard).is_err());
    }

    #[test]
    fn test_lone_keyword_in_group_is_rejected() {
        for input in ["a (or) b", "x (and) y", "a (not)", "(OR)", "a (b not)"] {
            assert!(
                matches!(
                    parse(input, SearchKind::Standard),
                    Err(RewriteError::MalformedQuery { .. })
                ),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_negated_keyword_is_a_pattern() {
        let nodes = parse_std("NOT or");
        assert!(matches!(
            &nodes[..],
            [Node::Pattern(p)] if p.negated && p.value == "or"
        ));
    }

    #[test]
    fn test_whole_token() {
        assert!(is_whole_token("foo"));
        assert!(is_whole_token("f(a b)"));
        assert!(is_whole_token(r"a\)b"));
        assert!(!is_whole_token(""));
        assert!(!is_whole_token("(x"));
        assert!(!is_whole_token("b)"));
        assert!(!is_whole_token("a b"));
        assert!(!is_whole_token("a\\"));
    }

    #[test]
    fn test_names_field() {
        assert!(names_field("lang:rust"));
        assert!(names_field("-File:x"));
        assert!(!names_field("http://x"));
        assert!(!names_field("a.b:c"));
        assert!(!names_field("foo"));
    }

    #[test]
    fn test_keyword_prefix_is_not_keyword() {
        assert_eq!(parse_std("order android"), vec![literal("order android")]);
    }

    #[test]
    fn test_token_len() {
        assert_eq!(token_len("abc def"), 3);
        assert_eq!(token_len("a(b c)d e"), 7);
        assert_eq!(token_len("abc)"), 3);
        assert_eq!(token_len(r"a\ b c"), 4);
        assert_eq!(token_len(""), 0);
    }

    #[test]
    fn test_strip_delimiters() {
        assert_eq!(strip_delimiters("/foo/"), Some("foo"));
        assert_eq!(strip_delimiters("//"), None);
        assert_eq!(strip_delimiters(r"/foo\/"), None);
        assert_eq!(strip_delimiters(r"/foo\\/"), Some(r"foo\\"));
        assert_eq!(strip_delimiters("foo"), None);
    }
}
