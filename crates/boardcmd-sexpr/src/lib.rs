//! S-expression tree used to read, edit and write KiCad board files.
//!
//! The parser records a byte [`Span`] for every node and keeps the original
//! lexeme of numeric atoms, so a board that is parsed, edited in a few places
//! and written back keeps its numbers exactly as KiCad wrote them.
//!
//! # Editing
//!
//! Board edits are done directly on the tree:
//!
//! - [`Sexpr::find_list`] / [`Sexpr::find_all_lists`] - look up `(tag ...)` children
//! - [`Sexpr::set_child`] - replace or append a `(tag value)` child
//! - [`Sexpr::retain_children`] - drop children matching a predicate
//! - [`formatter::format_tree`] - write the tree back out in KiCad's layout

pub mod formatter;

pub use formatter::format_tree;

use std::fmt;

/// Find a direct child list `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_child_list<'a>(items: &'a [Sexpr], name: &str) -> Option<&'a [Sexpr]> {
    items
        .iter()
        .filter_map(Sexpr::as_list)
        .find(|list| list.first().and_then(Sexpr::as_sym) == Some(name))
}

/// Find all direct child lists `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_all_child_lists<'a>(items: &'a [Sexpr], name: &str) -> Vec<&'a [Sexpr]> {
    items
        .iter()
        .filter_map(Sexpr::as_list)
        .filter(|list| list.first().and_then(Sexpr::as_sym) == Some(name))
        .collect()
}

/// Coerce a number atom into f64.
///
/// KiCad writes whole numbers as ints and everything else as floats.
pub fn number_as_f64(node: &Sexpr) -> Option<f64> {
    node.as_float().or_else(|| node.as_int().map(|v| v as f64))
}

/// Byte span in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span for nodes built in code rather than parsed.
    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn is_synthetic(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// The kind of S-expression value
#[derive(Debug, Clone, PartialEq)]
pub enum SexprKind {
    /// Unquoted identifier
    Symbol(String),
    /// Quoted text, stored unescaped
    String(String),
    Int(i64),
    F64(f64),
    List(Vec<Sexpr>),
}

/// An S-expression value with source span
#[derive(Debug, Clone)]
pub struct Sexpr {
    pub kind: SexprKind,
    pub span: Span,
    /// Original lexeme for parsed numeric atoms (`12.000000` stays `12.000000`).
    pub raw_atom: Option<Box<str>>,
}

impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        // Spans and lexemes are presentation, not value
        self.kind == other.kind
    }
}

impl Sexpr {
    pub fn with_span(kind: SexprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            raw_atom: None,
        }
    }

    fn synthetic(kind: SexprKind) -> Self {
        Self::with_span(kind, Span::synthetic())
    }

    /// Create a symbol (unquoted atom)
    pub fn symbol(s: impl Into<String>) -> Self {
        Self::synthetic(SexprKind::Symbol(s.into()))
    }

    /// Create a string (quoted atom)
    pub fn string(s: impl Into<String>) -> Self {
        Self::synthetic(SexprKind::String(s.into()))
    }

    pub fn int(n: i64) -> Self {
        Self::synthetic(SexprKind::Int(n))
    }

    pub fn float(f: f64) -> Self {
        Self::synthetic(SexprKind::F64(f))
    }

    pub fn list(items: Vec<Sexpr>) -> Self {
        Self::synthetic(SexprKind::List(items))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, SexprKind::List(_))
    }

    /// Symbol or string content
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) | SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            SexprKind::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match &self.kind {
            SexprKind::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Int or float, as f64
    pub fn as_number(&self) -> Option<f64> {
        number_as_f64(self)
    }

    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match &self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Sexpr>> {
        match &mut self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// Leading symbol of a list: `footprint` for `(footprint "R" ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }

    /// Find a child list with the given tag
    pub fn find_list(&self, name: &str) -> Option<&[Sexpr]> {
        find_child_list(self.as_list()?, name)
    }

    /// Find all child lists with the given tag
    pub fn find_all_lists(&self, name: &str) -> Vec<&[Sexpr]> {
        self.as_list()
            .map(|items| find_all_child_lists(items, name))
            .unwrap_or_default()
    }

    /// Mutable access to the first child list node with the given tag.
    pub fn find_list_mut(&mut self, name: &str) -> Option<&mut Sexpr> {
        self.as_list_mut()?
            .iter_mut()
            .find(|child| child.tag() == Some(name))
    }

    /// Append a child. No-op on atoms.
    pub fn push(&mut self, child: Sexpr) {
        if let Some(items) = self.as_list_mut() {
            items.push(child);
        }
    }

    /// Replace the first `(tag ...)` child with `(tag value)`, or append it.
    pub fn set_child(&mut self, tag: &str, value: impl Into<Sexpr>) {
        let node = kv(tag, value);
        let Some(items) = self.as_list_mut() else {
            return;
        };
        match items.iter_mut().find(|child| child.tag() == Some(tag)) {
            Some(existing) => *existing = node,
            None => items.push(node),
        }
    }

    /// Keep only the children for which `keep` returns true (the tag is never removed).
    ///
    /// Returns the number of removed children.
    pub fn retain_children<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Sexpr) -> bool,
    {
        let Some(items) = self.as_list_mut() else {
            return 0;
        };
        let before = items.len();
        let mut index = 0;
        items.retain(|child| {
            let first = index == 0;
            index += 1;
            first || keep(child)
        });
        before - items.len()
    }

    /// Second element of a `(tag value ...)` child, e.g. the layer name of `(layer "F.Cu")`.
    pub fn child_value(&self, tag: &str) -> Option<&Sexpr> {
        self.find_list(tag)?.get(1)
    }

    /// Text of `(tag "value")` or `(tag value)`.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child_value(tag)?.as_atom()
    }

    /// Numeric `(tag 1.5)`.
    pub fn child_number(&self, tag: &str) -> Option<f64> {
        self.child_value(tag)?.as_number()
    }
}

/// Create a `(key value)` pair list
pub fn kv<K: Into<String>, V: Into<Sexpr>>(k: K, v: V) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol(k), v.into()])
}

/// A builder for constructing lists incrementally
#[derive(Debug, Default)]
pub struct ListBuilder {
    items: Vec<Sexpr>,
}

impl ListBuilder {
    /// Start a list with a tag symbol
    pub fn node<N: Into<Sexpr>>(name: N) -> Self {
        Self {
            items: vec![name.into()],
        }
    }

    pub fn push<V: Into<Sexpr>>(mut self, v: V) -> Self {
        self.items.push(v.into());
        self
    }

    pub fn push_if<V: Into<Sexpr>>(self, cond: bool, v: V) -> Self {
        if cond { self.push(v) } else { self }
    }

    pub fn extend<I, V>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Sexpr>,
    {
        self.items.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Sexpr {
        Sexpr::list(self.items)
    }
}

impl From<&str> for Sexpr {
    fn from(s: &str) -> Self {
        Self::symbol(s)
    }
}

impl From<String> for Sexpr {
    fn from(s: String) -> Self {
        Self::symbol(s)
    }
}

impl From<i64> for Sexpr {
    fn from(n: i64) -> Self {
        Sexpr::int(n)
    }
}

impl From<u32> for Sexpr {
    fn from(n: u32) -> Self {
        Sexpr::int(n as i64)
    }
}

impl From<f64> for Sexpr {
    fn from(n: f64) -> Self {
        Sexpr::float(n)
    }
}

impl From<bool> for Sexpr {
    fn from(b: bool) -> Self {
        Self::symbol(if b { "yes" } else { "no" })
    }
}

/// Deepest list nesting the parser accepts. KiCad files stay far below this.
pub const MAX_DEPTH: usize = 256;

/// Parser for S-expressions
pub struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Parser {
            src,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse one expression starting at the current position
    pub fn parse(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_trivia();
        match self.peek() {
            None => Err(ParseError::UnexpectedEof),
            Some(b'(') => self.parse_list(),
            Some(b')') => Err(ParseError::UnexpectedChar {
                found: ')',
                offset: self.pos,
            }),
            Some(b'"') => self.parse_string(),
            Some(_) => Ok(self.parse_bare_atom()),
        }
    }

    /// Parse expressions until the input is exhausted
    pub fn parse_all(&mut self) -> Result<Vec<Sexpr>, ParseError> {
        let mut results = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek().is_none() {
                return Ok(results);
            }
            results.push(self.parse()?);
        }
    }

    /// Fail if anything other than whitespace or comments remains.
    pub fn finish(&mut self) -> Result<(), ParseError> {
        self.skip_trivia();
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(ParseError::TrailingInput { offset: self.pos }),
        }
    }

    fn parse_list(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep { offset: start });
        }
        self.depth += 1;
        let list = self.parse_list_items(start);
        self.depth -= 1;
        list
    }

    fn parse_list_items(&mut self, start: usize) -> Result<Sexpr, ParseError> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(ParseError::UnclosedList { start }),
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => items.push(self.parse()?),
            }

            if items.len() % 1000 == 0 {
                log::trace!("Parsed {} items in list at offset {start}", items.len());
            }
        }

        Ok(Sexpr::with_span(
            SexprKind::List(items),
            Span::new(start, self.pos),
        ))
    }

    fn parse_bare_atom(&mut self) -> Sexpr {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'"') {
                break;
            }
            self.pos += 1;
        }

        let token = &self.src[start..self.pos];
        let span = Span::new(start, self.pos);

        let kind = if looks_numeric(token) {
            if let Ok(n) = token.parse::<i64>() {
                SexprKind::Int(n)
            } else if let Ok(f) = token.parse::<f64>() {
                SexprKind::F64(f)
            } else {
                SexprKind::Symbol(token.to_string())
            }
        } else {
            SexprKind::Symbol(token.to_string())
        };

        let mut node = Sexpr::with_span(kind, span);
        if matches!(node.kind, SexprKind::Int(_) | SexprKind::F64(_)) {
            node.raw_atom = Some(token.into());
        }
        node
    }

    fn parse_string(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let bytes = self.src.as_bytes();
        let mut buf = Vec::new();

        loop {
            let Some(&b) = bytes.get(self.pos) else {
                return Err(ParseError::UnterminatedString { start });
            };
            self.pos += 1;
            match b {
                b'"' => break,
                b'\\' => {
                    let Some(&escaped) = bytes.get(self.pos) else {
                        return Err(ParseError::UnterminatedString { start });
                    };
                    self.pos += 1;
                    buf.push(match escaped {
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        other => other,
                    });
                }
                other => buf.push(other),
            }
        }

        // Escapes are ASCII, so multi-byte sequences are copied through whole.
        let text = String::from_utf8(buf).map_err(|_| ParseError::InvalidUtf8 { start })?;
        Ok(Sexpr::with_span(
            SexprKind::String(text),
            Span::new(start, self.pos),
        ))
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b';' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }
}

/// `inf`, `nan` and friends are symbols, not numbers.
fn looks_numeric(token: &str) -> bool {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    let digits = digits.strip_prefix('.').unwrap_or(digits);
    digits.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

/// Parse a string holding a single S-expression.
///
/// Trailing whitespace and comments are allowed; any other trailing input is an error.
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    log::trace!("Parsing S-expression from {} bytes of input", input.len());
    let mut parser = Parser::new(input);
    let result = parser.parse().and_then(|sexpr| {
        parser.finish()?;
        Ok(sexpr)
    });
    if let Err(e) = &result {
        log::trace!("Failed to parse S-expression: {e}");
    }
    result
}

/// Parse a string into multiple S-expressions
pub fn parse_all(input: &str) -> Result<Vec<Sexpr>, ParseError> {
    Parser::new(input).parse_all()
}

/// Errors that can occur during parsing
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedEof,
    UnexpectedChar { found: char, offset: usize },
    UnclosedList { start: usize },
    UnterminatedString { start: usize },
    InvalidUtf8 { start: usize },
    TrailingInput { offset: usize },
    TooDeep { offset: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof => write!(f, "Unexpected end of input"),
            ParseError::UnexpectedChar { found, offset } => {
                write!(f, "Unexpected '{found}' at byte {offset}")
            }
            ParseError::UnclosedList { start } => {
                write!(f, "Unclosed list starting at byte {start}")
            }
            ParseError::UnterminatedString { start } => {
                write!(f, "Unterminated string starting at byte {start}")
            }
            ParseError::InvalidUtf8 { start } => {
                write!(f, "Invalid UTF-8 in string starting at byte {start}")
            }
            ParseError::TrailingInput { offset } => {
                write!(f, "Unexpected trailing input at byte {offset}")
            }
            ParseError::TooDeep { offset } => {
                write!(f, "Lists nested deeper than {MAX_DEPTH} levels at byte {offset}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = formatter::format_tree(self);
        write!(f, "{}", formatted.trim_end_matches('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atoms() {
        assert_eq!(
            parse("hello").unwrap().kind,
            SexprKind::Symbol("hello".to_string())
        );
        assert_eq!(parse("123").unwrap().kind, SexprKind::Int(123));
        assert_eq!(parse("-3.15").unwrap().kind, SexprKind::F64(-3.15));
        assert_eq!(parse(".5").unwrap().kind, SexprKind::F64(0.5));
        assert_eq!(
            parse("Edge.Cuts").unwrap().kind,
            SexprKind::Symbol("Edge.Cuts".to_string())
        );
        assert_eq!(
            parse("inf").unwrap().kind,
            SexprKind::Symbol("inf".to_string())
        );
    }

    #[test]
    fn test_uuid_like_symbols_stay_symbols() {
        let parsed = parse("(tstamp 5e0b8f1c-0000-4a2b-9c1d-1234567890ab)").unwrap();
        let items = parsed.as_list().unwrap();
        assert_eq!(
            items[1].as_sym(),
            Some("5e0b8f1c-0000-4a2b-9c1d-1234567890ab")
        );
    }

    #[test]
    fn test_parse_string_escapes() {
        assert_eq!(
            parse("\"hello world\"").unwrap().kind,
            SexprKind::String("hello world".to_string())
        );
        assert_eq!(
            parse("\"with\\\"quotes\\\"\"").unwrap().kind,
            SexprKind::String("with\"quotes\"".to_string())
        );
        assert_eq!(
            parse("\"line\\nbreak\"").unwrap().kind,
            SexprKind::String("line\nbreak".to_string())
        );
    }

    #[test]
    fn test_parse_nested_with_comments() {
        let input = r#"
        ; board header
        (kicad_pcb ; inline
          (version 20240108)
          (general (thickness 1.6)))
        "#;
        let parsed = parse(input).unwrap();
        assert_eq!(parsed.tag(), Some("kicad_pcb"));
        assert_eq!(parsed.child_number("version"), Some(20240108.0));
        let general = parsed.find_list("general").unwrap();
        assert_eq!(find_child_list(general, "thickness").unwrap()[1].as_number(), Some(1.6));
    }

    #[test]
    fn test_utf8_strings() {
        let parsed = parse(r#"(gr_text "résistance 日本語")"#).unwrap();
        assert_eq!(parsed.tag(), Some("gr_text"));
        assert_eq!(
            parsed.as_list().unwrap()[1].as_str(),
            Some("résistance 日本語")
        );
    }

    #[test]
    fn test_span_tracking() {
        let input = r#"(layer "Edge.Cuts")"#;
        let parsed = parse(input).unwrap();
        assert_eq!(parsed.span, Span::new(0, input.len()));
        let name = &parsed.as_list().unwrap()[1];
        assert_eq!(&input[name.span.start..name.span.end], "\"Edge.Cuts\"");
    }

    #[test]
    fn test_numeric_lexeme_is_kept() {
        let parsed = parse("(width 0.100000)").unwrap();
        let width = &parsed.as_list().unwrap()[1];
        assert_eq!(width.as_float(), Some(0.1));
        assert_eq!(width.raw_atom.as_deref(), Some("0.100000"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(ParseError::UnexpectedEof));
        assert_eq!(
            parse("(a (b c)"),
            Err(ParseError::UnclosedList { start: 0 })
        );
        assert_eq!(
            parse("(a \"oops)"),
            Err(ParseError::UnterminatedString { start: 3 })
        );
        assert_eq!(
            parse("(a) (b)"),
            Err(ParseError::TrailingInput { offset: 4 })
        );
        assert_eq!(
            parse(")"),
            Err(ParseError::UnexpectedChar {
                found: ')',
                offset: 0
            })
        );
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse(&nested(MAX_DEPTH)).is_ok());
        assert_eq!(
            parse(&nested(MAX_DEPTH + 1)),
            Err(ParseError::TooDeep { offset: MAX_DEPTH })
        );

        let runaway = format!("(kicad_pcb {}", "(".repeat(500_000));
        assert_eq!(
            parse(&runaway),
            Err(ParseError::TooDeep {
                offset: "(kicad_pcb ".len() + MAX_DEPTH - 1
            })
        );
    }

    #[test]
    fn test_parse_all() {
        let all = parse_all("(a) b \"c\"").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].as_sym(), Some("b"));
    }

    #[test]
    fn test_set_child_replaces_or_appends() {
        let mut node = parse("(setup (pad_to_mask_clearance 0))").unwrap();
        node.set_child("pad_to_mask_clearance", 0.05);
        node.set_child("allow_soldermask_bridges_in_footprints", false);

        assert_eq!(node.child_number("pad_to_mask_clearance"), Some(0.05));
        assert_eq!(
            node.child_text("allow_soldermask_bridges_in_footprints"),
            Some("no")
        );
        assert_eq!(node.as_list().unwrap().len(), 3);
    }

    #[test]
    fn test_retain_children_never_drops_tag() {
        let mut node = parse(r#"(kicad_pcb (gr_line (layer "Edge.Cuts")) (gr_text "x") (net 0 ""))"#)
            .unwrap();
        let removed = node.retain_children(|child| child.tag() == Some("net"));
        assert_eq!(removed, 2);
        assert_eq!(node.tag(), Some("kicad_pcb"));
        assert_eq!(node.find_all_lists("net").len(), 1);
    }

    #[test]
    fn test_list_builder() {
        let node = ListBuilder::node("at")
            .push(1.5)
            .push(2i64)
            .push_if(false, 90.0)
            .build();
        assert_eq!(
            node,
            Sexpr::list(vec![Sexpr::symbol("at"), Sexpr::float(1.5), Sexpr::int(2)])
        );
    }
}
