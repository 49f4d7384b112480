//! CSS selector parsing and matching.
//!
//! Supports selector lists, the four combinators, type/universal/id/class and
//! attribute selectors (all operators plus the `i` flag) and the structural
//! and form pseudo-classes that show up in form locators.

use super::{Document, NodeId, NodeKind};

/// Selector parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("unexpected end of selector")]
    UnexpectedEnd,

    #[error("unsupported pseudo-class :{0}")]
    UnsupportedPseudo(String),

    #[error("invalid nth expression {0:?}")]
    InvalidNth(String),
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    /// Compounds left to right.
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: String,
    op: Option<(AttrOp, String)>,
    case_insensitive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
enum Pseudo {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
    Checked,
    Disabled,
    Enabled,
    Empty,
    Not(Vec<Complex>),
}

/// `an+b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nth {
    a: i64,
    b: i64,
}

impl Nth {
    fn parse(text: &str) -> Result<Self, SelectorError> {
        let invalid = || SelectorError::InvalidNth(text.to_string());
        let s: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let s = s.to_ascii_lowercase();
        match s.as_str() {
            "odd" => return Ok(Self { a: 2, b: 1 }),
            "even" => return Ok(Self { a: 2, b: 0 }),
            "" => return Err(invalid()),
            _ => {}
        }
        let Some(n_at) = s.find('n') else {
            let b = s.parse::<i64>().map_err(|_| invalid())?;
            return Ok(Self { a: 0, b });
        };
        let a = match &s[..n_at] {
            "" | "+" => 1,
            "-" => -1,
            coeff => coeff.parse::<i64>().map_err(|_| invalid())?,
        };
        let rest = &s[n_at + 1..];
        let b = if rest.is_empty() {
            0
        } else {
            let digits = rest.strip_prefix('+').unwrap_or(rest);
            if !rest.starts_with(['+', '-']) {
                return Err(invalid());
            }
            digits.parse::<i64>().map_err(|_| invalid())?
        };
        Ok(Self { a, b })
    }

    /// Whether the 1-based `position` is `a*n + b` for some `n >= 0`.
    fn matches(self, position: usize) -> bool {
        // Widened so extreme coefficients cannot overflow.
        let (a, b, p) = (i128::from(self.a), i128::from(self.b), position as i128);
        if a == 0 {
            return p == b;
        }
        let diff = p - b;
        diff % a == 0 && diff / a >= 0
    }
}

impl Selector {
    /// Parse a selector list such as `form input[type="email"], #name`.
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser::new(text);
        let alternatives = parser.selector_list()?;
        parser.skip_whitespace();
        if let Some(found) = parser.peek() {
            return Err(SelectorError::Unexpected {
                found,
                offset: parser.pos,
            });
        }
        Ok(Self { alternatives })
    }

    /// Whether `node` matches any selector in the list.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_element(node) && self.alternatives.iter().any(|c| c.matches(doc, node))
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// --- matching ---

impl Complex {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.matches_at(doc, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, doc: &Document, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(doc, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent_element(node)
                .is_some_and(|p| self.matches_at(doc, p, index - 1)),
            Combinator::Descendant => {
                let mut current = doc.parent_element(node);
                while let Some(ancestor) = current {
                    if self.matches_at(doc, ancestor, index - 1) {
                        return true;
                    }
                    current = doc.parent_element(ancestor);
                }
                false
            }
            Combinator::NextSibling => previous_siblings(doc, node)
                .last()
                .is_some_and(|s| self.matches_at(doc, *s, index - 1)),
            Combinator::SubsequentSibling => previous_siblings(doc, node)
                .iter()
                .any(|s| self.matches_at(doc, *s, index - 1)),
        }
    }
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag_name(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class = doc.attr(node, "class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|c| class.split_ascii_whitespace().any(|have| have == c.as_str()))
            {
                return false;
            }
        }
        self.attrs.iter().all(|a| a.matches(doc, node))
            && self.pseudos.iter().all(|p| p.matches(doc, node))
    }
}

impl AttrSelector {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(actual) = doc.attr(node, &self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.op else {
            return true;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_ascii_lowercase(), expected.to_ascii_lowercase())
        } else {
            (actual.to_string(), expected.clone())
        };
        match op {
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => {
                !expected.is_empty() && actual.split_ascii_whitespace().any(|w| w == expected)
            }
            AttrOp::DashMatch => {
                actual == expected || actual.starts_with(&format!("{}-", expected))
            }
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

impl Pseudo {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        match self {
            Pseudo::FirstChild => Nth { a: 0, b: 1 }.matches(child_position(doc, node, false, false)),
            Pseudo::LastChild => Nth { a: 0, b: 1 }.matches(child_position(doc, node, false, true)),
            Pseudo::OnlyChild => sibling_elements(doc, node).len() == 1,
            Pseudo::FirstOfType => child_position(doc, node, true, false) == 1,
            Pseudo::LastOfType => child_position(doc, node, true, true) == 1,
            Pseudo::OnlyOfType => {
                child_position(doc, node, true, false) == 1
                    && child_position(doc, node, true, true) == 1
            }
            Pseudo::NthChild(nth) => nth.matches(child_position(doc, node, false, false)),
            Pseudo::NthLastChild(nth) => nth.matches(child_position(doc, node, false, true)),
            Pseudo::NthOfType(nth) => nth.matches(child_position(doc, node, true, false)),
            Pseudo::NthLastOfType(nth) => nth.matches(child_position(doc, node, true, true)),
            Pseudo::Checked => match doc.tag_name(node) {
                Some("input") => doc.is_checkable(node) && doc.checked(node),
                Some("option") => doc.element(node).is_some_and(|el| el.selected),
                _ => false,
            },
            Pseudo::Disabled => is_disabled(doc, node),
            Pseudo::Enabled => is_disableable(doc, node) && !is_disabled(doc, node),
            Pseudo::Empty => doc.children(node).iter().all(|c| {
                doc.node(*c).is_some_and(|n| match &n.kind {
                    NodeKind::Comment => true,
                    NodeKind::Text(t) => t.is_empty(),
                    _ => false,
                })
            }),
            Pseudo::Not(list) => !list.iter().any(|c| c.matches(doc, node)),
        }
    }
}

/// Element siblings of `node` including itself. A parentless element is its
/// own only sibling.
fn sibling_elements(doc: &Document, node: NodeId) -> Vec<NodeId> {
    match doc.parent(node) {
        Some(parent) => doc.element_children(parent),
        None => vec![node],
    }
}

fn previous_siblings(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let siblings = sibling_elements(doc, node);
    let index = siblings.iter().position(|s| *s == node).unwrap_or(0);
    siblings[..index].to_vec()
}

/// 1-based position among element siblings, optionally restricted to the
/// same tag and counted from the end.
fn child_position(doc: &Document, node: NodeId, same_type: bool, from_end: bool) -> usize {
    let tag = doc.tag_name(node);
    let mut siblings: Vec<NodeId> = sibling_elements(doc, node)
        .into_iter()
        .filter(|s| !same_type || doc.tag_name(*s) == tag)
        .collect();
    if from_end {
        siblings.reverse();
    }
    siblings.iter().position(|s| *s == node).map_or(0, |i| i + 1)
}

fn is_disableable(doc: &Document, node: NodeId) -> bool {
    matches!(
        doc.tag_name(node),
        Some("input" | "select" | "textarea" | "button" | "option" | "optgroup" | "fieldset")
    )
}

fn is_disabled(doc: &Document, node: NodeId) -> bool {
    if !is_disableable(doc, node) {
        return false;
    }
    if doc.has_attr(node, "disabled") {
        return true;
    }
    let mut current = doc.parent_element(node);
    while let Some(ancestor) = current {
        if matches!(doc.tag_name(ancestor), Some("fieldset" | "optgroup" | "select"))
            && doc.has_attr(ancestor, "disabled")
        {
            return true;
        }
        current = doc.parent_element(ancestor);
    }
    false
}

// --- parsing ---

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                found,
                offset: self.pos,
            },
            None => SelectorError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), SelectorError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn selector_list(&mut self) -> Result<Vec<Complex>, SelectorError> {
        let mut list = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek().is_none() && list.is_empty() {
                return Err(SelectorError::Empty);
            }
            list.push(self.complex()?);
            self.skip_whitespace();
            if self.peek() == Some(',') {
                self.pos += 1;
                continue;
            }
            return Ok(list);
        }
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(',' | ')') | None => return Ok(Complex { compounds, combinators }),
                Some(_) if had_space => {
                    combinators.push(Combinator::Descendant);
                    compounds.push(self.compound()?);
                    continue;
                }
                Some(_) => return Err(self.unexpected()),
            };
            self.pos += 1;
            self.skip_whitespace();
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut any = false;

        if self.peek() == Some('*') {
            self.pos += 1;
            any = true;
        } else if self.at_ident_start() {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
            any = true;
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.pseudo()?);
                }
                _ => break,
            }
            any = true;
        }

        if !any {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match (self.peek(), self.peek_at(1)) {
            (Some(']'), _) => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: None,
                    case_insensitive: false,
                });
            }
            (Some('='), _) => {
                self.pos += 1;
                AttrOp::Equals
            }
            (Some(c), Some('=')) => {
                let op = match c {
                    '~' => AttrOp::Includes,
                    '|' => AttrOp::DashMatch,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Substring,
                    _ => return Err(self.unexpected()),
                };
                self.pos += 2;
                op
            }
            _ => return Err(self.unexpected()),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some('"' | '\'') => self.string()?,
            _ => self.ident()?,
        };
        self.skip_whitespace();

        let mut case_insensitive = false;
        if let Some(flag @ ('i' | 'I' | 's' | 'S')) = self.peek() {
            case_insensitive = flag.eq_ignore_ascii_case(&'i');
            self.pos += 1;
            self.skip_whitespace();
        }
        self.expect(']')?;

        Ok(AttrSelector {
            name,
            op: Some((op, value)),
            case_insensitive,
        })
    }

    fn pseudo(&mut self) -> Result<Pseudo, SelectorError> {
        let name = self.ident()?.to_ascii_lowercase();
        let pseudo = match name.as_str() {
            "first-child" => Pseudo::FirstChild,
            "last-child" => Pseudo::LastChild,
            "only-child" => Pseudo::OnlyChild,
            "first-of-type" => Pseudo::FirstOfType,
            "last-of-type" => Pseudo::LastOfType,
            "only-of-type" => Pseudo::OnlyOfType,
            "checked" => Pseudo::Checked,
            "disabled" => Pseudo::Disabled,
            "enabled" => Pseudo::Enabled,
            "empty" => Pseudo::Empty,
            "nth-child" => Pseudo::NthChild(self.nth_argument()?),
            "nth-last-child" => Pseudo::NthLastChild(self.nth_argument()?),
            "nth-of-type" => Pseudo::NthOfType(self.nth_argument()?),
            "nth-last-of-type" => Pseudo::NthLastOfType(self.nth_argument()?),
            "not" => {
                self.expect('(')?;
                let list = self.selector_list()?;
                self.skip_whitespace();
                self.expect(')')?;
                Pseudo::Not(list)
            }
            _ => return Err(SelectorError::UnsupportedPseudo(name)),
        };
        Ok(pseudo)
    }

    fn nth_argument(&mut self) -> Result<Nth, SelectorError> {
        self.expect('(')?;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ')') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.expect(')')?;
        Nth::parse(&text)
    }

    fn at_ident_start(&self) -> bool {
        let is_start = |c: char| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii();
        match self.peek() {
            Some('-') => match self.peek_at(1) {
                Some('-') => true,
                Some('\\') => true,
                Some(c) => is_start(c),
                None => false,
            },
            Some('\\') => self.peek_at(1).is_some_and(|c| c != '\n'),
            Some(c) => is_start(c),
            None => false,
        }
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        if !self.at_ident_start() {
            return Err(self.unexpected());
        }
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.escape()?);
            } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn string(&mut self) -> Result<String, SelectorError> {
        let quote = self.bump().ok_or(SelectorError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(SelectorError::UnexpectedEnd),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.peek() {
                    // Escaped newline is a line continuation.
                    Some('\n') => self.pos += 1,
                    Some(_) => out.push(self.escape()?),
                    None => return Err(SelectorError::UnexpectedEnd),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Decode an escape; the backslash is already consumed.
    fn escape(&mut self) -> Result<char, SelectorError> {
        let first = self.peek().ok_or(SelectorError::UnexpectedEnd)?;
        if !first.is_ascii_hexdigit() {
            self.pos += 1;
            return Ok(first);
        }
        let start = self.pos;
        while self.pos - start < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        let hex: String = self.chars[start..self.pos].iter().collect();
        if self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
        Ok(match code {
            0 => '\u{FFFD}',
            _ => char::from_u32(code).unwrap_or('\u{FFFD}'),
        })
    }
}

/// Escape a string for use as a CSS identifier, following `CSS.escape()`.
pub fn css_escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if code == 0 {
            out.push('\u{FFFD}');
        } else if (0x1..=0x1F).contains(&code)
            || code == 0x7F
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}
