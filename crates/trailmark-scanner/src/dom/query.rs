//! A small CSS selector engine.
//!
//! Supports what the synthesizer emits and what the detectors query with: selector
//! lists, descendant and child combinators, type and universal selectors, `#id`,
//! `.class`, `[attr]`, `[attr="value"]`, `:nth-of-type(n)` and backslash escapes.
//! Everything else is rejected as a syntax error.

use super::{Document, NodeId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid selector '{selector}': {reason}")]
pub struct SelectorSyntaxError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    // combinators[i] joins compounds[i] and compounds[i + 1]
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
struct Compound {
    tag: Option<String>,
    simple: Vec<Simple>,
}

#[derive(Debug, Clone, PartialEq)]
enum Simple {
    Id(String),
    Class(String),
    AttrExists(String),
    AttrEquals(String, String),
    NthOfType(usize),
}

pub fn parse(selector: &str) -> Result<SelectorList, SelectorSyntaxError> {
    Parser::new(selector).parse_list()
}

impl SelectorList {
    pub fn matches<D: Document + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        doc.is_element(node)
            && self
                .selectors
                .iter()
                .any(|s| matches_complex(doc, node, s, s.compounds.len() - 1))
    }

    /// All matching elements in document order, starting at `doc.root()`.
    pub fn select_all<D: Document + ?Sized>(&self, doc: &D) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![doc.root()];
        while let Some(node) = stack.pop() {
            if !doc.is_element(node) {
                continue;
            }
            if self.matches(doc, node) {
                out.push(node);
            }
            let children = doc.element_children(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

fn matches_complex<D: Document + ?Sized>(
    doc: &D,
    node: NodeId,
    selector: &ComplexSelector,
    index: usize,
) -> bool {
    if !matches_compound(doc, node, &selector.compounds[index]) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match selector.combinators[index - 1] {
        Combinator::Child => doc
            .parent(node)
            .is_some_and(|p| matches_complex(doc, p, selector, index - 1)),
        Combinator::Descendant => {
            let mut ancestor = doc.parent(node);
            while let Some(a) = ancestor {
                if matches_complex(doc, a, selector, index - 1) {
                    return true;
                }
                ancestor = doc.parent(a);
            }
            false
        }
    }
}

fn matches_compound<D: Document + ?Sized>(doc: &D, node: NodeId, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag
        && doc.tag_name(node) != *tag
    {
        return false;
    }
    compound.simple.iter().all(|s| match s {
        Simple::Id(id) => doc.attribute(node, "id").as_deref() == Some(id.as_str()),
        Simple::Class(class) => doc.class_list(node).iter().any(|c| c == class),
        Simple::AttrExists(name) => doc.attribute(node, name).is_some(),
        Simple::AttrEquals(name, value) => {
            doc.attribute(node, name).as_deref() == Some(value.as_str())
        }
        Simple::NthOfType(n) => nth_of_type(doc, node) == *n,
    })
}

/// 1-based position of `node` among its parent's element children of the same tag.
pub fn nth_of_type<D: Document + ?Sized>(doc: &D, node: NodeId) -> usize {
    let Some(parent) = doc.parent(node) else {
        return 1;
    };
    let tag = doc.tag_name(node);
    let mut position = 0;
    for sibling in doc.element_children(parent) {
        if doc.tag_name(sibling) == tag {
            position += 1;
        }
        if sibling == node {
            break;
        }
    }
    position
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> SelectorSyntaxError {
        SelectorSyntaxError {
            selector: self.source.to_string(),
            reason: reason.into(),
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

    fn expect(&mut self, expected: char) -> Result<(), SelectorSyntaxError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorSyntaxError> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorSyntaxError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorSyntaxError> {
        let mut tag = None;
        let mut universal = false;
        if self.peek() == Some('*') {
            self.pos += 1;
            universal = true;
        } else if self.at_ident_start() {
            tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }

        let mut simple = Vec::new();
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    simple.push(Simple::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    simple.push(Simple::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    simple.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    simple.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if tag.is_none() && simple.is_empty() && !universal {
            return match self.peek() {
                Some(c) => Err(self.error(format!("unexpected '{}'", c))),
                None => Err(self.error("empty selector")),
            };
        }
        Ok(Compound { tag, simple })
    }

    fn parse_attribute(&mut self) -> Result<Simple, SelectorSyntaxError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        match self.bump() {
            Some(']') => Ok(Simple::AttrExists(name)),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(q @ ('"' | '\'')) => {
                        self.pos += 1;
                        self.parse_string(q)?
                    }
                    _ => self.parse_ident()?,
                };
                self.skip_whitespace();
                self.expect(']')?;
                Ok(Simple::AttrEquals(name, value))
            }
            Some(c) => Err(self.error(format!("unsupported attribute operator '{}'", c))),
            None => Err(self.error("unterminated attribute selector")),
        }
    }

    fn parse_pseudo(&mut self) -> Result<Simple, SelectorSyntaxError> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        if name != "nth-of-type" {
            return Err(self.error(format!("unsupported pseudo-class ':{}'", name)));
        }
        self.expect('(')?;
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let n: usize = digits
            .parse()
            .map_err(|_| self.error("expected a positive integer in :nth-of-type()"))?;
        if n == 0 {
            return Err(self.error(":nth-of-type() index must be positive"));
        }
        self.skip_whitespace();
        self.expect(')')?;
        Ok(Simple::NthOfType(n))
    }

    fn at_ident_start(&self) -> bool {
        match self.peek() {
            Some('-') => match self.peek_at(1) {
                Some('-') => true,
                Some(c) => is_name_start(c) || c == '\\',
                None => false,
            },
            Some('\\') => true,
            Some(c) => is_name_start(c),
            None => false,
        }
    }

    fn parse_ident(&mut self) -> Result<String, SelectorSyntaxError> {
        if !self.at_ident_start() {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected identifier, found '{}'", c)),
                None => self.error("expected identifier, found end of input"),
            });
        }
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.parse_escape()?);
            } else if is_name_char(c) {
                self.pos += 1;
                out.push(c);
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_string(&mut self, quote: char) -> Result<String, SelectorSyntaxError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\n') => return Err(self.error("newline in string")),
                Some('\\') => {
                    // Escaped newline is a line continuation.
                    if self.peek() == Some('\n') {
                        self.pos += 1;
                    } else {
                        out.push(self.parse_escape()?);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    // Called with the backslash already consumed.
    fn parse_escape(&mut self) -> Result<char, SelectorSyntaxError> {
        let Some(first) = self.peek() else {
            return Ok(char::REPLACEMENT_CHARACTER);
        };
        if first == '\n' {
            return Err(self.error("invalid escape"));
        }
        if first.is_ascii_hexdigit() {
            let start = self.pos;
            while self.pos - start < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let hex: String = self.chars[start..self.pos].iter().collect();
            if self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            let code = u32::from_str_radix(&hex, 16).unwrap_or(0);
            return Ok(match char::from_u32(code) {
                Some(c) if code != 0 => c,
                _ => char::REPLACEMENT_CHARACTER,
            });
        }
        self.pos += 1;
        Ok(first)
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}
