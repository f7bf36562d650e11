use std::fmt;
use serde::Serialize;

use crate::{
    error::ConfigGenError,
    tokenizer::{Token, TokenKind},
    utils::{parse_error, quote},
};

/// The closed set of tags a template may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tag {
    Plist,
    Dict,
    Array,
    Key,
    String,
    Integer,
    Data,
    True,
    False,
    Pointer,
}

impl Tag {
    pub fn from_name(name: &str) -> Option<Tag> {
        Some(match name {
            "plist"   => Tag::Plist,
            "dict"    => Tag::Dict,
            "array"   => Tag::Array,
            "key"     => Tag::Key,
            "string"  => Tag::String,
            "integer" => Tag::Integer,
            "data"    => Tag::Data,
            "true"    => Tag::True,
            "false"   => Tag::False,
            "pointer" => Tag::Pointer,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Plist   => "plist",
            Tag::Dict    => "dict",
            Tag::Array   => "array",
            Tag::Key     => "key",
            Tag::String  => "string",
            Tag::Integer => "integer",
            Tag::Data    => "data",
            Tag::True    => "true",
            Tag::False   => "false",
            Tag::Pointer => "pointer",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag:      Tag,
    pub attrs:    Vec<(String, String)>,
    /// Text before the first child; `None` when empty.
    pub text:     Option<String>,
    pub children: Vec<Element>,
    pub line:     usize,
    pub column:   usize,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Element {
            tag,
            attrs:    Vec::new(),
            text:     None,
            children: Vec::new(),
            line:     0,
            column:   0,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

struct Open {
    element:    Element,
    text:       String,
    seen_child: bool,
}

fn finish(open: Open) -> Element {
    let mut element = open.element;
    if !open.text.is_empty() {
        element.text = Some(open.text);
    }
    element
}

/// Builds the element tree of a whole document. Exactly one root element is
/// allowed; text outside it must be whitespace.
pub fn parse_document(tokens: &[Token]) -> Result<Element, ConfigGenError> {
    let mut stack: Vec<Open> = Vec::new();
    let mut root: Option<Element> = None;

    for token in tokens {
        match &token.kind {
            TokenKind::Open { name, attrs, self_closing } => {
                let tag = Tag::from_name(name).ok_or_else(|| {
                    parse_error(&format!("Unsupported tag <{}>", name), token.line, token.column)
                })?;
                if stack.is_empty() && root.is_some() {
                    return Err(parse_error(
                        &format!("Unexpected second root element <{}>", name),
                        token.line,
                        token.column,
                    ));
                }
                let mut element = Element::new(tag);
                element.attrs = attrs.clone();
                element.line = token.line;
                element.column = token.column;

                if *self_closing {
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.seen_child = true;
                            parent.element.children.push(element);
                        }
                        None => root = Some(element),
                    }
                } else {
                    stack.push(Open { element, text: String::new(), seen_child: false });
                }
            }

            TokenKind::Close { name } => {
                let open = stack.pop().ok_or_else(|| {
                    parse_error(&format!("Unexpected closing tag </{}>", name), token.line, token.column)
                })?;
                if open.element.tag.name() != name {
                    return Err(parse_error(
                        &format!("Expected </{}> but found </{}>", open.element.tag.name(), name),
                        token.line,
                        token.column,
                    ));
                }
                let element = finish(open);
                match stack.last_mut() {
                    Some(parent) => {
                        parent.seen_child = true;
                        parent.element.children.push(element);
                    }
                    None => root = Some(element),
                }
            }

            TokenKind::Text(text) => match stack.last_mut() {
                Some(open) => {
                    if !open.seen_child {
                        open.text.push_str(text);
                    }
                }
                None => {
                    if !text.trim().is_empty() {
                        return Err(parse_error(
                            &format!("Unexpected text {} outside the root element", quote(text.trim())),
                            token.line,
                            token.column,
                        ));
                    }
                }
            },
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(
            &format!("Unclosed tag {}", open.element.tag),
            open.element.line,
            open.element.column,
        ));
    }

    root.ok_or_else(|| parse_error("Document has no root element", 1, 1))
}
