use regex::{Captures, Regex};
use lazy_static::lazy_static;
use crate::utils::{quote, parse_error};
use crate::error::ConfigGenError;

lazy_static! {
    pub static ref TOKEN_REGEX: Regex = Regex::new(
        r#"(?s)(<\?.*?\?>|<!--.*?-->|<![A-Za-z][^>]*>|</\s*[A-Za-z_][\w.:-]*\s*>|<[A-Za-z_][\w.:-]*(?:\s+[A-Za-z_][\w.:-]*\s*=\s*(?:"[^"]*"|'[^']*'))*\s*/?>|[^<]+)"#
    ).unwrap();
    static ref OPEN_TAG:   Regex = Regex::new(r"(?s)^<([A-Za-z_][\w.:-]*)(.*?)(/?)>$").unwrap();
    static ref CLOSE_TAG:  Regex = Regex::new(r"^</\s*([A-Za-z_][\w.:-]*)\s*>$").unwrap();
    static ref ATTRIBUTE:  Regex = Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref ENTITY:     Regex = Regex::new(r"&(#x[0-9A-Fa-f]+|#[0-9]+|lt|gt|amp|quot|apos);").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Open {
        name:         String,
        attrs:        Vec<(String, String)>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind:   TokenKind,
    pub line:   usize,
    pub column: usize,
}

/// Replaces the predefined XML entities and character references.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if entity.starts_with("#x") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Inverse of `decode_entities` for the characters that cannot appear raw.
pub fn encode_entities(text: &str, in_attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn open_tag(part: &str, line: usize, column: usize) -> Result<TokenKind, ConfigGenError> {
    let caps = OPEN_TAG
        .captures(part)
        .ok_or_else(|| parse_error(&format!("Malformed tag {}", quote(part)), line, column))?;

    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in ATTRIBUTE.captures_iter(&caps[2]) {
        let name = attr[1].to_string();
        let raw = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str()).unwrap_or("");
        if attrs.iter().any(|(existing, _)| *existing == name) {
            return Err(parse_error(
                &format!("Duplicate attribute {} in tag <{}>", quote(&name), &caps[1]),
                line,
                column,
            ));
        }
        attrs.push((name, decode_entities(raw)));
    }

    Ok(TokenKind::Open {
        name:         caps[1].to_string(),
        attrs,
        self_closing: !caps[3].is_empty(),
    })
}

/// Splits XML text into element and text tokens. Declarations, doctypes and
/// comments are consumed but produce no token.
pub fn tokenize_xml(text: &str) -> Result<Vec<Token>, ConfigGenError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    for mat in TOKEN_REGEX.find_iter(text) {
        let start = mat.start();
        let end   = mat.end();
        let part  = mat.as_str();

        if start > last_end {
            let unexpected = &text[last_end..start];
            return Err(parse_error(
                &format!("Syntax error: {}", quote(unexpected)),
                line,
                column,
            ));
        }

        let kind = if part.starts_with("<?") || part.starts_with("<!") {
            None
        } else if let Some(caps) = CLOSE_TAG.captures(part) {
            Some(TokenKind::Close { name: caps[1].to_string() })
        } else if part.starts_with('<') {
            Some(open_tag(part, line, column)?)
        } else {
            Some(TokenKind::Text(decode_entities(part)))
        };

        if let Some(kind) = kind {
            tokens.push(Token { kind, line, column });
        }

        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }

        last_end = end;
    }

    if last_end != text.len() {
        let unexpected = &text[last_end..];
        return Err(parse_error(
            &format!("Syntax error: {}", quote(unexpected)),
            line,
            column,
        ));
    }

    Ok(tokens)
}
