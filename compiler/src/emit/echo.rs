//! Echo of the template as the parser understood it.
//!
//! By default every element and attribute the parser accepted is written
//! back, one tab per nesting level. In reproduce-original mode the generator
//! annotations are dropped so the output is the plain plist again.

use crate::{
    document::Element,
    tokenizer::encode_entities,
    trace::Console,
    types::{OutFlags, TraceFlags},
};

/// Attribute that survives in reproduce-original mode.
const ORIGINAL_ATTRIBUTES: [&str; 1] = ["version"];

/// How an echoed element ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closing {
    /// `<tag ...>`, children and a closing tag follow.
    Open,
    /// `<tag ...>text</tag>`; `quick_close` turns an empty element into `<tag/>`.
    Leaf { quick_close: bool },
    /// `<tag .../>` regardless of content.
    Hidden,
}

impl Console {
    fn echoes(&self, out: OutFlags) -> bool {
        self.enabled(TraceFlags::XML) && out.contains(OutFlags::PLIST)
    }

    /// Writes the element's tag with its attributes in source order.
    pub fn echo_element(&mut self, tab: usize, element: &Element, out: OutFlags, closing: Closing) {
        if !self.echoes(out) {
            return;
        }

        let mut text = format!("<{}", element.tag.name());
        let original = self.is_original();
        for (name, value) in &element.attrs {
            if !original || ORIGINAL_ATTRIBUTES.contains(&name.as_str()) {
                text.push_str(&format!(" {}=\"{}\"", name, encode_entities(value, true)));
            }
        }

        match closing {
            Closing::Open => text.push('>'),
            Closing::Hidden => text.push_str("/>"),
            Closing::Leaf { quick_close } => match &element.text {
                None if quick_close => text.push_str("/>"),
                content => {
                    let content = content.as_deref().map(|t| encode_entities(t, false)).unwrap_or_default();
                    text.push_str(&format!(">{}</{}>", content, element.tag.name()));
                }
            },
        }

        self.indent(tab);
        self.write(&text);
        self.write("\n");
    }

    pub fn echo_close(&mut self, tab: usize, element: &Element, out: OutFlags) {
        if self.echoes(out) {
            self.indent(tab);
            self.write(&format!("</{}>\n", element.tag.name()));
        }
    }

    pub fn echo_note(&mut self, tab: usize, note: &str, out: OutFlags) {
        if self.echoes(out) {
            self.indent(tab);
            self.write(note);
            self.write("\n");
        }
    }

    /// Raw lines of the input that precede the root element.
    pub fn echo_header(&mut self, source: &str, out: OutFlags) {
        if self.echoes(out) && self.is_original() {
            for line in source.lines().take(2) {
                self.write(line);
                self.write("\n");
            }
        }
    }
}
