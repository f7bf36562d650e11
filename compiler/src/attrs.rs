use crate::{
    document::Element,
    error::ConfigGenError,
    types::NamePair,
    utils::{quote, structure_error},
};

/// Tracks which attributes of an element the parser has recognized, so that
/// anything left over (usually a typo) can be reported.
pub struct AttrSet<'e> {
    element:  &'e Element,
    consumed: Vec<&'e str>,
}

impl<'e> AttrSet<'e> {
    pub fn new(element: &'e Element) -> Self {
        AttrSet { element, consumed: Vec::new() }
    }

    pub fn take(&mut self, name: &str) -> Option<&'e str> {
        let (key, value) = self.element.attrs.iter().find(|(n, _)| n == name)?;
        if !self.consumed.contains(&key.as_str()) {
            self.consumed.push(key.as_str());
        }
        Some(value.as_str())
    }

    pub fn take_string(&mut self, name: &str) -> Option<String> {
        self.take(name).map(str::to_string)
    }

    /// Reads `name`, `name_h` and `name_c` as one override pair.
    pub fn take_pair(&mut self, name: &str) -> Option<NamePair> {
        let value = self.take(name);
        let h = self.take(&format!("{}_h", name));
        let c = self.take(&format!("{}_c", name));

        if value.is_none() && h.is_none() && c.is_none() {
            return None;
        }

        let pair = NamePair::new(h, c);
        Some(match value {
            Some(value) => pair.with_default_value(value),
            None => pair,
        })
    }

    /// Fails on the first attribute that no rule consumed.
    pub fn finish(self) -> Result<(), ConfigGenError> {
        let leftover: Vec<String> = self
            .element
            .attrs
            .iter()
            .filter(|(name, _)| !self.consumed.contains(&name.as_str()))
            .map(|(name, value)| format!("{}={}", name, quote(value)))
            .collect();

        if leftover.is_empty() {
            Ok(())
        } else {
            Err(structure_error(
                &format!("unhandled attributes {{{}}} in tag {}", leftover.join(", "), self.element.tag),
                self.element.line,
                self.element.column,
            ))
        }
    }
}
