use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use tracing::debug;

use crate::{
    attrs::AttrSet,
    document::{Element, Tag},
    emit::echo::Closing,
    error::ConfigGenError,
    naming::{make_child_path, resolve},
    trace::{Console, TraceAttrs},
    types::{Context, NamePair, NodeKind, OutFlags, Prefix, SchemaKind, SchemaNode, Section, TraceFlags},
    utils::{bool_from_str, quote, structure_error},
};

/// Accepts unpadded input and non-zero trailing bits in `<data>` text.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A `<key>` and the naming information it attaches to the following value.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub value:      Option<String>,
    pub node:       NamePair,
    pub this_node:  Option<NamePair>,
    pub child_node: Option<NamePair>,
    pub section:    Option<String>,
}

/// Where a value sits: its key path, the overrides from its key, its output
/// mask and the kind of container around it.
struct Slot {
    path:       Vec<NamePair>,
    child_node: Option<NamePair>,
    this_node:  Option<NamePair>,
    out:        OutFlags,
    context:    Context,
    tab:        usize,
}

fn error_at(element: &Element, msg: &str) -> ConfigGenError {
    structure_error(msg, element.line, element.column)
}

fn expect_tag(element: &Element, tag: Tag) -> Result<(), ConfigGenError> {
    if element.tag != tag {
        return Err(error_at(element, &format!("expected {} but found {}", tag, element.tag)));
    }
    Ok(())
}

/// Applies an `out="[chp]*"` attribute: every stream whose letter is missing
/// is removed from the inherited mask.
pub fn narrow_out(element: &Element, out_attr: Option<&str>, inherited: OutFlags) -> Result<OutFlags, ConfigGenError> {
    let letters = match out_attr {
        None | Some("") => return Ok(inherited),
        Some(letters) => letters.to_lowercase(),
    };

    if let Some(bad) = letters.chars().find(|c| !matches!(c, 'c' | 'h' | 'p')) {
        return Err(error_at(
            element,
            &format!(
                "unknown letter flag '{}' in attr out={}, 'c', 'h' & 'p' are allowed",
                bad,
                quote(&letters)
            ),
        ));
    }

    let mut out = inherited;
    for (letter, flag) in [('c', OutFlags::C), ('h', OutFlags::H), ('p', OutFlags::PLIST)] {
        if !letters.contains(letter) {
            out = out & !flag;
        }
    }
    Ok(out)
}

fn trace_path(path: &[NamePair]) -> String {
    let parts: Vec<String> = path.iter().map(|p| p.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Walks the template element tree and builds the resolved schema tree.
pub struct Parser<'c> {
    prefix:  Prefix,
    console: &'c mut Console,
}

impl<'c> Parser<'c> {
    pub fn new(prefix: Prefix, console: &'c mut Console) -> Self {
        Parser { prefix, console }
    }

    /// Parses `<plist>` and the root dictionary inside it.
    pub fn parse_plist(&mut self, element: &Element, out: OutFlags) -> Result<SchemaNode, ConfigGenError> {
        expect_tag(element, Tag::Plist)?;
        let mut attrs = AttrSet::new(element);
        let out = narrow_out(element, attrs.take("out"), out)?;
        attrs.take("version");
        attrs.finish()?;
        self.console.echo_element(0, element, out, Closing::Open);

        let root = match element.children.as_slice() {
            [root] => root,
            children => {
                return Err(error_at(
                    element,
                    &format!("<plist> must contain exactly one <dict>, found {} children", children.len()),
                ))
            }
        };
        expect_tag(root, Tag::Dict)?;

        let node = self.parse_dict(
            root,
            Slot {
                path:       Vec::new(),
                child_node: None,
                this_node:  None,
                out,
                context:    Context::Map,
                tab:        0,
            },
        )?;

        if node.schema_kind() != SchemaKind::Struct {
            return Err(error_at(
                root,
                &format!("the root <dict> must be a struct, found {}", node.schema_kind()),
            ));
        }

        self.console.echo_close(0, element, out);
        debug!(fields = node.fields().len(), "parsed template root");
        Ok(node)
    }

    fn parse_key(
        &mut self,
        element: &Element,
        path: &[NamePair],
        out: OutFlags,
        tab: usize,
        use_value: bool,
    ) -> Result<(OutFlags, Key), ConfigGenError> {
        expect_tag(element, Tag::Key)?;
        let mut attrs = AttrSet::new(element);
        let use_flags = narrow_out(element, attrs.take("out"), out)?;
        let h = attrs.take("h");
        let c = attrs.take("c");
        let child_node = attrs.take_pair("child");
        let this_node = attrs.take_pair("this");
        let section = attrs.take_string("section");
        attrs.finish()?;
        self.console.echo_element(tab, element, use_flags, Closing::Leaf { quick_close: true });

        let value = if use_value {
            match element.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                Some(text) => Some(text.to_string()),
                None => return Err(error_at(element, "empty <key> in <dict>")),
            }
        } else {
            None
        };

        let mut node = NamePair::new(h, c);
        if let Some(value) = &value {
            node = node.with_default_value(value);
        }
        let this_node = this_node.map(|mut this_node| {
            this_node.merge(&node);
            this_node
        });

        let section = if path.is_empty() {
            section.or_else(|| value.clone())
        } else if section.is_some() {
            return Err(error_at(element, "section attr in tag <key> only expected at level 1 nesting"));
        } else {
            None
        };

        let key = Key { value, node, this_node, child_node, section };

        self.console.key(
            tab,
            &TraceAttrs::new("plist:key")
                .quoted("value", key.value.as_deref())
                .plain("node", Some(&key.node))
                .plain("this_node", key.this_node.as_ref())
                .plain("child_node", key.child_node.as_ref())
                .finish(),
        );

        Ok((use_flags, key))
    }

    /// Any value allowed in a dict or an array. Arrays may not directly hold
    /// arrays.
    fn parse_value(&mut self, element: &Element, slot: Slot, allow_array: bool) -> Result<SchemaNode, ConfigGenError> {
        match element.tag {
            Tag::Dict => self.parse_dict(element, slot),
            Tag::Array if allow_array => self.parse_array(element, slot),
            Tag::Array => Err(error_at(element, "<array> cannot directly contain <array>")),
            Tag::String | Tag::Integer | Tag::Data | Tag::True | Tag::False | Tag::Pointer => {
                if slot.child_node.is_some() {
                    return Err(error_at(
                        element,
                        "child attribute should only be specified in key preceding <array> or <dict>",
                    ));
                }
                self.parse_leaf(element, slot)
            }
            Tag::Key | Tag::Plist => Err(error_at(
                element,
                &format!("unexpected tag {} where a value was expected", element.tag),
            )),
        }
    }

    fn parse_leaf(&mut self, element: &Element, slot: Slot) -> Result<SchemaNode, ConfigGenError> {
        let mut attrs = AttrSet::new(element);
        let out = narrow_out(element, attrs.take("out"), slot.out)?;
        let comment = attrs.take_string("comment");
        let xref = attrs.take_string("xref");

        let (kind, ctype, closing) = match element.tag {
            Tag::Data | Tag::Integer => {
                let (kind, ctype) = self.parse_data(element, &mut attrs)?;
                (kind, ctype, Closing::Leaf { quick_close: false })
            }
            Tag::String => (
                NodeKind::String { default: attrs.take_string("default") },
                "OC_STRING".to_string(),
                Closing::Leaf { quick_close: false },
            ),
            Tag::True | Tag::False => (
                NodeKind::Boolean { default: attrs.take_string("default") },
                "BOOLEAN".to_string(),
                Closing::Leaf { quick_close: true },
            ),
            Tag::Pointer => {
                let ctype = attrs
                    .take_string("type")
                    .ok_or_else(|| error_at(element, "attr type is required on <pointer>"))?;
                (NodeKind::Pointer, ctype, Closing::Leaf { quick_close: true })
            }
            _ => {
                return Err(error_at(
                    element,
                    &format!("unexpected tag for basic type, found {}", element.tag),
                ))
            }
        };
        attrs.finish()?;
        self.console.echo_element(slot.tab, element, out, closing);

        let mut node = SchemaNode::new(kind, slot.path, out, slot.context);
        node.this_node = slot.this_node;
        node.comment = comment;
        node.xref = xref;
        node.assign_reference(NamePair::h_only(&ctype))?;
        self.trace_node(&node, slot.tab);
        Ok(node)
    }

    /// `<data>` and `<integer>`: works out the C type and fixed size.
    fn parse_data(&mut self, element: &Element, attrs: &mut AttrSet<'_>) -> Result<(NodeKind, String), ConfigGenError> {
        let is_integer = element.tag == Tag::Integer;
        let mut size = attrs.take_string("size");
        let mut data_type = attrs.take_string("type");
        let default = attrs.take_string("default");

        let text: Option<String> = element
            .text
            .as_deref()
            .map(|t| t.split_whitespace().collect::<String>())
            .filter(|t| !t.is_empty());

        if data_type.as_deref() == Some("blob") {
            if size.is_some() {
                return Err(error_at(element, "attr size should not be used with attr type=\"blob\""));
            }
        } else if data_type.is_some() && size.is_some() {
            // fully specified
        } else if is_integer {
            data_type.get_or_insert_with(|| "UINT32".to_string());
        } else if let Some(text) = text {
            let bytes = LENIENT_BASE64
                .decode(text.as_bytes())
                .map_err(|e| error_at(element, &format!("invalid base64 content in <data>: {}", e)))?;
            let inferred = data_type.get_or_insert_with(|| {
                match bytes.len() {
                    2 => "UINT16",
                    4 => "UINT32",
                    8 => "UINT64",
                    _ => "UINT8",
                }
                .to_string()
            });
            // a single byte stays scalar
            if size.is_none() && inferred.as_str() == "UINT8" && bytes.len() != 1 {
                size = Some(bytes.len().to_string());
            }
        } else if data_type.is_none() {
            if size.is_some() {
                return Err(error_at(element, "attr size should not be used without type on empty <data> tag"));
            }
            data_type = Some("blob".to_string());
        }

        let data_type = data_type.unwrap_or_default();
        Ok(if data_type == "blob" {
            (NodeKind::Blob, "OC_DATA".to_string())
        } else if is_integer {
            (NodeKind::Integer { size, default }, data_type)
        } else {
            (NodeKind::Data { size, default }, data_type)
        })
    }

    /// Reads `hide`; children are only hidden when reproducing the original.
    fn hide_children(&self, element: &Element, hide: Option<&str>) -> Result<bool, ConfigGenError> {
        let hiding = match hide {
            None => false,
            Some(value) if value.eq_ignore_ascii_case("children") => true,
            Some(value) => {
                return Err(error_at(
                    element,
                    &format!("invalid value for attr hide={} in {}", quote(value), element.tag),
                ))
            }
        };
        Ok(hiding && self.console.is_original())
    }

    fn parse_dict(&mut self, element: &Element, slot: Slot) -> Result<SchemaNode, ConfigGenError> {
        expect_tag(element, Tag::Dict)?;
        let mut attrs = AttrSet::new(element);
        let out = narrow_out(element, attrs.take("out"), slot.out)?;
        let dict_type = attrs.take("type");
        let comment = attrs.take_string("comment");
        let opt = attrs.take("opt");
        let xref = attrs.take_string("xref");
        let suffix = attrs.take_pair("suffix");
        let hide = attrs.take("hide");
        attrs.finish()?;

        let opt = match opt {
            None => None,
            Some(value) => Some(bool_from_str(value).ok_or_else(|| {
                error_at(element, &format!("illegal bool value={} in attr opt", quote(value)))
            })?),
        };

        let hiding = self.hide_children(element, hide)?;
        let use_flags = if hiding {
            self.console.echo_element(slot.tab, element, out, Closing::Hidden);
            out & !OutFlags::PLIST
        } else {
            self.console.echo_element(slot.tab, element, out, Closing::Open);
            out
        };

        let child_path = make_child_path(&slot.path, slot.child_node.as_ref());

        let kind = match dict_type {
            Some("map") => {
                if opt.is_some() {
                    return Err(error_at(element, "attr opt not supported on <dict type=\"map\">"));
                }
                let of = self.parse_map(element, child_path, use_flags, slot.tab)?;
                NodeKind::Map { of: Box::new(of), suffix }
            }
            Some(other) => {
                return Err(error_at(element, &format!("unknown value of attr type={} in <dict>", quote(other))))
            }
            None => {
                let fields = self.parse_struct(element, child_path, use_flags, slot.tab)?;
                NodeKind::Struct { fields, suffix, opt: opt.unwrap_or(false) }
            }
        };

        if !hiding {
            self.console.echo_close(slot.tab, element, out);
        }

        let mut node = SchemaNode::new(kind, slot.path, out, slot.context);
        node.this_node = slot.this_node;
        node.comment = comment;
        node.xref = xref;
        self.finish_container(node, slot.tab)
    }

    /// The single key/value pair of a map; returns the value node.
    fn parse_map(
        &mut self,
        element: &Element,
        child_path: Vec<NamePair>,
        out: OutFlags,
        tab: usize,
    ) -> Result<SchemaNode, ConfigGenError> {
        let (key, value) = match element.children.as_slice() {
            [key, value] => (key, value),
            children => {
                return Err(error_at(
                    element,
                    &format!(
                        "<dict type=\"map\"> must contain exactly one key/value pair, found {} children",
                        children.len()
                    ),
                ))
            }
        };

        let (next_flags, key) = self.parse_key(key, &child_path, out, tab + 1, false)?;
        let mut of = self.parse_value(
            value,
            Slot {
                path:       child_path,
                child_node: None,
                this_node:  None,
                out:        next_flags,
                context:    Context::Map,
                tab:        tab + 1,
            },
            true,
        )?;
        of.section = key.section.map(|title| Section { title, out: next_flags });

        match of.schema_kind() {
            SchemaKind::Blob | SchemaKind::Array | SchemaKind::Map => Ok(of),
            other => Err(error_at(
                value,
                &format!(
                    "unhandled map -> {}; map values must be <data>, <array> or <dict type=\"map\">",
                    other
                ),
            )),
        }
    }

    /// Key/value pairs of a struct, in document order.
    fn parse_struct(
        &mut self,
        element: &Element,
        child_path: Vec<NamePair>,
        out: OutFlags,
        tab: usize,
    ) -> Result<Vec<SchemaNode>, ConfigGenError> {
        let mut fields = Vec::new();

        let mut children = element.children.iter();
        while let Some(key) = children.next() {
            let value = match children.next() {
                Some(value) => value,
                None => {
                    expect_tag(key, Tag::Key)?;
                    return Err(error_at(key, "<key> without a value at the end of <dict>"));
                }
            };

            let (next_flags, key) = self.parse_key(key, &child_path, out, tab + 1, true)?;

            let mut new_path = child_path.clone();
            new_path.push(key.node.clone());

            let mut field = self.parse_value(
                value,
                Slot {
                    path:       new_path,
                    child_node: key.child_node.clone(),
                    this_node:  key.this_node.clone(),
                    out:        next_flags,
                    context:    Context::Struct,
                    tab:        tab + 1,
                },
                true,
            )?;

            if field.schema_kind() == SchemaKind::Map && field.c_ref().is_none() {
                return Err(error_at(
                    value,
                    "a map of <data> cannot be a struct field, it must be the value of another <dict type=\"map\">",
                ));
            }

            field.assign_name(key.value.clone())?;
            field.section = key.section.map(|title| Section { title, out: next_flags });
            self.console.oc_type(
                tab + 1,
                &TraceAttrs::new("oc: ...")
                    .quoted("name", field.name.as_deref())
                    .plain(">>>this_node", field.this_node.as_ref())
                    .finish(),
            );

            fields.push(field);
        }

        Ok(fields)
    }

    fn parse_array(&mut self, element: &Element, slot: Slot) -> Result<SchemaNode, ConfigGenError> {
        expect_tag(element, Tag::Array)?;
        let mut attrs = AttrSet::new(element);
        let out = narrow_out(element, attrs.take("out"), slot.out)?;
        let suffix = attrs.take_pair("suffix");
        let comment = attrs.take_string("comment");
        let xref = attrs.take_string("xref");
        let hide = attrs.take("hide");
        attrs.finish()?;

        let hiding = self.hide_children(element, hide)?;
        let use_flags = if hiding {
            self.console.echo_element(slot.tab, element, out, Closing::Hidden);
            out & !OutFlags::PLIST
        } else {
            self.console.echo_element(slot.tab, element, out, Closing::Open);
            out
        };

        let child_path = make_child_path(&slot.path, slot.child_node.as_ref());

        let (first, rest) = element
            .children
            .split_first()
            .ok_or_else(|| error_at(element, "<array> must contain one child describing its element type"))?;

        let of = self.parse_value(
            first,
            Slot {
                path:       child_path.clone(),
                child_node: None,
                this_node:  None,
                out:        use_flags,
                context:    Context::Array,
                tab:        slot.tab + 1,
            },
            false,
        )?;

        self.skip_entries(rest, &child_path, use_flags, slot.tab)?;

        if !hiding {
            self.console.echo_close(slot.tab, element, out);
        }

        let mut node = SchemaNode::new(NodeKind::Array { of: Box::new(of), suffix }, slot.path, out, slot.context);
        node.this_node = slot.this_node;
        node.comment = comment;
        node.xref = xref;
        self.finish_container(node, slot.tab)
    }

    /// Sample entries after the first array element. They are validated but
    /// only reach the echo, and only when reproducing the original.
    fn skip_entries(
        &mut self,
        entries: &[Element],
        path: &[NamePair],
        out: OutFlags,
        tab: usize,
    ) -> Result<(), ConfigGenError> {
        let use_flags = if self.console.is_original() {
            out & OutFlags::PLIST
        } else {
            if !entries.is_empty() {
                let note = format!(
                    "(suppressing {} item{})",
                    entries.len(),
                    if entries.len() == 1 { "" } else { "s" }
                );
                self.console.echo_note(tab + 1, &note, out);
            }
            OutFlags::NONE
        };

        for entry in entries {
            self.parse_value(
                entry,
                Slot {
                    path:       path.to_vec(),
                    child_node: None,
                    this_node:  None,
                    out:        use_flags,
                    context:    Context::Array,
                    tab:        tab + 1,
                },
                false,
            )?;
        }
        Ok(())
    }

    fn finish_container(&mut self, mut node: SchemaNode, tab: usize) -> Result<SchemaNode, ConfigGenError> {
        self.trace_node(&node, tab);
        resolve(&mut node, &self.prefix)?;
        if let Some(reference) = node.reference() {
            self.console.oc_type(tab, &format!("[oc: ... ref={}]", reference));
        }
        Ok(node)
    }

    fn trace_node(&mut self, node: &SchemaNode, tab: usize) {
        if !self.console.enabled(TraceFlags::OC_TYPES) {
            return;
        }
        let of = match &node.kind {
            NodeKind::Struct { fields, .. } => Some(format!("list[{}]", fields.len())),
            NodeKind::Array { of, .. } | NodeKind::Map { of, .. } => Some(of.schema_kind().to_string()),
            _ => None,
        };
        let line = TraceAttrs::new(&format!("oc:{}", node.schema_kind()))
            .quoted("default", node.default_value())
            .plain("path", Some(trace_path(&node.path)))
            .quoted("size", node.size())
            .plain("of", of)
            .plain("ref", node.reference())
            .plain("context", Some(node.context))
            .quoted("comment", node.comment.as_deref())
            .quoted("xref", node.xref.as_deref())
            .plain("suffix", node.suffix())
            .plain("opt", node.is_opt().then_some(true))
            .plain("out_flags", Some(node.out.0))
            .finish();
        self.console.oc_type(tab, &line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::parse_document, tokenizer::tokenize_xml};

    fn parse_with(text: &str, flags: TraceFlags) -> Result<(SchemaNode, String), ConfigGenError> {
        let element = parse_document(&tokenize_xml(text)?)?;
        let mut console = Console::new(flags);
        let root = Parser::new(Prefix::default(), &mut console).parse_plist(&element, OutFlags::ALL)?;
        Ok((root, console.into_string()))
    }

    fn parse(body: &str) -> Result<SchemaNode, ConfigGenError> {
        parse_with(&format!("<plist version=\"1.0\"><dict>{}</dict></plist>", body), TraceFlags(0)).map(|(r, _)| r)
    }

    fn structure_msg(result: Result<SchemaNode, ConfigGenError>) -> String {
        match result {
            Err(ConfigGenError::Structure { msg, .. }) => msg,
            other => panic!("expected a structure error, got {:?}", other),
        }
    }

    #[test]
    fn test_data_width_inference() {
        let root = parse(
            "<key>Two</key><data>AAA=</data>\
             <key>Four</key><data>AAAAAA==</data>\
             <key>Eight</key><data>AAAAAAAAAAA=</data>\
             <key>One</key><data>AA==</data>\
             <key>Six</key><data>AAAAAAAA</data>\
             <key>Blob</key><data/>\
             <key>Count</key><integer>5</integer>\
             <key>Wide</key><integer type=\"UINT64\"/>",
        )
        .unwrap();

        let types: Vec<(&str, Option<&str>, SchemaKind)> = root
            .fields()
            .iter()
            .map(|f| (f.type_name(), f.size(), f.schema_kind()))
            .collect();
        assert_eq!(
            types,
            vec![
                ("UINT16", None, SchemaKind::Data),
                ("UINT32", None, SchemaKind::Data),
                ("UINT64", None, SchemaKind::Data),
                ("UINT8", None, SchemaKind::Data),
                ("UINT8", Some("6"), SchemaKind::Data),
                ("OC_DATA", None, SchemaKind::Blob),
                ("UINT32", None, SchemaKind::Integer),
                ("UINT64", None, SchemaKind::Integer),
            ]
        );
    }

    #[test]
    fn test_data_attribute_conflicts() {
        assert!(structure_msg(parse("<key>A</key><data type=\"blob\" size=\"4\"/>")).contains("type=\"blob\""));
        assert!(structure_msg(parse("<key>A</key><data size=\"4\"/>")).contains("without type"));
        assert!(structure_msg(parse("<key>A</key><data>!!</data>")).contains("base64"));
    }

    #[test]
    fn test_data_accepts_loose_base64() {
        let root = parse("<key>Unpadded</key><data>AAA</data><key>Trailing</key><data>AAB=</data>").unwrap();
        for field in root.fields() {
            assert_eq!((field.type_name(), field.size()), ("UINT16", None), "{:?}", field.name);
        }
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        for body in [
            "<key>A</key><true defualt=\"1\"/>",
            "<key hh=\"A\">A</key><true/>",
            "<key>A</key><dict suffx=\"X\"/>",
            "<key>A</key><array comments=\"x\"><string/></array>",
            "<key>A</key><pointer type=\"VOID\" size=\"1\"/>",
        ] {
            assert!(structure_msg(parse(body)).contains("unhandled attributes"), "{}", body);
        }
    }

    #[test]
    fn test_key_overrides() {
        let root = parse(
            "<key h=\"DEV_PROP\" child=\"Dev\">DeviceProperties</key>\
             <dict><key>Quirk</key><true/></dict>\
             <key this=\"Tool\">Tools</key>\
             <array><dict><key>Name</key><string/></dict></array>",
        )
        .unwrap();

        let dev = &root.fields()[0];
        assert_eq!(dev.name.as_deref(), Some("DeviceProperties"));
        assert_eq!(dev.path, vec![NamePair::new(Some("DEV_PROP"), Some("DeviceProperties"))]);
        assert_eq!(dev.fields()[0].path[0], NamePair::new(Some("DEV"), Some("Dev")));

        let tools = &root.fields()[1];
        assert_eq!(tools.this_node, Some(NamePair::new(Some("TOOL"), Some("Tool"))));
        assert_eq!(tools.h_ref(), "OC_TOOL_CONFIG_ARRAY");
        assert_eq!(tools.of().unwrap().h_ref(), "OC_TOOLS_CONFIG_ENTRY");
    }

    #[test]
    fn test_child_override_on_leaf_is_rejected() {
        assert!(structure_msg(parse("<key child=\"X\">A</key><true/>")).contains("child attribute"));
    }

    #[test]
    fn test_map_rules() {
        let root = parse(
            "<key>Add</key><dict type=\"map\"><key>Any</key><dict type=\"map\"><key>x</key><data/></dict></dict>",
        )
        .unwrap();
        let add = &root.fields()[0];
        assert_eq!(add.schema_kind(), SchemaKind::Map);
        assert_eq!(add.of().unwrap().type_name(), "OC_ASSOC");

        assert!(structure_msg(parse("<key>M</key><dict type=\"map\"><key>a</key><string/><key>b</key><string/></dict>"))
            .contains("exactly one key/value pair"));
        assert!(structure_msg(parse("<key>M</key><dict type=\"map\"><key>a</key><dict/></dict>"))
            .contains("unhandled map -> struct"));
        assert!(structure_msg(parse("<key>M</key><dict type=\"map\" opt=\"yes\"><key>a</key><data/></dict>"))
            .contains("opt not supported"));
        assert!(structure_msg(parse("<key>M</key><dict type=\"list\"/>")).contains("unknown value"));
        assert!(structure_msg(parse("<key>M</key><dict type=\"map\"><key>a</key><data/></dict>"))
            .contains("cannot be a struct field"));
    }

    #[test]
    fn test_array_rules() {
        assert!(structure_msg(parse("<key>A</key><array/>")).contains("element type"));
        assert!(structure_msg(parse("<key>A</key><array><array><string/></array></array>")).contains("cannot directly contain"));

        let root = parse("<key>A</key><array><pointer type=\"VOID\"/><pointer type=\"VOID\"/></array>").unwrap();
        assert_eq!(root.fields()[0].of().unwrap().type_name(), "VOID");
    }

    #[test]
    fn test_out_attribute_narrows() {
        let root = parse("<key out=\"h\">A</key><true/><key>B</key><true out=\"HC\"/><key out=\"\">C</key><true/>").unwrap();
        assert_eq!(root.fields()[0].out, OutFlags::H);
        assert_eq!(root.fields()[1].out, OutFlags::H | OutFlags::C);
        assert_eq!(root.fields()[2].out, OutFlags::ALL);
        assert!(structure_msg(parse("<key out=\"hx\">A</key><true/>")).contains("unknown letter"));
    }

    #[test]
    fn test_section_only_at_top_level() {
        let root = parse("<key section=\"Misc\">Misc</key><dict/><key>Other</key><true/>").unwrap();
        assert_eq!(root.fields()[0].section.as_ref().map(|s| s.title.as_str()), Some("Misc"));
        assert_eq!(root.fields()[1].section.as_ref().map(|s| s.title.as_str()), Some("Other"));
        assert!(structure_msg(parse("<key>A</key><dict><key section=\"x\">B</key><true/></dict>")).contains("level 1"));
    }

    #[test]
    fn test_section_keeps_key_mask() {
        let root = parse("<key>Misc</key><dict out=\"h\"/><key out=\"p\">Quiet</key><true/>").unwrap();
        let misc = &root.fields()[0];
        assert_eq!(misc.out, OutFlags::H);
        assert_eq!(misc.section.as_ref().map(|s| s.out), Some(OutFlags::ALL));
        assert_eq!(root.fields()[1].section.as_ref().map(|s| s.out), Some(OutFlags::PLIST));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(structure_msg(parse("<key></key><true/>")).contains("empty <key>"));
        assert!(structure_msg(parse("<key>  </key><true/>")).contains("empty <key>"));
    }

    #[test]
    fn test_root_must_be_struct() {
        for text in [
            "<plist><dict type=\"map\"><key>x</key><data/></dict></plist>",
            "<plist><dict type=\"map\"><key>x</key><array><string/></array></dict></plist>",
        ] {
            let msg = match parse_with(text, TraceFlags(0)) {
                Err(ConfigGenError::Structure { msg, .. }) => msg,
                other => panic!("expected a structure error, got {:?}", other),
            };
            assert!(msg.contains("root <dict> must be a struct"), "{}", msg);
        }
    }

    #[test]
    fn test_skipped_entries_are_suppressed() {
        let text = "<plist><dict><key>A</key><array><string/><string>x</string><string>y</string></array></dict></plist>";
        let (_, echo) = parse_with(text, TraceFlags::XML).unwrap();
        assert!(echo.contains("\t\t(suppressing 2 items)\n"), "{}", echo);
        assert!(!echo.contains("<string>x</string>"), "{}", echo);

        let (_, original) = parse_with(text, TraceFlags::XML | TraceFlags::ORIGINAL).unwrap();
        assert!(original.contains("\t\t<string>x</string>\n"), "{}", original);
    }

    #[test]
    fn test_hide_children_only_in_original_mode() {
        let text = "<plist><dict><key>A</key><dict hide=\"Children\"><key>B</key><true/></dict></dict></plist>";
        let (_, echo) = parse_with(text, TraceFlags::XML).unwrap();
        assert!(echo.contains("<key>B</key>"), "{}", echo);

        let (root, original) = parse_with(text, TraceFlags::XML | TraceFlags::ORIGINAL).unwrap();
        assert!(original.contains("\t<dict/>\n"), "{}", original);
        assert!(!original.contains("<key>B</key>"), "{}", original);
        assert_eq!(root.fields()[0].fields().len(), 1);

        assert!(structure_msg(parse("<key>A</key><dict hide=\"all\"/>")).contains("hide"));
    }

    #[test]
    fn test_trace_channels() {
        let text = "<plist><dict><key>Foo</key><true/></dict></plist>";
        let (_, trace) = parse_with(text, TraceFlags::KEYS | TraceFlags::OC_TYPES).unwrap();
        assert!(trace.contains("\t[plist:key value=\"Foo\" node=FOO/Foo]\n"), "{}", trace);
        assert!(trace.contains("[oc:boolean path=[FOO/Foo] ref=BOOLEAN/- context=struct out_flags=7]"), "{}", trace);
        assert!(trace.contains("[oc: ... ref=OC_GLOBAL_CONFIG/mRootConfigurationNodes]"), "{}", trace);
    }
}
