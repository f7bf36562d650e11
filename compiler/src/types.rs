use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use serde::Serialize;

use crate::{error::ConfigGenError, utils::internal_error};

/// Symbolic (`h`, used in `.h` macros) and source (`c`, used in `.c` tables)
/// halves of a generated identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamePair {
    pub h: Option<String>,
    pub c: Option<String>,
}

impl NamePair {
    pub fn new(h: Option<&str>, c: Option<&str>) -> Self {
        NamePair {
            h: h.map(str::to_string),
            c: c.map(str::to_string),
        }
    }

    pub fn h_only(h: &str) -> Self {
        NamePair::new(Some(h), None)
    }

    /// Fills absent halves from `value`, upper-casing it for the `h` half.
    pub fn with_default_value(mut self, value: &str) -> Self {
        if self.h.is_none() {
            self.h = Some(value.to_uppercase());
        }
        if self.c.is_none() {
            self.c = Some(value.to_string());
        }
        self
    }

    /// Fills absent halves from `other`.
    pub fn merge(&mut self, other: &NamePair) {
        if self.h.is_none() {
            self.h = other.h.clone();
        }
        if self.c.is_none() {
            self.c = other.c.clone();
        }
    }

    /// Joins a path: `h` halves with `_`, `c` halves back to back. Absent and
    /// empty halves are skipped, so joining is associative.
    pub fn join<'a, I>(path: I) -> NamePair
    where
        I: IntoIterator<Item = &'a NamePair>,
    {
        let mut h: Vec<&str> = Vec::new();
        let mut c = String::new();
        for pair in path {
            if let Some(part) = pair.h.as_deref().filter(|s| !s.is_empty()) {
                h.push(part);
            }
            if let Some(part) = pair.c.as_deref() {
                c.push_str(part);
            }
        }
        NamePair {
            h: if h.is_empty() { None } else { Some(h.join("_")) },
            c: if c.is_empty() { None } else { Some(c) },
        }
    }
}

impl fmt::Display for NamePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.h.as_deref().unwrap_or("-"),
            self.c.as_deref().unwrap_or("-")
        )
    }
}

/// Which generated artifacts a node contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutFlags(pub u32);

impl OutFlags {
    pub const NONE:  OutFlags = OutFlags(0x0);
    pub const PLIST: OutFlags = OutFlags(0x1);
    pub const C:     OutFlags = OutFlags(0x2);
    pub const H:     OutFlags = OutFlags(0x4);
    pub const ALL:   OutFlags = OutFlags(0x7);

    pub fn contains(self, other: OutFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OutFlags {
    type Output = OutFlags;
    fn bitor(self, rhs: OutFlags) -> OutFlags {
        OutFlags(self.0 | rhs.0)
    }
}

impl BitAnd for OutFlags {
    type Output = OutFlags;
    fn bitand(self, rhs: OutFlags) -> OutFlags {
        OutFlags(self.0 & rhs.0)
    }
}

impl Not for OutFlags {
    type Output = OutFlags;
    fn not(self) -> OutFlags {
        OutFlags(!self.0 & OutFlags::ALL.0)
    }
}

/// Console channels selected with `-f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceFlags(pub u32);

impl TraceFlags {
    pub const XML:      TraceFlags = TraceFlags(0x01);
    pub const KEYS:     TraceFlags = TraceFlags(0x02);
    pub const OC_TYPES: TraceFlags = TraceFlags(0x04);
    pub const DEBUG:    TraceFlags = TraceFlags(0x08);
    pub const CONTEXT:  TraceFlags = TraceFlags(0x10);
    pub const ORIGINAL: TraceFlags = TraceFlags(0x20);

    pub fn contains(self, other: TraceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parses `0x..` hex or plain decimal.
    pub fn parse(text: &str) -> Option<TraceFlags> {
        let text = text.trim();
        let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => text.parse::<u32>().ok()?,
        };
        Some(TraceFlags(value))
    }
}

impl Default for TraceFlags {
    fn default() -> Self {
        TraceFlags::XML
    }
}

impl BitOr for TraceFlags {
    type Output = TraceFlags;
    fn bitor(self, rhs: TraceFlags) -> TraceFlags {
        TraceFlags(self.0 | rhs.0)
    }
}

/// Application prefix in both spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prefix {
    pub camel: String,
    pub upper: String,
}

impl Prefix {
    pub const DEFAULT: &'static str = "Oc";

    pub fn new(camel: &str) -> Self {
        Prefix {
            camel: camel.to_string(),
            upper: camel.to_uppercase(),
        }
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Prefix::new(Prefix::DEFAULT)
    }
}

/// The container a node sits in; it picks the default reference suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Struct,
    Array,
    Map,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Context::Struct => "struct",
            Context::Array  => "array",
            Context::Map    => "map",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Boolean,
    Blob,
    Data,
    Integer,
    Array,
    Map,
    Struct,
    Pointer,
}

impl SchemaKind {
    /// Suffix of the `OC_SCHEMA_*` macro family for this kind.
    pub fn oc_schema_type(self) -> &'static str {
        match self {
            SchemaKind::String  => "STRING",
            SchemaKind::Boolean => "BOOLEAN",
            SchemaKind::Blob    => "DATA",
            SchemaKind::Data    => "DATAF",
            SchemaKind::Integer => "INTEGER",
            SchemaKind::Array   => "ARRAY",
            SchemaKind::Map     => "MAP",
            SchemaKind::Struct  => "DICT",
            SchemaKind::Pointer => "POINTER",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, SchemaKind::Array | SchemaKind::Map | SchemaKind::Struct)
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemaKind::String  => "string",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Blob    => "blob",
            SchemaKind::Data    => "data",
            SchemaKind::Integer => "integer",
            SchemaKind::Array   => "array",
            SchemaKind::Map     => "map",
            SchemaKind::Struct  => "struct",
            SchemaKind::Pointer => "pointer",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    String {
        default: Option<String>,
    },
    Boolean {
        default: Option<String>,
    },
    Blob,
    Data {
        size:    Option<String>,
        default: Option<String>,
    },
    Integer {
        size:    Option<String>,
        default: Option<String>,
    },
    Pointer,
    Array {
        of:     Box<SchemaNode>,
        suffix: Option<NamePair>,
    },
    Map {
        of:     Box<SchemaNode>,
        suffix: Option<NamePair>,
    },
    Struct {
        fields: Vec<SchemaNode>,
        suffix: Option<NamePair>,
        opt:    bool,
    },
}

/// Banner opened by a top-level key, gated by the key's own output mask.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: String,
    pub out:   OutFlags,
}

/// One resolved element of the configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    #[serde(flatten)]
    pub kind:      NodeKind,
    pub path:      Vec<NamePair>,
    pub out:       OutFlags,
    pub context:   Context,
    pub name:      Option<String>,
    pub this_node: Option<NamePair>,
    pub section:   Option<Section>,
    pub comment:   Option<String>,
    pub xref:      Option<String>,
    reference:     Option<NamePair>,
}

impl SchemaNode {
    pub fn new(kind: NodeKind, path: Vec<NamePair>, out: OutFlags, context: Context) -> Self {
        SchemaNode {
            kind,
            path,
            out,
            context,
            name:      None,
            this_node: None,
            section:   None,
            comment:   None,
            xref:      None,
            reference: None,
        }
    }

    pub fn schema_kind(&self) -> SchemaKind {
        match self.kind {
            NodeKind::String { .. }  => SchemaKind::String,
            NodeKind::Boolean { .. } => SchemaKind::Boolean,
            NodeKind::Blob           => SchemaKind::Blob,
            NodeKind::Data { .. }    => SchemaKind::Data,
            NodeKind::Integer { .. } => SchemaKind::Integer,
            NodeKind::Pointer        => SchemaKind::Pointer,
            NodeKind::Array { .. }   => SchemaKind::Array,
            NodeKind::Map { .. }     => SchemaKind::Map,
            NodeKind::Struct { .. }  => SchemaKind::Struct,
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::String { default }
            | NodeKind::Boolean { default }
            | NodeKind::Data { default, .. }
            | NodeKind::Integer { default, .. } => default.as_deref(),
            _ => None,
        }
    }

    pub fn size(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Data { size, .. } | NodeKind::Integer { size, .. } => size.as_deref(),
            _ => None,
        }
    }

    pub fn suffix(&self) -> Option<&NamePair> {
        match &self.kind {
            NodeKind::Array { suffix, .. }
            | NodeKind::Map { suffix, .. }
            | NodeKind::Struct { suffix, .. } => suffix.as_ref(),
            _ => None,
        }
    }

    /// Element of an array or value of a map.
    pub fn of(&self) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Array { of, .. } | NodeKind::Map { of, .. } => Some(of),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[SchemaNode] {
        match &self.kind {
            NodeKind::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn is_opt(&self) -> bool {
        matches!(self.kind, NodeKind::Struct { opt: true, .. })
    }

    pub fn reference(&self) -> Option<&NamePair> {
        self.reference.as_ref()
    }

    /// Sets the reference; a node gets exactly one.
    pub fn assign_reference(&mut self, reference: NamePair) -> Result<(), ConfigGenError> {
        if let Some(existing) = &self.reference {
            return Err(internal_error(&format!(
                "reference should not get set more than once on {} node (had {}, got {})",
                self.schema_kind(),
                existing,
                reference
            )));
        }
        self.reference = Some(reference);
        Ok(())
    }

    /// Sets the field name taken from the preceding key.
    pub fn assign_name(&mut self, name: Option<String>) -> Result<(), ConfigGenError> {
        if self.name.is_some() {
            return Err(internal_error("name should not get set more than once on a schema node"));
        }
        self.name = name;
        Ok(())
    }

    /// Type name used at use sites: the xref when given, else the `h` reference.
    pub fn type_name(&self) -> &str {
        self.xref
            .as_deref()
            .or_else(|| self.reference.as_ref().and_then(|r| r.h.as_deref()))
            .unwrap_or("")
    }

    /// `c` half of the reference, if the node has one.
    pub fn c_ref(&self) -> Option<&str> {
        self.reference.as_ref().and_then(|r| r.c.as_deref())
    }

    /// `h` half of the reference, ignoring any xref.
    pub fn h_ref(&self) -> &str {
        self.reference.as_ref().and_then(|r| r.h.as_deref()).unwrap_or("")
    }

    /// Depth of the node below the root dictionary.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}
