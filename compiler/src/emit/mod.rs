//! C generation from the resolved schema tree.
//!
//! Three streams are produced: the `.h` field-list macros, the `.c`
//! constructor/destructor declarations and the `.c` schema tables. Children
//! are emitted before their container so every table a container refers to
//! is already defined.

pub mod columns;
pub mod echo;

use serde::Serialize;
use tracing::debug;

use crate::{
    error::ConfigGenError,
    naming::resolve_suffix,
    trace::Console,
    types::{Context, NodeKind, OutFlags, Prefix, SchemaKind, SchemaNode},
    utils::internal_error,
};
use columns::ColumnWriter;

/// Generated stream bodies, without the fragment intros and outros.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Streams {
    pub header:    String,
    pub structors: String,
    pub schema:    String,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Header,
    Structors,
    Schema,
}

/// Constructor and destructor of a field, and whether the destructor needs
/// the wide column layout.
struct Structors {
    long:        bool,
    constructor: String,
    destructor:  String,
}

fn structors(node: &SchemaNode) -> Structors {
    let short = |constructor: String, destructor: &str| Structors {
        long: false,
        constructor,
        destructor: destructor.to_string(),
    };

    match &node.kind {
        NodeKind::String { default } => short(
            format!("OC_STRING_CONSTR (\"{}\", _, __)", default.as_deref().unwrap_or("")),
            "OC_DESTR (OC_STRING) ",
        ),
        NodeKind::Boolean { default } => short(default.as_deref().unwrap_or("FALSE").to_string(), "()"),
        NodeKind::Data { size, default } | NodeKind::Integer { size, default } => {
            let value = default.as_deref().unwrap_or("0");
            let constructor = match size {
                Some(_) => format!("{{{}}}", value),
                None => value.to_string(),
            };
            short(constructor, "()")
        }
        NodeKind::Blob => short("OC_EDATA_CONSTR (_, __)".to_string(), "OC_DESTR (OC_DATA)   "),
        NodeKind::Pointer => short("NULL".to_string(), "OcFreePointer "),
        NodeKind::Array { .. } | NodeKind::Map { .. } | NodeKind::Struct { .. } => Structors {
            long:        true,
            constructor: format!("OC_CONSTR{} ({}, _, __)", node.depth(), node.type_name()),
            destructor:  format!("OC_DESTR ({})", node.type_name()),
        },
    }
}

fn xref_note(node: &SchemaNode) -> String {
    match &node.xref {
        Some(xref) => format!(" xref={}", xref),
        None => String::new(),
    }
}

fn table_name(node: &SchemaNode) -> Result<&str, ConfigGenError> {
    node.c_ref().ok_or_else(|| {
        internal_error(&format!(
            "{} node at path depth {} has no schema table name",
            node.schema_kind(),
            node.depth()
        ))
    })
}

pub struct Emitter<'c> {
    prefix:    Prefix,
    console:   &'c mut Console,
    header:    ColumnWriter,
    structors: ColumnWriter,
    schema:    ColumnWriter,
}

impl<'c> Emitter<'c> {
    pub fn new(prefix: Prefix, console: &'c mut Console) -> Self {
        Emitter {
            prefix,
            console,
            header: ColumnWriter::new(),
            structors: ColumnWriter::new(),
            schema: ColumnWriter::new(),
        }
    }

    /// Emits every top-level subtree, then the root struct under its own
    /// section, followed by the root schema info.
    pub fn emit(mut self, root: &SchemaNode, out: OutFlags) -> Result<Streams, ConfigGenError> {
        let NodeKind::Struct { fields, .. } = &root.kind else {
            return Err(internal_error(&format!("root node is a {}, not a struct", root.schema_kind())));
        };
        for field in fields {
            self.emit_child(field)?;
        }
        self.section(out, "Root configuration", "Root configuration");
        self.emit_struct(root, fields)?;
        self.root_info(root)?;

        let streams = Streams {
            header:    self.header.into_string(),
            structors: self.structors.into_string(),
            schema:    self.schema.into_string(),
        };
        debug!(
            header = streams.header.len(),
            structors = streams.structors.len(),
            schema = streams.schema.len(),
            "emitted streams"
        );
        Ok(streams)
    }

    fn writer(&mut self, stream: Stream) -> &mut ColumnWriter {
        match stream {
            Stream::Header => &mut self.header,
            Stream::Structors => &mut self.structors,
            Stream::Schema => &mut self.schema,
        }
    }

    fn annotate(&mut self, stream: Stream, note: &str) {
        if self.console.annotate_output() {
            self.writer(stream).line(note);
        }
    }

    fn emit_child(&mut self, child: &SchemaNode) -> Result<(), ConfigGenError> {
        if let Some(section) = &child.section {
            self.section(
                section.out,
                &format!("{} section", section.title),
                &format!("{} configuration support", section.title),
            );
        }
        self.emit_node(child)
    }

    fn emit_node(&mut self, node: &SchemaNode) -> Result<(), ConfigGenError> {
        match &node.kind {
            NodeKind::Struct { fields, .. } => {
                for field in fields {
                    self.emit_child(field)?;
                }
                self.emit_struct(node, fields)
            }
            NodeKind::Array { of, .. } => {
                self.emit_child(of)?;
                self.emit_array(node, of)
            }
            NodeKind::Map { of, .. } => {
                self.emit_child(of)?;
                self.emit_map(node, of)
            }
            _ => Ok(()),
        }
    }

    fn section(&mut self, out: OutFlags, h_title: &str, c_title: &str) {
        if out.contains(OutFlags::H) {
            self.header.line("/**");
            self.header.line(&format!("  {}", h_title));
            self.header.line("**/");
            self.header.blank();
        }
        if out.contains(OutFlags::C) {
            self.structors.blank();
            self.schema.line("//");
            self.schema.line(&format!("// {}", c_title));
            self.schema.line("//");
            self.schema.blank();
        }
    }

    fn comment(&mut self, node: &SchemaNode) {
        if let (Some(comment), true) = (&node.comment, node.out.contains(OutFlags::H)) {
            self.header.line("///");
            self.header.line(&format!("/// {}.", comment));
            self.header.line("///");
        }
    }

    fn trace_emit(&mut self, what: &str, node: &SchemaNode) -> Result<(), ConfigGenError> {
        let suffix = resolve_suffix(node.schema_kind(), node.context, node.suffix())?;
        let of = node.of().map(|of| format!(" of={}", of.schema_kind())).unwrap_or_default();
        self.console.context(&format!(
            "emit_{}(){} parent={} suffix={}{}",
            what,
            of,
            node.context,
            suffix,
            xref_note(node)
        ));
        Ok(())
    }

    fn emit_field(
        &mut self,
        field: &SchemaNode,
        parent: &SchemaNode,
        inside_struct: bool,
        last: bool,
    ) -> Result<(), ConfigGenError> {
        let name = field.name.as_deref().unwrap_or("");

        if parent.xref.is_none() && field.out.contains(OutFlags::H) {
            let Structors { long, constructor, destructor } = structors(field);
            let (tab_destructor, tab_end) = if long { (112, 149) } else { (105, 130) };
            let member = field.path.last().and_then(|p| p.c.as_deref()).unwrap_or(name);

            let w = &mut self.header;
            w.tab_to(2);
            w.print("_(");
            w.print(field.type_name());
            w.tab_to(36);
            w.print(&format!(", {}", member));
            w.tab_to(62);
            w.print(", ");
            if let Some(size) = field.size() {
                w.print(&format!("[{}]", size));
            }
            w.tab_to(67);
            w.print(&format!(" , {}", constructor));
            w.tab_to(tab_destructor);
            w.print(&format!(" , {}", destructor));
            w.print(")");
            if !last {
                w.tab_to(tab_end);
                w.print(" \\");
            }
            w.newline();
        }

        if field.out.contains(OutFlags::C) {
            let kind = field.schema_kind();

            if let (Some(comment), false) = (&field.comment, kind.is_container()) {
                self.schema.line(&format!("  // {}", comment));
            }

            let variant = match kind {
                SchemaKind::Struct if field.is_opt() => "_OPT",
                SchemaKind::Struct => "",
                _ => "_IN",
            };
            let table = match kind {
                SchemaKind::Struct | SchemaKind::Array | SchemaKind::Map => Some(table_name(field)?),
                _ => None,
            };

            let upper = self.prefix.upper.clone();
            let w = &mut self.schema;
            w.tab_to(2);
            w.print(&format!("OC_SCHEMA_{}{}", kind.oc_schema_type(), variant));
            w.tab_to(23);
            w.print(&format!(" (\"{}\",", name));
            w.tab_to(51);
            if kind == SchemaKind::Struct {
                w.print(&format!(" {}", table.unwrap_or_default()));
            } else {
                if inside_struct {
                    w.print(&format!(" {}_GLOBAL_CONFIG,", upper));
                } else {
                    w.print(&format!(" {},", parent.type_name()));
                }
                w.tab_to(70);
                if inside_struct {
                    let path: Vec<&str> = field.path.iter().filter_map(|p| p.c.as_deref()).collect();
                    w.print(&format!(" {}", path.join(".")));
                } else {
                    w.print(&format!(" {}", name));
                }
                if let Some(table) = table {
                    w.print(&format!(", &{}", table));
                }
            }
            w.print("),");
            w.newline();
        }
        Ok(())
    }

    fn emit_struct(&mut self, node: &SchemaNode, fields: &[SchemaNode]) -> Result<(), ConfigGenError> {
        self.trace_emit("struct", node)?;
        self.comment(node);

        let note = format!("// STRUCT parent={}{}", node.context, xref_note(node));
        let emit_h = node.out.contains(OutFlags::H);
        let emit_c = node.out.contains(OutFlags::C);

        if emit_h {
            self.annotate(Stream::Header, &note);
            if node.xref.is_none() {
                self.header.line(&format!("#define {}_FIELDS(_, __) \\", node.h_ref()));
            }
        }
        if emit_c {
            self.annotate(Stream::Schema, &note);
            let table = table_name(node)?.to_string();
            self.schema.line("STATIC");
            self.schema.line("OC_SCHEMA");
            self.schema.line(&format!("{}[] = {{", table));
        }

        let inside_struct = node.context == Context::Struct;
        for (i, field) in fields.iter().enumerate() {
            self.emit_field(field, node, inside_struct, i + 1 == fields.len())?;
        }

        if emit_h && node.xref.is_none() {
            self.header.line(&format!("  OC_DECLARE ({})", node.h_ref()));
            self.header.blank();
        }
        if emit_c {
            self.annotate(Stream::Structors, &note);
            if node.xref.is_none() {
                self.structors.line(&format!("OC_STRUCTORS       ({}, ())", node.h_ref()));
            }
            self.schema.line("};");
            self.schema.blank();
        }
        Ok(())
    }

    fn emit_array(&mut self, node: &SchemaNode, of: &SchemaNode) -> Result<(), ConfigGenError> {
        self.trace_emit("array", node)?;
        self.comment(node);

        let note = format!(
            "// ARRAY of={} parent={}{}",
            of.schema_kind(),
            node.context,
            xref_note(node)
        );

        if node.out.contains(OutFlags::H) {
            self.annotate(Stream::Header, &note);
            if node.xref.is_none() {
                self.header.line(&format!("#define {}_FIELDS(_, __) \\", node.h_ref()));
                self.header.line(&format!("  OC_ARRAY ({}, _, __)", of.type_name()));
                self.header.line(&format!("  OC_DECLARE ({})", node.h_ref()));
                self.header.blank();
            }
        }

        if node.out.contains(OutFlags::C) {
            self.annotate(Stream::Structors, &note);
            if node.xref.is_none() {
                let line = if node.context == Context::Map {
                    format!("OC_STRUCTORS       ({}, ())", node.h_ref())
                } else {
                    format!("OC_ARRAY_STRUCTORS ({})", node.h_ref())
                };
                self.structors.line(&line);
            }

            self.annotate(Stream::Schema, &note);
            if node.context != Context::Map {
                let table = table_name(node)?.to_string();
                let element_kind = of.schema_kind();
                let element_table = match element_kind {
                    SchemaKind::Struct => format!(", {}", table_name(of)?),
                    _ => String::new(),
                };
                self.schema.line("STATIC");
                self.schema.line("OC_SCHEMA");
                self.schema.line(&format!(
                    "{} = OC_SCHEMA_{} (NULL{});",
                    table,
                    element_kind.oc_schema_type(),
                    element_table
                ));
                self.schema.blank();
            }
        }
        Ok(())
    }

    /// Schema entry describing the values inside a map's array or map value.
    fn emit_map_subtype(&mut self, map: &SchemaNode, value: &SchemaNode) -> Result<(), ConfigGenError> {
        let Some(entry) = value.of() else {
            return Err(internal_error(&format!("map value of kind {} has no element type", value.schema_kind())));
        };

        if entry.out.contains(OutFlags::C) {
            let note = format!("// MAP OF {} OF {}, SUB-TYPE", value.schema_kind(), entry.schema_kind());
            self.annotate(Stream::Schema, &note);
            let nested = if value.schema_kind() == SchemaKind::Map { "M" } else { "" };
            let table = table_name(map)?.to_string();
            self.schema.line("STATIC");
            self.schema.line("OC_SCHEMA");
            self.schema.line(&format!(
                "{}Entry = OC_SCHEMA_{}{} (NULL);",
                table,
                nested,
                entry.schema_kind().oc_schema_type()
            ));
            self.schema.blank();
        }
        Ok(())
    }

    fn emit_map(&mut self, node: &SchemaNode, of: &SchemaNode) -> Result<(), ConfigGenError> {
        let value_kind = of.schema_kind();
        if value_kind == SchemaKind::Blob {
            // provided by the runtime library
            self.console.context(&format!("emit_map() of=blob parent={}{}", node.context, xref_note(node)));
            return Ok(());
        }

        self.trace_emit("map", node)?;
        self.comment(node);

        let map_type = match value_kind {
            SchemaKind::Array | SchemaKind::Map => value_kind.oc_schema_type(),
            other => return Err(internal_error(&format!("unhandled map -> {}", other))),
        };

        if node.xref.is_none() {
            self.emit_map_subtype(node, of)?;
        }

        let note = format!("// MAP of={}{}", value_kind, xref_note(node));

        if node.out.contains(OutFlags::H) {
            self.annotate(Stream::Header, &note);
            if node.xref.is_none() {
                self.header.line(&format!("#define {}_FIELDS(_, __) \\", node.h_ref()));
                self.header.line(&format!("  OC_MAP (OC_STRING, {}, _, __)", of.type_name()));
                self.header.line(&format!("  OC_DECLARE ({})", node.h_ref()));
                self.header.blank();
            }
        }

        if node.out.contains(OutFlags::C) {
            self.annotate(Stream::Structors, &note);
            if node.xref.is_none() {
                self.structors.line(&format!("OC_MAP_STRUCTORS   ({})", node.h_ref()));
            }

            self.annotate(Stream::Schema, &note);
            let table = table_name(node)?.to_string();
            self.schema.line("STATIC");
            self.schema.line("OC_SCHEMA");
            self.schema.line(&format!("{} = OC_SCHEMA_{} (NULL, &{}Entry);", table, map_type, table));
            self.schema.blank();
        }
        Ok(())
    }

    fn root_info(&mut self, root: &SchemaNode) -> Result<(), ConfigGenError> {
        if root.out.contains(OutFlags::C) {
            let table = table_name(root)?.to_string();
            self.schema.line("STATIC");
            self.schema.line("OC_SCHEMA_INFO");
            self.schema.line("mRootConfigurationInfo = {");
            self.schema.line(&format!(" .Dict = {{{}, ARRAY_SIZE ({})}}", table, table));
            self.schema.line("};");
            self.schema.blank();
        }
        Ok(())
    }
}
