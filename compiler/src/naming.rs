//! Reference names for generated types.
//!
//! A container's reference is derived from the key path leading to it, the
//! container it sits in and any suffix override given in the template. The
//! `h` half becomes the C type name (`OC_ACPI_PATCH_ENTRY`), the `c` half the
//! schema table name (`mAcpiPatchSchemaEntry`).

use crate::{
    error::ConfigGenError,
    types::{Context, NamePair, NodeKind, Prefix, SchemaKind, SchemaNode},
    utils::internal_error,
};

/// Type used for maps of data blobs; provided by the runtime library.
pub const ASSOC_TYPE: &str = "OC_ASSOC";

/// Segment appended to the path of the root dictionary.
pub fn global_root_segment() -> NamePair {
    NamePair::new(Some("GLOBAL"), Some("Root"))
}

/// Segment appended to the root and to every top-level section.
pub fn configuration_segment() -> NamePair {
    NamePair::new(Some("CONFIG"), Some("Configuration"))
}

/// Default suffix of a container of `kind` sitting in `context`.
pub fn default_suffix(kind: SchemaKind, context: Context) -> Result<NamePair, ConfigGenError> {
    match (kind, context) {
        (SchemaKind::Struct, Context::Array)  => Ok(NamePair::new(Some("ENTRY"), Some("SchemaEntry"))),
        (SchemaKind::Struct, Context::Struct) => Ok(NamePair::new(None, Some("Schema"))),
        (SchemaKind::Struct, Context::Map)    => Ok(NamePair::new(Some("ARRAY"), Some("Array"))),
        (SchemaKind::Array, Context::Map)     => Ok(NamePair::new(Some("ENTRY"), None)),
        (SchemaKind::Array, Context::Struct)  => Ok(NamePair::new(Some("ARRAY"), Some("Schema"))),
        (SchemaKind::Map, _)                  => Ok(NamePair::new(Some("MAP"), Some("Schema"))),
        (kind, context) => Err(internal_error(&format!(
            "unhandled parent '{}' for {}",
            context, kind
        ))),
    }
}

/// Explicit suffix with missing halves taken from the context default.
pub fn resolve_suffix(
    kind: SchemaKind,
    context: Context,
    explicit: Option<&NamePair>,
) -> Result<NamePair, ConfigGenError> {
    let mut suffix = explicit.cloned().unwrap_or_default();
    suffix.merge(&default_suffix(kind, context)?);
    Ok(suffix)
}

/// Builds the reference pair of a node from its key path.
///
/// The this-node override replaces the last path segment. The root gets the
/// global root segment, the root and top-level sections get the configuration
/// segment, and every non-root node gets its suffix.
pub fn derive_reference(
    prefix: &Prefix,
    path: &[NamePair],
    this_node: Option<&NamePair>,
    suffix: &NamePair,
) -> NamePair {
    let depth = path.len();
    let mut use_path: Vec<NamePair> = path.to_vec();

    if let Some(this_node) = this_node {
        use_path.pop();
        use_path.push(this_node.clone());
    }
    if depth == 0 {
        use_path.push(global_root_segment());
    }
    if depth <= 1 {
        use_path.push(configuration_segment());
    }
    if depth > 0 {
        use_path.push(suffix.clone());
    }

    let joined = NamePair::join(&use_path);
    NamePair {
        h: Some(format!("{}_{}", prefix.upper, joined.h.unwrap_or_default())),
        c: Some(format!(
            "m{}{}",
            joined.c.unwrap_or_default(),
            if depth == 0 { "Nodes" } else { "" }
        )),
    }
}

/// Replaces the last path segment for descendants of a node, filling the
/// override's missing halves from the segment it replaces.
pub fn make_child_path(path: &[NamePair], child_node: Option<&NamePair>) -> Vec<NamePair> {
    let mut child_path = path.to_vec();
    if let Some(child_node) = child_node {
        let mut replacement = child_node.clone();
        if let Some(last) = child_path.pop() {
            replacement.merge(&last);
        }
        child_path.push(replacement);
    }
    child_path
}

/// Assigns the reference of a freshly built container whose children are
/// already resolved. Returns the suffix that was used, for tracing.
pub fn resolve(node: &mut SchemaNode, prefix: &Prefix) -> Result<Option<NamePair>, ConfigGenError> {
    let kind = node.schema_kind();
    if !kind.is_container() {
        return Ok(None);
    }

    if let NodeKind::Map { of, .. } = &node.kind {
        if of.schema_kind() == SchemaKind::Blob {
            node.assign_reference(NamePair::h_only(ASSOC_TYPE))?;
            return Ok(None);
        }
    }

    let suffix = resolve_suffix(kind, node.context, node.suffix())?;
    let reference = derive_reference(prefix, &node.path, node.this_node.as_ref(), &suffix);
    node.assign_reference(reference)?;
    Ok(Some(suffix))
}
