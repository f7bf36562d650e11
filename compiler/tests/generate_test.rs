#![cfg(test)]

use std::fs;

use plist_config_compiler::{
    fragments::DEFAULT_INCLUDE,
    generate,
    types::{NodeKind, SchemaNode},
    Artifact, ConfigGenError, FragmentVars, Fragments, GenerateOptions, OutFlags, Prefix, TraceFlags,
};

fn options(trace: TraceFlags) -> GenerateOptions {
    GenerateOptions { trace, ..GenerateOptions::default() }
}

fn wrap(body: &str) -> String {
    format!("<plist version=\"1.0\"><dict>{}</dict></plist>", body)
}

/// Collapses runs of whitespace so column padding does not matter.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_refs<'a>(node: &'a SchemaNode, refs: &mut Vec<&'a str>) {
    if node.schema_kind().is_container() {
        refs.push(node.h_ref());
    }
    match &node.kind {
        NodeKind::Struct { fields, .. } => fields.iter().for_each(|f| collect_refs(f, refs)),
        NodeKind::Array { of, .. } | NodeKind::Map { of, .. } => collect_refs(of, refs),
        _ => {}
    }
}

#[test]
fn test_root_boolean() {
    let generated = generate(&wrap("<key>Foo</key><true/>"), &options(TraceFlags(0))).expect("generate failed");

    let header = squash(&generated.streams.header);
    assert!(header.contains("_(BOOLEAN , Foo , , FALSE , ())"), "{}", header);
    assert!(header.contains("/** Foo section **/"), "{}", header);
    assert!(header.contains("#define OC_GLOBAL_CONFIG_FIELDS(_, __) \\"), "{}", header);
    assert!(header.contains("OC_DECLARE (OC_GLOBAL_CONFIG)"), "{}", header);

    let schema = squash(&generated.streams.schema);
    assert!(schema.contains("OC_SCHEMA_BOOLEAN_IN (\"Foo\", OC_GLOBAL_CONFIG, Foo),"), "{}", schema);
    assert!(schema.contains("// Foo configuration support //"), "{}", schema);
    assert!(schema.contains("STATIC OC_SCHEMA mRootConfigurationNodes[] = {"), "{}", schema);
    assert!(schema.ends_with(
        "STATIC OC_SCHEMA_INFO mRootConfigurationInfo = { .Dict = {mRootConfigurationNodes, ARRAY_SIZE (mRootConfigurationNodes)} };"
    ));

    assert!(generated.console.is_empty());
}

const PATCH_TEMPLATE: &str = r#"<plist version="1.0">
<dict>
	<key>Acpi</key>
	<dict>
		<key>Patch</key>
		<array>
			<dict>
				<key>Count</key>
				<integer/>
				<key>Find</key>
				<data/>
				<key>Mask</key>
				<data>AAAAAAAA</data>
			</dict>
		</array>
	</dict>
</dict>
</plist>
"#;

#[test]
fn test_array_of_struct() {
    let generated = generate(PATCH_TEMPLATE, &options(TraceFlags(0))).expect("generate failed");
    let header = squash(&generated.streams.header);
    let schema = squash(&generated.streams.schema);
    let structors = &generated.streams.structors;

    assert_eq!(header.matches("#define").count(), 4, "{}", header);
    assert!(header.contains("#define OC_ACPI_PATCH_ENTRY_FIELDS(_, __) \\"));
    assert!(header.contains("_(UINT8 , Mask , [6] , {0} , ())"), "{}", header);
    assert!(header.contains(
        "#define OC_ACPI_PATCH_ARRAY_FIELDS(_, __) \\ OC_ARRAY (OC_ACPI_PATCH_ENTRY, _, __) OC_DECLARE (OC_ACPI_PATCH_ARRAY)"
    ));
    assert!(header.contains(
        "_(OC_ACPI_PATCH_ARRAY , Patch , , OC_CONSTR2 (OC_ACPI_PATCH_ARRAY, _, __) , OC_DESTR (OC_ACPI_PATCH_ARRAY))"
    ), "{}", header);

    assert!(schema.contains("OC_SCHEMA_INTEGER_IN (\"Count\", OC_ACPI_PATCH_ENTRY, Count),"));
    assert!(schema.contains("OC_SCHEMA_DATA_IN (\"Find\", OC_ACPI_PATCH_ENTRY, Find),"));
    assert!(schema.contains("OC_SCHEMA_DATAF_IN (\"Mask\", OC_ACPI_PATCH_ENTRY, Mask),"));
    assert!(schema.contains("mAcpiPatchSchema = OC_SCHEMA_DICT (NULL, mAcpiPatchSchemaEntry);"));
    assert!(schema.contains("OC_SCHEMA_ARRAY_IN (\"Patch\", OC_GLOBAL_CONFIG, Acpi.Patch, &mAcpiPatchSchema),"));
    assert!(schema.contains("OC_SCHEMA_DICT (\"Acpi\", mAcpiConfigurationSchema),"));

    assert!(structors.contains("OC_STRUCTORS       (OC_ACPI_PATCH_ENTRY, ())\n"));
    assert!(structors.contains("OC_ARRAY_STRUCTORS (OC_ACPI_PATCH_ARRAY)\n"));

    // element table precedes the array table that points at it
    let entry = schema.find("mAcpiPatchSchemaEntry[] = {").unwrap();
    let array = schema.find("mAcpiPatchSchema = OC_SCHEMA_DICT").unwrap();
    assert!(entry < array);
}

#[test]
fn test_xref_suppresses_definition() {
    let template = PATCH_TEMPLATE.replace("\t\t\t<dict>", "\t\t\t<dict xref=\"OC_PATCH_ENTRY\">");
    let generated = generate(&template, &options(TraceFlags(0))).expect("generate failed");
    let header = squash(&generated.streams.header);
    let schema = squash(&generated.streams.schema);

    assert_eq!(header.matches("#define").count(), 3, "{}", header);
    assert!(!header.contains("OC_ACPI_PATCH_ENTRY"), "{}", header);
    assert!(header.contains("OC_ARRAY (OC_PATCH_ENTRY, _, __)"));
    assert!(!generated.streams.structors.contains("OC_ACPI_PATCH_ENTRY"));
    assert!(schema.contains("mAcpiPatchSchemaEntry[] = {"));
    assert!(schema.contains("OC_SCHEMA_INTEGER_IN (\"Count\", OC_PATCH_ENTRY, Count),"));
}

#[test]
fn test_out_attribute_routes_to_header_only() {
    let generated = generate(
        &wrap("<key out=\"h\">Foo</key><true/><key>Bar</key><true/>"),
        &options(TraceFlags::XML),
    )
    .expect("generate failed");

    let header = squash(&generated.streams.header);
    assert!(header.contains("_(BOOLEAN , Foo , , FALSE , ()) \\"), "{}", header);
    assert!(header.contains("_(BOOLEAN , Bar , , FALSE , ())"), "{}", header);

    assert!(!generated.streams.schema.contains("Foo"), "{}", generated.streams.schema);
    assert!(generated.streams.schema.contains("\"Bar\""));

    assert!(!generated.console.contains("Foo"), "{}", generated.console);
    assert!(generated.console.contains("\t<key>Bar</key>\n"), "{}", generated.console);
}

#[test]
fn test_map_of_blob_is_assoc() {
    let generated = generate(
        &wrap(
            "<key>Nvram</key><dict>\
               <key>Add</key><dict type=\"map\"><key>Guid</key>\
                 <dict type=\"map\"><key>Var</key><data/></dict>\
               </dict>\
             </dict>",
        ),
        &options(TraceFlags(0)),
    )
    .expect("generate failed");

    let header = squash(&generated.streams.header);
    let schema = squash(&generated.streams.schema);

    assert!(!header.contains("#define OC_ASSOC"), "{}", header);
    assert!(header.contains("#define OC_NVRAM_ADD_MAP_FIELDS(_, __) \\ OC_MAP (OC_STRING, OC_ASSOC, _, __)"));
    assert!(schema.contains("mNvramAddSchemaEntry = OC_SCHEMA_MDATA (NULL);"), "{}", schema);
    assert!(schema.contains("mNvramAddSchema = OC_SCHEMA_MAP (NULL, &mNvramAddSchemaEntry);"));
    assert!(schema.contains("OC_SCHEMA_MAP_IN (\"Add\", OC_GLOBAL_CONFIG, Nvram.Add, &mNvramAddSchema),"));
    assert!(generated.streams.structors.contains("OC_MAP_STRUCTORS   (OC_NVRAM_ADD_MAP)\n"));

    let add = &generated.root.fields()[0].fields()[0];
    assert_eq!(add.of().unwrap().type_name(), "OC_ASSOC");
}

#[test]
fn test_echo_reproduces_template() {
    let template = "<plist version=\"1.0\">
<dict>
\t<key>Misc</key>
\t<dict comment=\"Miscellaneous settings\">
\t\t<key>Timeout</key>
\t\t<integer>5</integer>
\t\t<key h=\"TOOL_LIST\">Tools</key>
\t\t<array>
\t\t\t<dict>
\t\t\t\t<key>Name</key>
\t\t\t\t<string>Shell &amp; more</string>
\t\t\t\t<key>Enabled</key>
\t\t\t\t<false/>
\t\t\t</dict>
\t\t</array>
\t</dict>
</dict>
</plist>
";
    let generated = generate(template, &options(TraceFlags::default())).expect("generate failed");
    assert_eq!(generated.console, template);

    let header = &generated.streams.header;
    assert!(header.contains("///\n/// Miscellaneous settings.\n///\n#define OC_MISC_CONFIG_FIELDS"), "{}", header);
    assert!(header.contains("#define OC_MISC_TOOL_LIST_ENTRY_FIELDS"), "{}", header);
}

#[test]
fn test_original_mode_echo() {
    let template = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">
<plist version=\"1.0\">
<dict>
\t<key section=\"Boot options\">Boot</key>
\t<dict opt=\"yes\">
\t\t<key>Timeout</key>
\t\t<integer default=\"5\">0</integer>
\t</dict>
</dict>
</plist>
";
    let expected = template.replace(" section=\"Boot options\"", "").replace(" opt=\"yes\"", "").replace(" default=\"5\"", "");
    let generated = generate(template, &options(TraceFlags::XML | TraceFlags::ORIGINAL)).expect("generate failed");
    assert_eq!(generated.console, expected);

    let schema = squash(&generated.streams.schema);
    assert!(schema.contains("// Boot options configuration support //"), "{}", schema);
    assert!(schema.contains("OC_SCHEMA_DICT_OPT (\"Boot\", mBootConfigurationSchema),"), "{}", schema);
    assert!(squash(&generated.streams.header).contains("_(UINT32 , Timeout , , 5 , ())"));
}

#[test]
fn test_references_are_unique() {
    let generated = generate(
        &wrap(
            "<key>Acpi</key><dict>\
               <key>Add</key><array><dict><key>Path</key><string/></dict></array>\
               <key>Patch</key><array><dict><key>Find</key><data/></dict></array>\
               <key>Quirks</key><dict><key>Reset</key><false/></dict>\
             </dict>\
             <key>Kernel</key><dict>\
               <key>Add</key><array><dict><key>Path</key><string/></dict></array>\
               <key>Quirks</key><dict><key>Reset</key><false/></dict>\
             </dict>",
        ),
        &options(TraceFlags(0)),
    )
    .expect("generate failed");

    let mut refs = Vec::new();
    collect_refs(&generated.root, &mut refs);
    let mut unique = refs.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(refs.len(), unique.len(), "{:?}", refs);
    assert!(refs.contains(&"OC_KERNEL_QUIRKS"));
    assert!(refs.contains(&"OC_ACPI_ADD_ENTRY"));
}

#[test]
fn test_custom_prefix() {
    let generated = generate(
        &wrap("<key>Foo</key><string default=\"x\"/>"),
        &GenerateOptions { prefix: Prefix::new("Oca"), trace: TraceFlags(0), out: OutFlags::ALL },
    )
    .expect("generate failed");
    assert!(squash(&generated.streams.schema).contains("OC_SCHEMA_STRING_IN (\"Foo\", OCA_GLOBAL_CONFIG, Foo),"));
    assert!(squash(&generated.streams.header)
        .contains("_(OC_STRING , Foo , , OC_STRING_CONSTR (\"x\", _, __) , OC_DESTR (OC_STRING) )"));
}

#[test]
fn test_ir_serializes() {
    let generated = generate(PATCH_TEMPLATE, &options(TraceFlags(0))).expect("generate failed");
    let json = serde_json::to_value(&generated.root).expect("serialize failed");
    assert_eq!(json["kind"], "struct");
    assert_eq!(json["fields"][0]["name"], "Acpi");
    assert_eq!(json["fields"][0]["fields"][0]["kind"], "array");
}

#[test]
fn test_root_section_follows_nested_sections() {
    let text = "<plist><dict><key>Acpi</key><dict><key>Foo</key><true/></dict></dict></plist>";
    let generated = generate(text, &options(TraceFlags(0))).expect("generate failed");

    let header = &generated.streams.header;
    let acpi = header.find("  Acpi section\n").expect("no Acpi section in header");
    let root = header.find("  Root configuration\n").expect("no root section in header");
    let root_define = header.find("#define OC_GLOBAL_CONFIG_FIELDS").expect("no root define");
    assert!(acpi < root && root < root_define, "{}", header);
    assert!(header.find("#define OC_ACPI_CONFIG_FIELDS").unwrap() < root);

    let schema = &generated.streams.schema;
    let acpi = schema.find("// Acpi configuration support\n").expect("no Acpi section in schema");
    let root = schema.find("// Root configuration\n").expect("no root section in schema");
    let root_table = schema.find("mRootConfigurationNodes[] = {").expect("no root table");
    assert!(acpi < root && root < root_table, "{}", schema);
}

#[test]
fn test_section_follows_key_mask() {
    let generated = generate(&wrap("<key>Misc</key><dict out=\"h\"><key>Foo</key><true/></dict>"), &options(TraceFlags(0)))
        .expect("generate failed");

    let schema = squash(&generated.streams.schema);
    assert!(schema.contains("// Misc configuration support //"), "{}", schema);
    assert!(!schema.contains("\"Misc\""), "{}", schema);
    assert!(squash(&generated.streams.header).contains("/** Misc section **/"));
}

#[test]
fn test_error_classes() {
    match generate(&wrap("<key>Foo</key><true deafult=\"1\"/>"), &options(TraceFlags(0))) {
        Err(e @ ConfigGenError::Structure { .. }) => {
            assert!(!e.is_internal());
            assert!(e.to_string().contains("unhandled attributes"), "{}", e);
        }
        other => panic!("expected a structure error, got {:?}", other.map(|g| g.console)),
    }

    match generate(&wrap("<key>M</key><dict type=\"map\"><key>a</key><data/><key>b</key><data/></dict>"), &options(TraceFlags(0))) {
        Err(ConfigGenError::Structure { msg, .. }) => assert!(msg.contains("exactly one key/value pair"), "{}", msg),
        other => panic!("expected a structure error, got {:?}", other.map(|g| g.console)),
    }

    match generate("<plist><dict type=\"map\"><key>x</key><data/></dict></plist>", &options(TraceFlags(0))) {
        Err(e @ ConfigGenError::Structure { .. }) => {
            assert!(!e.is_internal());
            assert!(e.to_string().contains("root <dict> must be a struct"), "{}", e);
        }
        other => panic!("expected a structure error, got {:?}", other.map(|g| g.console)),
    }

    match generate("<plist><dict></plist>", &options(TraceFlags(0))) {
        Err(ConfigGenError::ParseError { .. }) => {}
        other => panic!("expected a parse error, got {:?}", other.map(|g| g.console)),
    }
}

#[test]
fn test_fragment_assembly() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    fs::write(dir.path().join("intro.c"), "// from [[template]] by [[program]]\n#include [[include]]\n").unwrap();
    fs::write(dir.path().join("outro.c"), "// end of [[Prefix]] config\n").unwrap();
    fs::write(dir.path().join("intro.h"), "#ifndef [[PREFIX]]_CONFIG_H\n").unwrap();
    fs::write(dir.path().join("outro.h"), "#endif\n").unwrap();

    let vars = FragmentVars {
        program:  "plist2config".into(),
        template: "Config.plist".into(),
        include:  DEFAULT_INCLUDE.into(),
        prefix:   Prefix::default(),
    };
    let generated = generate(&wrap("<key>Foo</key><true/>"), &options(TraceFlags(0))).expect("generate failed");

    let source = Fragments::load(dir.path(), Artifact::Source, &vars).expect("load failed");
    let text = source.render(&generated.streams, OutFlags::ALL);
    assert!(text.starts_with("// from Config.plist by plist2config\n#include <Library/OcConfigurationLib.h>\n"));
    assert!(text.contains(&format!("{}\n{}", generated.streams.structors, generated.streams.schema)));
    assert!(text.ends_with("// end of Oc config\n"));

    let header = Fragments::load(dir.path(), Artifact::Header, &vars).expect("load failed");
    let text = header.render(&generated.streams, OutFlags::ALL);
    assert!(text.starts_with("#ifndef OC_CONFIG_H\n"));
    assert!(text.ends_with("#endif\n"));

    fs::remove_file(dir.path().join("outro.h")).unwrap();
    match Fragments::load(dir.path(), Artifact::Header, &vars) {
        Err(ConfigGenError::Fragment { path, .. }) => assert!(path.ends_with("outro.h")),
        other => panic!("expected a fragment error, got {:?}", other),
    }
}
