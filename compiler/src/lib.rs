//! plist-config-compiler
//!
//! This crate implements:
//!  1) A tokenizer + element tree builder for annotated plist templates,
//!  2) A template parser that checks every tag and attribute and resolves
//!     the generated type and table names (`parser`, `naming`),
//!  3) C generation of the `.h` field lists, the `.c` structors and the
//!     `.c` schema tables (`emit`),
//!  4) Intro/outro fragment assembly (`fragments`),
//!  5) Error types (`ConfigGenError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod document;
pub mod attrs;
pub mod naming;
pub mod trace;
pub mod parser;
pub mod emit;
pub mod fragments;

use tracing::debug;

pub use emit::Streams;
pub use error::ConfigGenError;
pub use fragments::{Artifact, FragmentVars, Fragments};
pub use types::{OutFlags, Prefix, SchemaNode, TraceFlags};

use crate::{
    document::parse_document,
    emit::Emitter,
    parser::Parser,
    tokenizer::tokenize_xml,
    trace::Console,
};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub trace:  TraceFlags,
    pub out:    OutFlags,
    pub prefix: Prefix,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            trace:  TraceFlags::default(),
            out:    OutFlags::ALL,
            prefix: Prefix::default(),
        }
    }
}

/// Everything one run produces, held in memory until the caller decides to
/// write it out.
#[derive(Debug, Clone)]
pub struct Generated {
    pub root:    SchemaNode,
    pub streams: Streams,
    /// Echo and trace lines meant for stdout.
    pub console: String,
}

/// Parses a template and generates the C streams.
pub fn generate(text: &str, options: &GenerateOptions) -> Result<Generated, ConfigGenError> {
    debug!(
        flags = %format!("0x{:02X}", options.trace.0),
        out = options.out.0,
        prefix = %options.prefix.camel,
        "generating"
    );

    let tokens = tokenize_xml(text)?;
    let document = parse_document(&tokens)?;

    let mut console = Console::new(options.trace);
    console.echo_header(text, options.out);

    let root = Parser::new(options.prefix.clone(), &mut console).parse_plist(&document, options.out)?;
    let streams = Emitter::new(options.prefix.clone(), &mut console).emit(&root, options.out)?;

    Ok(Generated {
        root,
        streams,
        console: console.into_string(),
    })
}
