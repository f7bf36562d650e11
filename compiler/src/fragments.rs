//! Intro and outro fragments wrapped around the generated streams.

use std::{fs, path::Path};

use tracing::debug;

use crate::{
    emit::Streams,
    error::ConfigGenError,
    types::{OutFlags, Prefix},
};

pub const DEFAULT_INCLUDE: &str = "<Library/OcConfigurationLib.h>";

/// Values substituted into the fragment text.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentVars {
    /// `[[program]]`, basename of the generator executable.
    pub program:  String,
    /// `[[template]]`, basename of the input template.
    pub template: String,
    /// `[[include]]` in `intro.c`.
    pub include:  String,
    /// `[[Prefix]]` and `[[PREFIX]]`.
    pub prefix:   Prefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Header,
    Source,
}

impl Artifact {
    fn extension(self) -> &'static str {
        match self {
            Artifact::Header => "h",
            Artifact::Source => "c",
        }
    }

    fn stream_flag(self) -> OutFlags {
        match self {
            Artifact::Header => OutFlags::H,
            Artifact::Source => OutFlags::C,
        }
    }
}

fn read_fragment(dir: &Path, name: &str) -> Result<String, ConfigGenError> {
    let path = dir.join(name);
    debug!(path = %path.display(), "reading fragment");
    fs::read_to_string(&path).map_err(|source| ConfigGenError::Fragment { path, source })
}

/// Loaded intro/outro pair for one artifact, with file names and include
/// already substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragments {
    artifact: Artifact,
    intro:    String,
    outro:    String,
    prefix:   Prefix,
}

impl Fragments {
    pub fn load(dir: &Path, artifact: Artifact, vars: &FragmentVars) -> Result<Fragments, ConfigGenError> {
        let ext = artifact.extension();
        let intro = read_fragment(dir, &format!("intro.{}", ext))?;
        let outro = read_fragment(dir, &format!("outro.{}", ext))?;
        Ok(Fragments::from_text(artifact, &intro, &outro, vars))
    }

    pub fn from_text(artifact: Artifact, intro: &str, outro: &str, vars: &FragmentVars) -> Fragments {
        let mut intro = intro
            .replace("[[program]]", &vars.program)
            .replace("[[template]]", &vars.template);
        if artifact == Artifact::Source {
            intro = intro.replace("[[include]]", &vars.include);
        }
        Fragments {
            artifact,
            intro,
            outro: outro.to_string(),
            prefix: vars.prefix.clone(),
        }
    }

    fn customise(&self, text: &str) -> String {
        text.replace("[[Prefix]]", &self.prefix.camel)
            .replace("[[PREFIX]]", &self.prefix.upper)
    }

    /// Assembles the artifact. The stream bodies are always included; the
    /// intro and outro only when the artifact's bit is set in `out`.
    pub fn render(&self, streams: &Streams, out: OutFlags) -> String {
        let wrap = out.contains(self.artifact.stream_flag());
        let mut text = String::new();

        if wrap {
            text.push_str(&self.customise(&self.intro));
        }
        match self.artifact {
            Artifact::Header => text.push_str(&streams.header),
            Artifact::Source => {
                text.push_str(&streams.structors);
                if wrap {
                    text.push('\n');
                }
                text.push_str(&streams.schema);
            }
        }
        if wrap {
            text.push_str(&self.customise(&self.outro));
        }
        text
    }
}
