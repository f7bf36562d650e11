use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigGenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}, column {column}: {msg}")]
    ParseError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("{msg} (line {line}, column {column})")]
    Structure {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("{0}")]
    Internal(String),

    #[error("IR serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read fragment {}: {source}", path.display())]
    Fragment {
        path:   PathBuf,
        source: std::io::Error,
    },
}

impl ConfigGenError {
    /// True for defects in the generator itself rather than in its input.
    pub fn is_internal(&self) -> bool {
        matches!(self, ConfigGenError::Internal(_))
    }
}
