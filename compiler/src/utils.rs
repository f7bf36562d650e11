use crate::error::ConfigGenError;

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn parse_error(msg: &str, line: usize, column: usize) -> ConfigGenError {
    ConfigGenError::ParseError {
        msg: msg.to_string(),
        line,
        column,
    }
}

pub fn structure_error(msg: &str, line: usize, column: usize) -> ConfigGenError {
    ConfigGenError::Structure {
        msg: msg.to_string(),
        line,
        column,
    }
}

pub fn internal_error(msg: &str) -> ConfigGenError {
    ConfigGenError::Internal(msg.to_string())
}

/// Accepts the usual spellings of a boolean attribute value.
pub fn bool_from_str(value: &str) -> Option<bool> {
    let lower = value.to_lowercase();
    if value == "0" || lower == "false" || lower == "no" {
        Some(false)
    } else if value == "1" || lower == "true" || lower == "yes" {
        Some(true)
    } else {
        None
    }
}
