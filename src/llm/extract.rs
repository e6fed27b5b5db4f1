//! JSON extraction from free-form generated text.
//!
//! The generative API wraps its payload in commentary more often than not:
//! markdown fences, a lead-in sentence, trailing chatter. Callers get the
//! first brace-delimited substring that parses as a JSON object, or a typed
//! error they must fold into a diagnostic envelope carrying the raw text.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no JSON object found in generated text")]
    NoJson,
    #[error("brace-delimited candidates found but none parsed: {0}")]
    Invalid(String),
}

/// Extract the first top-level JSON object embedded in `text`.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    // Fenced blocks are the common case and the cheapest to check
    if let Some(candidate) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if value.is_object() {
                return Ok(value);
            }
        }
    }

    let bytes = text.as_bytes();
    let mut saw_brace = false;
    let mut last_err = None;

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            saw_brace = true;
            if let Some(end) = balanced_end(text, i) {
                match serde_json::from_str::<Value>(&text[i..end]) {
                    Ok(value) if value.is_object() => return Ok(value),
                    Ok(_) => {}
                    Err(e) => last_err = Some(e.to_string()),
                }
            }
        }
        i += 1;
    }

    if !saw_brace {
        Err(ExtractError::NoJson)
    } else {
        Err(ExtractError::Invalid(
            last_err.unwrap_or_else(|| "unbalanced braces".to_string()),
        ))
    }
}

/// Contents of the first ```json (or bare ```) fence, if any
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body = after_fence
        .strip_prefix("json")
        .unwrap_or(after_fence)
        .trim_start_matches(['\r', '\n']);
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Byte offset one past the brace that balances the one at `start`,
/// ignoring braces inside string literals.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
