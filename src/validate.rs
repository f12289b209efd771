use thiserror::Error;

use crate::config::ValidationPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("generated README is empty")]
    Empty,

    #[error("generated README is {actual} bytes, limit is {limit}")]
    TooLarge { actual: usize, limit: usize },

    #[error("generated README is identical to the current one")]
    Unchanged,
}

/// Sanity-check generated text before it replaces `current`.
///
/// With the policy disabled the text is returned untouched. Otherwise a single
/// wrapping Markdown fence is removed and the rest passes through byte-for-byte.
pub fn check(
    generated: &str,
    current: &str,
    policy: &ValidationPolicy,
) -> Result<String, ValidationError> {
    if !policy.enabled {
        return Ok(generated.to_string());
    }

    let text = strip_fence(generated);
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if text.len() > policy.max_bytes {
        return Err(ValidationError::TooLarge {
            actual: text.len(),
            limit: policy.max_bytes,
        });
    }
    if text == current {
        return Err(ValidationError::Unchanged);
    }
    Ok(text.to_string())
}

/// Remove a ```` ```markdown ```` / ```` ```md ```` / ```` ``` ```` fence that
/// wraps the whole text. If any other fence line sits between the outer ones,
/// the text is returned as-is.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some((info, body)) = rest.split_once('\n') else {
        return text;
    };
    if !matches!(info.trim(), "" | "markdown" | "md") {
        return text;
    }
    let Some(body) = body.strip_suffix("```") else {
        return text;
    };
    if body.lines().any(|line| line.trim_start().starts_with("```")) {
        return text;
    }
    if body.trim().is_empty() {
        return "";
    }
    body
}
