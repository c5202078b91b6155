//! Helpers for writing JavaScript source text.

/// Double-quoted JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c == '$' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

/// Object-literal key for `name`, quoted when needed.
pub(crate) fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        js_string(name)
    }
}

/// Member access suffix: `.name` or `["na-me"]`.
pub(crate) fn member(name: &str) -> String {
    if is_identifier(name) {
        format!(".{}", name)
    } else {
        format!("[{}]", js_string(name))
    }
}
