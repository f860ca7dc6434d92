//! Recursive `${name}` token substitution over a workflow value tree (§4.1).
//!
//! Substitution is a single left-to-right scan of the input: at each
//! `${IDENT}` token the full pair list is checked for a match and, if found,
//! the replacement is appended to the output and the scan resumes past the
//! end of the original token — never back into the text just written. This
//! is what makes replacement text immune to re-scanning: a pair whose
//! replacement itself looks like `${other}` cannot trigger a later pair for
//! `other`, because the scan already moved on in the *original* string. Map
//! keys are substituted the same way as values; numbers and booleans are
//! untouched.

use serde_json::{Map, Value};

/// Applies every `(pattern, replacement)` pair, in order, to every string
/// reachable from `value` — including object keys — recursing through
/// arrays and objects.
pub fn substitute_tree(value: &mut Value, pairs: &[(String, String)]) {
    match value {
        Value::String(s) => {
            *s = substitute_string(s, pairs);
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                substitute_tree(item, pairs);
            }
        }
        Value::Object(map) => {
            let substituted = substitute_object(map, pairs);
            *map = substituted;
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn substitute_object(map: &mut Map<String, Value>, pairs: &[(String, String)]) -> Map<String, Value> {
    let mut result = Map::with_capacity(map.len());
    for (key, mut value) in std::mem::take(map) {
        let new_key = substitute_string(&key, pairs);
        substitute_tree(&mut value, pairs);
        result.insert(new_key, value);
    }
    result
}

/// Scans `input` once, left to right, replacing each `${IDENT}` token that
/// matches a pair's pattern with that pair's replacement. The scan always
/// advances past the matched token in the *original* string, so replacement
/// text is never re-scanned even if it happens to contain another `${...}`
/// token.
pub fn substitute_string(input: &str, pairs: &[(String, String)]) -> String {
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            let start = i + 2;
            let mut end = start;
            while end < bytes.len() && bytes[end] != b'}' {
                end += 1;
            }
            if end < bytes.len() && is_valid_ident(&input[start..end]) {
                let token = &input[i..=end];
                match pairs.iter().find(|(pattern, _)| pattern == token) {
                    Some((_, replacement)) => output.push_str(replacement),
                    None => output.push_str(token),
                }
                i = end + 1;
                continue;
            }
        }
        let ch = input[i..].chars().next().expect("i is a valid char boundary");
        output.push(ch);
        i += ch.len_utf8();
    }
    output
}

/// Scans `input` for every `${IDENT}` token (`IDENT` = `[A-Za-z_][A-Za-z0-9_]*`)
/// still present after substitution, returning the bare token names (without
/// the `${}` wrapper) in order of appearance.
pub fn scan_tokens(input: &str) -> Vec<String> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            let start = i + 2;
            let mut end = start;
            while end < bytes.len() && bytes[end] != b'}' {
                end += 1;
            }
            if end < bytes.len() && is_valid_ident(&input[start..end]) {
                tokens.push(input[start..end].to_string());
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    tokens
}

/// Recursively collects every `(token, containing_string)` pair still
/// matching the `${IDENT}` grammar anywhere in `value`.
pub fn find_unresolved_tokens(value: &Value) -> Vec<(String, String)> {
    let mut found = Vec::new();
    collect_unresolved(value, &mut found);
    found
}

fn collect_unresolved(value: &Value, found: &mut Vec<(String, String)>) {
    match value {
        Value::String(s) => {
            for token in scan_tokens(s) {
                found.push((token, s.clone()));
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_unresolved(item, found);
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                for token in scan_tokens(key) {
                    found.push((token, key.clone()));
                }
                collect_unresolved(val, found);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn is_valid_ident(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_matching_tokens_in_strings() {
        let pairs = vec![("${id}".to_string(), "abc123".to_string())];
        assert_eq!(substitute_string("disk-${id}", &pairs), "disk-abc123");
    }

    #[test]
    fn leaves_unmatched_tokens_in_place() {
        let pairs = vec![("${id}".to_string(), "abc123".to_string())];
        assert_eq!(substitute_string("disk-${other}", &pairs), "disk-${other}");
    }

    #[test]
    fn replacement_text_is_not_rescanned() {
        // if the replacement for `a` itself contains `${b}`, a later pair for
        // `b` must not also fire inside it.
        let pairs = vec![
            ("${a}".to_string(), "${b}".to_string()),
            ("${b}".to_string(), "real".to_string()),
        ];
        assert_eq!(substitute_string("${a}", &pairs), "${b}");
    }

    #[test]
    fn substitutes_object_keys_and_nested_values() {
        let pairs = vec![("${name}".to_string(), "disk0".to_string())];
        let mut tree = json!({ "${name}": { "label": "prefix-${name}" } });
        substitute_tree(&mut tree, &pairs);
        assert_eq!(tree, json!({ "disk0": { "label": "prefix-disk0" } }));
    }

    #[test]
    fn numbers_and_booleans_are_untouched() {
        let pairs = vec![("${x}".to_string(), "y".to_string())];
        let mut tree = json!({ "count": 3, "enabled": true });
        substitute_tree(&mut tree, &pairs);
        assert_eq!(tree, json!({ "count": 3, "enabled": true }));
    }

    #[test]
    fn scan_tokens_finds_valid_identifiers_only() {
        assert_eq!(scan_tokens("${var}"), vec!["var".to_string()]);
        assert_eq!(scan_tokens("no tokens here"), Vec::<String>::new());
        assert_eq!(scan_tokens("${a}-${b}"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn find_unresolved_tokens_reports_token_and_context() {
        let value = json!({ "Project": "${var}" });
        let found = find_unresolved_tokens(&value);
        assert_eq!(found, vec![("var".to_string(), "${var}".to_string())]);
    }
}
