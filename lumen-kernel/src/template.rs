//! Template resolution - `{key}` placeholder substitution.

use crate::dict::ValueDict;

/// Resolve `{key}` placeholders in `template` against `dict`.
///
/// Unknown keys resolve to the empty string. Literal text outside braces is
/// copied verbatim. An unterminated `{` consumes the rest of the string as
/// the key name.
pub fn resolve(template: &str, dict: &ValueDict) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            out.push(ch);
            continue;
        }

        let mut key = String::new();
        for ch in chars.by_ref() {
            if ch == '}' {
                break;
            }
            key.push(ch);
        }

        if let Some(value) = dict.get(&key) {
            out.push_str(value);
        }
    }

    out
}
