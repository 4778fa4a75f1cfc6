use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::{Ident, Span};

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "union", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers.
const UNRAWABLE: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Drops characters that cannot appear in an identifier and keeps the result
/// from starting with a digit.
fn sanitize(s: &str, empty: &str) -> String {
    let mut out: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if out.is_empty() {
        out.push_str(empty);
    } else if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

pub fn tok_id(s: &str) -> Ident {
    if UNRAWABLE.contains(&s) {
        Ident::new(&format!("{s}_"), Span::call_site())
    } else if KEYWORDS.contains(&s) {
        Ident::new_raw(s, Span::call_site())
    } else {
        Ident::new(s, Span::call_site())
    }
}

/// `UpperCamelCase` name for types and variants.
pub fn type_name(s: &str) -> String {
    sanitize(&s.to_upper_camel_case(), "Empty")
}

/// `snake_case` name for fields and functions.
pub fn field_name(s: &str) -> String {
    sanitize(&s.to_snake_case(), "empty")
}

pub fn type_ident(s: &str) -> Ident {
    tok_id(&type_name(s))
}

pub fn field_ident(s: &str) -> Ident {
    tok_id(&field_name(s))
}

/// Identifier built from already snake-cased parts, e.g. `de_` + name.
pub fn fn_ident(prefix: &str, s: &str, suffix: &str) -> Ident {
    tok_id(&format!("{prefix}{}{suffix}", field_name(s)))
}
