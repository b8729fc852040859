use regex::Regex;
use std::sync::OnceLock;

/// Child names a node refuses, they collide with its own JSON keys and element binding.
pub const RESERVED: [&str; 3] = ["nodeName", "nodeType", "this"];

/// Words that cannot be used as a bare name: Rust keywords plus ECMAScript reserved words,
/// since segments surface both as Rust-side names and as DOM property names.
pub const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "case", "catch", "class",
    "const", "continue", "crate", "debugger", "default", "delete", "do", "dyn", "else", "enum",
    "export", "extends", "extern", "false", "final", "finally", "fn", "for", "function", "if",
    "impl", "implements", "import", "in", "instanceof", "interface", "let", "loop", "macro",
    "match", "mod", "move", "mut", "new", "null", "override", "package", "priv", "private",
    "protected", "pub", "public", "ref", "return", "self", "Self", "static", "struct", "super",
    "switch", "this", "throw", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "var", "virtual", "void", "where", "while", "with", "yield",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"))
}

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// True when `name` can be used as a member name as-is
pub fn is_legal_variable_name(name: &str) -> bool {
    !is_keyword(name) && identifier_pattern().is_match(name)
}

/// Deterministically rewrite `name` into a legal member name.
///
/// Keywords get a leading underscore; a leading digit and every character outside
/// `[A-Za-z0-9_]` become `_`.
pub fn force_legal_variable_name(name: &str) -> String {
    if is_legal_variable_name(name) {
        return name.to_string();
    }

    let keyword_safe = if is_keyword(name) {
        format!("_{}", name)
    } else {
        name.to_string()
    };

    let forced: String = keyword_safe
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if (i == 0 && c.is_ascii_digit()) || !(c.is_ascii_alphanumeric() || c == '_') {
                '_'
            } else {
                c
            }
        })
        .collect();

    if forced.is_empty() {
        "_".to_string()
    } else {
        forced
    }
}

/// Map a member-style attribute name onto the DOM attribute it stands for.
///
/// `class_` and `for_` strip to `class` and `for`; any other underscore becomes a hyphen, so
/// `data_qa_id` reads `data-qa-id`.
pub fn attribute_name(name: &str) -> String {
    let stripped = name.replace('_', "");
    if is_keyword(&stripped) {
        stripped
    } else {
        name.replace('_', "-")
    }
}
