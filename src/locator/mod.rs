//! Selector normalization.
//!
//! Every selector kind is rewritten into an XPath fragment that starts with `/`, so fragments
//! can be concatenated with [`join`] to scope one search under another.

pub mod css;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selector kinds understood by [`normalize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum By {
    ClassName,
    CssSelector,
    Id,
    LinkText,
    Name,
    PartialLinkText,
    TagName,
    XPath,
}

impl By {
    pub const fn as_str(&self) -> &'static str {
        match self {
            By::ClassName => "class name",
            By::CssSelector => "css selector",
            By::Id => "id",
            By::LinkText => "link text",
            By::Name => "name",
            By::PartialLinkText => "partial link text",
            By::TagName => "tag name",
            By::XPath => "xpath",
        }
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for By {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class name" => Ok(By::ClassName),
            "css selector" => Ok(By::CssSelector),
            "id" => Ok(By::Id),
            "link text" => Ok(By::LinkText),
            "name" => Ok(By::Name),
            "partial link text" => Ok(By::PartialLinkText),
            "tag name" => Ok(By::TagName),
            "xpath" => Ok(By::XPath),
            other => Err(format!("unknown selector kind: {}", other)),
        }
    }
}

/// A selector kind paired with its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub by: By,
    pub value: String,
}

impl Locator {
    pub fn new(by: By, value: impl Into<String>) -> Self {
        Self {
            by,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(By::XPath, value)
    }

    /// Normalized form of this locator
    pub fn normalized(&self) -> Locator {
        normalize(self.by, &self.value)
    }

    /// True when the locator cannot match anything
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.by, self.value)
    }
}

/// Convert any selector into an XPath locator.
///
/// A CSS selector that fails to compile yields an empty XPath, which matches nothing.
pub fn normalize(by: By, value: &str) -> Locator {
    let path = match by {
        By::ClassName => format!("/descendant-or-self::*[contains(@class, {})]", quote(value)),
        By::CssSelector => match css::compile(value) {
            Ok(alternatives) => alternatives
                .iter()
                .map(|alt| format!("/{}", alt))
                .collect::<Vec<_>>()
                .join(" | "),
            Err(e) => {
                tracing::debug!("css selector {:?} did not compile: {}", value, e);
                String::new()
            }
        },
        By::Id => format!("/descendant-or-self::*[@id={}]", quote(value)),
        By::LinkText => format!(
            "/descendant-or-self::*[contains(\"input a button\", name()) and normalize-space(text()) = {}]",
            quote(value)
        ),
        By::Name => format!("/descendant-or-self::*[@name={}]", quote(value)),
        By::PartialLinkText => format!(
            "/descendant-or-self::*[contains(\"input a button\", name()) and contains(normalize-space(text()), {})]",
            quote(value)
        ),
        By::TagName => format!("/descendant-or-self::{}", value),
        By::XPath => value.to_string(),
    };

    Locator::xpath(path)
}

/// Same as [`normalize`] for a selector kind given by name; unknown kinds match nothing.
pub fn normalize_str(kind: &str, value: &str) -> Locator {
    match kind.parse::<By>() {
        Ok(by) => normalize(by, value),
        Err(_) => Locator::xpath(""),
    }
}

/// Quote `value` as an XPath string literal, double-quoted unless it contains `"`
pub fn quote(value: &str) -> String {
    if value.contains('"') {
        css::literal(value)
    } else {
        format!("\"{}\"", value)
    }
}

/// Top-level `|` alternatives of an XPath, ignoring bars inside predicates, calls and literals
fn alternatives(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut open: Option<char> = None;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match (open, c) {
            (Some(q), c) if c == q => open = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => open = Some(c),
            (None, '[') | (None, '(') => depth += 1,
            (None, ']') | (None, ')') => depth = depth.saturating_sub(1),
            (None, '|') if depth == 0 => {
                parts.push(path[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(path[start..].trim());
    parts
}

/// Join locators into a single XPath, in argument order.
///
/// Union alternatives are distributed, so every alternative of a later locator is scoped under
/// every alternative of the earlier ones.
pub fn join<'a, I>(locators: I) -> Locator
where
    I: IntoIterator<Item = &'a Locator>,
{
    let mut prefixes = vec![String::new()];
    for locator in locators {
        let value = locator.normalized().value;
        let parts = alternatives(&value);
        prefixes = prefixes
            .iter()
            .flat_map(|prefix| parts.iter().map(move |part| format!("{}{}", prefix, part)))
            .collect();
    }

    Locator::xpath(prefixes.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_and_name() {
        assert_eq!(
            normalize(By::Id, "main").value,
            r#"/descendant-or-self::*[@id="main"]"#
        );
        assert_eq!(
            normalize(By::Name, "email").value,
            r#"/descendant-or-self::*[@name="email"]"#
        );
        assert_eq!(normalize(By::Id, "main").by, By::XPath);
    }

    #[test]
    fn test_link_text_variants() {
        assert_eq!(
            normalize(By::LinkText, "Sign in").value,
            r#"/descendant-or-self::*[contains("input a button", name()) and normalize-space(text()) = "Sign in"]"#
        );
        assert!(normalize(By::PartialLinkText, "Sign")
            .value
            .contains(r#"contains(normalize-space(text()), "Sign")"#));
    }

    #[test]
    fn test_tag_class_and_xpath_passthrough() {
        assert_eq!(normalize(By::TagName, "td").value, "/descendant-or-self::td");
        assert_eq!(
            normalize(By::ClassName, "active").value,
            r#"/descendant-or-self::*[contains(@class, "active")]"#
        );
        assert_eq!(normalize(By::XPath, "//div[2]").value, "//div[2]");
    }

    #[test]
    fn test_css_selector_is_compiled() {
        assert_eq!(
            normalize(By::CssSelector, "div#main").value,
            "/descendant-or-self::div[@id = 'main']"
        );
    }

    #[test]
    fn test_broken_css_and_unknown_kind_match_nothing() {
        assert!(normalize(By::CssSelector, "div[").is_empty());
        assert!(normalize_str("accessibility id", "x").is_empty());
        assert_eq!(normalize_str("id", "x"), normalize(By::Id, "x"));
    }

    #[test]
    fn test_join_concatenates_in_order() {
        let a = normalize(By::Id, "a");
        let b = normalize(By::Id, "b");
        let joined = join([&a, &b]);
        assert_eq!(joined.by, By::XPath);
        assert_eq!(joined.value, format!("{}{}", a.value, b.value));

        let raw = Locator::new(By::Id, "b");
        assert_eq!(join([&a, &raw]).value, joined.value);
    }

    #[test]
    fn test_join_scopes_every_css_alternative() {
        let form = Locator::xpath("//form");
        let fields = normalize(By::CssSelector, "input, select");

        assert_eq!(
            join([&form, &fields]).value,
            "//form/descendant-or-self::input | //form/descendant-or-self::select"
        );
        assert_eq!(
            join([&Locator::xpath("//a | //b"), &Locator::xpath("/span[@x='|']")]).value,
            "//a/span[@x='|'] | //b/span[@x='|']"
        );
    }

    #[test]
    fn test_values_with_double_quotes_stay_valid_literals() {
        assert_eq!(quote("plain"), r#""plain""#);
        assert_eq!(quote(r#"say "hi""#), r#"'say "hi"'"#);
        assert_eq!(
            normalize(By::Id, r#"a"b"#).value,
            r#"/descendant-or-self::*[@id='a"b']"#
        );
        assert_eq!(
            quote(r#"it's "x""#),
            r#"concat('it', "'", 's "x"')"#
        );
    }

    #[test]
    fn test_by_round_trips_through_its_name() {
        for by in [
            By::ClassName,
            By::CssSelector,
            By::Id,
            By::LinkText,
            By::Name,
            By::PartialLinkText,
            By::TagName,
            By::XPath,
        ] {
            assert_eq!(by.as_str().parse::<By>(), Ok(by));
        }
    }
}
