//! Selector expressions.
//!
//! Plain CSS plus one text-qualified form borrowed from browser test
//! tooling:
//!
//! ```text
//! dt:has-text('ค่าใช้จ่าย')          every <dt> whose text contains the needle
//! dt:has-text('ค่าใช้จ่าย') + dd     the <dd> right after such a <dt>
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, Result};

static HAS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<anchor>.+?):has-text\((?:'(?P<single>[^']*)'|"(?P<double>[^"]*)")\)\s*(?P<rest>.*)$"#)
        .expect("has-text pattern is valid")
});

/// A parsed selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    kind: SelectorKind,
}

/// How a selector is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorKind {
    /// Handed to the document's CSS engine as is.
    Css(String),
    /// Elements matching `anchor` whose text contains `needle`, or their
    /// next element sibling when `sibling` is set and matches it.
    HasText {
        anchor: String,
        needle: String,
        sibling: Option<String>,
    },
}

impl Selector {
    /// Parse a selector expression.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::selector(raw, "empty selector"));
        }

        if !trimmed.contains(":has-text(") {
            return Ok(Self::css(trimmed));
        }

        let caps = HAS_TEXT
            .captures(trimmed)
            .ok_or_else(|| AppError::selector(raw, "malformed :has-text()"))?;

        let anchor = caps["anchor"].trim().to_string();
        let needle = caps
            .name("single")
            .or_else(|| caps.name("double"))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        if needle.is_empty() {
            return Err(AppError::selector(raw, ":has-text() needs a non-empty needle"));
        }

        let rest = caps["rest"].trim();
        let sibling = if rest.is_empty() {
            None
        } else if let Some(target) = rest.strip_prefix('+') {
            let target = target.trim();
            if target.is_empty() || target.contains(":has-text(") {
                return Err(AppError::selector(raw, "invalid sibling after :has-text()"));
            }
            Some(target.to_string())
        } else {
            return Err(AppError::selector(
                raw,
                "only '+' may follow :has-text()",
            ));
        };

        Ok(Self {
            raw: trimmed.to_string(),
            kind: SelectorKind::HasText {
                anchor,
                needle,
                sibling,
            },
        })
    }

    /// Wrap a plain CSS selector without inspecting it.
    pub fn css(css: impl Into<String>) -> Self {
        let css = css.into();
        Self {
            raw: css.clone(),
            kind: SelectorKind::Css(css),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &SelectorKind {
        &self.kind
    }
}

impl FromStr for Selector {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_css() {
        let sel = Selector::parse("ul.t-programs > li").unwrap();
        assert_eq!(sel.kind(), &SelectorKind::Css("ul.t-programs > li".to_string()));
        assert_eq!(sel.as_str(), "ul.t-programs > li");
    }

    #[test]
    fn test_has_text_with_sibling() {
        let sel = Selector::parse("dt:has-text('ค่าใช้จ่าย') + dd").unwrap();
        assert_eq!(
            sel.kind(),
            &SelectorKind::HasText {
                anchor: "dt".to_string(),
                needle: "ค่าใช้จ่าย".to_string(),
                sibling: Some("dd".to_string()),
            }
        );
    }

    #[test]
    fn test_has_text_double_quotes_without_sibling() {
        let sel = Selector::parse(r#"td.label:has-text("ประเภท")"#).unwrap();
        assert_eq!(
            sel.kind(),
            &SelectorKind::HasText {
                anchor: "td.label".to_string(),
                needle: "ประเภท".to_string(),
                sibling: None,
            }
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("dt:has-text(ค่า) + dd").is_err());
        assert!(Selector::parse("dt:has-text('') + dd").is_err());
        assert!(Selector::parse("dt:has-text('x') > dd").is_err());
        assert!(Selector::parse("dt:has-text('x') +").is_err());
    }
}
