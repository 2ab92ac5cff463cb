//! Program records produced by the crawl.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A program listed in the search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStub {
    /// Search keyword that produced this stub
    pub keyword: String,

    /// First line of the result item
    pub program_name: String,

    /// Second line, breadcrumb separators normalized
    pub faculty: String,

    /// Third line
    pub university: String,

    /// Absolute URL of the detail page
    pub detail_url: String,

    /// Untouched item text, kept for diagnostics
    pub raw_text: String,
}

/// An extracted field, or the marker that no strategy produced one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    NotFound,
    Found(String),
}

impl FieldValue {
    /// Build from raw element text. Blank text counts as not found.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::NotFound
        } else {
            Self::Found(trimmed.to_string())
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Found(text) => Some(text),
            Self::NotFound => None,
        }
    }

    /// Text for export, with `sentinel` standing in for a missing value.
    pub fn render<'a>(&'a self, sentinel: &'a str) -> &'a str {
        self.as_deref().unwrap_or(sentinel)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(text) => f.write_str(text),
            Self::NotFound => f.write_str("<not found>"),
        }
    }
}

/// A program with its detail page fields filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDetail {
    pub keyword: String,
    pub program_name: String,
    pub faculty: String,
    pub university: String,
    pub program_type: FieldValue,
    pub tuition_fee: FieldValue,
    pub detail_url: String,
    pub fetch_timestamp: DateTime<Local>,
}

impl ProgramDetail {
    /// Start a detail record from its stub with both fields unset.
    pub fn from_stub(stub: &ProgramStub, fetched_at: DateTime<Local>) -> Self {
        Self {
            keyword: stub.keyword.clone(),
            program_name: stub.program_name.clone(),
            faculty: stub.faculty.clone(),
            university: stub.university.clone(),
            program_type: FieldValue::NotFound,
            tuition_fee: FieldValue::NotFound,
            detail_url: stub.detail_url.clone(),
            fetch_timestamp: fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_trims() {
        assert_eq!(
            FieldValue::from_text("  45,000 บาท  "),
            FieldValue::Found("45,000 บาท".to_string())
        );
    }

    #[test]
    fn test_from_text_blank_is_not_found() {
        assert_eq!(FieldValue::from_text(" \n\t "), FieldValue::NotFound);
        assert_eq!(FieldValue::from_text(""), FieldValue::NotFound);
    }

    #[test]
    fn test_render_uses_sentinel() {
        assert_eq!(FieldValue::NotFound.render("ไม่พบข้อมูล"), "ไม่พบข้อมูล");
        assert_eq!(
            FieldValue::Found("ภาคปกติ".to_string()).render("ไม่พบข้อมูล"),
            "ภาคปกติ"
        );
    }

    #[test]
    fn test_from_stub_starts_unset() {
        let stub = ProgramStub {
            keyword: "k".to_string(),
            program_name: "Program".to_string(),
            faculty: "Faculty".to_string(),
            university: "University".to_string(),
            detail_url: "https://example.com/p/1".to_string(),
            raw_text: "Program\nFaculty\nUniversity".to_string(),
        };
        let detail = ProgramDetail::from_stub(&stub, Local::now());
        assert_eq!(detail.program_type, FieldValue::NotFound);
        assert_eq!(detail.tuition_fee, FieldValue::NotFound);
        assert_eq!(detail.detail_url, stub.detail_url);
    }
}
