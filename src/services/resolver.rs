//! Element resolution over ordered selector candidates.
//!
//! Candidates are tried in order and the first one that matches wins.
//! Later candidates are never consulted once an earlier one matched, no
//! matter how many elements they would return.

use std::time::Duration;

use crate::browser::{ElementHandle, PageHandle, Selector, bounded};
use crate::error::Result;

/// The winning candidate and the elements it matched.
#[derive(Debug)]
pub struct Resolution<E> {
    pub selector: Selector,
    pub elements: Vec<E>,
}

/// Resolves ordered selector lists against a page.
#[derive(Debug, Clone, Copy)]
pub struct ElementResolver {
    query_timeout: Duration,
}

impl ElementResolver {
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    /// First candidate matching at least one element, or `None`.
    ///
    /// Unparsable candidates and failed queries count as misses.
    pub async fn resolve<P: PageHandle>(
        &self,
        page: &P,
        candidates: &[String],
    ) -> Option<Resolution<P::Element>> {
        for raw in candidates {
            let Some(selector) = parse_candidate(raw) else {
                continue;
            };
            match self.query(page, &selector).await {
                Ok(elements) if !elements.is_empty() => {
                    log::debug!("Resolved {} element(s) with '{}'", elements.len(), selector);
                    return Some(Resolution { selector, elements });
                }
                Ok(_) => {}
                Err(e) => log::debug!("Selector '{}' skipped: {}", raw, e),
            }
        }
        None
    }

    /// First candidate whose first element has non-blank text.
    ///
    /// Returns the winning selector and the trimmed text.
    pub async fn resolve_text<P: PageHandle>(
        &self,
        page: &P,
        candidates: &[String],
    ) -> Option<(Selector, String)> {
        for raw in candidates {
            let Some(selector) = parse_candidate(raw) else {
                continue;
            };
            match self.first_text(page, &selector).await {
                Ok(Some(text)) => return Some((selector, text)),
                Ok(None) => {}
                Err(e) => log::debug!("Selector '{}' skipped: {}", raw, e),
            }
        }
        None
    }

    async fn query<P: PageHandle>(&self, page: &P, selector: &Selector) -> Result<Vec<P::Element>> {
        bounded(
            self.query_timeout,
            format!("query '{selector}'"),
            page.query_all(selector),
        )
        .await
    }

    async fn first_text<P: PageHandle>(&self, page: &P, selector: &Selector) -> Result<Option<String>> {
        let elements = self.query(page, selector).await?;
        let Some(first) = elements.first() else {
            return Ok(None);
        };
        let text = bounded(
            self.query_timeout,
            format!("text of '{selector}'"),
            first.inner_text(),
        )
        .await?;
        let trimmed = text.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }
}

fn parse_candidate(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::document::{DocumentPage, DocumentSite};

    const PAGE: &str = r#"
        <html><body>
          <div class="a">only one</div>
          <div class="b">first b</div>
          <div class="b">second b</div>
          <div class="b">third b</div>
          <span class="blank">   </span>
          <span class="filled">  value  </span>
        </body></html>
    "#;

    async fn page() -> DocumentPage {
        let page = Arc::new(DocumentSite::new().with_page("https://example.com/", PAGE)).open();
        page.goto("https://example.com/").await.unwrap();
        page
    }

    fn candidates(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn resolver() -> ElementResolver {
        ElementResolver::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_priority_beats_cardinality() {
        let page = page().await;
        let found = resolver()
            .resolve(&page, &candidates(&[".missing", ".a", ".b"]))
            .await
            .unwrap();
        assert_eq!(found.selector.as_str(), ".a");
        assert_eq!(found.elements.len(), 1);
    }

    #[tokio::test]
    async fn test_query_errors_are_misses() {
        let page = page().await;
        let found = resolver()
            .resolve(&page, &candidates(&["[[broken", "td:has-text(x)", ".b"]))
            .await
            .unwrap();
        assert_eq!(found.selector.as_str(), ".b");
        assert_eq!(found.elements.len(), 3);
    }

    #[tokio::test]
    async fn test_not_found() {
        let page = page().await;
        assert!(
            resolver()
                .resolve(&page, &candidates(&[".x", ".y"]))
                .await
                .is_none()
        );
        assert!(resolver().resolve(&page, &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_text_skips_blank_matches() {
        let page = page().await;
        let (selector, text) = resolver()
            .resolve_text(&page, &candidates(&[".blank", ".filled"]))
            .await
            .unwrap();
        assert_eq!(selector.as_str(), ".filled");
        assert_eq!(text, "value");
    }

    #[tokio::test]
    async fn test_resolve_text_uses_first_element_only() {
        let page = page().await;
        let (_, text) = resolver()
            .resolve_text(&page, &candidates(&[".b"]))
            .await
            .unwrap();
        assert_eq!(text, "first b");
    }
}
