//! Search result harvesting.
//!
//! Types a keyword into the site's search box and turns every result item
//! into a `ProgramStub`, in document order.

use url::Url;

use crate::browser::{ElementHandle, PageHandle, bounded, settle};
use crate::error::Result;
use crate::models::{BrowserSettings, ProgramStub, SettleDelays, SiteConfig};
use crate::services::ElementResolver;
use crate::utils::{collapse_whitespace, resolve_url};

/// Harvests program stubs for one keyword at a time.
pub struct SearchHarvester<'a> {
    site: &'a SiteConfig,
    browser: &'a BrowserSettings,
    settle: &'a SettleDelays,
    resolver: ElementResolver,
    base_url: Url,
}

impl<'a> SearchHarvester<'a> {
    pub fn new(
        site: &'a SiteConfig,
        browser: &'a BrowserSettings,
        settle: &'a SettleDelays,
    ) -> Result<Self> {
        Ok(Self {
            site,
            browser,
            settle,
            resolver: ElementResolver::new(browser.query_timeout()),
            base_url: Url::parse(&site.base_url)?,
        })
    }

    /// Search for `keyword` and return the listed programs.
    ///
    /// Never fails: navigation problems, a missing search box or an empty
    /// result list all yield an empty vector.
    pub async fn harvest<P: PageHandle>(&self, page: &P, keyword: &str) -> Vec<ProgramStub> {
        log::info!("Searching for keyword: '{}'", keyword);
        match self.try_harvest(page, keyword).await {
            Ok(stubs) => stubs,
            Err(e) => {
                log::warn!("Search for '{}' failed: {}", keyword, e);
                Vec::new()
            }
        }
    }

    async fn try_harvest<P: PageHandle>(&self, page: &P, keyword: &str) -> Result<Vec<ProgramStub>> {
        let navigation_timeout = self.browser.navigation_timeout();
        bounded(
            navigation_timeout,
            format!("navigation to {}", self.site.base_url),
            page.goto(&self.site.base_url),
        )
        .await?;
        settle(self.settle.after_navigation_ms).await;

        let Some(input) = self
            .resolver
            .resolve(page, &self.site.search_input_selectors)
            .await
        else {
            log::warn!("Search input not found on {}", self.site.base_url);
            return Ok(Vec::new());
        };
        log::debug!("Found search input by selector: {}", input.selector);

        let query_timeout = self.browser.query_timeout();
        bounded(query_timeout, "clear search input", page.fill(&input.selector, "")).await?;
        settle(self.settle.after_clear_ms).await;
        bounded(query_timeout, "type keyword", page.fill(&input.selector, keyword)).await?;
        bounded(
            navigation_timeout,
            "submit search",
            page.press(&input.selector, "Enter"),
        )
        .await?;
        settle(self.settle.after_submit_ms).await;

        let Some(results) = self
            .resolver
            .resolve(page, &self.site.result_item_selectors)
            .await
        else {
            log::warn!("No search results for '{}'", keyword);
            return Ok(Vec::new());
        };
        log::info!(
            "Found {} result(s) using selector: {}",
            results.elements.len(),
            results.selector
        );

        let mut stubs = Vec::with_capacity(results.elements.len());
        for (idx, item) in results.elements.iter().enumerate() {
            match self.extract_stub(item, keyword).await {
                Ok(Some(stub)) => {
                    log::debug!("  {}. {}", idx + 1, stub.program_name);
                    stubs.push(stub);
                }
                Ok(None) => log::warn!("Result item #{} has no detail link, skipped", idx + 1),
                Err(e) => log::warn!("Error processing result item #{}: {}", idx + 1, e),
            }
        }
        Ok(stubs)
    }

    /// Build a stub from one result item; `None` when it has no link.
    async fn extract_stub<E: ElementHandle>(
        &self,
        item: &E,
        keyword: &str,
    ) -> Result<Option<ProgramStub>> {
        let query_timeout = self.browser.query_timeout();
        let raw_text = bounded(query_timeout, "result item text", item.inner_text()).await?;

        let links = bounded(
            query_timeout,
            "result item link",
            item.query_all(&self.site.link_selector),
        )
        .await?;
        let Some(link) = links.first() else {
            return Ok(None);
        };
        let Some(href) = bounded(query_timeout, "link href", link.attribute("href")).await? else {
            return Ok(None);
        };
        let href = href.trim();
        if href.is_empty() {
            return Ok(None);
        }

        let lines = ListingLines::parse(
            &raw_text,
            &self.site.breadcrumb_separator,
            &self.site.breadcrumb_arrow,
        );

        Ok(Some(ProgramStub {
            keyword: keyword.to_string(),
            program_name: lines.program_name,
            faculty: lines.faculty,
            university: lines.university,
            detail_url: resolve_url(&self.base_url, href)?,
            raw_text,
        }))
    }
}

/// The three leading lines of a result item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingLines {
    pub program_name: String,
    pub faculty: String,
    pub university: String,
}

impl ListingLines {
    /// Split item text into trimmed non-empty lines: name, faculty, university.
    ///
    /// Breadcrumb separators in the faculty line become `arrow`.
    pub fn parse(text: &str, separator: &str, arrow: &str) -> Self {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let program_name = lines.next().unwrap_or_default().to_string();
        let faculty = lines
            .next()
            .map(|line| normalize_breadcrumb(line, separator, arrow))
            .unwrap_or_default();
        let university = lines.next().unwrap_or_default().to_string();
        Self {
            program_name,
            faculty,
            university,
        }
    }
}

fn normalize_breadcrumb(line: &str, separator: &str, arrow: &str) -> String {
    if separator.is_empty() {
        return collapse_whitespace(line);
    }
    collapse_whitespace(&line.replace(separator, &format!(" {arrow} ")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::document::{DocumentPage, DocumentSite};
    use crate::models::Config;

    const HOME: &str = r#"
        <html><body>
          <input type="search" placeholder="ค้นหา">
        </body></html>
    "#;

    const THREE_RESULTS: &str = r#"
        <html><body>
          <ul class="t-programs">
            <li><a href="/programs/10"><h3>Program A</h3><div>Faculty A › Major A</div><div>University A</div></a></li>
            <li><h3>Program B</h3><div>Faculty B</div><div>University B</div></li>
            <li><a href="https://other.example.org/p/30"><h3>Program C</h3><div>Faculty C</div><div>University C</div></a></li>
          </ul>
        </body></html>
    "#;

    fn config() -> Config {
        let mut config = Config::default();
        config.site.base_url = "https://example.com".to_string();
        config.crawler.settle = SettleDelays::none();
        config
    }

    fn page(site: DocumentSite) -> DocumentPage {
        Arc::new(site).open()
    }

    #[test]
    fn test_listing_lines() {
        let lines = ListingLines::parse(
            "\n  วิศวกรรมคอมพิวเตอร์ \n\n คณะวิศวกรรมศาสตร์ › สาขาคอมพิวเตอร์\n จุฬาลงกรณ์มหาวิทยาลัย\nextra",
            "›",
            ">",
        );
        assert_eq!(lines.program_name, "วิศวกรรมคอมพิวเตอร์");
        assert_eq!(lines.faculty, "คณะวิศวกรรมศาสตร์ > สาขาคอมพิวเตอร์");
        assert_eq!(lines.university, "จุฬาลงกรณ์มหาวิทยาลัย");
    }

    #[test]
    fn test_listing_lines_short_text() {
        let lines = ListingLines::parse("Only a name", "›", ">");
        assert_eq!(lines.program_name, "Only a name");
        assert_eq!(lines.faculty, "");
        assert_eq!(lines.university, "");
    }

    #[test]
    fn test_breadcrumb_without_separator() {
        assert_eq!(normalize_breadcrumb(" a  ›b ", "", ">"), "a ›b");
    }

    #[tokio::test]
    async fn test_harvest_skips_items_without_links() {
        let config = config();
        let site = DocumentSite::new()
            .with_page("https://example.com", HOME)
            .with_search("X", THREE_RESULTS);
        let page = page(site);

        let harvester =
            SearchHarvester::new(&config.site, &config.browser, &config.crawler.settle).unwrap();
        let stubs = harvester.harvest(&page, "X").await;

        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].program_name, "Program A");
        assert_eq!(stubs[0].faculty, "Faculty A > Major A");
        assert_eq!(stubs[0].university, "University A");
        assert_eq!(stubs[0].detail_url, "https://example.com/programs/10");
        assert_eq!(stubs[0].keyword, "X");
        assert!(stubs[0].raw_text.contains("Program A"));
        assert_eq!(stubs[1].program_name, "Program C");
        assert_eq!(stubs[1].detail_url, "https://other.example.org/p/30");
    }

    #[tokio::test]
    async fn test_harvest_without_search_input_is_empty() {
        let config = config();
        let site = DocumentSite::new()
            .with_page("https://example.com", "<html><body><p>maintenance</p></body></html>")
            .with_search("X", THREE_RESULTS);
        let page = page(site);

        let harvester =
            SearchHarvester::new(&config.site, &config.browser, &config.crawler.settle).unwrap();
        assert!(harvester.harvest(&page, "X").await.is_empty());
    }

    #[tokio::test]
    async fn test_harvest_without_results_is_empty() {
        let config = config();
        let site = DocumentSite::new().with_page("https://example.com", HOME);
        let page = page(site);

        let harvester =
            SearchHarvester::new(&config.site, &config.browser, &config.crawler.settle).unwrap();
        assert!(harvester.harvest(&page, "nothing").await.is_empty());
    }

    #[tokio::test]
    async fn test_harvest_navigation_failure_is_empty() {
        let config = config();
        let page = page(DocumentSite::new());

        let harvester =
            SearchHarvester::new(&config.site, &config.browser, &config.crawler.settle).unwrap();
        assert!(harvester.harvest(&page, "X").await.is_empty());
    }

    #[tokio::test]
    async fn test_harvest_falls_back_to_later_list_selector() {
        let config = config();
        let results = r#"
            <div data-testid="program-item"><a href="p/1"><h3>Fallback</h3><div>F</div><div>U</div></a></div>
        "#;
        let site = DocumentSite::new()
            .with_page("https://example.com", HOME)
            .with_search("Y", results);
        let page = page(site);

        let harvester =
            SearchHarvester::new(&config.site, &config.browser, &config.crawler.settle).unwrap();
        let stubs = harvester.harvest(&page, "Y").await;
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].detail_url, "https://example.com/p/1");
    }
}
