//! In-memory driver over pre-rendered HTML.
//!
//! A `DocumentSite` maps URLs to HTML documents and search keywords to
//! result documents. Pages opened on it behave like a browser that has
//! already executed every script: navigation swaps the current document,
//! filling an input and pressing Enter loads the result document
//! registered for the typed keyword. Unknown URLs fail navigation.
//!
//! Elements are addressed by their child-index path from the document
//! root and re-resolved on every call, so handles stay `Send`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node};

use super::{ElementHandle, PageFactory, PageHandle, Selector, SelectorKind};
use crate::error::{AppError, Result};

/// Tags rendered on their own line by `inner_text`.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "section", "table", "tr", "ul",
];

const BLANK_DOCUMENT: &str = "<html><head></head><body></body></html>";

/// A set of pre-rendered documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentSite {
    pages: HashMap<String, Arc<str>>,
    searches: HashMap<String, Arc<str>>,
    delays: HashMap<String, Duration>,
}

impl DocumentSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` at `url`.
    pub fn with_page(mut self, url: impl Into<String>, html: impl AsRef<str>) -> Self {
        self.pages.insert(url.into(), Arc::from(html.as_ref()));
        self
    }

    /// Show `html` after `keyword` is typed into a field and submitted.
    pub fn with_search(mut self, keyword: impl Into<String>, html: impl AsRef<str>) -> Self {
        self.searches.insert(keyword.into(), Arc::from(html.as_ref()));
        self
    }

    /// Make navigation to `url` take `delay` before it completes.
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    /// Open a standalone page on this site.
    pub fn open(self: &Arc<Self>) -> DocumentPage {
        DocumentPage {
            site: Arc::clone(self),
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                source: Arc::from(BLANK_DOCUMENT),
                typed: HashMap::new(),
            }),
        }
    }
}

/// `PageFactory` over a `DocumentSite`, counting what it hands out.
#[derive(Debug)]
pub struct DocumentBrowser {
    site: Arc<DocumentSite>,
    opened: AtomicUsize,
    closed: AtomicBool,
    page_limit: Option<usize>,
}

impl DocumentBrowser {
    pub fn new(site: DocumentSite) -> Self {
        Self {
            site: Arc::new(site),
            opened: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            page_limit: None,
        }
    }

    /// Refuse to open more than `limit` pages.
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Number of pages opened so far.
    pub fn pages_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFactory for DocumentBrowser {
    type Page = DocumentPage;

    async fn open_page(&self) -> Result<DocumentPage> {
        if self.is_closed() {
            return Err(AppError::browser("document browser already closed"));
        }
        if self.page_limit.is_some_and(|limit| self.pages_opened() >= limit) {
            return Err(AppError::browser("page limit reached"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.site.open())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct PageState {
    url: String,
    source: Arc<str>,
    /// Values typed into inputs, keyed by the selector used to fill them
    typed: HashMap<String, String>,
}

/// A page showing one document of a `DocumentSite`.
#[derive(Debug)]
pub struct DocumentPage {
    site: Arc<DocumentSite>,
    state: Mutex<PageState>,
}

impl DocumentPage {
    /// URL of the current document.
    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn source(&self) -> Arc<str> {
        Arc::clone(&self.lock().source)
    }

    fn load(&self, url: &str, source: Arc<str>) {
        let mut state = self.lock();
        state.url = url.to_string();
        state.source = source;
        state.typed.clear();
    }

    fn select(&self, selector: &Selector) -> Result<Vec<DocumentElement>> {
        let source = self.source();
        let html = Html::parse_document(&source);
        let paths: Vec<Vec<usize>> = match selector.kind() {
            SelectorKind::Css(css) => {
                let sel = parse_css(css)?;
                html.select(&sel).map(path_of).collect()
            }
            SelectorKind::HasText {
                anchor,
                needle,
                sibling,
            } => {
                let anchor_sel = parse_css(anchor)?;
                let sibling_sel = sibling.as_deref().map(parse_css).transpose()?;
                html.select(&anchor_sel)
                    .filter(|el| el.text().collect::<String>().contains(needle.as_str()))
                    .filter_map(|el| match &sibling_sel {
                        None => Some(el),
                        Some(sel) => el
                            .next_siblings()
                            .find_map(ElementRef::wrap)
                            .filter(|next| sel.matches(next)),
                    })
                    .map(path_of)
                    .collect()
            }
        };
        Ok(paths
            .into_iter()
            .map(|path| DocumentElement {
                source: Arc::clone(&source),
                path,
            })
            .collect())
    }

    fn first(&self, selector: &Selector) -> Result<DocumentElement> {
        self.select(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::query(selector.as_str(), "no element matches"))
    }
}

#[async_trait]
impl PageHandle for DocumentPage {
    type Element = DocumentElement;

    async fn goto(&self, url: &str) -> Result<()> {
        if let Some(delay) = self.site.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        let source = self
            .site
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::navigation(url, "no document registered"))?;
        self.load(url, source);
        Ok(())
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<DocumentElement>> {
        self.select(selector)
    }

    async fn fill(&self, selector: &Selector, text: &str) -> Result<()> {
        self.first(selector)?;
        self.lock()
            .typed
            .insert(selector.as_str().to_string(), text.to_string());
        Ok(())
    }

    async fn press(&self, selector: &Selector, key: &str) -> Result<()> {
        self.first(selector)?;
        if key != "Enter" {
            return Ok(());
        }

        let (current_url, keyword) = {
            let state = self.lock();
            let keyword = state
                .typed
                .get(selector.as_str())
                .cloned()
                .unwrap_or_default();
            (state.url.clone(), keyword)
        };

        let source = self
            .site
            .searches
            .get(&keyword)
            .cloned()
            .unwrap_or_else(|| Arc::from(BLANK_DOCUMENT));
        self.load(&format!("{current_url}#search={keyword}"), source);
        Ok(())
    }
}

/// An element of a `DocumentPage`, addressed by its path from the root.
#[derive(Debug, Clone)]
pub struct DocumentElement {
    source: Arc<str>,
    path: Vec<usize>,
}

impl DocumentElement {
    fn with<R>(&self, f: impl FnOnce(ElementRef<'_>) -> R) -> Result<R> {
        let html = Html::parse_document(&self.source);
        let element = locate(&html, &self.path)
            .ok_or_else(|| AppError::extraction("element is detached from its document"))?;
        Ok(f(element))
    }
}

#[async_trait]
impl ElementHandle for DocumentElement {
    async fn inner_text(&self) -> Result<String> {
        self.with(inner_text)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.with(|el| el.value().attr(name).map(str::to_string))
    }

    async fn query_all(&self, css: &str) -> Result<Vec<DocumentElement>> {
        let sel = parse_css(css)?;
        let paths = self.with(|el| el.select(&sel).map(path_of).collect::<Vec<_>>())?;
        Ok(paths
            .into_iter()
            .map(|path| DocumentElement {
                source: Arc::clone(&self.source),
                path,
            })
            .collect())
    }
}

fn parse_css(css: &str) -> Result<scraper::Selector> {
    scraper::Selector::parse(css).map_err(|e| AppError::query(css, format!("{e:?}")))
}

fn path_of(element: ElementRef<'_>) -> Vec<usize> {
    let mut path = Vec::new();
    let mut node = *element;
    while let Some(parent) = node.parent() {
        path.push(node.prev_siblings().count());
        node = parent;
    }
    path.reverse();
    path
}

fn locate<'a>(html: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut node = html.tree.root();
    for &index in path {
        node = node.children().nth(index)?;
    }
    ElementRef::wrap(node)
}

/// Approximate a browser's `innerText`: block elements start a new line.
fn inner_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants().skip(1) {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => out.push('\n'),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <input type="search" placeholder="search">
          <ul class="t-programs">
            <li><a href="/programs/1"><h3>Computer Engineering</h3><div>Engineering › Computer</div><div>Chulalongkorn University</div></a></li>
            <li><span>No link here</span></li>
          </ul>
          <dl>
            <dt>ประเภทหลักสูตร</dt><dd> ภาษาไทย ปกติ </dd>
            <dt>ค่าใช้จ่าย</dt><dd>21,000 บาท</dd>
          </dl>
        </body></html>
    "#;

    fn page() -> DocumentPage {
        Arc::new(DocumentSite::new().with_page("https://example.com/", LISTING)).open()
    }

    #[tokio::test]
    async fn test_goto_unknown_url_fails() {
        let page = page();
        let err = page.goto("https://example.com/missing").await.unwrap_err();
        assert!(matches!(err, AppError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_css_query_and_inner_text() {
        let page = page();
        page.goto("https://example.com/").await.unwrap();

        let items = page
            .query_all(&Selector::css("ul.t-programs > li"))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let text = items[0].inner_text().await.unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(
            lines,
            vec![
                "Computer Engineering",
                "Engineering › Computer",
                "Chulalongkorn University"
            ]
        );

        let links = items[0].query_all("a").await.unwrap();
        assert_eq!(
            links[0].attribute("href").await.unwrap().as_deref(),
            Some("/programs/1")
        );
        assert!(items[1].query_all("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_has_text_sibling_query() {
        let page = page();
        page.goto("https://example.com/").await.unwrap();

        let sel = Selector::parse("dt:has-text('ค่าใช้จ่าย') + dd").unwrap();
        let found = page.query_all(&sel).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].inner_text().await.unwrap(), "21,000 บาท");

        let none = Selector::parse("dt:has-text('ค่าใช้จ่าย') + span").unwrap();
        assert!(page.query_all(&none).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_css_is_query_error() {
        let page = page();
        page.goto("https://example.com/").await.unwrap();
        let err = page.query_all(&Selector::css("[[invalid")).await.unwrap_err();
        assert!(matches!(err, AppError::Query { .. }));
    }

    #[tokio::test]
    async fn test_fill_and_enter_loads_search_results() {
        let site = DocumentSite::new()
            .with_page("https://example.com/", LISTING)
            .with_search("robotics", "<ul class='hits'><li>one</li></ul>");
        let page = Arc::new(site).open();
        page.goto("https://example.com/").await.unwrap();

        let input = Selector::css("input[type='search']");
        page.fill(&input, "").await.unwrap();
        page.fill(&input, "robotics").await.unwrap();
        page.press(&input, "Enter").await.unwrap();

        assert!(page.url().ends_with("#search=robotics"));
        let hits = page.query_all(&Selector::css("ul.hits > li")).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_fill_without_target_fails() {
        let page = page();
        page.goto("https://example.com/").await.unwrap();
        assert!(page.fill(&Selector::css("textarea"), "x").await.is_err());
    }

    #[tokio::test]
    async fn test_browser_counts_pages_and_closes() {
        let browser = DocumentBrowser::new(DocumentSite::new());
        browser.open_page().await.unwrap();
        browser.open_page().await.unwrap();
        assert_eq!(browser.pages_opened(), 2);

        browser.close().await.unwrap();
        assert!(browser.is_closed());
        assert!(browser.open_page().await.is_err());
    }
}
