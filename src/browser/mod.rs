//! Page-query capability.
//!
//! The crawl only needs a handful of browser operations: navigate, query,
//! read text and attributes, type into a field and press a key. They are
//! expressed as traits so the services never see a concrete driver.
//!
//! - `chromium`: Chrome over the DevTools protocol (`browser` feature)
//! - `document`: pre-rendered HTML held in memory

#[cfg(feature = "browser")]
pub mod chromium;
pub mod document;
mod selector;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub use selector::{Selector, SelectorKind};

/// An element handle obtained from a page query.
#[async_trait]
pub trait ElementHandle: Send + Sync + Sized {
    /// Rendered text of the element.
    async fn inner_text(&self) -> Result<String>;

    /// Attribute value, `None` when absent.
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// Descendants matching a CSS selector, in document order.
    async fn query_all(&self, css: &str) -> Result<Vec<Self>>;
}

/// A single live page. Operations on one page never overlap.
#[async_trait]
pub trait PageHandle: Send + Sync {
    type Element: ElementHandle;

    /// Navigate and wait until the document is ready.
    async fn goto(&self, url: &str) -> Result<()>;

    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &Selector) -> Result<Vec<Self::Element>>;

    /// Replace the value of the first matching input with `text`.
    async fn fill(&self, selector: &Selector, text: &str) -> Result<()>;

    /// Press a named key (`"Enter"`) on the first matching element.
    async fn press(&self, selector: &Selector, key: &str) -> Result<()>;
}

/// Source of isolated pages for one crawl run.
#[async_trait]
pub trait PageFactory: Send + Sync {
    type Page: PageHandle;

    /// Open a page in its own browsing context.
    async fn open_page(&self) -> Result<Self::Page>;

    /// Release the underlying browser. Called exactly once per run.
    async fn close(&self) -> Result<()>;
}

/// Run `fut` with a time budget; running out is an `AppError::Timeout`.
pub async fn bounded<T, F>(limit: Duration, operation: impl Into<String>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::timeout(operation, limit)),
    }
}

/// Sleep for a settle delay given in milliseconds; zero returns at once.
pub async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
