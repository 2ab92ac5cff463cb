//! Detail page extraction.
//!
//! Two independent strategies fill `program_type` and `tuition_fee`:
//! direct selectors first, then a scan of every table row on the page
//! for fields the selectors left unset.

use chrono::Local;

use crate::browser::{ElementHandle, PageHandle, Selector, bounded, settle};
use crate::error::Result;
use crate::models::{
    BrowserSettings, DetailConfig, FieldValue, ProgramDetail, ProgramStub, SettleDelays,
};
use crate::services::ElementResolver;

/// Fetches and extracts one program detail page.
pub struct DetailFetcher<'a> {
    detail: &'a DetailConfig,
    browser: &'a BrowserSettings,
    settle: &'a SettleDelays,
    resolver: ElementResolver,
}

impl<'a> DetailFetcher<'a> {
    pub fn new(
        detail: &'a DetailConfig,
        browser: &'a BrowserSettings,
        settle: &'a SettleDelays,
    ) -> Self {
        Self {
            detail,
            browser,
            settle,
            resolver: ElementResolver::new(browser.query_timeout()),
        }
    }

    /// Visit `stub.detail_url` and extract its fields.
    ///
    /// Only navigation errors surface; anything that goes wrong while
    /// reading the page leaves the affected field unset.
    pub async fn fetch<P: PageHandle>(&self, page: &P, stub: &ProgramStub) -> Result<ProgramDetail> {
        bounded(
            self.browser.navigation_timeout(),
            format!("navigation to {}", stub.detail_url),
            page.goto(&stub.detail_url),
        )
        .await?;
        settle(self.settle.after_navigation_ms).await;

        let mut detail = ProgramDetail::from_stub(stub, Local::now());

        if let Some((selector, text)) = self
            .resolver
            .resolve_text(page, &self.detail.program_type_selectors)
            .await
        {
            log::debug!("Program type via '{}': {}", selector, text);
            detail.program_type = FieldValue::from_text(&text);
        }

        if let Some((selector, text)) = self
            .resolver
            .resolve_text(page, &self.detail.tuition_fee_selectors)
            .await
        {
            log::debug!("Tuition fee via '{}': {}", selector, text);
            detail.tuition_fee = FieldValue::from_text(&text);
        }

        if !detail.program_type.is_found() || !detail.tuition_fee.is_found() {
            match self.table_rows(page).await {
                Ok(rows) => {
                    let mut fields = DetailFields {
                        program_type: &mut detail.program_type,
                        tuition_fee: &mut detail.tuition_fee,
                    };
                    fields.apply_rows(
                        &rows,
                        &self.detail.type_keywords,
                        &self.detail.fee_keywords,
                    );
                }
                Err(e) => log::debug!("Table scan on {} failed: {}", stub.detail_url, e),
            }
        }

        log::debug!(
            "Extracted {}: type={}, fee={}",
            stub.detail_url,
            detail.program_type,
            detail.tuition_fee
        );
        Ok(detail)
    }

    /// Header and value text of every row with at least two cells.
    ///
    /// A row that cannot be read is skipped; rows before and after it
    /// still count.
    async fn table_rows<P: PageHandle>(&self, page: &P) -> Result<Vec<(String, String)>> {
        let query_timeout = self.browser.query_timeout();
        let row_selector = Selector::parse(&self.detail.table_row_selector)?;
        let rows = bounded(query_timeout, "table rows", page.query_all(&row_selector)).await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            match self.row_pair(row).await {
                Ok(Some(pair)) => pairs.push(pair),
                Ok(None) => {}
                Err(e) => log::debug!("Skipping table row {}: {}", idx + 1, e),
            }
        }
        Ok(pairs)
    }

    async fn row_pair<E: ElementHandle>(&self, row: &E) -> Result<Option<(String, String)>> {
        let query_timeout = self.browser.query_timeout();
        let cells = bounded(
            query_timeout,
            "table cells",
            row.query_all(&self.detail.table_cell_selector),
        )
        .await?;
        if cells.len() < 2 {
            return Ok(None);
        }
        let header = bounded(query_timeout, "header cell", cells[0].inner_text()).await?;
        let value = bounded(query_timeout, "value cell", cells[1].inner_text()).await?;
        Ok(Some((header.trim().to_string(), value)))
    }
}

/// Mutable view over the two extracted fields.
struct DetailFields<'a> {
    program_type: &'a mut FieldValue,
    tuition_fee: &'a mut FieldValue,
}

impl DetailFields<'_> {
    /// Fill unset fields from (header, value) rows.
    ///
    /// Matching is by substring of the header. A field that is already
    /// found is never overwritten; a blank value leaves it unset.
    fn apply_rows(&mut self, rows: &[(String, String)], type_keywords: &[String], fee_keywords: &[String]) {
        for (header, value) in rows {
            if !self.program_type.is_found() && contains_any(header, type_keywords) {
                *self.program_type = FieldValue::from_text(value);
            }
            if !self.tuition_fee.is_found() && contains_any(header, fee_keywords) {
                *self.tuition_fee = FieldValue::from_text(value);
            }
        }
    }
}

fn contains_any(header: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && header.contains(keyword.as_str()))
}
