//! Crawl run statistics.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Counters collected over one crawl run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStats {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub keyword_count: usize,
    pub empty_keywords: usize,
    pub stub_count: usize,
    pub detail_count: usize,
    pub detail_failures: usize,
    pub cancelled: bool,
}

impl CrawlStats {
    pub fn started(start_time: DateTime<Local>) -> Self {
        Self {
            start_time,
            end_time: start_time,
            keyword_count: 0,
            empty_keywords: 0,
            stub_count: 0,
            detail_count: 0,
            detail_failures: 0,
            cancelled: false,
        }
    }

    /// Fold another shard's counters into this one.
    pub fn absorb(&mut self, other: &CrawlStats) {
        self.start_time = self.start_time.min(other.start_time);
        self.end_time = self.end_time.max(other.end_time);
        self.keyword_count += other.keyword_count;
        self.empty_keywords += other.empty_keywords;
        self.stub_count += other.stub_count;
        self.detail_count += other.detail_count;
        self.detail_failures += other.detail_failures;
        self.cancelled |= other.cancelled;
    }

    /// Share of stubs whose detail page was fetched.
    pub fn success_rate(&self) -> f64 {
        if self.stub_count == 0 {
            return 1.0;
        }
        self.detail_count as f64 / self.stub_count as f64
    }

    /// Rows for `utils::log::summary`.
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Keywords", self.keyword_count.to_string()),
            ("Keywords without results", self.empty_keywords.to_string()),
            ("Programs listed", self.stub_count.to_string()),
            ("Details fetched", self.detail_count.to_string()),
            ("Detail failures", self.detail_failures.to_string()),
            (
                "Success rate",
                format!("{:.1}%", self.success_rate() * 100.0),
            ),
            (
                "Elapsed",
                format!(
                    "{:.1}s",
                    (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
                ),
            ),
            ("Cancelled", self.cancelled.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut stats = CrawlStats::started(Local::now());
        assert_eq!(stats.success_rate(), 1.0);
        stats.stub_count = 4;
        stats.detail_count = 3;
        assert_eq!(stats.success_rate(), 0.75);
    }

    #[test]
    fn test_absorb_adds_counters() {
        let now = Local::now();
        let mut a = CrawlStats::started(now);
        a.keyword_count = 1;
        a.stub_count = 2;
        let mut b = CrawlStats::started(now);
        b.keyword_count = 2;
        b.detail_failures = 1;
        b.cancelled = true;

        a.absorb(&b);
        assert_eq!(a.keyword_count, 3);
        assert_eq!(a.stub_count, 2);
        assert_eq!(a.detail_failures, 1);
        assert!(a.cancelled);
    }
}
