//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::browser::Selector;
use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Search page location and listing selectors
    #[serde(default)]
    pub site: SiteConfig,

    /// Detail page selectors and table fallback rules
    #[serde(default)]
    pub detail: DetailConfig,

    /// Browser launch and navigation settings
    #[serde(default)]
    pub browser: BrowserSettings,

    /// Pacing, settle delays and sharding
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Export settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Named keyword lists offered to the operator
    #[serde(default = "defaults::presets")]
    pub presets: Vec<KeywordPreset>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.site.base_url.trim().is_empty() {
            return Err(AppError::validation("site.base_url is empty"));
        }
        Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url is invalid: {e}")))?;
        if self.site.search_input_selectors.is_empty() {
            return Err(AppError::validation("site.search_input_selectors is empty"));
        }
        if self.site.result_item_selectors.is_empty() {
            return Err(AppError::validation("site.result_item_selectors is empty"));
        }
        if self.detail.program_type_selectors.is_empty()
            && self.detail.tuition_fee_selectors.is_empty()
            && self.detail.table_row_selector.trim().is_empty()
        {
            return Err(AppError::validation(
                "detail has no selectors and no table fallback",
            ));
        }
        for (section, list) in [
            ("site.search_input_selectors", &self.site.search_input_selectors),
            ("site.result_item_selectors", &self.site.result_item_selectors),
            ("detail.program_type_selectors", &self.detail.program_type_selectors),
            ("detail.tuition_fee_selectors", &self.detail.tuition_fee_selectors),
        ] {
            for raw in list {
                Selector::parse(raw)
                    .map_err(|e| AppError::validation(format!("{section}: {e}")))?;
            }
        }
        if !self.detail.table_row_selector.trim().is_empty() {
            check_css("detail.table_row_selector", &self.detail.table_row_selector)?;
            check_css("detail.table_cell_selector", &self.detail.table_cell_selector)?;
        }
        if self.detail.not_found_text.trim().is_empty() {
            return Err(AppError::validation("detail.not_found_text is empty"));
        }
        if self.browser.user_agent.trim().is_empty() {
            return Err(AppError::validation("browser.user_agent is empty"));
        }
        if self.browser.navigation_timeout_secs == 0 {
            return Err(AppError::validation(
                "browser.navigation_timeout_secs must be > 0",
            ));
        }
        if self.browser.query_timeout_secs == 0 {
            return Err(AppError::validation("browser.query_timeout_secs must be > 0"));
        }
        if self.crawler.shards == 0 {
            return Err(AppError::validation("crawler.shards must be > 0"));
        }
        self.crawler.pacing.validate()?;
        if !self.output.csv && !self.output.xlsx {
            return Err(AppError::validation(
                "output.csv and output.xlsx are both disabled",
            ));
        }
        Ok(())
    }

    /// Look up a preset by name.
    pub fn preset(&self, name: &str) -> Option<&KeywordPreset> {
        self.presets.iter().find(|p| p.name == name)
    }
}

/// Table selectors go straight to the CSS engine, so they must be plain CSS.
fn check_css(section: &str, css: &str) -> Result<()> {
    if css.trim().is_empty() {
        return Err(AppError::validation(format!("{section} is empty")));
    }
    if css.contains(":has-text(") {
        return Err(AppError::validation(format!(
            "{section}: :has-text() is not supported here"
        )));
    }
    scraper::Selector::parse(css)
        .map(|_| ())
        .map_err(|e| AppError::validation(format!("{section}: invalid CSS '{css}': {e:?}")))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            detail: DetailConfig::default(),
            browser: BrowserSettings::default(),
            crawler: CrawlerConfig::default(),
            output: OutputConfig::default(),
            presets: defaults::presets(),
        }
    }
}

/// Search page location and listing selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site root; relative result links are resolved against it
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Candidates for the search box, most likely first
    #[serde(default = "defaults::search_input_selectors")]
    pub search_input_selectors: Vec<String>,

    /// Candidates for the result items, most likely first
    #[serde(default = "defaults::result_item_selectors")]
    pub result_item_selectors: Vec<String>,

    /// Selector for the detail link inside one result item
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Breadcrumb separator used in the faculty line
    #[serde(default = "defaults::breadcrumb_separator")]
    pub breadcrumb_separator: String,

    /// Replacement for the breadcrumb separator
    #[serde(default = "defaults::breadcrumb_arrow")]
    pub breadcrumb_arrow: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            search_input_selectors: defaults::search_input_selectors(),
            result_item_selectors: defaults::result_item_selectors(),
            link_selector: defaults::link_selector(),
            breadcrumb_separator: defaults::breadcrumb_separator(),
            breadcrumb_arrow: defaults::breadcrumb_arrow(),
        }
    }
}

/// Detail page selectors and table fallback rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailConfig {
    #[serde(default = "defaults::program_type_selectors")]
    pub program_type_selectors: Vec<String>,

    #[serde(default = "defaults::tuition_fee_selectors")]
    pub tuition_fee_selectors: Vec<String>,

    /// Rows scanned by the table fallback
    #[serde(default = "defaults::table_row_selector")]
    pub table_row_selector: String,

    /// Cells within one scanned row
    #[serde(default = "defaults::table_cell_selector")]
    pub table_cell_selector: String,

    /// Header substrings that identify the program type row
    #[serde(default = "defaults::type_keywords")]
    pub type_keywords: Vec<String>,

    /// Header substrings that identify a tuition row
    #[serde(default = "defaults::fee_keywords")]
    pub fee_keywords: Vec<String>,

    /// Placeholder written for fields that never matched
    #[serde(default = "defaults::not_found_text")]
    pub not_found_text: String,
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            program_type_selectors: defaults::program_type_selectors(),
            tuition_fee_selectors: defaults::tuition_fee_selectors(),
            table_row_selector: defaults::table_row_selector(),
            table_cell_selector: defaults::table_cell_selector(),
            type_keywords: defaults::type_keywords(),
            fee_keywords: defaults::fee_keywords(),
            not_found_text: defaults::not_found_text(),
        }
    }
}

/// Browser launch and navigation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Browser locale, also sent as Accept-Language
    #[serde(default = "defaults::locale")]
    pub locale: String,

    /// Explicit Chrome binary; auto-detected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<PathBuf>,

    /// DevTools endpoint of an already running browser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Extra command line switches for a launched browser
    #[serde(default)]
    pub chrome_args: Vec<String>,

    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "defaults::query_timeout")]
    pub query_timeout_secs: u64,
}

impl BrowserSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: defaults::headless(),
            user_agent: defaults::user_agent(),
            locale: defaults::locale(),
            chrome_executable: None,
            remote_url: None,
            chrome_args: Vec::new(),
            navigation_timeout_secs: defaults::navigation_timeout(),
            query_timeout_secs: defaults::query_timeout(),
        }
    }
}

/// Crawl behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Pauses that let client-side rendering finish
    #[serde(default)]
    pub settle: SettleDelays,

    /// Delay policy applied after every detail fetch
    #[serde(default)]
    pub pacing: PacingPolicy,

    /// Number of independent pages working on disjoint keyword chunks
    #[serde(default = "defaults::shards")]
    pub shards: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            settle: SettleDelays::default(),
            pacing: PacingPolicy::default(),
            shards: defaults::shards(),
        }
    }
}

/// Fixed settle delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleDelays {
    #[serde(default = "defaults::after_navigation")]
    pub after_navigation_ms: u64,

    #[serde(default = "defaults::after_clear")]
    pub after_clear_ms: u64,

    #[serde(default = "defaults::after_submit")]
    pub after_submit_ms: u64,
}

impl SettleDelays {
    /// All delays zero.
    pub fn none() -> Self {
        Self {
            after_navigation_ms: 0,
            after_clear_ms: 0,
            after_submit_ms: 0,
        }
    }
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_navigation_ms: defaults::after_navigation(),
            after_clear_ms: defaults::after_clear(),
            after_submit_ms: defaults::after_submit(),
        }
    }
}

/// Inter-request pacing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PacingPolicy {
    /// No delay at all
    None,
    /// Constant delay
    Fixed { delay_ms: u64 },
    /// Base delay plus a uniform random extra in `0..=jitter_ms`
    Jittered { base_ms: u64, jitter_ms: u64 },
    /// Token bucket allowing `burst` requests, refilled at `per_minute`
    RateLimited { per_minute: u32, burst: u32 },
}

impl PacingPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::RateLimited { per_minute, burst } => {
                if *per_minute == 0 {
                    return Err(AppError::validation(
                        "crawler.pacing.per_minute must be > 0",
                    ));
                }
                if *burst == 0 {
                    return Err(AppError::validation("crawler.pacing.burst must be > 0"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay_ms: defaults::request_delay(),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "defaults::output_dir")]
    pub dir: PathBuf,

    /// File name prefix; a run timestamp is appended
    #[serde(default = "defaults::file_prefix")]
    pub file_prefix: String,

    #[serde(default = "defaults::enabled")]
    pub csv: bool,

    #[serde(default = "defaults::enabled")]
    pub xlsx: bool,

    /// Drop repeated (keyword, url) rows before export
    #[serde(default)]
    pub dedupe: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: defaults::output_dir(),
            file_prefix: defaults::file_prefix(),
            csv: true,
            xlsx: true,
            dedupe: false,
        }
    }
}

/// Named keyword list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordPreset {
    pub name: String,
    pub keywords: Vec<String>,
}

mod defaults {
    use std::path::PathBuf;

    use super::KeywordPreset;

    // Site defaults
    pub fn base_url() -> String {
        "https://course.mytcas.com".into()
    }
    pub fn search_input_selectors() -> Vec<String> {
        vec![
            "input[placeholder='พิมพ์ชื่อมหาวิทยาลัย คณะ หรือหลักสูตร']".into(),
            "input[type='search']".into(),
            "input.search-input".into(),
            "input[aria-label*='ค้นหา']".into(),
        ]
    }
    pub fn result_item_selectors() -> Vec<String> {
        vec![
            "ul.t-programs > li".into(),
            "ul.program-list > li".into(),
            "div.search-results > ul > li".into(),
            "[data-testid='program-item']".into(),
        ]
    }
    pub fn link_selector() -> String {
        "a".into()
    }
    pub fn breadcrumb_separator() -> String {
        "›".into()
    }
    pub fn breadcrumb_arrow() -> String {
        ">".into()
    }

    // Detail defaults
    pub fn program_type_selectors() -> Vec<String> {
        vec![
            "dt:has-text('ประเภทหลักสูตร') + dd".into(),
            ".program-type".into(),
            "[data-field='program_type']".into(),
            "td:has-text('ประเภทหลักสูตร') + td".into(),
        ]
    }
    pub fn tuition_fee_selectors() -> Vec<String> {
        vec![
            "dt:has-text('ค่าใช้จ่าย') + dd".into(),
            "dt:has-text('ค่าธรรมเนียม') + dd".into(),
            ".fee-info".into(),
            ".tuition-fee".into(),
            "[data-field='fee']".into(),
            "td:has-text('ค่าใช้จ่าย') + td".into(),
        ]
    }
    pub fn table_row_selector() -> String {
        "table tr".into()
    }
    pub fn table_cell_selector() -> String {
        "td, th".into()
    }
    pub fn type_keywords() -> Vec<String> {
        vec!["ประเภท".into()]
    }
    pub fn fee_keywords() -> Vec<String> {
        vec!["ค่าใช้จ่าย".into(), "ธรรมเนียม".into(), "ค่าเรียน".into()]
    }
    pub fn not_found_text() -> String {
        "ไม่พบข้อมูล".into()
    }

    // Browser defaults
    pub fn headless() -> bool {
        true
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36".into()
    }
    pub fn locale() -> String {
        "th-TH".into()
    }
    pub fn navigation_timeout() -> u64 {
        30
    }
    pub fn query_timeout() -> u64 {
        10
    }

    // Crawler defaults
    pub fn after_navigation() -> u64 {
        2000
    }
    pub fn after_clear() -> u64 {
        500
    }
    pub fn after_submit() -> u64 {
        3000
    }
    pub fn request_delay() -> u64 {
        1200
    }
    pub fn shards() -> usize {
        1
    }

    // Output defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from(".")
    }
    pub fn file_prefix() -> String {
        "mytcas_scraped".into()
    }
    pub fn enabled() -> bool {
        true
    }

    // Keyword presets
    pub fn presets() -> Vec<KeywordPreset> {
        vec![
            KeywordPreset {
                name: "ai".to_string(),
                keywords: vec!["วิศวกรรม ปัญญาประดิษฐ์".to_string()],
            },
            KeywordPreset {
                name: "computer".to_string(),
                keywords: vec!["วิศวกรรม คอมพิวเตอร์".to_string()],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.browser.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_shards() {
        let mut config = Config::default();
        config.crawler.shards = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.site.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_token_bucket() {
        let mut config = Config::default();
        config.crawler.pacing = PacingPolicy::RateLimited {
            per_minute: 0,
            burst: 1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_selector() {
        let mut config = Config::default();
        config
            .detail
            .tuition_fee_selectors
            .push("dt:has-text('unterminated) + dd".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detail.tuition_fee_selectors"));
    }

    #[test]
    fn validate_checks_table_selectors() {
        let mut config = Config::default();
        config.detail.table_row_selector = "table tr[[".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detail.table_row_selector"));

        let mut config = Config::default();
        config.detail.table_cell_selector = "td:has-text('x')".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detail.table_cell_selector"));

        let mut config = Config::default();
        config.detail.table_cell_selector = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file_and_falls_back_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[output]\nfile_prefix = \"custom\"\n").unwrap();

        assert_eq!(Config::load(&path).unwrap().output.file_prefix, "custom");

        let missing = dir.path().join("missing.toml");
        assert!(Config::load(&missing).is_err());
        assert_eq!(
            Config::load_or_default(&missing).output.file_prefix,
            OutputConfig::default().file_prefix
        );
    }

    #[test]
    fn validate_rejects_all_exports_disabled() {
        let mut config = Config::default();
        config.output.csv = false;
        config.output.xlsx = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [site]
            base_url = "https://example.org"

            [crawler.pacing]
            mode = "jittered"
            base_ms = 800
            jitter_ms = 400
            "#,
        )
        .unwrap();

        assert_eq!(config.site.base_url, "https://example.org");
        assert_eq!(config.site.link_selector, "a");
        assert_eq!(
            config.crawler.pacing,
            PacingPolicy::Jittered {
                base_ms: 800,
                jitter_ms: 400
            }
        );
        assert_eq!(config.detail.not_found_text, "ไม่พบข้อมูล");
        assert_eq!(config.presets.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bundled_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../../config.toml")).unwrap();
        assert!(config.validate().is_ok());

        let defaults = Config::default();
        assert_eq!(config.site.base_url, defaults.site.base_url);
        assert_eq!(
            config.detail.tuition_fee_selectors,
            defaults.detail.tuition_fee_selectors
        );
        assert_eq!(config.crawler.pacing, defaults.crawler.pacing);
        assert_eq!(config.presets, defaults.presets);
    }

    #[test]
    fn default_presets_are_addressable() {
        let config = Config::default();
        assert_eq!(
            config.preset("computer").map(|p| p.keywords.clone()),
            Some(vec!["วิศวกรรม คอมพิวเตอร์".to_string()])
        );
        assert!(config.preset("missing").is_none());
    }
}
