// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod program;
mod stats;

// Re-export all public types
pub use config::{
    BrowserSettings, Config, CrawlerConfig, DetailConfig, KeywordPreset, OutputConfig,
    PacingPolicy, SettleDelays, SiteConfig,
};
pub use program::{FieldValue, ProgramDetail, ProgramStub};
pub use stats::CrawlStats;
