//! Service layer for the crawler application.
//!
//! This module contains the extraction logic for:
//! - Selector fallback resolution (`ElementResolver`)
//! - Search result harvesting (`SearchHarvester`)
//! - Detail page extraction (`DetailFetcher`)

mod details;
mod resolver;
mod search;

pub use details::DetailFetcher;
pub use resolver::{ElementResolver, Resolution};
pub use search::{ListingLines, SearchHarvester};
