//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: harvest keywords, fetch details, collect results
//! - `Pacer`: delay policy between detail fetches
//! - `CancelFlag`: cooperative stop request

mod cancel;
pub mod crawl;
mod pacing;

pub use cancel::CancelFlag;
pub use crawl::{CrawlOutcome, run_crawler};
pub use pacing::Pacer;
