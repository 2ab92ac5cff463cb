// src/pipeline/crawl.rs

//! Crawl orchestration: keywords, then stubs, then details.
//!
//! Each shard owns one page and one pacer and walks its keywords
//! strictly in order. With the default single shard this is a plain
//! sequential crawl over one browsing context.

use chrono::Local;
use futures::future;

use crate::browser::{PageFactory, PageHandle};
use crate::error::{AppError, Result};
use crate::models::{Config, CrawlStats, ProgramDetail};
use crate::pipeline::{CancelFlag, Pacer};
use crate::services::{DetailFetcher, SearchHarvester};
use crate::utils::log;

/// Everything a run collected.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Successfully fetched programs, in keyword then listing order
    pub programs: Vec<ProgramDetail>,
    pub stats: CrawlStats,
    /// First shard that could not open its page. `programs` still holds
    /// what the other shards finished.
    pub aborted: Option<AppError>,
}

/// Run the crawler over `keywords`.
///
/// Per-item failures are logged and skipped. Only failing to open a page
/// aborts the run: with nothing collected that is an error, otherwise
/// the finished shards come back with `aborted` set. `factory` is closed
/// exactly once on every path.
pub async fn run_crawler<F: PageFactory>(
    factory: &F,
    keywords: &[String],
    config: &Config,
    cancel: &CancelFlag,
) -> Result<CrawlOutcome> {
    log::header("Crawl starting");
    let result = crawl(factory, keywords, config, cancel).await;

    if let Err(e) = factory.close().await {
        ::log::warn!("Failed to close browser: {}", e);
    }

    let mut outcome = result?;
    log::separator();
    log::summary("Crawl", &outcome.stats.summary_items());
    if outcome.programs.is_empty() {
        if let Some(e) = outcome.aborted.take() {
            return Err(e);
        }
    }
    Ok(outcome)
}

async fn crawl<F: PageFactory>(
    factory: &F,
    keywords: &[String],
    config: &Config,
    cancel: &CancelFlag,
) -> Result<CrawlOutcome> {
    let start_time = Local::now();
    let harvester = SearchHarvester::new(&config.site, &config.browser, &config.crawler.settle)?;
    let fetcher = DetailFetcher::new(&config.detail, &config.browser, &config.crawler.settle);

    let chunks = shard_keywords(keywords, config.crawler.shards);
    if chunks.len() > 1 {
        ::log::info!(
            "Splitting {} keywords across {} pages",
            keywords.len(),
            chunks.len()
        );
    }

    let workers = chunks.into_iter().map(|chunk| {
        let worker = ShardWorker {
            harvester: &harvester,
            fetcher: &fetcher,
            config,
            cancel,
            total: keywords.len(),
        };
        async move {
            let page = factory.open_page().await?;
            Ok::<_, AppError>(worker.run(&page, chunk).await)
        }
    });

    let mut programs = Vec::new();
    let mut stats = CrawlStats::started(start_time);
    let mut aborted = None;
    for shard in future::join_all(workers).await {
        match shard {
            Ok((shard_programs, shard_stats)) => {
                programs.extend(shard_programs);
                stats.absorb(&shard_stats);
            }
            Err(e) => {
                ::log::error!("Shard aborted: {}", e);
                if aborted.is_none() {
                    aborted = Some(e);
                }
            }
        }
    }
    stats.end_time = Local::now();

    Ok(CrawlOutcome {
        programs,
        stats,
        aborted,
    })
}

/// A keyword slice with its position in the full keyword list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk<'k> {
    offset: usize,
    keywords: &'k [String],
}

/// Split into at most `shards` contiguous, non-empty chunks.
fn shard_keywords(keywords: &[String], shards: usize) -> Vec<Chunk<'_>> {
    if keywords.is_empty() {
        return Vec::new();
    }
    let shards = shards.clamp(1, keywords.len());
    let size = keywords.len().div_ceil(shards);
    keywords
        .chunks(size)
        .enumerate()
        .map(|(i, keywords)| Chunk {
            offset: i * size,
            keywords,
        })
        .collect()
}

struct ShardWorker<'a> {
    harvester: &'a SearchHarvester<'a>,
    fetcher: &'a DetailFetcher<'a>,
    config: &'a Config,
    cancel: &'a CancelFlag,
    total: usize,
}

impl ShardWorker<'_> {
    async fn run<P: PageHandle>(
        &self,
        page: &P,
        chunk: Chunk<'_>,
    ) -> (Vec<ProgramDetail>, CrawlStats) {
        let mut pacer = Pacer::new(&self.config.crawler.pacing);
        let mut programs = Vec::new();
        let mut stats = CrawlStats::started(Local::now());

        'keywords: for (i, keyword) in chunk.keywords.iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            log::step(chunk.offset + i + 1, self.total, &format!("Keyword '{keyword}'"));
            stats.keyword_count += 1;

            let stubs = self.harvester.harvest(page, keyword).await;
            if stubs.is_empty() {
                ::log::warn!("No programs found for '{}', moving on", keyword);
                stats.empty_keywords += 1;
                continue;
            }
            stats.stub_count += stubs.len();

            for (n, stub) in stubs.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    stats.cancelled = true;
                    break 'keywords;
                }

                match self.fetcher.fetch(page, stub).await {
                    Ok(detail) => {
                        log::sub_item(&format!(
                            "{}/{} {} | {} | {}",
                            n + 1,
                            stubs.len(),
                            detail.program_name,
                            detail.program_type.render(&self.config.detail.not_found_text),
                            detail.tuition_fee.render(&self.config.detail.not_found_text),
                        ));
                        programs.push(detail);
                        stats.detail_count += 1;
                    }
                    Err(e) => {
                        ::log::warn!("Failed to fetch {}: {}", stub.detail_url, e);
                        stats.detail_failures += 1;
                    }
                }

                pacer.pause().await;
            }
        }

        stats.end_time = Local::now();
        (programs, stats)
    }
}
