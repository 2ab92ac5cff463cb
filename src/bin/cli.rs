//! Tuition Crawler CLI
//!
//! Local execution entry point.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tuition_crawler::{
    error::{AppError, Result},
    keywords,
    models::{Config, KeywordPreset},
    pipeline::{self, CancelFlag},
    storage::{LocalExport, ResultSink, ResultTable},
};

/// Admissions site program and tuition crawler
#[derive(Parser, Debug)]
#[command(
    name = "tuition-crawler",
    version,
    about = "Collects program and tuition records from an admissions listing site"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search keywords, fetch program details and export the results
    Crawl {
        /// Keyword to search (repeatable)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,

        /// Named preset from the configuration (repeatable)
        #[arg(short, long = "preset")]
        presets: Vec<String>,

        /// Override output.dir
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// List configured keyword presets
    Presets,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Keywords from flags, or from the interactive menu when none were given.
fn collect_keywords(
    config: &Config,
    explicit: Vec<String>,
    preset_names: &[String],
) -> Result<Vec<String>> {
    let mut keywords = explicit;
    for name in preset_names {
        let preset = config
            .preset(name)
            .ok_or_else(|| AppError::config(format!("Unknown preset '{name}'")))?;
        keywords.extend(preset.keywords.iter().cloned());
    }
    keywords.retain(|k| !k.trim().is_empty());

    if keywords.is_empty() {
        keywords = prompt_keywords(&config.presets)?;
    }
    Ok(keywords)
}

fn prompt_keywords(presets: &[KeywordPreset]) -> Result<Vec<String>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    println!("Choose keywords:");
    for line in keywords::menu_lines(presets) {
        println!("  {line}");
    }
    let choice = read_answer(&mut input, "Choice (1-4): ")?;

    let custom = if keywords::wants_custom(&choice) {
        Some(read_answer(&mut input, "Keywords (comma separated): ")?)
    } else {
        None
    };

    Ok(keywords::choose(&choice, custom.as_deref(), presets))
}

fn read_answer(input: &mut impl BufRead, prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Stop at the next checkpoint on Ctrl-C.
fn install_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing the current item and saving what was collected");
            cancel.cancel();
        }
    });
}

#[cfg(feature = "browser")]
async fn crawl(
    config: &Config,
    keywords: &[String],
    cancel: &CancelFlag,
) -> Result<pipeline::CrawlOutcome> {
    use tuition_crawler::browser::chromium::ChromiumSession;

    let session = ChromiumSession::launch(&config.browser).await?;
    pipeline::run_crawler(&session, keywords, config, cancel).await
}

#[cfg(not(feature = "browser"))]
async fn crawl(
    _config: &Config,
    _keywords: &[String],
    _cancel: &CancelFlag,
) -> Result<pipeline::CrawlOutcome> {
    Err(AppError::config(
        "This binary was built without the `browser` feature",
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Crawl {
            keywords,
            presets,
            output_dir,
        } => {
            config.validate()?;
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }

            let keywords = collect_keywords(&config, keywords, &presets)?;
            log::info!("Keywords: {:?}", keywords);

            let cancel = CancelFlag::new();
            install_interrupt_handler(cancel.clone());

            let outcome = crawl(&config, &keywords, &cancel).await?;

            let table = ResultTable::from_programs(
                &outcome.programs,
                &config.detail.not_found_text,
                config.output.dedupe,
            );
            let sink = LocalExport::new(&config.output);
            match sink.save(&table).await? {
                Some(summary) => {
                    log::info!("Saved {} programs", summary.row_count);
                    for path in summary.paths() {
                        log::info!("  {}", path.display());
                    }
                }
                None => log::warn!("Nothing collected, no files written"),
            }
            if let Some(e) = outcome.aborted {
                return Err(e);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("All validations passed!");
        }

        Command::Presets => {
            for preset in &config.presets {
                println!("{}: {}", preset.name, preset.keywords.join(", "));
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
