//! Google Scholar popularity of F-measure terminology versus other evaluation
//! measures, year by year.
//!
//! The workflow has three independent steps:
//!
//! - `collect` queries Google Scholar once per (query term, year) pair and
//!   records the reported result counts in a `query,year,count` table.
//! - `pivot` reshapes that table into one row per year and one column per term.
//! - `plot` reads the pivoted table and draws the absolute and relative charts.

mod chart;
mod collect;
mod config;
mod count;
mod fetch;
mod logging;
mod progress;
mod query;
mod table;
mod trends;

use crate::{
    config::{CollectConfig, PlotConfig, RetryPolicy, WriteMode},
    fetch::ScholarClient,
    progress::ProgressReport,
};
use clap::{Parser, Subcommand};
use std::{num::NonZeroU32, path::PathBuf};

/// Track how often evaluation measures are mentioned on Google Scholar
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Write logs to this file instead of syslog
    ///
    /// The file is truncated at startup.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Processing steps, normally run in the order they are listed
#[derive(Subcommand, Debug)]
enum Command {
    /// Query Google Scholar and record yearly result counts
    Collect(CollectArgs),

    /// Turn a `query,year,count` table into a year-by-term table
    Pivot {
        /// Table produced by the `collect` step
        input: PathBuf,

        /// Where the year-by-term table should be written
        output: PathBuf,
    },

    /// Draw the absolute and percentage charts from a year-by-term table
    Plot(PlotArgs),
}

/// Arguments of the `collect` step
#[derive(clap::Args, Debug)]
pub struct CollectArgs {
    /// Output table
    #[arg(short, long, default_value = config::DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// First publication year to be queried
    #[arg(short, long, default_value_t = config::DEFAULT_START_YEAR)]
    pub start_year: Year,

    /// Last publication year to be queried (inclusive)
    #[arg(short, long, default_value_t = config::DEFAULT_END_YEAR)]
    pub end_year: Year,

    /// URL-encoded query term, e.g. '"f-measure"+OR+"f-score"'
    ///
    /// May be specified multiple times. By default, the full list of
    /// evaluation measure terms is queried.
    #[arg(short, long = "term")]
    pub terms: Vec<QueryTerm>,

    /// What to do when the output table already exists
    ///
    /// `resume` only queries the pairs that the table does not hold yet,
    /// `overwrite` starts over from an empty table, and `append` blindly adds
    /// a new header and every row at the end of the table.
    #[arg(short, long, value_enum, default_value_t = WriteMode::Resume)]
    pub mode: WriteMode,

    /// When resuming, query pairs whose recorded count is 0 again
    ///
    /// Blocked or unreadable search pages are recorded as 0 results, which
    /// cannot be told apart from a real lack of results afterwards.
    #[arg(long)]
    pub requery_zeros: bool,

    /// Search site to be queried
    #[arg(long, default_value = config::DEFAULT_BASE_URL)]
    pub base_url: Box<str>,

    /// Maximal number of attempts for each page request
    #[arg(long, default_value = "3")]
    pub max_attempts: NonZeroU32,

    /// Delay before the first retry, doubled after each further failure
    #[arg(long, default_value_t = 1000)]
    pub initial_backoff_ms: u64,

    /// Timeout of each individual page request
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}
//
impl CollectArgs {
    /// Validate arguments and turn them into a collection configuration
    pub fn into_config(self) -> Result<CollectConfig> {
        anyhow::ensure!(
            self.start_year <= self.end_year,
            "start year {} comes after end year {}",
            self.start_year,
            self.end_year
        );
        let retry = RetryPolicy::new(
            self.max_attempts,
            std::time::Duration::from_millis(self.initial_backoff_ms),
            std::time::Duration::from_secs(self.timeout_secs),
        );
        Ok(CollectConfig::new(self, retry))
    }
}

/// Arguments of the `plot` step
#[derive(clap::Args, Debug)]
pub struct PlotArgs {
    /// Year-by-term table produced by the `pivot` step
    pub input: PathBuf,

    /// Directory where charts are saved
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Term label to leave out of the totals and of the absolute chart
    ///
    /// May be specified multiple times. By default, measures that overlap
    /// with other measures or have few matches are left out.
    #[arg(short = 'x', long = "exclude")]
    pub excluded: Vec<Box<str>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Decode CLI arguments
    let args = Args::parse();

    // Set up logging
    logging::setup(args.log_file.as_deref())?;

    match args.command {
        Command::Collect(collect_args) => {
            let config = collect_args.into_config()?;
            let client = ScholarClient::new(&config.base_url, config.retry)?;
            let report = ProgressReport::new();
            let summary = collect::run(&config, &client, &report).await?;
            let line = summary.describe();
            log::info!("{line}");
            println!("{line}");
        }
        Command::Pivot { input, output } => {
            table::pivot(&input, &output).await?;
        }
        Command::Plot(plot_args) => {
            let config = PlotConfig::new(plot_args);
            let trends = trends::Trends::load(&config.input).await?;
            let today = chrono::Local::now().format("%Y%m%d").to_string();
            for path in chart::render_all(&config, &trends, &today)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// URL-encoded Google Scholar query, e.g. `"auc"+AND+"roc"`
pub type QueryTerm = Box<str>;

/// Year of Gregorian Calendar
pub type Year = i16;

/// Number of Google Scholar results for a query over a single year
pub type MatchCount = u64;
