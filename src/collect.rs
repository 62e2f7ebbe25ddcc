//! Collection of yearly result counts

use crate::{
    config::CollectConfig,
    count::ResultCount,
    fetch::PageSource,
    progress::ProgressReport,
    query,
    table::{ResultRow, ResultWriter},
    QueryTerm, Result, Year,
};
use anyhow::Context;
use std::collections::{HashMap, HashSet};

/// Result count of a (term, year) pair
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PairResult {
    /// Query term
    pub term: QueryTerm,

    /// Publication year
    pub year: Year,

    /// What the search page said
    pub count: ResultCount,
}

/// Outcome of a collection run
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CollectSummary {
    /// Pairs that were queried during this run, in query order
    pub results: Vec<PairResult>,

    /// Pairs that the output table already held and were not queried again
    pub skipped: usize,
}
//
impl CollectSummary {
    /// One-line human-readable description
    pub fn describe(&self) -> String {
        let mut counted = 0;
        let mut unparseable = 0;
        let mut not_found = 0;
        for result in &self.results {
            match result.count {
                ResultCount::Count(_) => counted += 1,
                ResultCount::Unparseable(_) => unparseable += 1,
                ResultCount::NotFound => not_found += 1,
            }
        }
        format!(
            "Queried {} pairs ({counted} counted, {unparseable} unparseable, {not_found} without count), skipped {} already collected",
            self.results.len(),
            self.skipped
        )
    }
}

/// Pairs of a resumed table that need not be queried again
///
/// When a pair has several rows, the last one wins. Pairs whose latest count is
/// 0 are only kept if `requery_zeros` is false.
fn completed_pairs(rows: Vec<ResultRow>, requery_zeros: bool) -> HashSet<(QueryTerm, Year)> {
    let mut latest = HashMap::new();
    for row in rows {
        latest.insert((row.query, row.year), row.count);
    }
    latest
        .into_iter()
        .filter(|&(_, count)| count > 0 || !requery_zeros)
        .map(|(pair, _)| pair)
        .collect()
}

/// Query every (term, year) pair of `config` and record the result counts
///
/// Pairs are queried one after the other, all years of a term before the next
/// term. If a page cannot be fetched, the run stops there, but every row that
/// was recorded before remains in the output table.
pub async fn run(
    config: &CollectConfig,
    source: &impl PageSource,
    report: &ProgressReport,
) -> Result<CollectSummary> {
    log::info!("Started querying");
    let (mut writer, existing) = ResultWriter::open(&config.output, config.mode).await?;
    let completed = completed_pairs(existing, config.requery_zeros);
    let is_completed = |term: &QueryTerm, year: Year| completed.contains(&(term.clone(), year));
    let skipped = (config.pairs())
        .filter(|&(term, year)| is_completed(term, year))
        .count();
    let progress = report.add("Querying Google Scholar", config.num_pairs(), skipped);

    let mut results = Vec::with_capacity(config.num_pairs() - skipped);
    for (term, year) in config.pairs() {
        if is_completed(term, year) {
            log::debug!("Skipping {term} for year {year}, which was already collected");
            continue;
        }

        log::info!("Query {term} for year {year}");
        progress.set_message(format!("{term} ({year})"));
        let page = source
            .fetch_page(&query::yearly_search_path(term, year))
            .await
            .with_context(|| format!("querying {term} for year {year}"))?;
        let count = ResultCount::from_page(&page);
        match &count {
            ResultCount::Count(n) => log::info!("\t{n} result(s)"),
            other => log::warn!("\t{other} for {term} in year {year}, recording 0 result(s)"),
        }

        writer.write_row(term, year, count.table_value()).await?;
        progress.make_progress();
        results.push(PairResult {
            term: term.clone(),
            year,
            count,
        });
    }
    log::info!("Finished querying");
    Ok(CollectSummary { results, skipped })
}
