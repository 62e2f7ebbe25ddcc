//! Processing pipeline configuration

use crate::{CollectArgs, PlotArgs, QueryTerm, Year};
use std::{collections::HashSet, num::NonZeroU32, ops::RangeInclusive, path::PathBuf, time::Duration};

/// Default output table of the collection step
pub const DEFAULT_OUTPUT: &str = "out/google-scholar-query-counts.csv";

/// Default first publication year
pub const DEFAULT_START_YEAR: Year = 1980;

/// Default last publication year
pub const DEFAULT_END_YEAR: Year = 2022;

/// Default search site
pub const DEFAULT_BASE_URL: &str = "https://scholar.google.com";

/// Query terms that are collected when the user doesn't specify any
pub const DEFAULT_QUERY_TERMS: &[&str] = &[
    r#""error+rate""#,
    r#""misclassification+rate""#,
    r#""positive+predictive+value""#,
    r#""false+discovery+rate""#,
    r#""precision-recall""#,
    r#""area+under+curve""#,
    r#""area+under+the+curve""#,
    r#""receiver+operating+characteristic""#,
    r#""auc"+AND+"roc""#,
    r#""auc"+AND+"precision"+AND+"recall""#,
    r#""f-measure""#,
    r#""f1-measure""#,
    r#""f-score""#,
    r#""f1-score""#,
    r#""f-measure"+OR+"f1-measure""#,
    r#""f-measure"+OR+"f-score""#,
    r#""f-measure"+OR+"f1-score""#,
    r#""f1-measure"+OR+"f-score""#,
    r#""f1-measure"+OR+"f1-score""#,
    r#""f-score"+OR+"f1-score""#,
    r#""f-measure"+OR+"f1-measure"+OR+"f-score""#,
    r#""f-measure"+OR+"f1-measure"+OR+"f1-score""#,
    r#""f-measure"+OR+"f-score"+OR+"f1-score""#,
    r#""f1-measure"+OR+"f-score"+OR+"f1-score""#,
    r#""f-measure"+OR+"f1-measure"+OR+"f-score"+OR+"f1-score""#,
];

/// Term labels that are left out of totals and of the absolute chart by default
///
/// These measures either overlap with another measure that is already counted
/// or have too few matches to be worth plotting.
pub const DEFAULT_EXCLUDED_LABELS: &[&str] = &[
    "misclassification+rate",
    "false+discovery+rate",
    "auc+AND+roc",
    "area+under+curve",
    "auc+AND+precision+AND+recall",
];

/// Configuration of the collection step
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectConfig {
    /// Query terms, in the order where they should be collected
    pub terms: Box<[QueryTerm]>,

    /// Publication years to be queried for each term
    pub years: RangeInclusive<Year>,

    /// Output table
    pub output: PathBuf,

    /// What to do when the output table already exists
    pub mode: WriteMode,

    /// Search site to be queried
    pub base_url: Box<str>,

    /// How page requests are retried
    pub retry: RetryPolicy,

    /// Query pairs of a resumed table whose latest count is 0 again
    pub requery_zeros: bool,
}
//
impl CollectConfig {
    /// Determine collection configuration from digested CLI arguments
    pub(crate) fn new(args: CollectArgs, retry: RetryPolicy) -> Self {
        let CollectArgs {
            output,
            start_year,
            end_year,
            terms,
            mode,
            requery_zeros,
            base_url,
            max_attempts: _,
            initial_backoff_ms: _,
            timeout_secs: _,
        } = args;
        let mut terms = if terms.is_empty() {
            DEFAULT_QUERY_TERMS.iter().map(|&term| term.into()).collect()
        } else {
            terms
        };
        // Each pair should only be queried once per run
        let mut seen = HashSet::new();
        terms.retain(|term: &QueryTerm| seen.insert(term.clone()));
        Self {
            terms: terms.into_boxed_slice(),
            years: start_year..=end_year,
            output,
            mode,
            base_url,
            retry,
            requery_zeros,
        }
    }

    /// Number of (term, year) pairs in the collection
    pub fn num_pairs(&self) -> usize {
        self.terms.len() * self.years.clone().count()
    }

    /// Iterate over (term, year) pairs, all years of a term before the next term
    pub fn pairs(&self) -> impl Iterator<Item = (&QueryTerm, Year)> + '_ {
        (self.terms.iter()).flat_map(move |term| self.years.clone().map(move |year| (term, year)))
    }
}

/// What the collection step does with a pre-existing output table
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, clap::ValueEnum)]
pub enum WriteMode {
    /// Keep existing rows, only query and append the missing pairs
    #[default]
    Resume,

    /// Discard existing rows and start over
    Overwrite,

    /// Append a header and every row after the existing ones
    ///
    /// Running twice duplicates every row, so this is only meant for
    /// reproducing tables that were collected this way.
    Append,
}

/// Bounded retries with exponential backoff for page requests
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RetryPolicy {
    /// Number of attempts before giving up, including the first one
    pub max_attempts: NonZeroU32,

    /// Delay before the first retry, doubled after each further failure
    pub initial_backoff: Duration,

    /// Timeout of each individual attempt
    pub timeout: Duration,
}
//
impl RetryPolicy {
    /// Set up a retry policy
    pub fn new(max_attempts: NonZeroU32, initial_backoff: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            timeout,
        }
    }

    /// Delay to be observed after the failure of attempt number `attempt`
    /// (starting at 1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
    }
}
//
impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            NonZeroU32::new(3).expect("3 is not 0"),
            Duration::from_secs(1),
            Duration::from_secs(30),
        )
    }
}

/// Configuration of the plotting step
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlotConfig {
    /// Year-by-term table
    pub input: PathBuf,

    /// Directory where charts are saved
    pub output_dir: PathBuf,

    /// Term labels that are left out of totals and of the absolute chart
    pub excluded: Box<[Box<str>]>,
}
//
impl PlotConfig {
    /// Determine plotting configuration from CLI arguments
    pub(crate) fn new(args: PlotArgs) -> Self {
        let PlotArgs {
            input,
            output_dir,
            excluded,
        } = args;
        let excluded = if excluded.is_empty() {
            DEFAULT_EXCLUDED_LABELS.iter().map(|&label| label.into()).collect()
        } else {
            excluded.into_boxed_slice()
        };
        Self {
            input,
            output_dir,
            excluded,
        }
    }

    /// Truth that a term label is left out of totals and of the absolute chart
    pub fn is_excluded(&self, label: &str) -> bool {
        self.excluded.iter().any(|excluded| &**excluded == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_term_major() {
        let config = CollectConfig {
            terms: ["a".into(), "b".into()].into(),
            years: 2000..=2001,
            output: PathBuf::from("unused.csv"),
            mode: WriteMode::Resume,
            base_url: DEFAULT_BASE_URL.into(),
            retry: RetryPolicy::default(),
            requery_zeros: false,
        };
        let pairs = config
            .pairs()
            .map(|(term, year)| (&**term, year))
            .collect::<Vec<_>>();
        assert_eq!(pairs, [("a", 2000), ("a", 2001), ("b", 2000), ("b", 2001)]);
        assert_eq!(config.num_pairs(), 4);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::new(
            NonZeroU32::new(4).unwrap(),
            Duration::from_millis(100),
            Duration::from_secs(1),
        );
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(
            policy.backoff(40),
            Duration::from_millis(100).saturating_mul(u32::MAX)
        );
    }

    #[test]
    fn default_terms_and_exclusions() {
        assert_eq!(DEFAULT_QUERY_TERMS.len(), 25);
        let config = PlotConfig::new(PlotArgs {
            input: PathBuf::from("in.csv"),
            output_dir: PathBuf::from("."),
            excluded: Vec::new(),
        });
        assert!(config.is_excluded("auc+AND+roc"));
        assert!(!config.is_excluded("error+rate"));
    }
}
