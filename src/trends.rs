//! Yearly popularity of evaluation measures, as read from a year-by-term table

use crate::{config::PlotConfig, MatchCount, Result, Year};
use anyhow::Context;
use csv_async::{AsyncReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tokio::{fs::File, io::AsyncRead};

/// Phrases that identify F-measure terms
pub const FMEASURE_MARKERS: [&str; 4] = ["f-measure", "f1-measure", "f-score", "f1-score"];

/// Operator that combines several phrases in a disjunctive query
pub const DISJUNCTION: &str = "+OR+";

/// Category of a query term
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TermKind {
    /// Single F-measure phrase, e.g. `f-score`
    FMeasure,

    /// Disjunction of F-measure phrases, e.g. `f-measure+OR+f1-score`
    FMeasureDisjunction,

    /// Any other evaluation measure
    Other,
}
//
impl TermKind {
    /// Categorize a term label
    pub fn of(label: &str) -> Self {
        if !FMEASURE_MARKERS.iter().any(|marker| label.contains(marker)) {
            Self::Other
        } else if label.contains(DISJUNCTION) {
            Self::FMeasureDisjunction
        } else {
            Self::FMeasure
        }
    }
}

/// Yearly result counts of every term of a year-by-term table
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Trends {
    /// Years, in table order
    years: Vec<Year>,

    /// Term labels and yearly counts (aligned with `years`), in table order
    series: Vec<(Box<str>, Vec<MatchCount>)>,
}
//
impl Trends {
    /// Load a year-by-term table
    pub async fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("opening year-by-term table {}", path.display()))?;
        Self::read(file)
            .await
            .with_context(|| format!("reading year-by-term table {}", path.display()))
    }

    /// Read a year-by-term table
    ///
    /// The first line is a header with a year label and then term labels. It
    /// is followed by one line per year holding the year and one count per
    /// term. Lines starting with `#` are ignored.
    pub async fn read(input: impl AsyncRead + Unpin + Send) -> Result<Self> {
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .trim(Trim::All)
            .create_reader(input);

        // Decode the header
        let header = reader.headers().await.context("reading header")?;
        let mut series = Vec::<(Box<str>, Vec<MatchCount>)>::new();
        for label in header.iter().skip(1) {
            anyhow::ensure!(
                series.iter().all(|(known, _)| &**known != label),
                "term {label} appears in several columns"
            );
            series.push((label.into(), Vec::new()));
        }
        anyhow::ensure!(!series.is_empty(), "header has no term column");

        // Decode yearly data
        let mut years = Vec::new();
        let mut record = StringRecord::new();
        while reader.read_record(&mut record).await.context("reading data")? {
            let line = record.position().map_or(0, |pos| pos.line());
            let mut fields = record.iter();
            let year = fields.next().unwrap_or_default();
            years.push(
                year.parse::<Year>()
                    .with_context(|| format!("invalid year {year:?} on line {line}"))?,
            );
            for ((label, counts), count) in series.iter_mut().zip(fields) {
                counts.push(count.parse::<MatchCount>().with_context(|| {
                    format!("invalid count {count:?} for {label} on line {line}")
                })?);
            }
        }
        log::debug!(
            "Read {} terms over {} years {years:?}",
            series.len(),
            years.len()
        );
        Ok(Self { years, series })
    }

    /// Years covered by the table
    pub fn years(&self) -> &[Year] {
        &self.years
    }

    /// Term labels, in table order
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.iter().map(|(label, _)| &**label)
    }

    /// Term labels of a certain kind, in table order
    pub fn labels_of_kind(&self, kind: TermKind) -> impl Iterator<Item = &str> + '_ {
        self.labels()
            .filter(move |label| TermKind::of(label) == kind)
    }

    /// Yearly counts of a term
    pub fn counts(&self, label: &str) -> Option<&[MatchCount]> {
        (self.series.iter())
            .find(|(known, _)| &**known == label)
            .map(|(_, counts)| &counts[..])
    }

    /// Highest count across disjunctive F-measure terms, for each year
    ///
    /// Each disjunction undercounts documents that use several terms, so the
    /// best estimate of how many documents use any F-measure term is the
    /// largest of them.
    pub fn disjunction_max(&self) -> Vec<MatchCount> {
        let mut max = vec![0; self.years.len()];
        for (label, counts) in &self.series {
            if TermKind::of(label) == TermKind::FMeasureDisjunction {
                for (max, &count) in max.iter_mut().zip(counts) {
                    *max = (*max).max(count);
                }
            }
        }
        max
    }

    /// Sum of the counts of every term that isn't excluded, for each year
    pub fn totals(&self, config: &PlotConfig) -> Vec<MatchCount> {
        let mut totals = vec![0; self.years.len()];
        for (label, counts) in &self.series {
            if !config.is_excluded(label) {
                for (total, &count) in totals.iter_mut().zip(counts) {
                    *total += count;
                }
            }
        }
        totals
    }

    /// Share of a term in `totals` (as computed by [`totals()`](Self::totals)),
    /// in percent, for each year
    pub fn percentages(&self, label: &str, totals: &[MatchCount]) -> Result<Vec<f64>> {
        let counts = self
            .counts(label)
            .with_context(|| format!("unknown term {label}"))?;
        (self.years.iter().zip(counts).zip(totals))
            .map(|((year, &count), &total)| {
                anyhow::ensure!(total > 0, "no match for any measure in year {year}");
                Ok(100.0 * count as f64 / total as f64)
            })
            .collect()
    }
}
