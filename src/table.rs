//! Result tables
//!
//! The collection step produces a "long" table with one `query,year,count` row
//! per (query term, year) pair. The plotting step wants a "wide" table with
//! one row per year and one column per term, which [`pivot()`] produces.

use crate::{config::WriteMode, query, MatchCount, QueryTerm, Result, Year};
use anyhow::Context;
use csv_async::{AsyncReaderBuilder, AsyncWriter, AsyncWriterBuilder, StringRecord};
use serde::Deserialize;
use std::{
    collections::{btree_map, hash_map, BTreeMap, HashMap},
    path::Path,
};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncRead, AsyncWriteExt},
};

/// Header of result tables
pub const HEADER: [&str; 3] = ["query", "year", "count"];

/// Label of the year column in year-by-term tables
pub const YEAR_LABEL: &str = "year";

/// Row of a result table
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
pub struct ResultRow {
    /// Query term, as sent to the search engine
    pub query: QueryTerm,

    /// Publication year
    pub year: Year,

    /// Number of results
    pub count: MatchCount,
}

/// Read every row of a result table
///
/// Repeated header lines, as left behind by [`WriteMode::Append`], are skipped.
pub async fn read_rows(path: &Path) -> Result<Vec<ResultRow>> {
    let file = File::open(path)
        .await
        .with_context(|| format!("opening result table {}", path.display()))?;
    parse_rows(file, path).await
}

/// Decode the rows of a result table, or of a part of it
async fn parse_rows(input: impl AsyncRead + Unpin + Send, path: &Path) -> Result<Vec<ResultRow>> {
    let context = || format!("reading result table {}", path.display());
    let mut reader = AsyncReaderBuilder::new()
        .has_headers(false)
        .create_reader(input);
    let mut record = StringRecord::new();
    let mut rows = Vec::new();
    while reader.read_record(&mut record).await.with_context(context)? {
        if is_header(&record) {
            continue;
        }
        let row = record.deserialize::<ResultRow>(None).with_context(|| {
            let line = record.position().map_or(0, |pos| pos.line());
            format!("parsing line {line} of {}", path.display())
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read a result table that is about to be extended, repairing its end
///
/// A last line that isn't a valid row is what an interrupted run leaves
/// behind. It is cut off the file, so its pair is not considered collected. A
/// valid last line that lacks a line terminator gets one, so that the next row
/// starts on its own line.
async fn read_rows_for_resume(path: &Path) -> Result<Vec<ResultRow>> {
    let context = || format!("preparing result table {} for resumption", path.display());
    let contents = tokio::fs::read(path).await.with_context(context)?;
    let body_len = last_line_start(&contents);
    let (body, last_line) = contents.split_at(body_len);
    let mut rows = parse_rows(body, path).await?;
    match parse_rows(last_line, path).await {
        Ok(last_rows) => {
            rows.extend(last_rows);
            if !last_line.is_empty() && !last_line.ends_with(b"\n") {
                log::warn!("Terminating last line of {}", path.display());
                let mut file = OpenOptions::new()
                    .append(true)
                    .open(path)
                    .await
                    .with_context(context)?;
                file.write_all(b"\n").await.with_context(context)?;
                file.flush().await.with_context(context)?;
            }
        }
        Err(error) => {
            log::warn!(
                "Dropping incomplete last line {:?} of {}: {error:#}",
                String::from_utf8_lossy(last_line).trim_end(),
                path.display()
            );
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .with_context(context)?;
            file.set_len(body_len as u64)
                .await
                .with_context(context)?;
        }
    }
    Ok(rows)
}

/// Byte offset where the last line of a table starts
fn last_line_start(contents: &[u8]) -> usize {
    let contents = contents.strip_suffix(b"\n").unwrap_or(contents);
    (contents.iter())
        .rposition(|&byte| byte == b'\n')
        .map_or(0, |newline| newline + 1)
}

/// Truth that a record is a result table header
fn is_header(record: &StringRecord) -> bool {
    record.iter().eq(HEADER)
}

/// Incremental writer of result tables
pub struct ResultWriter {
    /// CSV encoder over the output file
    writer: AsyncWriter<File>,
}
//
impl ResultWriter {
    /// Open a result table for writing
    ///
    /// Also returns the rows that the table already holds and that should be
    /// kept, which are always empty unless resuming.
    pub async fn open(path: &Path, mode: WriteMode) -> Result<(Self, Vec<ResultRow>)> {
        let context = || format!("opening result table {}", path.display());
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(context)?;
        }

        // Figure out what the table already contains
        let exists = tokio::fs::try_exists(path).await.with_context(context)?;
        let (existing, has_header) = match mode {
            WriteMode::Resume if exists => {
                let rows = read_rows_for_resume(path).await?;
                let is_empty = tokio::fs::metadata(path).await.with_context(context)?.len() == 0;
                log::info!(
                    "Resuming {} which already holds {} rows",
                    path.display(),
                    rows.len()
                );
                (rows, !is_empty)
            }
            WriteMode::Resume | WriteMode::Overwrite | WriteMode::Append => (Vec::new(), false),
        };

        // Open it accordingly
        let mut options = OpenOptions::new();
        options.create(true);
        if mode == WriteMode::Overwrite {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path).await.with_context(context)?;
        let mut writer = Self {
            writer: AsyncWriterBuilder::new()
                .has_headers(false)
                .create_writer(file),
        };
        if !has_header {
            writer.write_record(HEADER).await.with_context(context)?;
        }
        Ok((writer, existing))
    }

    /// Record the result count of a (term, year) pair
    ///
    /// The row is flushed to storage right away, so that an interrupted
    /// collection can be resumed.
    pub async fn write_row(&mut self, term: &str, year: Year, count: MatchCount) -> Result<()> {
        self.write_record([term, &year.to_string(), &count.to_string()])
            .await
            .with_context(|| format!("recording result count of {term} for year {year}"))
    }

    /// Write and flush a raw record
    async fn write_record(&mut self, record: [&str; 3]) -> Result<()> {
        self.writer.write_record(record).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Year-by-term table
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WideTable {
    /// Term labels, in column order
    pub labels: Vec<Box<str>>,

    /// Counts for each year, aligned with `labels`
    pub rows: BTreeMap<Year, Vec<MatchCount>>,
}
//
impl WideTable {
    /// Reshape the rows of a result table
    ///
    /// Columns are ordered by first appearance of each term, and rows by
    /// increasing year. Every term must have a count for every year.
    pub fn from_rows(rows: impl IntoIterator<Item = ResultRow>) -> Result<Self> {
        let mut labels = Vec::new();
        let mut columns = HashMap::new();
        let mut partial_rows = BTreeMap::<Year, Vec<Option<MatchCount>>>::new();
        for row in rows {
            let label = query::term_label(&row.query);
            let column = match columns.entry(label.clone()) {
                hash_map::Entry::Occupied(o) => *o.get(),
                hash_map::Entry::Vacant(v) => {
                    labels.push(label);
                    *v.insert(labels.len() - 1)
                }
            };
            let counts = match partial_rows.entry(row.year) {
                btree_map::Entry::Occupied(o) => o.into_mut(),
                btree_map::Entry::Vacant(v) => v.insert(Vec::new()),
            };
            if counts.len() <= column {
                counts.resize(column + 1, None);
            }
            if let Some(former) = counts[column].replace(row.count) {
                log::warn!(
                    "Query {} has several counts for year {}, replacing {former} with {}",
                    row.query,
                    row.year,
                    row.count
                );
            }
        }

        let rows = (partial_rows.into_iter())
            .map(|(year, mut counts)| {
                counts.resize(labels.len(), None);
                let counts = (counts.into_iter().zip(&labels))
                    .map(|(count, label)| {
                        count.with_context(|| format!("no count for {label} in year {year}"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((year, counts))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { labels, rows })
    }

    /// Save as CSV
    pub async fn save(&self, path: &Path) -> Result<()> {
        let context = || format!("writing year-by-term table {}", path.display());
        let file = File::create(path).await.with_context(context)?;
        let mut writer = AsyncWriterBuilder::new()
            .has_headers(false)
            .create_writer(file);
        let header = std::iter::once(YEAR_LABEL).chain(self.labels.iter().map(|label| &**label));
        writer.write_record(header).await.with_context(context)?;
        for (year, counts) in &self.rows {
            let record = std::iter::once(year.to_string())
                .chain(counts.iter().map(MatchCount::to_string))
                .collect::<Vec<_>>();
            writer.write_record(&record).await.with_context(context)?;
        }
        writer.flush().await.with_context(context)?;
        Ok(())
    }
}

/// Turn the result table at `input` into a year-by-term table at `output`
pub async fn pivot(input: &Path, output: &Path) -> Result<()> {
    let rows = read_rows(input).await?;
    let num_rows = rows.len();
    let table = WideTable::from_rows(rows)
        .with_context(|| format!("pivoting result table {}", input.display()))?;
    table.save(output).await?;
    log::info!(
        "Pivoted {num_rows} rows from {} into {} years x {} terms in {}",
        input.display(),
        table.rows.len(),
        table.labels.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(query: &str, year: Year, count: MatchCount) -> ResultRow {
        ResultRow {
            query: query.into(),
            year,
            count,
        }
    }

    #[tokio::test]
    async fn resume_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/counts.csv");

        let (mut writer, existing) = ResultWriter::open(&path, WriteMode::Resume).await.unwrap();
        assert!(existing.is_empty());
        writer.write_row(r#""a""#, 2000, 12).await.unwrap();
        drop(writer);

        let (mut writer, existing) = ResultWriter::open(&path, WriteMode::Resume).await.unwrap();
        assert_eq!(existing, [row(r#""a""#, 2000, 12)]);
        writer.write_row(r#""a""#, 2001, 0).await.unwrap();
        drop(writer);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "query,year,count\n\"\"\"a\"\"\",2000,12\n\"\"\"a\"\"\",2001,0\n");
        assert_eq!(
            read_rows(&path).await.unwrap(),
            [row(r#""a""#, 2000, 12), row(r#""a""#, 2001, 0)]
        );
    }

    #[tokio::test]
    async fn resume_terminates_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        std::fs::write(&path, "query,year,count\na,2000,1").unwrap();

        let (mut writer, existing) = ResultWriter::open(&path, WriteMode::Resume).await.unwrap();
        assert_eq!(existing, [row("a", 2000, 1)]);
        writer.write_row("a", 2001, 5).await.unwrap();
        drop(writer);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "query,year,count\na,2000,1\na,2001,5\n");
        assert_eq!(
            read_rows(&path).await.unwrap(),
            [row("a", 2000, 1), row("a", 2001, 5)]
        );
    }

    #[tokio::test]
    async fn resume_drops_incomplete_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        for incomplete in ["a,20", "a,2001,\n", "a,2001,1x"] {
            std::fs::write(&path, format!("query,year,count\na,2000,1\n{incomplete}")).unwrap();

            let (mut writer, existing) =
                ResultWriter::open(&path, WriteMode::Resume).await.unwrap();
            assert_eq!(existing, [row("a", 2000, 1)], "after {incomplete:?}");
            writer.write_row("a", 2001, 5).await.unwrap();
            drop(writer);

            let contents = std::fs::read_to_string(&path).unwrap();
            assert_eq!(contents, "query,year,count\na,2000,1\na,2001,5\n");
        }
    }

    #[tokio::test]
    async fn resume_repairs_incomplete_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        std::fs::write(&path, "query,ye").unwrap();

        let (mut writer, existing) = ResultWriter::open(&path, WriteMode::Resume).await.unwrap();
        assert!(existing.is_empty());
        writer.write_row("a", 2000, 1).await.unwrap();
        drop(writer);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "query,year,count\na,2000,1\n");
    }

    #[test]
    fn last_lines() {
        assert_eq!(last_line_start(b""), 0);
        assert_eq!(last_line_start(b"a,2000,1"), 0);
        assert_eq!(last_line_start(b"a,2000,1\n"), 0);
        assert_eq!(last_line_start(b"h\na,2000,1"), 2);
        assert_eq!(last_line_start(b"h\na,2000,1\n"), 2);
    }

    #[tokio::test]
    async fn overwrite_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        std::fs::write(&path, "query,year,count\nold,1999,5\n").unwrap();

        let (mut writer, existing) = ResultWriter::open(&path, WriteMode::Overwrite).await.unwrap();
        assert!(existing.is_empty());
        writer.write_row("new", 2000, 7).await.unwrap();
        drop(writer);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "query,year,count\nnew,2000,7\n");
    }

    #[tokio::test]
    async fn repeated_headers_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        std::fs::write(&path, "query,year,count\na,2000,1\nquery,year,count\na,2000,1\n").unwrap();
        assert_eq!(
            read_rows(&path).await.unwrap(),
            [row("a", 2000, 1), row("a", 2000, 1)]
        );
    }

    #[test]
    fn pivot_orders_columns_and_years() {
        let table = WideTable::from_rows([
            row(r#""f-measure""#, 2001, 20),
            row(r#""f-measure""#, 2000, 10),
            row(r#""error+rate""#, 2000, 90),
            row(r#""error+rate""#, 2001, 80),
        ])
        .unwrap();
        let labels = table.labels.iter().map(|label| &**label).collect::<Vec<_>>();
        assert_eq!(labels, ["f-measure", "error+rate"]);
        assert_eq!(
            table.rows,
            BTreeMap::from([(2000, vec![10, 90]), (2001, vec![20, 80])])
        );
    }

    #[test]
    fn pivot_keeps_last_duplicate() {
        let table = WideTable::from_rows([row("a", 2000, 1), row("a", 2000, 2)]).unwrap();
        assert_eq!(table.rows, BTreeMap::from([(2000, vec![2])]));
    }

    #[test]
    fn pivot_rejects_missing_pairs() {
        let error = WideTable::from_rows([row("a", 2000, 1), row("b", 2001, 2)]).unwrap_err();
        assert_eq!(error.to_string(), "no count for b in year 2000");
    }

    #[tokio::test]
    async fn pivot_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("long.csv");
        let output = dir.path().join("wide.csv");
        std::fs::write(
            &input,
            "query,year,count\n\"\"\"auc\"\"+AND+\"\"roc\"\"\",2000,3\n\"\"\"auc\"\"+AND+\"\"roc\"\"\",2001,4\n",
        )
        .unwrap();
        pivot(&input, &output).await.unwrap();
        let contents = std::fs::read_to_string(&output).unwrap();
        assert_eq!(contents, "year,auc+AND+roc\n2000,3\n2001,4\n");
    }
}
