//! In-memory score and reforms tables and their loaders.
//!
//! Sources are CSV, JSON (array or JSON Lines) and SQLite. Every source is
//! first read into a [`RawTable`] of optional string cells, then mapped onto
//! the fixed schema by column alias. Tables are immutable once loaded and are
//! shared read-only by all query-time stages.

use std::collections::BTreeSet;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TableError;

/// Seed for deterministic sampling.
const SAMPLE_SEED: u64 = 42;

const COUNTRY_ALIASES: &[&str] = &["country", "cou", "country_code", "iso3"];
const SECTOR_ALIASES: &[&str] = &["sector", "sect", "sector_code"];
const YEAR_ALIASES: &[&str] = &["year", "yea", "years"];
const POLICY_AREA_ALIASES: &[&str] = &["policy_area", "class", "policy_area_code", "policyarea"];
const SCORE_ALIASES: &[&str] = &["score", "stri", "value"];
const REFORM_TEXT_ALIASES: &[&str] = &["reform_text", "reform", "description", "measure"];

/// One score observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// ISO3 country code.
    pub country: String,
    /// Sector code or `ALLSEC`.
    pub sector: String,
    /// Observation year.
    pub year: i32,
    /// Policy-area code or `STRI`.
    pub policy_area: String,
    /// Restrictiveness score (0 = fully open).
    pub score: f64,
}

/// One qualitative reform record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReformsRow {
    /// ISO3 country code.
    pub country: String,
    /// Sector code.
    pub sector: String,
    /// Year of the reform.
    pub year: i32,
    /// Free-text description of the policy change.
    pub reform_text: String,
}

/// The quantitative score table.
#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    rows: Vec<ScoreRow>,
}

/// The qualitative reforms table.
#[derive(Debug, Clone, Default)]
pub struct ReformsTable {
    rows: Vec<ReformsRow>,
}

/// Descriptive statistics of a score table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableOverview {
    /// Number of rows.
    pub rows: usize,
    /// Distinct countries, sorted.
    pub countries: Vec<String>,
    /// Distinct sectors, sorted.
    pub sectors: Vec<String>,
    /// Distinct years, ascending.
    pub years: Vec<i32>,
    /// Distinct policy areas, sorted.
    pub policy_areas: Vec<String>,
    /// Lowest score, if any rows.
    pub min_score: Option<f64>,
    /// Highest score, if any rows.
    pub max_score: Option<f64>,
}

impl ScoreTable {
    /// Builds a table from rows.
    #[must_use]
    pub const fn new(rows: Vec<ScoreRow>) -> Self {
        Self { rows }
    }

    /// Loads a score table from `path`, keeping `sample_fraction` of the rows.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the file is missing, the format is
    /// unsupported, required columns are absent, a cell cannot be coerced,
    /// or the fraction is outside (0, 1].
    pub fn load(path: &Path, sample_fraction: f64) -> Result<Self, TableError> {
        validate_fraction(sample_fraction)?;
        let raw = RawTable::read(path)?;
        let table = Self::from_raw(&raw)?;
        let rows = sample_rows(table.rows, sample_fraction);
        debug!(path = %path.display(), rows = rows.len(), "score table loaded");
        Ok(Self { rows })
    }

    /// Maps a raw table onto the score schema.
    ///
    /// Rows with an empty score are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumns`] or [`TableError::Schema`].
    pub fn from_raw(raw: &RawTable) -> Result<Self, TableError> {
        let cols = raw.resolve(&[
            ("country", COUNTRY_ALIASES),
            ("sector", SECTOR_ALIASES),
            ("year", YEAR_ALIASES),
            ("policy_area", POLICY_AREA_ALIASES),
            ("score", SCORE_ALIASES),
        ])?;

        let mut rows = Vec::with_capacity(raw.rows.len());
        let mut skipped = 0usize;
        for (idx, record) in raw.rows.iter().enumerate() {
            let line = idx + 1;
            let Some(score) = cell(record, cols[4]) else {
                skipped += 1;
                continue;
            };
            rows.push(ScoreRow {
                country: required(record, cols[0], "country", line)?.to_string(),
                sector: required(record, cols[1], "sector", line)?.to_string(),
                year: parse_year(required(record, cols[2], "year", line)?, line)?,
                policy_area: required(record, cols[3], "policy_area", line)?.to_string(),
                score: score.parse::<f64>().map_err(|_| TableError::Schema {
                    line,
                    message: format!("score is not numeric: {score:?}"),
                })?,
            });
        }
        if skipped > 0 {
            debug!(skipped, "rows without a score skipped");
        }
        Ok(Self { rows })
    }

    /// All rows in load order.
    #[must_use]
    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Computes descriptive statistics.
    #[must_use]
    pub fn overview(&self) -> TableOverview {
        let countries: BTreeSet<&str> = self.rows.iter().map(|r| r.country.as_str()).collect();
        let sectors: BTreeSet<&str> = self.rows.iter().map(|r| r.sector.as_str()).collect();
        let years: BTreeSet<i32> = self.rows.iter().map(|r| r.year).collect();
        let areas: BTreeSet<&str> = self.rows.iter().map(|r| r.policy_area.as_str()).collect();
        let min_score = self.rows.iter().map(|r| r.score).reduce(f64::min);
        let max_score = self.rows.iter().map(|r| r.score).reduce(f64::max);

        TableOverview {
            rows: self.rows.len(),
            countries: countries.into_iter().map(String::from).collect(),
            sectors: sectors.into_iter().map(String::from).collect(),
            years: years.into_iter().collect(),
            policy_areas: areas.into_iter().map(String::from).collect(),
            min_score,
            max_score,
        }
    }
}

impl ReformsTable {
    /// Builds a table from rows.
    #[must_use]
    pub const fn new(rows: Vec<ReformsRow>) -> Self {
        Self { rows }
    }

    /// Loads a reforms table from `path`. Reforms are never sampled.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] on missing files, unsupported formats or
    /// schema violations.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let raw = RawTable::read(path)?;
        let table = Self::from_raw(&raw)?;
        debug!(path = %path.display(), rows = table.rows.len(), "reforms table loaded");
        Ok(table)
    }

    /// Maps a raw table onto the reforms schema.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumns`] or [`TableError::Schema`].
    pub fn from_raw(raw: &RawTable) -> Result<Self, TableError> {
        let cols = raw.resolve(&[
            ("country", COUNTRY_ALIASES),
            ("sector", SECTOR_ALIASES),
            ("year", YEAR_ALIASES),
            ("reform_text", REFORM_TEXT_ALIASES),
        ])?;

        let rows = raw
            .rows
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let line = idx + 1;
                Ok(ReformsRow {
                    country: required(record, cols[0], "country", line)?.to_string(),
                    sector: cell(record, cols[1]).unwrap_or_default().to_string(),
                    year: parse_year(required(record, cols[2], "year", line)?, line)?,
                    reform_text: required(record, cols[3], "reform_text", line)?.to_string(),
                })
            })
            .collect::<Result<Vec<_>, TableError>>()?;
        Ok(Self { rows })
    }

    /// All rows in load order.
    #[must_use]
    pub fn rows(&self) -> &[ReformsRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Untyped table: header names and optional string cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Column names as found in the source.
    pub headers: Vec<String>,
    /// Records; `None` marks an empty or null cell.
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Reads a source, dispatching on the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] or [`TableError::UnsupportedFormat`],
    /// or the reader's own error.
    pub fn read(path: &Path) -> Result<Self, TableError> {
        if !path.exists() {
            return Err(TableError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Self::read_csv(path),
            "json" | "jsonl" | "ndjson" => Self::read_json(path),
            "db" | "sqlite" | "sqlite3" => Self::read_sqlite(path),
            _ => Err(TableError::UnsupportedFormat { extension }),
        }
    }

    fn read_csv(path: &Path) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(normalize_cell).collect());
        }
        Ok(Self { headers, rows })
    }

    fn read_json(path: &Path) -> Result<Self, TableError> {
        let text = std::fs::read_to_string(path)?;
        let objects: Vec<serde_json::Map<String, serde_json::Value>> =
            if text.trim_start().starts_with('[') {
                serde_json::from_str(&text)?
            } else {
                text.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(serde_json::from_str)
                    .collect::<Result<Vec<_>, serde_json::Error>>()?
            };

        let mut headers: Vec<String> = Vec::new();
        for obj in &objects {
            for key in obj.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
        let rows = objects
            .iter()
            .map(|obj| {
                headers
                    .iter()
                    .map(|h| obj.get(h).and_then(json_cell))
                    .collect()
            })
            .collect();
        Ok(Self { headers, rows })
    }

    fn read_sqlite(path: &Path) -> Result<Self, TableError> {
        use rusqlite::types::Value;

        let conn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        let table: String = conn.query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name LIMIT 1",
            [],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\"", table.replace('"', "")))?;
        let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = headers.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| {
                        row.get::<_, Value>(i).map(|v| match v {
                            Value::Null | Value::Blob(_) => None,
                            Value::Integer(n) => Some(n.to_string()),
                            Value::Real(f) => Some(f.to_string()),
                            Value::Text(s) => normalize_cell(&s),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    /// Resolves each `(canonical, aliases)` pair to a column index.
    fn resolve(&self, wanted: &[(&str, &[&str])]) -> Result<Vec<usize>, TableError> {
        let mut found = Vec::with_capacity(wanted.len());
        let mut missing = Vec::new();
        for (canonical, aliases) in wanted {
            match self.headers.iter().position(|h| {
                let h = h.trim().to_ascii_lowercase();
                aliases.iter().any(|a| *a == h)
            }) {
                Some(idx) => found.push(idx),
                None => missing.push((*canonical).to_string()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(TableError::MissingColumns { columns: missing })
        }
    }
}

/// Rejects fractions outside (0, 1].
fn validate_fraction(fraction: f64) -> Result<(), TableError> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(TableError::InvalidFraction { fraction })
    }
}

/// Keeps `ceil(len * fraction)` rows chosen with a fixed seed, in load order.
fn sample_rows<T>(rows: Vec<T>, fraction: f64) -> Vec<T> {
    if fraction >= 1.0 || rows.is_empty() {
        return rows;
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let amount = ((rows.len() as f64) * fraction).ceil() as usize;
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let mut keep = rand::seq::index::sample(&mut rng, rows.len(), amount.min(rows.len())).into_vec();
    keep.sort_unstable();

    let mut keep = keep.into_iter().peekable();
    rows.into_iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            if keep.peek() == Some(&idx) {
                keep.next();
                Some(row)
            } else {
                None
            }
        })
        .collect()
}

fn normalize_cell(raw: &str) -> Option<String> {
    let t = raw.trim();
    match t {
        "" | "nan" | "NaN" | "None" | "null" | "NULL" => None,
        _ => Some(t.to_string()),
    }
}

fn json_cell(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => normalize_cell(s),
        other => Some(other.to_string()),
    }
}

fn cell(record: &[Option<String>], idx: usize) -> Option<&str> {
    record.get(idx).and_then(Option::as_deref)
}

fn required<'a>(
    record: &'a [Option<String>],
    idx: usize,
    column: &str,
    line: usize,
) -> Result<&'a str, TableError> {
    cell(record, idx).ok_or_else(|| TableError::Schema {
        line,
        message: format!("{column} is empty"),
    })
}

/// Parses `2022` or `2022.0`.
fn parse_year(raw: &str, line: usize) -> Result<i32, TableError> {
    let err = || TableError::Schema {
        line,
        message: format!("year is not an integer: {raw:?}"),
    };
    if let Ok(year) = raw.parse::<i32>() {
        return Ok(year);
    }
    let f = raw.parse::<f64>().map_err(|_| err())?;
    if f.fract() == 0.0 && f.abs() < f64::from(i32::MAX) {
        #[allow(clippy::cast_possible_truncation)]
        Ok(f as i32)
    } else {
        Err(err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap_or_else(|_| unreachable!());
        f.write_all(content.as_bytes())
            .unwrap_or_else(|_| unreachable!());
        path
    }

    const SCORES_CSV: &str = "country,sector,year,policy_area,score\n\
        FRA,ALLSEC,2022,STRI,0.25\n\
        FRA,TC,2022,STRI,0.18\n\
        DEU, TC ,2022,STRI,0.15\n\
        DEU,TC,2022,STRI,\n";

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = write_file(&dir, "scores.csv", SCORES_CSV);
        let table = ScoreTable::load(&path, 1.0).unwrap_or_else(|_| unreachable!());
        // empty score skipped
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[2].sector, "TC");
        assert!((table.rows()[0].score - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_csv_aliases() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = write_file(
            &dir,
            "legacy.csv",
            "COU,SECT,YEA,CLASS,STRI\nJPN,PSleg,2023.0,STRI,0.3\n",
        );
        let table = ScoreTable::load(&path, 1.0).unwrap_or_else(|_| unreachable!());
        assert_eq!(table.rows()[0].year, 2023);
        assert_eq!(table.rows()[0].country, "JPN");
    }

    #[test]
    fn test_load_json_lines_and_array() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let lines = write_file(
            &dir,
            "scores.jsonl",
            "{\"country\":\"FRA\",\"sector\":\"TC\",\"year\":2022,\"policy_area\":\"STRI\",\"score\":0.2}\n\
             {\"country\":\"ITA\",\"sector\":\"TC\",\"year\":2022,\"policy_area\":\"STRI\",\"score\":null}\n",
        );
        let table = ScoreTable::load(&lines, 1.0).unwrap_or_else(|_| unreachable!());
        assert_eq!(table.len(), 1);

        let array = write_file(
            &dir,
            "reforms.json",
            r#"[{"country":"FRA","sector":"TC","year":2022,"reform_text":"Eased licensing."}]"#,
        );
        let reforms = ReformsTable::load(&array).unwrap_or_else(|_| unreachable!());
        assert_eq!(reforms.rows()[0].reform_text, "Eased licensing.");
    }

    #[test]
    fn test_load_sqlite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("scores.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap_or_else(|_| unreachable!());
            conn.execute_batch(
                "CREATE TABLE stri (country TEXT, sector TEXT, year INTEGER, policy_area TEXT, score REAL);
                 INSERT INTO stri VALUES ('AUS', 'CS', 2024, 'STRI', 0.12);",
            )
            .unwrap_or_else(|_| unreachable!());
        }
        let table = ScoreTable::load(&path, 1.0).unwrap_or_else(|_| unreachable!());
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].year, 2024);
    }

    #[test]
    fn test_missing_columns() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = write_file(&dir, "bad.csv", "country,year\nFRA,2022\n");
        let err = ScoreTable::load(&path, 1.0).err();
        assert!(matches!(err, Some(TableError::MissingColumns { ref columns }) if columns.len() == 3));
    }

    #[test]
    fn test_non_numeric_score_is_schema_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = write_file(
            &dir,
            "bad.csv",
            "country,sector,year,policy_area,score\nFRA,TC,2022,STRI,high\n",
        );
        let err = ScoreTable::load(&path, 1.0).err();
        assert!(matches!(err, Some(TableError::Schema { line: 1, .. })));
    }

    #[test]
    fn test_unsupported_and_missing_files() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = write_file(&dir, "scores.dta", "");
        assert!(matches!(
            ScoreTable::load(&path, 1.0),
            Err(TableError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            ScoreTable::load(&dir.path().join("nope.csv"), 1.0),
            Err(TableError::NotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(validate_fraction(0.0).is_err());
        assert!(validate_fraction(1.5).is_err());
        assert!(validate_fraction(f64::NAN).is_err());
        assert!(validate_fraction(1.0).is_ok());
    }

    #[test]
    fn test_sampling_is_deterministic_and_ordered() {
        let rows: Vec<usize> = (0..100).collect();
        let a = sample_rows(rows.clone(), 0.25);
        let b = sample_rows(rows, 0.25);
        assert_eq!(a.len(), 25);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_overview() {
        let table = ScoreTable::new(vec![
            ScoreRow {
                country: "FRA".into(),
                sector: "TC".into(),
                year: 2022,
                policy_area: "STRI".into(),
                score: 0.2,
            },
            ScoreRow {
                country: "DEU".into(),
                sector: "TC".into(),
                year: 2021,
                policy_area: "STRI".into(),
                score: 0.1,
            },
        ]);
        let overview = table.overview();
        assert_eq!(overview.countries, vec!["DEU", "FRA"]);
        assert_eq!(overview.years, vec![2021, 2022]);
        assert_eq!(overview.min_score, Some(0.1));
        assert_eq!(overview.max_score, Some(0.2));
    }
}
