//! Contained program executor.
//!
//! Interprets a [`Program`] against the score table. A program sees exactly
//! two things: the table, read-only, and a [`Charting`] capability that
//! turns points into a declarative [`Figure`]. Every failure (unparseable
//! text, a broken structural rule, an evaluation fault) becomes a message
//! envelope naming the fault category; [`Executor::execute`] never errors.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, warn};

use super::program::{ChartSpec, Column, Operation, Order, Program};
use crate::core::envelope::{
    AggregateRow, ChartTemplate, Figure, NO_DATA_MESSAGE, Point, RankedEntry, RankingBaseline,
    ResultData, ResultEnvelope, Series, SummaryReport,
};
use crate::core::query::SummaryTarget;
use crate::core::table::{ScoreRow, ScoreTable};
use crate::core::vocab::{ALLSEC, STRI, display_name};
use crate::error::ProgramError;

/// Entries on each side of a summary ranking when the program names none.
const DEFAULT_TOP_N: usize = 4;

/// Chart construction capability handed to programs.
///
/// Implementations apply the template rules; programs only supply points.
pub trait Charting: Send + Sync {
    /// Bars for several entities in one period.
    fn ranking_bar(&self, spec: &ChartSpec, bars: Vec<Point>) -> Figure;

    /// One entity over time.
    fn time_series(&self, spec: &ChartSpec, series: Series) -> Figure;

    /// Several entities over time.
    fn comparative_time_series(&self, spec: &ChartSpec, series: Vec<Series>) -> Figure;
}

/// Default charting: builds [`Figure`] handles, renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeCharts;

impl DeclarativeCharts {
    fn figure(spec: &ChartSpec, series: Vec<Series>) -> Figure {
        Figure {
            template: spec.template,
            title: spec.title.clone(),
            x_label: spec.x_label.clone(),
            y_label: if spec.y_label.is_empty() {
                "STRI score".to_string()
            } else {
                spec.y_label.clone()
            },
            series,
            rotate_labels: false,
            markers: false,
            legend: false,
        }
    }
}

/// Orders year labels numerically.
fn chronological(points: &mut [Point]) {
    points.sort_by_key(|p| p.x.parse::<i32>().unwrap_or(i32::MAX));
}

impl Charting for DeclarativeCharts {
    fn ranking_bar(&self, spec: &ChartSpec, mut bars: Vec<Point>) -> Figure {
        bars.sort_by(|a, b| a.y.total_cmp(&b.y).then_with(|| a.x.cmp(&b.x)));
        let mut figure = Self::figure(
            spec,
            vec![Series {
                name: spec.title.clone(),
                points: bars,
            }],
        );
        figure.rotate_labels = true;
        figure
    }

    fn time_series(&self, spec: &ChartSpec, mut series: Series) -> Figure {
        chronological(&mut series.points);
        let mut figure = Self::figure(spec, vec![series]);
        figure.markers = true;
        figure
    }

    fn comparative_time_series(&self, spec: &ChartSpec, mut series: Vec<Series>) -> Figure {
        for s in &mut series {
            chronological(&mut s.points);
        }
        let mut figure = Self::figure(spec, series);
        figure.markers = true;
        figure.legend = true;
        figure
    }
}

/// Runs programs against one score table.
pub struct Executor<'a> {
    table: &'a ScoreTable,
    charting: &'a dyn Charting,
    default_top_n: usize,
}

impl<'a> Executor<'a> {
    /// Creates an executor with declarative charting.
    #[must_use]
    pub fn new(table: &'a ScoreTable) -> Self {
        Self {
            table,
            charting: &DeclarativeCharts,
            default_top_n: DEFAULT_TOP_N,
        }
    }

    /// Replaces the charting capability.
    #[must_use]
    pub fn with_charting(mut self, charting: &'a dyn Charting) -> Self {
        self.charting = charting;
        self
    }

    /// Sets the summary ranking length used when a program names none.
    #[must_use]
    pub const fn with_default_top_n(mut self, n: usize) -> Self {
        self.default_top_n = n;
        self
    }

    /// Parses, validates and evaluates program text.
    ///
    /// The result always satisfies the single-outcome envelope shape.
    #[must_use]
    pub fn execute(&self, source: &str) -> ResultEnvelope {
        let started = Instant::now();
        let envelope = match Program::parse(source).and_then(|program| self.run(&program)) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(category = e.category(), error = %e, "program fault");
                ResultEnvelope::fault(e.category(), &e.to_string())
            }
        };
        debug!(
            has_content = envelope.has_content(),
            has_figure = envelope.figure.is_some(),
            elapsed_ms = started.elapsed().as_millis(),
            "program executed"
        );
        envelope
    }

    fn run(&self, program: &Program) -> Result<ResultEnvelope, ProgramError> {
        if let Operation::Summary {
            country,
            sector,
            year,
            top_n,
        } = &program.operation
        {
            let target = match (country, sector) {
                (Some(c), _) => SummaryTarget::Country(c.clone()),
                (None, Some(s)) => SummaryTarget::Sector(s.clone()),
                (None, None) => {
                    return Err(ProgramError::Invalid(
                        "summary needs a country or a sector".to_string(),
                    ));
                }
            };
            let report = self.summary(target, *year, top_n.unwrap_or(self.default_top_n))?;
            return Ok(ResultEnvelope::with_data(ResultData::Summary(report)));
        }

        let rows: Vec<&ScoreRow> = self
            .table
            .rows()
            .iter()
            .filter(|row| program.filters.matches(row))
            .collect();
        if rows.is_empty() {
            return Ok(ResultEnvelope::message(NO_DATA_MESSAGE));
        }

        let data = match &program.operation {
            Operation::Select => ResultData::Rows(rows.iter().map(|r| (*r).clone()).collect()),
            Operation::Rank { order, limit } => ResultData::Rows(rank(&rows, *order, *limit)),
            Operation::Average { by } => ResultData::Aggregates(average(&rows, *by)?),
            Operation::Count { column } => ResultData::Count {
                column: column.as_str().to_string(),
                count: distinct(&rows, *column).len(),
            },
            Operation::Distinct { column } => ResultData::Values {
                column: column.as_str().to_string(),
                values: distinct(&rows, *column).into_iter().collect(),
            },
            Operation::Summary { .. } => {
                return Err(ProgramError::Evaluation(
                    "summary reached row evaluation".to_string(),
                ));
            }
        };

        let Some(spec) = &program.chart else {
            return Ok(ResultEnvelope::with_data(data));
        };
        let chart_rows: Vec<&ScoreRow> = match &data {
            ResultData::Rows(ranked) => ranked.iter().collect(),
            _ => rows,
        };
        let figure = self.chart(spec, &chart_rows)?;
        Ok(ResultEnvelope::with_figure(data, figure))
    }

    fn chart(&self, spec: &ChartSpec, rows: &[&ScoreRow]) -> Result<Figure, ProgramError> {
        match spec.template {
            ChartTemplate::RankingBar => {
                let column = group_column(spec)?;
                // one period: keep each entity's most recent row
                let mut latest: BTreeMap<String, &ScoreRow> = BTreeMap::new();
                for row in rows {
                    let key = column.value(row);
                    if latest.get(&key).is_none_or(|kept| kept.year < row.year) {
                        latest.insert(key, row);
                    }
                }
                let bars = latest
                    .into_iter()
                    .map(|(key, row)| Point {
                        x: label(column, &key),
                        y: row.score,
                    })
                    .collect();
                Ok(self.charting.ranking_bar(spec, bars))
            }
            ChartTemplate::TimeSeries => {
                let mut by_year: BTreeMap<i32, f64> = BTreeMap::new();
                for row in rows {
                    if by_year.insert(row.year, row.score).is_some() {
                        return Err(ProgramError::Evaluation(format!(
                            "time series matched several rows for {}; \
                             use comparative_time_series",
                            row.year
                        )));
                    }
                }
                let name = rows
                    .first()
                    .map(|r| format!("{} {}", r.country, display_name(&r.sector)))
                    .unwrap_or_default();
                let points = by_year
                    .into_iter()
                    .map(|(year, score)| Point {
                        x: year.to_string(),
                        y: score,
                    })
                    .collect();
                Ok(self.charting.time_series(spec, Series { name, points }))
            }
            ChartTemplate::ComparativeTimeSeries => {
                let column = group_column(spec)?;
                let mut entities: Vec<String> = Vec::new();
                let mut lines: BTreeMap<String, BTreeMap<i32, f64>> = BTreeMap::new();
                for row in rows {
                    let key = column.value(row);
                    if !entities.contains(&key) {
                        entities.push(key.clone());
                    }
                    lines.entry(key).or_default().insert(row.year, row.score);
                }
                let series = entities
                    .into_iter()
                    .map(|key| {
                        let points = lines
                            .remove(&key)
                            .unwrap_or_default()
                            .into_iter()
                            .map(|(year, score)| Point {
                                x: year.to_string(),
                                y: score,
                            })
                            .collect();
                        Series {
                            name: label(column, &key),
                            points,
                        }
                    })
                    .collect();
                Ok(self.charting.comparative_time_series(spec, series))
            }
        }
    }

    fn summary(
        &self,
        target: SummaryTarget,
        year: Option<i32>,
        top_n: usize,
    ) -> Result<SummaryReport, ProgramError> {
        let year = year
            .or_else(|| self.table.rows().iter().map(|r| r.year).max())
            .ok_or_else(|| ProgramError::Evaluation("score table is empty".to_string()))?;
        let previous_year = year - 1;

        let (aggregate, previous_aggregate, baseline, mut entries) = match &target {
            SummaryTarget::Country(country) => (
                self.country_aggregate(country, year),
                self.country_aggregate(country, previous_year),
                RankingBaseline::DeviationFromSectorAverage,
                self.country_sector_entries(country, year),
            ),
            SummaryTarget::Sector(sector) => (
                self.sector_aggregate(sector, year),
                self.sector_aggregate(sector, previous_year),
                RankingBaseline::AbsoluteScore,
                self.sector_country_entries(sector, year),
            ),
        };

        let key = |e: &RankedEntry| e.deviation.unwrap_or(e.score);
        entries.sort_by(|a, b| key(b).total_cmp(&key(a)).then_with(|| a.code.cmp(&b.code)));
        let most_restrictive: Vec<RankedEntry> = entries.iter().take(top_n).cloned().collect();
        let least_restrictive: Vec<RankedEntry> =
            entries.iter().rev().take(top_n).cloned().collect();

        debug!(
            target = ?target,
            year,
            aggregate,
            previous_aggregate,
            entries = entries.len(),
            "summary computed"
        );
        Ok(SummaryReport {
            target,
            year,
            aggregate,
            previous_year,
            previous_aggregate,
            baseline,
            most_restrictive,
            least_restrictive,
        })
    }

    /// General-score rows (`policy_area = STRI`) for one year.
    fn general_rows(&self, year: i32) -> impl Iterator<Item = &ScoreRow> {
        self.table
            .rows()
            .iter()
            .filter(move |r| r.year == year && r.policy_area == STRI)
    }

    /// A country's overall score: its `ALLSEC` row.
    fn country_aggregate(&self, country: &str, year: i32) -> Option<f64> {
        self.general_rows(year)
            .find(|r| r.country == country && r.sector == ALLSEC)
            .map(|r| r.score)
    }

    /// A sector's cross-country average.
    fn sector_aggregate(&self, sector: &str, year: i32) -> Option<f64> {
        mean(
            self.general_rows(year)
                .filter(|r| r.sector == sector)
                .map(|r| r.score),
        )
    }

    /// A country's sectors, each measured against the sector's average
    /// across all countries.
    fn country_sector_entries(&self, country: &str, year: i32) -> Vec<RankedEntry> {
        let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for row in self.general_rows(year).filter(|r| r.sector != ALLSEC) {
            let entry = totals.entry(row.sector.as_str()).or_insert((0.0, 0));
            entry.0 += row.score;
            entry.1 += 1;
        }
        self.general_rows(year)
            .filter(|r| r.country == country && r.sector != ALLSEC)
            .map(|row| {
                let reference = totals
                    .get(row.sector.as_str())
                    .map(|(sum, n)| sum / count_f64(*n));
                RankedEntry {
                    code: row.sector.clone(),
                    score: row.score,
                    reference,
                    deviation: reference.map(|r| row.score - r),
                }
            })
            .collect()
    }

    /// Countries in one sector, by absolute score.
    fn sector_country_entries(&self, sector: &str, year: i32) -> Vec<RankedEntry> {
        self.general_rows(year)
            .filter(|r| r.sector == sector)
            .map(|row| RankedEntry {
                code: row.country.clone(),
                score: row.score,
                reference: None,
                deviation: None,
            })
            .collect()
    }
}

fn group_column(spec: &ChartSpec) -> Result<Column, ProgramError> {
    spec.group_by.ok_or_else(|| {
        ProgramError::Invalid(format!("{:?} chart needs a group_by column", spec.template))
    })
}

/// Axis or legend label for a column value.
fn label(column: Column, value: &str) -> String {
    match column {
        Column::Sector | Column::PolicyArea => display_name(value).to_string(),
        Column::Country | Column::Year => value.to_string(),
    }
}

fn rank(rows: &[&ScoreRow], order: Order, limit: Option<usize>) -> Vec<ScoreRow> {
    let mut ranked: Vec<ScoreRow> = rows.iter().map(|r| (*r).clone()).collect();
    match order {
        Order::Asc => ranked.sort_by(|a, b| a.score.total_cmp(&b.score)),
        Order::Desc => ranked.sort_by(|a, b| b.score.total_cmp(&a.score)),
    }
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

fn average(rows: &[&ScoreRow], by: Option<Column>) -> Result<Vec<AggregateRow>, ProgramError> {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let key = by.map_or_else(|| "all".to_string(), |column| column.value(row));
        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += row.score;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(group, (sum, count))| {
            let value = sum / count_f64(count);
            if value.is_finite() {
                Ok(AggregateRow {
                    group,
                    value,
                    count,
                })
            } else {
                Err(ProgramError::Evaluation(format!(
                    "average for {group} is not a number"
                )))
            }
        })
        .collect()
}

fn distinct(rows: &[&ScoreRow], column: Column) -> BTreeSet<String> {
    rows.iter().map(|row| column.value(row)).collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / count_f64(n))
}

#[allow(clippy::cast_precision_loss)]
const fn count_f64(n: usize) -> f64 {
    n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(country: &str, sector: &str, year: i32, area: &str, score: f64) -> ScoreRow {
        ScoreRow {
            country: country.into(),
            sector: sector.into(),
            year,
            policy_area: area.into(),
            score,
        }
    }

    fn table() -> ScoreTable {
        let mut rows = Vec::new();
        for (country, base) in [("FRA", 0.20), ("DEU", 0.15), ("ITA", 0.30)] {
            for year in [2022, 2023, 2024] {
                let drift = f64::from(2024 - year) * 0.01;
                rows.push(row(country, ALLSEC, year, STRI, base + drift));
                for (i, sector) in ["TC", "CS", "FSbnk", "FSins", "PSleg", "CO"].iter().enumerate() {
                    let score = base + f64::from(u8::try_from(i).unwrap_or(0)) * 0.05 + drift;
                    rows.push(row(country, sector, year, STRI, score));
                    rows.push(row(country, sector, year, "ENTRY", score / 2.0));
                }
            }
        }
        // only 2024 for Japan: no previous year
        rows.push(row("JPN", ALLSEC, 2024, STRI, 0.18));
        rows.push(row("JPN", "TC", 2024, STRI, 0.25));
        rows.push(row("JPN", "CS", 2024, STRI, 0.12));
        ScoreTable::new(rows)
    }

    fn exec(table: &ScoreTable, source: &str) -> ResultEnvelope {
        Executor::new(table).execute(source)
    }

    fn rows_of(envelope: &ResultEnvelope) -> Vec<ScoreRow> {
        match &envelope.data {
            Some(ResultData::Rows(rows)) => rows.clone(),
            other => unreachable!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn test_select_exact_rows() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"countries": ["FRA", "DEU"], "sectors": ["TC"], "years": [2022],
                "policy_areas": ["STRI"]}, "operation": {"op": "select"}}"#,
        );
        let rows = rows_of(&env);
        assert_eq!(rows.len(), 2);
        assert!(env.message.is_empty());
        assert!(env.figure.is_none());
    }

    #[test]
    fn test_disaggregated_answer_excludes_allsec() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"countries": ["FRA"], "sectors": ["TC", "CS", "FSbnk"], "years": [2024],
                "policy_areas": ["STRI"]}, "operation": {"op": "rank", "order": "desc"}}"#,
        );
        let rows = rows_of(&env);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.sector != ALLSEC));
        assert!(rows.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_no_rows_gives_message() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"countries": ["BRA"], "sectors": ["TC"]}, "operation": {"op": "select"}}"#,
        );
        assert!(env.data.is_none());
        assert!(env.figure.is_none());
        assert_eq!(env.message, NO_DATA_MESSAGE);
    }

    #[test]
    fn test_faults_are_contained() {
        let table = table();
        let env = exec(&table, "result = df.query('sector == \"TC\"')");
        assert!(env.data.is_none());
        assert!(env.message.starts_with("Execution error (parse)"));

        let env = exec(&table, r#"{"filters": {}, "operation": {"op": "select"}}"#);
        assert!(env.message.starts_with("Execution error (validation)"));
    }

    #[test]
    fn test_time_series_with_several_rows_per_year_faults() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"countries": ["FRA", "DEU"], "sectors": ["ALLSEC"]},
                "operation": {"op": "select"}, "chart": {"template": "time_series"}}"#,
        );
        assert!(env.message.starts_with("Execution error (evaluation)"));
    }

    #[test]
    fn test_average_and_count() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"sectors": ["ALLSEC"], "years": [2024], "countries": ["FRA", "DEU"]},
                "operation": {"op": "average"}}"#,
        );
        match env.data {
            Some(ResultData::Aggregates(ref groups)) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].count, 2);
                assert!((groups[0].value - 0.175).abs() < 1e-9);
            }
            ref other => unreachable!("expected aggregates, got {other:?}"),
        }

        let env = exec(
            &table,
            r#"{"filters": {"sectors": ["ALLSEC"]}, "operation": {"op": "count", "column": "country"}}"#,
        );
        assert_eq!(
            env.data,
            Some(ResultData::Count {
                column: "country".into(),
                count: 4
            })
        );
    }

    #[test]
    fn test_ranking_bar_sorted_ascending() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"sectors": ["ALLSEC"], "years": [2024], "policy_areas": ["STRI"]},
                "operation": {"op": "select"},
                "chart": {"template": "ranking_bar", "group_by": "country", "title": "Overall STRI 2024"}}"#,
        );
        let figure = env.figure.unwrap_or_else(|| unreachable!());
        assert_eq!(figure.template, ChartTemplate::RankingBar);
        assert!(figure.rotate_labels);
        let points = &figure.series[0].points;
        assert_eq!(points.len(), 4);
        assert!(points.windows(2).all(|w| w[0].y <= w[1].y));
        assert_eq!(points[0].x, "DEU");
    }

    #[test]
    fn test_time_series_chronological_with_markers() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"countries": ["FRA"], "sectors": ["ALLSEC"], "policy_areas": ["STRI"]},
                "operation": {"op": "select"}, "chart": {"template": "time_series", "title": "France"}}"#,
        );
        let figure = env.figure.unwrap_or_else(|| unreachable!());
        assert!(figure.markers);
        let years: Vec<&str> = figure.series[0].points.iter().map(|p| p.x.as_str()).collect();
        assert_eq!(years, vec!["2022", "2023", "2024"]);
    }

    #[test]
    fn test_comparative_time_series_one_line_per_entity() {
        let table = table();
        let env = exec(
            &table,
            r#"{"filters": {"countries": ["FRA", "ITA"], "sectors": ["TC"], "policy_areas": ["STRI"]},
                "operation": {"op": "select"},
                "chart": {"template": "comparative_time_series", "group_by": "country"}}"#,
        );
        let figure = env.figure.unwrap_or_else(|| unreachable!());
        assert!(figure.legend);
        assert_eq!(figure.series.len(), 2);
        assert!(figure.series.iter().all(|s| s.points.len() == 3));
    }

    #[test]
    fn test_country_summary_uses_sector_deviation() {
        let table = table();
        let env = exec(
            &table,
            r#"{"operation": {"op": "summary", "country": "ITA", "year": 2024, "top_n": 2}}"#,
        );
        let Some(ResultData::Summary(report)) = env.data else {
            unreachable!("expected a summary");
        };
        assert_eq!(report.baseline, RankingBaseline::DeviationFromSectorAverage);
        assert!((report.aggregate.unwrap_or_default() - 0.30).abs() < 1e-9);
        assert!(report.previous_aggregate.is_some());
        assert!(report.change().is_some_and(|c| c < 0.0));
        assert_eq!(report.most_restrictive.len(), 2);
        assert_eq!(report.least_restrictive.len(), 2);
        assert!(
            report
                .most_restrictive
                .iter()
                .chain(&report.least_restrictive)
                .all(|e| e.code != ALLSEC && e.deviation.is_some())
        );
    }

    #[test]
    fn test_summary_without_previous_year() {
        let table = table();
        let env = exec(&table, r#"{"operation": {"op": "summary", "country": "JPN"}}"#);
        let Some(ResultData::Summary(report)) = env.data else {
            unreachable!("expected a summary");
        };
        assert_eq!(report.year, 2024);
        assert_eq!(report.previous_year, 2023);
        assert!(report.previous_aggregate.is_none());
        assert!(report.change().is_none());
        assert!(report.aggregate.is_some());
        assert_eq!(report.most_restrictive[0].code, "TC");
    }

    #[test]
    fn test_sector_summary_ranks_countries() {
        let table = table();
        let env = exec(
            &table,
            r#"{"operation": {"op": "summary", "sector": "TC", "year": 2024, "top_n": 1}}"#,
        );
        let Some(ResultData::Summary(report)) = env.data else {
            unreachable!("expected a summary");
        };
        assert_eq!(report.baseline, RankingBaseline::AbsoluteScore);
        assert_eq!(report.most_restrictive[0].code, "ITA");
        assert_eq!(report.least_restrictive[0].code, "DEU");
    }

    #[test]
    fn test_summary_for_unknown_country_is_empty() {
        let table = table();
        let env = exec(&table, r#"{"operation": {"op": "summary", "country": "BRA"}}"#);
        assert!(env.data.is_none());
        assert_eq!(env.message, NO_DATA_MESSAGE);
    }

    #[test]
    fn test_table_unchanged_after_execution() {
        let table = table();
        let before = table.rows().to_vec();
        let _ = exec(
            &table,
            r#"{"filters": {"sectors": ["TC"]}, "operation": {"op": "rank", "order": "asc", "limit": 1}}"#,
        );
        assert_eq!(table.rows(), before.as_slice());
    }
}
