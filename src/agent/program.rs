//! Query program DSL.
//!
//! The synthesizer emits a [`Program`] as one JSON object; the executor
//! interprets it against the score table. A program is a set of column
//! filters, exactly one [`Operation`], and at most one [`ChartSpec`].
//! There is no way to express anything outside these primitives.

use serde::{Deserialize, Serialize};

use super::extractor::outermost_object;
use crate::core::envelope::ChartTemplate;
use crate::core::table::ScoreRow;
use crate::error::ProgramError;

/// Upper bound on program text accepted by [`Program::parse`].
const MAX_PROGRAM_LEN: usize = 64 * 1024;

/// Column of the score table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// ISO3 country code.
    Country,
    /// Sector code.
    Sector,
    /// Year.
    Year,
    /// Policy-area code.
    PolicyArea,
}

impl Column {
    /// Renders this column of a row as text.
    #[must_use]
    pub fn value(self, row: &ScoreRow) -> String {
        match self {
            Self::Country => row.country.clone(),
            Self::Sector => row.sector.clone(),
            Self::Year => row.year.to_string(),
            Self::PolicyArea => row.policy_area.clone(),
        }
    }

    /// Column name as written in programs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Sector => "sector",
            Self::Year => "year",
            Self::PolicyArea => "policy_area",
        }
    }
}

/// Sort order for [`Operation::Rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Lowest score first.
    Asc,
    /// Highest score first.
    #[default]
    Desc,
}

/// Row filters. An empty list leaves that column unfiltered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Allowed countries.
    pub countries: Vec<String>,
    /// Allowed sectors; must be non-empty in a valid program.
    pub sectors: Vec<String>,
    /// Allowed years.
    pub years: Vec<i32>,
    /// Allowed policy areas.
    pub policy_areas: Vec<String>,
}

impl Filters {
    /// Returns `true` if the row passes every non-empty filter.
    #[must_use]
    pub fn matches(&self, row: &ScoreRow) -> bool {
        (self.countries.is_empty() || self.countries.contains(&row.country))
            && (self.sectors.is_empty() || self.sectors.contains(&row.sector))
            && (self.years.is_empty() || self.years.contains(&row.year))
            && (self.policy_areas.is_empty() || self.policy_areas.contains(&row.policy_area))
    }
}

/// The single computation a program performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Matching rows in table order.
    Select,
    /// Matching rows sorted by score.
    Rank {
        /// Sort direction.
        #[serde(default)]
        order: Order,
        /// Maximum rows kept.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Mean score, overall or per group.
    Average {
        /// Grouping column; `None` averages every matching row.
        #[serde(default)]
        by: Option<Column>,
    },
    /// Number of distinct values of a column.
    Count {
        /// Counted column.
        column: Column,
    },
    /// Distinct values of a column.
    Distinct {
        /// Listed column.
        column: Column,
    },
    /// Country or sector overview; ignores the program's filters.
    Summary {
        /// Country being summarised.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        country: Option<String>,
        /// Sector being summarised, when no country is given.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sector: Option<String>,
        /// Target year; defaults to the latest year in the table.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
        /// Entries on each side of the ranking.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        top_n: Option<usize>,
    },
}

impl Operation {
    /// Operation name as written in programs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Rank { .. } => "rank",
            Self::Average { .. } => "average",
            Self::Count { .. } => "count",
            Self::Distinct { .. } => "distinct",
            Self::Summary { .. } => "summary",
        }
    }
}

/// Chart request attached to a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart template.
    pub template: ChartTemplate,
    /// Entity column for ranking and comparative charts.
    #[serde(default)]
    pub group_by: Option<Column>,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// X-axis label.
    #[serde(default)]
    pub x_label: String,
    /// Y-axis label.
    #[serde(default)]
    pub y_label: String,
}

/// A complete query program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Row filters.
    #[serde(default)]
    pub filters: Filters,
    /// The computation.
    pub operation: Operation,
    /// Optional chart.
    #[serde(default)]
    pub chart: Option<ChartSpec>,
}

impl Program {
    /// Parses and validates program text.
    ///
    /// Surrounding prose and code fences are tolerated; the outermost JSON
    /// object is parsed strictly.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Parse`] for text that is not a program and
    /// [`ProgramError::Invalid`] for a program breaking a structural rule.
    pub fn parse(source: &str) -> Result<Self, ProgramError> {
        let program = Self::decode(source)?;
        program.validate()?;
        Ok(program)
    }

    /// Parses program text without checking structural rules.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Parse`] for text that is not a program.
    pub fn decode(source: &str) -> Result<Self, ProgramError> {
        if source.len() > MAX_PROGRAM_LEN {
            return Err(ProgramError::Parse(format!(
                "program too large ({} bytes, max {MAX_PROGRAM_LEN})",
                source.len()
            )));
        }
        let json = outermost_object(source)
            .ok_or_else(|| ProgramError::Parse("no program object found".to_string()))?;
        serde_json::from_str(json).map_err(|e| ProgramError::Parse(e.to_string()))
    }

    /// Checks the structural rules every program must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Invalid`] describing the first broken rule.
    pub fn validate(&self) -> Result<(), ProgramError> {
        let is_summary = matches!(self.operation, Operation::Summary { .. });
        if !is_summary && self.filters.sectors.is_empty() {
            return Err(ProgramError::Invalid(
                "program has no sector filter".to_string(),
            ));
        }
        match &self.operation {
            Operation::Rank { limit: Some(0), .. } => {
                return Err(ProgramError::Invalid(
                    "rank limit must be at least 1".to_string(),
                ));
            }
            Operation::Summary {
                country, sector, ..
            } if country.is_none() && sector.is_none() => {
                return Err(ProgramError::Invalid(
                    "summary needs a country or a sector".to_string(),
                ));
            }
            Operation::Summary { top_n: Some(0), .. } => {
                return Err(ProgramError::Invalid(
                    "summary ranking length must be at least 1".to_string(),
                ));
            }
            _ => {}
        }
        if let Some(chart) = &self.chart {
            if is_summary {
                return Err(ProgramError::Invalid(
                    "summary programs cannot carry a chart".to_string(),
                ));
            }
            if chart.template != ChartTemplate::TimeSeries && chart.group_by.is_none() {
                return Err(ProgramError::Invalid(format!(
                    "{:?} chart needs a group_by column",
                    chart.template
                )));
            }
        }
        Ok(())
    }

    /// Serialises the program to its source form.
    #[must_use]
    pub fn to_source(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Program, ProgramError> {
        Program::parse(source)
    }

    #[test]
    fn test_parse_rank_program() {
        let program = parse(
            r#"{"filters": {"countries": ["FRA", "DEU"], "sectors": ["TC"], "years": [2022]},
                "operation": {"op": "rank", "order": "asc", "limit": 5}}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(program.filters.countries, vec!["FRA", "DEU"]);
        assert_eq!(
            program.operation,
            Operation::Rank {
                order: Order::Asc,
                limit: Some(5)
            }
        );
        assert!(program.chart.is_none());
    }

    #[test]
    fn test_parse_tolerates_fences() {
        let program = parse(
            "```json\n{\"filters\": {\"sectors\": [\"ALLSEC\"]}, \"operation\": {\"op\": \"select\"}}\n```",
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(program.operation, Operation::Select);
    }

    #[test]
    fn test_missing_sector_filter_rejected() {
        let err = parse(r#"{"filters": {"countries": ["FRA"]}, "operation": {"op": "select"}}"#);
        assert!(matches!(err, Err(ProgramError::Invalid(_))));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let err = parse(r#"{"filters": {"sectors": ["TC"]}, "operation": {"op": "exec"}}"#);
        assert!(matches!(err, Err(ProgramError::Parse(_))));
        let err = parse("import pandas as pd");
        assert!(matches!(err, Err(ProgramError::Parse(_))));
    }

    #[test]
    fn test_summary_needs_target() {
        let err = parse(r#"{"operation": {"op": "summary", "year": 2024}}"#);
        assert!(matches!(err, Err(ProgramError::Invalid(_))));
        let ok = parse(r#"{"operation": {"op": "summary", "country": "FRA"}}"#);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_ranking_chart_needs_group_by() {
        let err = parse(
            r#"{"filters": {"sectors": ["TC"]}, "operation": {"op": "select"},
                "chart": {"template": "ranking_bar"}}"#,
        );
        assert!(matches!(err, Err(ProgramError::Invalid(_))));
        let ok = parse(
            r#"{"filters": {"sectors": ["TC"]}, "operation": {"op": "select"},
                "chart": {"template": "time_series", "title": "Trend"}}"#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_to_source_parses_back() {
        let program = Program {
            filters: Filters {
                countries: vec!["JPN".into()],
                sectors: vec!["ALLSEC".into()],
                years: vec![2020, 2021],
                policy_areas: vec!["STRI".into()],
            },
            operation: Operation::Average {
                by: Some(Column::Year),
            },
            chart: None,
        };
        assert_eq!(parse(&program.to_source()).ok(), Some(program));
    }

    #[test]
    fn test_filters_match() {
        let filters = Filters {
            countries: vec!["FRA".into()],
            sectors: vec!["TC".into()],
            years: vec![],
            policy_areas: vec![],
        };
        let row = ScoreRow {
            country: "FRA".into(),
            sector: "TC".into(),
            year: 2019,
            policy_area: "STRI".into(),
            score: 0.2,
        };
        assert!(filters.matches(&row));
        let other = ScoreRow {
            sector: "ALLSEC".into(),
            ..row
        };
        assert!(!filters.matches(&other));
    }
}
