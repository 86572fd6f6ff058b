//! Result envelopes, chart handles and the fused answer.
//!
//! A [`ResultEnvelope`] carries exactly one outcome: content (data and/or a
//! figure) with an empty message, or no content with an explanatory
//! message. [`ResultEnvelope::normalized`] restores that shape for any
//! envelope a program assembles.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::intent::IntentClass;
use super::query::SummaryTarget;
use super::table::{ReformsRow, ScoreRow};

/// Message used when a query matches no rows.
pub const NO_DATA_MESSAGE: &str = "No relevant data was found for this query.";

/// One aggregated value, keyed by the group it was computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Group label (a code, a year, or `all`).
    pub group: String,
    /// Mean score over the group.
    pub value: f64,
    /// Number of rows averaged.
    pub count: usize,
}

/// How summary rankings were ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingBaseline {
    /// Deviation from the cross-country average of each sector.
    DeviationFromSectorAverage,
    /// Raw score.
    AbsoluteScore,
}

/// One entry of a summary ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Sector code (country summaries) or country code (sector summaries).
    pub code: String,
    /// Score of the entry.
    pub score: f64,
    /// Cross-country average of the sector, for deviation rankings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<f64>,
    /// `score - reference`, for deviation rankings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
}

/// Output of a summary program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Country or sector being summarised.
    pub target: SummaryTarget,
    /// Target year.
    pub year: i32,
    /// Aggregate score for the target year.
    pub aggregate: Option<f64>,
    /// Year used for the comparison.
    pub previous_year: i32,
    /// Aggregate score for the previous year; `None` when unavailable.
    pub previous_aggregate: Option<f64>,
    /// How the rankings are ordered.
    pub baseline: RankingBaseline,
    /// Highest entries, most restrictive first.
    pub most_restrictive: Vec<RankedEntry>,
    /// Lowest entries, least restrictive first.
    pub least_restrictive: Vec<RankedEntry>,
}

impl SummaryReport {
    /// Change in aggregate since the previous year, when both are known.
    #[must_use]
    pub fn change(&self) -> Option<f64> {
        Some(self.aggregate? - self.previous_aggregate?)
    }

    /// Returns `true` if nothing was found for the target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregate.is_none()
            && self.most_restrictive.is_empty()
            && self.least_restrictive.is_empty()
    }
}

/// Data produced by a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultData {
    /// Matching score rows.
    Rows(Vec<ScoreRow>),
    /// Averages.
    Aggregates(Vec<AggregateRow>),
    /// Count of distinct values of a column.
    Count {
        /// Counted column.
        column: String,
        /// Distinct values.
        count: usize,
    },
    /// Distinct values of a column.
    Values {
        /// Listed column.
        column: String,
        /// Sorted distinct values.
        values: Vec<String>,
    },
    /// Country or sector overview.
    Summary(SummaryReport),
}

impl ResultData {
    /// Returns `true` if the data carries no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Rows(rows) => rows.is_empty(),
            Self::Aggregates(rows) => rows.is_empty(),
            Self::Count { count, .. } => *count == 0,
            Self::Values { values, .. } => values.is_empty(),
            Self::Summary(report) => report.is_empty(),
        }
    }
}

/// Chart template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartTemplate {
    /// Bars sorted ascending by value, rotated category labels.
    RankingBar,
    /// One chronological line with markers.
    TimeSeries,
    /// One chronological line per entity, with legend.
    ComparativeTimeSeries,
}

/// One point of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Category or year label.
    pub x: String,
    /// Score.
    pub y: f64,
}

/// A named sequence of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Entity name shown in the legend.
    pub name: String,
    /// Points in display order.
    pub points: Vec<Point>,
}

/// Declarative chart handle. Built by the charting capability, rendered by
/// whatever front end receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    /// Template the chart was built from.
    pub template: ChartTemplate,
    /// Title.
    pub title: String,
    /// X-axis label.
    pub x_label: String,
    /// Y-axis label.
    pub y_label: String,
    /// Series in legend order.
    pub series: Vec<Series>,
    /// Rotate category labels.
    pub rotate_labels: bool,
    /// Draw point markers.
    pub markers: bool,
    /// Show a legend.
    pub legend: bool,
}

impl Figure {
    /// Returns `true` if no series has a point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }
}

/// Outcome of running one program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Program data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    /// Chart handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure: Option<Figure>,
    /// Explanation when there is no content.
    #[serde(default)]
    pub message: String,
    /// Attached image references.
    #[serde(default)]
    pub images: Vec<String>,
}

impl ResultEnvelope {
    /// Envelope carrying data.
    #[must_use]
    pub fn with_data(data: ResultData) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
        .normalized()
    }

    /// Envelope carrying data and a figure.
    #[must_use]
    pub fn with_figure(data: ResultData, figure: Figure) -> Self {
        Self {
            data: Some(data),
            figure: Some(figure),
            ..Self::default()
        }
        .normalized()
    }

    /// Envelope carrying only an explanation.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
        .normalized()
    }

    /// Envelope for a contained execution fault.
    #[must_use]
    pub fn fault(category: &str, description: &str) -> Self {
        Self::message(format!("Execution error ({category}): {description}"))
    }

    /// Returns `true` if the envelope has data or a figure.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
            || self.figure.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// Restores the single-outcome shape.
    ///
    /// Empty data and empty figures are dropped. Content clears the
    /// message; no content guarantees a non-empty one.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.data.as_ref().is_some_and(ResultData::is_empty) {
            self.data = None;
        }
        if self.figure.as_ref().is_some_and(Figure::is_empty) {
            self.figure = None;
        }
        if self.has_content() {
            self.message.clear();
        } else if self.message.trim().is_empty() {
            self.message = NO_DATA_MESSAGE.to_string();
        }
        self
    }
}

/// Terminal answer of one invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FusedAnswer {
    /// Narrative answer; never empty.
    pub message: String,
    /// Quantitative data behind the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultData>,
    /// Chart handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figure: Option<Figure>,
    /// Attached image references.
    pub images: Vec<String>,
    /// Reform records used by the answer.
    pub reforms_rows: Vec<ReformsRow>,
    /// Branch that produced the answer; `None` for refusals and failures
    /// before classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentClass>,
    /// Tokens used across all capability calls.
    pub total_tokens: u32,
    /// Wall-clock time of the invocation.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl FusedAnswer {
    /// Answer carrying only a message.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Answer built from an envelope and a narrative.
    #[must_use]
    pub fn from_envelope(envelope: ResultEnvelope, narrative: String) -> Self {
        Self {
            message: narrative,
            data: envelope.data,
            figure: envelope.figure,
            images: envelope.images,
            ..Self::default()
        }
    }

    /// Sets the intent.
    #[must_use]
    pub const fn with_intent(mut self, intent: IntentClass) -> Self {
        self.intent = Some(intent);
        self
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
