//! Answer composer and summary fusion.
//!
//! The composer turns a [`ResultEnvelope`] into prose. Facts handed to the
//! model are rendered deterministically (names instead of codes, two-decimal
//! scores) and the narrative is post-processed so the wording rules hold
//! even when the model drifts.

use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::message::TokenUsage;
use super::prompt::{build_answer_prompt, build_fusion_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::envelope::{
    ChartTemplate, Figure, RankedEntry, RankingBaseline, ResultData, ResultEnvelope,
    SummaryReport,
};
use crate::core::query::SummaryTarget;
use crate::core::table::ScoreRow;
use crate::core::vocab::{ALLSEC, POLICY_AREAS, SECTORS, display_name};
use crate::error::AgentError;

/// Stated when one half of a summary could not be produced.
pub const UNAVAILABLE: &str = "unavailable";

/// Stated when the score half of a summary failed.
pub const SCORES_UNAVAILABLE: &str = "Score figures are unavailable for this summary.";

/// Stated when the reforms half of a summary failed.
pub const REFORMS_UNAVAILABLE: &str = "Recorded reforms are unavailable for this summary.";

static COMPARATIVES: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(is|are|was|were|be|been|remains?|remained|becomes?|became)\s+(better|worse)\b")
        .ok()
});

static LOOSE_COMPARATIVES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(better|worse)\b").ok());

static SENTENCES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[.!?](\s+|$)|\n+").ok());

static CODES: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let codes: Vec<&str> = SECTORS
        .iter()
        .chain(POLICY_AREAS.iter())
        .map(|(code, _)| *code)
        .chain(std::iter::once(ALLSEC))
        .collect();
    Regex::new(&format!(r"\b({})\b", codes.join("|"))).ok()
});

/// Agent that narrates program results.
pub struct ComposerAgent {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    system_prompt: String,
}

impl ComposerAgent {
    /// Creates a new composer with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.answer_model.clone(),
            max_tokens: config.answer_max_tokens,
            timeout: config.timeout,
            system_prompt,
        }
    }

    /// Narrates an envelope for the question.
    ///
    /// Envelopes without content are answered with their message, without
    /// a model call.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn compose(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
        envelope: &ResultEnvelope,
    ) -> Result<(String, TokenUsage), AgentError> {
        if !envelope.has_content() {
            debug!(message = %envelope.message, "nothing to narrate");
            return Ok((envelope.message.clone(), TokenUsage::default()));
        }
        let facts = render_facts(envelope);
        let response = self
            .execute(provider, &build_answer_prompt(question, &facts))
            .await?;
        let narrative = finish(&response.content, envelope.data.as_ref());
        Ok((narrative, response.usage))
    }
}

#[async_trait]
impl Agent for ComposerAgent {
    fn name(&self) -> &'static str {
        "composer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Agent that merges the quantitative and reforms halves of a summary.
pub struct FusionAgent {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    system_prompt: String,
}

impl FusionAgent {
    /// Creates a new fusion agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.answer_model.clone(),
            max_tokens: config.answer_max_tokens,
            timeout: config.timeout,
            system_prompt,
        }
    }

    /// Writes the final summary answer. A `None` half is passed to the
    /// model as unavailable and stated as such after the narrative; `data`
    /// is the quantitative result the wording rules are checked against.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn fuse(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
        quantitative: Option<&str>,
        qualitative: Option<&str>,
        data: Option<&ResultData>,
    ) -> Result<(String, TokenUsage), AgentError> {
        let user_msg = build_fusion_prompt(
            question,
            quantitative.unwrap_or(UNAVAILABLE),
            qualitative.unwrap_or(UNAVAILABLE),
        );
        let response = self.execute(provider, &user_msg).await?;
        debug!(
            quantitative = quantitative.is_some(),
            qualitative = qualitative.is_some(),
            "summary fused"
        );
        let mut text = finish(&response.content, data);
        if quantitative.is_none() {
            let _ = write!(text, "\n\n{SCORES_UNAVAILABLE}");
        }
        if qualitative.is_none() {
            let _ = write!(text, "\n\n{REFORMS_UNAVAILABLE}");
        }
        Ok((text, response.usage))
    }
}

#[async_trait]
impl Agent for FusionAgent {
    fn name(&self) -> &'static str {
        "fusion"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Applies the wording rules to a narrative.
#[must_use]
pub fn finish(narrative: &str, data: Option<&ResultData>) -> String {
    let mut text = replace_comparatives(narrative.trim());
    text = translate_codes(&text);
    if let Some(ResultData::Summary(report)) = data
        && report.previous_aggregate.is_none()
        && !states_unavailable_year(&text, report.previous_year)
    {
        let _ = write!(
            text,
            "\n\nA comparison with {} is unavailable: no overall score is recorded for that year.",
            report.previous_year
        );
    }
    text
}

/// Whether one sentence of `text` says the `year` comparison is unavailable.
fn states_unavailable_year(text: &str, year: i32) -> bool {
    let year = year.to_string();
    let mentions = |sentence: &str| {
        sentence.contains(&year) && sentence.to_lowercase().contains(UNAVAILABLE)
    };
    match SENTENCES.as_ref() {
        Some(re) => re.split(text).any(mentions),
        None => mentions(text),
    }
}

/// Rewrites "is better"/"are worse" style copulas into restrictiveness
/// wording. Other uses are left alone and logged.
fn replace_comparatives(text: &str) -> String {
    let Some(re) = COMPARATIVES.as_ref() else {
        return text.to_string();
    };
    let replaced = re
        .replace_all(text, |caps: &Captures<'_>| {
            let replacement = if caps[2].eq_ignore_ascii_case("better") {
                "less restrictive"
            } else {
                "more restrictive"
            };
            format!("{} {replacement}", &caps[1])
        })
        .into_owned();
    if LOOSE_COMPARATIVES
        .as_ref()
        .is_some_and(|loose| loose.is_match(&replaced))
    {
        warn!("narrative uses better/worse outside a comparison of restrictiveness");
    }
    replaced
}

fn translate_codes(text: &str) -> String {
    let Some(re) = CODES.as_ref() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures<'_>| display_name(&caps[1]).to_string())
        .into_owned()
}

/// Renders envelope content as a plain facts block.
#[must_use]
pub fn render_facts(envelope: &ResultEnvelope) -> String {
    let mut out = String::new();
    match &envelope.data {
        Some(ResultData::Rows(rows)) => render_rows(&mut out, rows),
        Some(ResultData::Aggregates(groups)) => {
            let _ = writeln!(out, "Averages (explicitly requested):");
            for group in groups {
                let _ = writeln!(
                    out,
                    "- {}: {:.2} over {} observations",
                    display_name(&group.group),
                    group.value,
                    group.count
                );
            }
        }
        Some(ResultData::Count { column, count }) => {
            let _ = writeln!(out, "Number of distinct {column} values: {count}");
        }
        Some(ResultData::Values { column, values }) => {
            let names: Vec<&str> = values.iter().map(|v| display_name(v)).collect();
            let _ = writeln!(out, "Distinct {column} values: {}", names.join(", "));
        }
        Some(ResultData::Summary(report)) => render_summary(&mut out, report),
        None => {}
    }
    if let Some(figure) = &envelope.figure {
        render_figure(&mut out, figure);
    }
    out.trim_end().to_string()
}

fn render_rows(out: &mut String, rows: &[ScoreRow]) {
    let _ = writeln!(out, "Scores (country | sector | year | policy area | score):");
    for row in rows {
        let _ = writeln!(
            out,
            "- {} | {} | {} | {} | {:.2}",
            row.country,
            display_name(&row.sector),
            row.year,
            display_name(&row.policy_area),
            row.score
        );
    }
}

fn render_summary(out: &mut String, report: &SummaryReport) {
    let (subject, entity) = match &report.target {
        SummaryTarget::Country(code) => (code.as_str(), "sectors"),
        SummaryTarget::Sector(code) => (display_name(code), "countries"),
    };
    let _ = writeln!(out, "Summary of {subject} for {}", report.year);
    let label = match report.target {
        SummaryTarget::Country(_) => "Overall STRI score",
        SummaryTarget::Sector(_) => "Average score across countries",
    };
    match report.aggregate {
        Some(value) => {
            let _ = writeln!(out, "{label} ({}): {value:.2}", report.year);
        }
        None => {
            let _ = writeln!(out, "{label} ({}): unavailable", report.year);
        }
    }

    let basis = match report.baseline {
        RankingBaseline::DeviationFromSectorAverage => {
            "ranked by deviation from the sector's cross-country average"
        }
        RankingBaseline::AbsoluteScore => "ranked by score",
    };
    let _ = writeln!(out, "Most restrictive {entity} ({basis}):");
    render_entries(out, &report.most_restrictive);
    let _ = writeln!(out, "Least restrictive {entity} ({basis}):");
    render_entries(out, &report.least_restrictive);

    match (report.previous_aggregate, report.change()) {
        (Some(previous), Some(change)) => {
            let direction = if change < 0.0 {
                "decrease (liberalisation)"
            } else if change > 0.0 {
                "increase (tightening)"
            } else {
                "no change"
            };
            let _ = writeln!(
                out,
                "Previous year ({}): {previous:.2}; change {change:+.2}, {direction}",
                report.previous_year
            );
        }
        _ => {
            let _ = writeln!(
                out,
                "Previous year ({}): comparison unavailable",
                report.previous_year
            );
        }
    }
}

fn render_entries(out: &mut String, entries: &[RankedEntry]) {
    if entries.is_empty() {
        let _ = writeln!(out, "- none recorded");
    }
    for entry in entries {
        let _ = write!(out, "- {}: {:.2}", display_name(&entry.code), entry.score);
        if let (Some(reference), Some(deviation)) = (entry.reference, entry.deviation) {
            let _ = write!(out, " (average {reference:.2}, {deviation:+.2})");
        }
        out.push('\n');
    }
}

fn render_figure(out: &mut String, figure: &Figure) {
    let kind = match figure.template {
        ChartTemplate::RankingBar => "ranking bar chart",
        ChartTemplate::TimeSeries => "time series",
        ChartTemplate::ComparativeTimeSeries => "comparative time series",
    };
    let _ = writeln!(out, "Chart: {kind} titled \"{}\"", figure.title);
    for series in &figure.series {
        let points: Vec<String> = series
            .points
            .iter()
            .map(|p| format!("{} {:.2}", p.x, p.y))
            .collect();
        let _ = writeln!(out, "- {}: {}", series.name, points.join(", "));
    }
}
