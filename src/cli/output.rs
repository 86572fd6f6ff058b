//! Output formatting for CLI commands.
//!
//! Text output is meant for people; JSON and NDJSON carry the full
//! serialised structures for scripts.

use std::fmt::Write;

use serde::Serialize;

use crate::core::envelope::{Figure, FusedAnswer, ResultData, SummaryReport};
use crate::core::query::SummaryTarget;
use crate::core::table::{ReformsRow, TableOverview};
use crate::core::vocab::display_name;

/// Rows shown in text output before eliding.
const MAX_TEXT_ROWS: usize = 20;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serialises a value in this format's JSON flavour.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        let json = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Json | Self::Text => serde_json::to_string_pretty(value),
        };
        json.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Formats an answer.
#[must_use]
pub fn format_answer(answer: &FusedAnswer, format: OutputFormat, verbose: bool) -> String {
    if format != OutputFormat::Text {
        return format.to_json(answer);
    }

    let mut out = answer.message.clone();
    match &answer.data {
        Some(ResultData::Rows(rows)) if !rows.is_empty() => {
            out.push_str("\n\n");
            for row in rows.iter().take(MAX_TEXT_ROWS) {
                let _ = writeln!(
                    out,
                    "  {:<4} {:<28} {} {:<28} {:.3}",
                    row.country,
                    display_name(&row.sector),
                    row.year,
                    display_name(&row.policy_area),
                    row.score
                );
            }
            if rows.len() > MAX_TEXT_ROWS {
                let _ = writeln!(out, "  ... {} more rows", rows.len() - MAX_TEXT_ROWS);
            }
        }
        Some(ResultData::Summary(report)) if verbose => {
            out.push_str("\n\n");
            out.push_str(&format_summary(report));
        }
        _ => {}
    }
    if let Some(figure) = &answer.figure {
        out.push_str("\n\n");
        out.push_str(&format_figure(figure));
    }
    if verbose && !answer.reforms_rows.is_empty() {
        out.push_str("\n\n");
        out.push_str(&format_reforms(&answer.reforms_rows));
    }

    let intent = answer.intent.map_or("none", |i| i.as_str());
    let _ = write!(
        out,
        "\n\n---\nIntent: {intent} | Tokens: {} | Time: {:.1}s",
        answer.total_tokens,
        answer.elapsed.as_secs_f64()
    );
    out
}

fn format_summary(report: &SummaryReport) -> String {
    let mut out = String::new();
    let subject = match &report.target {
        SummaryTarget::Country(code) => code.as_str(),
        SummaryTarget::Sector(code) => display_name(code),
    };
    let aggregate = report
        .aggregate
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"));
    let previous = report
        .previous_aggregate
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"));
    let _ = writeln!(
        out,
        "{subject}: {aggregate} in {} ({previous} in {})",
        report.year, report.previous_year
    );
    for (label, entries) in [
        ("Most restrictive", &report.most_restrictive),
        ("Least restrictive", &report.least_restrictive),
    ] {
        let names: Vec<String> = entries
            .iter()
            .map(|e| format!("{} ({:.3})", display_name(&e.code), e.score))
            .collect();
        let _ = writeln!(out, "{label}: {}", names.join(", "));
    }
    out.trim_end().to_string()
}

fn format_figure(figure: &Figure) -> String {
    let points: usize = figure.series.iter().map(|s| s.points.len()).sum();
    format!(
        "[chart: {} | {:?} | {} series, {points} points]",
        figure.title,
        figure.template,
        figure.series.len()
    )
}

fn format_reforms(rows: &[ReformsRow]) -> String {
    let mut out = String::from("Reforms:\n");
    for row in rows.iter().take(MAX_TEXT_ROWS) {
        let sector = if row.sector.is_empty() {
            "all sectors"
        } else {
            display_name(&row.sector)
        };
        let _ = writeln!(
            out,
            "  {} {} ({sector}): {}",
            row.year, row.country, row.reform_text
        );
    }
    out.trim_end().to_string()
}

/// Formats a score table overview.
#[must_use]
pub fn format_overview(overview: &TableOverview, format: OutputFormat) -> String {
    if format != OutputFormat::Text {
        return format.to_json(overview);
    }
    let mut out = String::new();
    let _ = writeln!(out, "Rows:          {}", overview.rows);
    let _ = writeln!(
        out,
        "Countries:     {} ({})",
        overview.countries.len(),
        overview.countries.join(", ")
    );
    let _ = writeln!(
        out,
        "Sectors:       {} ({})",
        overview.sectors.len(),
        overview.sectors.join(", ")
    );
    let years = match (overview.years.first(), overview.years.last()) {
        (Some(first), Some(last)) => format!("{first}-{last}"),
        _ => "none".to_string(),
    };
    let _ = writeln!(out, "Years:         {} ({years})", overview.years.len());
    let _ = writeln!(
        out,
        "Policy areas:  {}",
        overview.policy_areas.join(", ")
    );
    if let (Some(min), Some(max)) = (overview.min_score, overview.max_score) {
        let _ = writeln!(out, "Score range:   {min:.3} - {max:.3}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::intent::IntentClass;
    use crate::core::table::ScoreRow;

    fn answer() -> FusedAnswer {
        FusedAnswer {
            data: Some(ResultData::Rows(vec![ScoreRow {
                country: "FRA".into(),
                sector: "TC".into(),
                year: 2022,
                policy_area: "STRI".into(),
                score: 0.25,
            }])),
            total_tokens: 42,
            elapsed: Duration::from_millis(1500),
            ..FusedAnswer::from_message("France scores 0.25.")
        }
        .with_intent(IntentClass::Score)
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("jsonl"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_text_answer_has_footer() {
        let text = format_answer(&answer(), OutputFormat::Text, false);
        assert!(text.starts_with("France scores 0.25."));
        assert!(text.contains("Telecommunication"));
        assert!(text.contains("Intent: score | Tokens: 42 | Time: 1.5s"));
    }

    #[test]
    fn test_json_answer() {
        let json = format_answer(&answer(), OutputFormat::Ndjson, false);
        assert!(!json.contains('\n'));
        let value: serde_json::Value =
            serde_json::from_str(&json).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["intent"], "score");
        assert_eq!(value["total_tokens"], 42);
        assert_eq!(value["data"]["type"], "rows");
    }

    #[test]
    fn test_overview_text() {
        let overview = TableOverview {
            rows: 3,
            countries: vec!["DEU".into(), "FRA".into()],
            sectors: vec!["ALLSEC".into()],
            years: vec![2022, 2024],
            policy_areas: vec!["STRI".into()],
            min_score: Some(0.1),
            max_score: Some(0.3),
        };
        let text = format_overview(&overview, OutputFormat::Text);
        assert!(text.contains("Countries:     2 (DEU, FRA)"));
        assert!(text.contains("2022-2024"));
        assert!(text.contains("0.100 - 0.300"));
    }
}
