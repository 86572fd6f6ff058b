//! Code synthesizer.
//!
//! Asks the model for a query [`Program`] and then constrains it to the
//! structured query: the sector filter is mandatory, averages need an
//! explicit request, charts belong to graphical questions only, and
//! summaries use the summary operation with the configured ranking length.
//! Text the model produced that is not a program at all is passed through
//! unchanged so the executor reports the fault.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::message::TokenUsage;
use super::program::{ChartSpec, Column, Filters, Operation, Program};
use super::prompt::build_coder_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::envelope::ChartTemplate;
use crate::core::query::{QueryKind, StructuredQuery, SummaryTarget, VisualHint};
use crate::core::vocab::ALLSEC;
use crate::error::AgentError;

/// Agent that writes query programs.
pub struct SynthesizerAgent {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    latest_year: i32,
    summary_top_n: usize,
    system_prompt: String,
}

impl SynthesizerAgent {
    /// Creates a new synthesizer with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout,
            latest_year: config.latest_year,
            summary_top_n: config.summary_top_n,
            system_prompt,
        }
    }

    /// Produces program source text for a structured query.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; an unusable program is not an error
    /// here.
    pub async fn synthesize(
        &self,
        provider: &dyn LlmProvider,
        query: &StructuredQuery,
    ) -> Result<(String, TokenUsage), AgentError> {
        let query_json =
            serde_json::to_string_pretty(query).map_err(|e| AgentError::Orchestration {
                message: format!("failed to serialise structured query: {e}"),
            })?;
        let user_msg = build_coder_prompt(&query_json, self.latest_year);
        let response = self.execute(provider, &user_msg).await?;

        let source = match Program::decode(&response.content) {
            Ok(program) => {
                let program = constrain(program, query, self.summary_top_n);
                debug!(
                    operation = program.operation.name(),
                    chart = program.chart.is_some(),
                    "program synthesized"
                );
                program.to_source()
            }
            Err(e) => {
                warn!(error = %e, "synthesizer returned no usable program");
                response.content
            }
        };
        debug!(program_len = source.len(), "program ready");
        Ok((source, response.usage))
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Rewrites a program so it honours the structured query.
#[must_use]
pub fn constrain(mut program: Program, query: &StructuredQuery, top_n: usize) -> Program {
    if query.is_summary() {
        let (country, sector) = match query.summary_target() {
            Some(SummaryTarget::Country(c)) => (Some(c), None),
            Some(SummaryTarget::Sector(s)) => (None, Some(s)),
            None => (None, None),
        };
        return Program {
            filters: Filters::default(),
            operation: Operation::Summary {
                country,
                sector,
                year: query.target_year(),
                top_n: Some(top_n),
            },
            chart: None,
        };
    }

    let scope = &query.scope;
    let filters = &mut program.filters;

    if !scope.sectors.is_empty() {
        filters.sectors.clone_from(&scope.sectors);
    }
    if scope.is_policy_area_scoped() {
        filters.sectors.retain(|s| s != ALLSEC);
    }
    if filters.sectors.is_empty() {
        filters.sectors = scope.default_sector_filter();
    }
    if filters.countries.is_empty() {
        filters.countries.clone_from(&scope.countries);
    }
    if filters.policy_areas.is_empty() {
        filters.policy_areas.clone_from(&scope.policy_areas);
    }

    if matches!(program.operation, Operation::Average { .. }) && !scope.average_requested {
        program.operation = Operation::Select;
    }
    if matches!(program.operation, Operation::Summary { .. }) {
        program.operation = Operation::Select;
    }

    program.chart = if query.needs_plot() {
        Some(program.chart.unwrap_or_else(|| default_chart(query)))
    } else {
        None
    };

    let is_time_series = program.chart.as_ref().is_some_and(|c| {
        matches!(
            c.template,
            ChartTemplate::TimeSeries | ChartTemplate::ComparativeTimeSeries
        )
    });
    if is_time_series {
        if program.filters.years.is_empty() && scope.years.len() > 1 {
            program.filters.years.clone_from(&scope.years);
        } else if program.filters.years.len() < 2 && scope.years.len() < 2 {
            // a trend over a single defaulted year shows nothing
            program.filters.years.clear();
        }
    } else if program.filters.years.is_empty() {
        program.filters.years.clone_from(&scope.years);
    }

    program
}

/// Chart for a graphical question whose program did not request one.
fn default_chart(query: &StructuredQuery) -> ChartSpec {
    let scope = &query.scope;
    let entity = if scope.countries.len() > 1 || scope.countries.is_empty() {
        Column::Country
    } else {
        Column::Sector
    };
    let visual = match query.kind {
        QueryKind::Graphical { visual } => visual,
        _ => VisualHint::Unspecified,
    };
    let trend = visual == VisualHint::Trend || scope.years.len() > 1;

    let (template, group_by, x_label) = if !trend {
        (ChartTemplate::RankingBar, Some(entity), entity.as_str())
    } else if scope.countries.len() > 1 || scope.sectors.len() > 1 {
        (ChartTemplate::ComparativeTimeSeries, Some(entity), "year")
    } else {
        (ChartTemplate::TimeSeries, None, "year")
    };
    let title = if query.intent.is_empty() {
        "STRI scores".to_string()
    } else {
        query.intent.clone()
    };
    ChartSpec {
        template,
        group_by,
        title,
        x_label: x_label.to_string(),
        y_label: "STRI score".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::ScriptedProvider;
    use crate::agent::prompt::CODER_SYSTEM_PROMPT;
    use crate::core::query::QueryScope;
    use crate::core::vocab::STRI;

    fn query(kind: QueryKind, countries: &[&str], sectors: &[&str], years: &[i32]) -> StructuredQuery {
        query_with_areas(kind, countries, sectors, years, &[])
    }

    fn query_with_areas(
        kind: QueryKind,
        countries: &[&str],
        sectors: &[&str],
        years: &[i32],
        areas: &[&str],
    ) -> StructuredQuery {
        let scope = QueryScope {
            countries: countries.iter().map(ToString::to_string).collect(),
            sectors: sectors.iter().map(ToString::to_string).collect(),
            years: years.to_vec(),
            policy_areas: areas.iter().map(ToString::to_string).collect(),
            average_requested: false,
        };
        StructuredQuery::new(kind, scope, String::new(), 2024)
    }

    fn select(sectors: &[&str]) -> Program {
        Program {
            filters: Filters {
                sectors: sectors.iter().map(ToString::to_string).collect(),
                ..Filters::default()
            },
            operation: Operation::Select,
            chart: None,
        }
    }

    #[test]
    fn test_sector_filter_always_present() {
        let q = query(QueryKind::Score, &["FRA"], &[], &[2022]);
        let program = constrain(select(&[]), &q, 4);
        assert_eq!(program.filters.sectors, vec![ALLSEC]);
        assert_eq!(program.filters.policy_areas, vec![STRI]);
        assert_eq!(program.filters.years, vec![2022]);
        assert!(program.validate().is_ok());
    }

    #[test]
    fn test_query_sectors_override_program() {
        let q = query(QueryKind::Score, &["FRA"], &["TC"], &[2022]);
        let program = constrain(select(&["ALLSEC", "CS"]), &q, 4);
        assert_eq!(program.filters.sectors, vec!["TC"]);
    }

    #[test]
    fn test_policy_area_question_never_reads_allsec() {
        let q = query_with_areas(QueryKind::Score, &["FRA"], &[], &[2022], &["ENTRY"]);
        let program = constrain(select(&["ALLSEC"]), &q, 4);
        assert_eq!(program.filters.sectors.len(), 22);
        assert!(!program.filters.sectors.iter().any(|s| s == ALLSEC));
        assert_eq!(program.filters.policy_areas, vec!["ENTRY"]);
    }

    #[test]
    fn test_average_needs_request() {
        let q = query(QueryKind::Score, &["FRA", "DEU"], &["TC"], &[2022]);
        let mut program = select(&["TC"]);
        program.operation = Operation::Average { by: None };
        let program = constrain(program, &q, 4);
        assert_eq!(program.operation, Operation::Select);
    }

    #[test]
    fn test_chart_dropped_unless_graphical() {
        let q = query(
            QueryKind::Comparative { dimension: None },
            &["FRA", "DEU"],
            &["TC"],
            &[2022],
        );
        let mut program = select(&["TC"]);
        program.chart = Some(ChartSpec {
            template: ChartTemplate::RankingBar,
            group_by: Some(Column::Country),
            title: "x".into(),
            x_label: String::new(),
            y_label: String::new(),
        });
        assert!(constrain(program, &q, 4).chart.is_none());
    }

    #[test]
    fn test_graphical_trend_gets_time_series() {
        let q = query(
            QueryKind::Graphical {
                visual: VisualHint::Trend,
            },
            &["JPN"],
            &[],
            &[],
        );
        let program = constrain(select(&["ALLSEC"]), &q, 4);
        let chart = program.chart.unwrap_or_else(|| unreachable!());
        assert_eq!(chart.template, ChartTemplate::TimeSeries);
        assert!(program.filters.years.is_empty());
        assert!(
            Program {
                chart: Some(chart),
                ..program
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn test_summary_program_uses_config() {
        let q = query(QueryKind::Summary, &["ITA"], &[], &[2023]);
        let program = constrain(select(&["TC"]), &q, 3);
        assert_eq!(
            program.operation,
            Operation::Summary {
                country: Some("ITA".into()),
                sector: None,
                year: Some(2023),
                top_n: Some(3),
            }
        );
        assert!(program.validate().is_ok());
    }

    #[tokio::test]
    async fn test_synthesize_constrains_model_output() {
        let provider = ScriptedProvider::new().route(
            "query programs",
            r#"{"filters": {"countries": ["FRA"]}, "operation": {"op": "average"}}"#,
        );
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let agent = SynthesizerAgent::new(&config, CODER_SYSTEM_PROMPT.to_string());
        let q = query(QueryKind::Score, &["FRA"], &["TC"], &[2022]);
        let (source, usage) = agent
            .synthesize(&provider, &q)
            .await
            .unwrap_or_else(|_| unreachable!());
        let program = Program::parse(&source).unwrap_or_else(|_| unreachable!());
        assert_eq!(program.operation, Operation::Select);
        assert_eq!(program.filters.sectors, vec!["TC"]);
        assert!(usage.total_tokens > 0);
    }

    #[tokio::test]
    async fn test_synthesize_passes_garbage_through() {
        let provider = ScriptedProvider::new().route("query programs", "df[df.sector == 'TC']");
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let agent = SynthesizerAgent::new(&config, CODER_SYSTEM_PROMPT.to_string());
        let q = query(QueryKind::Score, &["FRA"], &["TC"], &[2022]);
        let (source, _) = agent
            .synthesize(&provider, &q)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(source, "df[df.sector == 'TC']");
    }
}
