//! Structured extractor.
//!
//! Turns a question and its intent into a [`StructuredQuery`]. The model
//! answers with one JSON object; the outermost object substring is parsed
//! in a single pass, and any failure is a hard
//! [`AgentError::ExtractionMalformed`]. Values outside the closed
//! vocabularies are dropped during validation, never passed on.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::config::AgentConfig;
use super::message::TokenUsage;
use super::prompt::{PromptSet, build_extraction_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::intent::IntentClass;
use crate::core::query::{ComparisonDimension, QueryKind, QueryScope, StructuredQuery, VisualHint};
use crate::core::vocab::{normalize_country, resolve_policy_area, resolve_sector};
use crate::error::AgentError;

/// Plausible year range for extracted years.
const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1990..=2100;

/// Agent that extracts a structured query for one intent.
pub struct ExtractorAgent {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    latest_year: i32,
    system_prompt: String,
}

impl ExtractorAgent {
    /// Creates an extractor for `intent`, using the shared structure rules
    /// plus that intent's template.
    #[must_use]
    pub fn new(config: &AgentConfig, prompts: &PromptSet, intent: IntentClass) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout,
            latest_year: config.latest_year,
            system_prompt: prompts.extraction_prompt(intent),
        }
    }

    /// Extracts and validates a structured query.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ExtractionMalformed`] when the response holds
    /// no parseable JSON object, or the provider's error.
    pub async fn extract(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
        intent: IntentClass,
    ) -> Result<(StructuredQuery, TokenUsage), AgentError> {
        let user_msg = build_extraction_prompt(question, self.latest_year);
        let response = self.execute(provider, &user_msg).await?;
        let raw = parse_raw(&response.content)?;
        if let Some(ref declared) = raw.query_type
            && !declared.eq_ignore_ascii_case(intent.as_str())
        {
            debug!(%intent, declared, "extractor declared a different query type");
        }
        let query = raw.into_query(intent, self.latest_year);
        debug!(query = ?query, "structured query extracted");
        Ok((query, response.usage))
    }
}

#[async_trait]
impl Agent for ExtractorAgent {
    fn name(&self) -> &'static str {
        "extractor"
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

/// A single value or a list of values.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }
}

/// A scalar cell: the model writes years and entities as numbers or text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    fn as_year(&self) -> Option<i32> {
        let n = match self {
            Self::Int(n) => *n,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        if YEAR_RANGE.contains(&n) {
            i32::try_from(n).ok()
        } else {
            None
        }
    }
}

/// Reads `null` as the field's default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Wire form of an extraction response.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuery {
    query_type: Option<String>,
    #[serde(alias = "country", deserialize_with = "nullable")]
    countries: OneOrMany<String>,
    #[serde(alias = "sector", deserialize_with = "nullable")]
    sectors: OneOrMany<String>,
    #[serde(alias = "year", deserialize_with = "nullable")]
    years: OneOrMany<Scalar>,
    #[serde(alias = "policy_area", deserialize_with = "nullable")]
    policy_areas: OneOrMany<String>,
    #[serde(deserialize_with = "nullable")]
    average_requested: bool,
    visual_type: Option<String>,
    dimension: Option<String>,
    #[serde(deserialize_with = "nullable")]
    entities: Vec<Scalar>,
    #[serde(deserialize_with = "nullable")]
    subjects: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    terms: Vec<String>,
    content: Option<String>,
    intent: Option<String>,
}

impl RawQuery {
    /// Validates against the vocabularies and builds the tagged query.
    fn into_query(self, intent: IntentClass, latest_year: i32) -> StructuredQuery {
        let mut scope = QueryScope {
            countries: self
                .countries
                .into_vec()
                .iter()
                .filter_map(|c| normalize_country(c))
                .collect(),
            sectors: self
                .sectors
                .into_vec()
                .iter()
                .filter_map(|s| resolve_sector(s).map(String::from))
                .collect(),
            years: self
                .years
                .into_vec()
                .iter()
                .filter_map(Scalar::as_year)
                .collect(),
            policy_areas: self
                .policy_areas
                .into_vec()
                .iter()
                .filter_map(|p| resolve_policy_area(p).map(String::from))
                .collect(),
            average_requested: self.average_requested,
        };
        fold_entities(&mut scope, &self.entities);

        let kind = match intent {
            IntentClass::General => QueryKind::General {
                subjects: self.subjects,
            },
            IntentClass::Score => QueryKind::Score,
            IntentClass::Graphical => QueryKind::Graphical {
                visual: parse_visual(self.visual_type.as_deref()),
            },
            IntentClass::Comparative => QueryKind::Comparative {
                dimension: self.dimension.as_deref().and_then(parse_dimension),
            },
            IntentClass::Definition => {
                let mut terms = self.terms;
                terms.extend(self.subjects);
                QueryKind::Definition { terms }
            }
            IntentClass::Unrelated => QueryKind::Unrelated,
            IntentClass::Summary => QueryKind::Summary,
            IntentClass::Reforms => QueryKind::Reforms,
        };

        let mut narrative = self.intent.unwrap_or_default();
        if narrative.is_empty()
            && let Some(content) = self.content
        {
            narrative = content;
        }

        let explicit_years = scope.years.clone();
        let mut query = StructuredQuery::new(kind, scope, narrative, latest_year);
        if intent == IntentClass::Reforms {
            // reforms match years exactly; no implicit latest year
            query.scope.years = explicit_years;
        }
        query
    }
}

/// Adds comparison entities to the matching scope field.
fn fold_entities(scope: &mut QueryScope, entities: &[Scalar]) {
    for entity in entities {
        if let Some(year) = entity.as_year() {
            if !scope.years.contains(&year) {
                scope.years.push(year);
            }
            continue;
        }
        let Scalar::Text(text) = entity else {
            continue;
        };
        if let Some(sector) = resolve_sector(text) {
            if !scope.sectors.iter().any(|s| s == sector) {
                scope.sectors.push(sector.to_string());
            }
        } else if let Some(area) = resolve_policy_area(text) {
            if !scope.policy_areas.iter().any(|p| p == area) {
                scope.policy_areas.push(area.to_string());
            }
        } else if let Some(country) = normalize_country(text)
            && !scope.countries.contains(&country)
        {
            scope.countries.push(country);
        }
    }
}

fn parse_visual(text: Option<&str>) -> VisualHint {
    match text.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
        Some("ranking" | "bar" | "bar chart" | "ranking bar") => VisualHint::Ranking,
        Some("trend" | "line" | "time series" | "timeseries" | "trend line") => VisualHint::Trend,
        _ => VisualHint::Unspecified,
    }
}

fn parse_dimension(text: &str) -> Option<ComparisonDimension> {
    match text.trim().to_ascii_lowercase().as_str() {
        "countries" | "country" => Some(ComparisonDimension::Countries),
        "sectors" | "sector" => Some(ComparisonDimension::Sectors),
        "years" | "year" | "time" => Some(ComparisonDimension::Years),
        "policy_areas" | "policy areas" | "policy_area" => Some(ComparisonDimension::PolicyAreas),
        _ => None,
    }
}

/// Slices the outermost `{...}` from a response.
pub(crate) fn outermost_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn parse_raw(content: &str) -> Result<RawQuery, AgentError> {
    let json = outermost_object(content).ok_or_else(|| AgentError::ExtractionMalformed {
        reason: "no JSON object found".to_string(),
        content: content.to_string(),
    })?;
    serde_json::from_str(json).map_err(|e| AgentError::ExtractionMalformed {
        reason: e.to_string(),
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::ScriptedProvider;
    use crate::core::vocab::{ALLSEC, STRI};

    fn agent(intent: IntentClass) -> ExtractorAgent {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        ExtractorAgent::new(&config, &PromptSet::defaults(), intent)
    }

    fn extract(content: &str, intent: IntentClass) -> StructuredQuery {
        parse_raw(content)
            .unwrap_or_else(|_| unreachable!())
            .into_query(intent, 2024)
    }

    #[test]
    fn test_comparative_france_germany_telecom() {
        let query = extract(
            r#"{"query_type": "comparative", "dimension": "countries",
                "countries": ["FRA", "DEU"], "sectors": ["TC"], "years": [2022],
                "policy_areas": [], "intent": "compare telecom"}"#,
            IntentClass::Comparative,
        );
        assert_eq!(query.scope.countries, vec!["FRA", "DEU"]);
        assert_eq!(query.scope.sectors, vec!["TC"]);
        assert_eq!(query.scope.years, vec![2022]);
        assert_eq!(query.scope.policy_areas, vec![STRI]);
        assert_eq!(query.comparison(), Some(ComparisonDimension::Countries));
    }

    #[test]
    fn test_tolerates_prose_and_fences() {
        let query = extract(
            "Here you go:\n```json\n{\"countries\": \"jpn\", \"sector\": \"Legal services\", \"year\": \"2023\"}\n```",
            IntentClass::Score,
        );
        assert_eq!(query.scope.countries, vec!["JPN"]);
        assert_eq!(query.scope.sectors, vec!["PSleg"]);
        assert_eq!(query.scope.years, vec![2023]);
    }

    #[test]
    fn test_unknown_values_dropped() {
        let query = extract(
            r#"{"countries": ["FRA", "Atlantis"], "sectors": ["space tourism", "CS"],
                "years": [2022, "soon", 3000], "policy_areas": ["tariffs"]}"#,
            IntentClass::Score,
        );
        assert_eq!(query.scope.countries, vec!["FRA"]);
        assert_eq!(query.scope.sectors, vec!["CS"]);
        assert_eq!(query.scope.years, vec![2022]);
        assert_eq!(query.scope.policy_areas, vec![STRI]);
    }

    #[test]
    fn test_defaults_applied() {
        let query = extract(r#"{"countries": ["ITA"]}"#, IntentClass::Summary);
        assert_eq!(query.scope.years, vec![2024]);
        assert_eq!(query.scope.policy_areas, vec![STRI]);
        assert!(query.is_summary());
    }

    #[test]
    fn test_allsec_never_with_policy_area() {
        let query = extract(
            r#"{"countries": ["FRA"], "sectors": ["ALLSEC"], "policy_areas": ["Restrictions on foreign entry"]}"#,
            IntentClass::Score,
        );
        assert!(!query.scope.sectors.iter().any(|s| s == ALLSEC));
        assert_eq!(query.scope.policy_areas, vec!["ENTRY"]);
    }

    #[test]
    fn test_entities_folded_into_scope() {
        let query = extract(
            r#"{"dimension": "years", "entities": [2019, "2022"], "countries": ["AUS"]}"#,
            IntentClass::Comparative,
        );
        assert_eq!(query.scope.years, vec![2019, 2022]);
        assert_eq!(query.comparison(), Some(ComparisonDimension::Years));
    }

    #[test]
    fn test_graphical_visual_hint() {
        let query = extract(
            r#"{"visual_type": "line", "countries": ["FRA"]}"#,
            IntentClass::Graphical,
        );
        assert!(query.needs_plot());
        assert_eq!(
            query.kind,
            QueryKind::Graphical {
                visual: VisualHint::Trend
            }
        );
    }

    #[test]
    fn test_null_fields_read_as_empty() {
        let query = extract(
            r#"{"query_type": "score", "countries": ["FRA"], "sectors": null,
                "years": null, "policy_areas": null, "average_requested": null,
                "entities": null, "subjects": null, "terms": null,
                "visual_type": null, "dimension": null}"#,
            IntentClass::Score,
        );
        assert_eq!(query.scope.countries, vec!["FRA"]);
        assert_eq!(query.scope.years, vec![2024]);
        assert_eq!(query.scope.policy_areas, vec![STRI]);
        assert!(!query.scope.average_requested);
    }

    #[test]
    fn test_reforms_years_stay_explicit() {
        let query = extract(r#"{"countries": ["JPN"], "years": []}"#, IntentClass::Reforms);
        assert!(query.scope.years.is_empty());
    }

    #[test]
    fn test_malformed_is_hard_error() {
        assert!(matches!(
            parse_raw("I cannot help with that."),
            Err(AgentError::ExtractionMalformed { .. })
        ));
        assert!(matches!(
            parse_raw("{\"countries\": [\"FRA\",}"),
            Err(AgentError::ExtractionMalformed { .. })
        ));
        assert!(matches!(
            parse_raw("{\"countries\": {\"a\": 1}}"),
            Err(AgentError::ExtractionMalformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_extract_through_provider() {
        let provider = ScriptedProvider::new().route(
            "query planner",
            r#"{"query_type": "score", "countries": ["NZL"], "sectors": ["FSins"], "years": [2021]}"#,
        );
        let (query, usage) = agent(IntentClass::Score)
            .extract(&provider, "Insurance STRI for New Zealand in 2021?", IntentClass::Score)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(query.intent_class(), IntentClass::Score);
        assert_eq!(query.scope.countries, vec!["NZL"]);
        assert!(usage.total_tokens > 0);
    }
}
