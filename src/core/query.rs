//! Typed structured queries.
//!
//! A [`StructuredQuery`] is the validated form of a question: a common
//! [`QueryScope`] of vocabulary-checked filters plus a [`QueryKind`] holding
//! the fields specific to one intent. Only vocabulary values ever reach a
//! scope; the extractor drops anything it cannot resolve.

use serde::{Deserialize, Serialize};

use super::intent::IntentClass;
use super::vocab::{ALLSEC, SECTORS, STRI};

/// Filters shared by every intent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryScope {
    /// ISO3 country codes in question order.
    #[serde(default)]
    pub countries: Vec<String>,
    /// Sector codes, possibly the `ALLSEC` sentinel.
    #[serde(default)]
    pub sectors: Vec<String>,
    /// Years; never empty after normalisation.
    #[serde(default)]
    pub years: Vec<i32>,
    /// Policy-area codes; `STRI` when none was named.
    #[serde(default)]
    pub policy_areas: Vec<String>,
    /// Whether the question explicitly asked for an average.
    #[serde(default)]
    pub average_requested: bool,
}

impl QueryScope {
    /// Applies defaults and structural rules.
    ///
    /// - duplicate values are removed, keeping first occurrence
    /// - empty `years` becomes `[latest_year]`
    /// - empty `policy_areas` becomes `[STRI]`
    /// - `ALLSEC` is removed from policy-area-scoped questions
    #[must_use]
    pub fn normalized(mut self, latest_year: i32) -> Self {
        dedup_in_order(&mut self.countries);
        dedup_in_order(&mut self.sectors);
        dedup_in_order(&mut self.years);
        dedup_in_order(&mut self.policy_areas);

        if self.years.is_empty() {
            self.years.push(latest_year);
        }
        if self.policy_areas.is_empty() {
            self.policy_areas.push(STRI.to_string());
        }
        if self.is_policy_area_scoped() {
            self.sectors.retain(|s| s != ALLSEC);
        }
        self
    }

    /// Returns `true` if a regulatory area other than `STRI` was named.
    #[must_use]
    pub fn is_policy_area_scoped(&self) -> bool {
        self.policy_areas.iter().any(|p| p != STRI)
    }

    /// The sector filter a program must apply when the question named none.
    ///
    /// Country-level questions read the `ALLSEC` row; policy-area questions
    /// have no aggregate row and read every real sector instead.
    #[must_use]
    pub fn default_sector_filter(&self) -> Vec<String> {
        if self.sectors.is_empty() {
            if self.is_policy_area_scoped() {
                SECTORS.iter().map(|(c, _)| (*c).to_string()).collect()
            } else {
                vec![ALLSEC.to_string()]
            }
        } else {
            self.sectors.clone()
        }
    }
}

/// Dimension along which a comparative question compares entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonDimension {
    /// Several countries.
    Countries,
    /// Several sectors.
    Sectors,
    /// Several years.
    Years,
    /// Several policy areas.
    PolicyAreas,
}

impl ComparisonDimension {
    /// Infers the dimension from a scope, preferring countries, then
    /// sectors, policy areas and years.
    #[must_use]
    pub fn infer(scope: &QueryScope) -> Option<Self> {
        if scope.countries.len() > 1 {
            Some(Self::Countries)
        } else if scope.sectors.len() > 1 {
            Some(Self::Sectors)
        } else if scope.policy_areas.len() > 1 {
            Some(Self::PolicyAreas)
        } else if scope.years.len() > 1 {
            Some(Self::Years)
        } else {
            None
        }
    }
}

/// Visual form hinted by a graphical question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualHint {
    /// Ranking of entities for one period.
    Ranking,
    /// Evolution over time.
    Trend,
    /// Let the synthesizer decide.
    #[default]
    Unspecified,
}

/// Subject of a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "lowercase")]
pub enum SummaryTarget {
    /// Country overview, ranking its sectors.
    Country(String),
    /// Sector overview, ranking countries.
    Sector(String),
}

/// Intent-specific part of a structured query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryKind {
    /// Dataset-meta question.
    General {
        /// Free-text topics the question is about (coverage, method, ...).
        #[serde(default)]
        subjects: Vec<String>,
    },
    /// Scalar score lookup.
    Score,
    /// Visualisation request.
    Graphical {
        /// Requested visual form.
        #[serde(default)]
        visual: VisualHint,
    },
    /// Multi-entity comparison.
    Comparative {
        /// What varies between the compared entities.
        dimension: Option<ComparisonDimension>,
    },
    /// Term definition.
    Definition {
        /// Terms the question asks about.
        #[serde(default)]
        terms: Vec<String>,
    },
    /// Not about the STRI.
    Unrelated,
    /// Country or sector overview.
    Summary,
    /// Reform narrative.
    Reforms,
}

impl QueryKind {
    /// The intent this kind belongs to.
    #[must_use]
    pub const fn intent_class(&self) -> IntentClass {
        match self {
            Self::General { .. } => IntentClass::General,
            Self::Score => IntentClass::Score,
            Self::Graphical { .. } => IntentClass::Graphical,
            Self::Comparative { .. } => IntentClass::Comparative,
            Self::Definition { .. } => IntentClass::Definition,
            Self::Unrelated => IntentClass::Unrelated,
            Self::Summary => IntentClass::Summary,
            Self::Reforms => IntentClass::Reforms,
        }
    }
}

/// Validated, intent-tagged form of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Intent-specific fields.
    #[serde(flatten)]
    pub kind: QueryKind,
    /// Shared filters.
    #[serde(flatten)]
    pub scope: QueryScope,
    /// Advisory one-line restatement of what the user wants.
    #[serde(default)]
    pub intent: String,
}

impl StructuredQuery {
    /// Builds a query, normalising the scope.
    #[must_use]
    pub fn new(kind: QueryKind, scope: QueryScope, intent: String, latest_year: i32) -> Self {
        let scope = scope.normalized(latest_year);
        let kind = match kind {
            QueryKind::Comparative { dimension: None } => QueryKind::Comparative {
                dimension: ComparisonDimension::infer(&scope),
            },
            other => other,
        };
        Self {
            kind,
            scope,
            intent,
        }
    }

    /// The intent class of this query.
    #[must_use]
    pub const fn intent_class(&self) -> IntentClass {
        self.kind.intent_class()
    }

    /// Only graphical questions produce charts.
    #[must_use]
    pub const fn needs_plot(&self) -> bool {
        matches!(self.kind, QueryKind::Graphical { .. })
    }

    /// Comparison dimension, for comparative questions.
    #[must_use]
    pub const fn comparison(&self) -> Option<ComparisonDimension> {
        match self.kind {
            QueryKind::Comparative { dimension } => dimension,
            _ => None,
        }
    }

    /// Returns `true` for summary questions.
    #[must_use]
    pub const fn is_summary(&self) -> bool {
        matches!(self.kind, QueryKind::Summary)
    }

    /// Subject of a summary: the first country, else the first real sector.
    #[must_use]
    pub fn summary_target(&self) -> Option<SummaryTarget> {
        if !self.is_summary() {
            return None;
        }
        if let Some(country) = self.scope.countries.first() {
            return Some(SummaryTarget::Country(country.clone()));
        }
        self.scope
            .sectors
            .iter()
            .find(|s| *s != ALLSEC)
            .map(|s| SummaryTarget::Sector(s.clone()))
    }

    /// Target year: the latest year in scope.
    #[must_use]
    pub fn target_year(&self) -> Option<i32> {
        self.scope.years.iter().copied().max()
    }
}

fn dedup_in_order<T: PartialEq + Clone>(values: &mut Vec<T>) {
    let mut seen: Vec<T> = Vec::with_capacity(values.len());
    values.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}
