//! Fixed knowledge base for definition questions.
//!
//! The definition specialist may only phrase entries returned by
//! [`KnowledgeBase::lookup`]; it never answers from general knowledge.

use super::vocab::{ALLSEC, POLICY_AREAS, SECTORS, STRI};

/// Answer when no entry matches a definition question.
pub const NO_DEFINITION_MESSAGE: &str = "No definition available in the STRI knowledge base.";

/// One definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeEntry {
    /// Term being defined.
    pub term: String,
    /// Lowercase phrases that select this entry.
    pub keywords: Vec<String>,
    /// Definition text.
    pub text: String,
}

impl KnowledgeEntry {
    fn new(term: &str, keywords: &[&str], text: impl Into<String>) -> Self {
        Self {
            term: term.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            text: text.into(),
        }
    }

    fn matches(&self, words: &[String], haystack: &str) -> bool {
        self.keywords.iter().any(|k| {
            if k.contains(' ') {
                haystack.contains(k.as_str())
            } else {
                words.iter().any(|w| w == k)
            }
        })
    }
}

/// Collection of definitions.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::standard()
    }
}

impl KnowledgeBase {
    /// Builds a knowledge base from custom entries.
    #[must_use]
    pub const fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// The built-in STRI knowledge base.
    #[must_use]
    pub fn standard() -> Self {
        let mut entries = vec![
            KnowledgeEntry::new(
                STRI,
                &["stri", "services trade restrictiveness index", "restrictiveness index"],
                "The OECD Services Trade Restrictiveness Index (STRI) measures regulatory \
                 restrictions on international trade in services across countries and \
                 sectors. Scores range from 0 (completely open to trade and investment) to \
                 1 (completely closed to foreign services providers). Scores are built from \
                 qualitative regulatory information that is converted into binary measures, \
                 weighted and aggregated into five policy areas.",
            ),
            KnowledgeEntry::new(
                "Score scale",
                &["score", "scores", "scale", "index value"],
                "STRI scores lie between 0 and 1. A higher score means a more restrictive \
                 regulatory environment; a lower score means a more open one. Scores are \
                 comparable across countries within a sector and over time.",
            ),
            KnowledgeEntry::new(
                ALLSEC,
                &["allsec", "all sectors", "overall score", "overall"],
                "ALLSEC denotes a country's overall score, averaged across all sectors \
                 covered by the STRI rather than reported for an individual sector.",
            ),
            KnowledgeEntry::new(
                "Policy areas",
                &["policy area", "policy areas", "categories", "dimensions"],
                "STRI scores are broken down into five policy areas: restrictions on \
                 foreign entry, restrictions to movement of people, other discriminatory \
                 measures, barriers to competition, and regulatory transparency.",
            ),
            KnowledgeEntry::new(
                "Sectors",
                &["sectors", "sector coverage", "which sectors"],
                format!(
                    "The STRI covers {} service sectors: {}.",
                    SECTORS.len(),
                    SECTORS
                        .iter()
                        .map(|(_, n)| *n)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ),
            KnowledgeEntry::new(
                "Liberalisation",
                &["liberalisation", "liberalization", "liberalising", "reform", "reforms"],
                "Liberalisation refers to regulatory changes that reduce restrictions on \
                 trade in services, which lowers STRI scores. Tightening refers to changes \
                 that add restrictions, which raises scores.",
            ),
            KnowledgeEntry::new(
                "ASTRID",
                &["astrid", "yourself", "assistant"],
                "I am ASTRID, the AI assistant designed to help users navigate and interact \
                 with the STRI database by answering questions, providing definitions, \
                 retrieving scores, generating summaries, and producing visualisations.",
            ),
        ];

        entries.extend(POLICY_AREAS.iter().map(|(code, name)| {
            KnowledgeEntry::new(
                name,
                &[code.to_lowercase().as_str(), name.to_lowercase().as_str()],
                policy_area_text(code, name),
            )
        }));
        entries.extend(SECTORS.iter().map(|(code, name)| {
            KnowledgeEntry::new(
                name,
                &[code.to_lowercase().as_str(), name.to_lowercase().as_str()],
                format!(
                    "{name} (code {code}) is one of the {} service sectors covered by the \
                     STRI. Its score reflects restrictions specific to {} together with \
                     horizontal measures that apply to all sectors.",
                    SECTORS.len(),
                    name.to_lowercase()
                ),
            )
        }));

        Self { entries }
    }

    /// Entries whose keywords appear in `question`.
    #[must_use]
    pub fn lookup(&self, question: &str) -> Vec<&KnowledgeEntry> {
        let haystack = question.to_lowercase();
        let words: Vec<String> = haystack
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(String::from)
            .collect();
        self.entries
            .iter()
            .filter(|e| e.matches(&words, &haystack))
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn policy_area_text(code: &str, name: &str) -> String {
    let detail = match code {
        "ENTRY" => {
            "It covers foreign equity limits, screening and approval of foreign \
             investment, and requirements on board members and managers."
        }
        "MOVEPPL" => {
            "It covers quotas, labour market tests and duration limits on the \
             temporary entry of foreign natural persons providing services."
        }
        "OTHDISC" => {
            "It covers discrimination of foreign providers in taxes, subsidies and \
             public procurement, and deviations from international standards."
        }
        "COMPET" => {
            "It covers anti-competitive regulation such as state ownership, legal \
             monopolies and weak competition safeguards."
        }
        _ => {
            "It covers the transparency of the regulatory system, including public \
             consultation and the administrative procedures to obtain licences and visas."
        }
    };
    format!("{name} ({code}) is one of the five STRI policy areas. {detail}")
}
