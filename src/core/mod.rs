//! Domain model: vocabularies, intents, queries, tables and results.

pub mod envelope;
pub mod feedback;
pub mod intent;
pub mod knowledge;
pub mod query;
pub mod table;
pub mod vocab;

pub use envelope::{
    AggregateRow, ChartTemplate, Figure, FusedAnswer, NO_DATA_MESSAGE, Point, RankedEntry,
    RankingBaseline, ResultData, ResultEnvelope, Series, SummaryReport,
};
pub use feedback::{FeedbackRecord, FeedbackSink, JsonlFeedbackSink, record_feedback};
pub use intent::IntentClass;
pub use knowledge::{KnowledgeBase, KnowledgeEntry, NO_DEFINITION_MESSAGE};
pub use query::{
    ComparisonDimension, QueryKind, QueryScope, StructuredQuery, SummaryTarget, VisualHint,
};
pub use table::{RawTable, ReformsRow, ReformsTable, ScoreRow, ScoreTable, TableOverview};
