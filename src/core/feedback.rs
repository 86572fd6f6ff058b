//! Append-only user feedback log.
//!
//! Records are written as JSON Lines. Recording never blocks the caller on
//! failure: errors are logged and returned for the caller to report.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::CommandError;

/// Lowest accepted rating.
pub const MIN_SCORE: u8 = 1;
/// Highest accepted rating.
pub const MAX_SCORE: u8 = 5;

/// One feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// When the feedback was given.
    pub timestamp: DateTime<Utc>,
    /// The user's question.
    pub query: String,
    /// The answer that was rated.
    pub response: String,
    /// Rating from 1 to 5.
    pub score: u8,
}

impl FeedbackRecord {
    /// Builds a record stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidArgument`] if `score` is outside 1..=5.
    pub fn new(
        query: impl Into<String>,
        response: impl Into<String>,
        score: u8,
    ) -> Result<Self, CommandError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(CommandError::InvalidArgument(format!(
                "feedback score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
            )));
        }
        Ok(Self {
            timestamp: Utc::now(),
            query: query.into(),
            response: response.into(),
            score,
        })
    }
}

/// Destination for feedback records.
pub trait FeedbackSink: Send + Sync {
    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record could not be persisted.
    fn record(&self, record: &FeedbackRecord) -> std::io::Result<()>;
}

/// Feedback sink appending to a JSON Lines file.
#[derive(Debug, Clone)]
pub struct JsonlFeedbackSink {
    path: PathBuf,
}

impl JsonlFeedbackSink {
    /// Creates a sink writing to `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `feedback.jsonl` in the working directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("feedback.jsonl")
    }

    /// Path of the log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records back, skipping lines that do not parse.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn read_all(&self) -> std::io::Result<Vec<FeedbackRecord>> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(text
            .lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }
}

impl FeedbackSink for JsonlFeedbackSink {
    fn record(&self, record: &FeedbackRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        debug!(path = %self.path.display(), score = record.score, "feedback recorded");
        Ok(())
    }
}

/// Records feedback, logging any sink failure.
///
/// Returns `false` when the record was not persisted.
pub fn record_feedback(sink: &dyn FeedbackSink, record: &FeedbackRecord) -> bool {
    match sink.record(record) {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "failed to record feedback");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl FeedbackSink for FailingSink {
        fn record(&self, _record: &FeedbackRecord) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_score_range() {
        assert!(FeedbackRecord::new("q", "a", 0).is_err());
        assert!(FeedbackRecord::new("q", "a", 6).is_err());
        assert!(FeedbackRecord::new("q", "a", 1).is_ok());
        assert!(FeedbackRecord::new("q", "a", 5).is_ok());
    }

    #[test]
    fn test_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let sink = JsonlFeedbackSink::new(dir.path().join("nested/feedback.jsonl"));

        let first = FeedbackRecord::new("What is STRI?", "An index.", 5)
            .unwrap_or_else(|_| unreachable!());
        let second = FeedbackRecord::new("Compare FRA and DEU", "FRA is more restrictive.", 3)
            .unwrap_or_else(|_| unreachable!());
        assert!(record_feedback(&sink, &first));
        assert!(record_feedback(&sink, &second));

        let text = std::fs::read_to_string(sink.path()).unwrap_or_else(|_| unreachable!());
        assert_eq!(text.lines().count(), 2);
        let value: serde_json::Value =
            serde_json::from_str(text.lines().next().unwrap_or_default())
                .unwrap_or_else(|_| unreachable!());
        assert_eq!(value["query"], "What is STRI?");
        assert_eq!(value["score"], 5);
        assert!(value["timestamp"].as_str().is_some_and(|t| t.contains('T')));

        let records = sink.read_all().unwrap_or_else(|_| unreachable!());
        assert_eq!(records, vec![first, second]);
    }

    #[test]
    fn test_sink_failure_is_not_fatal() {
        let record = FeedbackRecord::new("q", "a", 4).unwrap_or_else(|_| unreachable!());
        assert!(!record_feedback(&FailingSink, &record));
    }
}
