use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type SubmissionId = u64;
pub type AuthorId = u64;
/// Judge-side language identifier (e.g. 62 = Java, 71 = Python 3)
pub type LanguageId = i32;

/// A stored submission as handed to the plagiarism pipeline. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub author_id: AuthorId,
    pub language_id: LanguageId,
    pub source_text: String,
}

/// Similarity tier, ordered SAFE < SUSPICIOUS < PLAGIARIZED
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimilarityStatus {
    Safe,
    Suspicious,
    Plagiarized,
}

impl SimilarityStatus {
    pub fn is_flagged(&self) -> bool {
        !matches!(self, SimilarityStatus::Safe)
    }
}

impl fmt::Display for SimilarityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SimilarityStatus::Safe => "SAFE",
            SimilarityStatus::Suspicious => "SUSPICIOUS",
            SimilarityStatus::Plagiarized => "PLAGIARIZED",
        };
        write!(f, "{}", s)
    }
}

/// Correlated comparison between two submissions of the same candidate set.
///
/// The (a, b) slot order follows the order in which the analyzer reported the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseResult {
    pub submission_id_a: SubmissionId,
    pub submission_id_b: SubmissionId,
    pub similarity_percent: f64,
    pub status: SimilarityStatus,
}

impl PairwiseResult {
    pub fn involves(&self, id: SubmissionId) -> bool {
        self.submission_id_a == id || self.submission_id_b == id
    }
}

/// Result Store entry: a pairwise result plus the caller-assigned check time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    #[serde(flatten)]
    pub result: PairwiseResult,
    pub checked_at: DateTime<Utc>,
}

/// Plagiarism check request queued for the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismJob {
    pub id: Uuid,
    pub problem_id: u64,
    /// When set, only pairs involving this submission are kept
    #[serde(default)]
    pub target_submission: Option<SubmissionId>,
    pub submissions: Vec<SubmissionRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Every language group completed
    Completed,
    /// At least one group failed, others produced results
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupError {
    pub language_id: LanguageId,
    pub message: String,
}

/// Caller-facing summary of a processed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub problem_id: u64,
    pub status: JobStatus,
    pub total_submissions: usize,
    /// Distinct-author pairs, highest similarity first
    pub results: Vec<PairwiseResult>,
    pub flagged_count: usize,
    pub group_errors: Vec<GroupError>,
    pub checked_at: DateTime<Utc>,
}
