/// Submission Grouper
///
/// Validates a batch of submissions and partitions a problem's submissions by
/// language. Pure: no filesystem access, no subprocesses.

use crate::config::{AnalyzerLanguage, LanguageTable};
use crate::error::{Diagnostic, ValidationError};
use plagiarism_common::types::{AuthorId, LanguageId, SubmissionId, SubmissionRecord};
use std::collections::{HashMap, HashSet};

/// Submissions validated for one comparison run: at least two, one
/// supported language, unique ids
#[derive(Debug, Clone)]
pub struct CandidateSet {
    language_id: LanguageId,
    language: AnalyzerLanguage,
    submissions: Vec<SubmissionRecord>,
}

impl CandidateSet {
    pub fn new(
        submissions: Vec<SubmissionRecord>,
        languages: &LanguageTable,
    ) -> Result<Self, ValidationError> {
        if submissions.len() < 2 {
            return Err(ValidationError::InsufficientSubmissions {
                count: submissions.len(),
            });
        }

        let language_id = submissions[0].language_id;
        if let Some(other) = submissions.iter().find(|s| s.language_id != language_id) {
            return Err(ValidationError::MixedLanguages {
                expected: language_id,
                found: other.language_id,
            });
        }

        let language = languages
            .lookup(language_id)
            .cloned()
            .ok_or(ValidationError::UnsupportedLanguage(language_id))?;

        let mut seen = HashSet::with_capacity(submissions.len());
        for submission in &submissions {
            if !seen.insert(submission.id) {
                return Err(ValidationError::DuplicateSubmission(submission.id));
            }
        }

        Ok(Self {
            language_id,
            language,
            submissions,
        })
    }

    pub fn language_id(&self) -> LanguageId {
        self.language_id
    }

    pub fn language(&self) -> &AnalyzerLanguage {
        &self.language
    }

    pub fn submissions(&self) -> &[SubmissionRecord] {
        &self.submissions
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    /// submission id -> author id, for the same-author filter
    pub fn authors(&self) -> HashMap<SubmissionId, AuthorId> {
        self.submissions.iter().map(|s| (s.id, s.author_id)).collect()
    }
}

/// Submissions of one problem grouped by language, first-seen order
#[derive(Debug, Default)]
pub struct LanguageGroups {
    pub groups: Vec<(LanguageId, Vec<SubmissionRecord>)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Split a problem's submissions into runnable language groups.
///
/// Unsupported languages and groups with fewer than two submissions are
/// skipped with a diagnostic rather than rejected.
pub fn group_by_language(
    submissions: Vec<SubmissionRecord>,
    languages: &LanguageTable,
) -> LanguageGroups {
    let mut order: Vec<LanguageId> = Vec::new();
    let mut buckets: HashMap<LanguageId, Vec<SubmissionRecord>> = HashMap::new();

    for submission in submissions {
        let bucket = buckets.entry(submission.language_id).or_insert_with(|| {
            order.push(submission.language_id);
            Vec::new()
        });
        bucket.push(submission);
    }

    let mut result = LanguageGroups::default();
    for language_id in order {
        let Some(subs) = buckets.remove(&language_id) else {
            continue;
        };

        if !languages.is_supported(language_id) {
            result.diagnostics.push(Diagnostic::UnsupportedLanguageGroup {
                language_id,
                submissions: subs.len(),
            });
        } else if subs.len() < 2 {
            result.diagnostics.push(Diagnostic::UndersizedGroup {
                language_id,
                submissions: subs.len(),
            });
        } else {
            result.groups.push((language_id, subs));
        }
    }

    result
}
