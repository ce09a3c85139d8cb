//! Error types for the plagiarism pipeline
//!
//! Fatal conditions are `PipelineError`s wrapped in a `RunError` that records
//! which run and which stage failed. Non-fatal conditions never become errors;
//! they are reported as `Diagnostic`s on the run report instead.

use plagiarism_common::types::{LanguageId, SubmissionId};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Candidate set preconditions, checked before any filesystem or subprocess work
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("need at least 2 submissions to check plagiarism, got {count}")]
    InsufficientSubmissions { count: usize },

    #[error("all submissions must share one language (expected {expected}, found {found})")]
    MixedLanguages {
        expected: LanguageId,
        found: LanguageId,
    },

    #[error("language {0} is not supported for plagiarism detection")]
    UnsupportedLanguage(LanguageId),

    #[error("submission {0} appears more than once")]
    DuplicateSubmission(SubmissionId),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("workspace I/O failed at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("analyzer timed out after {timeout_seconds} seconds")]
    InvocationTimeout { timeout_seconds: u64 },

    /// The analyzer could not be launched at all (daemon unreachable, image
    /// missing, staging path not visible to the container)
    #[error("analyzer unavailable: {0}")]
    ToolUnavailable(String),

    #[error("no analyzer output found under {results_dir}")]
    ResultMissing { results_dir: PathBuf },

    #[error("malformed analyzer output in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Workspace {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Stage,
    Invoke,
    Locate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validate => "validate",
            Stage::Stage => "stage",
            Stage::Invoke => "invoke",
            Stage::Locate => "locate",
        };
        write!(f, "{}", s)
    }
}

/// A fatal pipeline failure with its run context.
///
/// `run_token` is None when the run was rejected before a workspace was allocated.
#[derive(Debug)]
pub struct RunError {
    pub run_token: Option<Uuid>,
    pub stage: Stage,
    pub kind: PipelineError,
}

impl RunError {
    pub fn new(run_token: Option<Uuid>, stage: Stage, kind: PipelineError) -> Self {
        Self {
            run_token,
            stage,
            kind,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, PipelineError::InvocationTimeout { .. })
    }
}

impl From<ValidationError> for RunError {
    fn from(err: ValidationError) -> Self {
        RunError::new(None, Stage::Validate, err.into())
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.run_token {
            Some(token) => write!(f, "run {} failed at {}: {}", token, self.stage, self.kind),
            None => write!(f, "run rejected at {}: {}", self.stage, self.kind),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Non-fatal condition observed during a run. Logged as it happens and
/// carried on the report; never changes the success path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Analyzer exited non-zero within the deadline; its output was still parsed
    ToolExecutionWarning {
        exit_code: Option<i64>,
        log_tail: String,
    },
    /// A reported comparison referenced a token outside this run
    UnresolvedPair { token_a: String, token_b: String },
    /// A per-pair result file whose name does not resolve to two staged submissions
    SkippedPairFile { path: PathBuf },
    UnsupportedLanguageGroup { language_id: LanguageId, submissions: usize },
    UndersizedGroup { language_id: LanguageId, submissions: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ToolExecutionWarning { exit_code: Some(code), .. } => {
                write!(f, "analyzer exited with code {}", code)
            }
            Diagnostic::ToolExecutionWarning { exit_code: None, .. } => {
                write!(f, "analyzer exit code unknown")
            }
            Diagnostic::UnresolvedPair { token_a, token_b } => {
                write!(f, "dropped comparison {} / {}: unknown submission", token_a, token_b)
            }
            Diagnostic::SkippedPairFile { path } => {
                write!(f, "skipped result file {}", path.display())
            }
            Diagnostic::UnsupportedLanguageGroup { language_id, submissions } => write!(
                f,
                "skipped {} submissions in unsupported language {}",
                submissions, language_id
            ),
            Diagnostic::UndersizedGroup { language_id, submissions } => write!(
                f,
                "skipped language {}: {} submission(s), need at least 2",
                language_id, submissions
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts_to_run_error() {
        let err: RunError = ValidationError::InsufficientSubmissions { count: 1 }.into();
        assert_eq!(err.stage, Stage::Validate);
        assert!(err.run_token.is_none());
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_run_error_display_includes_context() {
        let token = Uuid::new_v4();
        let err = RunError::new(
            Some(token),
            Stage::Invoke,
            PipelineError::InvocationTimeout { timeout_seconds: 60 },
        );
        let msg = err.to_string();
        assert!(msg.contains(&token.to_string()));
        assert!(msg.contains("invoke"));
        assert!(msg.contains("60 seconds"));
        assert!(err.is_timeout());
    }
}
