/// Plagiarism Pipeline - High-Level Orchestration
///
/// **Responsibility:**
/// Drive one comparison run end to end:
/// validate → stage → invoke analyzer → locate/parse → classify → correlate.
///
/// **Architecture:**
/// - `CandidateSet` validates the input (grouper.rs)
/// - `Workspace` stages sources and owns cleanup (workspace.rs)
/// - `Analyzer` runs the external tool (engine.rs)
/// - `locate` finds and parses the tool's output (locator.rs)
/// - `correlate` maps tokens back to submissions (correlator.rs)
///
/// Stages run strictly in sequence. Separate runs share nothing but the
/// read-only configuration, so they can execute concurrently.

use crate::config::LanguageTable;
use crate::correlator::{correlate, distinct_authors, sort_for_display};
use crate::engine::{AnalysisRequest, Analyzer, LOG_TAIL_LINES};
use crate::error::{Diagnostic, PipelineError, RunError, Stage, ValidationError};
use crate::grouper::{group_by_language, CandidateSet};
use crate::locator::{locate, OutputShape, SearchScope};
use crate::workspace::Workspace;
use futures_util::future::join_all;
use plagiarism_common::config::ToolConfig;
use plagiarism_common::types::{
    GroupError, JobStatus, LanguageId, PairwiseResult, SubmissionId, SubmissionRecord,
};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extra time granted to an analyzer past its deadline to stop itself before
/// the pipeline abandons it
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(10);

/// Outcome of one successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_token: Uuid,
    pub language_id: LanguageId,
    pub language_code: String,
    pub shape: OutputShape,
    pub tool_exit_code: Option<i64>,
    /// Every correlated pair, same-author included. This is what gets stored.
    pub results: Vec<PairwiseResult>,
    /// Distinct-author pairs, highest similarity first. This is what gets shown.
    pub displayed: Vec<PairwiseResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn flagged_count(&self) -> usize {
        self.displayed.iter().filter(|r| r.status.is_flagged()).count()
    }

    /// Keep only pairs that involve `id`, in both views
    pub fn retain_involving(&mut self, id: SubmissionId) {
        self.results.retain(|r| r.involves(id));
        self.displayed.retain(|r| r.involves(id));
    }
}

/// One language group of a problem-wide check
#[derive(Debug)]
pub struct GroupOutcome {
    pub language_id: LanguageId,
    pub submissions: usize,
    pub result: Result<RunReport, RunError>,
}

/// Problem-wide check across all language groups
#[derive(Debug, Default)]
pub struct ProblemReport {
    pub total_submissions: usize,
    pub groups: Vec<GroupOutcome>,
    /// Groups skipped before running (unsupported language, too few submissions)
    pub diagnostics: Vec<Diagnostic>,
}

impl ProblemReport {
    /// Every correlated pair from every successful group
    pub fn stored_results(&self) -> Vec<PairwiseResult> {
        self.reports()
            .flat_map(|report| report.results.iter().cloned())
            .collect()
    }

    /// Distinct-author pairs from every successful group, highest similarity first
    pub fn displayed(&self) -> Vec<PairwiseResult> {
        let mut displayed: Vec<_> = self
            .reports()
            .flat_map(|report| report.displayed.iter().cloned())
            .collect();
        sort_for_display(&mut displayed);
        displayed
    }

    pub fn flagged_count(&self) -> usize {
        self.reports().map(RunReport::flagged_count).sum()
    }

    pub fn errors(&self) -> Vec<GroupError> {
        self.groups
            .iter()
            .filter_map(|group| match &group.result {
                Err(e) => Some(GroupError {
                    language_id: group.language_id,
                    message: e.to_string(),
                }),
                Ok(_) => None,
            })
            .collect()
    }

    pub fn status(&self) -> JobStatus {
        let failed = self.groups.iter().filter(|g| g.result.is_err()).count();
        if failed == 0 {
            JobStatus::Completed
        } else if failed == self.groups.len() {
            JobStatus::Failed
        } else {
            JobStatus::Partial
        }
    }

    fn reports(&self) -> impl Iterator<Item = &RunReport> {
        self.groups.iter().filter_map(|group| group.result.as_ref().ok())
    }
}

pub struct Pipeline<A> {
    config: ToolConfig,
    languages: LanguageTable,
    analyzer: A,
    kill_grace: Duration,
}

impl<A: Analyzer> Pipeline<A> {
    pub fn new(config: ToolConfig, languages: LanguageTable, analyzer: A) -> Self {
        Self {
            config,
            languages,
            analyzer,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    /// Compare one batch of same-language submissions
    #[tracing::instrument(skip(self, submissions), fields(submissions = submissions.len()))]
    pub async fn run(&self, submissions: Vec<SubmissionRecord>) -> Result<RunReport, RunError> {
        let candidates = CandidateSet::new(submissions, &self.languages)?;
        self.run_candidates(&candidates).await
    }

    async fn run_candidates(&self, candidates: &CandidateSet) -> Result<RunReport, RunError> {
        // Closed on success; every early return releases it on drop
        let mut workspace = Workspace::allocate(&self.config);
        let run_token = workspace.run_token();
        let fail = |stage: Stage, kind: PipelineError| RunError::new(Some(run_token), stage, kind);
        let language = candidates.language();

        info!(
            run_token = %run_token,
            language = %language.code,
            submissions = candidates.len(),
            "Starting plagiarism run"
        );

        workspace
            .stage(candidates)
            .await
            .map_err(|e| fail(Stage::Stage, e))?;

        let mut diagnostics = Vec::new();

        let deadline = self.config.timeout();
        let request = AnalysisRequest {
            run_token,
            language_code: &language.code,
            submissions_dir: workspace.submissions_dir(),
            results_dir: workspace.results_dir(),
            deadline,
        };

        let invocation =
            match tokio::time::timeout(deadline + self.kill_grace, self.analyzer.analyze(&request)).await {
                Ok(Ok(invocation)) => invocation,
                Ok(Err(e)) => return Err(fail(Stage::Invoke, e)),
                Err(_) => {
                    return Err(fail(
                        Stage::Invoke,
                        PipelineError::InvocationTimeout {
                            timeout_seconds: self.config.timeout_seconds,
                        },
                    ))
                }
            };

        debug!(
            run_token = %run_token,
            exit_code = ?invocation.exit_code,
            elapsed_ms = invocation.elapsed.as_millis() as u64,
            "Analyzer returned"
        );

        if !invocation.succeeded() {
            // The analyzer may have written a usable result set anyway
            warn!(
                run_token = %run_token,
                exit_code = ?invocation.exit_code,
                "Analyzer exited unsuccessfully, parsing output anyway"
            );
            diagnostics.push(Diagnostic::ToolExecutionWarning {
                exit_code: invocation.exit_code,
                log_tail: invocation.log_tail(LOG_TAIL_LINES),
            });
        }

        let results_dir = workspace.results_dir().to_path_buf();
        let tokens = workspace.tokens().clone();
        let located = tokio::task::spawn_blocking(move || {
            locate(&SearchScope {
                results_dir: &results_dir,
                tokens: &tokens,
            })
        })
        .await
        .map_err(|e| {
            fail(
                Stage::Locate,
                PipelineError::parse(workspace.results_dir(), format!("locator task failed: {}", e)),
            )
        })?
        .map_err(|e| fail(Stage::Locate, e))?;
        diagnostics.extend(located.diagnostics);

        let correlated = correlate(&located.records, workspace.tokens());
        diagnostics.extend(correlated.diagnostics);

        let mut displayed = distinct_authors(&correlated.results, &candidates.authors());
        sort_for_display(&mut displayed);

        workspace.close().await;

        info!(
            run_token = %run_token,
            shape = ?located.shape,
            comparisons = correlated.results.len(),
            displayed = displayed.len(),
            diagnostics = diagnostics.len(),
            "Plagiarism run completed"
        );

        Ok(RunReport {
            run_token,
            language_id: candidates.language_id(),
            language_code: language.code.clone(),
            shape: located.shape,
            tool_exit_code: invocation.exit_code,
            results: correlated.results,
            displayed,
            diagnostics,
        })
    }

    /// Check every passing submission of a problem, one run per language.
    ///
    /// Groups are independent units of failure: a failed group is recorded on
    /// the report and the others still complete.
    #[tracing::instrument(skip(self, submissions), fields(submissions = submissions.len()))]
    pub async fn check_problem(&self, submissions: Vec<SubmissionRecord>) -> ProblemReport {
        let total_submissions = submissions.len();
        let grouped = group_by_language(submissions, &self.languages);

        for diagnostic in &grouped.diagnostics {
            info!(%diagnostic, "Skipping language group");
        }

        let runs = grouped.groups.into_iter().map(|(language_id, group)| async move {
            let submissions = group.len();
            let result = self.run(group).await;
            if let Err(e) = &result {
                warn!(language_id, timed_out = e.is_timeout(), error = %e, "Language group failed");
            }
            GroupOutcome {
                language_id,
                submissions,
                result,
            }
        });

        ProblemReport {
            total_submissions,
            groups: join_all(runs).await,
            diagnostics: grouped.diagnostics,
        }
    }

    /// Check one submission against the other submissions of its problem.
    ///
    /// Submissions in other languages and the target's own id are ignored.
    /// Returns `Ok(None)` when there is nothing to compare against.
    #[tracing::instrument(skip(self, target, others), fields(submission_id = target.id))]
    pub async fn check_submission(
        &self,
        target: SubmissionRecord,
        others: Vec<SubmissionRecord>,
    ) -> Result<Option<RunReport>, RunError> {
        if !self.languages.is_supported(target.language_id) {
            return Err(ValidationError::UnsupportedLanguage(target.language_id).into());
        }

        let target_id = target.id;
        let language_id = target.language_id;
        let mut group = vec![target];
        group.extend(
            others
                .into_iter()
                .filter(|s| s.id != target_id && s.language_id == language_id),
        );

        if group.len() < 2 {
            info!(submission_id = target_id, "No other submissions to compare with");
            return Ok(None);
        }

        let mut report = self.run(group).await?;
        report.retain_involving(target_id);
        Ok(Some(report))
    }
}
