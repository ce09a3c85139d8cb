/// Workspace Stager
///
/// Materializes the per-run directory tree the analyzer reads from and writes
/// into, and owns the token <-> submission id table used to read results back.
///
/// A `Workspace` is a scoped resource: both run directories are removed when
/// it is dropped, whichever way the run ends (success, error, timeout,
/// cancellation of the enclosing future).

use crate::error::PipelineError;
use crate::grouper::CandidateSet;
use crate::locator::archive_sibling;
use plagiarism_common::config::ToolConfig;
use plagiarism_common::types::SubmissionId;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Every staged submission is written to `<token>/solution<ext>`
pub const SOLUTION_STEM: &str = "solution";

/// Analyzer-facing token for a submission id
pub fn token_for(id: SubmissionId) -> String {
    format!("s{}", id)
}

/// Token -> submission id table, built once per run. The id -> token
/// direction is `token_for`.
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    by_token: HashMap<String, SubmissionId>,
}

impl TokenMap {
    pub fn from_ids(ids: impl IntoIterator<Item = SubmissionId>) -> Self {
        Self {
            by_token: ids.into_iter().map(|id| (token_for(id), id)).collect(),
        }
    }

    pub fn resolve(&self, token: &str) -> Option<SubmissionId> {
        self.by_token.get(token).copied()
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.by_token.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }
}

#[derive(Debug)]
pub struct Workspace {
    run_token: Uuid,
    submissions_dir: PathBuf,
    results_dir: PathBuf,
    tokens: TokenMap,
    released: bool,
}

impl Workspace {
    /// Reserve a fresh run token and derive its directories. Nothing touches
    /// the filesystem until `stage`.
    pub fn allocate(config: &ToolConfig) -> Self {
        let run_token = Uuid::new_v4();
        let run_dir = format!("run_{}", run_token);
        Self {
            run_token,
            submissions_dir: config.submissions_dir.join(&run_dir),
            results_dir: config.results_dir.join(&run_dir),
            tokens: TokenMap::default(),
            released: false,
        }
    }

    /// Write every candidate's source verbatim into its token directory and
    /// create the empty results directory
    pub async fn stage(&mut self, candidates: &CandidateSet) -> Result<(), PipelineError> {
        create_dir(&self.submissions_dir).await?;
        create_dir(&self.results_dir).await?;

        let file_name = format!("{}{}", SOLUTION_STEM, candidates.language().extension);

        for submission in candidates.submissions() {
            let token = token_for(submission.id);
            let dir = self.submissions_dir.join(&token);
            create_dir(&dir).await?;

            let path = dir.join(&file_name);
            fs::write(&path, submission.source_text.as_bytes())
                .await
                .map_err(|e| PipelineError::workspace(&path, e))?;

            debug!(
                run_token = %self.run_token,
                submission_id = submission.id,
                author_id = submission.author_id,
                bytes = submission.source_text.len(),
                path = %path.display(),
                "Staged submission"
            );
        }

        self.tokens = TokenMap::from_ids(candidates.submissions().iter().map(|s| s.id));
        debug!(
            run_token = %self.run_token,
            tokens = self.tokens.len(),
            "Workspace staged"
        );
        Ok(())
    }

    pub fn run_token(&self) -> Uuid {
        self.run_token
    }

    pub fn submissions_dir(&self) -> &Path {
        &self.submissions_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn tokens(&self) -> &TokenMap {
        &self.tokens
    }

    /// Release the workspace on a blocking thread. `Drop` covers every exit
    /// path that does not reach this.
    pub async fn close(mut self) {
        self.released = true;
        let run_token = self.run_token;
        let submissions_dir = std::mem::take(&mut self.submissions_dir);
        let results_dir = std::mem::take(&mut self.results_dir);

        let removal = tokio::task::spawn_blocking(move || {
            remove_run_artifacts(run_token, &submissions_dir, &results_dir)
        });
        if let Err(e) = removal.await {
            warn!(run_token = %run_token, error = %e, "Workspace cleanup task failed");
        }
    }

    /// Remove both run directories and any `<results_dir>.zip` archive the
    /// analyzer left beside them. Idempotent; failures are logged only.
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        remove_run_artifacts(self.run_token, &self.submissions_dir, &self.results_dir);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}

fn remove_run_artifacts(run_token: Uuid, submissions_dir: &Path, results_dir: &Path) {
    let archive = archive_sibling(results_dir);
    let removals = [
        (submissions_dir, std::fs::remove_dir_all(submissions_dir)),
        (results_dir, std::fs::remove_dir_all(results_dir)),
        (archive.as_path(), std::fs::remove_file(&archive)),
    ];

    for (path, outcome) in removals {
        match outcome {
            Ok(()) => debug!(run_token = %run_token, path = %path.display(), "Removed run artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                run_token = %run_token,
                path = %path.display(),
                error = %e,
                "Failed to remove run artifact"
            ),
        }
    }
}

async fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| PipelineError::workspace(path, e))
}
