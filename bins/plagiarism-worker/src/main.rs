mod classifier;
mod config;
mod correlator;
mod engine;
mod error;
mod grouper;
mod locator;
mod pipeline;
mod workspace;

use anyhow::Context;
use config::LanguageTable;
use engine::{Analyzer, DockerAnalyzer};
use pipeline::Pipeline;
use plagiarism_common::config::ToolConfig;
use plagiarism_common::redis;
use plagiarism_common::types::{
    GroupError, JobOutcome, JobStatus, PairwiseResult, PlagiarismJob, StoredResult,
};
use tokio::signal;
use tracing::{debug, error, info, instrument, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Plagiarism worker booting...");

    let tool_config = ToolConfig::from_env().context("Invalid JPLAG_* configuration")?;

    info!(
        base_dir = %tool_config.base_dir.display(),
        image = %tool_config.docker_image,
        timeout_seconds = tool_config.timeout_seconds,
        "Analyzer configured"
    );

    let languages = LanguageTable::load_default().map_err(|e| {
        error!("Failed to load language table: {}", e);
        error!("Check config/languages.json or PLAGIARISM_LANGUAGES");
        e
    })?;

    let analyzer = DockerAnalyzer::connect(&tool_config)?;
    analyzer
        .prepare()
        .await
        .context("Failed to prepare analyzer image")?;
    let pipeline = Pipeline::new(tool_config, languages, analyzer);

    info!("Supported language ids: {:?}", pipeline.languages().language_ids());

    // Connect to Redis
    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = ::redis::Client::open(redis_url.as_str())?;
    let mut redis_conn = ::redis::aio::ConnectionManager::new(client).await?;

    info!("Connected to Redis: {}", redis_url);
    info!("Queue: {}", redis::QUEUE_NAME);

    // Setup graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal, stopping worker...");
    };

    tokio::select! {
        _ = worker_loop(&mut redis_conn, &pipeline) => {},
        _ = shutdown => {},
    }

    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip_all)]
async fn worker_loop<A: Analyzer>(
    redis_conn: &mut ::redis::aio::ConnectionManager,
    pipeline: &Pipeline<A>,
) {
    loop {
        // BLPOP with 5 second timeout for graceful shutdown
        match redis::pop_job(redis_conn, 5.0).await {
            Ok(Some(job)) => {
                info!(
                    job_id = %job.id,
                    problem_id = job.problem_id,
                    submissions = job.submissions.len(),
                    target = ?job.target_submission,
                    "Received job"
                );

                let start = std::time::Instant::now();
                let (stored, outcome) = process_job(pipeline, job).await;

                info!(
                    job_id = %outcome.job_id,
                    status = ?outcome.status,
                    comparisons = stored.len(),
                    flagged = outcome.flagged_count,
                    execution_ms = start.elapsed().as_millis(),
                    "Job completed"
                );

                for result in &outcome.results {
                    debug!(
                        job_id = %outcome.job_id,
                        submission_a = result.submission_id_a,
                        submission_b = result.submission_id_b,
                        similarity = result.similarity_percent,
                        status = %result.status,
                        "Pair result"
                    );
                }

                persist(redis_conn, &outcome, &stored).await;
            }
            Ok(None) => {
                // Timeout - check for shutdown
                continue;
            }
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }
    }
}

/// Run a job and build what gets persisted: every correlated pair for the
/// Result Store, and the caller-facing outcome
async fn process_job<A: Analyzer>(
    pipeline: &Pipeline<A>,
    job: PlagiarismJob,
) -> (Vec<PairwiseResult>, JobOutcome) {
    let total_submissions = job.submissions.len();

    let (status, stored, displayed, flagged_count, group_errors) = match job.target_submission {
        Some(target_id) => {
            let (targets, others): (Vec<_>, Vec<_>) =
                job.submissions.into_iter().partition(|s| s.id == target_id);

            match targets.into_iter().next() {
                None => (
                    JobStatus::Failed,
                    Vec::new(),
                    Vec::new(),
                    0,
                    vec![GroupError {
                        language_id: 0,
                        message: format!("target submission {} not in job", target_id),
                    }],
                ),
                Some(target) => {
                    let language_id = target.language_id;
                    match pipeline.check_submission(target, others).await {
                        Ok(Some(report)) => {
                            let flagged = report.flagged_count();
                            (JobStatus::Completed, report.results, report.displayed, flagged, Vec::new())
                        }
                        Ok(None) => (JobStatus::Completed, Vec::new(), Vec::new(), 0, Vec::new()),
                        Err(e) => {
                            error!(job_id = %job.id, error = %e, "Submission check failed");
                            (
                                JobStatus::Failed,
                                Vec::new(),
                                Vec::new(),
                                0,
                                vec![GroupError {
                                    language_id,
                                    message: e.to_string(),
                                }],
                            )
                        }
                    }
                }
            }
        }
        None => {
            let report = pipeline.check_problem(job.submissions).await;
            (
                report.status(),
                report.stored_results(),
                report.displayed(),
                report.flagged_count(),
                report.errors(),
            )
        }
    };

    let outcome = JobOutcome {
        job_id: job.id,
        problem_id: job.problem_id,
        status,
        total_submissions,
        results: displayed,
        flagged_count,
        group_errors,
        checked_at: chrono::Utc::now(),
    };

    (stored, outcome)
}

/// Persist results and outcome. Failures are logged; the worker keeps going.
async fn persist(
    redis_conn: &mut ::redis::aio::ConnectionManager,
    outcome: &JobOutcome,
    stored: &[PairwiseResult],
) {
    let records: Vec<StoredResult> = stored
        .iter()
        .cloned()
        .map(|result| StoredResult {
            result,
            checked_at: outcome.checked_at,
        })
        .collect();

    match redis::store_results(redis_conn, outcome.problem_id, &records).await {
        Ok(_) => info!(
            job_id = %outcome.job_id,
            problem_id = outcome.problem_id,
            stored = records.len(),
            "Results persisted to Redis"
        ),
        Err(e) => error!(job_id = %outcome.job_id, error = %e, "Failed to persist results"),
    }

    match redis::store_outcome(redis_conn, outcome).await {
        Ok(_) => debug!(job_id = %outcome.job_id, "Outcome persisted to Redis"),
        Err(e) => error!(job_id = %outcome.job_id, error = %e, "Failed to persist outcome"),
    }
}
