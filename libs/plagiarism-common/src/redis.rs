use crate::types::{JobOutcome, PlagiarismJob, StoredResult};
use redis::{AsyncCommands, RedisResult};

/// Redis key semantics shared by whoever enqueues plagiarism checks and the
/// worker that drains them. Keys are deterministic per job / problem.

pub const QUEUE_NAME: &str = "plagiarism:queue";
pub const RESULTS_PREFIX: &str = "plagiarism:results";
pub const OUTCOME_PREFIX: &str = "plagiarism:outcome";

/// Job outcomes expire after 24 hours
pub const OUTCOME_TTL_SECONDS: u64 = 86400;

/// Result Store list for a problem
pub fn results_key(problem_id: u64) -> String {
    format!("{}:{}", RESULTS_PREFIX, problem_id)
}

/// Outcome key for a job
pub fn outcome_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", OUTCOME_PREFIX, job_id)
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

/// Push a plagiarism job to the queue (RPUSH, FIFO)
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &PlagiarismJob,
) -> RedisResult<()> {
    let payload = serde_json::to_string(job).map_err(serialization_error)?;
    conn.rpush(QUEUE_NAME, payload).await
}

/// Pop a plagiarism job, blocking up to `timeout_seconds` so the caller can
/// observe shutdown between polls
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<PlagiarismJob>> {
    let result: Option<(String, String)> = conn.blpop(QUEUE_NAME, timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: PlagiarismJob = serde_json::from_str(&payload).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Append correlated results to the problem's Result Store list.
///
/// Results are appended, never upserted: overlapping runs produce duplicates
/// that readers are expected to collapse.
pub async fn store_results(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: u64,
    results: &[StoredResult],
) -> RedisResult<()> {
    if results.is_empty() {
        return Ok(());
    }

    let payloads = results
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(serialization_error)?;

    conn.rpush(results_key(problem_id), payloads).await
}

/// Read back everything stored for a problem
pub async fn get_results(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: u64,
) -> RedisResult<Vec<StoredResult>> {
    let payloads: Vec<String> = conn.lrange(results_key(problem_id), 0, -1).await?;

    payloads
        .iter()
        .map(|p| serde_json::from_str(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(serialization_error)
}

/// Store a job outcome with a 24-hour TTL
pub async fn store_outcome(
    conn: &mut redis::aio::ConnectionManager,
    outcome: &JobOutcome,
) -> RedisResult<()> {
    let payload = serde_json::to_string(outcome).map_err(serialization_error)?;
    conn.set_ex(outcome_key(&outcome.job_id), payload, OUTCOME_TTL_SECONDS).await
}

pub async fn get_outcome(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &uuid::Uuid,
) -> RedisResult<Option<JobOutcome>> {
    let payload: Option<String> = conn.get(outcome_key(job_id)).await?;

    match payload {
        Some(data) => {
            let outcome: JobOutcome = serde_json::from_str(&data).map_err(serialization_error)?;
            Ok(Some(outcome))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        JobStatus, PairwiseResult, SimilarityStatus, SubmissionRecord,
    };
    use uuid::Uuid;

    /// Note: requires a running Redis instance
    async fn create_redis_conn() -> redis::aio::ConnectionManager {
        let client = redis::Client::open("redis://127.0.0.1:6379")
            .expect("Failed to create Redis client");
        client.get_connection_manager().await
            .expect("Failed to connect to Redis")
    }

    fn pair(a: u64, b: u64, percent: f64, status: SimilarityStatus) -> PairwiseResult {
        PairwiseResult {
            submission_id_a: a,
            submission_id_b: b,
            similarity_percent: percent,
            status,
        }
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_job_queue_is_fifo() {
        let mut conn = create_redis_conn().await;
        let jobs: Vec<PlagiarismJob> = (0..2)
            .map(|n| PlagiarismJob {
                id: Uuid::new_v4(),
                problem_id: 900_000 + n,
                target_submission: None,
                submissions: vec![SubmissionRecord {
                    id: n,
                    author_id: 1,
                    language_id: 62,
                    source_text: "class Main {}".to_string(),
                }],
            })
            .collect();

        for job in &jobs {
            push_job(&mut conn, job).await.unwrap();
        }

        for expected in &jobs {
            let popped = pop_job(&mut conn, 1.0).await.unwrap().expect("queued job");
            assert_eq!(popped.id, expected.id);
            assert_eq!(popped.submissions, expected.submissions);
        }
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_results_are_appended_per_problem() {
        let mut conn = create_redis_conn().await;
        let problem_id = 900_000 + (Uuid::new_v4().as_u128() % 100_000) as u64;
        let checked_at = chrono::Utc::now();
        let stored = |result| StoredResult { result, checked_at };

        store_results(&mut conn, problem_id, &[stored(pair(1, 2, 75.0, SimilarityStatus::Plagiarized))])
            .await
            .unwrap();
        store_results(&mut conn, problem_id, &[]).await.unwrap();
        store_results(&mut conn, problem_id, &[stored(pair(1, 2, 75.0, SimilarityStatus::Plagiarized))])
            .await
            .unwrap();

        let back = get_results(&mut conn, problem_id).await.unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0], back[1]);
        assert_eq!(back[0].checked_at, checked_at);

        let _: () = conn.del(results_key(problem_id)).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_outcome_round_trip_with_ttl() {
        let mut conn = create_redis_conn().await;
        let outcome = JobOutcome {
            job_id: Uuid::new_v4(),
            problem_id: 7,
            status: JobStatus::Completed,
            total_submissions: 2,
            results: vec![pair(1, 2, 45.0, SimilarityStatus::Suspicious)],
            flagged_count: 1,
            group_errors: Vec::new(),
            checked_at: chrono::Utc::now(),
        };

        assert!(get_outcome(&mut conn, &outcome.job_id).await.unwrap().is_none());
        store_outcome(&mut conn, &outcome).await.unwrap();
        assert_eq!(get_outcome(&mut conn, &outcome.job_id).await.unwrap(), Some(outcome.clone()));

        let ttl: i64 = conn.ttl(outcome_key(&outcome.job_id)).await.unwrap();
        assert!(ttl > 0 && ttl <= OUTCOME_TTL_SECONDS as i64);
    }

    #[test]
    fn test_results_key_per_problem() {
        assert_eq!(results_key(42), "plagiarism:results:42");
        assert_ne!(results_key(1), results_key(2));
    }

    #[test]
    fn test_outcome_key_deterministic() {
        let id = Uuid::new_v4();
        let key1 = outcome_key(&id);
        let key2 = outcome_key(&id);
        assert_eq!(key1, key2);
        assert!(key1.starts_with("plagiarism:outcome:"));
        assert!(key1.contains(&id.to_string()));
    }
}
