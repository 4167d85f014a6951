//! The `CompletionPayload` handler (§4.E / §6 / §7). This is the one
//! user-visible error boundary in the ingestion core: missing metadata and
//! "nothing to complete" are reported as typed user errors rather than
//! `anyhow!` strings, keeping the usual line between internal (anyhow) and
//! edge (typed) errors at this function's signature.

use std::fmt;

use bench_schemas::CompletionPayload;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug)]
pub enum IngestError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::NotFound(msg) => write!(f, "not found: {msg}"),
            IngestError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            IngestError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::Internal(anyhow::Error::new(e))
    }
}

/// Logs an internal failure with its entity and lookup key before the
/// `?`-conversion to `IngestError::Internal` propagates it, per §7's
/// error-boundary contract.
fn log_db_err(entity: &'static str, key: impl std::fmt::Display, e: sqlx::Error) -> sqlx::Error {
    tracing::error!(error = %e, entity, key = %key, "db operation failed");
    e
}

/// Sets `end_time` on every still-open Trial of the named experiment.
/// Returns the number of trials closed.
pub async fn record_completion(pool: &PgPool, payload: &CompletionPayload) -> Result<u64, IngestError> {
    let project_id: Uuid = sqlx::query_as::<_, (Uuid,)>("select project_id from projects where name = $1")
        .bind(&payload.project_name)
        .fetch_optional(pool)
        .await
        .map_err(|e| log_db_err("project", &payload.project_name, e))?
        .map(|(id,)| id)
        .ok_or_else(|| IngestError::NotFound(format!("no such project {:?}", payload.project_name)))?;

    let experiment_id: Uuid = sqlx::query_as::<_, (Uuid,)>(
        "select experiment_id from experiments where project_id = $1 and name = $2",
    )
    .bind(project_id)
    .bind(&payload.experiment_name)
    .fetch_optional(pool)
    .await
    .map_err(|e| log_db_err("experiment", &payload.experiment_name, e))?
    .map(|(id,)| id)
    .ok_or_else(|| IngestError::NotFound(format!("no such experiment {:?}", payload.experiment_name)))?;

    let result = sqlx::query("update trials set end_time = $1 where experiment_id = $2 and end_time is null")
        .bind(payload.end_time)
        .bind(experiment_id)
        .execute(pool)
        .await
        .map_err(|e| log_db_err("trial_completion", experiment_id, e))?;

    if result.rows_affected() == 0 {
        return Err(IngestError::BadRequest(format!(
            "no open trial for experiment {:?}",
            payload.experiment_name
        )));
    }

    Ok(result.rows_affected())
}
