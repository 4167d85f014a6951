//! Profile recording (§4.E step g): append-only, unique on
//! `(run_id, trial_id, invocation, num_iterations)`, conflicts ignored.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Returns `true` if the row was actually written.
pub async fn insert_profile(
    pool: &PgPool,
    run_id: Uuid,
    trial_id: Uuid,
    invocation: i32,
    num_iterations: i32,
    value: &Value,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"insert into profiles (run_id, trial_id, invocation, num_iterations, value)
           values ($1, $2, $3, $4, $5)
           on conflict do nothing"#,
    )
    .bind(run_id)
    .bind(trial_id)
    .bind(invocation)
    .bind(num_iterations)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
