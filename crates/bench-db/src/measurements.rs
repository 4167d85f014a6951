//! The available-measurements dedup oracle and the batch-insert engine
//! (§4.E/§4.F): fixed-shape bulk writes via `on conflict do nothing`, with
//! a generated statement per batch size so the driver's prepared-statement
//! cache keys on stable text.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

/// `(run_id, trial_id, invocation, iteration, criterion_id, value)`.
pub type MeasurementTuple = (Uuid, Uuid, i32, i32, Uuid, f64);

/// Three fixed batch shapes; the driver's statement cache keys on text, so
/// every call at a given `n` reuses the same prepared plan.
pub const BATCH_N: usize = 50;
pub const FALLBACK_N: usize = 10;

/// `runId -> criterionId -> invocation -> maxIteration` already persisted
/// for a trial, flattened to a single map keyed by the full triple — the
/// dedup oracle for step 4.c of the ingestion pipeline.
pub async fn available_measurements(
    pool: &PgPool,
    trial_id: Uuid,
) -> Result<HashMap<(Uuid, Uuid, i32), i32>, sqlx::Error> {
    let rows: Vec<(Uuid, Uuid, i32, i32)> = sqlx::query_as(
        r#"select run_id, criterion_id, invocation, max(iteration) as max_iteration
           from measurements
           where trial_id = $1
           group by run_id, criterion_id, invocation"#,
    )
    .bind(trial_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(run_id, criterion_id, invocation, max_iteration)| {
            ((run_id, criterion_id, invocation), max_iteration)
        })
        .collect())
}

fn insert_batch_sql(n: usize) -> String {
    let mut sql = String::from("insert into measurements (run_id, trial_id, invocation, iteration, criterion_id, value) values ");
    for i in 0..n {
        if i > 0 {
            sql.push(',');
        }
        let base = i * 6;
        sql.push_str(&format!(
            "(${},${},${},${},${},${})",
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5,
            base + 6
        ));
    }
    sql.push_str(" on conflict do nothing");
    sql
}

/// Insert exactly `tuples.len()` measurement rows in one statement.
/// Returns the number of rows actually written (skipped duplicates don't
/// count, per `ON CONFLICT DO NOTHING`'s `rows_affected`).
///
/// Can fail with a unique-violation when two tuples *within this batch*
/// target the same key — Postgres rejects `ON CONFLICT DO NOTHING` trying
/// to affect one row twice in a single command. Callers fall back to
/// smaller batches / per-tuple inserts on that error.
pub async fn insert_measurement_batch(
    pool: &PgPool,
    tuples: &[MeasurementTuple],
) -> Result<u64, sqlx::Error> {
    if tuples.is_empty() {
        return Ok(0);
    }

    let sql = insert_batch_sql(tuples.len());
    let mut query = sqlx::query(&sql);
    for (run_id, trial_id, invocation, iteration, criterion_id, value) in tuples {
        query = query
            .bind(run_id)
            .bind(trial_id)
            .bind(invocation)
            .bind(iteration)
            .bind(criterion_id)
            .bind(value);
    }
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Per-tuple fallback insert. Returns `true` if the row was actually
/// written, `false` if it was a no-op duplicate.
pub async fn insert_measurement_one(
    pool: &PgPool,
    tuple: &MeasurementTuple,
) -> Result<bool, sqlx::Error> {
    let (run_id, trial_id, invocation, iteration, criterion_id, value) = tuple;
    let result = sqlx::query(
        r#"insert into measurements (run_id, trial_id, invocation, iteration, criterion_id, value)
           values ($1, $2, $3, $4, $5, $6)
           on conflict do nothing"#,
    )
    .bind(run_id)
    .bind(trial_id)
    .bind(invocation)
    .bind(iteration)
    .bind(criterion_id)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_sql_has_n_tuples_and_six_placeholders_each() {
        let sql = insert_batch_sql(3);
        assert_eq!(sql.matches('(').count(), 3);
        assert!(sql.contains("$18"));
        assert!(sql.trim_end().ends_with("on conflict do nothing"));
    }

    #[test]
    fn batch_sql_empty_for_zero_is_well_formed_but_unused() {
        let sql = insert_batch_sql(1);
        assert!(sql.contains("($1,$2,$3,$4,$5,$6)"));
    }
}
