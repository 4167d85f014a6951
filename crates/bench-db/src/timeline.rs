//! Timeline row upserts and the durable `TimelineCalcJob` queue (§4.G), via
//! an `on conflict (...) do update set ... = excluded...` upsert.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{TimelineCalcJobKey, TimelineRow};

#[allow(clippy::too_many_arguments)]
pub async fn upsert_timeline(
    pool: &PgPool,
    run_id: Uuid,
    trial_id: Uuid,
    criterion_id: Uuid,
    min: f64,
    max: f64,
    stddev: f64,
    mean: f64,
    median: f64,
    num_samples: i64,
    bci95_low: f64,
    bci95_up: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"insert into timelines
             (run_id, trial_id, criterion_id, min, max, stddev, mean, median, num_samples, bci95_low, bci95_up, updated_at)
           values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
           on conflict (run_id, trial_id, criterion_id) do update
             set min = excluded.min,
                 max = excluded.max,
                 stddev = excluded.stddev,
                 mean = excluded.mean,
                 median = excluded.median,
                 num_samples = excluded.num_samples,
                 bci95_low = excluded.bci95_low,
                 bci95_up = excluded.bci95_up,
                 updated_at = excluded.updated_at"#,
    )
    .bind(run_id)
    .bind(trial_id)
    .bind(criterion_id)
    .bind(min)
    .bind(max)
    .bind(stddev)
    .bind(mean)
    .bind(median)
    .bind(num_samples)
    .bind(bci95_low)
    .bind(bci95_up)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_timeline(
    pool: &PgPool,
    run_id: Uuid,
    trial_id: Uuid,
    criterion_id: Uuid,
) -> Result<Option<TimelineRow>, sqlx::Error> {
    let row: Option<(Uuid, Uuid, Uuid, f64, f64, f64, f64, f64, i64, f64, f64)> = sqlx::query_as(
        r#"select run_id, trial_id, criterion_id, min, max, stddev, mean, median, num_samples, bci95_low, bci95_up
           from timelines where run_id = $1 and trial_id = $2 and criterion_id = $3"#,
    )
    .bind(run_id)
    .bind(trial_id)
    .bind(criterion_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(run_id, trial_id, criterion_id, min, max, stddev, mean, median, num_samples, bci95_low, bci95_up)| TimelineRow {
            run_id,
            trial_id,
            criterion_id,
            min,
            max,
            stddev,
            mean,
            median,
            num_samples,
            bci95_low,
            bci95_up,
        },
    ))
}

/// All recorded values for a (run, trial, criterion) triple, used on the
/// crash-recovery path (§4.G), where no in-memory batch can be trusted.
pub async fn fetch_measurement_values(
    pool: &PgPool,
    run_id: Uuid,
    trial_id: Uuid,
    criterion_id: Uuid,
) -> Result<Vec<f64>, sqlx::Error> {
    let rows: Vec<(f64,)> = sqlx::query_as(
        "select value from measurements where run_id = $1 and trial_id = $2 and criterion_id = $3",
    )
    .bind(run_id)
    .bind(trial_id)
    .bind(criterion_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

/// Idempotent enqueue: a second `submitUpdateJobs()` for the same key
/// coalesces with the first via `ON CONFLICT DO NOTHING`.
pub async fn enqueue_timeline_calc_job(
    pool: &PgPool,
    trial_id: Uuid,
    run_id: Uuid,
    criterion_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"insert into timeline_calc_jobs (trial_id, run_id, criterion_id)
           values ($1, $2, $3)
           on conflict (trial_id, run_id, criterion_id) do nothing"#,
    )
    .bind(trial_id)
    .bind(run_id)
    .bind(criterion_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drains every pending job key, for the startup recovery pass.
pub async fn list_timeline_calc_jobs(pool: &PgPool) -> Result<Vec<TimelineCalcJobKey>, sqlx::Error> {
    let rows: Vec<(Uuid, Uuid, Uuid)> =
        sqlx::query_as("select trial_id, run_id, criterion_id from timeline_calc_jobs")
            .fetch_all(pool)
            .await?;
    Ok(rows
        .into_iter()
        .map(|(trial_id, run_id, criterion_id)| TimelineCalcJobKey {
            trial_id,
            run_id,
            criterion_id,
        })
        .collect())
}

pub async fn delete_timeline_calc_job(
    pool: &PgPool,
    trial_id: Uuid,
    run_id: Uuid,
    criterion_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "delete from timeline_calc_jobs where trial_id = $1 and run_id = $2 and criterion_id = $3",
    )
    .bind(trial_id)
    .bind(run_id)
    .bind(criterion_id)
    .execute(pool)
    .await?;
    Ok(())
}
