//! `recordAllData` (§4.E): the ingestion pipeline's public entry point.
//! Leaves-first metadata resolution, streamed measurement batching through
//! the dedup oracle, and the notify-the-updater step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bench_cache::CacheToken;
use bench_db::entities::Criterion;
use bench_db::measurements::{MeasurementTuple, BATCH_N, FALLBACK_N};
use bench_db::metadata::MetadataCaches;
use bench_schemas::{IngestCounts, IngestPayload, RunGroup, TOTAL_CRITERION};
use bench_timeline::TimelineUpdater;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::slug::{filter_commit_message, slugify};

/// Logs an internal failure with its entity and lookup key before the
/// caller propagates it, per §7's error-boundary contract.
fn log_db_err(entity: &'static str, key: impl std::fmt::Display, e: impl Into<anyhow::Error>) -> anyhow::Error {
    let e = e.into();
    tracing::error!(error = %e, entity, key = %key, "db operation failed");
    e
}

/// Idempotent recording of one ingest payload. See §4.E steps 1-6.
pub async fn record_all_data(
    pool: &PgPool,
    caches: &MetadataCaches,
    cache_token: &RwLock<CacheToken>,
    cache_invalidation_delay: Duration,
    updater: Option<&Arc<TimelineUpdater>>,
    payload: &IngestPayload,
    suppress_timeline: bool,
) -> Result<IngestCounts> {
    // 1. Invalidate the stats cache token immediately.
    {
        let mut guard = cache_token.write().await;
        *guard = guard.invalidate_and_new(cache_invalidation_delay);
    }

    // 2. Record metadata, leaves first: environment -> project -> experiment
    //    -> source -> trial (trial needs both experiment and source).
    let environment = bench_db::metadata::record_environment(
        pool,
        &caches.environments,
        &payload.env.host_name,
        &payload.env.os_type,
        payload.env.memory,
        &payload.env.cpu,
        payload.env.clock_speed,
    )
    .await
    .map_err(|e| log_db_err("environment", &payload.env.host_name, e))?;

    let slug = slugify(&payload.project_name);
    let project = bench_db::metadata::record_project(pool, &caches.projects, &payload.project_name, &slug, None)
        .await
        .map_err(|e| log_db_err("project", &slug, e))?;

    let experiment = bench_db::metadata::record_experiment(
        pool,
        &caches.experiments,
        project.project_id,
        &payload.experiment_name,
        payload.experiment_desc.as_deref(),
    )
    .await
    .map_err(|e| log_db_err("experiment", &payload.experiment_name, e))?;

    let commit_message = filter_commit_message(&payload.source.commit_msg);
    let source = bench_db::metadata::record_source(
        pool,
        &caches.sources,
        &payload.source.repo_url,
        &payload.source.branch_or_tag,
        &payload.source.commit_id,
        &commit_message,
        &payload.source.author_name,
        &payload.source.author_email,
        &payload.source.committer_name,
        &payload.source.committer_email,
    )
    .await
    .map_err(|e| log_db_err("source", &payload.source.commit_id, e))?;

    let trial = bench_db::metadata::record_trial(
        pool,
        &caches.trials,
        &payload.env.user_name,
        environment.environment_id,
        payload.start_time,
        experiment.experiment_id,
        source.source_id,
        payload.env.denoise.as_deref(),
    )
    .await
    .map_err(|e| log_db_err("trial", format!("{}@{}", payload.experiment_name, payload.start_time), e))?;

    // 3. Resolve criteria: payload index -> interned Criterion row.
    let mut criteria_by_idx: HashMap<i32, Criterion> = HashMap::with_capacity(payload.criteria.len());
    for spec in &payload.criteria {
        let unit = bench_db::metadata::record_unit(pool, &caches.units, &spec.u)
            .await
            .map_err(|e| log_db_err("unit", &spec.u, e))?;
        let criterion = bench_db::metadata::record_criterion(pool, &caches.criteria, &spec.c, unit.id)
            .await
            .map_err(|e| log_db_err("criterion", &spec.c, e))?;
        criteria_by_idx.insert(spec.i, criterion);
    }

    let mut measurements_recorded: u64 = 0;
    let mut profiles_recorded: u64 = 0;

    for group in &payload.data {
        let (recorded, recorded_profiles) =
            record_run_group(pool, caches, &criteria_by_idx, &trial, group, updater).await?;
        measurements_recorded += recorded;
        profiles_recorded += recorded_profiles;
    }

    // 5. Notify the updater once per request, not once per run group. Per
    // spec this triggers on any recorded measurement, not only "total"
    // criterion ones — submitUpdateJobs() drains whatever is currently
    // pending service-wide, so this also flushes concurrent ingesters'
    // total-criterion values that arrived meanwhile.
    if measurements_recorded > 0 && !suppress_timeline {
        if let Some(updater) = updater {
            updater
                .submit_update_jobs()
                .await
                .map_err(|e| log_db_err("timeline_submit", trial.trial_id, e))?;
        }
    }

    Ok(IngestCounts {
        measurements_recorded,
        profiles_recorded,
    })
}

/// Interns the run group's Run (and its Executor/Suite/Benchmark), streams
/// its measurements through the dedup oracle and the batch-insert engine,
/// and inserts its profiles. Returns `(measurements_recorded, profiles_recorded)`.
async fn record_run_group(
    pool: &PgPool,
    caches: &MetadataCaches,
    criteria_by_idx: &HashMap<i32, Criterion>,
    trial: &bench_db::entities::Trial,
    group: &RunGroup,
    updater: Option<&Arc<TimelineUpdater>>,
) -> Result<(u64, u64)> {
    // a. Intern the Run, which recursively interns Executor/Suite/Benchmark.
    let benchmark = bench_db::metadata::record_benchmark(pool, &caches.benchmarks, &group.run_id.benchmark)
        .await
        .map_err(|e| log_db_err("benchmark", &group.run_id.benchmark, e))?;
    let suite = bench_db::metadata::record_suite(pool, &caches.suites, &group.run_id.suite)
        .await
        .map_err(|e| log_db_err("suite", &group.run_id.suite, e))?;
    let executor = bench_db::metadata::record_executor(pool, &caches.executors, &group.run_id.executor)
        .await
        .map_err(|e| log_db_err("executor", &group.run_id.executor, e))?;
    let run = bench_db::metadata::record_run(
        pool,
        &caches.runs,
        &group.run_id.cmdline,
        benchmark.id,
        suite.id,
        executor.id,
        group.run_id.location.as_deref(),
        group.run_id.cores,
        group.run_id.var_value.as_deref(),
        group.run_id.input_size.as_deref(),
        group.run_id.extra_args.as_deref(),
        group.run_id.max_invocation_time,
        group.run_id.min_iteration_time,
        group.run_id.warmup,
    )
    .await
    .map_err(|e| log_db_err("run", &group.run_id.cmdline, e))?;

    let mut recorded: u64 = 0;

    if !group.d.is_empty() {
        // b. The dedup oracle for this trial: runId -> criterionId -> invocation -> maxIteration.
        let available = bench_db::measurements::available_measurements(pool, trial.trial_id)
            .await
            .map_err(|e| log_db_err("measurements", trial.trial_id, e))?;

        let mut batch: Vec<MeasurementTuple> = Vec::with_capacity(BATCH_N);

        for mg in &group.d {
            for mv in &mg.m {
                let criterion = criteria_by_idx
                    .get(&mv.c)
                    .ok_or_else(|| anyhow::anyhow!("measurement references unknown criterion index {}", mv.c))?;

                let key = (run.run_id, criterion.criterion_id, mg.r#in);
                if let Some(&max_iteration) = available.get(&key) {
                    if max_iteration >= mg.it {
                        continue; // c. already recorded at this or a later iteration
                    }
                }

                // f. Deduped means "accepted" for the updater's purposes: this
                // value was not already persisted as of the start of this
                // request. A concurrent writer racing on the same key is the
                // same at-least-once tolerance the dedup oracle already accepts.
                if criterion.name == TOTAL_CRITERION {
                    if let Some(updater) = updater {
                        updater.add_value(run.run_id, trial.trial_id, criterion.criterion_id, mv.v).await;
                    }
                }

                batch.push((run.run_id, trial.trial_id, mg.r#in, mg.it, criterion.criterion_id, mv.v));
                if batch.len() == BATCH_N {
                    recorded += flush_batch(pool, &batch).await?;
                    batch.clear();
                }
            }
        }

        // e. Residual tail: 10-row batches, then per-tuple.
        while batch.len() >= FALLBACK_N {
            let chunk: Vec<MeasurementTuple> = batch.drain(0..FALLBACK_N).collect();
            recorded += flush_batch(pool, &chunk).await?;
        }
        for tuple in batch.drain(..) {
            if bench_db::measurements::insert_measurement_one(pool, &tuple)
                .await
                .map_err(|e| log_db_err("measurement", tuple.0, e))?
            {
                recorded += 1;
            }
        }
    }

    // g. Profiles: unique-violations on (run, trial, invocation, numIterations) are silently ignored.
    let mut profiles_recorded: u64 = 0;
    for p in &group.p {
        if bench_db::profiles::insert_profile(pool, run.run_id, trial.trial_id, p.r#in, p.nit, &p.d)
            .await
            .map_err(|e| log_db_err("profile", format!("{}/{}", run.run_id, p.r#in), e))?
        {
            profiles_recorded += 1;
        }
    }

    Ok((recorded, profiles_recorded))
}

/// Executes a fixed-size batch insert; on the "affects one row twice in a
/// single command" unique-violation (§4.F), retries tuple-by-tuple rather
/// than failing the request.
async fn flush_batch(pool: &PgPool, chunk: &[MeasurementTuple]) -> Result<u64> {
    match bench_db::measurements::insert_measurement_batch(pool, chunk).await {
        Ok(n) => Ok(n),
        Err(e) if bench_db::is_any_unique_violation(&e) => {
            let mut accepted = 0u64;
            for tuple in chunk {
                if bench_db::measurements::insert_measurement_one(pool, tuple)
                    .await
                    .map_err(|e| log_db_err("measurement", tuple.0, e))?
                {
                    accepted += 1;
                }
            }
            Ok(accepted)
        }
        Err(e) => Err(log_db_err("measurement_batch", chunk.len(), e)),
    }
}
