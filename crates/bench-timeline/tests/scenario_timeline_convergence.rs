/// Scenario 3 (§8): 24 distinct (run, trial, criterion) triples receive
/// total-criterion values; after `submit_update_jobs` and `await_quiescence`
/// the Timeline table has exactly 24 rows for this trial.
///
/// DB-backed test, skipped if BENCH_DATABASE_URL is not set.
use std::time::Duration;

use bench_cache::CacheToken;
use bench_db::metadata::MetadataCaches;
use bench_schemas::{
    CriterionSpec, EnvPayload, IngestPayload, MeasurementGroup, MeasurementValue, RunGroup, RunSpec,
    SourcePayload,
};
use bench_timeline::TimelineUpdater;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

const RUN_COUNT: usize = 24;

fn payload_with_many_runs(unique: Uuid) -> IngestPayload {
    let data = (0..RUN_COUNT)
        .map(|i| RunGroup {
            run_id: RunSpec {
                cmdline: format!("convergence-scenario-bench-{unique}-{i}"),
                benchmark: "convergence-scenario-benchmark".to_string(),
                suite: "convergence-scenario-suite".to_string(),
                executor: "convergence-scenario-executor".to_string(),
                location: None,
                cores: None,
                var_value: None,
                input_size: None,
                extra_args: None,
                max_invocation_time: None,
                min_iteration_time: None,
                warmup: None,
            },
            d: vec![MeasurementGroup {
                r#in: 0,
                it: 0,
                m: vec![MeasurementValue { c: 0, v: 1.0 + i as f64 }],
            }],
            p: vec![],
        })
        .collect();

    IngestPayload {
        project_name: format!("convergence-scenario-project-{unique}"),
        experiment_name: "convergence-scenario-experiment".to_string(),
        experiment_desc: None,
        start_time: Utc::now(),
        env: EnvPayload {
            host_name: format!("convergence-scenario-host-{unique}"),
            os_type: "linux".to_string(),
            memory: 16_000_000_000,
            cpu: "generic".to_string(),
            clock_speed: 3_000,
            user_name: "convergence-scenario-user".to_string(),
            manual_run: false,
            denoise: None,
        },
        source: SourcePayload {
            repo_url: "https://example.invalid/repo".to_string(),
            branch_or_tag: "main".to_string(),
            commit_id: format!("convergence-commit-{unique}"),
            commit_msg: "convergence scenario commit".to_string(),
            author_name: "A".to_string(),
            author_email: "a@example.invalid".to_string(),
            committer_name: "A".to_string(),
            committer_email: "a@example.invalid".to_string(),
        },
        criteria: vec![CriterionSpec {
            i: 0,
            c: bench_schemas::TOTAL_CRITERION.to_string(),
            u: "ms".to_string(),
        }],
        data,
    }
}

#[tokio::test]
async fn timeline_converges_to_one_row_per_triple() -> anyhow::Result<()> {
    let url = match std::env::var(bench_config::ENV_DATABASE_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BENCH_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(4).connect(&url).await?;
    bench_db::migrate(&pool).await?;

    let updater = TimelineUpdater::spawn(pool.clone(), 500);
    let caches = MetadataCaches::default();
    let cache_token = RwLock::new(CacheToken::new());
    let unique = Uuid::new_v4();
    let payload = payload_with_many_runs(unique);

    let counts = bench_ingest::record_all_data(
        &pool,
        &caches,
        &cache_token,
        Duration::ZERO,
        Some(&updater),
        &payload,
        false,
    )
    .await?;
    assert_eq!(counts.measurements_recorded, RUN_COUNT as u64);

    updater.await_quiescence().await;

    let (trial_count,): (i64,) = sqlx::query_as(
        r#"select count(*) from timelines tl
           join trials t on t.trial_id = tl.trial_id
           join experiments e on e.experiment_id = t.experiment_id
           join projects p on p.project_id = e.project_id
           where p.slug = $1"#,
    )
    .bind(bench_ingest::slugify(&payload.project_name))
    .fetch_one(&pool)
    .await?;

    assert_eq!(trial_count, RUN_COUNT as i64);

    updater.shutdown().await;
    Ok(())
}
