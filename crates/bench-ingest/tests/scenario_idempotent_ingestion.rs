/// Scenario 1 & 2 (§8): a fresh payload with 3 total-criterion measurements
/// records `(3, 0)`; POSTing the identical payload again records `(0, 0)`.
///
/// DB-backed test, skipped if BENCH_DATABASE_URL is not set.
use std::time::Duration;

use bench_cache::CacheToken;
use bench_db::metadata::MetadataCaches;
use bench_schemas::{
    CriterionSpec, EnvPayload, IngestPayload, MeasurementGroup, MeasurementValue, RunGroup, RunSpec,
    SourcePayload,
};
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

fn sample_payload() -> IngestPayload {
    let unique = Uuid::new_v4();
    IngestPayload {
        project_name: format!("scenario-project-{unique}"),
        experiment_name: "scenario-experiment".to_string(),
        experiment_desc: None,
        start_time: Utc::now(),
        env: EnvPayload {
            host_name: format!("scenario-host-{unique}"),
            os_type: "linux".to_string(),
            memory: 16_000_000_000,
            cpu: "generic".to_string(),
            clock_speed: 3_000,
            user_name: "scenario-user".to_string(),
            manual_run: false,
            denoise: None,
        },
        source: SourcePayload {
            repo_url: "https://example.invalid/repo".to_string(),
            branch_or_tag: "main".to_string(),
            commit_id: format!("commit-{unique}"),
            commit_msg: "scenario commit".to_string(),
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
        data: vec![RunGroup {
            run_id: RunSpec {
                cmdline: format!("scenario-bench --seed {unique}"),
                benchmark: "scenario-benchmark".to_string(),
                suite: "scenario-suite".to_string(),
                executor: "scenario-executor".to_string(),
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
                m: vec![MeasurementValue { c: 0, v: 1.0 }],
            }, MeasurementGroup {
                r#in: 0,
                it: 1,
                m: vec![MeasurementValue { c: 0, v: 2.0 }],
            }, MeasurementGroup {
                r#in: 0,
                it: 2,
                m: vec![MeasurementValue { c: 0, v: 3.0 }],
            }],
            p: vec![],
        }],
    }
}

#[tokio::test]
async fn repeated_ingestion_is_idempotent() -> anyhow::Result<()> {
    let url = match std::env::var(bench_config::ENV_DATABASE_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BENCH_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(4).connect(&url).await?;
    bench_db::migrate(&pool).await?;

    let caches = MetadataCaches::default();
    let cache_token = RwLock::new(CacheToken::new());
    let payload = sample_payload();

    let first = bench_ingest::record_all_data(
        &pool,
        &caches,
        &cache_token,
        Duration::ZERO,
        None,
        &payload,
        true,
    )
    .await?;
    assert_eq!(first.measurements_recorded, 3);
    assert_eq!(first.profiles_recorded, 0);

    let second = bench_ingest::record_all_data(
        &pool,
        &caches,
        &cache_token,
        Duration::ZERO,
        None,
        &payload,
        true,
    )
    .await?;
    assert_eq!(second.measurements_recorded, 0);
    assert_eq!(second.profiles_recorded, 0);

    Ok(())
}
