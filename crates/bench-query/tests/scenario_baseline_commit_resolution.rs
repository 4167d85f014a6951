/// Scenario 6 (§8): a project with `baseBranch = "main"`, an earlier payload
/// on "main", and a later payload on "feature" — `get_baseline_commit` for
/// the feature commit returns the main-branch Source row.
///
/// DB-backed test, skipped if BENCH_DATABASE_URL is not set.
use std::time::Duration;

use bench_cache::CacheToken;
use bench_db::metadata::MetadataCaches;
use bench_schemas::{
    CriterionSpec, EnvPayload, IngestPayload, RunGroup, RunSpec, SourcePayload,
};
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

fn payload(project: &str, host: &str, branch: &str, commit: &str, start_time: chrono::DateTime<Utc>) -> IngestPayload {
    IngestPayload {
        project_name: project.to_string(),
        experiment_name: "baseline-scenario-experiment".to_string(),
        experiment_desc: None,
        start_time,
        env: EnvPayload {
            host_name: host.to_string(),
            os_type: "linux".to_string(),
            memory: 16_000_000_000,
            cpu: "generic".to_string(),
            clock_speed: 3_000,
            user_name: "baseline-scenario-user".to_string(),
            manual_run: false,
            denoise: None,
        },
        source: SourcePayload {
            repo_url: "https://example.invalid/repo".to_string(),
            branch_or_tag: branch.to_string(),
            commit_id: commit.to_string(),
            commit_msg: "baseline scenario commit".to_string(),
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
                cmdline: format!("baseline-scenario-bench --commit {commit}"),
                benchmark: "baseline-scenario-benchmark".to_string(),
                suite: "baseline-scenario-suite".to_string(),
                executor: "baseline-scenario-executor".to_string(),
                location: None,
                cores: None,
                var_value: None,
                input_size: None,
                extra_args: None,
                max_invocation_time: None,
                min_iteration_time: None,
                warmup: None,
            },
            d: vec![],
            p: vec![],
        }],
    }
}

#[tokio::test]
async fn baseline_commit_is_the_latest_main_branch_source() -> anyhow::Result<()> {
    let url = match std::env::var(bench_config::ENV_DATABASE_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BENCH_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(4).connect(&url).await?;
    bench_db::migrate(&pool).await?;

    let unique = Uuid::new_v4();
    let project = format!("baseline-scenario-project-{unique}");
    let main_commit = format!("main-commit-{unique}");
    let feature_commit = format!("feature-commit-{unique}");

    let caches = MetadataCaches::default();
    let cache_token = RwLock::new(CacheToken::new());

    let earlier = Utc::now() - chrono::Duration::hours(1);
    let later = Utc::now();

    bench_ingest::record_all_data(
        &pool,
        &caches,
        &cache_token,
        Duration::ZERO,
        None,
        &payload(&project, "baseline-scenario-host-main", "main", &main_commit, earlier),
        true,
    )
    .await?;

    bench_ingest::record_all_data(
        &pool,
        &caches,
        &cache_token,
        Duration::ZERO,
        None,
        &payload(&project, "baseline-scenario-host-feature", "feature", &feature_commit, later),
        true,
    )
    .await?;

    let slug = bench_ingest::slugify(&project);
    sqlx::query("update projects set base_branch = 'main' where slug = $1")
        .bind(&slug)
        .execute(&pool)
        .await?;

    let resolved = bench_query::get_baseline_commit(&pool, &slug, &feature_commit).await?;
    let resolved = resolved.expect("expected a baseline commit");
    assert_eq!(resolved.commit_id, main_commit);
    assert_eq!(resolved.branch_or_tag, "main");

    Ok(())
}
