/// Two interning attempts for the same Project natural key must converge on
/// one row — the `recordCached` contract (§4.C), exercised directly against
/// Postgres rather than through the in-process cache, to prove the unique
/// constraint backs it.
///
/// DB-backed test, skipped if BENCH_DATABASE_URL is not set.
use bench_cache::InterningCache;
use bench_db::entities::Project;
use bench_db::metadata::record_project;

#[tokio::test]
async fn concurrent_project_interning_converges_on_one_row() -> anyhow::Result<()> {
    let url = match std::env::var(bench_config::ENV_DATABASE_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BENCH_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await?;
    bench_db::migrate(&pool).await?;

    let name = format!("scenario-project-{}", uuid::Uuid::new_v4());
    let cache_a: InterningCache<String, Project> = InterningCache::new();
    let cache_b: InterningCache<String, Project> = InterningCache::new();

    let a = record_project(&pool, &cache_a, &name, "scenario-project", None).await?;
    let b = record_project(&pool, &cache_b, &name, "scenario-project", None).await?;

    assert_eq!(a.project_id, b.project_id);

    let (count,): (i64,) = sqlx::query_as("select count(*) from projects where name = $1")
        .bind(&name)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);

    Ok(())
}
