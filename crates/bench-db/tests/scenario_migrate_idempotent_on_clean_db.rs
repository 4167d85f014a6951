/// Migrating twice on a clean DB must be idempotent.
///
/// DB-backed test, skipped if BENCH_DATABASE_URL is not set.
#[tokio::test]
async fn migrate_idempotent_on_clean_db() -> anyhow::Result<()> {
    let url = match std::env::var(bench_config::ENV_DATABASE_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BENCH_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;

    bench_db::migrate(&pool).await?;
    bench_db::migrate(&pool).await?;

    let st = bench_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_runs_table);

    Ok(())
}
