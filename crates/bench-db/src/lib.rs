//! Persistence adapter (§4.D) and entity interning/CRUD for the
//! benchmark-results schema (§3): `connect_from_env` / `migrate` / `status`
//! plus the per-entity interning and insert helpers.

pub mod entities;
pub mod measurements;
pub mod metadata;
pub mod profiles;
pub mod timeline;
mod unique;

pub use unique::{is_any_unique_violation, is_unique_violation};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres using the workspace's env-var conventions
/// (`BENCH_DATABASE_URL` or the discrete `BENCH_DB_*` parts).
pub async fn connect_from_env() -> Result<PgPool> {
    let url = bench_config::database_url_from_env()?;

    PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")
}

/// Connect and ensure migrations are applied — used by integration tests
/// and the `ingest recover` / `timeline run` CLI subcommands.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run the embedded SQLx migrations (§3's schema bootstrap).
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_runs_table: bool,
}

/// Connectivity + schema-presence check backing the `db status` CLI
/// subcommand and the "schema bootstrapped ... when no executor table is
/// found" check in §6.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"select exists (
             select 1 from information_schema.tables
             where table_schema = 'public' and table_name = 'runs'
           )"#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_runs_table: exists,
    })
}
