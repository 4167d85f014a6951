//! The long-lived service object (§5/§9 "Global mutable state"): everything
//! an ingest task needs, constructed once and shared via `Arc` — a
//! `Clone`-able bundle of the pool, caches, and the background worker's
//! handle, never ambient statics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bench_cache::CacheToken;
use bench_config::Config;
use bench_db::metadata::MetadataCaches;
use bench_ingest::IngestError;
use bench_schemas::{CompletionPayload, IngestCounts, IngestPayload, PlotData, RevisionComparison, TimelineRequest};
use bench_timeline::TimelineUpdater;
use sqlx::PgPool;
use tokio::sync::RwLock;

/// Cloneable (`Arc`) handle shared across all concurrent ingest tasks.
pub struct IngestService {
    pool: PgPool,
    caches: MetadataCaches,
    updater: Arc<TimelineUpdater>,
    cache_token: RwLock<CacheToken>,
    cfg: Config,
}

impl IngestService {
    /// Connects to Postgres, runs pending migrations, and spawns the
    /// timeline updater's consumer task.
    pub async fn new(cfg: Config) -> Result<Arc<Self>> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&cfg.database_url)
            .await
            .context("failed to connect to Postgres")?;
        bench_db::migrate(&pool).await?;

        let updater = TimelineUpdater::spawn(pool.clone(), cfg.timeline_bootstrap_replicates);

        Ok(Arc::new(Self {
            pool,
            caches: MetadataCaches::default(),
            updater,
            cache_token: RwLock::new(CacheToken::new()),
            cfg,
        }))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn updater(&self) -> &Arc<TimelineUpdater> {
        &self.updater
    }

    /// Records one ingest payload (§4.E). `suppress_timeline` is exposed
    /// mainly for tests that want to assert recorded counts without waiting
    /// on the background updater.
    pub async fn ingest(&self, payload: &IngestPayload, suppress_timeline: bool) -> Result<IngestCounts> {
        let delay = Duration::from_millis(self.cfg.cache_invalidation_delay_ms);
        let updater = self.cfg.timeline_enabled.then_some(&self.updater);
        bench_ingest::record_all_data(
            &self.pool,
            &self.caches,
            &self.cache_token,
            delay,
            updater,
            payload,
            suppress_timeline || !self.cfg.timeline_enabled,
        )
        .await
    }

    /// Closes out open trials for an experiment (§4.E/§7).
    pub async fn complete(&self, payload: &CompletionPayload) -> Result<u64, IngestError> {
        bench_ingest::record_completion(&self.pool, payload).await
    }

    pub async fn revisions_exist_in_project(
        &self,
        slug: &str,
        base_commit: &str,
        change_commit: &str,
    ) -> Result<RevisionComparison> {
        bench_query::revisions_exist_in_project(&self.pool, slug, base_commit, change_commit).await
    }

    pub async fn get_baseline_commit(&self, project_slug: &str, current_commit: &str) -> Result<Option<bench_schemas::SourceSummary>> {
        bench_query::get_baseline_commit(&self.pool, project_slug, current_commit).await
    }

    pub async fn get_timeline_data(&self, project_slug: &str, request: &TimelineRequest) -> Result<PlotData> {
        bench_query::get_timeline_data(&self.pool, project_slug, request).await
    }

    /// Startup recovery (§4.G "Recovery"): drain any `TimelineCalcJob` rows
    /// left behind by a crashed prior process.
    pub async fn recover_pending_jobs(&self) -> Result<usize> {
        self.updater.recover_pending_jobs().await
    }

    /// Waits for the timeline updater to drain, then stops its consumer task.
    pub async fn shutdown(&self) {
        self.updater.shutdown().await;
    }
}
