//! The read-only query surface (§4.H): revision existence checks, baseline
//! resolution, and timeline plot data, via a small number of fixed-shape
//! joins rather than building SQL dynamically per request.

use anyhow::{Context, Result};
use bench_schemas::{PlotData, RevisionComparison, SourceSummary, TimelineRequest};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Whether `base_commit` and `change_commit` each have at least one recorded
/// trial under the project named by `slug`, and if so, their Source rows.
pub async fn revisions_exist_in_project(
    pool: &PgPool,
    slug: &str,
    base_commit: &str,
    change_commit: &str,
) -> Result<RevisionComparison> {
    let project_id: Option<(Uuid,)> = sqlx::query_as("select project_id from projects where slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("project lookup by slug failed")?;

    let Some((project_id,)) = project_id else {
        return Ok(RevisionComparison { exists: false, base: None, change: None });
    };

    let base = source_with_trial_in_project(pool, project_id, base_commit).await?;
    let change = source_with_trial_in_project(pool, project_id, change_commit).await?;
    let exists = base.is_some() && change.is_some();

    Ok(RevisionComparison { exists, base, change })
}

async fn source_with_trial_in_project(
    pool: &PgPool,
    project_id: Uuid,
    commit_id: &str,
) -> Result<Option<SourceSummary>> {
    sqlx::query_as(
        r#"select s.source_id, s.commit_id, s.commit_message as commit_msg, s.branch_or_tag, s.author_name, s.committer_name
           from sources s
           join trials t on t.source_id = s.source_id
           join experiments e on e.experiment_id = t.experiment_id
           where e.project_id = $1 and s.commit_id = $2
           limit 1"#,
    )
    .bind(project_id)
    .bind(commit_id)
    .fetch_optional(pool)
    .await
    .context("source-with-trial lookup failed")
}

/// The most recent Source on the project's base branch other than
/// `current_commit`, ordered by its owning trial's start time.
pub async fn get_baseline_commit(
    pool: &PgPool,
    project_slug: &str,
    current_commit: &str,
) -> Result<Option<SourceSummary>> {
    sqlx::query_as(
        r#"select s.source_id, s.commit_id, s.commit_message as commit_msg, s.branch_or_tag, s.author_name, s.committer_name
           from sources s
           join trials t on t.source_id = s.source_id
           join experiments e on e.experiment_id = t.experiment_id
           join projects p on p.project_id = e.project_id
           where p.slug = $1
             and p.base_branch is not null
             and s.branch_or_tag = p.base_branch
             and s.commit_id <> $2
           order by t.start_time desc
           limit 1"#,
    )
    .bind(project_slug)
    .bind(current_commit)
    .fetch_optional(pool)
    .await
    .context("baseline-commit lookup failed")
}

struct TimelinePoint {
    start_time: DateTime<Utc>,
    branch: String,
    is_current: bool,
    source_id: Uuid,
    median: f64,
    bci95_low: f64,
    bci95_up: f64,
}

/// Timeline data for a (run, criterion) pair, shaped for plotting. Two fixed
/// query shapes: base-branch history alone, or base-branch history unioned
/// with the specific change commit's points.
pub async fn get_timeline_data(pool: &PgPool, project_slug: &str, request: &TimelineRequest) -> Result<PlotData> {
    match &request.change_commit_id {
        None => {
            let rows: Vec<(DateTime<Utc>, f64, f64, f64)> = sqlx::query_as(
                r#"select t.start_time, tl.median, tl.bci95_low, tl.bci95_up
                   from trials t
                   join timelines tl on tl.trial_id = t.trial_id
                   join sources s on s.source_id = t.source_id
                   join experiments e on e.experiment_id = t.experiment_id
                   join projects p on p.project_id = e.project_id
                   where p.slug = $1
                     and s.branch_or_tag = p.base_branch
                     and tl.run_id = $2
                     and tl.criterion_id = $3
                   order by t.start_time asc"#,
            )
            .bind(project_slug)
            .bind(request.run_id)
            .bind(request.criterion_id)
            .fetch_all(pool)
            .await
            .context("baseline timeline query failed")?;

            let mut start_time = Vec::with_capacity(rows.len());
            let mut median = Vec::with_capacity(rows.len());
            let mut bci95_low = Vec::with_capacity(rows.len());
            let mut bci95_up = Vec::with_capacity(rows.len());
            for (t, m, lo, up) in rows {
                start_time.push(t);
                median.push(m);
                bci95_low.push(lo);
                bci95_up.push(up);
            }
            Ok(PlotData::BaselineOnly { start_time, median, bci95_low, bci95_up })
        }
        Some(change_commit_id) => {
            let points: Vec<TimelinePoint> = sqlx::query_as::<_, (DateTime<Utc>, String, Uuid, String, f64, f64, f64)>(
                r#"select t.start_time, s.branch_or_tag, s.source_id, s.commit_id, tl.median, tl.bci95_low, tl.bci95_up
                   from trials t
                   join timelines tl on tl.trial_id = t.trial_id
                   join sources s on s.source_id = t.source_id
                   join experiments e on e.experiment_id = t.experiment_id
                   join projects p on p.project_id = e.project_id
                   where p.slug = $1
                     and (s.branch_or_tag = p.base_branch or s.commit_id = $4)
                     and tl.run_id = $2
                     and tl.criterion_id = $3
                   order by t.start_time asc"#,
            )
            .bind(project_slug)
            .bind(request.run_id)
            .bind(request.criterion_id)
            .bind(change_commit_id)
            .fetch_all(pool)
            .await
            .context("base-and-change timeline query failed")?
            .into_iter()
            .map(|(start_time, branch, source_id, commit_id, median, bci95_low, bci95_up)| {
                let is_current = commit_id == request.base_commit_id || commit_id == *change_commit_id;
                TimelinePoint { start_time, branch, is_current, source_id, median, bci95_low, bci95_up }
            })
            .collect();

            let mut start_time = Vec::with_capacity(points.len());
            let mut branch = Vec::with_capacity(points.len());
            let mut is_current = Vec::with_capacity(points.len());
            let mut source_id = Vec::with_capacity(points.len());
            let mut median = Vec::with_capacity(points.len());
            let mut bci95_low = Vec::with_capacity(points.len());
            let mut bci95_up = Vec::with_capacity(points.len());
            for p in points {
                start_time.push(p.start_time);
                branch.push(p.branch);
                is_current.push(p.is_current);
                source_id.push(p.source_id);
                median.push(p.median);
                bci95_low.push(p.bci95_low);
                bci95_up.push(p.bci95_up);
            }
            Ok(PlotData::BaseAndChange {
                start_time,
                branch,
                is_current,
                source_id,
                median,
                bci95_low,
                bci95_up,
            })
        }
    }
}
