//! Wire payload shapes for benchmark-results ingestion and query.
//!
//! These mirror the external interface described for the ingestion core:
//! clients POST an [`IngestPayload`] per run of a benchmarking harness, and
//! later POST a [`CompletionPayload`] to close out open trials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The criterion name the timeline updater tracks; also interpolated
/// literally into the query that groups measurements by it.
pub const TOTAL_CRITERION: &str = "total";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvPayload {
    #[serde(rename = "hostName")]
    pub host_name: String,
    #[serde(rename = "osType")]
    pub os_type: String,
    pub memory: i64,
    pub cpu: String,
    #[serde(rename = "clockSpeed")]
    pub clock_speed: i64,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "manualRun")]
    pub manual_run: bool,
    pub denoise: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePayload {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(rename = "branchOrTag")]
    pub branch_or_tag: String,
    #[serde(rename = "commitId")]
    pub commit_id: String,
    #[serde(rename = "commitMsg")]
    pub commit_msg: String,
    #[serde(rename = "authorName")]
    pub author_name: String,
    #[serde(rename = "authorEmail")]
    pub author_email: String,
    #[serde(rename = "committerName")]
    pub committer_name: String,
    #[serde(rename = "committerEmail")]
    pub committer_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionSpec {
    pub i: i32,
    pub c: String,
    pub u: String,
}

/// A single (invocation, iteration) tuple's measurements, one value per
/// criterion index named in [`CriterionSpec::i`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementGroup {
    pub r#in: i32,
    pub it: i32,
    pub m: Vec<MeasurementValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementValue {
    pub c: i32,
    pub v: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileGroup {
    pub r#in: i32,
    pub nit: i32,
    pub d: serde_json::Value,
}

/// A run spec exactly as produced by the harness's command-line builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub cmdline: String,
    pub benchmark: String,
    pub suite: String,
    pub executor: String,
    pub location: Option<String>,
    pub cores: Option<i32>,
    #[serde(rename = "varValue")]
    pub var_value: Option<String>,
    #[serde(rename = "inputSize")]
    pub input_size: Option<String>,
    #[serde(rename = "extraArgs")]
    pub extra_args: Option<String>,
    #[serde(rename = "maxInvocationTime")]
    pub max_invocation_time: Option<i32>,
    #[serde(rename = "minIterationTime")]
    pub min_iteration_time: Option<i32>,
    pub warmup: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunGroup {
    #[serde(rename = "runId")]
    pub run_id: RunSpec,
    #[serde(default)]
    pub d: Vec<MeasurementGroup>,
    #[serde(default)]
    pub p: Vec<ProfileGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPayload {
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "experimentName")]
    pub experiment_name: String,
    #[serde(rename = "experimentDesc")]
    pub experiment_desc: Option<String>,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    pub env: EnvPayload,
    pub source: SourcePayload,
    pub criteria: Vec<CriterionSpec>,
    pub data: Vec<RunGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionPayload {
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "experimentName")]
    pub experiment_name: String,
    #[serde(rename = "endTime")]
    pub end_time: DateTime<Utc>,
}

/// Result of `recordAllData`: (measurements recorded, profiles recorded).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct IngestCounts {
    pub measurements_recorded: u64,
    pub profiles_recorded: u64,
}

// ---------------------------------------------------------------------------
// Query surface shapes (§4.H)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceSummary {
    pub source_id: uuid::Uuid,
    pub commit_id: String,
    pub commit_msg: String,
    pub branch_or_tag: String,
    pub author_name: String,
    pub committer_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionComparison {
    pub exists: bool,
    pub base: Option<SourceSummary>,
    pub change: Option<SourceSummary>,
}

/// A timeline comparison request (§4.H): a (run, criterion) pair plus the
/// base commit and an optional change commit to overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineRequest {
    pub run_id: uuid::Uuid,
    pub criterion_id: uuid::Uuid,
    pub base_commit_id: String,
    pub change_commit_id: Option<String>,
}

/// Columnar plot data for a timeline request. 4 columns when only the
/// baseline branch was requested, 7 when both base and change were.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlotData {
    BaselineOnly {
        start_time: Vec<DateTime<Utc>>,
        median: Vec<f64>,
        bci95_low: Vec<f64>,
        bci95_up: Vec<f64>,
    },
    BaseAndChange {
        start_time: Vec<DateTime<Utc>>,
        branch: Vec<String>,
        is_current: Vec<bool>,
        source_id: Vec<uuid::Uuid>,
        median: Vec<f64>,
        bci95_low: Vec<f64>,
        bci95_up: Vec<f64>,
    },
}
