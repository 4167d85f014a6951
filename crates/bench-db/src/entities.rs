//! Materialized rows for each metadata entity in the data model (§3).

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub project_id: Uuid,
    pub name: String,
    pub slug: String,
    pub base_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub experiment_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub source_id: Uuid,
    pub repo_url: String,
    pub branch_or_tag: String,
    pub commit_id: String,
    pub commit_message: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub environment_id: Uuid,
    pub host_name: String,
    pub os_type: String,
    pub memory: i64,
    pub cpu: String,
    pub clock_speed: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub trial_id: Uuid,
    pub user_name: String,
    pub environment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub experiment_id: Uuid,
    pub source_id: Uuid,
    pub denoise: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Materialized row shared by the Executor/Suite/Benchmark/Unit tables —
/// each is just an id unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedEntity {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub run_id: Uuid,
    pub cmdline: String,
    pub benchmark_id: Uuid,
    pub suite_id: Uuid,
    pub executor_id: Uuid,
    pub location: Option<String>,
    pub cores: Option<i32>,
    pub var_value: Option<String>,
    pub input_size: Option<String>,
    pub extra_args: Option<String>,
    pub max_invocation_time: Option<i32>,
    pub min_iteration_time: Option<i32>,
    pub warmup: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Criterion {
    pub criterion_id: Uuid,
    pub name: String,
    pub unit_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub run_id: Uuid,
    pub trial_id: Uuid,
    pub criterion_id: Uuid,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
    pub mean: f64,
    pub median: f64,
    pub num_samples: i64,
    pub bci95_low: f64,
    pub bci95_up: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineCalcJobKey {
    pub trial_id: Uuid,
    pub run_id: Uuid,
    pub criterion_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub profile_id: i64,
    pub run_id: Uuid,
    pub trial_id: Uuid,
    pub invocation: i32,
    pub num_iterations: i32,
    pub value: Value,
}
