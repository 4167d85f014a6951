//! Interning of each metadata entity (§3/§4.C) against Postgres, via
//! `InterningCache::record_cached`. One `record_*` function per entity,
//! each pairing a `select` fetch with an `insert` that generates its own
//! `Uuid::new_v4()` id and binds every column explicitly rather than
//! relying on a server-side default.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use bench_cache::InterningCache;

use crate::entities::{Criterion, Environment, Experiment, NamedEntity, Project, Run, Source, Trial};
use crate::unique::is_unique_violation;

/// Every metadata interning cache, bundled as fields of one long-lived
/// object per §9's "Global mutable state" note — never ambient statics.
#[derive(Default)]
pub struct MetadataCaches {
    pub projects: InterningCache<String, Project>,
    pub experiments: InterningCache<(Uuid, String), Experiment>,
    pub sources: InterningCache<String, Source>,
    pub environments: InterningCache<String, Environment>,
    pub trials: InterningCache<(String, Uuid, DateTime<Utc>, Uuid), Trial>,
    pub executors: InterningCache<String, NamedEntity>,
    pub suites: InterningCache<String, NamedEntity>,
    pub benchmarks: InterningCache<String, NamedEntity>,
    pub runs: InterningCache<String, Run>,
    pub units: InterningCache<String, NamedEntity>,
    pub criteria: InterningCache<(String, Uuid), Criterion>,
}

async fn record_named_entity(
    pool: &PgPool,
    cache: &InterningCache<String, NamedEntity>,
    select_sql: &'static str,
    insert_sql: &'static str,
    constraint: &'static str,
    name: &str,
) -> std::result::Result<NamedEntity, sqlx::Error> {
    cache
        .record_cached(
            name.to_string(),
            || async {
                let row = sqlx::query_as::<_, (Uuid, String)>(select_sql)
                    .bind(name)
                    .fetch_optional(pool)
                    .await?;
                Ok(row.map(|(id, name)| NamedEntity { id, name }))
            },
            || async {
                let id = Uuid::new_v4();
                sqlx::query(insert_sql)
                    .bind(id)
                    .bind(name)
                    .execute(pool)
                    .await?;
                Ok(())
            },
            |e| is_unique_violation(e, constraint),
        )
        .await
}

pub async fn record_executor(
    pool: &PgPool,
    cache: &InterningCache<String, NamedEntity>,
    name: &str,
) -> Result<NamedEntity> {
    record_named_entity(
        pool,
        cache,
        "select executor_id as id, name from executors where name = $1",
        "insert into executors (executor_id, name) values ($1, $2)",
        "executors_name_key",
        name,
    )
    .await
    .with_context(|| format!("record_executor({name}) failed"))
}

pub async fn record_suite(
    pool: &PgPool,
    cache: &InterningCache<String, NamedEntity>,
    name: &str,
) -> Result<NamedEntity> {
    record_named_entity(
        pool,
        cache,
        "select suite_id as id, name from suites where name = $1",
        "insert into suites (suite_id, name) values ($1, $2)",
        "suites_name_key",
        name,
    )
    .await
    .with_context(|| format!("record_suite({name}) failed"))
}

pub async fn record_benchmark(
    pool: &PgPool,
    cache: &InterningCache<String, NamedEntity>,
    name: &str,
) -> Result<NamedEntity> {
    record_named_entity(
        pool,
        cache,
        "select benchmark_id as id, name from benchmarks where name = $1",
        "insert into benchmarks (benchmark_id, name) values ($1, $2)",
        "benchmarks_name_key",
        name,
    )
    .await
    .with_context(|| format!("record_benchmark({name}) failed"))
}

pub async fn record_unit(
    pool: &PgPool,
    cache: &InterningCache<String, NamedEntity>,
    name: &str,
) -> Result<NamedEntity> {
    record_named_entity(
        pool,
        cache,
        "select unit_id as id, name from units where name = $1",
        "insert into units (unit_id, name) values ($1, $2)",
        "units_name_key",
        name,
    )
    .await
    .with_context(|| format!("record_unit({name}) failed"))
}

pub async fn record_project(
    pool: &PgPool,
    cache: &InterningCache<String, Project>,
    name: &str,
    slug: &str,
    base_branch: Option<&str>,
) -> Result<Project> {
    cache
        .record_cached(
            name.to_string(),
            || async {
                let row = sqlx::query_as::<_, (Uuid, String, String, Option<String>)>(
                    "select project_id, name, slug, base_branch from projects where name = $1",
                )
                .bind(name)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(|(project_id, name, slug, base_branch)| Project {
                    project_id,
                    name,
                    slug,
                    base_branch,
                }))
            },
            || async {
                let project_id = Uuid::new_v4();
                sqlx::query(
                    "insert into projects (project_id, name, slug, base_branch) values ($1, $2, $3, $4)",
                )
                .bind(project_id)
                .bind(name)
                .bind(slug)
                .bind(base_branch)
                .execute(pool)
                .await?;
                Ok(())
            },
            |e| is_unique_violation(e, "projects_name_key"),
        )
        .await
        .with_context(|| format!("record_project({name}) failed"))
}

pub async fn record_experiment(
    pool: &PgPool,
    cache: &InterningCache<(Uuid, String), Experiment>,
    project_id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<Experiment> {
    cache
        .record_cached(
            (project_id, name.to_string()),
            || async {
                let row = sqlx::query_as::<_, (Uuid, Uuid, String, Option<String>)>(
                    "select experiment_id, project_id, name, description from experiments where project_id = $1 and name = $2",
                )
                .bind(project_id)
                .bind(name)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(|(experiment_id, project_id, name, description)| Experiment {
                    experiment_id,
                    project_id,
                    name,
                    description,
                }))
            },
            || async {
                let experiment_id = Uuid::new_v4();
                sqlx::query(
                    "insert into experiments (experiment_id, project_id, name, description) values ($1, $2, $3, $4)",
                )
                .bind(experiment_id)
                .bind(project_id)
                .bind(name)
                .bind(description)
                .execute(pool)
                .await?;
                Ok(())
            },
            |e| is_unique_violation(e, "experiments_project_id_name_key"),
        )
        .await
        .with_context(|| format!("record_experiment({project_id}, {name}) failed"))
}

#[allow(clippy::too_many_arguments)]
pub async fn record_source(
    pool: &PgPool,
    cache: &InterningCache<String, Source>,
    repo_url: &str,
    branch_or_tag: &str,
    commit_id: &str,
    commit_message: &str,
    author_name: &str,
    author_email: &str,
    committer_name: &str,
    committer_email: &str,
) -> Result<Source> {
    cache
        .record_cached(
            commit_id.to_string(),
            || async {
                let row = sqlx::query_as::<_, (Uuid, String, String, String, String, String, String, String, String)>(
                    r#"select source_id, repo_url, branch_or_tag, commit_id, commit_message,
                              author_name, author_email, committer_name, committer_email
                       from sources where commit_id = $1"#,
                )
                .bind(commit_id)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(
                    |(source_id, repo_url, branch_or_tag, commit_id, commit_message, author_name, author_email, committer_name, committer_email)| Source {
                        source_id,
                        repo_url,
                        branch_or_tag,
                        commit_id,
                        commit_message,
                        author_name,
                        author_email,
                        committer_name,
                        committer_email,
                    },
                ))
            },
            || async {
                let source_id = Uuid::new_v4();
                sqlx::query(
                    r#"insert into sources
                       (source_id, repo_url, branch_or_tag, commit_id, commit_message,
                        author_name, author_email, committer_name, committer_email)
                       values ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
                )
                .bind(source_id)
                .bind(repo_url)
                .bind(branch_or_tag)
                .bind(commit_id)
                .bind(commit_message)
                .bind(author_name)
                .bind(author_email)
                .bind(committer_name)
                .bind(committer_email)
                .execute(pool)
                .await?;
                Ok(())
            },
            |e| is_unique_violation(e, "sources_commit_id_key"),
        )
        .await
        .with_context(|| format!("record_source({commit_id}) failed"))
}

pub async fn record_environment(
    pool: &PgPool,
    cache: &InterningCache<String, Environment>,
    host_name: &str,
    os_type: &str,
    memory: i64,
    cpu: &str,
    clock_speed: i64,
) -> Result<Environment> {
    cache
        .record_cached(
            host_name.to_string(),
            || async {
                let row = sqlx::query_as::<_, (Uuid, String, String, i64, String, i64)>(
                    "select environment_id, host_name, os_type, memory, cpu, clock_speed from environments where host_name = $1",
                )
                .bind(host_name)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(|(environment_id, host_name, os_type, memory, cpu, clock_speed)| Environment {
                    environment_id,
                    host_name,
                    os_type,
                    memory,
                    cpu,
                    clock_speed,
                }))
            },
            || async {
                let environment_id = Uuid::new_v4();
                sqlx::query(
                    "insert into environments (environment_id, host_name, os_type, memory, cpu, clock_speed) values ($1, $2, $3, $4, $5, $6)",
                )
                .bind(environment_id)
                .bind(host_name)
                .bind(os_type)
                .bind(memory)
                .bind(cpu)
                .bind(clock_speed)
                .execute(pool)
                .await?;
                Ok(())
            },
            |e| is_unique_violation(e, "environments_host_name_key"),
        )
        .await
        .with_context(|| format!("record_environment({host_name}) failed"))
}

#[allow(clippy::too_many_arguments)]
pub async fn record_trial(
    pool: &PgPool,
    cache: &InterningCache<(String, Uuid, DateTime<Utc>, Uuid), Trial>,
    user_name: &str,
    environment_id: Uuid,
    start_time: DateTime<Utc>,
    experiment_id: Uuid,
    source_id: Uuid,
    denoise: Option<&str>,
) -> Result<Trial> {
    cache
        .record_cached(
            (user_name.to_string(), environment_id, start_time, experiment_id),
            || async {
                let row = sqlx::query_as::<_, (Uuid, String, Uuid, DateTime<Utc>, Uuid, Uuid, Option<String>, Option<DateTime<Utc>>)>(
                    r#"select trial_id, user_name, environment_id, start_time, experiment_id, source_id, denoise, end_time
                       from trials
                       where user_name = $1 and environment_id = $2 and start_time = $3 and experiment_id = $4"#,
                )
                .bind(user_name)
                .bind(environment_id)
                .bind(start_time)
                .bind(experiment_id)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(
                    |(trial_id, user_name, environment_id, start_time, experiment_id, source_id, denoise, end_time)| Trial {
                        trial_id,
                        user_name,
                        environment_id,
                        start_time,
                        experiment_id,
                        source_id,
                        denoise,
                        end_time,
                    },
                ))
            },
            || async {
                let trial_id = Uuid::new_v4();
                sqlx::query(
                    r#"insert into trials
                       (trial_id, user_name, environment_id, start_time, experiment_id, source_id, denoise)
                       values ($1, $2, $3, $4, $5, $6, $7)"#,
                )
                .bind(trial_id)
                .bind(user_name)
                .bind(environment_id)
                .bind(start_time)
                .bind(experiment_id)
                .bind(source_id)
                .bind(denoise)
                .execute(pool)
                .await?;
                Ok(())
            },
            |e| is_unique_violation(e, "trials_user_name_environment_id_start_time_experiment_id_key"),
        )
        .await
        .with_context(|| format!("record_trial({user_name}, {experiment_id}) failed"))
}

#[allow(clippy::too_many_arguments)]
pub async fn record_run(
    pool: &PgPool,
    cache: &InterningCache<String, Run>,
    cmdline: &str,
    benchmark_id: Uuid,
    suite_id: Uuid,
    executor_id: Uuid,
    location: Option<&str>,
    cores: Option<i32>,
    var_value: Option<&str>,
    input_size: Option<&str>,
    extra_args: Option<&str>,
    max_invocation_time: Option<i32>,
    min_iteration_time: Option<i32>,
    warmup: Option<i32>,
) -> Result<Run> {
    cache
        .record_cached(
            cmdline.to_string(),
            || async {
                #[allow(clippy::type_complexity)]
                let row = sqlx::query_as::<_, (
                    Uuid, String, Uuid, Uuid, Uuid, Option<String>, Option<i32>,
                    Option<String>, Option<String>, Option<String>, Option<i32>, Option<i32>, Option<i32>,
                )>(
                    r#"select run_id, cmdline, benchmark_id, suite_id, executor_id, location, cores,
                              var_value, input_size, extra_args, max_invocation_time, min_iteration_time, warmup
                       from runs where cmdline = $1"#,
                )
                .bind(cmdline)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(|(run_id, cmdline, benchmark_id, suite_id, executor_id, location, cores, var_value, input_size, extra_args, max_invocation_time, min_iteration_time, warmup)| Run {
                    run_id,
                    cmdline,
                    benchmark_id,
                    suite_id,
                    executor_id,
                    location,
                    cores,
                    var_value,
                    input_size,
                    extra_args,
                    max_invocation_time,
                    min_iteration_time,
                    warmup,
                }))
            },
            || async {
                let run_id = Uuid::new_v4();
                sqlx::query(
                    r#"insert into runs
                       (run_id, cmdline, benchmark_id, suite_id, executor_id, location, cores,
                        var_value, input_size, extra_args, max_invocation_time, min_iteration_time, warmup)
                       values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
                )
                .bind(run_id)
                .bind(cmdline)
                .bind(benchmark_id)
                .bind(suite_id)
                .bind(executor_id)
                .bind(location)
                .bind(cores)
                .bind(var_value)
                .bind(input_size)
                .bind(extra_args)
                .bind(max_invocation_time)
                .bind(min_iteration_time)
                .bind(warmup)
                .execute(pool)
                .await?;
                Ok(())
            },
            |e| is_unique_violation(e, "runs_cmdline_key"),
        )
        .await
        .with_context(|| format!("record_run({cmdline}) failed"))
}

pub async fn record_criterion(
    pool: &PgPool,
    cache: &InterningCache<(String, Uuid), Criterion>,
    name: &str,
    unit_id: Uuid,
) -> Result<Criterion> {
    cache
        .record_cached(
            (name.to_string(), unit_id),
            || async {
                let row = sqlx::query_as::<_, (Uuid, String, Uuid)>(
                    "select criterion_id, name, unit_id from criteria where name = $1 and unit_id = $2",
                )
                .bind(name)
                .bind(unit_id)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(|(criterion_id, name, unit_id)| Criterion {
                    criterion_id,
                    name,
                    unit_id,
                }))
            },
            || async {
                let criterion_id = Uuid::new_v4();
                sqlx::query("insert into criteria (criterion_id, name, unit_id) values ($1, $2, $3)")
                    .bind(criterion_id)
                    .bind(name)
                    .bind(unit_id)
                    .execute(pool)
                    .await?;
                Ok(())
            },
            |e| is_unique_violation(e, "criteria_name_unit_id_key"),
        )
        .await
        .with_context(|| format!("record_criterion({name}, {unit_id}) failed"))
}
