//! Subcommand execution

use crate::cli::{Action, Invocation};
use crate::config::MigrationConfig;
use anyhow::Context;
use pmig_core::{IdentifierMap, RecordSink};
use pmig_pipeline::{MigrationPlan, MigrationRunner, PlanReport, RunError, RunSummary};
use pmig_store::{InMemoryIdMap, InMemorySink, JsonlCatalog, JsonlIdMap, JsonlSink};
use serde::Serialize;
use std::io::Write;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Finished; skips and tolerated write errors allowed
    Completed,
    /// An unrecoverable error stopped the run
    Failed,
    /// Bad configuration or arguments
    Usage,
}

impl ExitStatus {
    /// Numeric exit code
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Failed => 1,
            Self::Usage => 2,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    stages: Vec<&'a RunSummary>,
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonPlanStage<'a> {
    entity: &'a str,
    depends_on: &'a [&'a str],
}

/// Run one invocation, writing the summary to `out`
///
/// # Errors
/// - if the stores cannot be opened or `out` cannot be written
pub async fn execute(
    inv: &Invocation,
    config: &MigrationConfig,
    out: &mut dyn Write,
) -> anyhow::Result<ExitStatus> {
    let plan = MigrationPlan::new(pmig_petlicense::registry())?;

    match &inv.action {
        Action::Plan => {
            print_plan(&plan, inv.json, out)?;
            Ok(ExitStatus::Completed)
        }
        Action::Migrate { entity } => {
            let migration = match plan.get(entity) {
                Ok(migration) => migration,
                Err(e) => {
                    eprintln!("error: {e} (known: {})", plan.order().join(", "));
                    return Ok(ExitStatus::Usage);
                }
            };

            let catalog = JsonlCatalog::new(&config.source.dir);
            let (mut sink, mut id_map) = open_stores(config, inv.preview).await?;
            let options = inv.run_options(config.run.batch_size);
            let mut runner = MigrationRunner::new(&catalog, sink.as_mut(), id_map.as_mut(), options);

            let report = match runner.run(migration).await {
                Ok(summary) => PlanReport {
                    stages: vec![summary],
                    failure: None,
                },
                Err(e) => PlanReport {
                    stages: Vec::new(),
                    failure: Some(e),
                },
            };
            print_report(&report, inv.json, out)
        }
        Action::RunAll => {
            let catalog = JsonlCatalog::new(&config.source.dir);
            let (mut sink, mut id_map) = open_stores(config, inv.preview).await?;
            let options = inv.run_options(config.run.batch_size);
            let mut runner = MigrationRunner::new(&catalog, sink.as_mut(), id_map.as_mut(), options);

            let report = plan.run_all(&mut runner).await;
            print_report(&report, inv.json, out)
        }
    }
}

/// Sink and identifier map for a run
///
/// A preview never touches the target directory, and reads the identifier
/// map only if it already exists.
async fn open_stores(
    config: &MigrationConfig,
    preview: bool,
) -> anyhow::Result<(Box<dyn RecordSink>, Box<dyn IdentifierMap>)> {
    if preview {
        let id_map: Box<dyn IdentifierMap> = if config.state.id_map.exists() {
            Box::new(open_id_map(config).await?)
        } else {
            Box::new(InMemoryIdMap::new())
        };
        return Ok((Box::new(InMemorySink::new()), id_map));
    }

    let sink = JsonlSink::open(&config.target.dir)
        .await
        .with_context(|| format!("opening target directory {}", config.target.dir.display()))?;
    Ok((Box::new(sink), Box::new(open_id_map(config).await?)))
}

async fn open_id_map(config: &MigrationConfig) -> anyhow::Result<JsonlIdMap> {
    JsonlIdMap::open(&config.state.id_map)
        .await
        .with_context(|| format!("opening identifier map {}", config.state.id_map.display()))
}

fn print_report(report: &PlanReport, json: bool, out: &mut dyn Write) -> anyhow::Result<ExitStatus> {
    if json {
        let mut stages: Vec<&RunSummary> = report.stages.iter().collect();
        if let Some(failure) = &report.failure {
            stages.push(failure.summary());
        }
        let body = JsonReport {
            stages,
            error: report.failure.as_ref().map(ToString::to_string),
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    } else {
        write!(out, "{}", report.generate_text())?;
    }

    Ok(match &report.failure {
        None => ExitStatus::Completed,
        Some(failure) => {
            eprintln!("error: {}", describe(failure));
            ExitStatus::Failed
        }
    })
}

fn describe(failure: &RunError) -> String {
    match failure {
        RunError::Aborted { .. } => {
            format!("{failure} (rerun with --fault-tolerant to report failed writes and continue)")
        }
        _ => failure.to_string(),
    }
}

fn print_plan(plan: &MigrationPlan, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    if json {
        let stages: Vec<JsonPlanStage<'_>> = plan
            .iter()
            .map(|m| JsonPlanStage {
                entity: m.entity_name(),
                depends_on: m.dependency_names(),
            })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&stages)?)?;
        return Ok(());
    }

    writeln!(out, "Migration order:")?;
    for (i, m) in plan.iter().enumerate() {
        let deps = m.dependency_names();
        if deps.is_empty() {
            writeln!(out, "  {}. {}", i + 1, m.entity_name())?;
        } else {
            writeln!(out, "  {}. {} (after {})", i + 1, m.entity_name(), deps.join(", "))?;
        }
    }
    Ok(())
}
