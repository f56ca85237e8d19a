//! Dependency-ordered migration plan
//!
//! Later entities resolve foreign keys through identifier map entries written
//! by earlier ones, so stages must run parents first. The order is derived
//! from each migration's declared dependencies with a topological sort.

use crate::driver::{MigrationRunner, RunError};
use crate::report::RunSummary;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use pmig_core::DynMigration;
use std::collections::HashMap;

/// Plan construction failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Two migrations claim the same entity
    #[error("entity `{0}` is registered twice")]
    DuplicateEntity(String),

    /// A migration depends on an entity nobody migrates
    #[error("`{entity}` depends on unknown entity `{dependency}`")]
    UnknownDependency {
        /// Entity declaring the dependency
        entity: String,
        /// Entity it depends on
        dependency: String,
    },

    /// Dependencies form a cycle
    #[error("dependency cycle through `{0}`")]
    Cycle(String),

    /// Requested entity is not part of the plan
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
}

/// Migrations in the order they must run
pub struct MigrationPlan {
    stages: Vec<Box<dyn DynMigration>>,
    index: HashMap<&'static str, usize>,
}

impl MigrationPlan {
    /// Order `migrations` so every entity runs after its dependencies
    ///
    /// The order is deterministic for a given registration order.
    ///
    /// # Errors
    /// - [`PlanError::DuplicateEntity`], [`PlanError::UnknownDependency`] or
    ///   [`PlanError::Cycle`]
    pub fn new(migrations: Vec<Box<dyn DynMigration>>) -> Result<Self, PlanError> {
        let mut graph: DiGraphMap<&'static str, ()> = DiGraphMap::new();
        let mut names = Vec::with_capacity(migrations.len());
        let mut by_name: HashMap<&'static str, Box<dyn DynMigration>> = HashMap::new();

        for migration in migrations {
            let name = migration.entity_name();
            if by_name.contains_key(name) {
                return Err(PlanError::DuplicateEntity(name.to_string()));
            }
            graph.add_node(name);
            names.push(name);
            by_name.insert(name, migration);
        }

        for &name in &names {
            for &dependency in by_name[name].dependency_names() {
                if dependency == name {
                    return Err(PlanError::Cycle(name.to_string()));
                }
                if !by_name.contains_key(dependency) {
                    return Err(PlanError::UnknownDependency {
                        entity: name.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
                graph.add_edge(dependency, name, ());
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| PlanError::Cycle(cycle.node_id().to_string()))?;

        let mut stages = Vec::with_capacity(order.len());
        let mut index = HashMap::with_capacity(order.len());
        for name in order {
            if let Some(migration) = by_name.remove(name) {
                index.insert(name, stages.len());
                stages.push(migration);
            }
        }

        Ok(Self { stages, index })
    }

    /// Entity names in run order
    #[must_use]
    pub fn order(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.entity_name()).collect()
    }

    /// Migration for `entity`
    ///
    /// # Errors
    /// - [`PlanError::UnknownEntity`] if not in the plan
    pub fn get(&self, entity: &str) -> Result<&dyn DynMigration, PlanError> {
        self.index
            .get(entity)
            .map(|&i| self.stages[i].as_ref())
            .ok_or_else(|| PlanError::UnknownEntity(entity.to_string()))
    }

    /// Stages in run order
    pub fn iter(&self) -> impl Iterator<Item = &dyn DynMigration> {
        self.stages.iter().map(AsRef::as_ref)
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the plan has no stages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order with one runner
    ///
    /// Stops at the first stage that fails; its error (with the partial
    /// summary) is returned in the report.
    pub async fn run_all(&self, runner: &mut MigrationRunner<'_>) -> PlanReport {
        let mut report = PlanReport::default();
        for migration in self.iter() {
            match runner.run(migration).await {
                Ok(summary) => report.stages.push(summary),
                Err(e) => {
                    tracing::error!(entity = migration.entity_name(), error = %e, "plan stopped");
                    report.failure = Some(e);
                    break;
                }
            }
        }
        report
    }
}

/// Outcome of running a whole plan
#[derive(Debug, Default)]
pub struct PlanReport {
    /// Summaries of completed stages, in order
    pub stages: Vec<RunSummary>,
    /// Error of the stage that stopped the plan, if any
    pub failure: Option<RunError>,
}

impl PlanReport {
    /// Whether every stage completed
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Render every stage summary, including the failed stage's partial one
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut text: String = self
            .stages
            .iter()
            .map(RunSummary::generate_text)
            .collect::<Vec<_>>()
            .join("\n");
        if let Some(failure) = &self.failure {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&failure.summary().generate_text());
            text.push_str(&format!("\nPlan stopped: {failure}\n"));
        }
        text
    }
}
