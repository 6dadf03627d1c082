//! Migrator - applies registered migrations in version order

use super::catalog_nodes::CreateCatalogNodes;
use super::state_table::initialize_state_table;
use super::{Migration, MigrationError, SchemaManager};
use crate::executor::SqlExecutor;
use crate::store::StoreError;
use std::collections::BTreeMap;
use std::time::Instant;

/// A row of `catalog_schema_migrations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
}

/// Applies a fixed set of in-process migrations.
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    /// # Errors
    ///
    /// `DuplicateVersion` when two migrations share a version.
    pub fn new(mut migrations: Vec<Box<dyn Migration>>) -> Result<Self, MigrationError> {
        migrations.sort_by_key(|m| m.version());
        if let Some(pair) = migrations.windows(2).find(|w| w[0].version() == w[1].version()) {
            return Err(MigrationError::DuplicateVersion(pair[0].version()));
        }
        Ok(Self { migrations })
    }

    /// Every migration the catalog schema needs.
    pub fn catalog() -> Self {
        Self {
            migrations: vec![Box::new(CreateCatalogNodes)],
        }
    }

    pub fn migrations(&self) -> impl Iterator<Item = &dyn Migration> {
        self.migrations.iter().map(|m| m.as_ref())
    }

    /// Rows of the state table, oldest first.
    pub fn applied(
        &self,
        executor: &dyn SqlExecutor,
    ) -> Result<Vec<AppliedMigration>, MigrationError> {
        initialize_state_table(executor)?;
        let rows = executor.query_all(
            "SELECT version, name FROM catalog_schema_migrations ORDER BY version",
            &[],
        )?;
        rows.iter()
            .map(|row| -> Result<AppliedMigration, MigrationError> {
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| {
                        StoreError::ParseError(format!("Failed to read column `version`: {e}"))
                    })?;
                let name: String = row
                    .try_get("name")
                    .map_err(|e| {
                        StoreError::ParseError(format!("Failed to read column `name`: {e}"))
                    })?;
                Ok(AppliedMigration { version, name })
            })
            .collect()
    }

    /// Registered migrations not yet in the state table.
    pub fn pending(
        &self,
        executor: &dyn SqlExecutor,
    ) -> Result<Vec<&dyn Migration>, MigrationError> {
        let applied = self.applied_by_version(executor)?;
        Ok(self
            .migrations()
            .filter(|m| !applied.contains_key(&m.version()))
            .collect())
    }

    /// Apply every pending migration, oldest first. Returns what was applied.
    pub fn up(&self, executor: &dyn SqlExecutor) -> Result<Vec<AppliedMigration>, MigrationError> {
        let manager = SchemaManager::new(executor);
        let mut applied = Vec::new();

        for migration in self.pending(executor)? {
            let started = Instant::now();
            migration
                .up(&manager)
                .map_err(|e| execution_failed(migration, e))?;
            let elapsed_ms = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

            let version = migration.version();
            let name = migration.name().to_string();
            executor.execute(
                "INSERT INTO catalog_schema_migrations (version, name, execution_time_ms) \
                 VALUES ($1, $2, $3)",
                &[&version, &name, &elapsed_ms],
            )?;
            log::info!("Applied migration {} ({}) in {}ms", name, version, elapsed_ms);
            applied.push(AppliedMigration { version, name });
        }

        Ok(applied)
    }

    /// Roll back the most recently applied migration, if any.
    pub fn down_last(
        &self,
        executor: &dyn SqlExecutor,
    ) -> Result<Option<AppliedMigration>, MigrationError> {
        let applied = self.applied_by_version(executor)?;
        let Some((&version, name)) = applied.iter().next_back() else {
            return Ok(None);
        };
        let migration = self
            .migrations()
            .find(|m| m.version() == version)
            .ok_or_else(|| MigrationError::UnknownApplied {
                version,
                name: name.clone(),
            })?;

        migration
            .down(&SchemaManager::new(executor))
            .map_err(|e| execution_failed(migration, e))?;
        executor.execute(
            "DELETE FROM catalog_schema_migrations WHERE version = $1",
            &[&version],
        )?;
        log::info!("Rolled back migration {} ({})", name, version);

        Ok(Some(AppliedMigration {
            version,
            name: name.clone(),
        }))
    }

    fn applied_by_version(
        &self,
        executor: &dyn SqlExecutor,
    ) -> Result<BTreeMap<i64, String>, MigrationError> {
        let applied = self.applied(executor)?;
        for record in &applied {
            if !self.migrations.iter().any(|m| m.version() == record.version) {
                return Err(MigrationError::UnknownApplied {
                    version: record.version,
                    name: record.name.clone(),
                });
            }
        }
        Ok(applied.into_iter().map(|r| (r.version, r.name)).collect())
    }
}

fn execution_failed(migration: &dyn Migration, error: StoreError) -> MigrationError {
    MigrationError::ExecutionFailed {
        version: migration.version(),
        name: migration.name().to_string(),
        error: error.to_string(),
    }
}
