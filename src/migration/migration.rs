//! Migration trait definition

use super::schema_manager::SchemaManager;
use crate::store::StoreError;

/// Trait that all migrations must implement
///
/// Migrations are synchronous: the executor parks the calling coroutine
/// while PostgreSQL works.
pub trait Migration: Send + Sync {
    /// Human-readable identifier
    fn name(&self) -> &str;

    /// Version (timestamp: YYYYMMDDHHMMSS); migrations apply in ascending order
    fn version(&self) -> i64;

    /// Apply the migration
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError>;

    /// Undo the migration
    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError>;
}
