//! # Scoped Catalog
//!
//! A hierarchical work-item catalog with an organization-wide base catalog and
//! per-project overrides, running on PostgreSQL through `may_postgres` (or in
//! memory).
//!
//! - Dotted codes (`CIVIL.CONCRETE.FOOTING`) up to five levels deep, unique per
//!   `(org, project)` scope
//! - Union resolution: project nodes override base nodes with the same code
//! - Missing ancestors are created on demand
//! - Cycle-safe moves, leaf-only deletes
//! - Base -> project clone with `overwrite_all`, `fill_missing` and
//!   `skip_existing` policies, with a dry-run preview that predicts the
//!   execute exactly
//!
//! ```
//! use scoped_catalog::{CatalogEngine, ConflictPolicy, InMemoryCatalogStore, NodeInput, Scope};
//!
//! # fn main() -> Result<(), scoped_catalog::CatalogError> {
//! let engine = CatalogEngine::new(InMemoryCatalogStore::new());
//! let org = uuid::Uuid::new_v4();
//! let project = uuid::Uuid::new_v4();
//!
//! let civil = engine.create(None, NodeInput::new(Scope::org(org), "CIVIL", "Civil works"))?;
//! engine.create(Some(civil.id), NodeInput::new(Scope::org(org), "CIVIL.CONCRETE", "Concrete"))?;
//!
//! let preview = engine.preview_clone(civil.id, project, true, ConflictPolicy::SkipExisting)?;
//! let outcome = engine.execute_clone(civil.id, project, true, ConflictPolicy::SkipExisting)?;
//! assert_eq!(preview.to_create.len(), outcome.counts.created);
//! # Ok(())
//! # }
//! ```

pub mod code;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod executor;
pub mod import;
pub mod metrics;
pub mod migration;
pub mod model;
pub mod query;
pub mod store;
pub mod transaction;
pub mod tree;

pub use config::{CatalogConfig, CatalogSettings, DatabaseConfig};
pub use connection::{
    check_connection_health, connect, connect_with, validate_connection_string, ConnectionError,
};
pub use engine::{
    BatchOutcome, CatalogEngine, ConflictPolicy, DiffReport, ItemOutcome, OutcomeCounts,
    OutcomeKind, PlannedUpdate,
};
pub use error::CatalogError;
pub use executor::{MayPostgresExecutor, SqlExecutor};
pub use import::{read_csv_rows, write_csv_rows, ImportRow};
pub use model::{
    CatalogNode, NewNode, NodeId, NodeInput, NodePatch, NodeUpdate, OrgId, ProjectId, Scope,
};
pub use store::{CatalogStore, InMemoryCatalogStore, PgCatalogStore, StoreError};
pub use transaction::{IsolationLevel, Transaction, TransactionError};
pub use tree::{build_tree, collect_descendants, TreeNode};

#[cfg(feature = "metrics")]
pub use metrics::CATALOG_METRICS;
