//! Migration state table management

use crate::executor::SqlExecutor;
use crate::store::StoreError;

pub const STATE_TABLE: &str = "catalog_schema_migrations";

/// Create `catalog_schema_migrations` if it does not exist.
pub fn initialize_state_table(executor: &dyn SqlExecutor) -> Result<(), StoreError> {
    let sql = r#"
        CREATE TABLE IF NOT EXISTS catalog_schema_migrations (
            version BIGINT PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            execution_time_ms INTEGER
        )
    "#;
    executor.execute(sql, &[])?;
    Ok(())
}
