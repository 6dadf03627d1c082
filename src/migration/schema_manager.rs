//! SchemaManager - schema operations available to migrations

use crate::executor::SqlExecutor;
use crate::store::StoreError;
use may_postgres::types::ToSql;
use sea_query::{
    IndexCreateStatement, IndexDropStatement, PostgresQueryBuilder, TableCreateStatement,
    TableDropStatement,
};

/// Wraps a [`SqlExecutor`] with helpers for DDL.
pub struct SchemaManager<'a> {
    executor: &'a dyn SqlExecutor,
}

impl<'a> SchemaManager<'a> {
    pub fn new(executor: &'a dyn SqlExecutor) -> Self {
        Self { executor }
    }

    pub fn create_table(&self, table: TableCreateStatement) -> Result<(), StoreError> {
        let sql = table.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    pub fn drop_table(&self, table: TableDropStatement) -> Result<(), StoreError> {
        let sql = table.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    pub fn create_index(&self, index: IndexCreateStatement) -> Result<(), StoreError> {
        let sql = index.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    pub fn drop_index(&self, index: IndexDropStatement) -> Result<(), StoreError> {
        let sql = index.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Execute raw SQL, for DDL sea-query cannot express (expression indexes,
    /// check constraints).
    ///
    /// # Example
    /// ```rust,no_run
    /// # use scoped_catalog::migration::SchemaManager;
    /// # fn run(manager: &SchemaManager<'_>) -> Result<(), scoped_catalog::StoreError> {
    /// manager.execute("CREATE EXTENSION IF NOT EXISTS pgcrypto", &[])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<(), StoreError> {
        self.executor.execute(sql, params).map(|_| ())
    }

    pub fn executor(&self) -> &dyn SqlExecutor {
        self.executor
    }
}
