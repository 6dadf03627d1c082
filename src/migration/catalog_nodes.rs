//! Migration: create `catalog_nodes`
//! Version: 20250101000000

use super::{Migration, SchemaManager};
use crate::query::Ident;
use crate::store::postgres::TABLE;
use crate::store::StoreError;
use sea_query::{Index, Table};

pub struct CreateCatalogNodes;

impl Migration for CreateCatalogNodes {
    fn name(&self) -> &str {
        "create_catalog_nodes"
    }

    fn version(&self) -> i64 {
        20250101000000
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
        // A parent cannot be deleted while it has children; no cascades.
        manager.execute(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_nodes (
                id UUID PRIMARY KEY,
                org_id UUID NOT NULL,
                project_id UUID,
                parent_id UUID REFERENCES catalog_nodes(id) ON DELETE RESTRICT,
                code VARCHAR(255) NOT NULL,
                name VARCHAR(255) NOT NULL,
                name_ar VARCHAR(255),
                description TEXT,
                unit_of_measure VARCHAR(50),
                is_active BOOLEAN NOT NULL DEFAULT true,
                position INTEGER,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT chk_catalog_nodes_code_depth
                    CHECK (array_length(string_to_array(code, '.'), 1) <= 5)
            )
            "#,
            &[],
        )?;

        // NULL project ids compare equal here so the base catalog is unique too.
        manager.execute(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS uq_catalog_nodes_scope_code ON catalog_nodes (
                org_id,
                COALESCE(project_id, '00000000-0000-0000-0000-000000000000'::uuid),
                code
            )
            "#,
            &[],
        )?;
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_catalog_nodes_parent_id")
                .table(TABLE)
                .col(Ident("parent_id"))
                .to_owned(),
        )?;
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_catalog_nodes_scope")
                .table(TABLE)
                .col(Ident("org_id"))
                .col(Ident("project_id"))
                .to_owned(),
        )?;

        Ok(())
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
        manager.drop_table(Table::drop().table(TABLE).if_exists().to_owned())
    }
}
