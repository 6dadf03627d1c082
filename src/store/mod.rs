//! Persistence collaborator.
//!
//! The engine never talks to a database directly; it consumes a
//! [`CatalogStore`]. Two implementations ship with the crate:
//!
//! - [`InMemoryCatalogStore`]: a locked map, used by tests and embedders that
//!   keep the catalog in process.
//! - [`PgCatalogStore`]: the `catalog_nodes` table over any
//!   [`SqlExecutor`](crate::executor::SqlExecutor).

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::StoreError;
pub use memory::InMemoryCatalogStore;
pub use postgres::PgCatalogStore;

use crate::model::{CatalogNode, NewNode, NodeId, NodePatch, OrgId, ProjectId};
use std::sync::Arc;

/// Record-level access to catalog nodes.
///
/// Each call is one atomic write (or read) from the engine's point of view.
/// Implementations must enforce `(org_id, project_id, code)` uniqueness and
/// refuse to delete a node that is still some node's parent.
pub trait CatalogStore {
    /// All nodes of exactly one scope: `project_id = None` lists the base
    /// catalog only, `Some(p)` lists project `p` only.
    fn list_nodes(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
    ) -> Result<Vec<CatalogNode>, StoreError>;

    fn get_node(&self, id: NodeId) -> Result<Option<CatalogNode>, StoreError>;

    fn create_node(&self, fields: &NewNode) -> Result<CatalogNode, StoreError>;

    /// Apply `patch` and return the updated node. `StoreError::NotFound` when
    /// the id is unknown.
    fn update_node(&self, id: NodeId, patch: &NodePatch) -> Result<CatalogNode, StoreError>;

    /// Remove the node. `StoreError::HasChildren` while children exist.
    fn delete_node(&self, id: NodeId) -> Result<(), StoreError>;

    /// Re-home a subtree in one write: `root` gets `parent_id`, and `root`
    /// plus every node in `descendants` gets `project_id`. Either all rows
    /// change or none do. Returns the updated root.
    fn move_subtree(
        &self,
        root: NodeId,
        parent_id: Option<NodeId>,
        project_id: Option<ProjectId>,
        descendants: &[NodeId],
    ) -> Result<CatalogNode, StoreError>;
}

impl<S: CatalogStore + ?Sized> CatalogStore for &S {
    fn list_nodes(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
    ) -> Result<Vec<CatalogNode>, StoreError> {
        (**self).list_nodes(org_id, project_id)
    }

    fn get_node(&self, id: NodeId) -> Result<Option<CatalogNode>, StoreError> {
        (**self).get_node(id)
    }

    fn create_node(&self, fields: &NewNode) -> Result<CatalogNode, StoreError> {
        (**self).create_node(fields)
    }

    fn update_node(&self, id: NodeId, patch: &NodePatch) -> Result<CatalogNode, StoreError> {
        (**self).update_node(id, patch)
    }

    fn delete_node(&self, id: NodeId) -> Result<(), StoreError> {
        (**self).delete_node(id)
    }

    fn move_subtree(
        &self,
        root: NodeId,
        parent_id: Option<NodeId>,
        project_id: Option<ProjectId>,
        descendants: &[NodeId],
    ) -> Result<CatalogNode, StoreError> {
        (**self).move_subtree(root, parent_id, project_id, descendants)
    }
}

impl<S: CatalogStore + ?Sized> CatalogStore for Arc<S> {
    fn list_nodes(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
    ) -> Result<Vec<CatalogNode>, StoreError> {
        (**self).list_nodes(org_id, project_id)
    }

    fn get_node(&self, id: NodeId) -> Result<Option<CatalogNode>, StoreError> {
        (**self).get_node(id)
    }

    fn create_node(&self, fields: &NewNode) -> Result<CatalogNode, StoreError> {
        (**self).create_node(fields)
    }

    fn update_node(&self, id: NodeId, patch: &NodePatch) -> Result<CatalogNode, StoreError> {
        (**self).update_node(id, patch)
    }

    fn delete_node(&self, id: NodeId) -> Result<(), StoreError> {
        (**self).delete_node(id)
    }

    fn move_subtree(
        &self,
        root: NodeId,
        parent_id: Option<NodeId>,
        project_id: Option<ProjectId>,
        descendants: &[NodeId],
    ) -> Result<CatalogNode, StoreError> {
        (**self).move_subtree(root, parent_id, project_id, descendants)
    }
}
