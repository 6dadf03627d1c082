//! In-process catalog store.

use super::{CatalogStore, StoreError};
use crate::model::{CatalogNode, NewNode, NodeId, NodePatch, OrgId, ProjectId, Scope};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// A [`CatalogStore`] backed by a `RwLock`ed map.
///
/// It enforces the same external invariants as the database schema: per-scope
/// code uniqueness and no deletion of a node that is still a parent.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    nodes: RwLock<BTreeMap<NodeId, CatalogNode>>,
    failing_codes: RwLock<HashSet<String>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `nodes` as given (ids and timestamps kept).
    pub fn with_nodes(nodes: impl IntoIterator<Item = CatalogNode>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.nodes.write() {
            map.extend(nodes.into_iter().map(|n| (n.id, n)));
        }
        store
    }

    /// Make every write that would leave a node with `code` fail. Used to
    /// exercise partial-failure paths.
    pub fn fail_writes_for_code(&self, code: &str) {
        if let Ok(mut codes) = self.failing_codes.write() {
            codes.insert(code.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every node in every scope.
    pub fn all_nodes(&self) -> Vec<CatalogNode> {
        self.read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<NodeId, CatalogNode>>, StoreError> {
        self.nodes
            .read()
            .map_err(|_| StoreError::Other("catalog store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<NodeId, CatalogNode>>, StoreError> {
        self.nodes
            .write()
            .map_err(|_| StoreError::Other("catalog store lock poisoned".to_string()))
    }

    fn check_injected_failure(&self, code: &str) -> Result<(), StoreError> {
        let failing = self
            .failing_codes
            .read()
            .map(|codes| codes.contains(code))
            .unwrap_or(false);
        if failing {
            return Err(StoreError::Other(format!("injected write failure for {code}")));
        }
        Ok(())
    }
}

fn check_unique(
    map: &BTreeMap<NodeId, CatalogNode>,
    scope: Scope,
    code: &str,
    exclude: &[NodeId],
) -> Result<(), StoreError> {
    let clash = map
        .values()
        .any(|n| n.scope() == scope && n.code == code && !exclude.contains(&n.id));
    if clash {
        return Err(StoreError::UniqueViolation(format!(
            "code {code} already exists in {scope}"
        )));
    }
    Ok(())
}

impl CatalogStore for InMemoryCatalogStore {
    fn list_nodes(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
    ) -> Result<Vec<CatalogNode>, StoreError> {
        let map = self.read()?;
        let mut nodes: Vec<CatalogNode> = map
            .values()
            .filter(|n| n.org_id == org_id && n.project_id == project_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(nodes)
    }

    fn get_node(&self, id: NodeId) -> Result<Option<CatalogNode>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn create_node(&self, fields: &NewNode) -> Result<CatalogNode, StoreError> {
        self.check_injected_failure(&fields.code)?;
        let mut map = self.write()?;
        check_unique(&map, fields.scope(), &fields.code, &[])?;

        let now = Utc::now();
        let node = CatalogNode {
            id: Uuid::new_v4(),
            org_id: fields.org_id,
            project_id: fields.project_id,
            parent_id: fields.parent_id,
            code: fields.code.clone(),
            name: fields.name.clone(),
            name_ar: fields.name_ar.clone(),
            description: fields.description.clone(),
            unit_of_measure: fields.unit_of_measure.clone(),
            is_active: fields.is_active,
            position: fields.position,
            created_at: now,
            updated_at: now,
        };
        map.insert(node.id, node.clone());
        Ok(node)
    }

    fn update_node(&self, id: NodeId, patch: &NodePatch) -> Result<CatalogNode, StoreError> {
        let mut map = self.write()?;
        let mut updated = map.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        patch.apply_to(&mut updated);
        self.check_injected_failure(&updated.code)?;
        check_unique(&map, updated.scope(), &updated.code, &[id])?;
        updated.updated_at = Utc::now();
        map.insert(id, updated.clone());
        Ok(updated)
    }

    fn delete_node(&self, id: NodeId) -> Result<(), StoreError> {
        let mut map = self.write()?;
        if !map.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if map.values().any(|n| n.parent_id == Some(id)) {
            return Err(StoreError::HasChildren(id));
        }
        map.remove(&id);
        Ok(())
    }

    fn move_subtree(
        &self,
        root: NodeId,
        parent_id: Option<NodeId>,
        project_id: Option<ProjectId>,
        descendants: &[NodeId],
    ) -> Result<CatalogNode, StoreError> {
        let mut map = self.write()?;
        let ids: Vec<NodeId> = std::iter::once(root).chain(descendants.iter().copied()).collect();

        // Stage every row first; the map is only touched once all of them pass.
        let mut staged = Vec::with_capacity(ids.len());
        for id in &ids {
            let mut node = map.get(id).cloned().ok_or(StoreError::NotFound(*id))?;
            node.project_id = project_id;
            if *id == root {
                node.parent_id = parent_id;
            }
            self.check_injected_failure(&node.code)?;
            check_unique(&map, node.scope(), &node.code, &ids)?;
            staged.push(node);
        }

        let now = Utc::now();
        for mut node in staged {
            node.updated_at = now;
            map.insert(node.id, node);
        }
        map.get(&root).cloned().ok_or(StoreError::NotFound(root))
    }
}
