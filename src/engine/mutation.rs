//! Single-node mutations: create, update, move, toggle, delete.
//!
//! Every check runs before the first write, so a rejected request leaves the
//! catalog untouched.

use super::ancestors::{ensure_parent_chain, index_of, StoreStubs};
use super::CatalogEngine;
use crate::code;
use crate::error::CatalogError;
use crate::metrics;
use crate::model::{
    non_blank, CatalogNode, NewNode, NodeId, NodeInput, NodePatch, NodeUpdate, Scope,
};
use crate::store::{CatalogStore, StoreError};
use crate::tree;
use std::collections::HashSet;

impl<S: CatalogStore> CatalogEngine<S> {
    /// Create a node.
    ///
    /// Under a parent, the node takes the parent's scope. Without one, the
    /// requested scope is used and any missing ancestors of the code are
    /// materialized first, the last of them becoming the parent.
    pub fn create(
        &self,
        parent_id: Option<NodeId>,
        input: NodeInput,
    ) -> Result<CatalogNode, CatalogError> {
        let _op = metrics::operation("create");
        let code = code::validate(&input.code, self.max_level())?;

        let (scope, parent) = match parent_id {
            Some(pid) => {
                let parent = self.get(pid)?;
                if parent.org_id != input.scope.org_id {
                    return Err(CatalogError::ScopeMismatch {
                        node: Some(pid),
                        reason: format!(
                            "parent belongs to org {}, not {}",
                            parent.org_id, input.scope.org_id
                        ),
                    });
                }
                (parent.scope(), Some(parent))
            }
            None => (input.scope, None),
        };

        let existing = self.store().list_nodes(scope.org_id, scope.project_id)?;
        check_code_free(&existing, &code, scope, None)?;

        let parent_id = match parent {
            Some(parent) => Some(parent.id),
            None => {
                let mut index = index_of(&existing);
                let mut stubs = StoreStubs::new(self.store());
                ensure_parent_chain(scope, &code, &mut index, self.max_level(), &mut stubs)?
            }
        };

        let fields = NewNode {
            org_id: scope.org_id,
            project_id: scope.project_id,
            parent_id,
            name: non_blank(&input.name).unwrap_or_else(|| code::last_segment(&code).to_string()),
            code,
            name_ar: input.name_ar.as_deref().and_then(non_blank),
            description: input.description.as_deref().and_then(non_blank),
            unit_of_measure: input.unit_of_measure.as_deref().and_then(non_blank),
            is_active: input.is_active,
            position: input.position,
        };
        let node = self.store().create_node(&fields)?;
        log::info!("Created catalog node {} ({}) in {}", node.code, node.id, scope);
        Ok(node)
    }

    /// Update descriptive fields, the code, or (for a childless root) the
    /// project scope. The parent link changes only through
    /// [`move_node`](Self::move_node).
    pub fn update(&self, id: NodeId, update: NodeUpdate) -> Result<CatalogNode, CatalogError> {
        let _op = metrics::operation("update");
        let node = self.get(id)?;
        let mut patch = NodePatch::default();

        if let Some(project_id) = update.project_id {
            if project_id != node.project_id {
                if !node.is_root() {
                    return Err(CatalogError::ScopeMismatch {
                        node: Some(id),
                        reason: "a child node's scope follows its parent; move it instead"
                            .to_string(),
                    });
                }
                let siblings = self.store().list_nodes(node.org_id, node.project_id)?;
                if siblings.iter().any(|n| n.parent_id == Some(id)) {
                    return Err(CatalogError::ScopeMismatch {
                        node: Some(id),
                        reason: "cannot change the scope of a node that has children".to_string(),
                    });
                }
                patch.project_id = Some(project_id);
            }
        }

        let code = match &update.code {
            Some(raw) => code::validate(raw, self.max_level())?,
            None => node.code.clone(),
        };
        if code != node.code {
            patch.code = Some(code.clone());
        }
        if patch.code.is_some() || patch.project_id.is_some() {
            let scope = Scope {
                org_id: node.org_id,
                project_id: patch.project_id.unwrap_or(node.project_id),
            };
            let existing = self.store().list_nodes(scope.org_id, scope.project_id)?;
            check_code_free(&existing, &code, scope, Some(id))?;
        }

        if let Some(name) = update.name.as_deref().and_then(non_blank) {
            patch.name = Some(name);
        }
        patch.name_ar = update.name_ar.map(|v| v.as_deref().and_then(non_blank));
        patch.description = update.description.map(|v| v.as_deref().and_then(non_blank));
        patch.unit_of_measure = update.unit_of_measure.map(|v| v.as_deref().and_then(non_blank));
        patch.is_active = update.is_active;
        patch.position = update.position;

        let updated = self.store().update_node(id, &patch)?;
        log::debug!("Updated catalog node {} ({})", updated.code, id);
        Ok(updated)
    }

    /// Reparent `id` under `new_parent_id`, or make it a root of
    /// `requested_scope` when no parent is given.
    ///
    /// Moving into another scope carries the whole subtree along.
    pub fn move_node(
        &self,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        requested_scope: Scope,
    ) -> Result<CatalogNode, CatalogError> {
        let _op = metrics::operation("move");
        let node = self.get(id)?;
        let current = self.store().list_nodes(node.org_id, node.project_id)?;
        let descendants = tree::collect_descendants(&current, id);

        if let Some(target) = new_parent_id {
            if target == id || descendants.contains(&target) {
                return Err(CatalogError::CircularMove {
                    node: id,
                    target_parent: target,
                });
            }
        }

        let (scope, parent) = match new_parent_id {
            Some(target) => {
                let parent = self.get(target)?;
                (parent.scope(), Some(parent))
            }
            None => (requested_scope, None),
        };
        if scope.org_id != node.org_id {
            return Err(CatalogError::ScopeMismatch {
                node: Some(id),
                reason: format!(
                    "cannot move a node of org {} into org {}",
                    node.org_id, scope.org_id
                ),
            });
        }

        let target_nodes = if scope == node.scope() {
            current.clone()
        } else {
            self.store().list_nodes(scope.org_id, scope.project_id)?
        };

        // Chain length after the move: the parent's chain plus the subtree height.
        let limit = self.max_level() + 1;
        let parent_depth = parent
            .as_ref()
            .map_or(0, |p| tree::chain_depth(&target_nodes, p.id, limit));
        let own_depth = tree::chain_depth(&current, id, limit);
        let height = descendants
            .iter()
            .map(|d| {
                tree::chain_depth(&current, *d, limit + own_depth).saturating_sub(own_depth) + 1
            })
            .max()
            .unwrap_or(1);
        if parent_depth + height > self.max_level() {
            return Err(CatalogError::TreeDepthExceeded {
                node: id,
                depth: parent_depth + height,
                max_level: self.max_level(),
            });
        }

        if scope != node.scope() {
            let moving: HashSet<&str> = current
                .iter()
                .filter(|n| n.id == id || descendants.contains(&n.id))
                .map(|n| n.code.as_str())
                .collect();
            if let Some(clash) = target_nodes.iter().find(|n| moving.contains(n.code.as_str())) {
                return Err(CatalogError::DuplicateCode {
                    code: clash.code.clone(),
                    scope,
                    existing: clash.id,
                });
            }

            let carried: Vec<NodeId> = descendants.iter().copied().collect();
            let moved = self
                .store()
                .move_subtree(id, new_parent_id, scope.project_id, &carried)?;
            log::info!(
                "Moved {} with {} descendant(s) into {}",
                moved.code,
                carried.len(),
                scope
            );
            return Ok(moved);
        }

        let patch = NodePatch {
            parent_id: Some(new_parent_id),
            ..NodePatch::default()
        };
        let moved = self.store().update_node(id, &patch)?;
        log::debug!("Moved {} under {:?}", moved.code, new_parent_id);
        Ok(moved)
    }

    /// Flip `is_active`.
    pub fn toggle_active(&self, id: NodeId) -> Result<CatalogNode, CatalogError> {
        let _op = metrics::operation("toggle_active");
        let node = self.get(id)?;
        let patch = NodePatch {
            is_active: Some(!node.is_active),
            ..NodePatch::default()
        };
        Ok(self.store().update_node(id, &patch)?)
    }

    /// Delete a leaf. Nodes with children are refused; subtrees are deleted
    /// leaf-first by the caller.
    pub fn delete(&self, id: NodeId) -> Result<(), CatalogError> {
        let _op = metrics::operation("delete");
        let node = self.get(id)?;
        let children = self
            .store()
            .list_nodes(node.org_id, node.project_id)?
            .iter()
            .filter(|n| n.parent_id == Some(id))
            .count();
        if children > 0 {
            return Err(CatalogError::HasChildren { node: id, children });
        }

        match self.store().delete_node(id) {
            Ok(()) => {
                log::info!("Deleted catalog node {} ({})", node.code, id);
                Ok(())
            }
            // A child from another scope, or one added concurrently.
            Err(StoreError::HasChildren(_)) => Err(CatalogError::HasChildren {
                node: id,
                children: 1,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// `DuplicateCode` when a node other than `exclude` already uses `code`.
fn check_code_free(
    existing: &[CatalogNode],
    code: &str,
    scope: Scope,
    exclude: Option<NodeId>,
) -> Result<(), CatalogError> {
    match existing.iter().find(|n| n.code == code && Some(n.id) != exclude) {
        Some(clash) => Err(CatalogError::DuplicateCode {
            code: code.to_string(),
            scope,
            existing: clash.id,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCatalogStore;
    use uuid::Uuid;

    fn engine() -> CatalogEngine<InMemoryCatalogStore> {
        CatalogEngine::new(InMemoryCatalogStore::new())
    }

    #[test]
    fn test_create_normalizes_and_blanks() {
        let engine = engine();
        let scope = Scope::org(Uuid::new_v4());
        let input = NodeInput::new(scope, " civil ", "  ").with_description("   ");
        let node = engine.create(None, input).unwrap();
        assert_eq!(node.code, "CIVIL");
        assert_eq!(node.name, "CIVIL");
        assert_eq!(node.description, None);
    }

    #[test]
    fn test_create_duplicate_code() {
        let engine = engine();
        let scope = Scope::org(Uuid::new_v4());
        let first = engine.create(None, NodeInput::new(scope, "CIVIL", "Civil")).unwrap();
        let err = engine
            .create(None, NodeInput::new(scope, "civil", "Again"))
            .unwrap_err();
        assert!(
            matches!(err, CatalogError::DuplicateCode { existing, .. } if existing == first.id)
        );
    }

    #[test]
    fn test_create_under_parent_of_other_org() {
        let engine = engine();
        let parent = engine
            .create(None, NodeInput::new(Scope::org(Uuid::new_v4()), "A", "A"))
            .unwrap();
        let err = engine
            .create(Some(parent.id), NodeInput::new(Scope::org(Uuid::new_v4()), "A.B", "B"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::ScopeMismatch { .. }));
    }

    #[test]
    fn test_update_code_excludes_self() {
        let engine = engine();
        let scope = Scope::org(Uuid::new_v4());
        let a = engine.create(None, NodeInput::new(scope, "A", "A")).unwrap();
        engine.create(None, NodeInput::new(scope, "B", "B")).unwrap();

        let same = NodeUpdate {
            code: Some("a".to_string()),
            name: Some("Alpha".to_string()),
            ..NodeUpdate::default()
        };
        let updated = engine.update(a.id, same).unwrap();
        assert_eq!(updated.name, "Alpha");

        let clash = NodeUpdate {
            code: Some("B".to_string()),
            ..NodeUpdate::default()
        };
        assert!(matches!(
            engine.update(a.id, clash),
            Err(CatalogError::DuplicateCode { .. })
        ));
    }

    #[test]
    fn test_update_project_of_child_is_rejected() {
        let engine = engine();
        let org = Uuid::new_v4();
        let child = engine
            .create(None, NodeInput::new(Scope::org(org), "A.B", "B"))
            .unwrap();
        let parent_id = child.parent_id.unwrap();
        let change = NodeUpdate {
            project_id: Some(Some(Uuid::new_v4())),
            ..NodeUpdate::default()
        };
        assert!(matches!(
            engine.update(child.id, change.clone()),
            Err(CatalogError::ScopeMismatch { .. })
        ));
        // The root has a child, so it cannot switch scope either.
        assert!(matches!(
            engine.update(parent_id, change),
            Err(CatalogError::ScopeMismatch { .. })
        ));
    }

    #[test]
    fn test_toggle_active_flips() {
        let engine = engine();
        let node = engine
            .create(None, NodeInput::new(Scope::org(Uuid::new_v4()), "A", "A"))
            .unwrap();
        assert!(!engine.toggle_active(node.id).unwrap().is_active);
        assert!(engine.toggle_active(node.id).unwrap().is_active);
    }

    #[test]
    fn test_move_too_deep_is_rejected() {
        let engine = engine();
        let scope = Scope::org(Uuid::new_v4());
        let deep = engine.create(None, NodeInput::new(scope, "A.B.C.D", "D")).unwrap();
        let other = engine.create(None, NodeInput::new(scope, "X.Y", "Y")).unwrap();
        let err = engine.move_node(other.parent_id.unwrap(), Some(deep.id), scope).unwrap_err();
        assert!(matches!(err, CatalogError::TreeDepthExceeded { depth: 6, .. }));
        // A leaf still fits: 4 + 1.
        engine.move_node(other.id, Some(deep.id), scope).unwrap();
    }

    #[test]
    fn test_missing_node() {
        let engine = engine();
        let id = Uuid::new_v4();
        let err = engine.toggle_active(id).unwrap_err();
        assert!(matches!(err, CatalogError::NodeNotFound(found) if found == id));
        assert!(matches!(engine.delete(id), Err(CatalogError::NodeNotFound(_))));
    }
}
