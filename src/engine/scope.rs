//! Union resolution: the catalog a project actually sees.

use super::CatalogEngine;
use crate::error::CatalogError;
use crate::model::{CatalogNode, OrgId, ProjectId};
use crate::store::CatalogStore;
use crate::tree::{self, TreeNode};
use std::collections::BTreeMap;

/// Merge base and project nodes by code; project nodes replace base nodes
/// with the same code. Ordered by code.
pub fn merge_by_code(
    base: Vec<CatalogNode>,
    project: Vec<CatalogNode>,
    include_inactive: bool,
) -> Vec<CatalogNode> {
    let mut by_code: BTreeMap<String, CatalogNode> = BTreeMap::new();
    for node in base.into_iter().chain(project) {
        by_code.insert(node.code.clone(), node);
    }
    by_code
        .into_values()
        .filter(|n| include_inactive || n.is_active)
        .collect()
}

impl<S: CatalogStore> CatalogEngine<S> {
    /// The effective catalog for `(org_id, project_id)` as a flat list.
    /// Without a project this is just the base catalog.
    pub fn resolve_union(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
        include_inactive: bool,
    ) -> Result<Vec<CatalogNode>, CatalogError> {
        let base = self.store().list_nodes(org_id, None)?;
        let project = match project_id {
            Some(project) => self.store().list_nodes(org_id, Some(project))?,
            None => Vec::new(),
        };
        Ok(merge_by_code(base, project, include_inactive))
    }

    /// The effective catalog as a tree.
    pub fn list_union(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
        include_inactive: bool,
    ) -> Result<Vec<TreeNode>, CatalogError> {
        let _op = crate::metrics::operation("list_union");
        let flat = self.resolve_union(org_id, project_id, include_inactive)?;
        let mut roots = tree::build_tree(&flat);
        tree::sort_siblings(&mut roots);
        Ok(roots)
    }

    /// Active nodes only, ordered by code, for selection lists.
    pub fn pick_list(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
    ) -> Result<Vec<CatalogNode>, CatalogError> {
        self.resolve_union(org_id, project_id, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeInput, Scope};
    use crate::store::InMemoryCatalogStore;
    use uuid::Uuid;

    #[test]
    fn test_project_node_overrides_base_by_code() {
        let engine = CatalogEngine::new(InMemoryCatalogStore::new());
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        engine
            .create(None, NodeInput::new(Scope::org(org), "CIVIL.CONCRETE", "Concrete"))
            .unwrap();
        engine
            .create(None, NodeInput::new(Scope::org(org), "CIVIL.STEEL", "Steel").inactive())
            .unwrap();
        engine
            .create(None, NodeInput::new(Scope::project(org, project), "CIVIL", "Civil (site)"))
            .unwrap();

        let union = engine.resolve_union(org, Some(project), true).unwrap();
        let codes: Vec<&str> = union.iter().map(|n| n.code.as_str()).collect();
        assert_eq!(codes, vec!["CIVIL", "CIVIL.CONCRETE", "CIVIL.STEEL"]);
        assert_eq!(union[0].name, "Civil (site)");
        assert_eq!(union[0].project_id, Some(project));

        let active = engine.pick_list(org, Some(project)).unwrap();
        assert_eq!(active.len(), 2);

        // Without a project only the base catalog is visible.
        let base = engine.resolve_union(org, None, true).unwrap();
        assert!(base.iter().all(|n| n.project_id.is_none()));
        assert_eq!(base[0].name, "CIVIL");
    }

    #[test]
    fn test_overridden_parent_leaves_base_children_as_roots() {
        let engine = CatalogEngine::new(InMemoryCatalogStore::new());
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        engine
            .create(None, NodeInput::new(Scope::org(org), "CIVIL.CONCRETE", "Concrete"))
            .unwrap();
        engine
            .create(None, NodeInput::new(Scope::project(org, project), "CIVIL", "Civil (site)"))
            .unwrap();

        // The base child still points at the base CIVIL, which the override hides.
        let roots = engine.list_union(org, Some(project), true).unwrap();
        let codes: Vec<&str> = roots.iter().map(|r| r.node.code.as_str()).collect();
        assert_eq!(codes, vec!["CIVIL", "CIVIL.CONCRETE"]);
    }
}
