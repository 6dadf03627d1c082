//! Ancestor materialization.
//!
//! Creating `A.B.C` in a scope where `A.B` (or `A`) is missing first creates
//! the missing ancestors as stubs, top-down, so no node ever hangs below a
//! code that does not exist.

use super::CatalogEngine;
use crate::code;
use crate::error::CatalogError;
use crate::model::{CatalogNode, NewNode, NodeId, Scope};
use crate::store::CatalogStore;
use std::collections::HashMap;
use uuid::Uuid;

/// Code -> id for one target scope, updated as stubs are written.
pub type ScopeIndex = HashMap<String, NodeId>;

pub fn index_of(nodes: &[CatalogNode]) -> ScopeIndex {
    nodes.iter().map(|n| (n.code.clone(), n.id)).collect()
}

/// Where ancestor stubs go.
pub trait StubWriter {
    fn write_stub(&mut self, stub: &NewNode) -> Result<NodeId, CatalogError>;
}

/// Writes stubs through a store.
pub struct StoreStubs<'a, S: CatalogStore> {
    store: &'a S,
    pub created: Vec<CatalogNode>,
}

impl<'a, S: CatalogStore> StoreStubs<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            created: Vec::new(),
        }
    }
}

impl<S: CatalogStore> StubWriter for StoreStubs<'_, S> {
    fn write_stub(&mut self, stub: &NewNode) -> Result<NodeId, CatalogError> {
        let node = self.store.create_node(stub)?;
        log::debug!("Materialized ancestor {} in {}", node.code, stub.scope());
        let id = node.id;
        self.created.push(node);
        Ok(id)
    }
}

/// Records the stubs a write would create and hands out placeholder ids.
#[derive(Debug, Default)]
pub struct DryRunStubs {
    pub planned: Vec<String>,
}

impl StubWriter for DryRunStubs {
    fn write_stub(&mut self, stub: &NewNode) -> Result<NodeId, CatalogError> {
        self.planned.push(stub.code.clone());
        Ok(Uuid::new_v4())
    }
}

/// Id of the parent `code` should hang under in `scope`, creating missing
/// ancestors through `writer`. `None` for a root code.
///
/// The depth of `code` is checked before anything is written. The upward walk
/// is bounded by `max_level`.
pub fn ensure_parent_chain(
    scope: Scope,
    code: &str,
    index: &mut ScopeIndex,
    max_level: usize,
    writer: &mut dyn StubWriter,
) -> Result<Option<NodeId>, CatalogError> {
    code::check_depth(code, max_level)?;

    let Some(parent) = code::parent_code(code) else {
        return Ok(None);
    };
    if let Some(&id) = index.get(parent) {
        return Ok(Some(id));
    }

    let mut missing = Vec::new();
    let mut anchor = None;
    let mut cursor = Some(parent);
    for _ in 0..max_level {
        let Some(current) = cursor else { break };
        if let Some(&id) = index.get(current) {
            anchor = Some(id);
            break;
        }
        missing.push(current);
        cursor = code::parent_code(current);
    }

    let mut parent_id = anchor;
    for ancestor in missing.into_iter().rev() {
        let id = writer.write_stub(&NewNode::stub(scope, parent_id, ancestor))?;
        index.insert(ancestor.to_string(), id);
        parent_id = Some(id);
    }
    Ok(parent_id)
}

impl<S: CatalogStore> CatalogEngine<S> {
    /// Make sure every ancestor of `code` exists in `scope` and return the id
    /// of its direct parent (`None` for a root code).
    pub fn ensure_parent_chain(
        &self,
        scope: Scope,
        code: &str,
    ) -> Result<Option<NodeId>, CatalogError> {
        let code = code::normalize_code(code)?;
        code::check_depth(&code, self.max_level())?;
        let mut index = index_of(&self.store().list_nodes(scope.org_id, scope.project_id)?);
        let mut stubs = StoreStubs::new(self.store());
        ensure_parent_chain(scope, &code, &mut index, self.max_level(), &mut stubs)
    }
}
