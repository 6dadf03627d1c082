//! Multi-selection moves and clones.

use super::clone::order_candidates;
use super::{BatchOutcome, CatalogEngine, ConflictPolicy, DiffReport, ItemOutcome, OutcomeKind};
use crate::error::CatalogError;
use crate::metrics;
use crate::model::{CatalogNode, NodeId, OrgId, ProjectId, Scope};
use crate::store::CatalogStore;
use std::collections::BTreeMap;

/// Eligible clone candidates of a selection, unioned by code, plus the
/// selections that were left out.
struct Selection {
    org_id: Option<OrgId>,
    candidates: Vec<CatalogNode>,
    ignored: Vec<ItemOutcome>,
}

impl<S: CatalogStore> CatalogEngine<S> {
    /// Move every node in `ids` under `new_parent_id` (or to the root of
    /// `requested_scope`). Each move is checked and applied on its own; a
    /// rejected move is counted as failed and the rest continue.
    pub fn bulk_move(
        &self,
        ids: &[NodeId],
        new_parent_id: Option<NodeId>,
        requested_scope: Scope,
    ) -> Result<BatchOutcome, CatalogError> {
        let _op = metrics::operation("bulk_move");
        let mut outcome = BatchOutcome::default();

        for &id in ids {
            let item = match self.move_node(id, new_parent_id, requested_scope) {
                Ok(moved) => ItemOutcome {
                    source_id: Some(id),
                    node_id: Some(moved.id),
                    ..ItemOutcome::new(moved.code, OutcomeKind::Moved)
                },
                Err(err) => {
                    log::warn!("Bulk move of {} failed: {}", id, err);
                    ItemOutcome::failed(id.to_string(), Some(id), &err)
                }
            };
            outcome.push(item);
        }

        log::info!(
            "Bulk move: {} moved, {} failed",
            outcome.counts.moved,
            outcome.counts.failed
        );
        metrics::record_outcomes("bulk_move", &outcome.counts);
        Ok(outcome)
    }

    /// Preview of [`execute_bulk_clone`](Self::execute_bulk_clone).
    pub fn preview_bulk_clone(
        &self,
        ids: &[NodeId],
        target_project_id: ProjectId,
        include_descendants: bool,
        policy: ConflictPolicy,
    ) -> Result<DiffReport, CatalogError> {
        let _op = metrics::operation("preview_bulk_clone");
        let selection = self.bulk_selection(ids, include_descendants)?;
        let ignored: Vec<NodeId> = selection.ignored.iter().filter_map(|i| i.source_id).collect();
        match selection.org_id {
            Some(org_id) => self.preview_candidates(
                &selection.candidates,
                Scope::project(org_id, target_project_id),
                policy,
                ignored,
            ),
            None => Ok(DiffReport {
                ignored,
                ..DiffReport::default()
            }),
        }
    }

    /// Clone several base-catalog roots into one project. Project-scoped or
    /// unknown selections are counted as ignored; a node reachable from more
    /// than one selected root is processed once.
    pub fn execute_bulk_clone(
        &self,
        ids: &[NodeId],
        target_project_id: ProjectId,
        include_descendants: bool,
        policy: ConflictPolicy,
    ) -> Result<BatchOutcome, CatalogError> {
        let _op = metrics::operation("execute_bulk_clone");
        let selection = self.bulk_selection(ids, include_descendants)?;

        let mut outcome = BatchOutcome::default();
        for item in selection.ignored {
            outcome.push(item);
        }
        if let Some(org_id) = selection.org_id {
            outcome = self.execute_candidates(
                &selection.candidates,
                Scope::project(org_id, target_project_id),
                policy,
                outcome,
            )?;
        }
        metrics::record_outcomes("bulk_clone", &outcome.counts);
        Ok(outcome)
    }

    /// The org is taken from the first eligible selection; selections from
    /// another org are ignored along with project-scoped ones.
    fn bulk_selection(
        &self,
        ids: &[NodeId],
        include_descendants: bool,
    ) -> Result<Selection, CatalogError> {
        let mut selection = Selection {
            org_id: None,
            candidates: Vec::new(),
            ignored: Vec::new(),
        };
        let mut by_code: BTreeMap<String, CatalogNode> = BTreeMap::new();

        for &id in ids {
            let Some(source) = self.store().get_node(id)? else {
                log::warn!("Bulk clone selection {} does not exist", id);
                selection.ignored.push(ItemOutcome {
                    source_id: Some(id),
                    error: Some(CatalogError::NodeNotFound(id).to_string()),
                    ..ItemOutcome::new(id.to_string(), OutcomeKind::Ignored)
                });
                continue;
            };
            let other_org = selection.org_id.is_some_and(|org| org != source.org_id);
            if !source.scope().is_base() || other_org {
                let reason = CatalogError::NotEligibleForClone {
                    node: source.id,
                    scope: source.scope(),
                };
                log::debug!("Ignoring bulk clone selection: {}", reason);
                selection.ignored.push(ItemOutcome {
                    source_id: Some(id),
                    error: Some(reason.to_string()),
                    ..ItemOutcome::new(source.code.clone(), OutcomeKind::Ignored)
                });
                continue;
            }
            selection.org_id.get_or_insert(source.org_id);
            for candidate in self.clone_candidates(&source, include_descendants)? {
                by_code.entry(candidate.code.clone()).or_insert(candidate);
            }
        }

        selection.candidates = order_candidates(by_code.into_values().collect(), self.max_level());
        Ok(selection)
    }
}
