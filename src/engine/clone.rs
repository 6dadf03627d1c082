//! Base catalog -> project clone with conflict policies.
//!
//! Preview and execute run the same [`plan_and_apply`] walk. The only
//! difference is the [`ApplyStep`]: [`DryRun`] records, [`Persist`] writes.
//! Both see the same candidates in the same order against the same running
//! index, so a preview's create/update/skip partition is exactly what an
//! immediate execute reports.

use super::ancestors::{
    ensure_parent_chain, index_of, DryRunStubs, ScopeIndex, StoreStubs, StubWriter,
};
use super::{
    BatchOutcome, CatalogEngine, ConflictPolicy, DiffReport, ItemOutcome, OutcomeKind,
    PlannedUpdate,
};
use crate::code;
use crate::error::CatalogError;
use crate::metrics;
use crate::model::{is_blank, CatalogNode, NewNode, NodeId, NodePatch, ProjectId, Scope};
use crate::store::CatalogStore;
use crate::tree;
use std::collections::HashMap;
use uuid::Uuid;

/// Writes (or pretends to write) clone results.
pub trait ApplyStep {
    fn stubs(&mut self) -> &mut dyn StubWriter;
    fn create(&mut self, fields: &NewNode) -> Result<NodeId, CatalogError>;
    fn update(&mut self, id: NodeId, patch: &NodePatch) -> Result<(), CatalogError>;
}

/// Preview: nothing is written, created nodes get placeholder ids.
#[derive(Debug, Default)]
pub struct DryRun {
    stubs: DryRunStubs,
}

impl ApplyStep for DryRun {
    fn stubs(&mut self) -> &mut dyn StubWriter {
        &mut self.stubs
    }

    fn create(&mut self, _fields: &NewNode) -> Result<NodeId, CatalogError> {
        Ok(Uuid::new_v4())
    }

    fn update(&mut self, _id: NodeId, _patch: &NodePatch) -> Result<(), CatalogError> {
        Ok(())
    }
}

/// Execute: every step goes to the store.
pub struct Persist<'a, S: CatalogStore> {
    store: &'a S,
    stubs: StoreStubs<'a, S>,
}

impl<'a, S: CatalogStore> Persist<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            stubs: StoreStubs::new(store),
        }
    }
}

impl<S: CatalogStore> ApplyStep for Persist<'_, S> {
    fn stubs(&mut self) -> &mut dyn StubWriter {
        &mut self.stubs
    }

    fn create(&mut self, fields: &NewNode) -> Result<NodeId, CatalogError> {
        Ok(self.store.create_node(fields)?.id)
    }

    fn update(&mut self, id: NodeId, patch: &NodePatch) -> Result<(), CatalogError> {
        self.store.update_node(id, patch)?;
        Ok(())
    }
}

/// Order candidates so ancestors precede descendants: by code length, then
/// code. Drops anything deeper than `max_level`.
pub fn order_candidates(mut candidates: Vec<CatalogNode>, max_level: usize) -> Vec<CatalogNode> {
    candidates.retain(|n| code::depth(&n.code) <= max_level);
    candidates.sort_by(|a, b| a.code.len().cmp(&b.code.len()).then_with(|| a.code.cmp(&b.code)));
    candidates
}

/// The blank-target fields `source` can fill, as a patch plus field names.
pub fn fill_missing_patch(
    source: &CatalogNode,
    target: &CatalogNode,
) -> (NodePatch, Vec<&'static str>) {
    let mut patch = NodePatch::default();
    let mut fields = Vec::new();

    if is_blank(Some(target.name.as_str())) && !is_blank(Some(source.name.as_str())) {
        patch.name = Some(source.name.clone());
        fields.push("name");
    }
    if is_blank(target.name_ar.as_deref()) && !is_blank(source.name_ar.as_deref()) {
        patch.name_ar = Some(source.name_ar.clone());
        fields.push("name_ar");
    }
    if is_blank(target.unit_of_measure.as_deref()) && !is_blank(source.unit_of_measure.as_deref()) {
        patch.unit_of_measure = Some(source.unit_of_measure.clone());
        fields.push("unit_of_measure");
    }
    if is_blank(target.description.as_deref()) && !is_blank(source.description.as_deref()) {
        patch.description = Some(source.description.clone());
        fields.push("description");
    }
    (patch, fields)
}

/// Every copyable field of `source` plus the recomputed parent, and the names
/// of those that actually differ from `target`.
fn overwrite_patch(
    source: &CatalogNode,
    target: &CatalogNode,
    parent_id: Option<NodeId>,
) -> (NodePatch, Vec<&'static str>) {
    let mut changed = Vec::new();
    if source.name != target.name {
        changed.push("name");
    }
    if source.name_ar != target.name_ar {
        changed.push("name_ar");
    }
    if source.description != target.description {
        changed.push("description");
    }
    if source.unit_of_measure != target.unit_of_measure {
        changed.push("unit_of_measure");
    }
    if source.position != target.position {
        changed.push("position");
    }
    if source.is_active != target.is_active {
        changed.push("is_active");
    }
    if parent_id != target.parent_id {
        changed.push("parent_id");
    }

    let patch = NodePatch {
        parent_id: Some(parent_id),
        name: Some(source.name.clone()),
        name_ar: Some(source.name_ar.clone()),
        description: Some(source.description.clone()),
        unit_of_measure: Some(source.unit_of_measure.clone()),
        is_active: Some(source.is_active),
        position: Some(source.position),
        ..NodePatch::default()
    };
    (patch, changed)
}

/// Walk `candidates` against the target scope's `existing` nodes, applying
/// each decision through `apply`. Returns one outcome per candidate.
///
/// A failed step is reported on its candidate and the walk continues.
pub fn plan_and_apply(
    candidates: &[CatalogNode],
    target: Scope,
    existing: &[CatalogNode],
    policy: ConflictPolicy,
    max_level: usize,
    apply: &mut dyn ApplyStep,
) -> Vec<ItemOutcome> {
    let snapshot: HashMap<&str, &CatalogNode> =
        existing.iter().map(|n| (n.code.as_str(), n)).collect();
    let mut index: ScopeIndex = index_of(existing);
    let mut outcomes = Vec::with_capacity(candidates.len());

    for source in candidates {
        let result = clone_one(source, target, &snapshot, &mut index, policy, max_level, apply);
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!("Clone of {} into {} failed: {}", source.code, target, err);
                ItemOutcome::failed(source.code.clone(), Some(source.id), &err)
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

fn clone_one(
    source: &CatalogNode,
    target: Scope,
    snapshot: &HashMap<&str, &CatalogNode>,
    index: &mut ScopeIndex,
    policy: ConflictPolicy,
    max_level: usize,
    apply: &mut dyn ApplyStep,
) -> Result<ItemOutcome, CatalogError> {
    let mut outcome = ItemOutcome::new(source.code.clone(), OutcomeKind::Skipped);
    outcome.source_id = Some(source.id);

    let Some(&found) = snapshot.get(source.code.as_str()) else {
        if let Some(&id) = index.get(&source.code) {
            // Already written earlier in this walk.
            outcome.node_id = Some(id);
            return Ok(outcome);
        }
        let parent_id = ensure_parent_chain(target, &source.code, index, max_level, apply.stubs())?;
        let fields = NewNode {
            org_id: target.org_id,
            project_id: target.project_id,
            parent_id,
            code: source.code.clone(),
            name: source.name.clone(),
            name_ar: source.name_ar.clone(),
            description: source.description.clone(),
            unit_of_measure: source.unit_of_measure.clone(),
            is_active: source.is_active,
            position: source.position,
        };
        let id = apply.create(&fields)?;
        index.insert(source.code.clone(), id);
        outcome.node_id = Some(id);
        outcome.kind = OutcomeKind::Created;
        return Ok(outcome);
    };

    outcome.node_id = Some(found.id);
    match policy {
        ConflictPolicy::SkipExisting => {}
        ConflictPolicy::FillMissing => {
            let (patch, fields) = fill_missing_patch(source, found);
            if !fields.is_empty() {
                apply.update(found.id, &patch)?;
                outcome.kind = OutcomeKind::Updated;
                outcome.changed_fields = fields;
            }
        }
        ConflictPolicy::OverwriteAll => {
            let parent_id =
                ensure_parent_chain(target, &source.code, index, max_level, apply.stubs())?;
            let (patch, changed) = overwrite_patch(source, found, parent_id);
            apply.update(found.id, &patch)?;
            outcome.kind = OutcomeKind::Updated;
            outcome.changed_fields = changed;
        }
    }
    Ok(outcome)
}

/// Fold walk outcomes into a preview.
pub(crate) fn diff_report(
    outcomes: Vec<ItemOutcome>,
    implied: Vec<String>,
    ignored: Vec<NodeId>,
) -> DiffReport {
    let mut report = DiffReport {
        implied_missing_ancestors: implied,
        ignored,
        ..DiffReport::default()
    };
    for outcome in outcomes {
        match outcome.kind {
            OutcomeKind::Created => report.to_create.push(outcome.code),
            OutcomeKind::Updated => report.to_update.push(PlannedUpdate {
                target_id: outcome.node_id.unwrap_or_default(),
                code: outcome.code,
                changed_fields: outcome.changed_fields,
            }),
            OutcomeKind::Failed => report
                .invalid
                .push((outcome.code, outcome.error.unwrap_or_default())),
            _ => report.to_skip.push(outcome.code),
        }
    }
    report
}

impl<S: CatalogStore> CatalogEngine<S> {
    /// The source itself, or the source and its base-catalog descendants.
    pub(crate) fn clone_candidates(
        &self,
        source: &CatalogNode,
        include_descendants: bool,
    ) -> Result<Vec<CatalogNode>, CatalogError> {
        if !include_descendants {
            return Ok(vec![source.clone()]);
        }
        let base = self.store().list_nodes(source.org_id, None)?;
        let descendants = tree::collect_descendants(&base, source.id);
        Ok(base
            .into_iter()
            .filter(|n| n.id == source.id || descendants.contains(&n.id))
            .collect())
    }

    fn eligible_source(&self, source_id: NodeId) -> Result<CatalogNode, CatalogError> {
        let source = self.get(source_id)?;
        if !source.scope().is_base() {
            return Err(CatalogError::NotEligibleForClone {
                node: source.id,
                scope: source.scope(),
            });
        }
        Ok(source)
    }

    /// What [`execute_clone`](Self::execute_clone) would do now.
    pub fn preview_clone(
        &self,
        source_id: NodeId,
        target_project_id: ProjectId,
        include_descendants: bool,
        policy: ConflictPolicy,
    ) -> Result<DiffReport, CatalogError> {
        let _op = metrics::operation("preview_clone");
        let source = self.eligible_source(source_id)?;
        let candidates = self.clone_candidates(&source, include_descendants)?;
        let candidates = order_candidates(candidates, self.max_level());
        let target = Scope::project(source.org_id, target_project_id);
        self.preview_candidates(&candidates, target, policy, Vec::new())
    }

    /// Copy `source_id` (and optionally its subtree) from the base catalog
    /// into `target_project_id`.
    pub fn execute_clone(
        &self,
        source_id: NodeId,
        target_project_id: ProjectId,
        include_descendants: bool,
        policy: ConflictPolicy,
    ) -> Result<BatchOutcome, CatalogError> {
        let _op = metrics::operation("execute_clone");
        let source = self.eligible_source(source_id)?;
        let candidates = self.clone_candidates(&source, include_descendants)?;
        let candidates = order_candidates(candidates, self.max_level());
        let target = Scope::project(source.org_id, target_project_id);
        let outcome =
            self.execute_candidates(&candidates, target, policy, BatchOutcome::default())?;
        metrics::record_outcomes("clone", &outcome.counts);
        Ok(outcome)
    }

    pub(crate) fn preview_candidates(
        &self,
        candidates: &[CatalogNode],
        target: Scope,
        policy: ConflictPolicy,
        ignored: Vec<NodeId>,
    ) -> Result<DiffReport, CatalogError> {
        let existing = self.store().list_nodes(target.org_id, target.project_id)?;
        let mut dry_run = DryRun::default();
        let outcomes = plan_and_apply(
            candidates,
            target,
            &existing,
            policy,
            self.max_level(),
            &mut dry_run,
        );
        Ok(diff_report(outcomes, dry_run.stubs.planned, ignored))
    }

    pub(crate) fn execute_candidates(
        &self,
        candidates: &[CatalogNode],
        target: Scope,
        policy: ConflictPolicy,
        mut outcome: BatchOutcome,
    ) -> Result<BatchOutcome, CatalogError> {
        let existing = self.store().list_nodes(target.org_id, target.project_id)?;
        let mut persist = Persist::new(self.store());
        let max_level = self.max_level();
        for item in plan_and_apply(candidates, target, &existing, policy, max_level, &mut persist) {
            outcome.push(item);
        }
        outcome.ancestors_created += persist.stubs.created.len();
        log::info!(
            "Cloned into {}: {} created, {} updated, {} skipped, {} failed, {} ancestor stub(s)",
            target,
            outcome.counts.created,
            outcome.counts.updated,
            outcome.counts.skipped,
            outcome.counts.failed,
            outcome.ancestors_created
        );
        Ok(outcome)
    }
}
