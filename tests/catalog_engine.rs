//! Engine behaviour against the in-memory store.
//!
//! These run without a database and cover the catalog contracts end to end:
//! union resolution, ancestor materialization, moves, deletes, clone policies
//! and the bulk variants.

use scoped_catalog::code::MAX_LEVEL;
use scoped_catalog::{
    CatalogEngine, CatalogError, CatalogNode, CatalogSettings, ConflictPolicy, InMemoryCatalogStore,
    NodeId, NodeInput, NodeUpdate, OutcomeKind, Scope,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

struct Fixture {
    engine: CatalogEngine<InMemoryCatalogStore>,
    org: Uuid,
    project: Uuid,
}

impl Fixture {
    fn new() -> Self {
        Self {
            engine: CatalogEngine::new(InMemoryCatalogStore::new()),
            org: Uuid::new_v4(),
            project: Uuid::new_v4(),
        }
    }

    fn base(&self) -> Scope {
        Scope::org(self.org)
    }

    fn site(&self) -> Scope {
        Scope::project(self.org, self.project)
    }

    fn create(&self, scope: Scope, code: &str, name: &str) -> CatalogNode {
        self.engine
            .create(None, NodeInput::new(scope, code, name))
            .unwrap_or_else(|e| panic!("create {code}: {e}"))
    }

    fn by_code(&self, scope: Scope, code: &str) -> Option<CatalogNode> {
        self.engine
            .list_scope(scope)
            .unwrap()
            .into_iter()
            .find(|n| n.code == code)
    }

    fn codes(&self, scope: Scope) -> Vec<String> {
        self.engine
            .list_scope(scope)
            .unwrap()
            .into_iter()
            .map(|n| n.code)
            .collect()
    }

    /// Base catalog used by most clone tests.
    fn seed_base(&self) -> CatalogNode {
        let civil = self.create(self.base(), "CIVIL", "Civil works");
        self.engine
            .create(
                None,
                NodeInput::new(self.base(), "CIVIL.CONCRETE", "Concrete")
                    .with_name_ar("خرسانة")
                    .with_unit("m3")
                    .with_description("Cast in place"),
            )
            .unwrap();
        self.create(self.base(), "CIVIL.CONCRETE.FOOTING", "Footing");
        self.create(self.base(), "CIVIL.STEEL", "Steel");
        civil
    }
}

/// Follow parent links from `id`; `None` when the walk does not reach a root
/// within `MAX_LEVEL` steps.
fn chain_length(nodes: &HashMap<NodeId, CatalogNode>, id: NodeId) -> Option<usize> {
    let mut current = nodes.get(&id)?;
    let mut steps = 1;
    while let Some(parent) = current.parent_id {
        if steps > MAX_LEVEL {
            return None;
        }
        current = nodes.get(&parent)?;
        steps += 1;
    }
    Some(steps)
}

#[test]
fn test_create_chain_of_children() {
    let fx = Fixture::new();
    let civil = fx.create(fx.base(), "CIVIL", "Civil");
    let concrete = fx
        .engine
        .create(Some(civil.id), NodeInput::new(fx.base(), "CIVIL.CONCRETE", "Concrete"))
        .unwrap();
    let footing = fx
        .engine
        .create(Some(concrete.id), NodeInput::new(fx.base(), "CIVIL.CONCRETE.FOOTING", "Footing"))
        .unwrap();

    assert_eq!(fx.engine.store().len(), 3);
    assert_eq!(
        [civil.depth(), concrete.depth(), footing.depth()],
        [1, 2, 3]
    );
    assert_eq!(concrete.parent_id, Some(civil.id));
    assert_eq!(footing.parent_id, Some(concrete.id));
    assert!([&civil, &concrete, &footing].iter().all(|n| n.scope() == fx.base()));
}

#[test]
fn test_create_too_deep_creates_nothing() {
    let fx = Fixture::new();
    let err = fx
        .engine
        .create(None, NodeInput::new(fx.base(), "A.B.C.D.E.F", "Too deep"))
        .unwrap_err();

    assert!(matches!(err, CatalogError::CodeDepthExceeded { depth: 6, max_level: 5, .. }));
    assert!(fx.engine.store().is_empty());
}

#[test]
fn test_fill_missing_only_fills_blank_fields() {
    let fx = Fixture::new();
    fx.seed_base();
    let source = fx.by_code(fx.base(), "CIVIL.CONCRETE").unwrap();
    fx.engine
        .create(
            None,
            NodeInput::new(fx.site(), "CIVIL.CONCRETE", "Site concrete")
                .with_unit("m3")
                .with_description("Precast"),
        )
        .unwrap();

    let preview = fx
        .engine
        .preview_clone(source.id, fx.project, false, ConflictPolicy::FillMissing)
        .unwrap();
    assert_eq!(preview.update_codes(), vec!["CIVIL.CONCRETE"]);
    assert_eq!(preview.to_update[0].changed_fields, vec!["name_ar"]);

    let outcome = fx
        .engine
        .execute_clone(source.id, fx.project, false, ConflictPolicy::FillMissing)
        .unwrap();
    assert_eq!(outcome.counts.updated, 1);
    assert_eq!(outcome.items[0].changed_fields, vec!["name_ar"]);

    let target = fx.by_code(fx.site(), "CIVIL.CONCRETE").unwrap();
    assert_eq!(target.name, "Site concrete");
    assert_eq!(target.name_ar.as_deref(), Some("خرسانة"));
    assert_eq!(target.description.as_deref(), Some("Precast"));
}

#[test]
fn test_move_under_own_descendant_is_rejected() {
    let fx = Fixture::new();
    fx.seed_base();
    let concrete = fx.by_code(fx.base(), "CIVIL.CONCRETE").unwrap();
    let footing = fx.by_code(fx.base(), "CIVIL.CONCRETE.FOOTING").unwrap();
    let before = fx.engine.store().all_nodes();

    let err = fx
        .engine
        .move_node(concrete.id, Some(footing.id), fx.base())
        .unwrap_err();
    assert!(matches!(err, CatalogError::CircularMove { node, target_parent }
        if node == concrete.id && target_parent == footing.id));

    let err = fx.engine.move_node(concrete.id, Some(concrete.id), fx.base()).unwrap_err();
    assert_eq!(err.kind(), "circular_move");
    assert_eq!(fx.engine.store().all_nodes(), before);
}

#[test]
fn test_delete_refuses_parent_then_allows_leaf_first() {
    let fx = Fixture::new();
    fx.create(fx.base(), "CIVIL.CONCRETE", "Concrete");
    let civil = fx.by_code(fx.base(), "CIVIL").unwrap();
    let concrete = fx.by_code(fx.base(), "CIVIL.CONCRETE").unwrap();

    let err = fx.engine.delete(civil.id).unwrap_err();
    assert!(matches!(err, CatalogError::HasChildren { children: 1, .. }));
    assert_eq!(fx.engine.store().len(), 2);

    fx.engine.delete(concrete.id).unwrap();
    fx.engine.delete(civil.id).unwrap();
    assert!(fx.engine.store().is_empty());
}

#[test]
fn test_bulk_clone_processes_shared_descendant_once() {
    let fx = Fixture::new();
    let civil = fx.seed_base();
    let concrete = fx.by_code(fx.base(), "CIVIL.CONCRETE").unwrap();
    let ids = [civil.id, concrete.id];

    let preview = fx
        .engine
        .preview_bulk_clone(&ids, fx.project, true, ConflictPolicy::SkipExisting)
        .unwrap();
    let outcome = fx
        .engine
        .execute_bulk_clone(&ids, fx.project, true, ConflictPolicy::SkipExisting)
        .unwrap();

    let footing_items = outcome
        .items
        .iter()
        .filter(|i| i.code == "CIVIL.CONCRETE.FOOTING")
        .count();
    assert_eq!(footing_items, 1);
    assert_eq!(outcome.counts.created, 4);
    assert_eq!(outcome.counts.total(), 4);
    assert_eq!(preview.to_create.len(), 4);
    assert_eq!(
        fx.codes(fx.site()),
        vec!["CIVIL", "CIVIL.CONCRETE", "CIVIL.CONCRETE.FOOTING", "CIVIL.STEEL"]
    );
}

#[test]
fn test_union_has_unique_codes_and_project_wins() {
    let fx = Fixture::new();
    fx.seed_base();
    fx.engine
        .create(None, NodeInput::new(fx.site(), "CIVIL.CONCRETE", "Site concrete"))
        .unwrap();
    fx.create(fx.site(), "SITE.FENCING", "Fencing");

    let union = fx.engine.resolve_union(fx.org, Some(fx.project), true).unwrap();
    let codes: HashSet<&str> = union.iter().map(|n| n.code.as_str()).collect();
    assert_eq!(codes.len(), union.len());

    let concrete = union.iter().find(|n| n.code == "CIVIL.CONCRETE").unwrap();
    assert_eq!(concrete.name, "Site concrete");
    assert_eq!(concrete.project_id, Some(fx.project));
    assert!(codes.contains("SITE") && codes.contains("CIVIL.STEEL"));

    let base_only = fx.engine.resolve_union(fx.org, None, true).unwrap();
    assert!(base_only.iter().all(|n| n.project_id.is_none()));
}

#[test]
fn test_inactive_nodes_stay_in_tree_but_leave_pick_list() {
    let fx = Fixture::new();
    fx.seed_base();
    let steel = fx.by_code(fx.base(), "CIVIL.STEEL").unwrap();
    let toggled = fx.engine.toggle_active(steel.id).unwrap();
    assert!(!toggled.is_active);

    let picks = fx.engine.pick_list(fx.org, None).unwrap();
    assert!(picks.iter().all(|n| n.code != "CIVIL.STEEL"));

    let tree = fx.engine.list_union(fx.org, None, true).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].size(), 4);

    assert!(fx.engine.toggle_active(steel.id).unwrap().is_active);
}

#[test]
fn test_depth_bound_holds_for_create_update_and_ancestors() {
    let fx = Fixture::new();
    let deep = fx.create(fx.base(), "A.B.C.D.E", "Deepest");
    assert_eq!(deep.depth(), MAX_LEVEL);
    assert_eq!(fx.engine.store().len(), 5);

    let err = fx
        .engine
        .create(Some(deep.id), NodeInput::new(fx.base(), "A.B.C.D.E.F", "Deeper"))
        .unwrap_err();
    assert_eq!(err.kind(), "code_depth_exceeded");

    let update = NodeUpdate {
        code: Some("A.B.C.D.E.F".to_string()),
        ..NodeUpdate::default()
    };
    assert!(fx.engine.update(deep.id, update).is_err());

    assert!(fx.engine.ensure_parent_chain(fx.base(), "X.Y.Z.W.V.U").is_err());
    assert_eq!(fx.engine.store().len(), 5);
    assert!(fx.engine.store().all_nodes().iter().all(|n| n.depth() <= MAX_LEVEL));
}

#[test]
fn test_moves_never_create_cycles_or_overlong_chains() {
    let fx = Fixture::new();
    fx.create(fx.base(), "A.B.C", "C");
    fx.create(fx.base(), "X.Y", "Y");
    let a = fx.by_code(fx.base(), "A").unwrap();
    let b = fx.by_code(fx.base(), "A.B").unwrap();
    let c = fx.by_code(fx.base(), "A.B.C").unwrap();
    let x = fx.by_code(fx.base(), "X").unwrap();
    let y = fx.by_code(fx.base(), "X.Y").unwrap();

    // A mix of legal and illegal moves; rejected ones must not change anything.
    let moves = [
        (a.id, Some(c.id)),
        (x.id, Some(c.id)),
        (a.id, Some(y.id)),
        (b.id, None),
        (a.id, Some(y.id)),
        (x.id, Some(b.id)),
        (c.id, Some(c.id)),
    ];
    let mut accepted = 0;
    for (id, parent) in moves {
        if fx.engine.move_node(id, parent, fx.base()).is_ok() {
            accepted += 1;
        }
    }
    assert!(accepted > 0 && accepted < moves.len());

    let nodes: HashMap<NodeId, CatalogNode> = fx
        .engine
        .store()
        .all_nodes()
        .into_iter()
        .map(|n| (n.id, n))
        .collect();
    for id in nodes.keys() {
        let length = chain_length(&nodes, *id);
        assert!(length.is_some_and(|l| l <= MAX_LEVEL), "chain from {id} is {length:?}");
    }
}

#[test]
fn test_move_deeper_than_max_level_is_rejected() {
    let fx = Fixture::new();
    let leaf = fx.create(fx.base(), "A.B.C.D", "D");
    fx.create(fx.base(), "X.Y", "Y");
    let x = fx.by_code(fx.base(), "X").unwrap();

    let err = fx.engine.move_node(x.id, Some(leaf.id), fx.base()).unwrap_err();
    assert!(matches!(err, CatalogError::TreeDepthExceeded { depth: 6, .. }));
}

#[test]
fn test_ancestors_are_materialized_in_empty_scope() {
    let fx = Fixture::new();
    let leaf = fx.create(fx.site(), "A.B.C", "C");

    assert_eq!(fx.codes(fx.site()), vec!["A", "A.B", "A.B.C"]);
    assert!(fx.codes(fx.base()).is_empty());

    let a = fx.by_code(fx.site(), "A").unwrap();
    let ab = fx.by_code(fx.site(), "A.B").unwrap();
    assert_eq!(a.name, "A");
    assert!(a.is_active);
    assert_eq!(ab.parent_id, Some(a.id));
    assert_eq!(leaf.parent_id, Some(ab.id));

    // Idempotent: a sibling reuses the stubs.
    fx.create(fx.site(), "A.B.D", "D");
    assert_eq!(fx.engine.store().len(), 4);
}

#[test]
fn test_child_inherits_parent_scope_on_create_and_move() {
    let fx = Fixture::new();
    let site_root = fx.create(fx.site(), "SITE", "Site works");

    // Requested scope is the base catalog, but the parent's scope wins.
    let child = fx
        .engine
        .create(Some(site_root.id), NodeInput::new(fx.base(), "SITE.GATE", "Gate"))
        .unwrap();
    assert_eq!(child.project_id, site_root.project_id);

    let loose = fx.create(fx.base(), "LOOSE", "Loose");
    let moved = fx.engine.move_node(loose.id, Some(site_root.id), fx.base()).unwrap();
    assert_eq!(moved.project_id, Some(fx.project));
    assert_eq!(moved.parent_id, Some(site_root.id));
}

#[test]
fn test_cross_scope_move_carries_subtree() {
    let fx = Fixture::new();
    fx.seed_base();
    let concrete = fx.by_code(fx.base(), "CIVIL.CONCRETE").unwrap();

    let moved = fx.engine.move_node(concrete.id, None, fx.site()).unwrap();
    assert_eq!(moved.project_id, Some(fx.project));
    assert_eq!(moved.parent_id, None);

    let footing = fx.by_code(fx.site(), "CIVIL.CONCRETE.FOOTING").unwrap();
    assert_eq!(footing.parent_id, Some(concrete.id));
    assert_eq!(fx.codes(fx.base()), vec!["CIVIL", "CIVIL.STEEL"]);
}

#[test]
fn test_cross_scope_move_with_code_clash_is_rejected() {
    let fx = Fixture::new();
    fx.seed_base();
    fx.create(fx.site(), "CIVIL.CONCRETE.FOOTING", "Site footing");
    let concrete = fx.by_code(fx.base(), "CIVIL.CONCRETE").unwrap();

    let err = fx.engine.move_node(concrete.id, None, fx.site()).unwrap_err();
    assert!(
        matches!(err, CatalogError::DuplicateCode { ref code, .. } if code == "CIVIL.CONCRETE")
    );
    assert!(fx.by_code(fx.base(), "CIVIL.CONCRETE").is_some());
}

#[test]
fn test_cross_scope_move_failing_midway_leaves_subtree_in_place() {
    let fx = Fixture::new();
    let c = fx.create(fx.base(), "A.B.C", "C");
    let root = fx.by_code(fx.base(), "A").unwrap();
    fx.engine.store().fail_writes_for_code("A.B.C");

    assert!(fx.engine.move_node(root.id, None, fx.site()).is_err());

    assert_eq!(fx.codes(fx.base()), vec!["A", "A.B", "A.B.C"]);
    assert!(fx.codes(fx.site()).is_empty());
    let leaf = fx.engine.get(c.id).unwrap();
    assert_eq!(leaf.project_id, None);
    assert_eq!(leaf.parent_id, fx.by_code(fx.base(), "A.B").map(|n| n.id));
}

#[test]
fn test_parent_from_another_org_is_scope_mismatch() {
    let fx = Fixture::new();
    let civil = fx.create(fx.base(), "CIVIL", "Civil");
    let other_org = Scope::org(Uuid::new_v4());

    let err = fx
        .engine
        .create(Some(civil.id), NodeInput::new(other_org, "CIVIL.X", "X"))
        .unwrap_err();
    assert_eq!(err.kind(), "scope_mismatch");

    let stranger = fx.create(other_org, "MISC", "Misc");
    let err = fx.engine.move_node(stranger.id, Some(civil.id), other_org).unwrap_err();
    assert!(matches!(err, CatalogError::ScopeMismatch { node: Some(id), .. } if id == stranger.id));
}

#[test]
fn test_duplicate_code_is_rejected_per_scope_only() {
    let fx = Fixture::new();
    let civil = fx.create(fx.base(), "CIVIL", "Civil");
    let err = fx
        .engine
        .create(None, NodeInput::new(fx.base(), "civil", "Again"))
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateCode { existing, .. } if existing == civil.id));

    // Same code in a project scope is an override, not a duplicate.
    fx.create(fx.site(), "CIVIL", "Site civil");

    let steel = fx.create(fx.base(), "STEEL", "Steel");
    let rename = NodeUpdate {
        code: Some("CIVIL".to_string()),
        ..NodeUpdate::default()
    };
    assert_eq!(fx.engine.update(steel.id, rename).unwrap_err().kind(), "duplicate_code");

    // Re-saving a node under its own code is fine.
    let same = NodeUpdate {
        code: Some("STEEL".to_string()),
        name: Some("Structural steel".to_string()),
        ..NodeUpdate::default()
    };
    assert_eq!(fx.engine.update(steel.id, same).unwrap().name, "Structural steel");
}

#[test]
fn test_skip_existing_clone_is_idempotent() {
    let fx = Fixture::new();
    let civil = fx.seed_base();

    let first = fx
        .engine
        .execute_clone(civil.id, fx.project, true, ConflictPolicy::SkipExisting)
        .unwrap();
    assert_eq!(first.counts.created, 4);

    let second = fx
        .engine
        .execute_clone(civil.id, fx.project, true, ConflictPolicy::SkipExisting)
        .unwrap();
    assert_eq!(second.counts.created, 0);
    assert_eq!(second.counts.updated, 0);
    assert_eq!(second.counts.skipped, 4);
    assert_eq!(fx.codes(fx.site()).len(), 4);
}

#[test]
fn test_configured_default_policy_drives_clone() {
    let fx = Fixture::new();
    let civil = fx.seed_base();
    fx.create(fx.site(), "CIVIL.CONCRETE", "Site concrete");
    let settings = CatalogSettings {
        max_level: MAX_LEVEL,
        default_policy: ConflictPolicy::SkipExisting,
    };
    let engine = CatalogEngine::from_settings(fx.engine.store(), &settings);

    let outcome = engine
        .execute_clone(civil.id, fx.project, true, engine.default_policy())
        .unwrap();
    assert_eq!(outcome.counts.updated, 0);
    assert!(outcome.codes(OutcomeKind::Skipped).contains(&"CIVIL.CONCRETE"));
    let kept = fx.by_code(fx.site(), "CIVIL.CONCRETE").unwrap();
    assert_eq!(kept.name, "Site concrete");
    assert_eq!(kept.unit_of_measure, None);
}

#[test]
fn test_preview_matches_execute_for_every_policy() {
    for policy in [
        ConflictPolicy::SkipExisting,
        ConflictPolicy::FillMissing,
        ConflictPolicy::OverwriteAll,
    ] {
        let fx = Fixture::new();
        let civil = fx.seed_base();
        fx.create(fx.site(), "CIVIL.CONCRETE", "Site concrete");
        fx.create(fx.site(), "CIVIL.STEEL", "");

        let preview = fx.engine.preview_clone(civil.id, fx.project, true, policy).unwrap();
        let outcome = fx.engine.execute_clone(civil.id, fx.project, true, policy).unwrap();

        assert_eq!(preview.to_create, outcome.codes(OutcomeKind::Created), "{policy:?}");
        assert_eq!(preview.update_codes(), outcome.codes(OutcomeKind::Updated), "{policy:?}");
        assert_eq!(preview.to_skip, outcome.codes(OutcomeKind::Skipped), "{policy:?}");
        assert!(preview.invalid.is_empty());
    }
}

#[test]
fn test_overwrite_all_rewrites_fields_and_parent() {
    let fx = Fixture::new();
    let civil = fx.seed_base();
    let stray = fx
        .engine
        .create(
            None,
            NodeInput::new(fx.site(), "CIVIL.CONCRETE", "Site concrete")
                .with_unit("t")
                .inactive(),
        )
        .unwrap();
    let site_civil = fx.by_code(fx.site(), "CIVIL").unwrap();
    // Detach the target so the clone has to recompute its parent.
    fx.engine.move_node(stray.id, None, fx.site()).unwrap();

    let outcome = fx
        .engine
        .execute_clone(civil.id, fx.project, true, ConflictPolicy::OverwriteAll)
        .unwrap();
    let item = outcome.items.iter().find(|i| i.code == "CIVIL.CONCRETE").unwrap();
    assert_eq!(item.kind, OutcomeKind::Updated);
    for field in ["name", "name_ar", "unit_of_measure", "is_active", "parent_id"] {
        assert!(item.changed_fields.contains(&field), "{field} missing");
    }

    let target = fx.by_code(fx.site(), "CIVIL.CONCRETE").unwrap();
    assert_eq!(target.id, stray.id);
    assert_eq!(target.name, "Concrete");
    assert_eq!(target.unit_of_measure.as_deref(), Some("m3"));
    assert!(target.is_active);
    assert_eq!(target.parent_id, Some(site_civil.id));
}

#[test]
fn test_fill_missing_leaves_is_active_and_parent_alone() {
    let fx = Fixture::new();
    let civil = fx.seed_base();
    let target = fx
        .engine
        .create(None, NodeInput::new(fx.site(), "CIVIL.CONCRETE", "").inactive())
        .unwrap();
    fx.engine.move_node(target.id, None, fx.site()).unwrap();

    fx.engine
        .execute_clone(civil.id, fx.project, true, ConflictPolicy::FillMissing)
        .unwrap();

    let after = fx.by_code(fx.site(), "CIVIL.CONCRETE").unwrap();
    assert!(!after.is_active);
    assert_eq!(after.parent_id, None);
    assert_eq!(after.unit_of_measure.as_deref(), Some("m3"));
}

#[test]
fn test_clone_from_project_scope_is_not_eligible() {
    let fx = Fixture::new();
    let site = fx.create(fx.site(), "SITE", "Site");

    let err = fx
        .engine
        .execute_clone(site.id, Uuid::new_v4(), false, ConflictPolicy::SkipExisting)
        .unwrap_err();
    assert_eq!(err.kind(), "not_eligible_for_clone");
    assert!(fx
        .engine
        .preview_clone(site.id, Uuid::new_v4(), false, ConflictPolicy::SkipExisting)
        .is_err());
}

#[test]
fn test_preview_lists_implied_ancestors_without_writing() {
    let fx = Fixture::new();
    fx.seed_base();
    let footing = fx.by_code(fx.base(), "CIVIL.CONCRETE.FOOTING").unwrap();
    let before = fx.engine.store().len();

    let preview = fx
        .engine
        .preview_clone(footing.id, fx.project, false, ConflictPolicy::FillMissing)
        .unwrap();
    assert_eq!(preview.to_create, vec!["CIVIL.CONCRETE.FOOTING"]);
    assert_eq!(preview.implied_missing_ancestors, vec!["CIVIL", "CIVIL.CONCRETE"]);
    assert_eq!(fx.engine.store().len(), before);

    let outcome = fx
        .engine
        .execute_clone(footing.id, fx.project, false, ConflictPolicy::FillMissing)
        .unwrap();
    assert_eq!(outcome.ancestors_created, 2);
    assert_eq!(fx.codes(fx.site()).len(), 3);
}

#[test]
fn test_clone_write_failures_are_counted_and_the_walk_continues() {
    let fx = Fixture::new();
    let civil = fx.seed_base();
    fx.create(fx.base(), "CIVIL.STEEL.REBAR", "Rebar");
    fx.engine.store().fail_writes_for_code("CIVIL.STEEL");

    let outcome = fx
        .engine
        .execute_clone(civil.id, fx.project, true, ConflictPolicy::SkipExisting)
        .unwrap();

    assert_eq!(outcome.counts.created, 3);
    // The rebar needs CIVIL.STEEL as an ancestor, which keeps failing.
    assert_eq!(outcome.codes(OutcomeKind::Failed), vec!["CIVIL.STEEL", "CIVIL.STEEL.REBAR"]);
    assert!(outcome
        .items
        .iter()
        .filter(|i| i.kind == OutcomeKind::Failed)
        .all(|i| i.error.is_some()));
    assert_eq!(
        fx.codes(fx.site()),
        vec!["CIVIL", "CIVIL.CONCRETE", "CIVIL.CONCRETE.FOOTING"]
    );
}

#[test]
fn test_bulk_move_reports_partial_failure() {
    let fx = Fixture::new();
    fx.seed_base();
    let archive = fx.create(fx.base(), "ARCHIVE", "Archive");
    let steel = fx.by_code(fx.base(), "CIVIL.STEEL").unwrap();
    let civil = fx.by_code(fx.base(), "CIVIL").unwrap();
    let missing = Uuid::new_v4();

    let outcome = fx
        .engine
        .bulk_move(&[steel.id, archive.id, missing], Some(civil.id), fx.base())
        .unwrap();

    // ARCHIVE moves fine; moving CIVIL's child under CIVIL is a no-op success.
    assert_eq!(outcome.counts.moved, 2);
    assert_eq!(outcome.counts.failed, 1);
    assert_eq!(outcome.items[2].source_id, Some(missing));
    assert_eq!(fx.by_code(fx.base(), "ARCHIVE").unwrap().parent_id, Some(civil.id));

    let outcome = fx.engine.bulk_move(&[civil.id], Some(steel.id), fx.base()).unwrap();
    assert_eq!(outcome.counts.failed, 1);
    assert_eq!(outcome.counts.moved, 0);
}

#[test]
fn test_bulk_clone_ignores_project_scoped_and_unknown_selections() {
    let fx = Fixture::new();
    let civil = fx.seed_base();
    let site = fx.create(fx.site(), "SITE", "Site");
    let missing = Uuid::new_v4();
    let target = Uuid::new_v4();
    let ids = [site.id, civil.id, missing];

    let preview = fx
        .engine
        .preview_bulk_clone(&ids, target, false, ConflictPolicy::OverwriteAll)
        .unwrap();
    assert_eq!(preview.ignored, vec![site.id, missing]);
    assert_eq!(preview.to_create, vec!["CIVIL"]);

    let outcome = fx
        .engine
        .execute_bulk_clone(&ids, target, false, ConflictPolicy::OverwriteAll)
        .unwrap();
    assert_eq!(outcome.counts.ignored, 2);
    assert_eq!(outcome.counts.created, 1);
    assert_eq!(outcome.codes(OutcomeKind::Ignored), vec!["SITE", &missing.to_string()[..]]);
}

#[test]
fn test_bulk_clone_of_only_ineligible_selections_is_a_noop() {
    let fx = Fixture::new();
    let site = fx.create(fx.site(), "SITE", "Site");

    let preview = fx
        .engine
        .preview_bulk_clone(&[site.id], Uuid::new_v4(), true, ConflictPolicy::FillMissing)
        .unwrap();
    assert!(preview.is_noop());
    assert_eq!(preview.ignored, vec![site.id]);
}

#[test]
fn test_suggest_code_builds_on_parent() {
    let fx = Fixture::new();
    let suggested = fx.engine.suggest_code(Some("CIVIL"), "Béton armé");
    assert_eq!(suggested.as_deref(), Some("CIVIL.BETON_ARME"));
    let suggested = fx.engine.suggest_code(None, "  site / works ");
    assert_eq!(suggested.as_deref(), Some("SITE_WORKS"));
}

#[test]
fn test_suggest_code_never_yields_an_invalid_code() {
    let fx = Fixture::new();
    let civil = fx.create(fx.base(), "CIVIL", "Civil");
    assert_eq!(fx.engine.suggest_code(Some(&civil.code), "---"), None);

    let code = fx.engine.suggest_code(Some(&civil.code), "Rebar & mesh").unwrap();
    let created = fx.create(fx.base(), &code, "Rebar & mesh");
    assert_eq!(created.parent_id, Some(civil.id));
}
