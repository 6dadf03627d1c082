//! The catalog engine.
//!
//! [`CatalogEngine`] is stateless between calls: every operation takes its
//! scope explicitly, reads what it needs from the [`CatalogStore`], and writes
//! node by node. Multi-step operations (ancestor chains, clones, bulk moves,
//! imports) make partial progress and report per-item outcomes instead of
//! failing the whole batch. When all-or-nothing is needed, run the batch
//! through
//! [`PgCatalogStore::atomically_batch`](crate::store::PgCatalogStore::atomically_batch),
//! which rolls back as soon as any item failed.

pub mod ancestors;
pub mod bulk;
pub mod clone;
pub mod mutation;
pub mod scope;

use crate::code::MAX_LEVEL;
use crate::config::CatalogSettings;
use crate::error::CatalogError;
use crate::model::{CatalogNode, NodeId, Scope};
use crate::store::CatalogStore;
use serde::{Deserialize, Serialize};

pub use ancestors::ScopeIndex;

/// How a clone treats a candidate whose code already exists in the target
/// project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Copy every field, `is_active` and the parent link included
    OverwriteAll,
    /// Fill only the target's blank descriptive fields
    #[default]
    FillMissing,
    /// Leave existing target nodes alone
    SkipExisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Created,
    Updated,
    Skipped,
    Failed,
    Ignored,
    Moved,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Created => "created",
            OutcomeKind::Updated => "updated",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Failed => "failed",
            OutcomeKind::Ignored => "ignored",
            OutcomeKind::Moved => "moved",
        }
    }
}

/// Aggregate tally of a batch operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub ignored: usize,
    pub moved: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Created => self.created += 1,
            OutcomeKind::Updated => self.updated += 1,
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Failed => self.failed += 1,
            OutcomeKind::Ignored => self.ignored += 1,
            OutcomeKind::Moved => self.moved += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed + self.ignored + self.moved
    }
}

/// What happened to one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub code: String,
    /// Source node (clone, move) when there is one
    pub source_id: Option<NodeId>,
    /// Node written or matched in the target scope
    pub node_id: Option<NodeId>,
    pub kind: OutcomeKind,
    pub changed_fields: Vec<&'static str>,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub(crate) fn new(code: impl Into<String>, kind: OutcomeKind) -> Self {
        Self {
            code: code.into(),
            source_id: None,
            node_id: None,
            kind,
            changed_fields: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn failed(
        code: impl Into<String>,
        source_id: Option<NodeId>,
        err: &CatalogError,
    ) -> Self {
        Self {
            source_id,
            error: Some(err.to_string()),
            ..Self::new(code, OutcomeKind::Failed)
        }
    }
}

/// Result of a batch operation: the tally plus one entry per item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub counts: OutcomeCounts,
    pub items: Vec<ItemOutcome>,
    /// Ancestor stubs written along the way; not part of `counts`.
    pub ancestors_created: usize,
}

impl BatchOutcome {
    pub(crate) fn push(&mut self, item: ItemOutcome) {
        self.counts.record(item.kind);
        self.items.push(item);
    }

    /// Codes of every item with outcome `kind`, in processing order.
    pub fn codes(&self, kind: OutcomeKind) -> Vec<&str> {
        self.items
            .iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.code.as_str())
            .collect()
    }

    /// The outcome itself when no item failed, otherwise
    /// [`CatalogError::BatchIncomplete`] naming the first failure.
    pub fn into_complete(self) -> Result<Self, CatalogError> {
        if self.counts.failed == 0 {
            return Ok(self);
        }
        let first = self.items.iter().find(|i| i.kind == OutcomeKind::Failed);
        Err(CatalogError::BatchIncomplete {
            failed: self.counts.failed,
            first_code: first.map(|i| i.code.clone()).unwrap_or_default(),
            first_error: first.and_then(|i| i.error.clone()).unwrap_or_default(),
        })
    }
}

/// A planned update in a clone preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedUpdate {
    pub code: String,
    pub target_id: NodeId,
    pub changed_fields: Vec<&'static str>,
}

/// Dry-run result of a clone: what executing it now would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub to_create: Vec<String>,
    pub to_update: Vec<PlannedUpdate>,
    pub to_skip: Vec<String>,
    /// Ancestor codes that would be created as stubs
    pub implied_missing_ancestors: Vec<String>,
    /// Selected nodes that cannot be cloned (project-scoped or unknown)
    pub ignored: Vec<NodeId>,
    /// Candidates the preview could not plan, with the reason
    pub invalid: Vec<(String, String)>,
}

impl DiffReport {
    pub fn update_codes(&self) -> Vec<&str> {
        self.to_update.iter().map(|u| u.code.as_str()).collect()
    }

    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }
}

/// Scoped hierarchical catalog operations over a [`CatalogStore`].
///
/// ```
/// use scoped_catalog::{CatalogEngine, InMemoryCatalogStore, NodeInput, Scope};
///
/// let engine = CatalogEngine::new(InMemoryCatalogStore::new());
/// let scope = Scope::org(uuid::Uuid::new_v4());
/// let footing = engine
///     .create(None, NodeInput::new(scope, "CIVIL.CONCRETE.FOOTING", "Footing"))
///     .unwrap();
/// // CIVIL and CIVIL.CONCRETE were materialized on the way.
/// assert_eq!(engine.list_scope(scope).unwrap().len(), 3);
/// assert!(footing.parent_id.is_some());
/// ```
pub struct CatalogEngine<S: CatalogStore> {
    store: S,
    max_level: usize,
    default_policy: ConflictPolicy,
}

impl<S: CatalogStore> CatalogEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_level: MAX_LEVEL,
            default_policy: ConflictPolicy::default(),
        }
    }

    pub fn from_settings(store: S, settings: &CatalogSettings) -> Self {
        Self::new(store)
            .with_max_level(settings.effective_max_level())
            .with_default_policy(settings.default_policy)
    }

    /// Lower the maximum code depth. Clamped to `1..=MAX_LEVEL`.
    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level.clamp(1, MAX_LEVEL);
        self
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    pub fn with_default_policy(mut self, policy: ConflictPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// The configured clone policy, for callers that do not choose one.
    pub fn default_policy(&self) -> ConflictPolicy {
        self.default_policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn get(&self, id: NodeId) -> Result<CatalogNode, CatalogError> {
        self.store.get_node(id)?.ok_or(CatalogError::NodeNotFound(id))
    }

    /// Every node of exactly `scope`, ordered by code.
    pub fn list_scope(&self, scope: Scope) -> Result<Vec<CatalogNode>, CatalogError> {
        let mut nodes = self.store.list_nodes(scope.org_id, scope.project_id)?;
        nodes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(nodes)
    }

    /// Suggested code for a new node labelled `label` under `parent_code`;
    /// `None` when the label has no letters or digits.
    pub fn suggest_code(&self, parent_code: Option<&str>, label: &str) -> Option<String> {
        crate::code::suggest_code(parent_code, label)
    }
}
