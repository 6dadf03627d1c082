//! Tabular import and export.
//!
//! Rows carry a `project_code` that the caller resolves to project ids (the
//! engine has no notion of projects beyond their ids). Import reuses the same
//! ancestor materialization as [`CatalogEngine::create`], row by row.

use crate::code;
use crate::engine::ancestors::{ensure_parent_chain, index_of, ScopeIndex, StoreStubs};
use crate::engine::{BatchOutcome, CatalogEngine, ItemOutcome, OutcomeKind};
use crate::error::CatalogError;
use crate::metrics;
use crate::model::{non_blank, NewNode, NodePatch, OrgId, ProjectId, Scope};
use crate::store::CatalogStore;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;

/// One row of a catalog sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Blank for the base catalog
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
}

impl ImportRow {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Read rows from CSV with a header line.
pub fn read_csv_rows<R: io::Read>(reader: R) -> Result<Vec<ImportRow>, csv::Error> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .collect()
}

/// Write rows as CSV with a header line.
pub fn write_csv_rows<W: io::Write>(writer: W, rows: &[ImportRow]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

impl<S: CatalogStore> CatalogEngine<S> {
    /// Import `rows` into `org_id`. A row whose code exists in its scope
    /// updates that node; otherwise the node is created, missing ancestors
    /// first. Failures are per row.
    pub fn import_rows(
        &self,
        org_id: OrgId,
        rows: &[ImportRow],
        projects: &HashMap<String, ProjectId>,
    ) -> Result<BatchOutcome, CatalogError> {
        let _op = metrics::operation("import_rows");
        let mut outcome = BatchOutcome::default();
        let mut indexes: HashMap<Scope, ScopeIndex> = HashMap::new();

        for (line, row) in rows.iter().enumerate() {
            let stubs = &mut outcome.ancestors_created;
            let item = match self.import_row(org_id, row, projects, &mut indexes, stubs) {
                Ok(item) => item,
                Err(err) => {
                    log::warn!("Import row {} ({}) failed: {}", line + 1, row.code.trim(), err);
                    ItemOutcome::failed(row.code.trim(), None, &err)
                }
            };
            outcome.push(item);
        }

        log::info!(
            "Imported {} row(s): {} created, {} updated, {} failed, {} ancestor stub(s)",
            rows.len(),
            outcome.counts.created,
            outcome.counts.updated,
            outcome.counts.failed,
            outcome.ancestors_created
        );
        metrics::record_outcomes("import", &outcome.counts);
        Ok(outcome)
    }

    fn import_row(
        &self,
        org_id: OrgId,
        row: &ImportRow,
        projects: &HashMap<String, ProjectId>,
        indexes: &mut HashMap<Scope, ScopeIndex>,
        ancestors_created: &mut usize,
    ) -> Result<ItemOutcome, CatalogError> {
        let scope = match row.project_code.as_deref().and_then(non_blank) {
            None => Scope::org(org_id),
            Some(project_code) => match projects.get(&project_code) {
                Some(&project_id) => Scope::project(org_id, project_id),
                None => return Err(CatalogError::UnknownProject(project_code)),
            },
        };
        let code = code::validate(&row.code, self.max_level())?;

        let index = match indexes.entry(scope) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(index_of(&self.store().list_nodes(scope.org_id, scope.project_id)?))
            }
        };

        if let Some(&id) = index.get(&code) {
            let patch = NodePatch {
                name: non_blank(&row.name),
                name_ar: row.name_ar.as_deref().and_then(non_blank).map(Some),
                unit_of_measure: row.unit_of_measure.as_deref().and_then(non_blank).map(Some),
                description: row.description.as_deref().and_then(non_blank).map(Some),
                is_active: row.is_active,
                position: row.position.map(Some),
                ..NodePatch::default()
            };
            self.store().update_node(id, &patch)?;
            return Ok(ItemOutcome {
                node_id: Some(id),
                ..ItemOutcome::new(code, OutcomeKind::Updated)
            });
        }

        let mut stubs = StoreStubs::new(self.store());
        let parent_id = ensure_parent_chain(scope, &code, index, self.max_level(), &mut stubs);
        *ancestors_created += stubs.created.len();
        let fields = NewNode {
            org_id: scope.org_id,
            project_id: scope.project_id,
            parent_id: parent_id?,
            name: non_blank(&row.name).unwrap_or_else(|| code::last_segment(&code).to_string()),
            code: code.clone(),
            name_ar: row.name_ar.as_deref().and_then(non_blank),
            description: row.description.as_deref().and_then(non_blank),
            unit_of_measure: row.unit_of_measure.as_deref().and_then(non_blank),
            is_active: row.is_active.unwrap_or(true),
            position: row.position,
        };
        let node = self.store().create_node(&fields)?;
        index.insert(code, node.id);
        Ok(ItemOutcome {
            node_id: Some(node.id),
            ..ItemOutcome::new(node.code, OutcomeKind::Created)
        })
    }

    /// Rows for every node of one scope, ordered by code. `project_code` is
    /// looked up in `projects` by id.
    pub fn export_rows(
        &self,
        org_id: OrgId,
        project_id: Option<ProjectId>,
        projects: &HashMap<String, ProjectId>,
    ) -> Result<Vec<ImportRow>, CatalogError> {
        let _op = metrics::operation("export_rows");
        let project_code = project_id.map(|id| {
            projects
                .iter()
                .find(|(_, p)| **p == id)
                .map_or_else(|| id.to_string(), |(code, _)| code.clone())
        });

        Ok(self
            .list_scope(Scope { org_id, project_id })?
            .into_iter()
            .map(|node| ImportRow {
                code: node.code,
                name: node.name,
                name_ar: node.name_ar,
                unit_of_measure: node.unit_of_measure,
                description: node.description,
                is_active: Some(node.is_active),
                project_code: project_code.clone(),
                position: node.position,
            })
            .collect())
    }
}
