//! Catalog node model.
//!
//! [`CatalogNode`] is the strict value the engine works with. Records coming
//! from a hosted backend (JSON) or from PostgreSQL rows are mapped into it at
//! the boundary by [`CatalogNode::from_record`] and [`CatalogNode::from_row`];
//! nothing past that point sees loosely-typed data.

use crate::code;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

pub type NodeId = Uuid;
pub type OrgId = Uuid;
pub type ProjectId = Uuid;

/// The `(org_id, project_id)` pair a node belongs to. `project_id = None` is
/// the organization-wide base catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub org_id: OrgId,
    pub project_id: Option<ProjectId>,
}

impl Scope {
    pub fn org(org_id: OrgId) -> Self {
        Self {
            org_id,
            project_id: None,
        }
    }

    pub fn project(org_id: OrgId, project_id: ProjectId) -> Self {
        Self {
            org_id,
            project_id: Some(project_id),
        }
    }

    pub fn is_base(&self) -> bool {
        self.project_id.is_none()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.project_id {
            Some(project) => write!(f, "org {} / project {}", self.org_id, project),
            None => write!(f, "org {} / base catalog", self.org_id),
        }
    }
}

/// A work-item catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogNode {
    pub id: NodeId,
    pub org_id: OrgId,
    pub project_id: Option<ProjectId>,
    pub parent_id: Option<NodeId>,
    pub code: String,
    pub name: String,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    pub unit_of_measure: Option<String>,
    pub is_active: bool,
    pub position: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogNode {
    pub fn scope(&self) -> Scope {
        Scope {
            org_id: self.org_id,
            project_id: self.project_id,
        }
    }

    pub fn depth(&self) -> usize {
        code::depth(&self.code)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Map a loosely-typed record into a node.
    ///
    /// `id`, `org_id` and `code` are required. Strings are trimmed, the code is
    /// uppercased, blank optional strings become `None`, a missing `is_active`
    /// means active, and unknown fields are ignored. Timestamps default to now
    /// when absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ParseError` if a required field is missing or a
    /// present field has the wrong type.
    pub fn from_record(record: &JsonValue) -> Result<Self, StoreError> {
        let object = record
            .as_object()
            .ok_or_else(|| StoreError::ParseError("catalog record is not an object".to_string()))?;

        let uuid_field = |key: &str| -> Result<Option<Uuid>, StoreError> {
            match object.get(key) {
                None | Some(JsonValue::Null) => Ok(None),
                Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
                Some(JsonValue::String(s)) => Uuid::parse_str(s.trim())
                    .map(Some)
                    .map_err(|e| {
                        StoreError::ParseError(format!("field `{key}` is not a uuid: {e}"))
                    }),
                Some(other) => Err(StoreError::ParseError(format!(
                    "field `{key}` has unexpected type: {other}"
                ))),
            }
        };
        let text_field = |key: &str| -> Result<Option<String>, StoreError> {
            match object.get(key) {
                None | Some(JsonValue::Null) => Ok(None),
                Some(JsonValue::String(s)) => Ok(non_blank(s)),
                Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
                Some(other) => Err(StoreError::ParseError(format!(
                    "field `{key}` has unexpected type: {other}"
                ))),
            }
        };
        let time_field = |key: &str| -> Result<DateTime<Utc>, StoreError> {
            match object.get(key) {
                None | Some(JsonValue::Null) => Ok(Utc::now()),
                Some(JsonValue::String(s)) => DateTime::parse_from_rfc3339(s.trim())
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| {
                        StoreError::ParseError(format!("field `{key}` is not a timestamp: {e}"))
                    }),
                Some(other) => Err(StoreError::ParseError(format!(
                    "field `{key}` has unexpected type: {other}"
                ))),
            }
        };
        let required = |key: &str, value: Option<Uuid>| {
            value.ok_or_else(|| StoreError::ParseError(format!("missing required field `{key}`")))
        };

        let id = required("id", uuid_field("id")?)?;
        let org_id = required("org_id", uuid_field("org_id")?)?;
        let code = text_field("code")?
            .map(|c| c.to_uppercase())
            .ok_or_else(|| StoreError::ParseError("missing required field `code`".to_string()))?;

        let is_active = match object.get("is_active") {
            None | Some(JsonValue::Null) => true,
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::String(s)) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")
            }
            Some(JsonValue::Number(n)) => n.as_i64().map_or(false, |n| n != 0),
            Some(other) => {
                return Err(StoreError::ParseError(format!(
                    "field `is_active` has unexpected type: {other}"
                )))
            }
        };
        let position = match object.get("position") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Some(JsonValue::String(s)) if s.trim().is_empty() => None,
            Some(JsonValue::String(s)) => Some(s.trim().parse::<i32>().map_err(|e| {
                StoreError::ParseError(format!("field `position` is not an integer: {e}"))
            })?),
            Some(other) => {
                return Err(StoreError::ParseError(format!(
                    "field `position` has unexpected type: {other}"
                )))
            }
        };

        Ok(Self {
            id,
            org_id,
            project_id: uuid_field("project_id")?,
            parent_id: uuid_field("parent_id")?,
            name: text_field("name")?.unwrap_or_else(|| code::last_segment(&code).to_string()),
            code,
            name_ar: text_field("name_ar")?,
            description: text_field("description")?,
            unit_of_measure: text_field("unit_of_measure")?,
            is_active,
            position,
            created_at: time_field("created_at")?,
            updated_at: time_field("updated_at")?,
        })
    }

    /// Map a `catalog_nodes` row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ParseError` if a column is missing or has an
    /// unexpected type.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, StoreError> {
        fn column<'a, T: may_postgres::types::FromSql<'a>>(
            row: &'a may_postgres::Row,
            name: &str,
        ) -> Result<T, StoreError> {
            row.try_get(name)
                .map_err(|e| StoreError::ParseError(format!("Failed to read column `{name}`: {e}")))
        }

        let name_ar: Option<String> = column(row, "name_ar")?;
        let description: Option<String> = column(row, "description")?;
        let unit_of_measure: Option<String> = column(row, "unit_of_measure")?;

        Ok(Self {
            id: column(row, "id")?,
            org_id: column(row, "org_id")?,
            project_id: column(row, "project_id")?,
            parent_id: column(row, "parent_id")?,
            code: column(row, "code")?,
            name: column(row, "name")?,
            name_ar: name_ar.as_deref().and_then(non_blank),
            description: description.as_deref().and_then(non_blank),
            unit_of_measure: unit_of_measure.as_deref().and_then(non_blank),
            is_active: column(row, "is_active")?,
            position: column(row, "position")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }
}

/// Whether a descriptive field counts as blank (absent, empty or whitespace).
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Trimmed value, or `None` when blank.
pub fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Fields handed to [`CatalogStore::create_node`](crate::store::CatalogStore::create_node).
/// The store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNode {
    pub org_id: OrgId,
    pub project_id: Option<ProjectId>,
    pub parent_id: Option<NodeId>,
    pub code: String,
    pub name: String,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    pub unit_of_measure: Option<String>,
    pub is_active: bool,
    pub position: Option<i32>,
}

impl NewNode {
    /// A minimal stub for an implied ancestor: named after its last segment,
    /// active, position 0.
    pub fn stub(scope: Scope, parent_id: Option<NodeId>, code: &str) -> Self {
        Self {
            org_id: scope.org_id,
            project_id: scope.project_id,
            parent_id,
            code: code.to_string(),
            name: code::last_segment(code).to_string(),
            name_ar: None,
            description: None,
            unit_of_measure: None,
            is_active: true,
            position: Some(0),
        }
    }

    pub fn scope(&self) -> Scope {
        Scope {
            org_id: self.org_id,
            project_id: self.project_id,
        }
    }
}

/// A partial update. `None` leaves a column untouched; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePatch {
    pub project_id: Option<Option<ProjectId>>,
    pub parent_id: Option<Option<NodeId>>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub name_ar: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub unit_of_measure: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub position: Option<Option<i32>>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        *self == NodePatch::default()
    }

    /// Apply this patch to an in-memory node.
    pub fn apply_to(&self, node: &mut CatalogNode) {
        if let Some(project_id) = self.project_id {
            node.project_id = project_id;
        }
        if let Some(parent_id) = self.parent_id {
            node.parent_id = parent_id;
        }
        if let Some(code) = &self.code {
            node.code = code.clone();
        }
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(name_ar) = &self.name_ar {
            node.name_ar = name_ar.clone();
        }
        if let Some(description) = &self.description {
            node.description = description.clone();
        }
        if let Some(unit_of_measure) = &self.unit_of_measure {
            node.unit_of_measure = unit_of_measure.clone();
        }
        if let Some(is_active) = self.is_active {
            node.is_active = is_active;
        }
        if let Some(position) = self.position {
            node.position = position;
        }
    }
}

/// Caller input for [`CatalogEngine::create`](crate::engine::CatalogEngine::create).
///
/// `scope` is the requested scope; for a node created under a parent the
/// parent's project wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInput {
    pub scope: Scope,
    pub code: String,
    pub name: String,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    pub unit_of_measure: Option<String>,
    pub is_active: bool,
    pub position: Option<i32>,
}

impl NodeInput {
    pub fn new(scope: Scope, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope,
            code: code.into(),
            name: name.into(),
            name_ar: None,
            description: None,
            unit_of_measure: None,
            is_active: true,
            position: None,
        }
    }

    pub fn with_name_ar(mut self, name_ar: impl Into<String>) -> Self {
        self.name_ar = Some(name_ar.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_unit(mut self, unit_of_measure: impl Into<String>) -> Self {
        self.unit_of_measure = Some(unit_of_measure.into());
        self
    }

    pub fn with_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Caller input for [`CatalogEngine::update`](crate::engine::CatalogEngine::update).
/// `org_id` and `parent_id` are deliberately absent: the former is immutable,
/// the latter changes only through a move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub code: Option<String>,
    pub project_id: Option<Option<ProjectId>>,
    pub name: Option<String>,
    pub name_ar: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub unit_of_measure: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub position: Option<Option<i32>>,
}
