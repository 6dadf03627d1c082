//! Engine-level error taxonomy.
//!
//! Every engine operation returns `CatalogError` so callers can render a
//! specific message (or tally a kind) instead of matching on strings.

use crate::model::{NodeId, Scope};
use crate::store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum CatalogError {
    /// Code deeper than the configured maximum level
    CodeDepthExceeded {
        code: String,
        depth: usize,
        max_level: usize,
    },
    /// Another node in the same scope already uses this code
    DuplicateCode {
        code: String,
        scope: Scope,
        existing: NodeId,
    },
    /// The target parent is the node itself or one of its descendants
    CircularMove { node: NodeId, target_parent: NodeId },
    /// Delete refused while children reference the node
    HasChildren { node: NodeId, children: usize },
    /// A parent link or scope change would cross scopes
    ScopeMismatch { node: Option<NodeId>, reason: String },
    /// Only base-catalog nodes can be cloned into a project
    NotEligibleForClone { node: NodeId, scope: Scope },
    /// Malformed code (empty, empty segment, illegal characters)
    InvalidCode { code: String, reason: String },
    /// A move would make a parent chain longer than the maximum level
    TreeDepthExceeded {
        node: NodeId,
        depth: usize,
        max_level: usize,
    },
    /// No node with this id
    NodeNotFound(NodeId),
    /// An import row names a project code the caller did not map
    UnknownProject(String),
    /// A batch run with all-or-nothing semantics had failing items
    BatchIncomplete {
        failed: usize,
        first_code: String,
        first_error: String,
    },
    /// Opaque persistence failure
    Store(StoreError),
}

impl CatalogError {
    /// Short stable name of the error kind, for logs and aggregate counts.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::CodeDepthExceeded { .. } => "code_depth_exceeded",
            CatalogError::DuplicateCode { .. } => "duplicate_code",
            CatalogError::CircularMove { .. } => "circular_move",
            CatalogError::HasChildren { .. } => "has_children",
            CatalogError::ScopeMismatch { .. } => "scope_mismatch",
            CatalogError::NotEligibleForClone { .. } => "not_eligible_for_clone",
            CatalogError::InvalidCode { .. } => "invalid_code",
            CatalogError::TreeDepthExceeded { .. } => "tree_depth_exceeded",
            CatalogError::NodeNotFound(_) => "node_not_found",
            CatalogError::UnknownProject(_) => "unknown_project",
            CatalogError::BatchIncomplete { .. } => "batch_incomplete",
            CatalogError::Store(_) => "store",
        }
    }

    /// Whether the error was raised by validation before anything was written.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            CatalogError::Store(_) | CatalogError::BatchIncomplete { .. }
        )
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::CodeDepthExceeded {
                code,
                depth,
                max_level,
            } => write!(
                f,
                "Code {code} has depth {depth}, deeper than the maximum of {max_level}"
            ),
            CatalogError::DuplicateCode { code, scope, .. } => {
                write!(f, "Code {code} already exists in {scope}")
            }
            CatalogError::CircularMove {
                node,
                target_parent,
            } => write!(
                f,
                "Cannot move node {node} under {target_parent}: \
                 the target is the node itself or one of its descendants"
            ),
            CatalogError::HasChildren { node, children } => write!(
                f,
                "Node {node} has {children} child node(s); delete them first"
            ),
            CatalogError::ScopeMismatch { node, reason } => match node {
                Some(node) => write!(f, "Scope mismatch for node {node}: {reason}"),
                None => write!(f, "Scope mismatch: {reason}"),
            },
            CatalogError::NotEligibleForClone { node, scope } => write!(
                f,
                "Node {node} belongs to {scope}; only base catalog nodes can be cloned"
            ),
            CatalogError::InvalidCode { code, reason } => {
                write!(f, "Invalid code `{code}`: {reason}")
            }
            CatalogError::TreeDepthExceeded {
                node,
                depth,
                max_level,
            } => write!(
                f,
                "Moving node {node} would nest it {depth} levels deep, \
                 deeper than the maximum of {max_level}"
            ),
            CatalogError::NodeNotFound(id) => write!(f, "Catalog node not found: {id}"),
            CatalogError::UnknownProject(code) => write!(f, "Unknown project code: {code}"),
            CatalogError::BatchIncomplete {
                failed,
                first_code,
                first_error,
            } => write!(
                f,
                "{failed} item(s) failed, first {first_code}: {first_error}"
            ),
            CatalogError::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CatalogError::NodeNotFound(id),
            other => CatalogError::Store(other),
        }
    }
}
