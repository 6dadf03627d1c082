//! Value conversion utilities for SeaQuery to may_postgres.
//!
//! Statements for `catalog_nodes` are built with sea-query and rendered with
//! `PostgresQueryBuilder`, which yields `$n` placeholders plus a `Values`
//! list. [`with_converted_params`] owns typed copies of those values for the
//! duration of a closure and hands the closure the `&dyn ToSql` slice
//! `may_postgres` expects.
//!
//! NULLs keep their column type (`Option<Uuid>`, `Option<String>`, ...) so the
//! server-side type check accepts them.

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use may_postgres::types::ToSql;
use sea_query::Value;
use uuid::Uuid;

/// Convert SeaQuery values to may_postgres parameters and run `f` with them.
///
/// # Errors
///
/// Returns `StoreError::QueryError` if a value type the catalog schema never
/// binds is encountered.
pub fn with_converted_params<F, R>(values: &sea_query::Values, f: F) -> Result<R, StoreError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, StoreError>,
{
    let owned = values
        .iter()
        .map(to_owned_param)
        .collect::<Result<Vec<_>, _>>()?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| &**p as &dyn ToSql).collect();
    f(&params)
}

fn to_owned_param(value: &Value) -> Result<Box<dyn ToSql>, StoreError> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i32::from)),
        Value::SmallInt(v) => Box::new(v.map(i32::from)),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::String(v) => Box::new(v.as_ref().map(|s| {
            let s: &str = s;
            s.to_string()
        })),
        Value::Uuid(v) => Box::new(v.as_ref().map(|u| {
            let u: &Uuid = u;
            *u
        })),
        Value::ChronoDateTimeUtc(v) => Box::new(v.as_ref().map(|ts| {
            let ts: &DateTime<Utc> = ts;
            *ts
        })),
        Value::Json(v) => Box::new(
            v.as_ref()
                .map(|j| {
                    let j: &serde_json::Value = j;
                    serde_json::to_string(j)
                })
                .transpose()
                .map_err(|e| StoreError::QueryError(format!("Failed to serialize JSON: {e}")))?,
        ),
        other => {
            return Err(StoreError::QueryError(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}
