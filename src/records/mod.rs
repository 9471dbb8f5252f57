//! Tenant-Scoped Records
//! Mission: Generic tenant-filtered CRUD for roads, plans, patrols and reports
//!
//! Every record type maps onto one table carrying `id` and `tenant_id`.
//! The [`repo`] functions run inside a store job and never see a row that
//! belongs to another tenant.

pub mod handlers;
pub mod patrols;
pub mod plans;
pub mod reports;
pub mod roads;
mod scope;

pub use scope::{TenantQuery, TenantScope};

use crate::api::ApiError;
use crate::store::StoreError;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A row type stored in a tenant-keyed table.
pub trait TenantRecord: Serialize + Send + Sized + 'static {
    const TABLE: &'static str;
    /// Lowercase name used in "no {kind} found" messages.
    const KIND: &'static str;
    /// Data columns after `id` and `tenant_id`, in insert order.
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// A record type editable through the generic CRUD handlers.
pub trait Editable: TenantRecord {
    /// Capitalized name used in "<Label> deleted".
    const LABEL: &'static str;

    type New: DeserializeOwned + Send + 'static;
    type Patch: DeserializeOwned + Send + 'static;

    /// Values for [`TenantRecord::COLUMNS`], in the same order.
    fn insert_values(new: Self::New) -> Result<Vec<Value>, ApiError>;

    /// Only the supplied fields, as `(column, value)` pairs.
    fn patch_values(patch: Self::Patch) -> Result<Vec<(&'static str, Value)>, ApiError>;

    /// Rows named by id columns in `values` must exist in `tenant_id`.
    /// Runs in the same store job as the write it guards.
    fn check_references(
        _conn: &Connection,
        _tenant_id: i64,
        _values: &[(&'static str, Value)],
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The integer written to `column`, if the write touches it.
pub(crate) fn referenced_id(values: &[(&'static str, Value)], column: &str) -> Option<i64> {
    values.iter().find_map(|(c, v)| match v {
        Value::Integer(id) if *c == column => Some(*id),
        _ => None,
    })
}

/// Result of a partial update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<R> {
    Updated(R),
    /// Nothing differed from the stored row; carries the row as it was.
    Unchanged(R),
}

impl<R> UpdateOutcome<R> {
    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> UpdateOutcome<U> {
        match self {
            UpdateOutcome::Updated(r) => UpdateOutcome::Updated(f(r)),
            UpdateOutcome::Unchanged(r) => UpdateOutcome::Unchanged(f(r)),
        }
    }
}

/// Push an optional text field onto a patch.
pub(crate) fn patch_text(
    changes: &mut Vec<(&'static str, Value)>,
    column: &'static str,
    value: Option<String>,
) {
    if let Some(v) = value {
        changes.push((column, Value::Text(v)));
    }
}

pub(crate) fn patch_integer(
    changes: &mut Vec<(&'static str, Value)>,
    column: &'static str,
    value: Option<i64>,
) {
    if let Some(v) = value {
        changes.push((column, Value::Integer(v)));
    }
}

pub(crate) fn patch_real(
    changes: &mut Vec<(&'static str, Value)>,
    column: &'static str,
    value: Option<f64>,
) {
    if let Some(v) = value {
        changes.push((column, Value::Real(v)));
    }
}

/// Tenant-filtered SQL helpers. Call these only from inside `Store::run`.
pub mod repo {
    use super::{TenantRecord, UpdateOutcome};
    use crate::store::StoreError;
    use rusqlite::types::Value;
    use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

    fn select_sql<R: TenantRecord>() -> String {
        format!(
            "SELECT id, tenant_id, {} FROM {}",
            R::COLUMNS.join(", "),
            R::TABLE
        )
    }

    pub fn list<R: TenantRecord>(conn: &Connection, tenant_id: i64) -> Result<Vec<R>, StoreError> {
        let sql = format!("{} WHERE tenant_id = ?1 ORDER BY id", select_sql::<R>());
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![tenant_id], |row| R::from_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn find<R: TenantRecord>(
        conn: &Connection,
        tenant_id: i64,
        id: i64,
    ) -> Result<Option<R>, StoreError> {
        let sql = format!("{} WHERE tenant_id = ?1 AND id = ?2", select_sql::<R>());
        let mut stmt = conn.prepare_cached(&sql)?;
        Ok(stmt
            .query_row(params![tenant_id, id], |row| R::from_row(row))
            .optional()?)
    }

    /// Like [`find`], but a missing row is [`StoreError::NotFound`].
    pub fn get<R: TenantRecord>(conn: &Connection, tenant_id: i64, id: i64) -> Result<R, StoreError> {
        find::<R>(conn, tenant_id, id)?.ok_or(StoreError::NotFound(R::KIND))
    }

    /// Insert a row for `tenant_id` and read it back.
    pub fn insert<R: TenantRecord>(
        conn: &Connection,
        tenant_id: i64,
        values: Vec<Value>,
    ) -> Result<R, StoreError> {
        if values.len() != R::COLUMNS.len() {
            return Err(StoreError::Internal(format!(
                "{} insert expects {} values, got {}",
                R::KIND,
                R::COLUMNS.len(),
                values.len()
            )));
        }

        let placeholders = (0..values.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} (tenant_id, {}) VALUES (?1, {})",
            R::TABLE,
            R::COLUMNS.join(", "),
            placeholders
        );

        let mut bound = Vec::with_capacity(values.len() + 1);
        bound.push(Value::Integer(tenant_id));
        bound.extend(values);

        conn.prepare_cached(&sql)?.execute(params_from_iter(bound))?;
        get::<R>(conn, tenant_id, conn.last_insert_rowid())
    }

    /// Apply `changes` to one row, touching it only if some value differs.
    pub fn update<R: TenantRecord>(
        conn: &Connection,
        tenant_id: i64,
        id: i64,
        changes: Vec<(&'static str, Value)>,
    ) -> Result<UpdateOutcome<R>, StoreError> {
        let existing = get::<R>(conn, tenant_id, id)?;
        if changes.is_empty() {
            return Ok(UpdateOutcome::Unchanged(existing));
        }

        if let Some((column, _)) = changes.iter().find(|(c, _)| !R::COLUMNS.contains(c)) {
            return Err(StoreError::Internal(format!(
                "{column} is not a {} column",
                R::KIND
            )));
        }

        let assignments = changes
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{column} = ?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let differs = changes
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{column} IS NOT ?{}", i + 3))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "UPDATE {} SET {} WHERE tenant_id = ?1 AND id = ?2 AND ({})",
            R::TABLE,
            assignments,
            differs
        );

        let mut bound = Vec::with_capacity(changes.len() + 2);
        bound.push(Value::Integer(tenant_id));
        bound.push(Value::Integer(id));
        bound.extend(changes.into_iter().map(|(_, v)| v));

        let affected = conn.prepare_cached(&sql)?.execute(params_from_iter(bound))?;
        if affected == 0 {
            return Ok(UpdateOutcome::Unchanged(existing));
        }
        Ok(UpdateOutcome::Updated(get::<R>(conn, tenant_id, id)?))
    }

    pub fn delete<R: TenantRecord>(conn: &Connection, tenant_id: i64, id: i64) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE tenant_id = ?1 AND id = ?2", R::TABLE);
        let affected = conn.prepare_cached(&sql)?.execute(params![tenant_id, id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(R::KIND));
        }
        Ok(())
    }
}
