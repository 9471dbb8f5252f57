//! Patrols (inspection tasks)

use super::roads::Road;
use super::{patch_integer, patch_text, referenced_id, repo, Editable, TenantRecord};
use crate::api::ApiError;
use crate::store::StoreError;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patrol {
    pub id: i64,
    pub tenant_id: i64,
    pub road_id: i64,
    pub inspector_id: i64,
    pub date: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPatrol {
    pub road_id: i64,
    pub inspector_id: i64,
    pub date: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatrolPatch {
    pub road_id: Option<i64>,
    pub inspector_id: Option<i64>,
    pub date: Option<String>,
    pub status: Option<String>,
}

impl TenantRecord for Patrol {
    const TABLE: &'static str = "patrols";
    const KIND: &'static str = "patrol";
    const COLUMNS: &'static [&'static str] = &["road_id", "inspector_id", "date", "status"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Patrol {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            road_id: row.get("road_id")?,
            inspector_id: row.get("inspector_id")?,
            date: row.get("date")?,
            status: row.get("status")?,
        })
    }
}

impl Editable for Patrol {
    const LABEL: &'static str = "Patrol";

    type New = NewPatrol;
    type Patch = PatrolPatch;

    fn insert_values(new: NewPatrol) -> Result<Vec<Value>, ApiError> {
        Ok(vec![
            Value::Integer(new.road_id),
            Value::Integer(new.inspector_id),
            Value::Text(new.date),
            Value::Text(new.status),
        ])
    }

    fn patch_values(patch: PatrolPatch) -> Result<Vec<(&'static str, Value)>, ApiError> {
        let mut changes = Vec::new();
        patch_integer(&mut changes, "road_id", patch.road_id);
        patch_integer(&mut changes, "inspector_id", patch.inspector_id);
        patch_text(&mut changes, "date", patch.date);
        patch_text(&mut changes, "status", patch.status);
        Ok(changes)
    }

    fn check_references(
        conn: &Connection,
        tenant_id: i64,
        values: &[(&'static str, Value)],
    ) -> Result<(), StoreError> {
        if let Some(road_id) = referenced_id(values, "road_id") {
            repo::get::<Road>(conn, tenant_id, road_id)?;
        }
        Ok(())
    }
}
