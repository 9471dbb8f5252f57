//! Roads

use super::{patch_integer, patch_real, patch_text, repo, Editable, TenantRecord, TenantScope};
use crate::api::{ApiError, AppState};
use crate::store::StoreError;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Road {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub length: f64,
    #[serde(rename = "type")]
    pub road_type: String,
    pub surface_material: String,
    pub construction_year: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewRoad {
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default, rename = "type")]
    pub road_type: String,
    #[serde(default)]
    pub surface_material: String,
    #[serde(default)]
    pub construction_year: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoadPatch {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub length: Option<f64>,
    #[serde(rename = "type")]
    pub road_type: Option<String>,
    pub surface_material: Option<String>,
    pub construction_year: Option<i64>,
}

impl TenantRecord for Road {
    const TABLE: &'static str = "roads";
    const KIND: &'static str = "road";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "latitude",
        "longitude",
        "length",
        "road_type",
        "surface_material",
        "construction_year",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Road {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            name: row.get("name")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            length: row.get("length")?,
            road_type: row.get("road_type")?,
            surface_material: row.get("surface_material")?,
            construction_year: row.get("construction_year")?,
        })
    }
}

impl Editable for Road {
    const LABEL: &'static str = "Road";

    type New = NewRoad;
    type Patch = RoadPatch;

    fn insert_values(new: NewRoad) -> Result<Vec<Value>, ApiError> {
        if new.name.trim().is_empty() {
            return Err(ApiError::BadRequest("Road name must not be empty".into()));
        }
        Ok(vec![
            Value::Text(new.name),
            Value::Real(new.latitude),
            Value::Real(new.longitude),
            Value::Real(new.length),
            Value::Text(new.road_type),
            Value::Text(new.surface_material),
            Value::Integer(new.construction_year),
        ])
    }

    fn patch_values(patch: RoadPatch) -> Result<Vec<(&'static str, Value)>, ApiError> {
        if matches!(&patch.name, Some(name) if name.trim().is_empty()) {
            return Err(ApiError::BadRequest("Road name must not be empty".into()));
        }

        let mut changes = Vec::new();
        patch_text(&mut changes, "name", patch.name);
        patch_real(&mut changes, "latitude", patch.latitude);
        patch_real(&mut changes, "longitude", patch.longitude);
        patch_real(&mut changes, "length", patch.length);
        patch_text(&mut changes, "road_type", patch.road_type);
        patch_text(&mut changes, "surface_material", patch.surface_material);
        patch_integer(&mut changes, "construction_year", patch.construction_year);
        Ok(changes)
    }
}

/// Drops the road and its plan memberships together.
pub(crate) fn delete_road_tx(conn: &mut Connection, tenant_id: i64, id: i64) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    repo::delete::<Road>(&tx, tenant_id, id)?;
    let detached = tx.execute(
        "DELETE FROM plan_roads WHERE tenant_id = ?1 AND road_id = ?2",
        params![tenant_id, id],
    )?;
    tx.commit()?;

    if detached > 0 {
        info!(road_id = id, tenant_id, plans = detached, "🔗 Road removed from plans");
    }
    Ok(())
}

/// `DELETE /road/:id`
pub async fn delete_road(
    State(state): State<AppState>,
    scope: TenantScope,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = id?;
    let tenant_id = scope.tenant_id;

    state
        .store
        .run("delete_road", move |conn| delete_road_tx(conn, tenant_id, id))
        .await?;

    info!(road_id = id, tenant_id, user = %scope.claims.username, "🗑️ Road deleted");
    Ok(Json(json!({ "message": "Road deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_field_uses_wire_name() {
        let road: NewRoad =
            serde_json::from_str(r#"{"name":"Ring Rd","type":"highway","length":12.5}"#).unwrap();
        assert_eq!(road.road_type, "highway");
        assert_eq!(road.construction_year, 0);

        let stored = Road {
            id: 1,
            tenant_id: 1,
            name: road.name,
            latitude: 0.0,
            longitude: 0.0,
            length: road.length,
            road_type: road.road_type,
            surface_material: String::new(),
            construction_year: 0,
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["type"], "highway");
        assert!(json.get("road_type").is_none());
    }

    #[test]
    fn test_patch_lists_only_supplied_columns() {
        let patch: RoadPatch =
            serde_json::from_str(r#"{"type":"rural","construction_year":1999}"#).unwrap();
        let changes = Road::patch_values(patch).unwrap();
        let columns: Vec<&str> = changes.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, vec!["road_type", "construction_year"]);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let new: NewRoad = serde_json::from_str(r#"{"name":"  "}"#).unwrap();
        assert!(matches!(Road::insert_values(new), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_delete_road_detaches_it_from_plans() {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::store::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO roads (id, tenant_id, name) VALUES (1, 1, 'A'), (2, 1, 'B');
             INSERT INTO plans (id, tenant_id, inspector_id, date) VALUES (1, 1, 5, '2024-05-01');
             INSERT INTO plan_roads (tenant_id, plan_id, road_id) VALUES (1, 1, 1), (1, 1, 2);",
        )
        .unwrap();

        delete_road_tx(&mut conn, 1, 1).unwrap();

        let plans = crate::records::plans::list_plans_tx(&conn, 1).unwrap();
        assert_eq!(plans[0].road_ids, vec![2]);
        assert!(matches!(
            delete_road_tx(&mut conn, 1, 1),
            Err(StoreError::NotFound("road"))
        ));
    }

    #[test]
    fn test_delete_road_of_other_tenant_keeps_associations() {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::store::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO roads (id, tenant_id, name) VALUES (1, 1, 'A');
             INSERT INTO plan_roads (tenant_id, plan_id, road_id) VALUES (1, 1, 1);",
        )
        .unwrap();

        assert!(matches!(
            delete_road_tx(&mut conn, 2, 1),
            Err(StoreError::NotFound("road"))
        ));
        let kept: i64 = conn
            .query_row("SELECT COUNT(*) FROM plan_roads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kept, 1);
    }
}
