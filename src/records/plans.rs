//! Inspection Plans
//! Mission: Plans plus the roads each plan covers
//!
//! The `plan_roads` association is written in the same store job, inside one
//! transaction, as the plan row it belongs to.

use super::handlers::update_response;
use super::{patch_integer, patch_text, repo, TenantRecord, TenantScope, UpdateOutcome};
use crate::api::{ApiError, AppState};
use crate::records::roads::Road;
use crate::store::StoreError;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub id: i64,
    pub tenant_id: i64,
    pub inspector_id: i64,
    pub date: String,
    pub status: String,
    pub road_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NewPlan {
    pub inspector_id: i64,
    pub date: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub road_ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanPatch {
    pub inspector_id: Option<i64>,
    pub date: Option<String>,
    pub status: Option<String>,
    /// Replaces the full set of associated roads when present.
    pub road_ids: Option<Vec<i64>>,
}

impl TenantRecord for Plan {
    const TABLE: &'static str = "plans";
    const KIND: &'static str = "plan";
    const COLUMNS: &'static [&'static str] = &["inspector_id", "date", "status"];

    /// `road_ids` is filled in separately from `plan_roads`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Plan {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            inspector_id: row.get("inspector_id")?,
            date: row.get("date")?,
            status: row.get("status")?,
            road_ids: Vec::new(),
        })
    }
}

fn validate_date(date: &str) -> Result<(), ApiError> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| ApiError::BadRequest("Invalid date format".into()))
}

/// Sorted, without duplicates.
fn normalize_road_ids(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn load_road_ids(conn: &Connection, tenant_id: i64, plan_id: i64) -> Result<Vec<i64>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT road_id FROM plan_roads WHERE tenant_id = ?1 AND plan_id = ?2 ORDER BY road_id",
    )?;
    let ids = stmt.query_map(params![tenant_id, plan_id], |row| row.get(0))?;
    Ok(ids.collect::<rusqlite::Result<Vec<i64>>>()?)
}

fn with_roads(conn: &Connection, mut plan: Plan) -> Result<Plan, StoreError> {
    plan.road_ids = load_road_ids(conn, plan.tenant_id, plan.id)?;
    Ok(plan)
}

/// Every associated road must exist in the same tenant.
fn replace_road_ids(
    conn: &Connection,
    tenant_id: i64,
    plan_id: i64,
    road_ids: &[i64],
) -> Result<(), StoreError> {
    for road_id in road_ids {
        repo::get::<Road>(conn, tenant_id, *road_id)?;
    }

    conn.prepare_cached("DELETE FROM plan_roads WHERE tenant_id = ?1 AND plan_id = ?2")?
        .execute(params![tenant_id, plan_id])?;

    let mut insert = conn.prepare_cached(
        "INSERT INTO plan_roads (tenant_id, plan_id, road_id) VALUES (?1, ?2, ?3)",
    )?;
    for road_id in road_ids {
        insert.execute(params![tenant_id, plan_id, road_id])?;
    }
    Ok(())
}

pub(crate) fn list_plans_tx(conn: &Connection, tenant_id: i64) -> Result<Vec<Plan>, StoreError> {
    repo::list::<Plan>(conn, tenant_id)?
        .into_iter()
        .map(|plan| with_roads(conn, plan))
        .collect()
}

pub(crate) fn create_plan_tx(
    conn: &mut Connection,
    tenant_id: i64,
    new: NewPlan,
) -> Result<Plan, StoreError> {
    let road_ids = normalize_road_ids(new.road_ids);
    let tx = conn.transaction()?;

    let mut plan = repo::insert::<Plan>(
        &tx,
        tenant_id,
        vec![
            Value::Integer(new.inspector_id),
            Value::Text(new.date),
            Value::Text(new.status),
        ],
    )?;
    replace_road_ids(&tx, tenant_id, plan.id, &road_ids)?;
    tx.commit()?;

    plan.road_ids = road_ids;
    Ok(plan)
}

pub(crate) fn update_plan_tx(
    conn: &mut Connection,
    tenant_id: i64,
    id: i64,
    changes: Vec<(&'static str, Value)>,
    road_ids: Option<Vec<i64>>,
) -> Result<UpdateOutcome<Plan>, StoreError> {
    let tx = conn.transaction()?;

    let before = with_roads(&tx, repo::get::<Plan>(&tx, tenant_id, id)?)?;
    let columns_changed = matches!(
        repo::update::<Plan>(&tx, tenant_id, id, changes)?,
        UpdateOutcome::Updated(_)
    );

    let roads_changed = match road_ids.map(normalize_road_ids) {
        Some(ids) if ids != before.road_ids => {
            replace_road_ids(&tx, tenant_id, id, &ids)?;
            true
        }
        _ => false,
    };

    if !columns_changed && !roads_changed {
        return Ok(UpdateOutcome::Unchanged(before));
    }

    let after = with_roads(&tx, repo::get::<Plan>(&tx, tenant_id, id)?)?;
    tx.commit()?;
    Ok(UpdateOutcome::Updated(after))
}

pub(crate) fn delete_plan_tx(conn: &mut Connection, tenant_id: i64, id: i64) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    repo::delete::<Plan>(&tx, tenant_id, id)?;
    tx.execute(
        "DELETE FROM plan_roads WHERE tenant_id = ?1 AND plan_id = ?2",
        params![tenant_id, id],
    )?;
    tx.commit()?;
    Ok(())
}

/// `GET /plans`
pub async fn list_plans(
    State(state): State<AppState>,
    scope: TenantScope,
) -> Result<Json<Vec<Plan>>, ApiError> {
    let tenant_id = scope.tenant_id;
    let plans = state
        .store
        .run("list_plans", move |conn| list_plans_tx(conn, tenant_id))
        .await?;
    Ok(Json(plans))
}

/// `POST /plan`
pub async fn create_plan(
    State(state): State<AppState>,
    scope: TenantScope,
    payload: Result<Json<NewPlan>, JsonRejection>,
) -> Result<(StatusCode, Json<Plan>), ApiError> {
    let Json(new) = payload?;
    validate_date(&new.date)?;
    let tenant_id = scope.tenant_id;

    let plan = state
        .store
        .run("create_plan", move |conn| create_plan_tx(conn, tenant_id, new))
        .await?;

    info!(plan_id = plan.id, tenant_id, roads = plan.road_ids.len(), "📋 Plan created");
    Ok((StatusCode::CREATED, Json(plan)))
}

/// `PUT /plan/:id`
pub async fn update_plan(
    State(state): State<AppState>,
    scope: TenantScope,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PlanPatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    if let Some(date) = &patch.date {
        validate_date(date)?;
    }

    let mut changes = Vec::new();
    patch_integer(&mut changes, "inspector_id", patch.inspector_id);
    patch_text(&mut changes, "date", patch.date);
    patch_text(&mut changes, "status", patch.status);
    let road_ids = patch.road_ids;
    let tenant_id = scope.tenant_id;

    let outcome = state
        .store
        .run("update_plan", move |conn| {
            update_plan_tx(conn, tenant_id, id, changes, road_ids)
        })
        .await?;

    Ok(update_response(outcome))
}

/// `DELETE /plan/:id`
pub async fn delete_plan(
    State(state): State<AppState>,
    scope: TenantScope,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = id?;
    let tenant_id = scope.tenant_id;

    state
        .store
        .run("delete_plan", move |conn| delete_plan_tx(conn, tenant_id, id))
        .await?;

    info!(plan_id = id, tenant_id, "🗑️ Plan deleted");
    Ok(Json(json!({ "message": "Plan deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_roads() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO roads (id, tenant_id, name) VALUES (1, 1, 'A'), (2, 1, 'B'), (3, 2, 'C');",
        )
        .unwrap();
        conn
    }

    fn new_plan(road_ids: Vec<i64>) -> NewPlan {
        NewPlan {
            inspector_id: 5,
            date: "2024-05-01".to_string(),
            status: "pending".to_string(),
            road_ids,
        }
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2024-05-01").is_ok());
        assert!(validate_date("2024/05/01").is_err());
        assert!(validate_date("2024-13-01").is_err());
    }

    #[test]
    fn test_create_plan_stores_road_associations() {
        let mut conn = conn_with_roads();
        let plan = create_plan_tx(&mut conn, 1, new_plan(vec![2, 1, 2])).unwrap();
        assert_eq!(plan.road_ids, vec![1, 2]);

        let listed = list_plans_tx(&conn, 1).unwrap();
        assert_eq!(listed, vec![plan]);
        assert!(list_plans_tx(&conn, 2).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_road_rolls_back_plan() {
        let mut conn = conn_with_roads();
        let err = create_plan_tx(&mut conn, 1, new_plan(vec![1, 3])).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("road")));
        assert!(list_plans_tx(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn test_update_only_road_ids_counts_as_change() {
        let mut conn = conn_with_roads();
        let plan = create_plan_tx(&mut conn, 1, new_plan(vec![1])).unwrap();

        let outcome = update_plan_tx(&mut conn, 1, plan.id, Vec::new(), Some(vec![1, 2])).unwrap();
        match outcome {
            UpdateOutcome::Updated(updated) => assert_eq!(updated.road_ids, vec![1, 2]),
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn test_update_with_same_values_is_unchanged() {
        let mut conn = conn_with_roads();
        let plan = create_plan_tx(&mut conn, 1, new_plan(vec![1, 2])).unwrap();

        let outcome = update_plan_tx(
            &mut conn,
            1,
            plan.id,
            vec![("status", Value::Text("pending".into()))],
            Some(vec![2, 1]),
        )
        .unwrap();
        assert_eq!(outcome, UpdateOutcome::Unchanged(plan));
    }

    #[test]
    fn test_delete_plan_removes_associations() {
        let mut conn = conn_with_roads();
        let plan = create_plan_tx(&mut conn, 1, new_plan(vec![1, 2])).unwrap();

        delete_plan_tx(&mut conn, 1, plan.id).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM plan_roads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);

        assert!(matches!(
            delete_plan_tx(&mut conn, 1, plan.id),
            Err(StoreError::NotFound("plan"))
        ));
    }

    #[test]
    fn test_other_tenant_cannot_update_plan() {
        let mut conn = conn_with_roads();
        let plan = create_plan_tx(&mut conn, 1, new_plan(vec![1])).unwrap();
        assert!(matches!(
            update_plan_tx(&mut conn, 2, plan.id, Vec::new(), None),
            Err(StoreError::NotFound("plan"))
        ));
    }
}
