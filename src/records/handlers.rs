//! Generic CRUD handlers for [`Editable`] records

use super::{repo, Editable, TenantScope, UpdateOutcome};
use crate::api::{ApiError, AppState};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

/// `GET /<records>`
pub async fn list_records<R: Editable>(
    State(state): State<AppState>,
    scope: TenantScope,
) -> Result<Json<Vec<R>>, ApiError> {
    let tenant_id = scope.tenant_id;
    let records = state
        .store
        .run("list_records", move |conn| repo::list::<R>(conn, tenant_id))
        .await?;
    Ok(Json(records))
}

/// `POST /<record>` → 201 with the stored record
pub async fn create_record<R: Editable>(
    State(state): State<AppState>,
    scope: TenantScope,
    payload: Result<Json<R::New>, JsonRejection>,
) -> Result<(StatusCode, Json<R>), ApiError> {
    let Json(new) = payload?;
    let values = R::insert_values(new)?;
    let tenant_id = scope.tenant_id;

    let record = state
        .store
        .run("create_record", move |conn| {
            let columns: Vec<_> = R::COLUMNS.iter().copied().zip(values.iter().cloned()).collect();
            R::check_references(conn, tenant_id, &columns)?;
            repo::insert::<R>(conn, tenant_id, values)
        })
        .await?;

    info!(kind = R::KIND, tenant_id, user = %scope.claims.username, "➕ Record created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /<record>/:id`
pub async fn update_record<R: Editable>(
    State(state): State<AppState>,
    scope: TenantScope,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<R::Patch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let changes = R::patch_values(patch)?;
    let tenant_id = scope.tenant_id;

    let outcome = state
        .store
        .run("update_record", move |conn| {
            R::check_references(conn, tenant_id, &changes)?;
            repo::update::<R>(conn, tenant_id, id, changes)
        })
        .await?;

    Ok(update_response(outcome))
}

/// `DELETE /<record>/:id`
pub async fn delete_record<R: Editable>(
    State(state): State<AppState>,
    scope: TenantScope,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = id?;
    let tenant_id = scope.tenant_id;

    state
        .store
        .run("delete_record", move |conn| repo::delete::<R>(conn, tenant_id, id))
        .await?;

    info!(kind = R::KIND, id, tenant_id, user = %scope.claims.username, "🗑️ Record deleted");
    Ok(Json(json!({ "message": format!("{} deleted", R::LABEL) })))
}

/// 200 with the updated record, or `{message, data}` when nothing changed.
pub(crate) fn update_response<T: serde::Serialize>(outcome: UpdateOutcome<T>) -> Response {
    match outcome {
        UpdateOutcome::Updated(record) => Json(record).into_response(),
        UpdateOutcome::Unchanged(record) => Json(json!({
            "message": "No fields updated",
            "data": record,
        }))
        .into_response(),
    }
}
