//! Inspection reports

use super::plans::Plan;
use super::{patch_integer, patch_text, referenced_id, repo, Editable, TenantRecord};
use crate::api::ApiError;
use crate::store::StoreError;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: i64,
    pub tenant_id: i64,
    pub plan_id: i64,
    pub content: String,
    /// RFC 3339, stamped by the server on create
    pub created_time: String,
}

#[derive(Debug, Deserialize)]
pub struct NewReport {
    pub plan_id: i64,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportPatch {
    pub plan_id: Option<i64>,
    pub content: Option<String>,
}

impl TenantRecord for Report {
    const TABLE: &'static str = "reports";
    const KIND: &'static str = "report";
    const COLUMNS: &'static [&'static str] = &["plan_id", "content", "created_time"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Report {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            plan_id: row.get("plan_id")?,
            content: row.get("content")?,
            created_time: row.get("created_time")?,
        })
    }
}

impl Editable for Report {
    const LABEL: &'static str = "Report";

    type New = NewReport;
    type Patch = ReportPatch;

    fn insert_values(new: NewReport) -> Result<Vec<Value>, ApiError> {
        Ok(vec![
            Value::Integer(new.plan_id),
            Value::Text(new.content),
            Value::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        ])
    }

    fn patch_values(patch: ReportPatch) -> Result<Vec<(&'static str, Value)>, ApiError> {
        let mut changes = Vec::new();
        patch_integer(&mut changes, "plan_id", patch.plan_id);
        patch_text(&mut changes, "content", patch.content);
        Ok(changes)
    }

    fn check_references(
        conn: &Connection,
        tenant_id: i64,
        values: &[(&'static str, Value)],
    ) -> Result<(), StoreError> {
        if let Some(plan_id) = referenced_id(values, "plan_id") {
            repo::get::<Plan>(conn, tenant_id, plan_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_time_is_stamped_on_insert() {
        let values = Report::insert_values(NewReport {
            plan_id: 4,
            content: "cracks at km 3".to_string(),
        })
        .unwrap();

        let Value::Text(stamp) = &values[2] else {
            panic!("created_time should be text");
        };
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_created_time_cannot_be_patched() {
        let patch: ReportPatch =
            serde_json::from_str(r#"{"content":"fixed","created_time":"2000-01-01T00:00:00Z"}"#)
                .unwrap();
        let changes = Report::patch_values(patch).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "content");
    }

    fn conn_with_plan() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO plans (id, tenant_id, inspector_id, date) VALUES (1, 1, 5, '2024-05-01');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_plan_must_belong_to_tenant() {
        let conn = conn_with_plan();
        let values = [("plan_id", Value::Integer(1))];

        assert!(Report::check_references(&conn, 1, &values).is_ok());
        assert!(matches!(
            Report::check_references(&conn, 2, &values),
            Err(StoreError::NotFound("plan"))
        ));
    }

    #[test]
    fn test_missing_plan_is_not_found() {
        let conn = conn_with_plan();
        assert!(matches!(
            Report::check_references(&conn, 1, &[("plan_id", Value::Integer(99))]),
            Err(StoreError::NotFound("plan"))
        ));
        // Patches that leave plan_id alone skip the lookup
        assert!(Report::check_references(&conn, 1, &[("content", Value::Text("ok".into()))]).is_ok());
    }
}
