//! Database Schema
//! Mission: Create the tenant-keyed tables on first open

use rusqlite::Connection;

/// Every table is keyed by tenant so all lookups can be tenant-filtered.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    username TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    UNIQUE (tenant_id, username)
);

CREATE TABLE IF NOT EXISTS roads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    latitude REAL NOT NULL DEFAULT 0,
    longitude REAL NOT NULL DEFAULT 0,
    length REAL NOT NULL DEFAULT 0,
    road_type TEXT NOT NULL DEFAULT '',
    surface_material TEXT NOT NULL DEFAULT '',
    construction_year INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_roads_tenant ON roads(tenant_id, id);

CREATE TABLE IF NOT EXISTS plans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    inspector_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_plans_tenant ON plans(tenant_id, id);

CREATE TABLE IF NOT EXISTS plan_roads (
    tenant_id INTEGER NOT NULL,
    plan_id INTEGER NOT NULL,
    road_id INTEGER NOT NULL,
    PRIMARY KEY (plan_id, road_id)
);
CREATE INDEX IF NOT EXISTS idx_plan_roads_tenant ON plan_roads(tenant_id, plan_id);

CREATE TABLE IF NOT EXISTS patrols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    road_id INTEGER NOT NULL,
    inspector_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_patrols_tenant ON patrols(tenant_id, id);

CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    plan_id INTEGER NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    created_time TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reports_tenant ON reports(tenant_id, id);
"#;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
