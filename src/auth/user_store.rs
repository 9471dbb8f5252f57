//! User Storage
//! Mission: Tenant-scoped user accounts and credential checks over the shared store

use crate::auth::models::{UpdateUserRequest, User, UserRole};
use crate::records::{patch_text, repo, TenantRecord, UpdateOutcome};
use crate::store::{Store, StoreError};
use bcrypt::{hash, verify};
use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use tracing::{info, warn};

/// Login failure. Deliberately carries no detail about which check failed.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// User storage on top of the serialized store. Password hashing runs on
/// the blocking pool, never on the store worker.
#[derive(Clone)]
pub struct UserStore {
    store: Store,
    bcrypt_cost: u32,
    /// Verified against when the username is unknown.
    dummy_hash: Arc<str>,
}

impl UserStore {
    pub fn new(store: Store, bcrypt_cost: u32) -> Result<Self, StoreError> {
        let dummy_hash = hash("road-patrol-dummy-password", bcrypt_cost)
            .map_err(|e| StoreError::Internal(format!("Failed to hash password: {e}")))?;

        Ok(Self {
            store,
            bcrypt_cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, StoreError> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| StoreError::Internal(format!("password hashing task failed: {e}")))?
            .map_err(|e| StoreError::Internal(format!("Failed to hash password: {e}")))
    }

    /// Create an admin for `tenant_id` unless that tenant already has one.
    ///
    /// Returns `true` when an account was created.
    pub async fn ensure_admin(
        &self,
        tenant_id: i64,
        username: &str,
        password: &str,
    ) -> Result<bool, StoreError> {
        let admins: i64 = self
            .store
            .run("count_admins", move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE tenant_id = ?1 AND role = ?2",
                    params![tenant_id, UserRole::Admin.as_str()],
                    |row| row.get(0),
                )?)
            })
            .await?;

        if admins > 0 {
            return Ok(false);
        }

        self.create_user(tenant_id, username, password, UserRole::Admin)
            .await?;
        info!("🔐 Bootstrap admin created (tenant: {tenant_id}, username: {username})");
        warn!("⚠️  CHANGE BOOTSTRAP ADMIN PASSWORD IN PRODUCTION!");
        Ok(true)
    }

    /// Get user by username within a tenant
    pub async fn get_user_by_username(
        &self,
        tenant_id: i64,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let username = username.to_string();
        self.store
            .run("get_user_by_username", move |conn| {
                let sql = format!(
                    "SELECT id, tenant_id, {} FROM users WHERE tenant_id = ?1 AND username = ?2",
                    User::COLUMNS.join(", ")
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                Ok(stmt
                    .query_row(params![tenant_id, username], |row| User::from_row(row))
                    .optional()?)
            })
            .await
    }

    /// Check a username/password pair. Unknown users and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn verify_credentials(
        &self,
        tenant_id: i64,
        username: &str,
        password: &str,
    ) -> Result<User, CredentialError> {
        let user = self.get_user_by_username(tenant_id, username).await?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify(password, &stored_hash))
            .await
            .map_err(|e| StoreError::Internal(format!("password check task failed: {e}")))?
            .unwrap_or_else(|e| {
                warn!("Stored password hash could not be checked: {e}");
                false
            });

        match user {
            Some(user) if valid => Ok(user),
            _ => Err(CredentialError::InvalidCredentials),
        }
    }

    /// Create a new user
    pub async fn create_user(
        &self,
        tenant_id: i64,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, StoreError> {
        let password_hash = self.hash_password(password.to_string()).await?;
        let values = vec![
            Value::Text(username.to_string()),
            Value::Text(password_hash),
            Value::Text(role.as_str().to_string()),
        ];

        let user = self
            .store
            .run("create_user", move |conn| {
                repo::insert::<User>(conn, tenant_id, values)
            })
            .await?;

        info!(
            "✅ Created user: {} ({}, tenant {})",
            user.username,
            user.role.as_str(),
            user.tenant_id
        );
        Ok(user)
    }

    /// List all users of one tenant
    pub async fn list_users(&self, tenant_id: i64) -> Result<Vec<User>, StoreError> {
        self.store
            .run("list_users", move |conn| repo::list::<User>(conn, tenant_id))
            .await
    }

    /// Apply a partial update. A new password is always a change.
    pub async fn update_user(
        &self,
        tenant_id: i64,
        user_id: i64,
        update: UpdateUserRequest,
    ) -> Result<UpdateOutcome<User>, StoreError> {
        let password_hash = match update.password {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        let mut changes = Vec::new();
        patch_text(&mut changes, "username", update.username);
        patch_text(&mut changes, "password_hash", password_hash);
        patch_text(
            &mut changes,
            "role",
            update.role.map(|r| r.as_str().to_string()),
        );

        let outcome = self
            .store
            .run("update_user", move |conn| {
                repo::update::<User>(conn, tenant_id, user_id, changes)
            })
            .await?;

        if let UpdateOutcome::Updated(user) = &outcome {
            info!("✏️  Updated user: {} (tenant {})", user.username, tenant_id);
        }
        Ok(outcome)
    }

    /// Delete a user by ID
    pub async fn delete_user(&self, tenant_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.store
            .run("delete_user", move |conn| {
                repo::delete::<User>(conn, tenant_id, user_id)
            })
            .await?;

        info!("🗑️  Deleted user: {} (tenant {})", user_id, tenant_id);
        Ok(())
    }
}
