/// User model and database operations
///
/// A user is the tenant: every other user-owned row hangs off `users.id`
/// with `ON DELETE CASCADE`. Google-only accounts have no password hash.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(254) NOT NULL UNIQUE,
///     password_hash VARCHAR(255),
///     role VARCHAR(20) NOT NULL DEFAULT 'operations',
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_staff BOOLEAN NOT NULL DEFAULT FALSE,
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use restohub_shared::models::user::{User, CreateUser, Role};
/// # use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "owner@bistro.com".to_string(),
///     password_hash: None,
///     role: Role::Executive,
///     is_verified: true,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "owner@bistro.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Account role
///
/// Stored as text. `marketing manager` keeps its space for compatibility
/// with existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "operations")]
    Operations,

    #[serde(rename = "marketing manager")]
    MarketingManager,

    #[serde(rename = "executive")]
    Executive,

    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    /// Converts role to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operations => "operations",
            Role::MarketingManager => "marketing manager",
            Role::Executive => "executive",
            Role::Admin => "admin",
        }
    }

    /// Parses role from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "operations" => Some(Role::Operations),
            "marketing manager" => Some(Role::MarketingManager),
            "executive" => Some(Role::Executive),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Roles a user may pick for themselves at registration
    pub fn is_self_assignable(&self) -> bool {
        !matches!(self, Role::Admin)
    }

    /// All roles, in display order
    pub fn all() -> [Role; 4] {
        [Role::Operations, Role::MarketingManager, Role::Executive, Role::Admin]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercases and trims an email address before storage or lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Lowercased email address, unique across all users
    pub email: String,

    /// Argon2id hash; `None` for accounts created through Google login
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub role: String,

    pub is_active: bool,
    pub is_staff: bool,

    /// Set once the email OTP has been confirmed (or Google vouched for it)
    pub is_verified: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Gets the parsed role enum
    pub fn get_role(&self) -> Option<Role> {
        Role::from_str(&self.role)
    }

    /// Whether the account is an administrator
    pub fn is_admin(&self) -> bool {
        self.get_role() == Some(Role::Admin)
    }

    /// Local part of the email address, used as a default display name
    pub fn email_local_part(&self) -> &str {
        email_local_part(&self.email)
    }
}

/// Everything before the `@`, or the whole string when there is none
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub is_verified: bool,
}

impl User {
    /// Creates a new user
    ///
    /// Accepts any executor so registration can create the user and its
    /// profile inside one transaction.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` if the email is taken.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role, is_verified, is_staff)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(normalize_email(&data.email))
        .bind(data.password_hash)
        .bind(data.role.as_str())
        .bind(data.is_verified || data.role == Role::Admin)
        .bind(data.role == Role::Admin)
        .fetch_one(executor)
        .await
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Lists every user, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    /// Removes an unverified account holding `email`
    ///
    /// Registration calls this so an abandoned sign-up never blocks a new
    /// one. Verified accounts are left untouched.
    pub async fn delete_unverified_by_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE email = $1 AND is_verified = FALSE")
            .bind(normalize_email(email))
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Marks the account as verified
    pub async fn mark_verified(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Replaces the password hash
    pub async fn set_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Deletes a user and, through cascades, everything it owns
    ///
    /// Returns `true` if a row was deleted. Stored files are not touched
    /// here; callers collect their paths first.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Paths of every stored file owned by a user
    ///
    /// Covers the profile picture, onboarding uploads and documents.
    pub async fn stored_files(pool: &PgPool, id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT profile_picture FROM user_profiles
                WHERE user_id = $1 AND profile_picture IS NOT NULL
            UNION ALL
            SELECT menu_file FROM onboarding_progress
                WHERE user_id = $1 AND menu_file IS NOT NULL
            UNION ALL
            SELECT document_file FROM onboarding_progress
                WHERE user_id = $1 AND document_file IS NOT NULL
            UNION ALL
            SELECT file_path FROM user_documents WHERE user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_strings() {
        for role in Role::all() {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("marketing_manager"), None);
        assert_eq!(Role::from_str("restaurant_owner"), None);
    }

    #[test]
    fn test_role_serde_uses_stored_names() {
        let json = serde_json::to_string(&Role::MarketingManager).unwrap();
        assert_eq!(json, r#""marketing manager""#);

        let role: Role = serde_json::from_str(r#""executive""#).unwrap();
        assert_eq!(role, Role::Executive);
    }

    #[test]
    fn test_admin_not_self_assignable() {
        assert!(Role::Operations.is_self_assignable());
        assert!(Role::MarketingManager.is_self_assignable());
        assert!(Role::Executive.is_self_assignable());
        assert!(!Role::Admin.is_self_assignable());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Chef@Bistro.COM "), "chef@bistro.com");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "chef@bistro.com".to_string(),
            password_hash: Some("$argon2id$secret".to_string()),
            role: "operations".to_string(),
            is_active: true,
            is_staff: false,
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(user.email_local_part(), "chef");
        assert_eq!(user.get_role(), Some(Role::Operations));
        assert!(!user.is_admin());
    }

    #[test]
    fn test_email_local_part_without_at_sign() {
        assert_eq!(email_local_part("chef@bistro.io"), "chef");
        assert_eq!(email_local_part("no-at-sign"), "no-at-sign");
    }
}
