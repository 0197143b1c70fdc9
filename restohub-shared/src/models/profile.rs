/// User profile model
///
/// Exactly one profile per user. It is created at registration and lazily
/// on login or first read for accounts that predate it.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{clean_text, double_option};

/// Largest accepted profile picture, in bytes
pub const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub country: Option<String>,

    /// Path of the stored picture, relative to the media root
    pub profile_picture: Option<String>,

    pub business_name: Option<String>,
    pub restaurant_address: Option<String>,
    pub joined_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a profile
#[derive(Debug, Clone, Default)]
pub struct CreateProfile {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub business_name: Option<String>,
}

/// Phone numbers after separators are stripped
pub static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("valid phone pattern"));

/// Partial profile update
///
/// Each field is `None` when absent from the request and `Some(None)` when
/// explicitly cleared.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(min = 2, max = 200, message = "Full name must be between 2 and 200 characters long."))]
    pub full_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(regex(path = *PHONE_PATTERN, message = "Enter a valid phone number, e.g. +15551234567."))]
    pub phone_number: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub country: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub business_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 1000, message = "Ensure this field has no more than 1000 characters."))]
    pub restaurant_address: Option<Option<String>>,
}

/// Strips spaces and dashes from a phone number
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

impl UpdateProfile {
    /// Trims text fields and strips phone separators
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.map(clean_text),
            phone_number: self
                .phone_number
                .map(|p| clean_text(p).map(|p| normalize_phone(&p))),
            country: self.country.map(clean_text),
            business_name: self.business_name.map(clean_text),
            restaurant_address: self.restaurant_address.map(clean_text),
        }
    }
}

impl UserProfile {
    /// Creates a profile
    pub async fn create<'e, E>(executor: E, data: CreateProfile) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles (user_id, full_name, business_name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.full_name)
        .bind(data.business_name)
        .fetch_one(executor)
        .await
    }

    /// Finds the profile of a user
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Returns the user's profile, creating one named `default_name` if missing
    pub async fn get_or_create(
        pool: &PgPool,
        user_id: Uuid,
        default_name: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, full_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(default_name)
        .execute(pool)
        .await?;

        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Applies a normalized, validated partial update
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        data: UpdateProfile,
    ) -> Result<Self, sqlx::Error> {
        let current = sqlx::query_as::<_, UserProfile>(
            "SELECT * FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles
            SET full_name = $2,
                phone_number = $3,
                country = $4,
                business_name = $5,
                restaurant_address = $6,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.full_name.unwrap_or(current.full_name))
        .bind(data.phone_number.unwrap_or(current.phone_number))
        .bind(data.country.unwrap_or(current.country))
        .bind(data.business_name.unwrap_or(current.business_name))
        .bind(data.restaurant_address.unwrap_or(current.restaurant_address))
        .fetch_one(pool)
        .await
    }

    /// Stores a new picture path and returns the previous one
    pub async fn set_picture(
        pool: &PgPool,
        user_id: Uuid,
        path: &str,
    ) -> Result<(Self, Option<String>), sqlx::Error> {
        let previous = sqlx::query_scalar::<_, Option<String>>(
            "SELECT profile_picture FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles
            SET profile_picture = $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(path)
        .fetch_one(pool)
        .await?;

        Ok((profile, previous))
    }
}
