/// One-time password storage
///
/// At most one live code exists per email: issuing a new code replaces the
/// previous one. Codes expire [`OTP_TTL_SECONDS`] after creation and lock
/// after [`MAX_OTP_ATTEMPTS`] wrong guesses.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::normalize_email;

/// Lifetime of an OTP
pub const OTP_TTL_SECONDS: i64 = 600;

/// Wrong guesses allowed before the code is locked
pub const MAX_OTP_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Otp {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub code: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Outcome of checking a submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
    TooManyAttempts,
}

impl Otp {
    /// When the code stops being accepted
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(OTP_TTL_SECONDS)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Compares a submitted code without touching the database
    ///
    /// Attempt exhaustion wins over expiry, which wins over the comparison.
    pub fn check(&self, submitted: &str, now: DateTime<Utc>) -> OtpCheck {
        if self.attempts >= MAX_OTP_ATTEMPTS {
            OtpCheck::TooManyAttempts
        } else if self.is_expired_at(now) {
            OtpCheck::Expired
        } else if self.code == submitted.trim() {
            OtpCheck::Valid
        } else {
            OtpCheck::Mismatch
        }
    }

    /// Stores `code` as the only live code for `email`
    pub async fn replace(pool: &PgPool, email: &str, code: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Otp>(
            r#"
            INSERT INTO otps (email, code)
            VALUES ($1, $2)
            ON CONFLICT (email)
            DO UPDATE SET code = EXCLUDED.code, attempts = 0, created_at = NOW()
            RETURNING *
            "#,
        )
        .bind(normalize_email(email))
        .bind(code)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Otp>("SELECT * FROM otps WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Counts a wrong guess
    pub async fn record_failed_attempt(pool: &PgPool, id: Uuid) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE otps SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Consumes the code for `email`
    pub async fn delete_for_email(pool: &PgPool, email: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM otps WHERE email = $1")
            .bind(normalize_email(email))
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn otp(code: &str, attempts: i32, age_seconds: i64) -> Otp {
        Otp {
            id: Uuid::new_v4(),
            email: "chef@bistro.com".to_string(),
            code: code.to_string(),
            attempts,
            created_at: Utc::now() - Duration::seconds(age_seconds),
        }
    }

    #[test]
    fn test_fresh_code_matches() {
        let now = Utc::now();
        assert_eq!(otp("123456", 0, 10).check("123456", now), OtpCheck::Valid);
        assert_eq!(otp("123456", 0, 10).check(" 123456 ", now), OtpCheck::Valid);
        assert_eq!(otp("123456", 0, 10).check("654321", now), OtpCheck::Mismatch);
    }

    #[test]
    fn test_code_expires_after_ten_minutes() {
        let now = Utc::now();
        assert_eq!(otp("123456", 0, 599).check("123456", now), OtpCheck::Valid);
        assert_eq!(otp("123456", 0, 601).check("123456", now), OtpCheck::Expired);
    }

    #[test]
    fn test_attempt_limit_takes_precedence() {
        let now = Utc::now();
        assert_eq!(
            otp("123456", MAX_OTP_ATTEMPTS, 10).check("123456", now),
            OtpCheck::TooManyAttempts
        );
        assert_eq!(
            otp("123456", MAX_OTP_ATTEMPTS, 900).check("000000", now),
            OtpCheck::TooManyAttempts
        );
        assert_eq!(
            otp("123456", MAX_OTP_ATTEMPTS - 1, 10).check("123456", now),
            OtpCheck::Valid
        );
    }
}
