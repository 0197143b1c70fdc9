/// Database-backed model tests
///
/// These need a PostgreSQL database and are ignored by default.
/// Run with: DATABASE_URL=postgresql://... cargo test --test models_db_tests -- --ignored --test-threads=1

use chrono::{Duration, Utc};
use restohub_shared::db::migrations::run_migrations;
use restohub_shared::db::pool::{create_pool, DatabaseConfig};
use restohub_shared::models::document::{
    CreateDocument, DocumentFilter, DocumentType, FileFormat, UserDocument,
};
use restohub_shared::models::metrics::operations::{CreateOperationReport, OperationReport};
use restohub_shared::models::metrics::MetricRecord;
use restohub_shared::models::onboarding::{OnboardingPatch, OnboardingProgress};
use restohub_shared::models::otp::{Otp, OtpCheck};
use restohub_shared::models::profile::{CreateProfile, UserProfile};
use restohub_shared::models::subscription::{Plan, Subscription, SubscriptionStatus};
use restohub_shared::models::user::{CreateUser, Role, User};
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(DatabaseConfig { url, ..Default::default() })
        .await
        .expect("database reachable");
    run_migrations(&pool).await.expect("migrations apply");
    pool
}

async fn user(pool: &PgPool, role: Role) -> User {
    User::create(
        pool,
        CreateUser {
            email: format!("{}@restohub.test", Uuid::new_v4().simple()),
            password_hash: Some("$argon2id$placeholder".to_string()),
            role,
            is_verified: true,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_admin_is_verified_staff() {
    let pool = pool().await;
    let admin = User::create(
        &pool,
        CreateUser {
            email: format!("{}@restohub.test", Uuid::new_v4().simple()),
            password_hash: None,
            role: Role::Admin,
            is_verified: false,
        },
    )
    .await
    .unwrap();

    assert!(admin.is_verified);
    assert!(admin.is_staff);
    User::delete(&pool, admin.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_email_lookup_is_case_insensitive() {
    let pool = pool().await;
    let created = user(&pool, Role::Executive).await;

    let found = User::find_by_email(&pool, &created.email.to_uppercase())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);

    User::delete(&pool, created.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_profile_get_or_create_is_idempotent() {
    let pool = pool().await;
    let owner = user(&pool, Role::Operations).await;

    let first = UserProfile::get_or_create(&pool, owner.id, "owner").await.unwrap();
    let second = UserProfile::get_or_create(&pool, owner.id, "someone else").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.full_name.as_deref(), Some("owner"));

    User::delete(&pool, owner.id).await.unwrap();
    assert!(UserProfile::find_by_user(&pool, owner.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_otp_replace_resets_attempts() {
    let pool = pool().await;
    let email = format!("{}@restohub.test", Uuid::new_v4().simple());

    let otp = Otp::replace(&pool, &email, "123456").await.unwrap();
    assert_eq!(Otp::record_failed_attempt(&pool, otp.id).await.unwrap(), 1);

    let otp = Otp::replace(&pool, &email, "654321").await.unwrap();
    assert_eq!(otp.attempts, 0);
    assert_eq!(otp.check("654321", Utc::now()), OtpCheck::Valid);
    assert_eq!(otp.check("654321", Utc::now() + Duration::minutes(11)), OtpCheck::Expired);

    Otp::delete_for_email(&pool, &email).await.unwrap();
    assert!(Otp::find_by_email(&pool, &email).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_onboarding_completion_is_sticky() {
    let pool = pool().await;
    let owner = user(&pool, Role::Operations).await;

    let mut progress = OnboardingProgress::blank(owner.id).insert(&pool).await.unwrap();
    assert_eq!(progress.current_step, 1);

    progress.apply(&OnboardingPatch { current_step: Some(9), ..Default::default() });
    let progress = progress.save(&pool).await.unwrap();
    assert!(progress.is_completed);

    let mut progress = progress;
    progress.apply(&OnboardingPatch { current_step: Some(4), ..Default::default() });
    let progress = progress.save(&pool).await.unwrap();
    assert_eq!(progress.current_step, 4);
    assert!(progress.is_completed);

    assert!(OnboardingProgress::blank(owner.id).insert(&pool).await.is_err());

    User::delete(&pool, owner.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_documents_are_owner_scoped() {
    let pool = pool().await;
    let owner = user(&pool, Role::Operations).await;
    let stranger = user(&pool, Role::Operations).await;

    let document = UserDocument::create(
        &pool,
        CreateDocument {
            user_id: owner.id,
            file_name: "march.xlsx".to_string(),
            document_type: DocumentType::Finance,
            file_format: FileFormat::Excel,
            file_path: "documents/march.xlsx".to_string(),
            file_size: 2048,
        },
    )
    .await
    .unwrap();

    assert!(UserDocument::find_for_user(&pool, document.id, stranger.id).await.unwrap().is_none());
    assert!(UserDocument::delete(&pool, document.id, stranger.id).await.unwrap().is_none());

    let filter = DocumentFilter {
        document_type: Some(DocumentType::Finance),
        file_format: None,
    };
    let listed = UserDocument::list_for_user(&pool, owner.id, &filter).await.unwrap();
    assert_eq!(listed.len(), 1);

    let files = User::stored_files(&pool, owner.id).await.unwrap();
    assert!(files.contains(&"documents/march.xlsx".to_string()));

    User::delete(&pool, owner.id).await.unwrap();
    User::delete(&pool, stranger.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_subscription_lifecycle() {
    let pool = pool().await;
    let owner = user(&pool, Role::Executive).await;

    let pending = Subscription::upsert_pending(&pool, owner.id, Plan::Professional, "price_1", "cs_1")
        .await
        .unwrap();
    assert_eq!(pending.get_status(), Some(SubscriptionStatus::Pending));
    assert!(!pending.is_active());

    let active = Subscription::complete_checkout(&pool, owner.id, None, "cs_1", Some("pi_1"))
        .await
        .unwrap()
        .unwrap();
    assert!(active.is_active());
    assert_eq!(active.get_plan(), Some(Plan::Professional));
    assert_eq!(active.stripe_payment_intent.as_deref(), Some("pi_1"));

    // Push the end date into the past; the next read expires it
    sqlx::query("UPDATE subscriptions SET end_date = NOW() - INTERVAL '1 day' WHERE user_id = $1")
        .bind(owner.id)
        .execute(&pool)
        .await
        .unwrap();
    let stale = Subscription::find_by_user(&pool, owner.id).await.unwrap().unwrap();
    assert_eq!(stale.get_status(), Some(SubscriptionStatus::Expired));

    assert!(Subscription::cancel(&pool, owner.id).await.unwrap().is_none());

    let trial = Subscription::activate_now(&pool, owner.id, Plan::Starter).await.unwrap();
    assert!(trial.is_trial);
    let cancelled = Subscription::cancel(&pool, owner.id).await.unwrap().unwrap();
    assert_eq!(cancelled.get_status(), Some(SubscriptionStatus::Cancelled));
    assert!(!cancelled.auto_renew);

    User::delete(&pool, owner.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_metric_rows_round_trip() {
    let pool = pool().await;
    let owner = user(&pool, Role::Operations).await;

    let input: CreateOperationReport = serde_json::from_value(serde_json::json!({
        "today_sales": 5400,
        "order_completed": 212,
        "delivery_on_time_rate": 94
    }))
    .unwrap();

    let row = OperationReport::insert(&pool, owner.id, input).await.unwrap();
    assert_eq!(row.date, Utc::now().date_naive());
    assert_eq!(row.shift_attendance, 0);

    let rows = OperationReport::list_for_user(&pool, owner.id).await.unwrap();
    assert_eq!(rows.len(), 1);

    assert!(OperationReport::delete_for_user(&pool, row.id, owner.id).await.unwrap());
    assert!(!OperationReport::delete_for_user(&pool, row.id, owner.id).await.unwrap());

    User::delete(&pool, owner.id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_profile_created_in_transaction() {
    let pool = pool().await;
    let email = format!("{}@restohub.test", Uuid::new_v4().simple());

    let mut tx = pool.begin().await.unwrap();
    let created = User::create(
        &mut *tx,
        CreateUser {
            email: email.clone(),
            password_hash: None,
            role: Role::MarketingManager,
            is_verified: false,
        },
    )
    .await
    .unwrap();
    UserProfile::create(
        &mut *tx,
        CreateProfile {
            user_id: created.id,
            full_name: Some("Rae".to_string()),
            business_name: Some("Rae's Diner".to_string()),
        },
    )
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    assert!(User::find_by_email(&pool, &email).await.unwrap().is_none());
}
