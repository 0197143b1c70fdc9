/// Subscriptions mirrored from the payment processor
///
/// Each user has at most one subscription row. Paid plans start out
/// `pending` when a checkout session is opened and turn `active` once the
/// processor confirms payment through a webhook. The free starter plan is
/// activated immediately as a trial.
///
/// Nothing expires subscriptions in the background. Reads call
/// [`Subscription::expire_stale`] first, which flips `active` rows whose
/// `end_date` has passed to `expired`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Free 10-day trial
    Starter,

    /// $29.00 for 30 days
    Professional,

    /// $69.00 for 180 days
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Starter => "starter",
            Plan::Professional => "professional",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "starter" => Some(Plan::Starter),
            "professional" => Some(Plan::Professional),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }

    /// Price in US cents
    pub fn price_cents(&self) -> i64 {
        match self {
            Plan::Starter => 0,
            Plan::Professional => 2900,
            Plan::Enterprise => 6900,
        }
    }

    /// How long one purchase lasts
    pub fn duration(&self) -> Duration {
        match self {
            Plan::Starter => Duration::days(10),
            Plan::Professional => Duration::days(30),
            Plan::Enterprise => Duration::days(180),
        }
    }

    pub fn is_trial(&self) -> bool {
        matches!(self, Plan::Starter)
    }

    pub fn is_paid(&self) -> bool {
        self.price_cents() > 0
    }

    /// Name shown on the processor's product page
    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Starter => "Starter Plan",
            Plan::Professional => "Professional Plan",
            Plan::Enterprise => "Enterprise Plan",
        }
    }

    /// Plans sold through checkout
    pub fn paid_plans() -> [Plan; 2] {
        [Plan::Professional, Plan::Enterprise]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubscriptionStatus::Pending),
            "active" => Some(SubscriptionStatus::Active),
            "expired" => Some(SubscriptionStatus::Expired),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub price_cents: i64,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_trial: bool,
    pub auto_renew: bool,
    pub stripe_price_id: Option<String>,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent: Option<String>,
}

impl Subscription {
    pub fn get_plan(&self) -> Option<Plan> {
        Plan::from_str(&self.plan)
    }

    pub fn get_status(&self) -> Option<SubscriptionStatus> {
        SubscriptionStatus::from_str(&self.status)
    }

    /// Active means paid up and not past its end date
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.get_status() == Some(SubscriptionStatus::Active) && self.end_date > now
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// Marks stale active subscriptions of a user as expired
    pub async fn expire_stale(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'expired'
            WHERE user_id = $1 AND status = 'active' AND end_date <= NOW()
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Current subscription of a user, after expiring it if stale
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        Self::expire_stale(pool, user_id).await?;

        sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// A subscription by ID, only if owned by `user_id`
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::expire_stale(pool, user_id).await?;

        sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Starts `plan` immediately, replacing any previous subscription
    pub async fn activate_now(
        pool: &PgPool,
        user_id: Uuid,
        plan: Plan,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();

        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions
                (user_id, plan, price_cents, status, start_date, end_date, is_trial, auto_renew)
            VALUES ($1, $2, $3, 'active', $4, $5, $6, FALSE)
            ON CONFLICT (user_id) DO UPDATE
            SET plan = EXCLUDED.plan,
                price_cents = EXCLUDED.price_cents,
                status = 'active',
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                is_trial = EXCLUDED.is_trial,
                auto_renew = FALSE,
                stripe_price_id = NULL,
                stripe_session_id = NULL,
                stripe_payment_intent = NULL
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(plan.as_str())
        .bind(plan.price_cents())
        .bind(now)
        .bind(now + plan.duration())
        .bind(plan.is_trial())
        .fetch_one(pool)
        .await
    }

    /// Records a checkout session awaiting payment
    pub async fn upsert_pending(
        pool: &PgPool,
        user_id: Uuid,
        plan: Plan,
        stripe_price_id: &str,
        stripe_session_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();

        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions
                (user_id, plan, price_cents, status, start_date, end_date, is_trial,
                 auto_renew, stripe_price_id, stripe_session_id)
            VALUES ($1, $2, $3, 'pending', $4, $5, FALSE, FALSE, $6, $7)
            ON CONFLICT (user_id) DO UPDATE
            SET plan = EXCLUDED.plan,
                price_cents = EXCLUDED.price_cents,
                status = 'pending',
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                is_trial = FALSE,
                auto_renew = FALSE,
                stripe_price_id = EXCLUDED.stripe_price_id,
                stripe_session_id = EXCLUDED.stripe_session_id,
                stripe_payment_intent = NULL
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(plan.as_str())
        .bind(plan.price_cents())
        .bind(now)
        .bind(now + plan.duration())
        .bind(stripe_price_id)
        .bind(stripe_session_id)
        .fetch_one(pool)
        .await
    }

    /// Activates a user's subscription after a completed checkout
    ///
    /// The billing period restarts now. `plan` overrides the stored plan
    /// when the session metadata names one.
    pub async fn complete_checkout(
        pool: &PgPool,
        user_id: Uuid,
        plan: Option<Plan>,
        session_id: &str,
        payment_intent: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(current) =
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?
        else {
            return Ok(None);
        };

        let plan = plan.or_else(|| current.get_plan()).unwrap_or(Plan::Starter);
        let now = Utc::now();

        sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET plan = $2,
                price_cents = $3,
                status = 'active',
                start_date = $4,
                end_date = $5,
                is_trial = $6,
                stripe_session_id = $7,
                stripe_payment_intent = COALESCE($8, stripe_payment_intent)
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(plan.as_str())
        .bind(plan.price_cents())
        .bind(now)
        .bind(now + plan.duration())
        .bind(plan.is_trial())
        .bind(session_id)
        .bind(payment_intent)
        .fetch_optional(pool)
        .await
    }

    /// Sets the status of a user's subscription
    pub async fn set_status(
        pool: &PgPool,
        user_id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            "UPDATE subscriptions SET status = $2 WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(pool)
        .await
    }

    /// Cancels an active or pending subscription
    ///
    /// Returns `None` when there is nothing to cancel.
    pub async fn cancel(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        Self::expire_stale(pool, user_id).await?;

        sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = 'cancelled', auto_renew = FALSE
            WHERE user_id = $1 AND status IN ('active', 'pending')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}

/// Processor price registered for a paid plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlanPrice {
    pub plan: String,
    pub stripe_product_id: String,
    pub stripe_price_id: String,
    pub updated_at: DateTime<Utc>,
}

impl PlanPrice {
    pub async fn upsert(
        pool: &PgPool,
        plan: Plan,
        stripe_product_id: &str,
        stripe_price_id: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PlanPrice>(
            r#"
            INSERT INTO plan_prices (plan, stripe_product_id, stripe_price_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (plan) DO UPDATE
            SET stripe_product_id = EXCLUDED.stripe_product_id,
                stripe_price_id = EXCLUDED.stripe_price_id,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(plan.as_str())
        .bind(stripe_product_id)
        .bind(stripe_price_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, plan: Plan) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PlanPrice>("SELECT * FROM plan_prices WHERE plan = $1")
            .bind(plan.as_str())
            .fetch_optional(pool)
            .await
    }
}
