/// Onboarding wizard state
///
/// The wizard has nine steps:
///
/// 1. account setup: `owner_name`, `brand_name_dba`, `email`
/// 2. business location: `business_name`, `address`, `time_zone`, `service_model`
/// 3. franchise: `is_franchise`, `franchise_brand_name`, `locations_owned_operated`, `region_market`
/// 4. menu: `menu_url`, `menu_file`
/// 5. sales baseline: four non-negative sales estimates
/// 6. labor: `foh_employees`, `boh_employees`, `pay_cadence`
/// 7. documents: `document_file`
/// 8. marketing: `monthly_marketing_budget`, `key_policies`
/// 9. completion
///
/// Every field is optional. Clients send partial patches; the patch is
/// merged into the stored row, the merged row is validated, then written
/// back in full. Reaching step 9 sets `is_completed`, which never resets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidateUrl, ValidationError, ValidationErrors};

use super::{clean_text, double_option, field_error};

/// Final wizard step
pub const FINAL_STEP: i32 = 9;

/// Step holding the franchise questions
pub const FRANCHISE_STEP: i32 = 3;

pub const TIME_ZONES: &[&str] = &[
    "America/Los_Angeles",
    "America/Denver",
    "America/Chicago",
    "America/New_York",
];

pub const SERVICE_MODELS: &[&str] = &[
    "QSR",
    "Fast Casual",
    "Full Service",
    "Cafe",
    "Bar",
    "Catering",
    "Ghost Kitchen",
];

pub const FRANCHISE_CHOICES: &[&str] = &["YES", "NO"];

/// Largest accepted menu upload, in bytes
pub const MAX_MENU_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Largest accepted onboarding document upload, in bytes
pub const MAX_DOCUMENT_FILE_BYTES: usize = 15 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OnboardingProgress {
    pub id: Uuid,
    pub user_id: Uuid,

    pub owner_name: Option<String>,
    pub brand_name_dba: Option<String>,
    pub email: Option<String>,

    pub business_name: Option<String>,
    pub address: Option<String>,
    pub time_zone: Option<String>,
    pub service_model: Option<String>,

    pub is_franchise: Option<String>,
    pub franchise_brand_name: Option<String>,
    pub locations_owned_operated: Option<String>,
    pub region_market: Option<String>,

    pub menu_url: Option<String>,
    pub menu_file: Option<String>,

    pub estimated_instore_sales_last_month: Option<i64>,
    pub estimated_online_3p_sales_last_month: Option<i64>,
    pub estimated_instore_sales_last_12_months: Option<i64>,
    pub estimated_online_3p_sales_last_12_months: Option<i64>,

    pub foh_employees: Option<String>,
    pub boh_employees: Option<String>,
    pub pay_cadence: Option<String>,

    pub document_file: Option<String>,

    pub monthly_marketing_budget: Option<i64>,
    pub key_policies: Option<String>,

    pub is_completed: bool,
    pub current_step: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial onboarding update
///
/// `None` leaves a field untouched, `Some(None)` clears it. Blank strings
/// count as cleared.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct OnboardingPatch {
    #[validate(range(min = 1, max = 9, message = "Current step must be between 1 and 9"))]
    pub current_step: Option<i32>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub owner_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub brand_name_dba: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(email(message = "Enter a valid email address"), length(max = 254, message = "Enter a valid email address"))]
    pub email: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub business_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(custom(function = "time_zone_choice"))]
    pub time_zone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(custom(function = "service_model_choice"))]
    pub service_model: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(custom(function = "franchise_choice"))]
    pub is_franchise: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub franchise_brand_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub locations_owned_operated: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub region_market: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 2048, message = "Ensure this field has no more than 2048 characters."), custom(function = "http_url"))]
    pub menu_url: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, message = "This value cannot be negative"))]
    pub estimated_instore_sales_last_month: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, message = "This value cannot be negative"))]
    pub estimated_online_3p_sales_last_month: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, message = "This value cannot be negative"))]
    pub estimated_instore_sales_last_12_months: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, message = "This value cannot be negative"))]
    pub estimated_online_3p_sales_last_12_months: Option<Option<i64>>,

    #[serde(default, deserialize_with = "double_option")]
    pub foh_employees: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub boh_employees: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub pay_cadence: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, message = "This value cannot be negative"))]
    pub monthly_marketing_budget: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub key_policies: Option<Option<String>>,
}

fn clean(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(clean_text)
}

fn merge<T>(current: &mut Option<T>, patch: Option<Option<T>>) {
    if let Some(value) = patch {
        *current = value;
    }
}

fn http_url(url: &str) -> Result<(), ValidationError> {
    let lowered = url.to_ascii_lowercase();
    if (lowered.starts_with("http://") || lowered.starts_with("https://")) && url.validate_url() {
        Ok(())
    } else {
        Err(field_error("url", "Enter a valid URL"))
    }
}

fn one_of(value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(field_error("choice", format!("\"{}\" is not a valid choice.", value)))
    }
}

fn time_zone_choice(value: &str) -> Result<(), ValidationError> {
    one_of(value, TIME_ZONES)
}

fn service_model_choice(value: &str) -> Result<(), ValidationError> {
    one_of(value, SERVICE_MODELS)
}

fn franchise_choice(value: &str) -> Result<(), ValidationError> {
    one_of(value, FRANCHISE_CHOICES)
}

impl OnboardingPatch {
    /// Trims every text field, turning blanks into explicit clears
    pub fn normalized(self) -> Self {
        Self {
            current_step: self.current_step,
            owner_name: clean(self.owner_name),
            brand_name_dba: clean(self.brand_name_dba),
            email: clean(self.email),
            business_name: clean(self.business_name),
            address: clean(self.address),
            time_zone: clean(self.time_zone),
            service_model: clean(self.service_model),
            is_franchise: clean(self.is_franchise).map(|v| v.map(|s| s.to_uppercase())),
            franchise_brand_name: clean(self.franchise_brand_name),
            locations_owned_operated: clean(self.locations_owned_operated),
            region_market: clean(self.region_market),
            menu_url: clean(self.menu_url),
            estimated_instore_sales_last_month: self.estimated_instore_sales_last_month,
            estimated_online_3p_sales_last_month: self.estimated_online_3p_sales_last_month,
            estimated_instore_sales_last_12_months: self.estimated_instore_sales_last_12_months,
            estimated_online_3p_sales_last_12_months: self
                .estimated_online_3p_sales_last_12_months,
            foh_employees: clean(self.foh_employees),
            boh_employees: clean(self.boh_employees),
            pay_cadence: clean(self.pay_cadence),
            monthly_marketing_budget: self.monthly_marketing_budget,
            key_policies: clean(self.key_policies),
        }
    }

    /// Checks the patch against the row it will produce
    ///
    /// `merged` must be the result of applying this patch. Derived field
    /// rules look at the values supplied in the patch; the franchise gate
    /// looks at the merged row.
    pub fn validate_against(&self, merged: &OnboardingProgress) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_default();

        if merged.is_franchise.as_deref() == Some("YES") {
            let franchise_fields: [(&'static str, &Option<Option<String>>, &Option<String>); 3] = [
                (
                    "franchise_brand_name",
                    &self.franchise_brand_name,
                    &merged.franchise_brand_name,
                ),
                (
                    "locations_owned_operated",
                    &self.locations_owned_operated,
                    &merged.locations_owned_operated,
                ),
                ("region_market", &self.region_market, &merged.region_market),
            ];
            let advancing = self
                .current_step
                .map_or(false, |step| step > FRANCHISE_STEP);

            for (field, supplied, stored) in franchise_fields {
                let cleared = matches!(supplied, Some(None));
                let missing_when_advancing = advancing && stored.is_none();
                if cleared || missing_when_advancing {
                    errors.add(
                        field,
                        field_error("required", "This field is required when franchise is YES"),
                    );
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl OnboardingProgress {
    /// A fresh, unsaved record at step 1
    pub fn blank(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            owner_name: None,
            brand_name_dba: None,
            email: None,
            business_name: None,
            address: None,
            time_zone: None,
            service_model: None,
            is_franchise: None,
            franchise_brand_name: None,
            locations_owned_operated: None,
            region_market: None,
            menu_url: None,
            menu_file: None,
            estimated_instore_sales_last_month: None,
            estimated_online_3p_sales_last_month: None,
            estimated_instore_sales_last_12_months: None,
            estimated_online_3p_sales_last_12_months: None,
            foh_employees: None,
            boh_employees: None,
            pay_cadence: None,
            document_file: None,
            monthly_marketing_budget: None,
            key_policies: None,
            is_completed: false,
            current_step: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges a normalized patch into this record
    ///
    /// Moving to the final step marks the wizard complete. Moving back
    /// afterwards keeps it complete.
    pub fn apply(&mut self, patch: &OnboardingPatch) {
        let patch = patch.clone();

        if let Some(step) = patch.current_step {
            self.current_step = step;
            if step == FINAL_STEP {
                self.is_completed = true;
            }
        }

        merge(&mut self.owner_name, patch.owner_name);
        merge(&mut self.brand_name_dba, patch.brand_name_dba);
        merge(&mut self.email, patch.email);
        merge(&mut self.business_name, patch.business_name);
        merge(&mut self.address, patch.address);
        merge(&mut self.time_zone, patch.time_zone);
        merge(&mut self.service_model, patch.service_model);
        merge(&mut self.is_franchise, patch.is_franchise);
        merge(&mut self.franchise_brand_name, patch.franchise_brand_name);
        merge(&mut self.locations_owned_operated, patch.locations_owned_operated);
        merge(&mut self.region_market, patch.region_market);
        merge(&mut self.menu_url, patch.menu_url);
        merge(
            &mut self.estimated_instore_sales_last_month,
            patch.estimated_instore_sales_last_month,
        );
        merge(
            &mut self.estimated_online_3p_sales_last_month,
            patch.estimated_online_3p_sales_last_month,
        );
        merge(
            &mut self.estimated_instore_sales_last_12_months,
            patch.estimated_instore_sales_last_12_months,
        );
        merge(
            &mut self.estimated_online_3p_sales_last_12_months,
            patch.estimated_online_3p_sales_last_12_months,
        );
        merge(&mut self.foh_employees, patch.foh_employees);
        merge(&mut self.boh_employees, patch.boh_employees);
        merge(&mut self.pay_cadence, patch.pay_cadence);
        merge(&mut self.monthly_marketing_budget, patch.monthly_marketing_budget);
        merge(&mut self.key_policies, patch.key_policies);
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, OnboardingProgress>(
            "SELECT * FROM onboarding_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Inserts this record
    ///
    /// Fails with a unique violation if the user already has one.
    pub async fn insert(&self, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query("INSERT INTO onboarding_progress (id, user_id) VALUES ($1, $2)")
            .bind(self.id)
            .bind(self.user_id)
            .execute(pool)
            .await?;

        self.save(pool).await
    }

    /// Writes every editable column back
    pub async fn save(&self, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, OnboardingProgress>(
            r#"
            UPDATE onboarding_progress
            SET owner_name = $2,
                brand_name_dba = $3,
                email = $4,
                business_name = $5,
                address = $6,
                time_zone = $7,
                service_model = $8,
                is_franchise = $9,
                franchise_brand_name = $10,
                locations_owned_operated = $11,
                region_market = $12,
                menu_url = $13,
                menu_file = $14,
                estimated_instore_sales_last_month = $15,
                estimated_online_3p_sales_last_month = $16,
                estimated_instore_sales_last_12_months = $17,
                estimated_online_3p_sales_last_12_months = $18,
                foh_employees = $19,
                boh_employees = $20,
                pay_cadence = $21,
                document_file = $22,
                monthly_marketing_budget = $23,
                key_policies = $24,
                is_completed = $25,
                current_step = $26,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(self.user_id)
        .bind(&self.owner_name)
        .bind(&self.brand_name_dba)
        .bind(&self.email)
        .bind(&self.business_name)
        .bind(&self.address)
        .bind(&self.time_zone)
        .bind(&self.service_model)
        .bind(&self.is_franchise)
        .bind(&self.franchise_brand_name)
        .bind(&self.locations_owned_operated)
        .bind(&self.region_market)
        .bind(&self.menu_url)
        .bind(&self.menu_file)
        .bind(self.estimated_instore_sales_last_month)
        .bind(self.estimated_online_3p_sales_last_month)
        .bind(self.estimated_instore_sales_last_12_months)
        .bind(self.estimated_online_3p_sales_last_12_months)
        .bind(&self.foh_employees)
        .bind(&self.boh_employees)
        .bind(&self.pay_cadence)
        .bind(&self.document_file)
        .bind(self.monthly_marketing_budget)
        .bind(&self.key_policies)
        .bind(self.is_completed)
        .bind(self.current_step)
        .fetch_one(pool)
        .await
    }
}
