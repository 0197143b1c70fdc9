/// Per-role dashboard metrics
///
/// Twelve tables, four per role, hold figures extracted from uploaded
/// documents. They share one shape: an owner, a date, a handful of integer
/// metrics, an optional pointer to the source document, and timestamps.
/// [`metric_table!`] generates the row type, its input type and the
/// [`MetricRecord`] impl for each.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::user::Role;

pub mod executive;
pub mod marketing;
pub mod operations;

/// Common operations over a metric table
#[async_trait]
pub trait MetricRecord: Serialize + for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    /// Payload accepted when recording a row
    type Input: DeserializeOwned + Validate + Send + 'static;

    /// Backing table
    const TABLE: &'static str;

    /// Role whose dashboards show this table
    const ROLE: Role;

    /// Source document referenced by an input, if any
    fn source_document(input: &Self::Input) -> Option<Uuid>;

    /// A user's rows in display order
    async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>;

    /// Records a row for a user
    async fn insert(pool: &PgPool, user_id: Uuid, input: Self::Input) -> Result<Self, sqlx::Error>;

    /// Deletes a user's row, returning whether it existed
    async fn delete_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>;
}

/// Generates a metric row type, its input type and its [`MetricRecord`] impl
///
/// ```ignore
/// metric_table! {
///     /// Doc comment for the row type
///     pub struct OperationDashboard / CreateOperationDashboard {
///         table: "operation_dashboards",
///         role: Role::Operations,
///         order: "date DESC, extracted_at DESC",
///         fields: {
///             #[validate(range(min = 0))]
///             today_sales: i32,
///         }
///     }
/// }
/// ```
macro_rules! metric_table {
    (
        $(#[$meta:meta])*
        pub struct $name:ident / $input:ident {
            table: $table:literal,
            role: $role:expr,
            order: $order:literal,
            fields: {
                $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
        pub struct $name {
            pub id: uuid::Uuid,
            pub user_id: uuid::Uuid,
            pub date: chrono::NaiveDate,
            $( pub $field: $ty, )*
            pub source_document_id: Option<uuid::Uuid>,
            pub extracted_at: chrono::DateTime<chrono::Utc>,
            pub updated_at: chrono::DateTime<chrono::Utc>,
        }

        #[derive(Debug, Clone, serde::Deserialize, validator::Validate)]
        pub struct $input {
            /// Defaults to today
            pub date: Option<chrono::NaiveDate>,
            $( $(#[$fmeta])* #[serde(default)] pub $field: $ty, )*
            pub source_document_id: Option<uuid::Uuid>,
        }

        #[async_trait::async_trait]
        impl $crate::models::metrics::MetricRecord for $name {
            type Input = $input;

            const TABLE: &'static str = $table;
            const ROLE: $crate::models::user::Role = $role;

            fn source_document(input: &Self::Input) -> Option<uuid::Uuid> {
                input.source_document_id
            }

            async fn list_for_user(
                pool: &sqlx::PgPool,
                user_id: uuid::Uuid,
            ) -> Result<Vec<Self>, sqlx::Error> {
                sqlx::query_as::<_, $name>(concat!(
                    "SELECT * FROM ", $table, " WHERE user_id = $1 ORDER BY ", $order
                ))
                .bind(user_id)
                .fetch_all(pool)
                .await
            }

            async fn insert(
                pool: &sqlx::PgPool,
                user_id: uuid::Uuid,
                input: Self::Input,
            ) -> Result<Self, sqlx::Error> {
                let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new(concat!(
                    "INSERT INTO ", $table, " (user_id, date, ",
                    $( stringify!($field), ", ", )*
                    "source_document_id) VALUES ("
                ));
                {
                    let mut values = query.separated(", ");
                    values.push_bind(user_id);
                    values.push_bind(input.date.unwrap_or_else(|| chrono::Utc::now().date_naive()));
                    $( values.push_bind(input.$field); )*
                    values.push_bind(input.source_document_id);
                }
                query.push(") RETURNING *");

                query.build_query_as::<$name>().fetch_one(pool).await
            }

            async fn delete_for_user(
                pool: &sqlx::PgPool,
                id: uuid::Uuid,
                user_id: uuid::Uuid,
            ) -> Result<bool, sqlx::Error> {
                let result = sqlx::query(concat!(
                    "DELETE FROM ", $table, " WHERE id = $1 AND user_id = $2"
                ))
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await?;

                Ok(result.rows_affected() > 0)
            }
        }
    };
}

pub(crate) use metric_table;

#[cfg(test)]
mod tests {
    use super::executive::{BusinessHealthBreakdown, ExecutiveDashboard};
    use super::marketing::{CreateMarketingReport, MarketingReport};
    use super::operations::{CreateOperationFinancialBreakdown, OperationFinancialBreakdown};
    use super::*;

    #[test]
    fn test_tables_and_roles() {
        assert_eq!(MarketingReport::TABLE, "marketing_reports");
        assert_eq!(MarketingReport::ROLE, Role::MarketingManager);
        assert_eq!(ExecutiveDashboard::ROLE, Role::Executive);
        assert_eq!(BusinessHealthBreakdown::TABLE, "business_health_breakdowns");
        assert_eq!(OperationFinancialBreakdown::ROLE, Role::Operations);
    }

    #[test]
    fn test_percentages_bounded() {
        let input: CreateMarketingReport = serde_json::from_str(
            r#"{"weekly_sales": 1200, "cost_efficiency": 101, "customer_satisfaction": 90}"#,
        )
        .unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("cost_efficiency"));
        assert!(!errors.field_errors().contains_key("customer_satisfaction"));
        assert_eq!(input.staff_performance_score, 0);
    }

    #[test]
    fn test_breakdown_requires_category_and_source() {
        let input: CreateOperationFinancialBreakdown =
            serde_json::from_str(r#"{"amount": -300, "percentage_of_total": 12}"#).unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("category"));
        assert!(errors.field_errors().contains_key("source"));
        assert!(!errors.field_errors().contains_key("amount"));
    }

    #[test]
    fn test_source_document_exposed() {
        let document = Uuid::new_v4();
        let input: CreateMarketingReport = serde_json::from_str(&format!(
            r#"{{"weekly_sales": 10, "source_document_id": "{}"}}"#,
            document
        ))
        .unwrap();
        assert_eq!(MarketingReport::source_document(&input), Some(document));
    }
}
