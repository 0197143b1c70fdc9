/// Calendar events
///
/// Events are private to their owner. Updates are partial: the patch is
/// merged into the stored event and the merged event is validated as a
/// whole, so moving only `end_date` before the existing `start_date` fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::{clean_text, double_option, field_error};

pub const DEFAULT_REMINDER_MINUTES: i32 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Meeting,
    Reminder,
    Task,
    Appointment,
    #[default]
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Meeting => "meeting",
            EventType::Reminder => "reminder",
            EventType::Task => "task",
            EventType::Appointment => "appointment",
            EventType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "meeting" => Some(EventType::Meeting),
            "reminder" => Some(EventType::Reminder),
            "task" => Some(EventType::Task),
            "appointment" => Some(EventType::Appointment),
            "other" => Some(EventType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: Option<String>,
    pub is_all_day: bool,
    pub reminder_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event fields as submitted by a client, after merging
///
/// Field rules come from the derive; [`EventInput::check`] adds the date
/// ordering rule on top.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EventInput {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: EventType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub location: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default = "default_reminder")]
    #[validate(range(min = 0, message = "Reminder minutes cannot be negative."))]
    pub reminder_minutes: i32,
}

fn default_reminder() -> i32 {
    DEFAULT_REMINDER_MINUTES
}

/// Partial event update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub event_type: Option<EventType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    pub is_all_day: Option<bool>,
    pub reminder_minutes: Option<i32>,
}

/// List filters; `from`/`to` bound the event start
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub event_type: Option<EventType>,
}

impl EventInput {
    /// Trims text and drops blank optionals
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: clean_text(self.description),
            location: clean_text(self.location),
            ..self
        }
    }

    /// Produces the input that results from patching an existing event
    pub fn merged(event: &CalendarEvent, patch: EventPatch) -> Self {
        Self {
            title: patch.title.unwrap_or_else(|| event.title.clone()),
            description: patch.description.unwrap_or_else(|| event.description.clone()),
            event_type: patch
                .event_type
                .or_else(|| EventType::from_str(&event.event_type))
                .unwrap_or_default(),
            start_date: patch.start_date.unwrap_or(event.start_date),
            end_date: patch.end_date.unwrap_or(event.end_date),
            location: patch.location.unwrap_or_else(|| event.location.clone()),
            is_all_day: patch.is_all_day.unwrap_or(event.is_all_day),
            reminder_minutes: patch.reminder_minutes.unwrap_or(event.reminder_minutes),
        }
    }

    /// Field rules plus `end_date >= start_date`
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_default();

        if self.end_date < self.start_date {
            errors.add(
                "end_date",
                field_error("range", "End date must be after or equal to start date."),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl CalendarEvent {
    pub async fn create(pool: &PgPool, user_id: Uuid, input: EventInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            INSERT INTO calendar_events
                (user_id, title, description, event_type, start_date, end_date,
                 location, is_all_day, reminder_minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(input.title)
        .bind(input.description)
        .bind(input.event_type.as_str())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.location)
        .bind(input.is_all_day)
        .bind(input.reminder_minutes)
        .fetch_one(pool)
        .await
    }

    /// Lists a user's events ordered by start
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        filter: &EventFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query =
            QueryBuilder::<Postgres>::new("SELECT * FROM calendar_events WHERE user_id = ");
        query.push_bind(user_id);

        if let Some(from) = filter.from {
            query.push(" AND start_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND start_date <= ").push_bind(to);
        }
        if let Some(event_type) = filter.event_type {
            query.push(" AND event_type = ").push_bind(event_type.as_str());
        }
        query.push(" ORDER BY start_date ASC");

        query.build_query_as::<CalendarEvent>().fetch_all(pool).await
    }

    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            "SELECT * FROM calendar_events WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Overwrites an event with a validated, merged input
    pub async fn replace(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        input: EventInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEvent>(
            r#"
            UPDATE calendar_events
            SET title = $3,
                description = $4,
                event_type = $5,
                start_date = $6,
                end_date = $7,
                location = $8,
                is_all_day = $9,
                reminder_minutes = $10,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(input.title)
        .bind(input.description)
        .bind(input.event_type.as_str())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.location)
        .bind(input.is_all_day)
        .bind(input.reminder_minutes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(json: &str) -> EventInput {
        serde_json::from_str::<EventInput>(json).unwrap().normalized()
    }

    #[test]
    fn test_defaults_applied() {
        let event = input(
            r#"{"title": "Inventory count", "start_date": "2025-03-01T09:00:00Z", "end_date": "2025-03-01T10:00:00Z"}"#,
        );
        assert_eq!(event.event_type, EventType::Other);
        assert_eq!(event.reminder_minutes, 15);
        assert!(!event.is_all_day);
        assert!(event.check().is_ok());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let event = input(
            r#"{"title": "Staff meeting", "event_type": "meeting", "start_date": "2025-03-01T10:00:00Z", "end_date": "2025-03-01T09:00:00Z"}"#,
        );
        let errors = event.check().unwrap_err();
        assert!(errors.field_errors().contains_key("end_date"));
    }

    #[test]
    fn test_blank_title_and_negative_reminder_rejected() {
        let event = input(
            r#"{"title": "   ", "reminder_minutes": -5, "start_date": "2025-03-01T09:00:00Z", "end_date": "2025-03-01T09:00:00Z"}"#,
        );
        let errors = event.check().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(errors.field_errors().contains_key("reminder_minutes"));
    }

    #[test]
    fn test_unknown_event_type_fails_to_parse() {
        let result = serde_json::from_str::<EventInput>(
            r#"{"title": "x", "event_type": "party", "start_date": "2025-03-01T09:00:00Z", "end_date": "2025-03-01T09:00:00Z"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_is_validated_against_stored_event() {
        let start = Utc::now();
        let stored = CalendarEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Supplier call".to_string(),
            description: Some("Produce order".to_string()),
            event_type: "appointment".to_string(),
            start_date: start,
            end_date: start + Duration::hours(1),
            location: None,
            is_all_day: false,
            reminder_minutes: 30,
            created_at: start,
            updated_at: start,
        };

        let patch = EventPatch {
            end_date: Some(start - Duration::hours(1)),
            ..Default::default()
        };
        let merged = EventInput::merged(&stored, patch);
        assert_eq!(merged.event_type, EventType::Appointment);
        assert_eq!(merged.reminder_minutes, 30);
        assert!(merged.check().is_err());

        let patch: EventPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        let merged = EventInput::merged(&stored, patch);
        assert_eq!(merged.description, None);
        assert_eq!(merged.title, "Supplier call");
        assert!(merged.check().is_ok());
    }
}
