//! Reminder repository

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use carelink_core::timestamp;

use super::DbError;

/// Reminder record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reminder {
    pub rid: i32,
    pub patient_id: i32,
    pub task_id: i32,
    pub channel: Option<String>,
    #[serde(with = "timestamp::iso")]
    pub remind_at: NaiveDateTime,
    #[serde(skip)]
    pub sent: bool,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub patient_id: i32,
    pub task_id: i32,
    pub channel: Option<String>,
    pub remind_at: NaiveDateTime,
}

const COLUMNS: &str = "rid, patient_id, task_id, channel, remind_at, sent, active";

/// Reminder repository
pub struct ReminderRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ReminderRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, reminder: NewReminder) -> Result<Reminder, DbError> {
        let sql = format!(
            "INSERT INTO reminders (patient_id, task_id, channel, remind_at) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, Reminder>(&sql)
            .bind(reminder.patient_id)
            .bind(reminder.task_id)
            .bind(&reminder.channel)
            .bind(reminder.remind_at)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    /// Reminders attached to one task, earliest first.
    pub async fn list_for_task(&self, task_id: i32) -> Result<Vec<Reminder>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM reminders WHERE task_id = $1 ORDER BY remind_at, rid");
        let rows = sqlx::query_as::<_, Reminder>(&sql)
            .bind(task_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_flag_stays_internal() {
        let reminder = Reminder {
            rid: 1,
            patient_id: 1,
            task_id: 4,
            channel: Some("sms".into()),
            remind_at: timestamp::parse("2025-11-08T09:30:00").unwrap(),
            sent: false,
            active: true,
        };
        let json = serde_json::to_value(&reminder).unwrap();
        assert!(json.get("sent").is_none());
        assert_eq!(json["remind_at"], "2025-11-08T09:30:00");
        assert_eq!(json["channel"], "sms");
    }
}
