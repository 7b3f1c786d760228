//! Task repository
//!
//! Status and priority are stored as lowercase text; only values produced by
//! `TaskStatus::as_str` / `Priority::as_str` are ever written.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::{timestamp, Priority, TaskStatus};

use super::DbError;

/// Task record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub tid: i32,
    pub patient_id: i32,
    pub caretaker_id: i32,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "timestamp::iso_opt")]
    pub due_at: Option<NaiveDateTime>,
    pub status: String,
    pub priority: String,
    pub active: bool,
    #[serde(with = "timestamp::iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub patient_id: i32,
    pub caretaker_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<NaiveDateTime>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub active: bool,
}

/// Update body. Unknown status/priority strings are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "timestamp::iso_patch")]
    pub due_at: Option<Option<NaiveDateTime>>,
    pub active: Option<bool>,
    pub status: Option<String>,
    pub priority: Option<String>,
}

impl TaskChanges {
    pub fn apply(self, task: &mut Task) {
        patch::set(&mut task.title, self.title);
        patch::set_nullable(&mut task.description, self.description);
        patch::set_nullable(&mut task.due_at, self.due_at);
        patch::set(&mut task.active, self.active);
        if let Some(status) = self.status.as_deref().and_then(TaskStatus::parse) {
            task.status = status.as_str().to_owned();
        }
        if let Some(priority) = self.priority.as_deref().and_then(Priority::parse) {
            task.priority = priority.as_str().to_owned();
        }
    }
}

fn open_statuses() -> Vec<&'static str> {
    TaskStatus::ALL
        .iter()
        .filter(|s| s.is_open())
        .map(TaskStatus::as_str)
        .collect()
}

const COLUMNS: &str =
    "tid, patient_id, caretaker_id, title, description, due_at, status, priority, active, created_at";

/// Task repository
pub struct TaskRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> TaskRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task: NewTask) -> Result<Task, DbError> {
        let sql = format!(
            r#"
            INSERT INTO tasks (patient_id, caretaker_id, title, description, due_at, status, priority, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Task>(&sql)
            .bind(task.patient_id)
            .bind(task.caretaker_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.due_at)
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(task.active)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, tid: i32) -> Result<Task, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM tasks WHERE tid = $1");
        sqlx::query_as::<_, Task>(&sql)
            .bind(tid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("task", tid))
    }

    /// All tasks, optionally for one patient.
    pub async fn list(&self, patient_id: Option<i32>) -> Result<Vec<Task>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tasks WHERE ($1::INT IS NULL OR patient_id = $1) ORDER BY tid"
        );
        let rows = sqlx::query_as::<_, Task>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Active tasks still pending or in progress, soonest due first.
    pub async fn list_open_for_patient(&self, patient_id: i32) -> Result<Vec<Task>, DbError> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM tasks
            WHERE patient_id = $1 AND active AND status = ANY($2)
            ORDER BY due_at ASC NULLS LAST, tid
            "#
        );
        let rows = sqlx::query_as::<_, Task>(&sql)
            .bind(patient_id)
            .bind(open_statuses())
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn exists(&self, tid: i32) -> Result<bool, DbError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM tasks WHERE tid = $1)")
            .bind(tid)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn update(&self, tid: i32, changes: TaskChanges) -> Result<Task, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM tasks WHERE tid = $1 FOR UPDATE");
        let mut task = sqlx::query_as::<_, Task>(&sql)
            .bind(tid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("task", tid))?;

        changes.apply(&mut task);

        sqlx::query(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, due_at = $4, status = $5, priority = $6, active = $7
            WHERE tid = $1
            "#,
        )
        .bind(tid)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_at)
        .bind(&task.status)
        .bind(&task.priority)
        .bind(task.active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    /// Delete a task; its reminders go with it (ON DELETE CASCADE).
    pub async fn delete(&self, tid: i32) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM tasks WHERE tid = $1")
            .bind(tid)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("task", tid));
        }
        Ok(())
    }
}
