//! Condition repository

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::timestamp;

use super::DbError;

/// Condition record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Condition {
    pub cid: i32,
    pub patient_id: i32,
    pub status: Option<String>,
    #[serde(with = "timestamp::iso_opt")]
    pub onset_date: Option<NaiveDateTime>,
    pub note: Option<String>,
    pub active: bool,
    #[serde(with = "timestamp::iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewCondition {
    pub patient_id: i32,
    pub status: Option<String>,
    pub onset_date: Option<NaiveDateTime>,
    pub note: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionChanges {
    #[serde(default, deserialize_with = "nullable")]
    pub status: Option<Option<String>>,
    #[serde(default, with = "timestamp::iso_patch")]
    pub onset_date: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "nullable")]
    pub note: Option<Option<String>>,
    pub active: Option<bool>,
}

impl ConditionChanges {
    pub fn apply(self, condition: &mut Condition) {
        patch::set_nullable(&mut condition.status, self.status);
        patch::set_nullable(&mut condition.onset_date, self.onset_date);
        patch::set_nullable(&mut condition.note, self.note);
        patch::set(&mut condition.active, self.active);
    }
}

const COLUMNS: &str = "cid, patient_id, status, onset_date, note, active, created_at";

/// Condition repository
pub struct ConditionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ConditionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, condition: NewCondition) -> Result<Condition, DbError> {
        let sql = format!(
            r#"
            INSERT INTO conditions (patient_id, status, onset_date, note, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Condition>(&sql)
            .bind(condition.patient_id)
            .bind(&condition.status)
            .bind(condition.onset_date)
            .bind(&condition.note)
            .bind(condition.active)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, cid: i32) -> Result<Condition, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM conditions WHERE cid = $1");
        sqlx::query_as::<_, Condition>(&sql)
            .bind(cid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("condition", cid))
    }

    pub async fn list(&self, patient_id: Option<i32>) -> Result<Vec<Condition>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM conditions WHERE ($1::INT IS NULL OR patient_id = $1) ORDER BY cid"
        );
        let rows = sqlx::query_as::<_, Condition>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_active_for_patient(&self, patient_id: i32) -> Result<Vec<Condition>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM conditions WHERE patient_id = $1 AND active ORDER BY cid");
        let rows = sqlx::query_as::<_, Condition>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn update(&self, cid: i32, changes: ConditionChanges) -> Result<Condition, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM conditions WHERE cid = $1 FOR UPDATE");
        let mut condition = sqlx::query_as::<_, Condition>(&sql)
            .bind(cid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("condition", cid))?;

        changes.apply(&mut condition);

        sqlx::query("UPDATE conditions SET status = $2, onset_date = $3, note = $4, active = $5 WHERE cid = $1")
            .bind(cid)
            .bind(&condition.status)
            .bind(condition.onset_date)
            .bind(&condition.note)
            .bind(condition.active)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(condition)
    }

    pub async fn delete(&self, cid: i32) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM conditions WHERE cid = $1")
            .bind(cid)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("condition", cid));
        }
        Ok(())
    }
}
