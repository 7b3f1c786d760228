//! Recommendation repository

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::timestamp;

use super::DbError;

/// Recommendation record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Recommendation {
    pub rid: i32,
    pub patient_id: i32,
    pub title: String,
    pub sources: Option<String>,
    pub active: bool,
    #[serde(with = "timestamp::iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub patient_id: i32,
    pub title: String,
    pub sources: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sources: Option<Option<String>>,
    pub active: Option<bool>,
}

impl RecommendationChanges {
    pub fn apply(self, rec: &mut Recommendation) {
        patch::set(&mut rec.title, self.title);
        patch::set_nullable(&mut rec.sources, self.sources);
        patch::set(&mut rec.active, self.active);
    }
}

const COLUMNS: &str = "rid, patient_id, title, sources, active, created_at";

/// Recommendation repository
pub struct RecommendationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> RecommendationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, rec: NewRecommendation) -> Result<Recommendation, DbError> {
        let sql = format!(
            "INSERT INTO recommendations (patient_id, title, sources, active) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, Recommendation>(&sql)
            .bind(rec.patient_id)
            .bind(&rec.title)
            .bind(&rec.sources)
            .bind(rec.active)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, rid: i32) -> Result<Recommendation, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM recommendations WHERE rid = $1");
        sqlx::query_as::<_, Recommendation>(&sql)
            .bind(rid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("recommendation", rid))
    }

    pub async fn list(&self, patient_id: Option<i32>) -> Result<Vec<Recommendation>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM recommendations WHERE ($1::INT IS NULL OR patient_id = $1) ORDER BY rid"
        );
        let rows = sqlx::query_as::<_, Recommendation>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn update(&self, rid: i32, changes: RecommendationChanges) -> Result<Recommendation, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM recommendations WHERE rid = $1 FOR UPDATE");
        let mut rec = sqlx::query_as::<_, Recommendation>(&sql)
            .bind(rid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("recommendation", rid))?;

        changes.apply(&mut rec);

        sqlx::query("UPDATE recommendations SET title = $2, sources = $3, active = $4 WHERE rid = $1")
            .bind(rid)
            .bind(&rec.title)
            .bind(&rec.sources)
            .bind(rec.active)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(rec)
    }

    pub async fn delete(&self, rid: i32) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM recommendations WHERE rid = $1")
            .bind(rid)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("recommendation", rid));
        }
        Ok(())
    }
}
