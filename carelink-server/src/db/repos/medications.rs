//! Medication repository

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::timestamp;

use super::DbError;

/// Medication record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Medication {
    pub mid: i32,
    pub patient_id: i32,
    pub name: String,
    pub dose: Option<String>,
    pub schedule_text: Option<String>,
    #[serde(with = "timestamp::iso_opt")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(with = "timestamp::iso_opt")]
    pub end_date: Option<NaiveDateTime>,
    pub prescriber_id: Option<i32>,
    pub active: bool,
    #[serde(with = "timestamp::iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMedication {
    pub patient_id: i32,
    pub name: String,
    pub dose: Option<String>,
    pub schedule_text: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub prescriber_id: Option<i32>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub dose: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub schedule_text: Option<Option<String>>,
    #[serde(default, with = "timestamp::iso_patch")]
    pub start_date: Option<Option<NaiveDateTime>>,
    #[serde(default, with = "timestamp::iso_patch")]
    pub end_date: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "nullable")]
    pub prescriber_id: Option<Option<i32>>,
    pub active: Option<bool>,
}

impl MedicationChanges {
    /// Prescriber the change would point at, for existence checks.
    pub fn new_prescriber(&self) -> Option<i32> {
        self.prescriber_id.flatten()
    }

    pub fn apply(self, med: &mut Medication) {
        patch::set(&mut med.name, self.name);
        patch::set_nullable(&mut med.dose, self.dose);
        patch::set_nullable(&mut med.schedule_text, self.schedule_text);
        patch::set_nullable(&mut med.start_date, self.start_date);
        patch::set_nullable(&mut med.end_date, self.end_date);
        patch::set_nullable(&mut med.prescriber_id, self.prescriber_id);
        patch::set(&mut med.active, self.active);
    }
}

const COLUMNS: &str =
    "mid, patient_id, name, dose, schedule_text, start_date, end_date, prescriber_id, active, created_at";

/// Medication repository
pub struct MedicationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> MedicationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, med: NewMedication) -> Result<Medication, DbError> {
        let sql = format!(
            r#"
            INSERT INTO medications
                (patient_id, name, dose, schedule_text, start_date, end_date, prescriber_id, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Medication>(&sql)
            .bind(med.patient_id)
            .bind(&med.name)
            .bind(&med.dose)
            .bind(&med.schedule_text)
            .bind(med.start_date)
            .bind(med.end_date)
            .bind(med.prescriber_id)
            .bind(med.active)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, mid: i32) -> Result<Medication, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM medications WHERE mid = $1");
        sqlx::query_as::<_, Medication>(&sql)
            .bind(mid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("medication", mid))
    }

    pub async fn list(&self, patient_id: Option<i32>) -> Result<Vec<Medication>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM medications WHERE ($1::INT IS NULL OR patient_id = $1) ORDER BY mid"
        );
        let rows = sqlx::query_as::<_, Medication>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_active_for_patient(&self, patient_id: i32) -> Result<Vec<Medication>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM medications WHERE patient_id = $1 AND active ORDER BY mid");
        let rows = sqlx::query_as::<_, Medication>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn update(&self, mid: i32, changes: MedicationChanges) -> Result<Medication, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM medications WHERE mid = $1 FOR UPDATE");
        let mut med = sqlx::query_as::<_, Medication>(&sql)
            .bind(mid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("medication", mid))?;

        changes.apply(&mut med);

        sqlx::query(
            r#"
            UPDATE medications
            SET name = $2, dose = $3, schedule_text = $4, start_date = $5,
                end_date = $6, prescriber_id = $7, active = $8
            WHERE mid = $1
            "#,
        )
        .bind(mid)
        .bind(&med.name)
        .bind(&med.dose)
        .bind(&med.schedule_text)
        .bind(med.start_date)
        .bind(med.end_date)
        .bind(med.prescriber_id)
        .bind(med.active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(med)
    }

    pub async fn delete(&self, mid: i32) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM medications WHERE mid = $1")
            .bind(mid)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("medication", mid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescriber_can_be_cleared_or_replaced() {
        let cleared: MedicationChanges = serde_json::from_str(r#"{"prescriber_id": null}"#).unwrap();
        assert_eq!(cleared.prescriber_id, Some(None));
        assert_eq!(cleared.new_prescriber(), None);

        let replaced: MedicationChanges = serde_json::from_str(r#"{"prescriber_id": 7}"#).unwrap();
        assert_eq!(replaced.new_prescriber(), Some(7));

        let untouched: MedicationChanges = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.prescriber_id, None);
    }
}
