//! Patient repository
//!
//! One patient per caretaker (`patients.caretaker_id` is UNIQUE).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::timestamp;

use super::DbError;

/// Patient record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Patient {
    pub pid: i32,
    pub caretaker_id: i32,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub medical_summary: Option<String>,
    pub emergency_contact: Option<String>,
    pub active: bool,
    #[serde(with = "timestamp::iso")]
    pub created_at: NaiveDateTime,
}

/// Patient joined to its caretaker, for alert fan-out
#[derive(Debug, Clone, FromRow)]
pub struct PatientWithCaretaker {
    pub pid: i32,
    pub patient_name: String,
    pub caretaker_id: i32,
    pub caregiver_name: String,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub caretaker_id: i32,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub medical_summary: Option<String>,
    pub emergency_contact: Option<String>,
    pub active: bool,
}

/// Update body: only present keys are applied
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub medical_summary: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub emergency_contact: Option<Option<String>>,
    pub active: Option<bool>,
}

impl PatientChanges {
    pub fn apply(self, patient: &mut Patient) {
        patch::set(&mut patient.name, self.name);
        patch::set_nullable(&mut patient.age, self.age);
        patch::set_nullable(&mut patient.gender, self.gender);
        patch::set_nullable(&mut patient.medical_summary, self.medical_summary);
        patch::set_nullable(&mut patient.emergency_contact, self.emergency_contact);
        patch::set(&mut patient.active, self.active);
    }
}

const COLUMNS: &str =
    "pid, caretaker_id, name, age, gender, medical_summary, emergency_contact, active, created_at";

/// Patient repository
pub struct PatientRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PatientRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, patient: NewPatient) -> Result<Patient, DbError> {
        let sql = format!(
            r#"
            INSERT INTO patients (caretaker_id, name, age, gender, medical_summary, emergency_contact, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Patient>(&sql)
            .bind(patient.caretaker_id)
            .bind(&patient.name)
            .bind(patient.age)
            .bind(&patient.gender)
            .bind(&patient.medical_summary)
            .bind(&patient.emergency_contact)
            .bind(patient.active)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, pid: i32) -> Result<Patient, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM patients WHERE pid = $1");
        sqlx::query_as::<_, Patient>(&sql)
            .bind(pid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("patient", pid))
    }

    pub async fn list(&self) -> Result<Vec<Patient>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM patients ORDER BY pid");
        let rows = sqlx::query_as::<_, Patient>(&sql).fetch_all(self.pool).await?;
        Ok(rows)
    }

    /// First patient by id (used by seeding when no id is given).
    pub async fn first(&self) -> Result<Option<Patient>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM patients ORDER BY pid LIMIT 1");
        let row = sqlx::query_as::<_, Patient>(&sql)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn exists(&self, pid: i32) -> Result<bool, DbError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM patients WHERE pid = $1)")
                .bind(pid)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn update(&self, pid: i32, changes: PatientChanges) -> Result<Patient, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM patients WHERE pid = $1 FOR UPDATE");
        let mut patient = sqlx::query_as::<_, Patient>(&sql)
            .bind(pid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("patient", pid))?;

        changes.apply(&mut patient);

        sqlx::query(
            r#"
            UPDATE patients
            SET name = $2, age = $3, gender = $4, medical_summary = $5,
                emergency_contact = $6, active = $7
            WHERE pid = $1
            "#,
        )
        .bind(pid)
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(&patient.medical_summary)
        .bind(&patient.emergency_contact)
        .bind(patient.active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(patient)
    }

    pub async fn delete(&self, pid: i32) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM patients WHERE pid = $1")
            .bind(pid)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("patient", pid));
        }
        Ok(())
    }

    /// Patient plus caretaker name in one query.
    pub async fn with_caretaker(&self, pid: i32) -> Result<PatientWithCaretaker, DbError> {
        sqlx::query_as::<_, PatientWithCaretaker>(
            r#"
            SELECT p.pid, p.name AS patient_name, p.caretaker_id, u.name AS caregiver_name
            FROM patients p
            JOIN users u ON p.caretaker_id = u.uid
            WHERE p.pid = $1
            "#,
        )
        .bind(pid)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("patient", pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Patient {
        Patient {
            pid: 1,
            caretaker_id: 2,
            name: "Rose".into(),
            age: Some(81),
            gender: Some("female".into()),
            medical_summary: None,
            emergency_contact: None,
            active: true,
            created_at: timestamp::parse("2025-11-08T10:00:00").unwrap(),
        }
    }

    #[test]
    fn changes_touch_only_present_keys() {
        let mut patient = sample();
        let changes: PatientChanges =
            serde_json::from_str(r#"{"gender": null, "medical_summary": "Early-stage dementia"}"#)
                .unwrap();
        changes.apply(&mut patient);

        assert_eq!(patient.name, "Rose");
        assert_eq!(patient.age, Some(81));
        assert_eq!(patient.gender, None);
        assert_eq!(patient.medical_summary.as_deref(), Some("Early-stage dementia"));
    }

    #[test]
    fn serializes_original_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["pid"], 1);
        assert_eq!(json["caretaker_id"], 2);
        assert_eq!(json["created_at"], "2025-11-08T10:00:00");
        assert!(json["emergency_contact"].is_null());
    }
}
