//! Appointment repository
//!
//! Appointments drive the patient display's schedule, so the day and
//! upcoming queries below only return active rows ordered by start time.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::timestamp;

use super::DbError;

/// Appointment record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Appointment {
    pub aid: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    #[serde(with = "timestamp::iso")]
    pub start_time: NaiveDateTime,
    #[serde(with = "timestamp::iso")]
    pub end_time: NaiveDateTime,
    pub location: Option<String>,
    pub active: bool,
    #[serde(with = "timestamp::iso")]
    pub created_at: NaiveDateTime,
}

impl Appointment {
    pub fn ends_before_start(&self) -> bool {
        self.end_time < self.start_time
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub location: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentChanges {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    #[serde(default, with = "timestamp::iso_patch")]
    pub start_time: Option<Option<NaiveDateTime>>,
    #[serde(default, with = "timestamp::iso_patch")]
    pub end_time: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    pub active: Option<bool>,
}

impl AppointmentChanges {
    /// Start and end are NOT NULL; an explicit null leaves them unchanged.
    pub fn apply(self, appt: &mut Appointment) {
        patch::set(&mut appt.patient_id, self.patient_id);
        patch::set(&mut appt.doctor_id, self.doctor_id);
        patch::set(&mut appt.start_time, self.start_time.flatten());
        patch::set(&mut appt.end_time, self.end_time.flatten());
        patch::set_nullable(&mut appt.location, self.location);
        patch::set(&mut appt.active, self.active);
    }
}

const COLUMNS: &str = "aid, patient_id, doctor_id, start_time, end_time, location, active, created_at";

/// Appointment repository
pub struct AppointmentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AppointmentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, appt: NewAppointment) -> Result<Appointment, DbError> {
        let sql = format!(
            r#"
            INSERT INTO appointments (patient_id, doctor_id, start_time, end_time, location, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Appointment>(&sql)
            .bind(appt.patient_id)
            .bind(appt.doctor_id)
            .bind(appt.start_time)
            .bind(appt.end_time)
            .bind(&appt.location)
            .bind(appt.active)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, aid: i32) -> Result<Appointment, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM appointments WHERE aid = $1");
        sqlx::query_as::<_, Appointment>(&sql)
            .bind(aid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("appointment", aid))
    }

    pub async fn list(&self, patient_id: Option<i32>) -> Result<Vec<Appointment>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM appointments WHERE ($1::INT IS NULL OR patient_id = $1) ORDER BY aid"
        );
        let rows = sqlx::query_as::<_, Appointment>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Active appointments for a patient, by start time.
    pub async fn list_active_for_patient(&self, patient_id: i32) -> Result<Vec<Appointment>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM appointments WHERE patient_id = $1 AND active ORDER BY start_time, aid"
        );
        let rows = sqlx::query_as::<_, Appointment>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Active appointments starting on `day` (half-open day range).
    pub async fn list_for_day(&self, patient_id: i32, day: NaiveDate) -> Result<Vec<Appointment>, DbError> {
        let start = day.and_time(chrono::NaiveTime::MIN);
        let end = start + chrono::Duration::days(1);
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM appointments
            WHERE patient_id = $1 AND active AND start_time >= $2 AND start_time < $3
            ORDER BY start_time, aid
            "#
        );
        let rows = sqlx::query_as::<_, Appointment>(&sql)
            .bind(patient_id)
            .bind(start)
            .bind(end)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Active appointments that have not started yet.
    pub async fn list_upcoming(&self, patient_id: i32, now: NaiveDateTime) -> Result<Vec<Appointment>, DbError> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM appointments
            WHERE patient_id = $1 AND active AND start_time >= $2
            ORDER BY start_time, aid
            "#
        );
        let rows = sqlx::query_as::<_, Appointment>(&sql)
            .bind(patient_id)
            .bind(now)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn update(&self, aid: i32, changes: AppointmentChanges) -> Result<Appointment, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM appointments WHERE aid = $1 FOR UPDATE");
        let mut appt = sqlx::query_as::<_, Appointment>(&sql)
            .bind(aid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("appointment", aid))?;

        changes.apply(&mut appt);

        sqlx::query(
            r#"
            UPDATE appointments
            SET patient_id = $2, doctor_id = $3, start_time = $4, end_time = $5,
                location = $6, active = $7
            WHERE aid = $1
            "#,
        )
        .bind(aid)
        .bind(appt.patient_id)
        .bind(appt.doctor_id)
        .bind(appt.start_time)
        .bind(appt.end_time)
        .bind(&appt.location)
        .bind(appt.active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(appt)
    }

    /// Delete and return the removed row (callers need its patient id).
    pub async fn delete(&self, aid: i32) -> Result<Appointment, DbError> {
        let sql = format!("DELETE FROM appointments WHERE aid = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Appointment>(&sql)
            .bind(aid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("appointment", aid))
    }
}
