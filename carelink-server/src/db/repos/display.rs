//! Patient display repository
//!
//! Configuration (one row per patient) plus the three soft-deleted lists the
//! patient's mobile display renders: navigation landmarks, FAQs and
//! emergency contacts. Deleting any list item only clears `active`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::timestamp;

use super::DbError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Display configuration record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DisplayConfig {
    pub id: i32,
    pub patient_id: i32,
    pub show_schedule: bool,
    pub show_navigation: bool,
    pub show_faq: bool,
    pub home_address: Option<String>,
    pub gps_tracking_enabled: bool,
    pub geofence_radius_meters: i32,
    pub voice_reminders_enabled: bool,
    pub reminder_minutes_before: i32,
    pub auto_mark_complete: bool,
    pub caregiver_status: Option<String>,
    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub created_at: NaiveDateTime,
    #[serde(skip)]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfigChanges {
    pub show_schedule: Option<bool>,
    pub show_navigation: Option<bool>,
    pub show_faq: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub home_address: Option<Option<String>>,
    pub gps_tracking_enabled: Option<bool>,
    pub geofence_radius_meters: Option<i32>,
    pub voice_reminders_enabled: Option<bool>,
    pub reminder_minutes_before: Option<i32>,
    pub auto_mark_complete: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub caregiver_status: Option<Option<String>>,
}

impl DisplayConfigChanges {
    pub fn apply(self, config: &mut DisplayConfig) {
        patch::set(&mut config.show_schedule, self.show_schedule);
        patch::set(&mut config.show_navigation, self.show_navigation);
        patch::set(&mut config.show_faq, self.show_faq);
        patch::set_nullable(&mut config.home_address, self.home_address);
        patch::set(&mut config.gps_tracking_enabled, self.gps_tracking_enabled);
        patch::set(&mut config.geofence_radius_meters, self.geofence_radius_meters);
        patch::set(&mut config.voice_reminders_enabled, self.voice_reminders_enabled);
        patch::set(&mut config.reminder_minutes_before, self.reminder_minutes_before);
        patch::set(&mut config.auto_mark_complete, self.auto_mark_complete);
        patch::set_nullable(&mut config.caregiver_status, self.caregiver_status);
    }
}

const CONFIG_COLUMNS: &str = "id, patient_id, show_schedule, show_navigation, show_faq, home_address, \
     gps_tracking_enabled, geofence_radius_meters, voice_reminders_enabled, \
     reminder_minutes_before, auto_mark_complete, caregiver_status, active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Landmarks
// ---------------------------------------------------------------------------

/// Navigation landmark record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Landmark {
    pub id: i32,
    #[serde(skip)]
    pub patient_id: i32,
    pub step_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    #[serde(skip)]
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewLandmark {
    pub step_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LandmarkChanges {
    pub step_number: Option<i32>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub photo_url: Option<Option<String>>,
}

impl LandmarkChanges {
    pub fn apply(self, landmark: &mut Landmark) {
        patch::set(&mut landmark.step_number, self.step_number);
        patch::set(&mut landmark.title, self.title);
        patch::set_nullable(&mut landmark.description, self.description);
        patch::set_nullable(&mut landmark.photo_url, self.photo_url);
    }
}

const LANDMARK_COLUMNS: &str = "id, patient_id, step_number, title, description, photo_url, active";

// ---------------------------------------------------------------------------
// FAQs
// ---------------------------------------------------------------------------

/// Patient FAQ record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Faq {
    pub id: i32,
    #[serde(skip)]
    pub patient_id: i32,
    pub question: String,
    pub answer_text: String,
    pub voice_recording_url: Option<String>,
    pub order_index: i32,
    #[serde(skip)]
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewFaq {
    pub question: String,
    pub answer_text: String,
    pub voice_recording_url: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaqChanges {
    pub question: Option<String>,
    pub answer_text: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub voice_recording_url: Option<Option<String>>,
    pub order_index: Option<i32>,
}

impl FaqChanges {
    pub fn apply(self, faq: &mut Faq) {
        patch::set(&mut faq.question, self.question);
        patch::set(&mut faq.answer_text, self.answer_text);
        patch::set_nullable(&mut faq.voice_recording_url, self.voice_recording_url);
        patch::set(&mut faq.order_index, self.order_index);
    }
}

const FAQ_COLUMNS: &str = "id, patient_id, question, answer_text, voice_recording_url, order_index, active";

// ---------------------------------------------------------------------------
// Emergency contacts
// ---------------------------------------------------------------------------

/// Emergency contact record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmergencyContact {
    pub id: i32,
    #[serde(skip)]
    pub patient_id: i32,
    pub name: String,
    pub relationship: Option<String>,
    pub phone: String,
    pub photo_url: Option<String>,
    pub is_primary: bool,
    #[serde(skip)]
    pub order_index: i32,
    #[serde(skip)]
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub relationship: Option<String>,
    pub phone: String,
    pub photo_url: Option<String>,
    pub is_primary: bool,
    pub order_index: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub relationship: Option<Option<String>>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub photo_url: Option<Option<String>>,
    pub is_primary: Option<bool>,
    pub order_index: Option<i32>,
}

impl ContactChanges {
    pub fn apply(self, contact: &mut EmergencyContact) {
        patch::set(&mut contact.name, self.name);
        patch::set_nullable(&mut contact.relationship, self.relationship);
        patch::set(&mut contact.phone, self.phone);
        patch::set_nullable(&mut contact.photo_url, self.photo_url);
        patch::set(&mut contact.is_primary, self.is_primary);
        patch::set(&mut contact.order_index, self.order_index);
    }
}

const CONTACT_COLUMNS: &str =
    "id, patient_id, name, relationship, phone, photo_url, is_primary, order_index, active";

/// Patient display repository
pub struct DisplayRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> DisplayRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // -- configuration ------------------------------------------------------

    /// Active configuration for a patient, if one exists.
    pub async fn config(&self, patient_id: i32) -> Result<Option<DisplayConfig>, DbError> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM patient_display_config WHERE patient_id = $1 AND active"
        );
        let row = sqlx::query_as::<_, DisplayConfig>(&sql)
            .bind(patient_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Configuration regardless of `active`, as the mobile routes read it.
    pub async fn any_config(&self, patient_id: i32) -> Result<Option<DisplayConfig>, DbError> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM patient_display_config WHERE patient_id = $1");
        let row = sqlx::query_as::<_, DisplayConfig>(&sql)
            .bind(patient_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Insert a default configuration; a concurrent insert wins and is returned.
    pub async fn create_default_config(&self, patient_id: i32) -> Result<DisplayConfig, DbError> {
        let sql = format!(
            r#"
            INSERT INTO patient_display_config (patient_id)
            VALUES ($1)
            ON CONFLICT (patient_id) DO UPDATE SET patient_id = EXCLUDED.patient_id
            RETURNING {CONFIG_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DisplayConfig>(&sql)
            .bind(patient_id)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Create-or-update in one transaction; bumps `updated_at`.
    pub async fn upsert_config(
        &self,
        patient_id: i32,
        changes: DisplayConfigChanges,
    ) -> Result<DisplayConfig, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO patient_display_config (patient_id) VALUES ($1) ON CONFLICT (patient_id) DO NOTHING",
        )
        .bind(patient_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM patient_display_config WHERE patient_id = $1 FOR UPDATE"
        );
        let mut config = sqlx::query_as::<_, DisplayConfig>(&sql)
            .bind(patient_id)
            .fetch_one(&mut *tx)
            .await?;

        changes.apply(&mut config);
        config.updated_at = timestamp::now();

        sqlx::query(
            r#"
            UPDATE patient_display_config
            SET show_schedule = $2, show_navigation = $3, show_faq = $4, home_address = $5,
                gps_tracking_enabled = $6, geofence_radius_meters = $7,
                voice_reminders_enabled = $8, reminder_minutes_before = $9,
                auto_mark_complete = $10, caregiver_status = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(config.id)
        .bind(config.show_schedule)
        .bind(config.show_navigation)
        .bind(config.show_faq)
        .bind(&config.home_address)
        .bind(config.gps_tracking_enabled)
        .bind(config.geofence_radius_meters)
        .bind(config.voice_reminders_enabled)
        .bind(config.reminder_minutes_before)
        .bind(config.auto_mark_complete)
        .bind(&config.caregiver_status)
        .bind(config.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(config)
    }

    // -- landmarks ----------------------------------------------------------

    pub async fn landmarks(&self, patient_id: i32) -> Result<Vec<Landmark>, DbError> {
        let sql = format!(
            "SELECT {LANDMARK_COLUMNS} FROM navigation_landmarks WHERE patient_id = $1 AND active ORDER BY step_number, id"
        );
        let rows = sqlx::query_as::<_, Landmark>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn create_landmark(&self, patient_id: i32, landmark: NewLandmark) -> Result<Landmark, DbError> {
        let sql = format!(
            r#"
            INSERT INTO navigation_landmarks (patient_id, step_number, title, description, photo_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LANDMARK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Landmark>(&sql)
            .bind(patient_id)
            .bind(landmark.step_number)
            .bind(&landmark.title)
            .bind(&landmark.description)
            .bind(&landmark.photo_url)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn update_landmark(&self, id: i32, changes: LandmarkChanges) -> Result<Landmark, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {LANDMARK_COLUMNS} FROM navigation_landmarks WHERE id = $1 FOR UPDATE");
        let mut landmark = sqlx::query_as::<_, Landmark>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("landmark", id))?;

        changes.apply(&mut landmark);

        sqlx::query(
            "UPDATE navigation_landmarks SET step_number = $2, title = $3, description = $4, photo_url = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(landmark.step_number)
        .bind(&landmark.title)
        .bind(&landmark.description)
        .bind(&landmark.photo_url)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(landmark)
    }

    /// Soft delete; returns the owning patient id.
    pub async fn deactivate_landmark(&self, id: i32) -> Result<i32, DbError> {
        self.deactivate("navigation_landmarks", "landmark", id).await
    }

    // -- FAQs ---------------------------------------------------------------

    pub async fn faqs(&self, patient_id: i32) -> Result<Vec<Faq>, DbError> {
        let sql = format!(
            "SELECT {FAQ_COLUMNS} FROM patient_faqs WHERE patient_id = $1 AND active ORDER BY order_index, id"
        );
        let rows = sqlx::query_as::<_, Faq>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn create_faq(&self, patient_id: i32, faq: NewFaq) -> Result<Faq, DbError> {
        let sql = format!(
            r#"
            INSERT INTO patient_faqs (patient_id, question, answer_text, voice_recording_url, order_index)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FAQ_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Faq>(&sql)
            .bind(patient_id)
            .bind(&faq.question)
            .bind(&faq.answer_text)
            .bind(&faq.voice_recording_url)
            .bind(faq.order_index)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn update_faq(&self, id: i32, changes: FaqChanges) -> Result<Faq, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {FAQ_COLUMNS} FROM patient_faqs WHERE id = $1 FOR UPDATE");
        let mut faq = sqlx::query_as::<_, Faq>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("faq", id))?;

        changes.apply(&mut faq);

        sqlx::query(
            r#"
            UPDATE patient_faqs
            SET question = $2, answer_text = $3, voice_recording_url = $4, order_index = $5,
                updated_at = NOW() AT TIME ZONE 'UTC'
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&faq.question)
        .bind(&faq.answer_text)
        .bind(&faq.voice_recording_url)
        .bind(faq.order_index)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(faq)
    }

    pub async fn deactivate_faq(&self, id: i32) -> Result<i32, DbError> {
        self.deactivate("patient_faqs", "faq", id).await
    }

    // -- emergency contacts -------------------------------------------------

    pub async fn contacts(&self, patient_id: i32) -> Result<Vec<EmergencyContact>, DbError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM emergency_contacts WHERE patient_id = $1 AND active ORDER BY order_index, id"
        );
        let rows = sqlx::query_as::<_, EmergencyContact>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn create_contact(&self, patient_id: i32, contact: NewContact) -> Result<EmergencyContact, DbError> {
        let sql = format!(
            r#"
            INSERT INTO emergency_contacts
                (patient_id, name, relationship, phone, photo_url, is_primary, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CONTACT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, EmergencyContact>(&sql)
            .bind(patient_id)
            .bind(&contact.name)
            .bind(&contact.relationship)
            .bind(&contact.phone)
            .bind(&contact.photo_url)
            .bind(contact.is_primary)
            .bind(contact.order_index)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn update_contact(&self, id: i32, changes: ContactChanges) -> Result<EmergencyContact, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {CONTACT_COLUMNS} FROM emergency_contacts WHERE id = $1 FOR UPDATE");
        let mut contact = sqlx::query_as::<_, EmergencyContact>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("contact", id))?;

        changes.apply(&mut contact);

        sqlx::query(
            r#"
            UPDATE emergency_contacts
            SET name = $2, relationship = $3, phone = $4, photo_url = $5, is_primary = $6, order_index = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&contact.name)
        .bind(&contact.relationship)
        .bind(&contact.phone)
        .bind(&contact.photo_url)
        .bind(contact.is_primary)
        .bind(contact.order_index)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(contact)
    }

    pub async fn deactivate_contact(&self, id: i32) -> Result<i32, DbError> {
        self.deactivate("emergency_contacts", "contact", id).await
    }

    /// `table` is always one of the three list tables above, never user input.
    async fn deactivate(&self, table: &'static str, resource: &'static str, id: i32) -> Result<i32, DbError> {
        let sql = format!("UPDATE {table} SET active = FALSE WHERE id = $1 RETURNING patient_id");
        let (patient_id,): (i32,) = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(resource, id))?;
        Ok(patient_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DisplayConfig {
        let at = timestamp::parse("2025-11-08T10:00:00").unwrap();
        DisplayConfig {
            id: 1,
            patient_id: 4,
            show_schedule: true,
            show_navigation: true,
            show_faq: true,
            home_address: None,
            gps_tracking_enabled: false,
            geofence_radius_meters: 500,
            voice_reminders_enabled: true,
            reminder_minutes_before: 5,
            auto_mark_complete: true,
            caregiver_status: None,
            active: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn config_changes_apply_present_keys() {
        let mut cfg = config();
        let changes: DisplayConfigChanges = serde_json::from_str(
            r#"{"show_faq": false, "caregiver_status": "At work", "geofence_radius_meters": 250}"#,
        )
        .unwrap();
        changes.apply(&mut cfg);

        assert!(!cfg.show_faq);
        assert!(cfg.show_schedule);
        assert_eq!(cfg.caregiver_status.as_deref(), Some("At work"));
        assert_eq!(cfg.geofence_radius_meters, 250);
    }

    #[test]
    fn config_json_hides_bookkeeping_columns() {
        let json = serde_json::to_value(config()).unwrap();
        assert_eq!(json["reminder_minutes_before"], 5);
        assert!(json.get("updated_at").is_none());
        assert!(json.get("active").is_none());
    }

    #[test]
    fn contact_changes_keep_required_phone() {
        let mut contact = EmergencyContact {
            id: 2,
            patient_id: 4,
            name: "Sarah".into(),
            relationship: Some("Daughter".into()),
            phone: "555-0101".into(),
            photo_url: None,
            is_primary: true,
            order_index: 0,
            active: true,
        };
        let changes: ContactChanges =
            serde_json::from_str(r#"{"relationship": null, "is_primary": false}"#).unwrap();
        changes.apply(&mut contact);

        assert_eq!(contact.phone, "555-0101");
        assert_eq!(contact.relationship, None);
        assert!(!contact.is_primary);
    }
}
