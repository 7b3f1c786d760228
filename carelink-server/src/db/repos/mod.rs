//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Borrows the pool (`FooRepo::new(&pool)`), no connection state of its own
//! - Single-row reads return `DbError::NotFound` instead of `Option`
//! - Updates lock the row (`SELECT ... FOR UPDATE`), apply the change set in
//!   Rust, and write every column back inside one transaction
//! - Unique and foreign-key violations surface as `DbError::Duplicate` and
//!   `DbError::Referenced`

pub mod appointments;
pub mod conditions;
pub mod display;
pub mod medications;
pub mod patients;
pub mod recommendations;
pub mod reminders;
pub mod resources;
pub mod tasks;
pub mod users;

pub use appointments::{Appointment, AppointmentChanges, AppointmentRepo, NewAppointment};
pub use conditions::{Condition, ConditionChanges, ConditionRepo, NewCondition};
pub use display::{
    ContactChanges, DisplayConfig, DisplayConfigChanges, DisplayRepo, EmergencyContact, Faq,
    FaqChanges, Landmark, LandmarkChanges, NewContact, NewFaq, NewLandmark,
};
pub use medications::{Medication, MedicationChanges, MedicationRepo, NewMedication};
pub use patients::{NewPatient, Patient, PatientChanges, PatientRepo, PatientWithCaretaker};
pub use recommendations::{NewRecommendation, Recommendation, RecommendationChanges, RecommendationRepo};
pub use reminders::{NewReminder, Reminder, ReminderRepo};
pub use resources::{NewResource, Resource, ResourceChanges, ResourceRepo};
pub use tasks::{NewTask, Task, TaskChanges, TaskRepo};
pub use users::{NewUser, User, UserRepo};

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("unique constraint violated: {constraint}")]
    Duplicate { constraint: String },

    #[error("foreign key constraint violated: {constraint}")]
    Referenced { constraint: String },
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            let constraint = db.constraint().unwrap_or("unknown").to_owned();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return Self::Duplicate { constraint },
                Some(FOREIGN_KEY_VIOLATION) => return Self::Referenced { constraint },
                _ => {}
            }
        }
        Self::Sqlx(e)
    }
}
