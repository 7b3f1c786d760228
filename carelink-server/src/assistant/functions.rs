//! Functions the assistant may call
//!
//! [`DbFunctions`] runs them against the database. Results are plain JSON
//! values handed back to the model and echoed to the caller as actions.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use sqlx::PgPool;

use carelink_core::{events, timestamp};

use super::model::FunctionDeclaration;
use crate::db::repos::{
    AppointmentRepo, ConditionRepo, DbError, MedicationRepo, NewAppointment, PatientRepo, ResourceRepo,
    TaskRepo, UserRepo,
};
use crate::realtime::RealtimeHub;

pub const CREATE_APPOINTMENT: &str = "create_appointment";
pub const GENERATE_REPORT: &str = "generate_report";
pub const RECOMMEND_RESOURCES: &str = "recommend_resources";

const DEFAULT_RESOURCE_LIMIT: i64 = 5;
const MAX_RESOURCE_LIMIT: i64 = 20;

/// Function execution error type
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("unknown function: {0}")]
    Unknown(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Per-request context for function calls
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    /// Patient the caregiver is looking at, used when the model omits one.
    pub patient_id: Option<i32>,
}

/// Executes assistant function calls
#[async_trait]
pub trait FunctionRunner: Send + Sync {
    async fn call(&self, name: &str, args: &Value, ctx: CallContext) -> Result<Value, FunctionError>;
}

/// Declarations offered to the model on every request.
pub fn declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: CREATE_APPOINTMENT,
            description: "Schedule an appointment for a patient with a doctor. Times are ISO 8601 in UTC.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "patient_id": {"type": "integer", "description": "Patient id"},
                    "doctor_id": {"type": "integer", "description": "Doctor's user id"},
                    "start_time": {"type": "string", "description": "Start, e.g. 2025-11-10T14:00:00"},
                    "end_time": {"type": "string", "description": "End, e.g. 2025-11-10T14:30:00"},
                    "location": {"type": "string", "description": "Where the appointment takes place"}
                },
                "required": ["doctor_id", "start_time", "end_time"]
            }),
        },
        FunctionDeclaration {
            name: GENERATE_REPORT,
            description: "Summarise a patient's profile, active conditions and medications, upcoming appointments and open tasks.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "patient_id": {"type": "integer", "description": "Patient id"}
                }
            }),
        },
        FunctionDeclaration {
            name: RECOMMEND_RESOURCES,
            description: "List community resources for caregivers and patients, optionally by category (health, support groups, educational, social).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "category": {"type": "string", "description": "Resource category"},
                    "limit": {"type": "integer", "description": "Maximum number of resources (default 5)"}
                }
            }),
        },
    ]
}

/// Models sometimes send integers as `3.0` or `"3"`.
fn lenient_int<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(d)?;
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom("expected an integer"))
}

fn to_id(value: Option<i64>, field: &str) -> Result<Option<i32>, FunctionError> {
    value
        .map(|v| i32::try_from(v).map_err(|_| FunctionError::InvalidArgs(format!("{field} out of range"))))
        .transpose()
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: &Value) -> Result<T, FunctionError> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|e| FunctionError::InvalidArgs(e.to_string()))
}

fn parse_time(value: &str, field: &str) -> Result<NaiveDateTime, FunctionError> {
    timestamp::parse(value).map_err(|_| FunctionError::InvalidArgs(format!("{field} is not a valid date/time")))
}

#[derive(Debug, Deserialize)]
struct CreateAppointmentArgs {
    #[serde(default, deserialize_with = "lenient_int")]
    patient_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    doctor_id: Option<i64>,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
}

/// Validated appointment request
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AppointmentRequest {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub location: Option<String>,
}

impl AppointmentRequest {
    pub(crate) fn from_args(args: &Value, ctx: CallContext) -> Result<Self, FunctionError> {
        let raw: CreateAppointmentArgs = parse_args(args)?;
        let patient_id = to_id(raw.patient_id, "patient_id")?
            .or(ctx.patient_id)
            .ok_or_else(|| FunctionError::InvalidArgs("patient_id is required".into()))?;
        let doctor_id = to_id(raw.doctor_id, "doctor_id")?
            .ok_or_else(|| FunctionError::InvalidArgs("doctor_id is required".into()))?;
        let start_time = raw
            .start_time
            .as_deref()
            .ok_or_else(|| FunctionError::InvalidArgs("start_time is required".into()))
            .and_then(|s| parse_time(s, "start_time"))?;
        let end_time = raw
            .end_time
            .as_deref()
            .ok_or_else(|| FunctionError::InvalidArgs("end_time is required".into()))
            .and_then(|s| parse_time(s, "end_time"))?;
        if end_time < start_time {
            return Err(FunctionError::InvalidArgs("end_time must not be before start_time".into()));
        }
        Ok(Self {
            patient_id,
            doctor_id,
            start_time,
            end_time,
            location: raw.location.filter(|l| !l.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PatientArgs {
    #[serde(default, deserialize_with = "lenient_int")]
    patient_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ResourceArgs {
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    limit: Option<i64>,
}

impl ResourceArgs {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_RESOURCE_LIMIT)
            .clamp(1, MAX_RESOURCE_LIMIT)
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Database-backed function runner
#[derive(Clone)]
pub struct DbFunctions {
    pool: PgPool,
    hub: RealtimeHub,
}

impl DbFunctions {
    pub fn new(pool: PgPool, hub: RealtimeHub) -> Self {
        Self { pool, hub }
    }

    async fn create_appointment(&self, args: &Value, ctx: CallContext) -> Result<Value, FunctionError> {
        let req = AppointmentRequest::from_args(args, ctx)?;

        if !PatientRepo::new(&self.pool).exists(req.patient_id).await? {
            return Err(FunctionError::NotFound("Patient not found"));
        }
        if !UserRepo::new(&self.pool).exists(req.doctor_id).await? {
            return Err(FunctionError::NotFound("Doctor not found"));
        }

        let appt = AppointmentRepo::new(&self.pool)
            .create(NewAppointment {
                patient_id: req.patient_id,
                doctor_id: req.doctor_id,
                start_time: req.start_time,
                end_time: req.end_time,
                location: req.location,
                active: true,
            })
            .await?;

        self.hub.emit_to(
            events::patient_room(appt.patient_id),
            events::SCHEDULE_UPDATED,
            json!({ "patient_id": appt.patient_id }),
        );
        tracing::info!(aid = appt.aid, patient_id = appt.patient_id, "assistant created appointment");

        Ok(json!({
            "appointment_id": appt.aid,
            "patient_id": appt.patient_id,
            "doctor_id": appt.doctor_id,
            "start_time": timestamp::format(&appt.start_time),
            "end_time": timestamp::format(&appt.end_time),
            "location": appt.location,
        }))
    }

    async fn generate_report(&self, args: &Value, ctx: CallContext) -> Result<Value, FunctionError> {
        let raw: PatientArgs = parse_args(args)?;
        let patient_id = to_id(raw.patient_id, "patient_id")?
            .or(ctx.patient_id)
            .ok_or_else(|| FunctionError::InvalidArgs("patient_id is required".into()))?;

        let patient = match PatientRepo::new(&self.pool).get(patient_id).await {
            Ok(p) => p,
            Err(DbError::NotFound { .. }) => return Err(FunctionError::NotFound("Patient not found")),
            Err(e) => return Err(e.into()),
        };
        let conditions = ConditionRepo::new(&self.pool).list_active_for_patient(patient_id).await?;
        let medications = MedicationRepo::new(&self.pool).list_active_for_patient(patient_id).await?;
        let appointments = AppointmentRepo::new(&self.pool)
            .list_upcoming(patient_id, timestamp::now())
            .await?;
        let tasks = TaskRepo::new(&self.pool).list_open_for_patient(patient_id).await?;

        Ok(json!({
            "patient": patient,
            "conditions": conditions,
            "medications": medications,
            "upcoming_appointments": appointments,
            "open_tasks": tasks,
            "generated_at": timestamp::format(&timestamp::now()),
        }))
    }

    async fn recommend_resources(&self, args: &Value) -> Result<Value, FunctionError> {
        let raw: ResourceArgs = parse_args(args)?;
        let resources = ResourceRepo::new(&self.pool)
            .list_active(raw.category(), raw.limit())
            .await?;
        Ok(json!({
            "count": resources.len(),
            "resources": resources,
        }))
    }
}

#[async_trait]
impl FunctionRunner for DbFunctions {
    async fn call(&self, name: &str, args: &Value, ctx: CallContext) -> Result<Value, FunctionError> {
        match name {
            CREATE_APPOINTMENT => self.create_appointment(args, ctx).await,
            GENERATE_REPORT => self.generate_report(args, ctx).await,
            RECOMMEND_RESOURCES => self.recommend_resources(args).await,
            other => Err(FunctionError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_functions_are_declared() {
        let names: Vec<&str> = declarations().iter().map(|d| d.name).collect();
        assert_eq!(names, vec![CREATE_APPOINTMENT, GENERATE_REPORT, RECOMMEND_RESOURCES]);
    }

    #[test]
    fn appointment_args_accept_float_ids_and_context_patient() {
        let args = json!({
            "doctor_id": 5.0,
            "start_time": "2025-11-10T14:00:00",
            "end_time": "2025-11-10T14:30:00Z",
            "location": "  "
        });
        let req = AppointmentRequest::from_args(&args, CallContext { patient_id: Some(2) }).unwrap();
        assert_eq!(req.patient_id, 2);
        assert_eq!(req.doctor_id, 5);
        assert_eq!(req.location, None);
        assert_eq!(timestamp::format(&req.end_time), "2025-11-10T14:30:00");
    }

    #[test]
    fn appointment_args_reject_reversed_times() {
        let args = json!({
            "patient_id": 1,
            "doctor_id": 5,
            "start_time": "2025-11-10T15:00:00",
            "end_time": "2025-11-10T14:00:00"
        });
        let err = AppointmentRequest::from_args(&args, CallContext::default()).unwrap_err();
        assert!(matches!(err, FunctionError::InvalidArgs(_)));
    }

    #[test]
    fn appointment_args_require_a_patient() {
        let args = json!({"doctor_id": 5, "start_time": "2025-11-10", "end_time": "2025-11-10"});
        let err = AppointmentRequest::from_args(&args, CallContext::default()).unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: patient_id is required");
    }

    #[test]
    fn fractional_ids_are_rejected() {
        let args = json!({"patient_id": 1.5, "doctor_id": 5, "start_time": "2025-11-10", "end_time": "2025-11-10"});
        assert!(AppointmentRequest::from_args(&args, CallContext::default()).is_err());
    }

    #[test]
    fn resource_limit_defaults_and_clamps() {
        let args: ResourceArgs = parse_args(&Value::Null).unwrap();
        assert_eq!(args.limit(), 5);
        assert_eq!(args.category(), None);

        let args: ResourceArgs = parse_args(&json!({"limit": 500, "category": " social "})).unwrap();
        assert_eq!(args.limit(), MAX_RESOURCE_LIMIT);
        assert_eq!(args.category(), Some("social"));

        let args: ResourceArgs = parse_args(&json!({"limit": "0"})).unwrap();
        assert_eq!(args.limit(), 1);
    }

    mod with_database {
        use super::*;
        use crate::db::repos::{NewCondition, NewMedication, NewTask};
        use crate::http::routes::test_support::{care_pair, db_state};
        use carelink_core::{Priority, TaskStatus};

        #[tokio::test]
        #[ignore = "requires database"]
        async fn report_lists_only_current_care_items() {
            let state = db_state().await;
            let (user, patient) = care_pair(&state, "fn-report").await;
            let pid = patient.pid;
            let pool = &state.pool;

            for active in [true, false] {
                ConditionRepo::new(pool)
                    .create(NewCondition {
                        patient_id: pid,
                        status: Some("chronic".into()),
                        onset_date: None,
                        note: Some(format!("active={active}")),
                        active,
                    })
                    .await
                    .unwrap();
            }
            MedicationRepo::new(pool)
                .create(NewMedication {
                    patient_id: pid,
                    name: "Donepezil".into(),
                    dose: Some("5mg".into()),
                    schedule_text: None,
                    start_date: None,
                    end_date: None,
                    prescriber_id: None,
                    active: true,
                })
                .await
                .unwrap();
            for status in [TaskStatus::Pending, TaskStatus::Completed] {
                TaskRepo::new(pool)
                    .create(NewTask {
                        patient_id: pid,
                        caretaker_id: user.uid,
                        title: "Walk".into(),
                        description: None,
                        due_at: None,
                        status,
                        priority: Priority::default(),
                        active: true,
                    })
                    .await
                    .unwrap();
            }
            let now = timestamp::now();
            for start in [now - chrono::Duration::days(2), now + chrono::Duration::days(2)] {
                AppointmentRepo::new(pool)
                    .create(NewAppointment {
                        patient_id: pid,
                        doctor_id: user.uid,
                        start_time: start,
                        end_time: start + chrono::Duration::hours(1),
                        location: None,
                        active: true,
                    })
                    .await
                    .unwrap();
            }

            let functions = DbFunctions::new(state.pool.clone(), state.hub.clone());
            let report = functions
                .call(GENERATE_REPORT, &json!({}), CallContext { patient_id: Some(pid) })
                .await
                .unwrap();

            assert_eq!(report["patient"]["pid"], pid);
            assert_eq!(report["conditions"].as_array().unwrap().len(), 1);
            assert_eq!(report["medications"][0]["name"], "Donepezil");
            assert_eq!(report["upcoming_appointments"].as_array().unwrap().len(), 1);
            assert_eq!(report["open_tasks"].as_array().unwrap().len(), 1);
            assert_eq!(report["open_tasks"][0]["status"], "pending");
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn report_for_missing_patient_is_not_found() {
            let state = db_state().await;
            let functions = DbFunctions::new(state.pool.clone(), state.hub.clone());
            let err = functions
                .call(GENERATE_REPORT, &json!({"patient_id": i32::MAX}), CallContext::default())
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Patient not found");
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn created_appointment_is_stored_and_announced() {
            let state = db_state().await;
            let (doctor, patient) = care_pair(&state, "fn-appt").await;
            let mut rx = state.hub.subscribe();
            let functions = DbFunctions::new(state.pool.clone(), state.hub.clone());

            let result = functions
                .call(
                    CREATE_APPOINTMENT,
                    &json!({
                        "doctor_id": doctor.uid,
                        "start_time": "2025-11-10T14:00:00",
                        "end_time": "2025-11-10T14:30:00",
                        "location": "Clinic"
                    }),
                    CallContext { patient_id: Some(patient.pid) },
                )
                .await
                .unwrap();

            let aid = result["appointment_id"].as_i64().unwrap() as i32;
            let stored = AppointmentRepo::new(&state.pool).get(aid).await.unwrap();
            assert_eq!(stored.patient_id, patient.pid);
            assert_eq!(stored.location.as_deref(), Some("Clinic"));
            assert_eq!(result["start_time"], "2025-11-10T14:00:00");

            let event = rx.try_recv().unwrap();
            assert_eq!(event.event, events::SCHEDULE_UPDATED);
            assert_eq!(event.room, Some(events::patient_room(patient.pid)));

            let err = functions
                .call(
                    CREATE_APPOINTMENT,
                    &json!({
                        "patient_id": patient.pid,
                        "doctor_id": i32::MAX,
                        "start_time": "2025-11-10T14:00:00",
                        "end_time": "2025-11-10T14:30:00"
                    }),
                    CallContext::default(),
                )
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Doctor not found");
        }
    }
}
