//! Update bodies combine the patch helpers, timestamp parsing and the task
//! vocabularies the way the server's change sets do.

use carelink_core::patch::{self, nullable};
use carelink_core::{timestamp, Priority, TaskStatus};
use chrono::NaiveDateTime;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct TaskUpdate {
    title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    description: Option<Option<String>>,
    #[serde(default, with = "timestamp::iso_patch")]
    due_at: Option<Option<NaiveDateTime>>,
    status: Option<String>,
}

#[derive(Debug)]
struct Row {
    title: String,
    description: Option<String>,
    due_at: Option<NaiveDateTime>,
    status: TaskStatus,
}

fn apply(update: TaskUpdate, row: &mut Row) {
    patch::set(&mut row.title, update.title);
    patch::set_nullable(&mut row.description, update.description);
    patch::set_nullable(&mut row.due_at, update.due_at);
    if let Some(status) = update.status.as_deref().and_then(TaskStatus::parse) {
        row.status = status;
    }
}

fn row() -> Row {
    Row {
        title: "Pharmacy pickup".into(),
        description: Some("Bring the card".into()),
        due_at: Some(timestamp::parse("2025-11-08T09:00:00").unwrap()),
        status: TaskStatus::Pending,
    }
}

#[test]
fn empty_body_changes_nothing() {
    let mut r = row();
    apply(serde_json::from_str("{}").unwrap(), &mut r);
    assert_eq!(r.title, "Pharmacy pickup");
    assert!(r.description.is_some());
    assert!(r.due_at.is_some());
}

#[test]
fn nulls_clear_and_offsets_normalise() {
    let mut r = row();
    let update: TaskUpdate = serde_json::from_str(
        r#"{"description": null, "due_at": "2025-11-08T09:00:00-05:00", "status": "IN_PROGRESS"}"#,
    )
    .unwrap();
    apply(update, &mut r);

    assert_eq!(r.description, None);
    assert_eq!(
        r.due_at.map(|d| timestamp::format(&d)).as_deref(),
        Some("2025-11-08T14:00:00")
    );
    assert_eq!(r.status, TaskStatus::InProgress);
}

#[test]
fn unknown_priority_falls_back_to_default() {
    let priority = Priority::parse("critical").unwrap_or_default();
    assert_eq!(priority, Priority::Medium);
    assert_eq!(priority.as_str(), "medium");
}
