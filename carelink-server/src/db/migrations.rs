//! Schema migrations
//!
//! Every statement is `CREATE ... IF NOT EXISTS`, so running this on each
//! start-up is safe. Tables are created in dependency order inside a single
//! transaction: either the whole schema lands or none of it does.

use sqlx::PgPool;

use super::repos::DbError;

/// (table, DDL) in creation order
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            uid SERIAL PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            phone TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "patients",
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            pid SERIAL PRIMARY KEY,
            caretaker_id INTEGER NOT NULL UNIQUE REFERENCES users(uid),
            name TEXT NOT NULL,
            age INTEGER,
            gender TEXT,
            medical_summary TEXT,
            emergency_contact TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            tid SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid),
            caretaker_id INTEGER NOT NULL REFERENCES users(uid),
            title TEXT NOT NULL,
            description TEXT,
            due_at TIMESTAMP,
            status TEXT NOT NULL DEFAULT 'pending',
            priority TEXT NOT NULL DEFAULT 'medium',
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "reminders",
        r#"
        CREATE TABLE IF NOT EXISTS reminders (
            rid SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid),
            task_id INTEGER NOT NULL REFERENCES tasks(tid) ON DELETE CASCADE,
            channel TEXT,
            remind_at TIMESTAMP NOT NULL,
            sent BOOLEAN NOT NULL DEFAULT FALSE,
            active BOOLEAN NOT NULL DEFAULT TRUE
        )
        "#,
    ),
    (
        "resources",
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            rid SERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            category TEXT,
            description TEXT,
            url TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "conditions",
        r#"
        CREATE TABLE IF NOT EXISTS conditions (
            cid SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid),
            status TEXT,
            onset_date TIMESTAMP,
            note TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "medications",
        r#"
        CREATE TABLE IF NOT EXISTS medications (
            mid SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid),
            name TEXT NOT NULL,
            dose TEXT,
            schedule_text TEXT,
            start_date TIMESTAMP,
            end_date TIMESTAMP,
            prescriber_id INTEGER REFERENCES users(uid),
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "appointments",
        r#"
        CREATE TABLE IF NOT EXISTS appointments (
            aid SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid),
            doctor_id INTEGER NOT NULL REFERENCES users(uid),
            start_time TIMESTAMP NOT NULL,
            end_time TIMESTAMP NOT NULL,
            location TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "recommendations",
        r#"
        CREATE TABLE IF NOT EXISTS recommendations (
            rid SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid),
            title TEXT NOT NULL,
            sources TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "patient_display_config",
        r#"
        CREATE TABLE IF NOT EXISTS patient_display_config (
            id SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL UNIQUE REFERENCES patients(pid) ON DELETE CASCADE,
            show_schedule BOOLEAN NOT NULL DEFAULT TRUE,
            show_navigation BOOLEAN NOT NULL DEFAULT TRUE,
            show_faq BOOLEAN NOT NULL DEFAULT TRUE,
            home_address TEXT,
            gps_tracking_enabled BOOLEAN NOT NULL DEFAULT FALSE,
            geofence_radius_meters INTEGER NOT NULL DEFAULT 500,
            voice_reminders_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            reminder_minutes_before INTEGER NOT NULL DEFAULT 5,
            auto_mark_complete BOOLEAN NOT NULL DEFAULT TRUE,
            caregiver_status TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC'),
            updated_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "navigation_landmarks",
        r#"
        CREATE TABLE IF NOT EXISTS navigation_landmarks (
            id SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid) ON DELETE CASCADE,
            step_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            photo_url TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "patient_faqs",
        r#"
        CREATE TABLE IF NOT EXISTS patient_faqs (
            id SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid) ON DELETE CASCADE,
            question TEXT NOT NULL,
            answer_text TEXT NOT NULL,
            voice_recording_url TEXT,
            order_index INTEGER NOT NULL DEFAULT 0,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC'),
            updated_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
    (
        "emergency_contacts",
        r#"
        CREATE TABLE IF NOT EXISTS emergency_contacts (
            id SERIAL PRIMARY KEY,
            patient_id INTEGER NOT NULL REFERENCES patients(pid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            relationship TEXT,
            phone TEXT NOT NULL,
            photo_url TEXT,
            is_primary BOOLEAN NOT NULL DEFAULT FALSE,
            order_index INTEGER NOT NULL DEFAULT 0,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT (NOW() AT TIME ZONE 'UTC')
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_tasks_patient ON tasks(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_reminders_task ON reminders(task_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient_start ON appointments(patient_id, start_time)",
    "CREATE INDEX IF NOT EXISTS idx_landmarks_patient ON navigation_landmarks(patient_id, step_number)",
    "CREATE INDEX IF NOT EXISTS idx_faqs_patient ON patient_faqs(patient_id, order_index)",
    "CREATE INDEX IF NOT EXISTS idx_contacts_patient ON emergency_contacts(patient_id, order_index)",
];

/// Table names in creation order.
pub fn table_names() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|(name, _)| *name)
}

/// Run all migrations
pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running migrations...");

    let mut tx = pool.begin().await?;
    for (table, ddl) in TABLES {
        tracing::debug!(table, "ensuring table");
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(tables = TABLES.len(), "Migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_tables_are_created_first() {
        let order: Vec<&str> = table_names().collect();
        let pos = |t: &str| order.iter().position(|n| *n == t).unwrap();

        for (table, ddl) in TABLES {
            for referenced in order.iter().filter(|t| ddl.contains(&format!("REFERENCES {t}("))) {
                assert!(
                    pos(referenced) < pos(table),
                    "{table} references {referenced} before it exists"
                );
            }
        }
    }

    #[test]
    fn every_statement_is_idempotent() {
        for (table, ddl) in TABLES {
            assert!(ddl.contains("IF NOT EXISTS"), "{table}");
        }
        assert!(INDEXES.iter().all(|ddl| ddl.contains("IF NOT EXISTS")));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn running_twice_is_harmless() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool creation failed");
        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");
    }
}
