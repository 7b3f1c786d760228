//! Sample data for demos and local testing
//!
//! Both seeders are idempotent: they skip any section that already has data.

use std::fmt;

use sqlx::PgPool;

use super::repos::DbError;

/// Seeding error type
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("no patients found; create a patient first")]
    NoPatients,

    #[error("patient {0} not found")]
    UnknownPatient(i32),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for SeedError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(e.into())
    }
}

struct SampleResource {
    title: &'static str,
    category: &'static str,
    description: &'static str,
    url: &'static str,
}

const RESOURCES: &[SampleResource] = &[
    SampleResource {
        title: "Weekly Community Health Walk",
        category: "health",
        description: "Join us for a free weekly health walk every Saturday morning at Central Park. Great for cardiovascular health and meeting neighbors!",
        url: "https://example.com/health-walk",
    },
    SampleResource {
        title: "Caregiver Support Group",
        category: "support groups",
        description: "Monthly meetup for caregivers to share experiences, get advice, and find emotional support. Professional counselor facilitated.",
        url: "https://example.com/caregiver-support",
    },
    SampleResource {
        title: "Free Health Screening Clinic",
        category: "health",
        description: "Free blood pressure, diabetes, and cholesterol screenings every first Tuesday of the month at Community Health Center.",
        url: "https://example.com/health-screening",
    },
    SampleResource {
        title: "Nutrition and Wellness Workshop",
        category: "educational",
        description: "Learn about healthy eating, meal planning, and nutrition for chronic disease management. Free workshop with dietitian.",
        url: "https://example.com/nutrition-workshop",
    },
    SampleResource {
        title: "Senior Social Hour",
        category: "social",
        description: "Weekly social gathering with games, music, and refreshments at the Community Center. All ages welcome!",
        url: "https://example.com/senior-social",
    },
    SampleResource {
        title: "Medication Management Class",
        category: "educational",
        description: "Learn safe medication practices, avoiding drug interactions, and organizing medications. Free class by pharmacist.",
        url: "https://example.com/medication-class",
    },
    SampleResource {
        title: "Yoga for Wellness",
        category: "health",
        description: "Gentle yoga classes adapted for seniors and those with mobility limitations. Monday and Thursday evenings.",
        url: "https://example.com/yoga",
    },
    SampleResource {
        title: "Family Caregiver Training",
        category: "educational",
        description: "Comprehensive training program covering patient care, emergency response, and self-care for caregivers.",
        url: "https://example.com/caregiver-training",
    },
    SampleResource {
        title: "Community Garden Project",
        category: "social",
        description: "Join our community garden where members grow vegetables and flowers together. Therapeutic and social activity.",
        url: "https://example.com/garden",
    },
    SampleResource {
        title: "Mental Health Awareness Seminar",
        category: "health",
        description: "Learn about managing stress, anxiety, and depression for both caregivers and patients. Professional speakers.",
        url: "https://example.com/mental-health",
    },
];

const HOME_ADDRESS: &str = "123 Oak Street, Springfield, MA 01103";
const CAREGIVER_STATUS: &str = "At work";

/// (step, title, description, photo)
const LANDMARKS: &[(i32, &str, &str, &str)] = &[
    (
        1,
        "Exit Building",
        "Go through the main entrance and turn right",
        "https://images.unsplash.com/photo-1545324418-cc1a3fa10c00?w=400",
    ),
    (
        2,
        "Walk Past Oak Tree",
        "Continue walking until you see the large oak tree on your left",
        "https://images.unsplash.com/photo-1502082553048-f009c37129b9?w=400",
    ),
    (
        3,
        "Corner Store",
        "Turn left at the Stop & Shop corner store",
        "https://images.unsplash.com/photo-1604719312566-8912e9227c6a?w=400",
    ),
    (
        4,
        "Your Street",
        "Walk 2 blocks and your house is on the right (blue door)",
        "https://images.unsplash.com/photo-1570129477492-45c003edd2be?w=400",
    ),
];

/// (order, question, answer)
const FAQS: &[(i32, &str, &str)] = &[
    (1, "Where is Sarah?", "I'm at work right now. I'll be home at 5:00 PM. Love you!"),
    (
        2,
        "How do I get home?",
        "Follow the navigation steps on your screen, or call me if you need help. I'm here for you!",
    ),
    (
        3,
        "When is lunch?",
        "Lunch is at 12:30 PM today in the kitchen. I'll call you when it's ready!",
    ),
    (
        4,
        "Did I take my medicine?",
        "Yes! You took your blue pill at 8:00 AM this morning. Great job remembering!",
    ),
    (
        5,
        "What day is it?",
        "Today is Friday, November 8th, 2025. We're having chicken for dinner tonight!",
    ),
    (
        6,
        "Can I go for a walk?",
        "Yes! Please use the navigation to stay nearby, or wait for me to come home at 5 PM and we can walk together.",
    ),
];

/// (order, name, relationship, phone, photo, primary)
const CONTACTS: &[(i32, &str, &str, &str, &str, bool)] = &[
    (
        1,
        "Sarah Smith",
        "Daughter",
        "555-0123",
        "https://images.unsplash.com/photo-1494790108377-be9c29b29330?w=200",
        true,
    ),
    (
        2,
        "John Smith",
        "Son",
        "555-0456",
        "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=200",
        false,
    ),
    (
        3,
        "Dr. Rivera",
        "Doctor",
        "555-7890",
        "https://images.unsplash.com/photo-1559839734-2b71ea197ec2?w=200",
        false,
    ),
];

/// Outcome of one seeded section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Inserted(usize),
    /// Section already had this many active rows
    Existing(i64),
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted(n) => write!(f, "added {n}"),
            Self::Existing(n) => write!(f, "{n} already present"),
        }
    }
}

/// What `seed_display` did for a patient
#[derive(Debug, Clone)]
pub struct DisplaySeedReport {
    pub patient_id: i32,
    pub patient_name: String,
    pub config_created: bool,
    pub landmarks: Section,
    pub faqs: Section,
    pub contacts: Section,
}

/// Insert the sample community resources unless the table has rows.
pub async fn seed_resources(pool: &PgPool) -> Result<Section, SeedError> {
    let mut tx = pool.begin().await?;

    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        tracing::info!(existing, "resources already seeded, skipping");
        return Ok(Section::Existing(existing));
    }

    for r in RESOURCES {
        sqlx::query("INSERT INTO resources (title, category, description, url) VALUES ($1, $2, $3, $4)")
            .bind(r.title)
            .bind(r.category)
            .bind(r.description)
            .bind(r.url)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!(count = RESOURCES.len(), "seeded resources");
    Ok(Section::Inserted(RESOURCES.len()))
}

/// Populate display config, landmarks, FAQs and contacts for one patient.
///
/// With `patient_id = None` the lowest-numbered patient is used.
pub async fn seed_display(pool: &PgPool, patient_id: Option<i32>) -> Result<DisplaySeedReport, SeedError> {
    let mut tx = pool.begin().await?;

    let patient: Option<(i32, String)> = match patient_id {
        Some(pid) => {
            sqlx::query_as("SELECT pid, name FROM patients WHERE pid = $1")
                .bind(pid)
                .fetch_optional(&mut *tx)
                .await?
        }
        None => {
            sqlx::query_as("SELECT pid, name FROM patients ORDER BY pid LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?
        }
    };
    let (pid, patient_name) = match (patient, patient_id) {
        (Some(p), _) => p,
        (None, Some(requested)) => return Err(SeedError::UnknownPatient(requested)),
        (None, None) => return Err(SeedError::NoPatients),
    };
    tracing::info!(patient_id = pid, patient = %patient_name, "seeding display data");

    let inserted = sqlx::query(
        r#"
        INSERT INTO patient_display_config (patient_id, home_address, caregiver_status)
        VALUES ($1, $2, $3)
        ON CONFLICT (patient_id) DO NOTHING
        "#,
    )
    .bind(pid)
    .bind(HOME_ADDRESS)
    .bind(CAREGIVER_STATUS)
    .execute(&mut *tx)
    .await?;
    let config_created = inserted.rows_affected() > 0;

    let landmarks = match count_active(&mut tx, "navigation_landmarks", pid).await? {
        0 => {
            for (step, title, description, photo) in LANDMARKS {
                sqlx::query(
                    "INSERT INTO navigation_landmarks (patient_id, step_number, title, description, photo_url) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(pid)
                .bind(step)
                .bind(title)
                .bind(description)
                .bind(photo)
                .execute(&mut *tx)
                .await?;
            }
            Section::Inserted(LANDMARKS.len())
        }
        n => Section::Existing(n),
    };

    let faqs = match count_active(&mut tx, "patient_faqs", pid).await? {
        0 => {
            for (order, question, answer) in FAQS {
                sqlx::query(
                    "INSERT INTO patient_faqs (patient_id, question, answer_text, order_index) VALUES ($1, $2, $3, $4)",
                )
                .bind(pid)
                .bind(question)
                .bind(answer)
                .bind(order)
                .execute(&mut *tx)
                .await?;
            }
            Section::Inserted(FAQS.len())
        }
        n => Section::Existing(n),
    };

    let contacts = match count_active(&mut tx, "emergency_contacts", pid).await? {
        0 => {
            for (order, name, relationship, phone, photo, primary) in CONTACTS {
                sqlx::query(
                    r#"
                    INSERT INTO emergency_contacts
                        (patient_id, name, relationship, phone, photo_url, is_primary, order_index)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(pid)
                .bind(name)
                .bind(relationship)
                .bind(phone)
                .bind(photo)
                .bind(primary)
                .bind(order)
                .execute(&mut *tx)
                .await?;
            }
            Section::Inserted(CONTACTS.len())
        }
        n => Section::Existing(n),
    };

    tx.commit().await?;

    Ok(DisplaySeedReport {
        patient_id: pid,
        patient_name,
        config_created,
        landmarks,
        faqs,
        contacts,
    })
}

async fn count_active(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    table: &'static str,
    patient_id: i32,
) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE patient_id = $1 AND active");
    let (count,): (i64,) = sqlx::query_as(&sql)
        .bind(patient_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_sizes() {
        assert_eq!(RESOURCES.len(), 10);
        assert_eq!(LANDMARKS.len(), 4);
        assert_eq!(FAQS.len(), 6);
        assert_eq!(CONTACTS.len(), 3);
    }

    #[test]
    fn exactly_one_primary_contact() {
        assert_eq!(CONTACTS.iter().filter(|c| c.5).count(), 1);
    }

    #[test]
    fn landmark_steps_are_sequential() {
        let steps: Vec<i32> = LANDMARKS.iter().map(|l| l.0).collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);
    }

    #[test]
    fn section_display() {
        assert_eq!(Section::Inserted(4).to_string(), "added 4");
        assert_eq!(Section::Existing(2).to_string(), "2 already present");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn unknown_patient_is_reported() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool creation failed");
        crate::db::migrations::run(&pool).await.expect("migrations failed");

        let err = seed_display(&pool, Some(i32::MAX)).await.unwrap_err();
        assert!(matches!(err, SeedError::UnknownPatient(id) if id == i32::MAX));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn display_seed_runs_once_per_patient() {
        let state = crate::http::routes::test_support::db_state().await;
        let (_, patient) = crate::http::routes::test_support::care_pair(&state, "seed-display").await;

        let first = seed_display(&state.pool, Some(patient.pid)).await.unwrap();
        assert!(first.config_created);
        assert_eq!(first.landmarks, Section::Inserted(LANDMARKS.len()));
        assert_eq!(first.faqs, Section::Inserted(FAQS.len()));
        assert_eq!(first.contacts, Section::Inserted(CONTACTS.len()));

        let second = seed_display(&state.pool, Some(patient.pid)).await.unwrap();
        assert!(!second.config_created);
        assert_eq!(second.landmarks, Section::Existing(LANDMARKS.len() as i64));
        assert_eq!(second.faqs, Section::Existing(FAQS.len() as i64));
        assert_eq!(second.contacts, Section::Existing(CONTACTS.len() as i64));
    }
}
