//! User repository
//!
//! Users are caregivers, doctors and prescribers. Passwords arrive here
//! already hashed.

use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool};

use super::DbError;

/// User record from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub uid: i32,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

/// Validated signup data
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
}

const COLUMNS: &str = "uid, email, password_hash, name, phone, active, created_at";

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. A taken email surfaces as `DbError::Duplicate`.
    pub async fn create(&self, user: NewUser) -> Result<User, DbError> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, name, phone) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.phone)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, uid: i32) -> Result<User, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE uid = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(uid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", uid))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn exists(&self, uid: i32) -> Result<bool, DbError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE uid = $1)")
            .bind(uid)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }
}
