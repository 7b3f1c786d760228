//! Community resource repository

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use carelink_core::patch::{self, nullable};
use carelink_core::timestamp;

use super::DbError;

/// Resource record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Resource {
    pub rid: i32,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub active: bool,
    #[serde(with = "timestamp::iso")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub url: Option<Option<String>>,
    pub active: Option<bool>,
}

impl ResourceChanges {
    pub fn apply(self, resource: &mut Resource) {
        patch::set(&mut resource.title, self.title);
        patch::set_nullable(&mut resource.category, self.category);
        patch::set_nullable(&mut resource.description, self.description);
        patch::set_nullable(&mut resource.url, self.url);
        patch::set(&mut resource.active, self.active);
    }
}

const COLUMNS: &str = "rid, title, category, description, url, active, created_at";

/// Resource repository
pub struct ResourceRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ResourceRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, resource: NewResource) -> Result<Resource, DbError> {
        let sql = format!(
            "INSERT INTO resources (title, category, description, url, active) VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        let created = sqlx::query_as::<_, Resource>(&sql)
            .bind(&resource.title)
            .bind(&resource.category)
            .bind(&resource.description)
            .bind(&resource.url)
            .bind(resource.active)
            .fetch_one(self.pool)
            .await?;
        Ok(created)
    }

    pub async fn get(&self, rid: i32) -> Result<Resource, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM resources WHERE rid = $1");
        sqlx::query_as::<_, Resource>(&sql)
            .bind(rid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("resource", rid))
    }

    /// All resources, optionally in one category (exact match).
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Resource>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM resources WHERE ($1::TEXT IS NULL OR category = $1) ORDER BY rid"
        );
        let rows = sqlx::query_as::<_, Resource>(&sql)
            .bind(category)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Active resources for the assistant; category compared case-insensitively.
    pub async fn list_active(&self, category: Option<&str>, limit: i64) -> Result<Vec<Resource>, DbError> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM resources
            WHERE active AND ($1::TEXT IS NULL OR LOWER(category) = LOWER($1))
            ORDER BY rid
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, Resource>(&sql)
            .bind(category)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    pub async fn update(&self, rid: i32, changes: ResourceChanges) -> Result<Resource, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {COLUMNS} FROM resources WHERE rid = $1 FOR UPDATE");
        let mut resource = sqlx::query_as::<_, Resource>(&sql)
            .bind(rid)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("resource", rid))?;

        changes.apply(&mut resource);

        sqlx::query(
            "UPDATE resources SET title = $2, category = $3, description = $4, url = $5, active = $6 WHERE rid = $1",
        )
        .bind(rid)
        .bind(&resource.title)
        .bind(&resource.category)
        .bind(&resource.description)
        .bind(&resource.url)
        .bind(resource.active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(resource)
    }

    pub async fn delete(&self, rid: i32) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM resources WHERE rid = $1")
            .bind(rid)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("resource", rid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn category_filter_is_case_insensitive_for_assistant() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool creation failed");
        crate::db::migrations::run(&pool).await.expect("migrations failed");

        let repo = ResourceRepo::new(&pool);
        let tag = format!("Respite-{}", chrono::Utc::now().timestamp_micros());
        repo.create(NewResource {
            title: "Weekend respite".into(),
            category: Some(tag.clone()),
            description: None,
            url: None,
            active: true,
        })
        .await
        .unwrap();

        let found = repo.list_active(Some(&tag.to_lowercase()), 5).await.unwrap();
        assert_eq!(found.len(), 1);
        let exact = repo.list(Some(&tag.to_lowercase())).await.unwrap();
        assert!(exact.is_empty());
    }
}
