use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use tailor_core::labour::{Labour, LabourCategory, LabourDraft};

use crate::to_rfc3339;

const LABOUR_COLUMNS: &str = "id, name, category, specialist, age, phone, photo, join_date, \
     status, created_at, updated_at";

/// Repository for the labour roster.
#[derive(Clone)]
pub struct LabourRepository {
    pool: SqlitePool,
}

impl LabourRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        draft: &LabourDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Labour, LabourError> {
        let timestamp = to_rfc3339(created_at);
        let row = sqlx::query_as::<_, LabourRow>(&format!(
            "INSERT INTO labour ({LABOUR_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {LABOUR_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&draft.name)
        .bind(draft.category.as_str())
        .bind(&draft.specialist)
        .bind(draft.age.map(i64::from))
        .bind(&draft.phone)
        .bind(&draft.photo)
        .bind(&draft.join_date)
        .bind(&draft.status)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    /// Lists the roster newest first, optionally limited to one category.
    pub async fn list(&self, category: Option<LabourCategory>) -> Result<Vec<Labour>, LabourError> {
        let rows = match category {
            Some(category) => {
                sqlx::query_as::<_, LabourRow>(&format!(
                    "SELECT {LABOUR_COLUMNS} FROM labour WHERE category = ? \
                     ORDER BY created_at DESC, rowid DESC"
                ))
                .bind(category.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LabourRow>(&format!(
                    "SELECT {LABOUR_COLUMNS} FROM labour ORDER BY created_at DESC, rowid DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(LabourRow::into_domain).collect()
    }

    pub async fn find(&self, id: &str) -> Result<Option<Labour>, LabourError> {
        let row = sqlx::query_as::<_, LabourRow>(&format!(
            "SELECT {LABOUR_COLUMNS} FROM labour WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LabourRow::into_domain).transpose()
    }

    /// Replaces the stored fields; `None` when no such labour exists.
    pub async fn update(
        &self,
        id: &str,
        draft: &LabourDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Labour>, LabourError> {
        let row = sqlx::query_as::<_, LabourRow>(&format!(
            "UPDATE labour SET name = ?, category = ?, specialist = ?, age = ?, phone = ?, \
             photo = ?, join_date = ?, status = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING {LABOUR_COLUMNS}"
        ))
        .bind(&draft.name)
        .bind(draft.category.as_str())
        .bind(&draft.specialist)
        .bind(draft.age.map(i64::from))
        .bind(&draft.phone)
        .bind(&draft.photo)
        .bind(&draft.join_date)
        .bind(&draft.status)
        .bind(to_rfc3339(updated_at))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LabourRow::into_domain).transpose()
    }

    /// Removes a roster entry. Its work assignments are kept.
    pub async fn delete(&self, id: &str) -> Result<bool, LabourError> {
        let result = sqlx::query("DELETE FROM labour WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LabourRow {
    id: String,
    name: String,
    category: String,
    specialist: String,
    age: Option<i64>,
    phone: String,
    photo: Option<String>,
    join_date: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LabourRow {
    fn into_domain(self) -> Result<Labour, LabourError> {
        let category = LabourCategory::parse(&self.category)
            .ok_or_else(|| LabourError::Corrupt(format!("unknown category {}", self.category)))?;
        let age = self
            .age
            .map(|age| {
                u32::try_from(age).map_err(|_| LabourError::Corrupt(format!("invalid age {age}")))
            })
            .transpose()?;

        Ok(Labour {
            id: self.id,
            name: self.name,
            category,
            specialist: self.specialist,
            age,
            phone: self.phone,
            photo: self.photo,
            join_date: self.join_date,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Errors that can occur while reading or mutating the roster.
#[derive(Debug, Error)]
pub enum LabourError {
    #[error("stored labour entry is corrupt: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
