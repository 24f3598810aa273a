use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use tailor_core::wages::{AssignmentDraft, AssignmentStatus, WorkAssignment, WorkType};

use crate::to_rfc3339;

const SELECT_ASSIGNMENT: &str = "SELECT id, labour_id, order_id, work_type, quantity, \
     wage_per_unit, total_wages, custom_wage, order_customer_name, order_date, assigned_at, \
     status, completed_at, created_at, updated_at FROM work_assignments";

/// Repository for labour work assignments.
#[derive(Clone)]
pub struct AssignmentRepository {
    pool: SqlitePool,
}

impl AssignmentRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores an assignment with the wages already fixed in the draft.
    pub async fn insert(&self, record: &NewAssignment<'_>) -> Result<WorkAssignment, AssignmentError> {
        let draft = record.draft;
        let assignment = WorkAssignment {
            id: Uuid::new_v4().to_string(),
            labour_id: draft.labour_id.clone(),
            order_id: draft.order_id.clone(),
            work_type: draft.work_type,
            quantity: draft.quantity,
            wage_per_unit: draft.quote.wage_per_unit,
            total_wages: draft.quote.total_wages,
            custom_wage: draft.custom_wage,
            order_customer_name: draft.order_customer_name.clone(),
            order_date: draft
                .order_date
                .clone()
                .unwrap_or_else(|| record.local_date.to_string()),
            assigned_at: record.assigned_at,
            status: AssignmentStatus::Assigned,
            completed_at: None,
            created_at: record.assigned_at,
            updated_at: record.assigned_at,
        };

        let assigned_at = to_rfc3339(record.assigned_at);
        sqlx::query(
            "INSERT INTO work_assignments \
             (id, labour_id, order_id, work_type, quantity, wage_per_unit, total_wages, custom_wage, order_customer_name, order_date, assigned_at, status, completed_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(&assignment.id)
        .bind(&assignment.labour_id)
        .bind(&assignment.order_id)
        .bind(assignment.work_type.as_str())
        .bind(i64::from(assignment.quantity))
        .bind(assignment.wage_per_unit)
        .bind(assignment.total_wages)
        .bind(assignment.custom_wage)
        .bind(&assignment.order_customer_name)
        .bind(&assignment.order_date)
        .bind(&assigned_at)
        .bind(assignment.status.as_str())
        .bind(&assigned_at)
        .bind(&assigned_at)
        .execute(&self.pool)
        .await?;

        Ok(assignment)
    }

    /// Assignments recorded against an order, newest first.
    pub async fn list_for_order(&self, order_id: &str) -> Result<Vec<WorkAssignment>, AssignmentError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{SELECT_ASSIGNMENT} WHERE order_id = ? ORDER BY assigned_at DESC, rowid DESC"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AssignmentRow::into_domain).collect()
    }

    /// Assignments for a labour member, optionally bounded by assignment time.
    pub async fn list_for_labour(
        &self,
        labour_id: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WorkAssignment>, AssignmentError> {
        let rows = match range {
            Some((start, end)) => {
                sqlx::query_as::<_, AssignmentRow>(&format!(
                    "{SELECT_ASSIGNMENT} WHERE labour_id = ? AND assigned_at >= ? AND assigned_at <= ? \
                     ORDER BY assigned_at DESC, rowid DESC"
                ))
                .bind(labour_id)
                .bind(to_rfc3339(start))
                .bind(to_rfc3339(end))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AssignmentRow>(&format!(
                    "{SELECT_ASSIGNMENT} WHERE labour_id = ? ORDER BY assigned_at DESC, rowid DESC"
                ))
                .bind(labour_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(AssignmentRow::into_domain).collect()
    }

    /// Updates the status, stamping `completed_at` on completion.
    pub async fn update_status(
        &self,
        id: &str,
        status: AssignmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<WorkAssignment>, AssignmentError> {
        let timestamp = to_rfc3339(updated_at);
        let completed_at = (status == AssignmentStatus::Completed).then(|| timestamp.clone());
        let row = sqlx::query_as::<_, AssignmentRow>(
            "UPDATE work_assignments \
             SET status = ?, updated_at = ?, completed_at = COALESCE(?, completed_at) \
             WHERE id = ? \
             RETURNING id, labour_id, order_id, work_type, quantity, wage_per_unit, total_wages, \
                 custom_wage, order_customer_name, order_date, assigned_at, status, completed_at, \
                 created_at, updated_at",
        )
        .bind(status.as_str())
        .bind(&timestamp)
        .bind(completed_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AssignmentRow::into_domain).transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<bool, AssignmentError> {
        let result = sqlx::query("DELETE FROM work_assignments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Parameters required to insert a work assignment.
pub struct NewAssignment<'a> {
    pub draft: &'a AssignmentDraft,
    /// Used as the order date when the draft carries none.
    pub local_date: &'a str,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    labour_id: String,
    order_id: String,
    work_type: String,
    quantity: i64,
    wage_per_unit: f64,
    total_wages: f64,
    custom_wage: Option<f64>,
    order_customer_name: String,
    order_date: String,
    assigned_at: DateTime<Utc>,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssignmentRow {
    fn into_domain(self) -> Result<WorkAssignment, AssignmentError> {
        let work_type = WorkType::parse(&self.work_type)
            .ok_or_else(|| AssignmentError::Corrupt(format!("unknown work type {}", self.work_type)))?;
        let status = AssignmentStatus::parse(&self.status)
            .ok_or_else(|| AssignmentError::Corrupt(format!("unknown status {}", self.status)))?;
        let quantity = u32::try_from(self.quantity)
            .map_err(|_| AssignmentError::Corrupt(format!("invalid quantity {}", self.quantity)))?;

        Ok(WorkAssignment {
            id: self.id,
            labour_id: self.labour_id,
            order_id: self.order_id,
            work_type,
            quantity,
            wage_per_unit: self.wage_per_unit,
            total_wages: self.total_wages,
            custom_wage: self.custom_wage,
            order_customer_name: self.order_customer_name,
            order_date: self.order_date,
            assigned_at: self.assigned_at,
            status,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("stored work assignment is corrupt: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tailor_core::wages::{NewAssignmentRequest, WageRates};

    use crate::test_support::setup_db;

    fn draft(labour: &str, order: &str, work_type: &str, quantity: u32) -> AssignmentDraft {
        let request: NewAssignmentRequest = serde_json::from_value(json!({
            "labourId": labour,
            "orderId": order,
            "workType": work_type,
            "quantity": quantity,
        }))
        .unwrap();
        AssignmentDraft::build(request, &WageRates::default()).unwrap()
    }

    async fn insert(
        repo: &AssignmentRepository,
        draft: &AssignmentDraft,
        assigned_at: DateTime<Utc>,
    ) -> WorkAssignment {
        repo.insert(&NewAssignment {
            draft,
            local_date: "2025-03-14",
            assigned_at,
        })
        .await
        .expect("insert")
    }

    #[tokio::test]
    async fn insert_persists_fixed_wages() {
        let test_db = setup_db().await;
        let repo = test_db.db.assignments();
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let stored = insert(&repo, &draft("l-1", "ORD001", "Shirt", 3), at).await;
        assert_eq!(stored.total_wages, 300.0);
        assert_eq!(stored.order_date, "2025-03-14");

        let listed = repo.list_for_order("ORD001").await.expect("list");
        assert_eq!(listed, vec![stored]);
    }

    #[tokio::test]
    async fn labour_listing_honours_range() {
        let test_db = setup_db().await;
        let repo = test_db.db.assignments();
        let early = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 3, 20, 10, 0, 0).unwrap();
        insert(&repo, &draft("l-1", "ORD001", "Pant", 1), early).await;
        insert(&repo, &draft("l-1", "ORD002", "Pant", 2), late).await;
        insert(&repo, &draft("l-2", "ORD002", "Ironing", 5), late).await;

        let all = repo.list_for_labour("l-1", None).await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].order_id, "ORD002");

        let range = (
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap(),
        );
        let bounded = repo.list_for_labour("l-1", Some(range)).await.expect("list");
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].total_wages, 220.0);
    }

    #[tokio::test]
    async fn completing_stamps_completed_at() {
        let test_db = setup_db().await;
        let repo = test_db.db.assignments();
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let stored = insert(&repo, &draft("l-1", "ORD001", "Embroidery", 2), at).await;

        let progressed = repo
            .update_status(&stored.id, AssignmentStatus::InProgress, at)
            .await
            .expect("update")
            .expect("present");
        assert_eq!(progressed.completed_at, None);

        let done_at = Utc.with_ymd_and_hms(2025, 3, 15, 18, 0, 0).unwrap();
        let done = repo
            .update_status(&stored.id, AssignmentStatus::Completed, done_at)
            .await
            .expect("update")
            .expect("present");
        assert_eq!(done.status, AssignmentStatus::Completed);
        assert_eq!(done.completed_at, Some(done_at));

        assert!(repo
            .update_status("missing", AssignmentStatus::Completed, done_at)
            .await
            .expect("update")
            .is_none());
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let test_db = setup_db().await;
        let repo = test_db.db.assignments();
        let stored = insert(&repo, &draft("l-1", "ORD001", "Pant", 1), Utc::now()).await;
        assert!(repo.delete(&stored.id).await.expect("delete"));
        assert!(!repo.delete(&stored.id).await.expect("delete"));
    }
}
