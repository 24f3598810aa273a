use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use uuid::Uuid;

use tailor_core::order::{Order, OrderDraft, OrderStatus};
use tailor_core::{IssuedIdentifier, OrderIdentifier, Period};

use crate::{is_unique_violation, to_rfc3339};

const SELECT_ORDER: &str = "SELECT id, order_id, period_label, name, phone, email, company_id, \
     no_of_sets, shirt_amount, pant_amount, total_amount, payment_method, shirt_json, pant_json, \
     status, order_date, created_at, updated_at FROM orders";

/// Which orders a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    /// Walk-in customer orders, i.e. orders without a company.
    Civil,
}

/// Repository for customer orders.
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts an order inside the transaction that issued its identifier.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        record: &NewOrder<'_>,
    ) -> Result<Order, OrderError> {
        let draft = record.draft;
        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_id: record.issued.identifier,
            period: record.issued.period,
            name: draft.name.clone(),
            phone: draft.phone.clone(),
            email: draft.email.clone(),
            company_id: draft.company_id.clone(),
            no_of_sets: draft.no_of_sets,
            shirt_amount: draft.shirt_amount,
            pant_amount: draft.pant_amount,
            total_amount: draft.total_amount(),
            payment_method: draft.payment_method.clone(),
            shirt: draft.shirt.clone(),
            pant: draft.pant.clone(),
            status: OrderStatus::Pending,
            date: record.local_date.to_string(),
            created_at: record.created_at,
            updated_at: record.created_at,
        };

        sqlx::query(
            "INSERT INTO orders \
             (id, order_id, period_label, name, phone, email, company_id, no_of_sets, shirt_amount, pant_amount, total_amount, payment_method, shirt_json, pant_json, status, order_date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(order.order_id.to_string())
        .bind(order.period.to_string())
        .bind(&order.name)
        .bind(&order.phone)
        .bind(&order.email)
        .bind(&order.company_id)
        .bind(i64::from(order.no_of_sets))
        .bind(order.shirt_amount)
        .bind(order.pant_amount)
        .bind(order.total_amount)
        .bind(&order.payment_method)
        .bind(order.shirt.to_string())
        .bind(order.pant.to_string())
        .bind(order.status.as_str())
        .bind(&order.date)
        .bind(to_rfc3339(order.created_at))
        .bind(to_rfc3339(order.updated_at))
        .execute(&mut **tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                OrderError::DuplicateIdentifier(order.order_id.to_string())
            } else {
                OrderError::Database(err)
            }
        })?;

        Ok(order)
    }

    /// Lists orders, newest first.
    pub async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, OrderError> {
        let sql = match filter {
            OrderFilter::All => format!("{SELECT_ORDER} ORDER BY created_at DESC, rowid DESC"),
            OrderFilter::Civil => format!(
                "{SELECT_ORDER} WHERE company_id IS NULL ORDER BY created_at DESC, rowid DESC"
            ),
        };
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(OrderRow::into_domain).collect()
    }

    pub async fn find(&self, id: &str) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(OrderRow::into_domain).transpose()
    }

    /// Updates the status; returns `false` when no such order exists.
    pub async fn update_status(
        &self,
        id: &str,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, OrderError> {
        let result = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(to_rfc3339(updated_at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rewrites the editable fields of an order, and its status when given.
    /// The identifier and period never change. Returns `false` when no such
    /// order exists.
    pub async fn update(
        &self,
        id: &str,
        draft: &OrderDraft,
        status: Option<OrderStatus>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, OrderError> {
        let result = sqlx::query(
            "UPDATE orders SET name = ?, phone = ?, email = ?, company_id = ?, no_of_sets = ?, \
             shirt_amount = ?, pant_amount = ?, total_amount = ?, payment_method = ?, \
             shirt_json = ?, pant_json = ?, status = COALESCE(?, status), updated_at = ? \
             WHERE id = ?",
        )
        .bind(&draft.name)
        .bind(&draft.phone)
        .bind(&draft.email)
        .bind(&draft.company_id)
        .bind(i64::from(draft.no_of_sets))
        .bind(draft.shirt_amount)
        .bind(draft.pant_amount)
        .bind(draft.total_amount())
        .bind(&draft.payment_method)
        .bind(draft.shirt.to_string())
        .bind(draft.pant.to_string())
        .bind(status.map(OrderStatus::as_str))
        .bind(to_rfc3339(updated_at))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes an order. Its identifier is not handed out again.
    pub async fn delete(&self, id: &str) -> Result<bool, OrderError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Parameters required to insert an order.
pub struct NewOrder<'a> {
    pub issued: IssuedIdentifier,
    pub draft: &'a OrderDraft,
    pub local_date: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_id: String,
    period_label: String,
    name: String,
    phone: String,
    email: String,
    company_id: Option<String>,
    no_of_sets: i64,
    shirt_amount: f64,
    pant_amount: f64,
    total_amount: f64,
    payment_method: String,
    shirt_json: String,
    pant_json: String,
    status: String,
    order_date: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self) -> Result<Order, OrderError> {
        let order_id: OrderIdentifier = self
            .order_id
            .parse()
            .map_err(|err| OrderError::Corrupt(format!("{err}")))?;
        let period: Period = self
            .period_label
            .parse()
            .map_err(|err| OrderError::Corrupt(format!("{err}")))?;
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| OrderError::Corrupt(format!("unknown status {}", self.status)))?;
        let shirt: Value = serde_json::from_str(&self.shirt_json)?;
        let pant: Value = serde_json::from_str(&self.pant_json)?;

        Ok(Order {
            id: self.id,
            order_id,
            period,
            name: self.name,
            phone: self.phone,
            email: self.email,
            company_id: self.company_id,
            no_of_sets: u32::try_from(self.no_of_sets).unwrap_or(1),
            shirt_amount: self.shirt_amount,
            pant_amount: self.pant_amount,
            total_amount: self.total_amount,
            payment_method: self.payment_method,
            shirt,
            pant,
            status,
            date: self.order_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Errors that can occur while reading or mutating orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order identifier {0} already used in this period")]
    DuplicateIdentifier(String),
    #[error("stored order is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to decode measurements: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
