use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use tailor_core::order::{NewOrderRequest, Order, OrderDraft, OrderStatus};
use tailor_storage::{NewOrder, OrderError, OrderFilter, SequenceError};

use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextIdResponse {
    next_id: String,
    month_reset: bool,
    current_month: String,
}

/// Preview of the identifier the next order would receive. Read-only.
pub async fn next_id(State(state): State<AppState>) -> Result<Json<NextIdResponse>, ProblemResponse> {
    let preview = state
        .sequencer()
        .peek_next()
        .await
        .map_err(sequence_problem)?;

    Ok(Json(NextIdResponse {
        next_id: preview.identifier.to_string(),
        month_reset: preview.period_will_reset,
        current_month: preview.period.to_string(),
    }))
}

/// Issues an identifier and stores the order in the same transaction.
///
/// A client supplied `orderId` is ignored.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<NewOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ProblemResponse> {
    let draft = OrderDraft::try_from(request).map_err(|err| {
        counter!("orders_created_total", "result" => "invalid").increment(1);
        ProblemResponse::bad_request("invalid_order", err.to_string())
    })?;

    match create_order(&state, &draft).await {
        Ok(order) => {
            counter!("orders_created_total", "result" => "created").increment(1);
            info!(
                stage = "orders",
                order_id = %order.order_id,
                period = %order.period,
                civil = order.is_civil(),
                "order created"
            );
            Ok((StatusCode::CREATED, Json(order)))
        }
        Err(err) => {
            counter!("orders_created_total", "result" => "failed").increment(1);
            Err(match err {
                CreateOrderError::Sequence(err) => sequence_problem(err),
                CreateOrderError::Order(OrderError::DuplicateIdentifier(order_id)) => {
                    error!(stage = "orders", %order_id, "issued order id already stored");
                    ProblemResponse::new(
                        StatusCode::CONFLICT,
                        "duplicate_order_id",
                        format!("order id {order_id} is already used this month"),
                    )
                }
                CreateOrderError::Order(err) => {
                    error!(stage = "orders", error = %err, "failed to store order");
                    ProblemResponse::internal("order_store_failed")
                }
            })
        }
    }
}

async fn create_order(state: &AppState, draft: &OrderDraft) -> Result<Order, CreateOrderError> {
    let sequencer = state.sequencer();
    let mut pending = sequencer.begin().await?;
    let created_at = sequencer.now();
    let local_date = sequencer.local_day(created_at);
    let record = NewOrder {
        issued: pending.issued(),
        draft,
        local_date: &local_date,
        created_at,
    };

    let inserted = state
        .storage()
        .orders()
        .insert(pending.transaction(), &record)
        .await;
    let order = match inserted {
        Ok(order) => order,
        Err(err) => {
            if let Err(rollback) = pending.abandon().await {
                warn!(stage = "orders", error = %rollback, "failed to roll back order id");
            }
            return Err(err.into());
        }
    };

    sequencer.commit(pending).await?;
    Ok(order)
}

#[derive(Debug, Error)]
enum CreateOrderError {
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),
    #[error("order error: {0}")]
    Order(#[from] OrderError),
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ProblemResponse> {
    list_filtered(&state, OrderFilter::All).await
}

/// Orders from walk-in customers, without a company.
pub async fn list_civil(
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, ProblemResponse> {
    list_filtered(&state, OrderFilter::Civil).await
}

async fn list_filtered(
    state: &AppState,
    filter: OrderFilter,
) -> Result<Json<Vec<Order>>, ProblemResponse> {
    let orders = state
        .storage()
        .orders()
        .list(filter)
        .await
        .map_err(|err| order_problem(err, "failed to list orders"))?;
    Ok(Json(orders))
}

pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ProblemResponse> {
    state
        .storage()
        .orders()
        .find(&id)
        .await
        .map_err(|err| order_problem(err, "failed to load order"))?
        .map(Json)
        .ok_or_else(|| ProblemResponse::not_found("order_not_found", "order not found"))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    message: &'static str,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Acknowledgement>, ProblemResponse> {
    let raw = update
        .status
        .ok_or_else(|| ProblemResponse::bad_request("invalid_status", "status is required"))?;
    let status = OrderStatus::parse(&raw).ok_or_else(|| {
        ProblemResponse::bad_request("invalid_status", format!("unknown order status {raw}"))
    })?;

    let updated = state
        .storage()
        .orders()
        .update_status(&id, status, state.now())
        .await
        .map_err(|err| order_problem(err, "failed to update order status"))?;
    if !updated {
        return Err(ProblemResponse::not_found("order_not_found", "order not found"));
    }

    Ok(Json(Acknowledgement {
        message: "status updated",
    }))
}

#[derive(Debug, Deserialize)]
pub struct OrderUpdate {
    #[serde(flatten)]
    changes: NewOrderRequest,
    #[serde(default)]
    status: Option<String>,
}

/// Rewrites the fields present in the body. `orderId` and the period are
/// fixed at creation and cannot be changed.
pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<OrderUpdate>,
) -> Result<Json<Acknowledgement>, ProblemResponse> {
    let orders = state.storage().orders();
    let existing = orders
        .find(&id)
        .await
        .map_err(|err| order_problem(err, "failed to load order"))?
        .ok_or_else(|| ProblemResponse::not_found("order_not_found", "order not found"))?;

    let draft = existing
        .draft()
        .apply(update.changes)
        .map_err(|err| ProblemResponse::bad_request("invalid_order", err.to_string()))?;
    let status = update
        .status
        .map(|raw| {
            OrderStatus::parse(&raw).ok_or_else(|| {
                ProblemResponse::bad_request("invalid_status", format!("unknown order status {raw}"))
            })
        })
        .transpose()?;

    let updated = orders
        .update(&id, &draft, status, state.now())
        .await
        .map_err(|err| order_problem(err, "failed to update order"))?;
    if !updated {
        return Err(ProblemResponse::not_found("order_not_found", "order not found"));
    }

    Ok(Json(Acknowledgement {
        message: "order updated",
    }))
}

/// Deletes an order. The counter is left alone, so its identifier stays used.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Acknowledgement>, ProblemResponse> {
    let deleted = state
        .storage()
        .orders()
        .delete(&id)
        .await
        .map_err(|err| order_problem(err, "failed to delete order"))?;
    if !deleted {
        return Err(ProblemResponse::not_found("order_not_found", "order not found"));
    }

    Ok(Json(Acknowledgement {
        message: "order deleted",
    }))
}

fn sequence_problem(err: SequenceError) -> ProblemResponse {
    match err {
        SequenceError::StorageUnavailable(_) => ProblemResponse::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "sequence_unavailable",
            "order identifier could not be issued; retry the request",
        ),
        SequenceError::CorruptState(_) => ProblemResponse::internal("sequence_corrupt"),
    }
}

fn order_problem(err: OrderError, message: &'static str) -> ProblemResponse {
    error!(stage = "orders", error = %err, "{message}");
    ProblemResponse::internal("order_store_failed")
}
