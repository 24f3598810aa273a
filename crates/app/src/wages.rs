use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use tailor_core::wages::{
    AssignmentDraft, AssignmentStatus, LabourSummary, NewAssignmentRequest, WageRates,
    WorkAssignment,
};
use tailor_storage::{AssignmentError, NewAssignment, WageError};

use crate::problem::ProblemResponse;
use crate::router::AppState;

pub async fn fetch_rates(State(state): State<AppState>) -> Result<Json<WageRates>, ProblemResponse> {
    let rates = state
        .storage()
        .wages()
        .fetch()
        .await
        .map_err(wage_problem)?;
    Ok(Json(rates))
}

pub async fn replace_rates(
    State(state): State<AppState>,
    Json(rates): Json<WageRates>,
) -> Result<Json<WageRates>, ProblemResponse> {
    let stored = state
        .storage()
        .wages()
        .replace(&rates, state.now())
        .await
        .map_err(wage_problem)?;
    info!(stage = "wages", "wage rates updated");
    Ok(Json(stored))
}

pub async fn reset_rates(State(state): State<AppState>) -> Result<Json<WageRates>, ProblemResponse> {
    let rates = state
        .storage()
        .wages()
        .reset(state.now())
        .await
        .map_err(wage_problem)?;
    info!(stage = "wages", "wage rates reset to defaults");
    Ok(Json(rates))
}

/// Records work for a labour member with wages priced from the current rates.
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(request): Json<NewAssignmentRequest>,
) -> Result<(StatusCode, Json<WorkAssignment>), ProblemResponse> {
    let rates = state
        .storage()
        .wages()
        .fetch()
        .await
        .map_err(wage_problem)?;
    let draft = AssignmentDraft::build(request, &rates)
        .map_err(|err| ProblemResponse::bad_request("invalid_assignment", err.to_string()))?;

    let assigned_at = state.now();
    let local_date = state.sequencer().local_day(assigned_at);
    let assignment = state
        .storage()
        .assignments()
        .insert(&NewAssignment {
            draft: &draft,
            local_date: &local_date,
            assigned_at,
        })
        .await
        .map_err(|err| assignment_problem(err, "failed to store work assignment"))?;

    counter!("work_assignments_created_total", "work_type" => assignment.work_type.as_str())
        .increment(1);
    info!(
        stage = "assignments",
        labour_id = %assignment.labour_id,
        order_id = %assignment.order_id,
        total_wages = assignment.total_wages,
        "work assignment recorded"
    );
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn list_for_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<WorkAssignment>>, ProblemResponse> {
    let assignments = state
        .storage()
        .assignments()
        .list_for_order(&order_id)
        .await
        .map_err(|err| assignment_problem(err, "failed to list work assignments"))?;
    Ok(Json(assignments))
}

/// Every assignment of one labour member, newest first.
pub async fn list_for_labour(
    State(state): State<AppState>,
    Path(labour_id): Path<String>,
) -> Result<Json<Vec<WorkAssignment>>, ProblemResponse> {
    let assignments = state
        .storage()
        .assignments()
        .list_for_labour(&labour_id, None)
        .await
        .map_err(|err| assignment_problem(err, "failed to list work assignments"))?;
    Ok(Json(assignments))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRange {
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

/// Totals for a labour member. The range applies only when both bounds are given.
pub async fn labour_summary(
    State(state): State<AppState>,
    Path(labour_id): Path<String>,
    Query(range): Query<SummaryRange>,
) -> Result<Json<LabourSummary>, ProblemResponse> {
    let bounds = match (range.start_date.as_deref(), range.end_date.as_deref()) {
        (Some(start), Some(end)) => {
            let timezone = state.sequencer().timezone();
            let start = parse_bound(start, timezone, Bound::Start)
                .ok_or_else(|| invalid_date("startDate", start))?;
            let end = parse_bound(end, timezone, Bound::End)
                .ok_or_else(|| invalid_date("endDate", end))?;
            Some((start, end))
        }
        _ => None,
    };

    let assignments = state
        .storage()
        .assignments()
        .list_for_labour(&labour_id, bounds)
        .await
        .map_err(|err| assignment_problem(err, "failed to load labour assignments"))?;
    Ok(Json(LabourSummary::from_assignments(assignments)))
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Accepts an RFC 3339 instant or a shop-local `YYYY-MM-DD` date. A date end
/// bound covers the whole day.
fn parse_bound(raw: &str, timezone: Tz, bound: Bound) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let local = match bound {
        Bound::Start => date.and_time(NaiveTime::MIN),
        Bound::End => date.succ_opt()?.and_time(NaiveTime::MIN) - Duration::milliseconds(1),
    };
    timezone
        .from_local_datetime(&local)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

fn invalid_date(field: &str, raw: &str) -> ProblemResponse {
    ProblemResponse::bad_request(
        "invalid_date",
        format!("{field} must be YYYY-MM-DD or RFC 3339, got {raw}"),
    )
}

#[derive(Debug, Deserialize)]
pub struct AssignmentStatusUpdate {
    #[serde(default)]
    status: Option<String>,
}

pub async fn update_assignment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<AssignmentStatusUpdate>,
) -> Result<Json<WorkAssignment>, ProblemResponse> {
    let raw = update
        .status
        .ok_or_else(|| ProblemResponse::bad_request("invalid_status", "status is required"))?;
    let status = AssignmentStatus::parse(&raw).ok_or_else(|| {
        ProblemResponse::bad_request("invalid_status", format!("unknown assignment status {raw}"))
    })?;

    state
        .storage()
        .assignments()
        .update_status(&id, status, state.now())
        .await
        .map_err(|err| assignment_problem(err, "failed to update work assignment"))?
        .map(Json)
        .ok_or_else(|| {
            ProblemResponse::not_found("assignment_not_found", "work assignment not found")
        })
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    message: &'static str,
}

pub async fn remove_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ProblemResponse> {
    let deleted = state
        .storage()
        .assignments()
        .delete(&id)
        .await
        .map_err(|err| assignment_problem(err, "failed to delete work assignment"))?;
    if !deleted {
        return Err(ProblemResponse::not_found(
            "assignment_not_found",
            "work assignment not found",
        ));
    }
    Ok(Json(Deleted {
        message: "work assignment deleted",
    }))
}

fn wage_problem(err: WageError) -> ProblemResponse {
    match err {
        WageError::Invalid(detail) => ProblemResponse::bad_request("invalid_wages", detail),
        WageError::Database(err) => {
            error!(stage = "wages", error = %err, "wage storage failed");
            ProblemResponse::internal("wage_store_failed")
        }
    }
}

fn assignment_problem(err: AssignmentError, message: &'static str) -> ProblemResponse {
    error!(stage = "assignments", error = %err, "{message}");
    ProblemResponse::internal("assignment_store_failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use serde_json::json;

    use crate::router::app_router;
    use crate::test_support::{get, json_request, send, setup_state};

    async fn setup_app() -> (Router, tempfile::TempDir) {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let (state, dir) = setup_state(now).await;
        (app_router(state), dir)
    }

    #[tokio::test]
    async fn rates_default_update_and_reset() {
        let (app, _dir) = setup_app().await;

        let (status, rates) = send(&app, get("/wages")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rates["pant"], 110.0);
        assert_eq!(rates["ironing_pant"], 12.0);

        let updated = json!({
            "pant": 120.0,
            "shirt": 105.0,
            "ironing_pant": 15.0,
            "ironing_shirt": 11.0,
            "embroidery": 30.0,
        });
        let (status, _) = send(&app, json_request("PUT", "/wages", updated)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, rates) = send(&app, get("/wages")).await;
        assert_eq!(rates["pant"], 120.0);

        let (status, rates) = send(&app, json_request("POST", "/wages/reset", json!(null))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rates["pant"], 110.0);
    }

    #[tokio::test]
    async fn negative_rates_are_rejected() {
        let (app, _dir) = setup_app().await;
        let invalid = json!({
            "pant": -1.0,
            "shirt": 100.0,
            "ironing_pant": 12.0,
            "ironing_shirt": 10.0,
            "embroidery": 25.0,
        });

        let (status, problem) = send(&app, json_request("PUT", "/wages", invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], "invalid_wages");
    }

    #[tokio::test]
    async fn assignment_wages_are_fixed_at_creation() {
        let (app, _dir) = setup_app().await;
        let body = json!({
            "labourId": "labour-1",
            "orderId": "ORD001",
            "workType": "Pant",
            "quantity": 2,
            "orderCustomerName": "Ravi",
        });
        let (status, created) = send(&app, json_request("POST", "/work-assignments", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["totalWages"], 220.0);
        assert_eq!(created["status"], "Assigned");
        assert_eq!(created["orderDate"], "2025-03-14");

        let raised = json!({
            "pant": 200.0,
            "shirt": 100.0,
            "ironing_pant": 12.0,
            "ironing_shirt": 10.0,
            "embroidery": 25.0,
        });
        send(&app, json_request("PUT", "/wages", raised)).await;

        let (_, listed) = send(&app, get("/work-assignments/order/ORD001")).await;
        assert_eq!(listed[0]["totalWages"], 220.0);
    }

    #[tokio::test]
    async fn invalid_work_type_is_rejected() {
        let (app, _dir) = setup_app().await;
        let body = json!({
            "labourId": "labour-1",
            "orderId": "ORD001",
            "workType": "Hemming",
            "quantity": 1,
        });
        let (status, problem) = send(&app, json_request("POST", "/work-assignments", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], "invalid_assignment");
    }

    #[tokio::test]
    async fn summary_totals_and_status_flow() {
        let (app, _dir) = setup_app().await;
        let mut ids = Vec::new();
        for (work_type, quantity, custom) in [("Shirt", 2, json!(null)), ("Embroidery", 4, json!(30))] {
            let body = json!({
                "labourId": "labour-7",
                "orderId": "ORD002",
                "workType": work_type,
                "quantity": quantity,
                "customWage": custom,
            });
            let (_, created) = send(&app, json_request("POST", "/work-assignments", body)).await;
            ids.push(created["id"].as_str().unwrap().to_string());
        }

        let (status, done) = send(
            &app,
            json_request(
                "PATCH",
                &format!("/work-assignments/{}/status", ids[0]),
                json!({"status": "Completed"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(done["completedAt"].is_string());

        let (status, summary) = send(&app, get("/work-assignments/summary/labour/labour-7")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["totalAssignments"], 2);
        assert_eq!(summary["completedAssignments"], 1);
        assert_eq!(summary["totalWages"], 320.0);
        assert_eq!(summary["totalQuantity"], 6);

        let (status, listed) = send(&app, get("/work-assignments/labour/labour-7")).await;
        assert_eq!(status, StatusCode::OK);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|a| a["labourId"] == "labour-7"));
        let (_, other) = send(&app, get("/work-assignments/labour/labour-8")).await;
        assert_eq!(other, json!([]));

        let (_, outside) = send(
            &app,
            get("/work-assignments/summary/labour/labour-7?startDate=2025-04-01&endDate=2025-04-30"),
        )
        .await;
        assert_eq!(outside["totalAssignments"], 0);

        let (_, same_day) = send(
            &app,
            get("/work-assignments/summary/labour/labour-7?startDate=2025-03-14&endDate=2025-03-14"),
        )
        .await;
        assert_eq!(same_day["totalAssignments"], 2);

        let (status, _) = send(
            &app,
            json_request("DELETE", &format!("/work-assignments/{}", ids[1]), json!(null)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            json_request("DELETE", &format!("/work-assignments/{}", ids[1]), json!(null)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_summary_dates_are_rejected() {
        let (app, _dir) = setup_app().await;
        let (status, problem) = send(
            &app,
            get("/work-assignments/summary/labour/labour-1?startDate=yesterday&endDate=2025-03-01"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], "invalid_date");
    }

    #[test]
    fn date_end_bound_covers_whole_local_day() {
        let end = parse_bound("2025-03-14", chrono_tz::Asia::Kolkata, Bound::End).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 14, 18, 29, 59).unwrap() + Duration::milliseconds(999));
        let start = parse_bound("2025-03-14", Tz::UTC, Bound::Start).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap());
    }
}
