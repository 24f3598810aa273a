use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics_exporter_prometheus::PrometheusHandle;
use tailor_storage::Database;

use crate::sequencer::OrderSequencer;
use crate::{labour, orders, telemetry, wages};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    timezone: Tz,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    sequencer: OrderSequencer,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database, timezone: Tz) -> Self {
        let clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync> = Arc::new(Utc::now);
        let sequencer = OrderSequencer::new(storage.clone(), timezone, clock.clone());
        Self {
            metrics,
            storage,
            timezone,
            clock,
            sequencer,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock.clone();
        self.sequencer = OrderSequencer::new(self.storage.clone(), self.timezone, clock);
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn sequencer(&self) -> &OrderSequencer {
        &self.sequencer
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/orders", get(orders::list).post(orders::create))
        .route("/orders/civil", get(orders::list_civil))
        .route("/orders/generate/next-id", get(orders::next_id))
        .route(
            "/orders/:id",
            get(orders::fetch).put(orders::replace).delete(orders::remove),
        )
        .route("/orders/:id/status", patch(orders::update_status))
        .route("/labour", get(labour::list).post(labour::create))
        .route("/labour/category/:category", get(labour::list_by_category))
        .route(
            "/labour/:id",
            get(labour::fetch).put(labour::update).delete(labour::remove),
        )
        .route("/wages", get(wages::fetch_rates).put(wages::replace_rates))
        .route("/wages/reset", post(wages::reset_rates))
        .route("/work-assignments", post(wages::create_assignment))
        .route(
            "/work-assignments/order/:order_id",
            get(wages::list_for_order),
        )
        .route(
            "/work-assignments/labour/:labour_id",
            get(wages::list_for_labour),
        )
        .route(
            "/work-assignments/summary/labour/:labour_id",
            get(wages::labour_summary),
        )
        .route(
            "/work-assignments/:id/status",
            patch(wages::update_assignment_status),
        )
        .route("/work-assignments/:id", delete(wages::remove_assignment))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::test_support::setup_state;

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (state, _dir) = setup_state(Utc::now()).await;
        let app = app_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let (state, _dir) = setup_state(Utc::now()).await;
        let app = app_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn injected_clock_drives_state_and_sequencer() {
        let fixed = Utc.with_ymd_and_hms(2025, 11, 30, 23, 59, 0).unwrap();
        let (state, _dir) = setup_state(fixed).await;

        assert_eq!(state.now(), fixed);
        assert_eq!(state.sequencer().current_period().to_string(), "2025-11");
    }
}
