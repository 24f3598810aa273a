use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, info};

use tailor_core::labour::{Labour, LabourCategory, LabourChanges, LabourDraft, NewLabourRequest};
use tailor_storage::LabourError;

use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct LabourCreated {
    message: &'static str,
    id: String,
    labour: Labour,
}

#[derive(Debug, Serialize)]
pub struct LabourUpdated {
    message: &'static str,
    labour: Labour,
}

#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    message: &'static str,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Labour>>, ProblemResponse> {
    list_filtered(&state, None).await
}

/// An unknown category lists nobody rather than failing.
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Labour>>, ProblemResponse> {
    match LabourCategory::parse(&category) {
        Some(category) => list_filtered(&state, Some(category)).await,
        None => Ok(Json(Vec::new())),
    }
}

async fn list_filtered(
    state: &AppState,
    category: Option<LabourCategory>,
) -> Result<Json<Vec<Labour>>, ProblemResponse> {
    let labour = state
        .storage()
        .labour()
        .list(category)
        .await
        .map_err(|err| labour_problem(err, "failed to list labour"))?;
    Ok(Json(labour))
}

pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Labour>, ProblemResponse> {
    state
        .storage()
        .labour()
        .find(&id)
        .await
        .map_err(|err| labour_problem(err, "failed to load labour"))?
        .map(Json)
        .ok_or_else(not_found)
}

/// Adds someone to the roster. The join date defaults to today in the shop's
/// timezone.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<NewLabourRequest>,
) -> Result<(StatusCode, Json<LabourCreated>), ProblemResponse> {
    let now = state.now();
    let today = state.sequencer().local_day(now);
    let draft = LabourDraft::from_request(request, &today)
        .map_err(|err| ProblemResponse::bad_request("invalid_labour", err.to_string()))?;

    let labour = state
        .storage()
        .labour()
        .insert(&draft, now)
        .await
        .map_err(|err| labour_problem(err, "failed to store labour"))?;
    info!(
        stage = "labour",
        labour_id = %labour.id,
        category = labour.category.as_str(),
        "labour added"
    );

    Ok((
        StatusCode::CREATED,
        Json(LabourCreated {
            message: "labour created",
            id: labour.id.clone(),
            labour,
        }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<LabourChanges>,
) -> Result<Json<LabourUpdated>, ProblemResponse> {
    let repo = state.storage().labour();
    let existing = repo
        .find(&id)
        .await
        .map_err(|err| labour_problem(err, "failed to load labour"))?
        .ok_or_else(not_found)?;
    let draft = existing
        .draft()
        .apply(changes)
        .map_err(|err| ProblemResponse::bad_request("invalid_labour", err.to_string()))?;

    let labour = repo
        .update(&id, &draft, state.now())
        .await
        .map_err(|err| labour_problem(err, "failed to update labour"))?
        .ok_or_else(not_found)?;

    Ok(Json(LabourUpdated {
        message: "labour updated",
        labour,
    }))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Acknowledgement>, ProblemResponse> {
    let deleted = state
        .storage()
        .labour()
        .delete(&id)
        .await
        .map_err(|err| labour_problem(err, "failed to delete labour"))?;
    if !deleted {
        return Err(not_found());
    }

    Ok(Json(Acknowledgement {
        message: "labour deleted",
    }))
}

fn not_found() -> ProblemResponse {
    ProblemResponse::not_found("labour_not_found", "labour not found")
}

fn labour_problem(err: LabourError, message: &'static str) -> ProblemResponse {
    error!(stage = "labour", error = %err, "{message}");
    ProblemResponse::internal("labour_store_failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use crate::router::app_router;
    use crate::test_support::{get, json_request, send, setup_state};

    async fn setup_app() -> (Router, tempfile::TempDir) {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let (state, dir) = setup_state(now).await;
        (app_router(state), dir)
    }

    fn labour_body(name: &str, category: &str) -> Value {
        json!({
            "name": name,
            "category": category,
            "specialist": "Kurta",
            "phone": "9000000001",
            "age": "32",
        })
    }

    #[tokio::test]
    async fn create_applies_defaults_and_lists_by_category() {
        let (app, _dir) = setup_app().await;

        let (status, created) =
            send(&app, json_request("POST", "/labour", labour_body("Kiran", "Tailor"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["message"], "labour created");
        assert_eq!(created["id"], created["labour"]["id"]);
        assert_eq!(created["labour"]["age"], 32);
        assert_eq!(created["labour"]["photo"], Value::Null);
        assert_eq!(created["labour"]["joinDate"], "2025-03-14");
        assert_eq!(created["labour"]["status"], "Active");

        send(&app, json_request("POST", "/labour", labour_body("Suresh", "Iron Master"))).await;

        let (_, all) = send(&app, get("/labour")).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (status, ironing) = send(&app, get("/labour/category/Iron%20Master")).await;
        assert_eq!(status, StatusCode::OK);
        let ironing = ironing.as_array().unwrap();
        assert_eq!(ironing.len(), 1);
        assert_eq!(ironing[0]["name"], "Suresh");

        let (status, unknown) = send(&app, get("/labour/category/Cutter")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unknown, json!([]));
    }

    #[tokio::test]
    async fn create_rejects_missing_fields_and_bad_category() {
        let (app, _dir) = setup_app().await;

        let mut body = labour_body("Kiran", "Tailor");
        body["specialist"] = Value::Null;
        let (status, problem) = send(&app, json_request("POST", "/labour", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], "invalid_labour");

        let (status, problem) =
            send(&app, json_request("POST", "/labour", labour_body("Kiran", "Cutter"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["type"], "invalid_labour");
    }

    #[tokio::test]
    async fn partial_update_keeps_absent_fields() {
        let (app, _dir) = setup_app().await;
        let (_, created) =
            send(&app, json_request("POST", "/labour", labour_body("Kiran", "Tailor"))).await;
        let uri = format!("/labour/{}", created["id"].as_str().unwrap());

        let (status, updated) =
            send(&app, json_request("PUT", &uri, json!({"phone": "9000000002"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["message"], "labour updated");
        assert_eq!(updated["labour"]["phone"], "9000000002");
        assert_eq!(updated["labour"]["age"], 32);

        let (_, updated) = send(
            &app,
            json_request("PUT", &uri, json!({"age": null, "category": "Embroider"})),
        )
        .await;
        assert_eq!(updated["labour"]["age"], Value::Null);
        assert_eq!(updated["labour"]["category"], "Embroider");

        let (status, fetched) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Kiran");
        assert_eq!(fetched["phone"], "9000000002");
    }

    #[tokio::test]
    async fn missing_labour_is_reported() {
        let (app, _dir) = setup_app().await;

        let (status, problem) = send(&app, get("/labour/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(problem["type"], "labour_not_found");

        let (status, _) =
            send(&app, json_request("PUT", "/labour/missing", json!({"name": "X"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, created) =
            send(&app, json_request("POST", "/labour", labour_body("Kiran", "Tailor"))).await;
        let uri = format!("/labour/{}", created["id"].as_str().unwrap());
        let (status, _) = send(&app, json_request("DELETE", &uri, json!(null))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, json_request("DELETE", &uri, json!(null))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
