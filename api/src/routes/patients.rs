use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use aftercare_core::error::ApiError;
use aftercare_core::model::Patient;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/patients", get(list_patients).post(register_patient))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterPatientRequest {
    /// Display name used in reminder messages
    pub name: String,
}

fn validate_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation {
            message: "name must not be empty".to_string(),
            field: Some("name".to_string()),
            received: Some(serde_json::Value::String(raw.to_string())),
            docs_hint: None,
        });
    }
    if name.len() > 200 {
        return Err(AppError::Validation {
            message: "name must be <= 200 characters".to_string(),
            field: Some("name".to_string()),
            received: Some(serde_json::Value::String(raw.to_string())),
            docs_hint: None,
        });
    }
    Ok(name.to_string())
}

/// Register a patient so notes can be filed for them.
#[utoipa::path(
    post,
    path = "/v1/patients",
    request_body = RegisterPatientRequest,
    responses(
        (status = 201, description = "Patient registered", body = Patient),
        (status = 400, description = "Validation failed", body = ApiError)
    ),
    tag = "patients"
)]
pub async fn register_patient(
    State(state): State<AppState>,
    Json(req): Json<RegisterPatientRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = validate_name(&req.name)?;

    let patient = Patient {
        id: Uuid::now_v7(),
        name,
        created_at: Utc::now(),
    };
    state.store.upsert_patient(patient.clone()).await?;

    Ok((StatusCode::CREATED, Json(patient)))
}

/// List registered patients.
#[utoipa::path(
    get,
    path = "/v1/patients",
    responses(
        (status = 200, description = "Registered patients", body = Vec<Patient>)
    ),
    tag = "patients"
)]
pub async fn list_patients(
    State(state): State<AppState>,
) -> Result<Json<Vec<Patient>>, AppError> {
    Ok(Json(state.store.list_patients().await?))
}
