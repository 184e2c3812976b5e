use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aftercare_core::cipher::CipherService;
use aftercare_core::error::ApiError;
use aftercare_core::extract;
use aftercare_core::model::{ChecklistItem, NoteWithItems, PlanItem};

use crate::error::AppError;
use crate::identity;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/patients/{patient_id}/notes",
        get(list_patient_notes).post(file_note),
    )
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct FileNoteRequest {
    /// Free-text clinical note
    pub note: String,
}

/// A note as clients see it: text decrypted, items attached.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NoteView {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    /// Decrypted note text
    pub note: String,
    pub deleted: bool,
    pub checklist: Vec<ChecklistItem>,
    pub plan: Vec<PlanItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn note_view(
    cipher: &dyn CipherService,
    note: NoteWithItems,
) -> Result<NoteView, AppError> {
    let text = cipher.decrypt(&note.note.encrypted_note)?;
    Ok(NoteView {
        id: note.note.id,
        doctor_id: note.note.doctor_id,
        patient_id: note.note.patient_id,
        note: text,
        deleted: note.note.deleted,
        checklist: note.checklist,
        plan: note.plan,
        created_at: note.note.created_at,
        updated_at: note.note.updated_at,
    })
}

fn validate_note(raw: &str) -> Result<(), AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::Validation {
            message: "note must not be empty".to_string(),
            field: Some("note".to_string()),
            received: None,
            docs_hint: Some("Provide the clinical note text to convert.".to_string()),
        });
    }
    if raw.len() > 20_000 {
        return Err(AppError::Validation {
            message: "note must be <= 20000 characters".to_string(),
            field: Some("note".to_string()),
            received: Some(serde_json::json!(raw.len())),
            docs_hint: None,
        });
    }
    Ok(())
}

/// File a clinical note for a patient.
///
/// Runs the note through the extraction model, normalizes the result into
/// checklist tasks and plan actions, retires the patient's previously
/// active items, and stores the new note with its items. The note text is
/// encrypted at rest.
#[utoipa::path(
    post,
    path = "/v1/patients/{patient_id}/notes",
    request_body = FileNoteRequest,
    params(
        ("patient_id" = Uuid, Path, description = "Patient the note is for"),
        ("x-doctor-id" = Uuid, Header, description = "Authoring doctor")
    ),
    responses(
        (status = 201, description = "Note filed, care plan replaced", body = NoteView),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Patient not found", body = ApiError),
        (status = 422, description = "Extraction output unusable", body = ApiError),
        (status = 502, description = "Extraction model unavailable", body = ApiError)
    ),
    tag = "notes"
)]
pub async fn file_note(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<FileNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let doctor_id = identity::doctor_id(&headers)?;
    validate_note(&req.note)?;

    let today = Utc::now().date_naive();
    let steps = extract::process_note(state.gateway.as_ref(), &req.note, today).await?;

    let created = state
        .supersession
        .supersede_and_create(patient_id, doctor_id, &req.note, steps)
        .await?;

    let view = note_view(state.cipher.as_ref(), created)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// List a doctor's notes for one patient, newest first, decrypted.
#[utoipa::path(
    get,
    path = "/v1/patients/{patient_id}/notes",
    params(
        ("patient_id" = Uuid, Path, description = "Patient the notes are for"),
        ("x-doctor-id" = Uuid, Header, description = "Authoring doctor")
    ),
    responses(
        (status = 200, description = "Notes with items", body = Vec<NoteView>),
        (status = 400, description = "Validation failed", body = ApiError)
    ),
    tag = "notes"
)]
pub async fn list_patient_notes(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<NoteView>>, AppError> {
    let doctor_id = identity::doctor_id(&headers)?;

    let notes = state.store.notes_for_doctor(doctor_id, patient_id).await?;
    let views = notes
        .into_iter()
        .map(|note| note_view(state.cipher.as_ref(), note))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(views))
}
