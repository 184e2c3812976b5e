use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use uuid::Uuid;

use aftercare_core::error::ApiError;
use aftercare_core::model::{ChecklistItem, PlanItem};

use crate::error::AppError;
use crate::identity;
use crate::routes::notes::{NoteView, note_view};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/my/notes", get(list_my_notes))
        .route("/v1/my/notes/{note_id}", delete(delete_note))
        .route("/v1/my/plan-items/{plan_item_id}/check-ins", post(check_in))
        .route("/v1/my/plan-items/{plan_item_id}", delete(delete_plan_item))
        .route(
            "/v1/my/checklist-items/{checklist_item_id}/complete",
            post(complete_task),
        )
        .route(
            "/v1/my/checklist-items/{checklist_item_id}",
            delete(delete_checklist_item),
        )
}

/// List the calling patient's non-deleted notes, newest first, decrypted.
#[utoipa::path(
    get,
    path = "/v1/my/notes",
    params(
        ("x-patient-id" = Uuid, Header, description = "Calling patient")
    ),
    responses(
        (status = 200, description = "Notes with items", body = Vec<NoteView>),
        (status = 400, description = "Validation failed", body = ApiError)
    ),
    tag = "my"
)]
pub async fn list_my_notes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<NoteView>>, AppError> {
    let patient_id = identity::patient_id(&headers)?;

    let notes = state.store.notes_for_patient(patient_id).await?;
    let views = notes
        .into_iter()
        .map(|note| note_view(state.cipher.as_ref(), note))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(views))
}

/// Record a check-in on a plan item.
///
/// Appends the current timestamp to the item's check-in record. Repeated
/// calls append repeated timestamps; the count, not the set of distinct
/// dates, is what the adherence sweep measures.
#[utoipa::path(
    post,
    path = "/v1/my/plan-items/{plan_item_id}/check-ins",
    params(
        ("plan_item_id" = Uuid, Path, description = "Plan item to check in on"),
        ("x-patient-id" = Uuid, Header, description = "Calling patient")
    ),
    responses(
        (status = 200, description = "Check-in recorded", body = PlanItem),
        (status = 404, description = "No such plan item for this patient", body = ApiError)
    ),
    tag = "my"
)]
pub async fn check_in(
    State(state): State<AppState>,
    Path(plan_item_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<PlanItem>, AppError> {
    let patient_id = identity::patient_id(&headers)?;

    let item = state
        .store
        .record_check_in(plan_item_id, patient_id, Utc::now())
        .await?;

    Ok(Json(item))
}

/// Mark a checklist task as done. Completing an already-completed task is a
/// successful no-op.
#[utoipa::path(
    post,
    path = "/v1/my/checklist-items/{checklist_item_id}/complete",
    params(
        ("checklist_item_id" = Uuid, Path, description = "Checklist item to complete"),
        ("x-patient-id" = Uuid, Header, description = "Calling patient")
    ),
    responses(
        (status = 200, description = "Task completed", body = ChecklistItem),
        (status = 404, description = "No such checklist item for this patient", body = ApiError)
    ),
    tag = "my"
)]
pub async fn complete_task(
    State(state): State<AppState>,
    Path(checklist_item_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ChecklistItem>, AppError> {
    let patient_id = identity::patient_id(&headers)?;

    let item = state
        .store
        .complete_task(checklist_item_id, patient_id)
        .await?;

    Ok(Json(item))
}

/// Soft-delete one of the calling patient's notes. The note disappears from
/// listings; its items keep their own visibility.
#[utoipa::path(
    delete,
    path = "/v1/my/notes/{note_id}",
    params(
        ("note_id" = Uuid, Path, description = "Note to delete"),
        ("x-patient-id" = Uuid, Header, description = "Calling patient")
    ),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 404, description = "No such note for this patient", body = ApiError)
    ),
    tag = "my"
)]
pub async fn delete_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let patient_id = identity::patient_id(&headers)?;
    state.store.delete_note(note_id, patient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-delete a plan item. Removes it from sweeps and listings regardless
/// of whether it completed.
#[utoipa::path(
    delete,
    path = "/v1/my/plan-items/{plan_item_id}",
    params(
        ("plan_item_id" = Uuid, Path, description = "Plan item to delete"),
        ("x-patient-id" = Uuid, Header, description = "Calling patient")
    ),
    responses(
        (status = 204, description = "Plan item deleted"),
        (status = 404, description = "No such plan item for this patient", body = ApiError)
    ),
    tag = "my"
)]
pub async fn delete_plan_item(
    State(state): State<AppState>,
    Path(plan_item_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let patient_id = identity::patient_id(&headers)?;
    state.store.delete_plan_item(plan_item_id, patient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-delete a checklist item, completed or not.
#[utoipa::path(
    delete,
    path = "/v1/my/checklist-items/{checklist_item_id}",
    params(
        ("checklist_item_id" = Uuid, Path, description = "Checklist item to delete"),
        ("x-patient-id" = Uuid, Header, description = "Calling patient")
    ),
    responses(
        (status = 204, description = "Checklist item deleted"),
        (status = 404, description = "No such checklist item for this patient", body = ApiError)
    ),
    tag = "my"
)]
pub async fn delete_checklist_item(
    State(state): State<AppState>,
    Path(checklist_item_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let patient_id = identity::patient_id(&headers)?;
    state
        .store
        .delete_checklist_item(checklist_item_id, patient_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
