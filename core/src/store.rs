//! The Record Store collaborator contract. The care-plan logic never talks
//! to storage directly; it goes through this trait, which keeps the store
//! swappable and the domain testable. Every method is atomic from the
//! caller's perspective; multi-row mutations either fully apply or not at
//! all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{ChecklistItem, Note, NoteWithItems, Patient, PlanItem};

mod memory;

pub use memory::MemoryStore;

/// A plan item eligible for an adherence pass, joined with the patient it
/// belongs to so reminders can address them by name.
#[derive(Debug, Clone)]
pub struct ActivePlanItem {
    pub item: PlanItem,
    pub patient_id: Uuid,
    pub patient_name: String,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_patient(&self, patient: Patient) -> Result<(), CoreError>;
    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, CoreError>;
    async fn list_patients(&self) -> Result<Vec<Patient>, CoreError>;

    /// Retire every not-yet-completed checklist and plan item under the
    /// patient's non-deleted notes, in one atomic operation. Returns how
    /// many items were retired.
    async fn retire_active_items(&self, patient_id: Uuid) -> Result<u64, CoreError>;

    /// Insert a note and all of its items in one atomic operation.
    async fn insert_note(
        &self,
        note: Note,
        checklist: Vec<ChecklistItem>,
        plan: Vec<PlanItem>,
    ) -> Result<NoteWithItems, CoreError>;

    /// Non-deleted notes of a patient, newest first, items attached.
    /// Soft-deleted items are filtered from the attachments.
    async fn notes_for_patient(&self, patient_id: Uuid) -> Result<Vec<NoteWithItems>, CoreError>;

    /// A doctor's notes for one patient, newest first, items attached.
    /// Includes the doctor's soft-deleted notes so their record stays whole.
    async fn notes_for_doctor(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Vec<NoteWithItems>, CoreError>;

    /// Every plan item with `deleted=false` and `completed=false`, across
    /// all patients. Note soft-deletion deliberately does not hide items
    /// from this listing. Start-date filtering is the sweep's job, since the
    /// store has no clock.
    async fn active_plan_items(&self) -> Result<Vec<ActivePlanItem>, CoreError>;

    /// Mark one plan item completed. Used by the adherence engine only.
    async fn complete_plan_item(&self, plan_item_id: Uuid) -> Result<(), CoreError>;

    /// Append a check-in timestamp. Fails with `NotFound` unless a
    /// non-deleted plan item with this id exists under a non-deleted note
    /// owned by the patient. Repeat calls append repeat timestamps.
    async fn record_check_in(
        &self,
        plan_item_id: Uuid,
        patient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<PlanItem, CoreError>;

    /// Mark a checklist item completed, under the same ownership rule as
    /// `record_check_in`. Completing an already-completed item is a
    /// successful no-op.
    async fn complete_task(
        &self,
        checklist_item_id: Uuid,
        patient_id: Uuid,
    ) -> Result<ChecklistItem, CoreError>;

    async fn delete_note(&self, note_id: Uuid, patient_id: Uuid) -> Result<(), CoreError>;

    async fn delete_plan_item(
        &self,
        plan_item_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), CoreError>;

    async fn delete_checklist_item(
        &self,
        checklist_item_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), CoreError>;
}
