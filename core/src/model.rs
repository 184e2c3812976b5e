use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// How often a plan item expects a patient check-in.
///
/// The extraction model emits free-form strings; anything it produces that we
/// don't recognize is kept as `Unknown` rather than rejected, and the
/// adherence engine treats `Unknown` as daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Daily,
    Weekly,
    AsNeeded,
    Unknown,
}

impl Frequency {
    /// Map the model's free-form frequency string onto the enum. Both the
    /// "as needed" and "as-needed" spellings occur in real output.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "as needed" | "as-needed" | "asneeded" => Self::AsNeeded,
            _ => Self::Unknown,
        }
    }
}

/// A registered care recipient. Patients own the notes filed for them and are
/// the addressees of adherence reminders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Patient {
    /// Unique patient ID (UUIDv7, time-sortable)
    pub id: Uuid,
    /// Display name used in reminder messages
    pub name: String,
    /// When the patient was registered
    pub created_at: DateTime<Utc>,
}

/// One clinician-authored encounter record. The note text is stored
/// encrypted; the derived checklist and plan items hang off `id`.
///
/// Notes are never hard-deleted: the owning patient can soft-delete them,
/// which hides the note from listings but does NOT cascade to its items.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Note {
    pub id: Uuid,
    /// Doctor who authored the note
    pub doctor_id: Uuid,
    /// Patient the note belongs to
    pub patient_id: Uuid,
    /// Ciphertext of the note body (`<nonce-hex>:<ciphertext-hex>`)
    pub encrypted_note: String,
    /// Soft-delete flag, settable only by the owning patient
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A one-time task extracted from a note.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChecklistItem {
    pub id: Uuid,
    /// Parent note
    pub note_id: Uuid,
    /// What the patient has to do
    pub task: String,
    /// When it is due
    pub due_date: NaiveDate,
    /// Transitions false -> true exactly once; re-completion is a no-op
    pub completed: bool,
    /// Soft-delete flag, orthogonal to `completed`
    pub deleted: bool,
}

/// A recurring action extracted from a note, tracked via check-ins.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanItem {
    pub id: Uuid,
    /// Parent note
    pub note_id: Uuid,
    /// What the patient has to keep doing
    pub action: String,
    pub frequency: Frequency,
    /// Required number of check-ins, before adaptive extension
    pub duration_days: i64,
    pub start_date: NaiveDate,
    /// Append-only record of patient confirmations. Repeated check-ins on
    /// the same day append repeated timestamps; the count is the unit of
    /// adherence, not distinct dates.
    pub check_ins: Vec<DateTime<Utc>>,
    /// Terminal flag, set only by the adherence engine or by supersession
    pub completed: bool,
    /// Soft-delete flag; removes the item from sweeps and listings but does
    /// not alter `completed`
    pub deleted: bool,
}

/// A note together with its derived items, as returned by the store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NoteWithItems {
    #[serde(flatten)]
    pub note: Note,
    pub checklist: Vec<ChecklistItem>,
    pub plan: Vec<PlanItem>,
}

/// One checklist entry of the extraction contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistStep {
    pub task: String,
    pub due_date: NaiveDate,
}

/// One plan entry of the extraction contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub action: String,
    pub frequency: Frequency,
    /// Days of check-ins required; always positive (defaulted to 7)
    pub duration: i64,
    pub start_date: NaiveDate,
}

/// The normalized output of note extraction. This shape is the contract
/// boundary with the extraction model's raw output (camelCase on the wire)
/// and must stay stable for round-trip tests.
///
/// Both sequences may legitimately be empty; a note with no actionable
/// content is a low-confidence signal, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActionableSteps {
    pub checklist: Vec<ChecklistStep>,
    pub plan: Vec<PlanStep>,
}
