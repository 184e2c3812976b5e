use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::cipher::CipherService;
use crate::error::CoreError;
use crate::model::{ActionableSteps, ChecklistItem, Note, NoteWithItems, PlanItem};
use crate::store::RecordStore;

/// Files a new note for a patient, atomically retiring everything the
/// patient was previously bound by. A patient is never simultaneously on
/// two sets of instructions: the moment a new note lands, every still-open
/// item from earlier notes is force-completed.
pub struct SupersessionManager {
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn CipherService>,
}

impl SupersessionManager {
    pub fn new(store: Arc<dyn RecordStore>, cipher: Arc<dyn CipherService>) -> Self {
        Self { store, cipher }
    }

    /// Encrypt the note text, retire the patient's active items, and create
    /// the new note with its derived items attached.
    ///
    /// If the create fails after the retire succeeded, the retired items
    /// stay retired and the error propagates; the caller sees the failure
    /// and no new note exists. There is no compensating un-retire.
    pub async fn supersede_and_create(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        plaintext_note: &str,
        steps: ActionableSteps,
    ) -> Result<NoteWithItems, CoreError> {
        self.store
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("patient {patient_id}")))?;

        let encrypted_note = self.cipher.encrypt(plaintext_note)?;

        let retired = self.store.retire_active_items(patient_id).await?;
        if retired > 0 {
            tracing::info!(
                patient_id = %patient_id,
                retired,
                "superseded previously active care-plan items"
            );
        }

        let now = Utc::now();
        let note = Note {
            id: Uuid::now_v7(),
            doctor_id,
            patient_id,
            encrypted_note,
            deleted: false,
            created_at: now,
            updated_at: now,
        };

        let checklist: Vec<ChecklistItem> = steps
            .checklist
            .into_iter()
            .map(|step| ChecklistItem {
                id: Uuid::now_v7(),
                note_id: note.id,
                task: step.task,
                due_date: step.due_date,
                completed: false,
                deleted: false,
            })
            .collect();

        let plan: Vec<PlanItem> = steps
            .plan
            .into_iter()
            .map(|step| PlanItem {
                id: Uuid::now_v7(),
                note_id: note.id,
                action: step.action,
                frequency: step.frequency,
                duration_days: step.duration,
                start_date: step.start_date,
                check_ins: Vec::new(),
                completed: false,
                deleted: false,
            })
            .collect();

        self.store.insert_note(note, checklist, plan).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::cipher::AesGcmCipher;
    use crate::model::{ChecklistStep, Frequency, Patient, PlanStep};
    use crate::store::MemoryStore;

    const TEST_KEY: &str = "f3bdfaf6bdcd810396812312a4d09d8f2feea24e3fe27111aea0d8dd54a8ff6c";

    fn steps() -> ActionableSteps {
        let day = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        ActionableSteps {
            checklist: vec![ChecklistStep {
                task: "Take painkillers".to_string(),
                due_date: day,
            }],
            plan: vec![PlanStep {
                action: "Rest".to_string(),
                frequency: Frequency::Daily,
                duration: 7,
                start_date: day,
            }],
        }
    }

    async fn manager_with_patient() -> (SupersessionManager, Arc<MemoryStore>, Patient) {
        let store = Arc::new(MemoryStore::new());
        let cipher = Arc::new(AesGcmCipher::from_hex_key(TEST_KEY).unwrap());
        let patient = Patient {
            id: Uuid::now_v7(),
            name: "Ada".to_string(),
            created_at: Utc::now(),
        };
        store.upsert_patient(patient.clone()).await.unwrap();
        (
            SupersessionManager::new(store.clone(), cipher),
            store,
            patient,
        )
    }

    #[tokio::test]
    async fn filing_a_note_retires_all_previously_active_items() {
        let (manager, store, patient) = manager_with_patient().await;
        let doctor_id = Uuid::now_v7();

        let first = manager
            .supersede_and_create(patient.id, doctor_id, "First visit.", steps())
            .await
            .unwrap();
        let second = manager
            .supersede_and_create(patient.id, doctor_id, "Follow-up visit.", steps())
            .await
            .unwrap();

        let notes = store.notes_for_patient(patient.id).await.unwrap();
        assert_eq!(notes.len(), 2);

        for note in &notes {
            let expect_active = note.note.id == second.note.id;
            for item in &note.checklist {
                assert_eq!(!item.completed, expect_active);
            }
            for item in &note.plan {
                assert_eq!(!item.completed, expect_active);
            }
        }

        // Only the new note's plan items remain in the sweep set.
        let active = store.active_plan_items().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].item.id, second.plan[0].id);
        assert_ne!(active[0].item.id, first.plan[0].id);
    }

    #[tokio::test]
    async fn new_plan_items_start_with_no_check_ins() {
        let (manager, _store, patient) = manager_with_patient().await;

        let created = manager
            .supersede_and_create(patient.id, Uuid::now_v7(), "First visit.", steps())
            .await
            .unwrap();

        assert!(created.plan[0].check_ins.is_empty());
        assert!(!created.plan[0].completed);
        assert!(!created.checklist[0].completed);
    }

    #[tokio::test]
    async fn note_text_is_stored_encrypted_and_round_trips() {
        let (manager, store, patient) = manager_with_patient().await;
        let cipher = AesGcmCipher::from_hex_key(TEST_KEY).unwrap();

        let created = manager
            .supersede_and_create(patient.id, Uuid::now_v7(), "Patient reports mild headaches.", steps())
            .await
            .unwrap();

        assert_ne!(created.note.encrypted_note, "Patient reports mild headaches.");
        let stored = store.notes_for_patient(patient.id).await.unwrap();
        assert_eq!(
            cipher.decrypt(&stored[0].note.encrypted_note).unwrap(),
            "Patient reports mild headaches."
        );
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found_and_nothing_is_created() {
        let store = Arc::new(MemoryStore::new());
        let cipher = Arc::new(AesGcmCipher::from_hex_key(TEST_KEY).unwrap());
        let manager = SupersessionManager::new(store.clone(), cipher);

        let missing = Uuid::now_v7();
        let err = manager
            .supersede_and_create(missing, Uuid::now_v7(), "note", steps())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(store.notes_for_patient(missing).await.unwrap().is_empty());
    }

    struct BrokenCipher;

    impl CipherService for BrokenCipher {
        fn encrypt(&self, _plaintext: &str) -> Result<String, CoreError> {
            Err(CoreError::Cipher("no key material".to_string()))
        }
        fn decrypt(&self, _ciphertext: &str) -> Result<String, CoreError> {
            Err(CoreError::Cipher("no key material".to_string()))
        }
    }

    #[tokio::test]
    async fn cipher_failure_leaves_existing_items_untouched() {
        let (working, store, patient) = manager_with_patient().await;
        working
            .supersede_and_create(patient.id, Uuid::now_v7(), "First visit.", steps())
            .await
            .unwrap();

        let broken = SupersessionManager::new(store.clone(), Arc::new(BrokenCipher));
        let err = broken
            .supersede_and_create(patient.id, Uuid::now_v7(), "Follow-up.", steps())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cipher(_)));

        // Encryption happens before retirement, so the prior plan is
        // still fully active and no second note exists.
        let notes = store.notes_for_patient(patient.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].plan.iter().all(|item| !item.completed));
        assert!(notes[0].checklist.iter().all(|item| !item.completed));
    }
}
