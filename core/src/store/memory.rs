use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{ChecklistItem, Note, NoteWithItems, Patient, PlanItem};
use crate::store::{ActivePlanItem, RecordStore};

/// In-memory record store. All mutations go through a single write lock, so
/// every trait method is atomic and a check-in arriving mid-sweep is
/// serialized against the sweep's completion writes rather than lost.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    patients: HashMap<Uuid, Patient>,
    notes: HashMap<Uuid, Note>,
    checklist: HashMap<Uuid, ChecklistItem>,
    plans: HashMap<Uuid, PlanItem>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    /// Items attached to a note, creation order (UUIDv7 ids are
    /// time-sortable). Soft-deleted items are filtered out of listings.
    fn items_of(&self, note_id: Uuid) -> (Vec<ChecklistItem>, Vec<PlanItem>) {
        let mut checklist: Vec<ChecklistItem> = self
            .checklist
            .values()
            .filter(|item| item.note_id == note_id && !item.deleted)
            .cloned()
            .collect();
        checklist.sort_by_key(|item| item.id);

        let mut plan: Vec<PlanItem> = self
            .plans
            .values()
            .filter(|item| item.note_id == note_id && !item.deleted)
            .cloned()
            .collect();
        plan.sort_by_key(|item| item.id);

        (checklist, plan)
    }

    fn with_items(&self, note: &Note) -> NoteWithItems {
        let (checklist, plan) = self.items_of(note.id);
        NoteWithItems {
            note: note.clone(),
            checklist,
            plan,
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_patient(&self, patient: Patient) -> Result<(), CoreError> {
        self.inner.write().await.patients.insert(patient.id, patient);
        Ok(())
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, CoreError> {
        Ok(self.inner.read().await.patients.get(&id).cloned())
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, CoreError> {
        let inner = self.inner.read().await;
        let mut patients: Vec<Patient> = inner.patients.values().cloned().collect();
        patients.sort_by_key(|p| p.id);
        Ok(patients)
    }

    async fn retire_active_items(&self, patient_id: Uuid) -> Result<u64, CoreError> {
        let mut inner = self.inner.write().await;

        let note_ids: Vec<Uuid> = inner
            .notes
            .values()
            .filter(|note| note.patient_id == patient_id && !note.deleted)
            .map(|note| note.id)
            .collect();

        let mut retired = 0u64;
        for item in inner.checklist.values_mut() {
            if note_ids.contains(&item.note_id) && !item.completed {
                item.completed = true;
                retired += 1;
            }
        }
        for item in inner.plans.values_mut() {
            if note_ids.contains(&item.note_id) && !item.completed {
                item.completed = true;
                retired += 1;
            }
        }

        Ok(retired)
    }

    async fn insert_note(
        &self,
        note: Note,
        checklist: Vec<ChecklistItem>,
        plan: Vec<PlanItem>,
    ) -> Result<NoteWithItems, CoreError> {
        let mut inner = self.inner.write().await;

        inner.notes.insert(note.id, note.clone());
        for item in checklist {
            inner.checklist.insert(item.id, item);
        }
        for item in plan {
            inner.plans.insert(item.id, item);
        }

        Ok(inner.with_items(&note))
    }

    async fn notes_for_patient(&self, patient_id: Uuid) -> Result<Vec<NoteWithItems>, CoreError> {
        let inner = self.inner.read().await;
        let mut notes: Vec<&Note> = inner
            .notes
            .values()
            .filter(|note| note.patient_id == patient_id && !note.deleted)
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes.into_iter().map(|note| inner.with_items(note)).collect())
    }

    async fn notes_for_doctor(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Vec<NoteWithItems>, CoreError> {
        let inner = self.inner.read().await;
        let mut notes: Vec<&Note> = inner
            .notes
            .values()
            .filter(|note| note.doctor_id == doctor_id && note.patient_id == patient_id)
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes.into_iter().map(|note| inner.with_items(note)).collect())
    }

    async fn active_plan_items(&self) -> Result<Vec<ActivePlanItem>, CoreError> {
        let inner = self.inner.read().await;

        let mut active: Vec<ActivePlanItem> = inner
            .plans
            .values()
            .filter(|item| !item.deleted && !item.completed)
            .filter_map(|item| {
                let note = inner.notes.get(&item.note_id)?;
                let patient_name = inner
                    .patients
                    .get(&note.patient_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("patient {}", note.patient_id));
                Some(ActivePlanItem {
                    item: item.clone(),
                    patient_id: note.patient_id,
                    patient_name,
                })
            })
            .collect();
        active.sort_by_key(|entry| entry.item.id);

        Ok(active)
    }

    async fn complete_plan_item(&self, plan_item_id: Uuid) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let item = inner
            .plans
            .get_mut(&plan_item_id)
            .ok_or_else(|| CoreError::not_found(format!("plan item {plan_item_id}")))?;
        item.completed = true;
        Ok(())
    }

    async fn record_check_in(
        &self,
        plan_item_id: Uuid,
        patient_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<PlanItem, CoreError> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .plans
            .get(&plan_item_id)
            .filter(|item| !item.deleted)
            .and_then(|item| inner.notes.get(&item.note_id))
            .is_some_and(|note| !note.deleted && note.patient_id == patient_id);
        if !owned {
            return Err(CoreError::not_found(format!("plan item {plan_item_id}")));
        }

        let item = inner
            .plans
            .get_mut(&plan_item_id)
            .expect("presence checked above");
        item.check_ins.push(at);
        Ok(item.clone())
    }

    async fn complete_task(
        &self,
        checklist_item_id: Uuid,
        patient_id: Uuid,
    ) -> Result<ChecklistItem, CoreError> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .checklist
            .get(&checklist_item_id)
            .filter(|item| !item.deleted)
            .and_then(|item| inner.notes.get(&item.note_id))
            .is_some_and(|note| !note.deleted && note.patient_id == patient_id);
        if !owned {
            return Err(CoreError::not_found(format!(
                "checklist item {checklist_item_id}"
            )));
        }

        let item = inner
            .checklist
            .get_mut(&checklist_item_id)
            .expect("presence checked above");
        item.completed = true;
        Ok(item.clone())
    }

    async fn delete_note(&self, note_id: Uuid, patient_id: Uuid) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let note = inner
            .notes
            .get_mut(&note_id)
            .filter(|note| note.patient_id == patient_id)
            .ok_or_else(|| CoreError::not_found(format!("note {note_id}")))?;
        note.deleted = true;
        note.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_plan_item(
        &self,
        plan_item_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .plans
            .get(&plan_item_id)
            .and_then(|item| inner.notes.get(&item.note_id))
            .is_some_and(|note| note.patient_id == patient_id);
        if !owned {
            return Err(CoreError::not_found(format!("plan item {plan_item_id}")));
        }

        inner
            .plans
            .get_mut(&plan_item_id)
            .expect("presence checked above")
            .deleted = true;
        Ok(())
    }

    async fn delete_checklist_item(
        &self,
        checklist_item_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .checklist
            .get(&checklist_item_id)
            .and_then(|item| inner.notes.get(&item.note_id))
            .is_some_and(|note| note.patient_id == patient_id);
        if !owned {
            return Err(CoreError::not_found(format!(
                "checklist item {checklist_item_id}"
            )));
        }

        inner
            .checklist
            .get_mut(&checklist_item_id)
            .expect("presence checked above")
            .deleted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::Frequency;

    fn patient(name: &str) -> Patient {
        Patient {
            id: Uuid::now_v7(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn note(patient_id: Uuid) -> Note {
        let now = Utc::now();
        Note {
            id: Uuid::now_v7(),
            doctor_id: Uuid::now_v7(),
            patient_id,
            encrypted_note: "aa:bb".to_string(),
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn plan_item(note_id: Uuid) -> PlanItem {
        PlanItem {
            id: Uuid::now_v7(),
            note_id,
            action: "Rest".to_string(),
            frequency: Frequency::Daily,
            duration_days: 7,
            start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            check_ins: vec![],
            completed: false,
            deleted: false,
        }
    }

    fn checklist_item(note_id: Uuid) -> ChecklistItem {
        ChecklistItem {
            id: Uuid::now_v7(),
            note_id,
            task: "Take painkillers".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            completed: false,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn retire_completes_every_active_item_under_non_deleted_notes() {
        let store = MemoryStore::new();
        let p = patient("Ada");
        store.upsert_patient(p.clone()).await.unwrap();

        let n = note(p.id);
        store
            .insert_note(
                n.clone(),
                vec![checklist_item(n.id), checklist_item(n.id)],
                vec![plan_item(n.id)],
            )
            .await
            .unwrap();

        let retired = store.retire_active_items(p.id).await.unwrap();
        assert_eq!(retired, 3);

        let notes = store.notes_for_patient(p.id).await.unwrap();
        assert!(notes[0].checklist.iter().all(|item| item.completed));
        assert!(notes[0].plan.iter().all(|item| item.completed));

        // A second pass has nothing left to retire.
        assert_eq!(store.retire_active_items(p.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn check_in_under_deleted_note_is_not_found() {
        let store = MemoryStore::new();
        let p = patient("Ada");
        store.upsert_patient(p.clone()).await.unwrap();

        let n = note(p.id);
        let item = plan_item(n.id);
        store
            .insert_note(n.clone(), vec![], vec![item.clone()])
            .await
            .unwrap();

        store.delete_note(n.id, p.id).await.unwrap();

        let err = store
            .record_check_in(item.id, p.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn check_in_appends_repeated_timestamps() {
        let store = MemoryStore::new();
        let p = patient("Ada");
        store.upsert_patient(p.clone()).await.unwrap();

        let n = note(p.id);
        let item = plan_item(n.id);
        store
            .insert_note(n, vec![], vec![item.clone()])
            .await
            .unwrap();

        let at = Utc::now();
        store.record_check_in(item.id, p.id, at).await.unwrap();
        let updated = store.record_check_in(item.id, p.id, at).await.unwrap();
        assert_eq!(updated.check_ins, vec![at, at]);
    }

    #[tokio::test]
    async fn check_in_by_non_owner_is_not_found() {
        let store = MemoryStore::new();
        let owner = patient("Ada");
        let stranger = patient("Mallory");
        store.upsert_patient(owner.clone()).await.unwrap();
        store.upsert_patient(stranger.clone()).await.unwrap();

        let n = note(owner.id);
        let item = plan_item(n.id);
        store
            .insert_note(n, vec![], vec![item.clone()])
            .await
            .unwrap();

        let err = store
            .record_check_in(item.id, stranger.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn complete_task_twice_is_a_no_op() {
        let store = MemoryStore::new();
        let p = patient("Ada");
        store.upsert_patient(p.clone()).await.unwrap();

        let n = note(p.id);
        let item = checklist_item(n.id);
        store
            .insert_note(n, vec![item.clone()], vec![])
            .await
            .unwrap();

        let first = store.complete_task(item.id, p.id).await.unwrap();
        assert!(first.completed);
        let second = store.complete_task(item.id, p.id).await.unwrap();
        assert!(second.completed);
    }

    #[tokio::test]
    async fn deleting_a_note_does_not_hide_its_items_from_sweeps() {
        let store = MemoryStore::new();
        let p = patient("Ada");
        store.upsert_patient(p.clone()).await.unwrap();

        let n = note(p.id);
        let item = plan_item(n.id);
        store
            .insert_note(n.clone(), vec![], vec![item.clone()])
            .await
            .unwrap();
        store.delete_note(n.id, p.id).await.unwrap();

        let active = store.active_plan_items().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].item.id, item.id);
        assert_eq!(active[0].patient_name, "Ada");
    }

    #[tokio::test]
    async fn deleted_or_completed_items_leave_the_sweep_set() {
        let store = MemoryStore::new();
        let p = patient("Ada");
        store.upsert_patient(p.clone()).await.unwrap();

        let n = note(p.id);
        let kept = plan_item(n.id);
        let dropped = plan_item(n.id);
        store
            .insert_note(n, vec![], vec![kept.clone(), dropped.clone()])
            .await
            .unwrap();

        store.delete_plan_item(dropped.id, p.id).await.unwrap();
        store.complete_plan_item(kept.id).await.unwrap();

        assert!(store.active_plan_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn patient_listing_filters_deleted_notes_and_items() {
        let store = MemoryStore::new();
        let p = patient("Ada");
        store.upsert_patient(p.clone()).await.unwrap();

        let n = note(p.id);
        let kept = checklist_item(n.id);
        let dropped = checklist_item(n.id);
        store
            .insert_note(n.clone(), vec![kept.clone(), dropped.clone()], vec![])
            .await
            .unwrap();
        store.delete_checklist_item(dropped.id, p.id).await.unwrap();

        let notes = store.notes_for_patient(p.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].checklist.len(), 1);
        assert_eq!(notes[0].checklist[0].id, kept.id);

        store.delete_note(n.id, p.id).await.unwrap();
        assert!(store.notes_for_patient(p.id).await.unwrap().is_empty());
    }
}
