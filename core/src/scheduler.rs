use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::adherence::AdherenceEngine;

/// Source of "now" for the sweep loop. Production uses `SystemClock`; tests
/// inject a fixed or scripted clock so sweep timestamps are deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Owns the periodic sweep timer. One eager sweep fires immediately on
/// `start`, then one per period; ticks that land while a sweep is still
/// running are skipped rather than queued.
pub struct SweepScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweepScheduler {
    pub fn start(engine: Arc<AdherenceEngine>, clock: Arc<dyn Clock>, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(period_secs = period.as_secs(), "adherence sweep scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("adherence sweep scheduler shutting down");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let now = clock.now();
                        match engine.sweep(now).await {
                            Ok(report) => tracing::info!(
                                evaluated = report.evaluated,
                                completed = report.completed,
                                reminders = report.reminders.len(),
                                failed = report.failed,
                                "adherence sweep finished"
                            ),
                            Err(err) => tracing::error!(error = %err, "adherence sweep failed"),
                        }
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop to exit and wait for it.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::model::{Frequency, Note, Patient, PlanItem};
    use crate::store::{MemoryStore, RecordStore};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[tokio::test]
    async fn eager_sweep_runs_against_the_injected_clock() {
        let store = Arc::new(MemoryStore::new());
        let patient = Patient {
            id: Uuid::now_v7(),
            name: "Ada".to_string(),
            created_at: Utc::now(),
        };
        store.upsert_patient(patient.clone()).await.unwrap();

        let sweep_instant: DateTime<Utc> = "2026-02-14T12:00:00Z".parse().unwrap();
        let start_date: NaiveDate = sweep_instant.date_naive();

        // Daily item with duration 1 and one check-in: completes on the
        // first sweep that sees it.
        let note = Note {
            id: Uuid::now_v7(),
            doctor_id: Uuid::now_v7(),
            patient_id: patient.id,
            encrypted_note: "aa:bb".to_string(),
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let item = PlanItem {
            id: Uuid::now_v7(),
            note_id: note.id,
            action: "Rest".to_string(),
            frequency: Frequency::Daily,
            duration_days: 1,
            start_date,
            check_ins: vec![sweep_instant],
            completed: false,
            deleted: false,
        };
        store.insert_note(note, vec![], vec![item]).await.unwrap();

        let engine = Arc::new(AdherenceEngine::new(store.clone()));
        let scheduler = SweepScheduler::start(
            engine,
            Arc::new(FixedClock(sweep_instant)),
            Duration::from_secs(3600),
        );

        // The eager first tick should have completed the item shortly.
        let mut done = false;
        for _ in 0..50 {
            if store.active_plan_items().await.unwrap().is_empty() {
                done = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.stop().await;
        assert!(done, "eager sweep never completed the item");
    }

    #[tokio::test]
    async fn stop_terminates_the_loop() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(AdherenceEngine::new(store));
        let scheduler = SweepScheduler::start(
            engine,
            Arc::new(SystemClock),
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.stop().await;
    }
}
