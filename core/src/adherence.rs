//! Periodic adherence evaluation. Each sweep walks every still-active plan
//! item, works out how many check-ins should have happened by now, and
//! decides between completing the item, reminding the patient, or leaving
//! it alone.
//!
//! The completion rule uses an adaptive extension: the required total grows
//! by exactly the check-in shortfall observed at sweep time, re-evaluated
//! every sweep, so an item is not penalized for a delayed start but also
//! cannot complete while behind schedule.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{Frequency, PlanItem};
use crate::store::{ActivePlanItem, RecordStore};

/// A reminder the sweep decided is due. Delivery is someone else's job;
/// the engine logs the decision and hands the record to the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Reminder {
    pub plan_item_id: Uuid,
    pub patient_id: Uuid,
    pub message: String,
}

/// Outcome of one sweep over all active plan items.
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    /// Items that were due for evaluation (started, active, not deleted)
    pub evaluated: u64,
    /// Items marked completed this sweep
    pub completed: u64,
    /// Items whose store write failed; logged and skipped, never fatal
    pub failed: u64,
    pub reminders: Vec<Reminder>,
}

impl SweepReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            evaluated: 0,
            completed: 0,
            failed: 0,
            reminders: Vec::new(),
        }
    }
}

/// How many check-ins a plan item should have accumulated by the time
/// `days_elapsed` whole days have passed since its start date. Day zero
/// already expects one check-in. Unrecognized frequencies count as daily.
pub fn expected_check_ins(frequency: Frequency, days_elapsed: i64) -> i64 {
    match frequency {
        Frequency::Daily | Frequency::Unknown => days_elapsed + 1,
        Frequency::Weekly => days_elapsed / 7 + 1,
        Frequency::AsNeeded => 1,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ItemDecision {
    /// Required total reached, including the adaptive extension
    Complete,
    /// Behind schedule by `missed` check-ins
    Remind { missed: i64 },
    /// Exactly on schedule; no reminder fires
    OnTrack,
}

fn evaluate(item: &PlanItem, now: DateTime<Utc>) -> ItemDecision {
    let start = item.start_date.and_time(NaiveTime::MIN).and_utc();
    let days_elapsed = (now - start).num_days();

    let expected = expected_check_ins(item.frequency, days_elapsed);
    let recorded = item.check_ins.len() as i64;
    let missed = (expected - recorded).max(0);

    if recorded >= item.duration_days + missed {
        ItemDecision::Complete
    } else if missed > 0 {
        ItemDecision::Remind { missed }
    } else {
        ItemDecision::OnTrack
    }
}

fn reminder_message(patient_name: &str, action: &str, missed: i64) -> String {
    format!(
        "Reminder for {patient_name}: \"{action}\" has {missed} missed check-in{}",
        if missed == 1 { "" } else { "s" }
    )
}

/// Sweeps all active plan items and writes completion decisions back to the
/// store. Not re-entrant: a sweep that starts while another is still
/// running is skipped, since two sweeps racing on the same item's
/// completion write is a correctness hazard.
pub struct AdherenceEngine {
    store: Arc<dyn RecordStore>,
    sweep_guard: tokio::sync::Mutex<()>,
}

impl AdherenceEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            sweep_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one sweep at the given instant. Per-item failures are logged,
    /// counted, and never abort the rest of the batch; only a failure to
    /// list the active items at all is fatal.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, CoreError> {
        let Ok(_guard) = self.sweep_guard.try_lock() else {
            tracing::warn!("previous adherence sweep still running, skipping this pass");
            return Ok(SweepReport::empty(now));
        };

        let active = self.store.active_plan_items().await?;
        let mut report = SweepReport::empty(now);

        for entry in active {
            let ActivePlanItem {
                item,
                patient_id,
                patient_name,
            } = entry;

            // Items that have not started yet are nobody's business.
            if item.start_date > now.date_naive() {
                continue;
            }
            report.evaluated += 1;

            match evaluate(&item, now) {
                ItemDecision::Complete => {
                    match self.store.complete_plan_item(item.id).await {
                        Ok(()) => {
                            report.completed += 1;
                            tracing::info!(
                                plan_item_id = %item.id,
                                patient_id = %patient_id,
                                action = %item.action,
                                "plan item completed by adherence sweep"
                            );
                        }
                        Err(err) => {
                            report.failed += 1;
                            tracing::warn!(
                                plan_item_id = %item.id,
                                error = %err,
                                "failed to complete plan item, continuing sweep"
                            );
                        }
                    }
                }
                ItemDecision::Remind { missed } => {
                    let reminder = Reminder {
                        plan_item_id: item.id,
                        patient_id,
                        message: reminder_message(&patient_name, &item.action, missed),
                    };
                    tracing::info!(
                        plan_item_id = %item.id,
                        patient_id = %patient_id,
                        missed,
                        "reminder due: {}",
                        reminder.message
                    );
                    report.reminders.push(reminder);
                }
                ItemDecision::OnTrack => {}
            }
        }

        Ok(report)
    }
}
