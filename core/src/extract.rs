//! Note extraction: prompt construction, the gateway contract, and
//! normalization of whatever the model sends back.
//!
//! The extraction model's output is untrusted and inconsistently shaped: it
//! wraps JSON in code fences, adds commentary, mixes bare strings with
//! structured objects inside arrays, and drops fields. `normalize` owns all
//! of the defensive defaulting; callers either get a fully-populated
//! `ActionableSteps` or an `ExtractionFormat` error.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{ActionableSteps, ChecklistStep, Frequency, PlanStep};

/// Fallback duration when the model omits or malforms one.
pub const DEFAULT_PLAN_DURATION_DAYS: i64 = 7;

const UNSPECIFIED_TASK: &str = "Unspecified task";
const UNSPECIFIED_ACTION: &str = "Unspecified action";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-zA-Z]*\n?|\n?```").expect("static fence pattern"));

/// Narrow contract for the language-model endpoint: one prompt in, raw text
/// out. No structural guarantee on the response; that is `normalize`'s
/// problem. Implementations must not retry; failures surface to the caller
/// of the note-filing operation.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CoreError>;
}

/// Build the extraction prompt for a note. Embeds today's date so the model
/// has a date anchor for relative phrases ("in three days", "next week").
pub fn extraction_prompt(note: &str, today: NaiveDate) -> String {
    format!(
        r#"You are a medical task analyzer. Extract actionable items from the doctor's note below into a structured format.

CRITICAL INSTRUCTIONS:
1. Respond with ONLY a valid JSON object
2. NO explanatory text
3. NO markdown formatting and NO code blocks

Required format:
{{
  "checklist": [
    {{ "task": "specific task description", "dueDate": "{today}" }}
  ],
  "plan": [
    {{ "action": "specific action description", "frequency": "daily|weekly|as-needed", "duration": 7, "startDate": "{today}" }}
  ]
}}

Rules:
1. Convert every one-time instruction into a checklist task object
2. Convert every recurring instruction into a plan action object
3. For checklist items without a specific date, use today's date ({today})
4. For plan items: if frequency is not specified use "as-needed", if duration is not specified use 7, if start date is not specified use {today}
5. Convert bullet points and numbered lists into proper items
6. Only return empty arrays when the note truly contains no actionable items

Doctor's note:
{note}"#
    )
}

/// Run a note through the gateway and normalize the result.
///
/// An all-empty result is valid; it is logged as a low-confidence signal and
/// returned as-is.
pub async fn process_note(
    gateway: &dyn ExtractionGateway,
    note: &str,
    today: NaiveDate,
) -> Result<ActionableSteps, CoreError> {
    let prompt = extraction_prompt(note, today);
    let raw = gateway.generate(&prompt).await?;
    let steps = normalize(&raw, today)?;

    if steps.checklist.is_empty() && steps.plan.is_empty() {
        tracing::warn!(note_len = note.len(), "extraction produced no actionable steps");
    }

    Ok(steps)
}

/// Array entries arrive either as bare strings or as structured objects;
/// resolve the two shapes explicitly instead of sniffing at runtime.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStep<T> {
    Text(String),
    Fields(T),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChecklistFields {
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    due_date: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlanFields {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    duration: Option<Value>,
    #[serde(default)]
    start_date: Option<Value>,
}

/// Sanitize and parse raw model output into `ActionableSteps`.
///
/// Recovery steps: strip markdown code fences, slice from the first `{` to
/// the last `}` (drops commentary before/after the object), parse as JSON,
/// and require `checklist` and `plan` arrays. Per-entry weirdness is
/// defaulted, never fatal; only an unrecoverable overall shape fails.
pub fn normalize(raw: &str, today: NaiveDate) -> Result<ActionableSteps, CoreError> {
    let cleaned = CODE_FENCE.replace_all(raw, "");

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(CoreError::extraction("no JSON object in model output"));
    };
    if end < start {
        return Err(CoreError::extraction("no JSON object in model output"));
    }
    let slice = cleaned[start..=end].trim();

    let parsed: Value = serde_json::from_str(slice)
        .map_err(|e| CoreError::extraction(format!("model output is not valid JSON: {e}")))?;

    let checklist = parsed
        .get("checklist")
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::extraction("missing or non-array 'checklist' field"))?;
    let plan = parsed
        .get("plan")
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::extraction("missing or non-array 'plan' field"))?;

    let checklist = checklist
        .iter()
        .map(|entry| checklist_step(entry, today))
        .collect();
    let plan = plan.iter().map(|entry| plan_step(entry, today)).collect();

    Ok(ActionableSteps { checklist, plan })
}

fn checklist_step(entry: &Value, today: NaiveDate) -> ChecklistStep {
    let raw = serde_json::from_value::<RawStep<RawChecklistFields>>(entry.clone())
        .unwrap_or_else(|_| RawStep::Fields(RawChecklistFields::default()));

    match raw {
        RawStep::Text(task) => ChecklistStep {
            task,
            due_date: today,
        },
        RawStep::Fields(fields) => ChecklistStep {
            task: fields
                .task
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_TASK.to_string()),
            due_date: loose_date(fields.due_date.as_ref()).unwrap_or(today),
        },
    }
}

fn plan_step(entry: &Value, today: NaiveDate) -> PlanStep {
    let raw = serde_json::from_value::<RawStep<RawPlanFields>>(entry.clone())
        .unwrap_or_else(|_| RawStep::Fields(RawPlanFields::default()));

    match raw {
        RawStep::Text(action) => PlanStep {
            action,
            frequency: Frequency::AsNeeded,
            duration: DEFAULT_PLAN_DURATION_DAYS,
            start_date: today,
        },
        RawStep::Fields(fields) => PlanStep {
            action: fields
                .action
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_ACTION.to_string()),
            frequency: fields
                .frequency
                .as_deref()
                .map(Frequency::parse)
                .unwrap_or(Frequency::AsNeeded),
            duration: fields
                .duration
                .as_ref()
                .and_then(Value::as_i64)
                .filter(|d| *d > 0)
                .unwrap_or(DEFAULT_PLAN_DURATION_DAYS),
            start_date: loose_date(fields.start_date.as_ref()).unwrap_or(today),
        },
    }
}

/// The model emits dates as `YYYY-MM-DD` or as full RFC 3339 timestamps.
/// Anything else is treated as absent.
fn loose_date(value: Option<&Value>) -> Option<NaiveDate> {
    let raw = value?.as_str()?;
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.date_naive())
}
