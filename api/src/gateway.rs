use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use aftercare_core::error::CoreError;
use aftercare_core::extract::ExtractionGateway;

const GENERATE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini-backed extraction gateway. One prompt in, the first candidate's
/// text out; no retries, no streaming. Anything that goes wrong (transport,
/// non-success status, empty candidates) surfaces as `CoreError::Gateway`.
pub struct GeminiGateway {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGateway {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client with static config");
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Concatenate the text parts of the first candidate, if any.
fn first_candidate_text(response: &GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    if candidate.content.parts.is_empty() {
        return None;
    }
    Some(
        candidate
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect(),
    )
}

#[async_trait]
impl ExtractionGateway for GeminiGateway {
    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let url = format!("{GENERATE_ENDPOINT}/{}:generateContent", self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .map_err(|e| CoreError::Gateway(format!("request to model endpoint failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Gateway(format!(
                "model endpoint returned {status}"
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Gateway(format!("unreadable model response: {e}")))?;

        first_candidate_text(&body)
            .ok_or_else(|| CoreError::Gateway("model returned no candidates".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_joins_first_candidate_parts() {
        let body: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [ { "text": "{\"checklist\"" }, { "text": ": []}" } ] } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        }))
        .unwrap();

        assert_eq!(
            first_candidate_text(&body).unwrap(),
            "{\"checklist\": []}"
        );
    }

    #[test]
    fn empty_candidates_yield_none() {
        let body: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(first_candidate_text(&body).is_none());

        let body: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [ { "content": { "parts": [] } } ]
        }))
        .unwrap();
        assert!(first_candidate_text(&body).is_none());
    }
}
