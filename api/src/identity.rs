use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;

/// Caller identity arrives as plain headers; authentication is handled by
/// the deployment's front door, not this service.
pub fn doctor_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    header_uuid(headers, "x-doctor-id")
}

pub fn patient_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    header_uuid(headers, "x-patient-id")
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, AppError> {
    let value = headers.get(name).ok_or_else(|| AppError::Validation {
        message: format!("{name} header is required"),
        field: Some(format!("headers.{name}")),
        received: None,
        docs_hint: Some(format!("Pass {name} as a UUID header.")),
    })?;

    let value_str = value.to_str().map_err(|_| AppError::Validation {
        message: format!("{name} must be a valid UTF-8 string"),
        field: Some(format!("headers.{name}")),
        received: None,
        docs_hint: None,
    })?;

    Uuid::parse_str(value_str).map_err(|_| AppError::Validation {
        message: format!("{name} must be a valid UUID"),
        field: Some(format!("headers.{name}")),
        received: Some(serde_json::Value::String(value_str.to_string())),
        docs_hint: Some(
            "Use a valid UUIDv4 or UUIDv7, e.g. 'a1b2c3d4-e5f6-7890-abcd-ef1234567890'"
                .to_string(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn parses_a_well_formed_header() {
        let id = Uuid::now_v7();
        let mut headers = HeaderMap::new();
        headers.insert("x-patient-id", HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(patient_id(&headers).unwrap(), id);
    }

    #[test]
    fn missing_and_malformed_headers_are_validation_errors() {
        let headers = HeaderMap::new();
        assert!(matches!(
            doctor_id(&headers),
            Err(AppError::Validation { .. })
        ));

        let mut headers = HeaderMap::new();
        headers.insert("x-doctor-id", HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            doctor_id(&headers),
            Err(AppError::Validation { .. })
        ));
    }
}
