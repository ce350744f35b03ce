use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    backend::BackendError,
    web::{
        AppState,
        responses::{JsonFailure, json_error},
    },
};

const REGISTRATIONS_TABLE: &str = "delegate_registrations";

/// Incoming JSON body; every field is optional so validation can name what is missing.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub delegation_type: Option<String>,
    pub preferred_country: Option<String>,
    pub preferred_institution: Option<String>,
    pub committee_preference: Option<String>,
}

/// Row written to `delegate_registrations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegateRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub delegation_type: String,
    pub preferred_country: Option<String>,
    pub preferred_institution: Option<String>,
    pub committee_preference: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegistrationError {
    MissingFields,
    InvalidEmail,
}

impl RegistrationError {
    pub fn message(&self) -> &'static str {
        match self {
            RegistrationError::MissingFields => {
                "first_name, last_name, email, and delegation_type are required."
            }
            RegistrationError::InvalidEmail => "Please provide a valid email address.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsertedRow {
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub id: Value,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RegistrationPayload {
    pub fn validate(self) -> Result<DelegateRegistration, RegistrationError> {
        let (Some(first_name), Some(last_name), Some(email), Some(delegation_type)) = (
            trimmed(self.first_name),
            trimmed(self.last_name),
            trimmed(self.email).map(|email| email.to_lowercase()),
            trimmed(self.delegation_type),
        ) else {
            return Err(RegistrationError::MissingFields);
        };

        if !is_valid_email(&email) {
            return Err(RegistrationError::InvalidEmail);
        }

        Ok(DelegateRegistration {
            first_name,
            last_name,
            email,
            delegation_type,
            preferred_country: trimmed(self.preferred_country),
            preferred_institution: trimmed(self.preferred_institution),
            committee_preference: trimmed(self.committee_preference),
        })
    }
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the
/// domain with at least one character on each side.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    domain
        .char_indices()
        .any(|(index, c)| c == '.' && index > 0 && index + 1 < domain.len())
}

/// `POST /api/delegate-registrations`
pub async fn create_registration(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RegistrationResponse>, JsonFailure> {
    let Some(project) = state.settings().service_project() else {
        error!("delegate registration attempted without backend configuration");
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY are required.",
        ));
    };

    let payload: RegistrationPayload = serde_json::from_slice(&body).map_err(|err| {
        warn!(%err, "malformed delegate registration body");
        json_error(StatusCode::BAD_REQUEST, RegistrationError::MissingFields.message())
    })?;
    let registration = payload
        .validate()
        .map_err(|err| json_error(StatusCode::BAD_REQUEST, err.message()))?;

    let rows: Vec<InsertedRow> = state
        .backend()
        .insert_row(project, REGISTRATIONS_TABLE, &registration)
        .await
        .map_err(|err| {
            let status = match err.status() {
                Some(StatusCode::CONFLICT) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error!(?err, %status, "failed to store delegate registration");
            let message = match &err {
                BackendError::Rejected { body, .. } => body.clone(),
                BackendError::Transport(_) => "Unable to save registration.".to_string(),
            };
            json_error(status, message)
        })?;

    info!(delegation_type = %registration.delegation_type, "delegate registration stored");
    Ok(Json(RegistrationResponse {
        id: rows.into_iter().next().map(|row| row.id).unwrap_or(Value::Null),
    }))
}
