//! Authorization gate for the report upload endpoint: bearer token →
//! identity backend → allow-list.

use axum::http::{HeaderMap, StatusCode, header};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, warn};

use crate::{
    backend::{BackendClient, BackendError},
    config::{AllowList, Project},
    web::{
        responses::{JsonFailure, json_error},
        session,
    },
};

/// A user who passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    MissingToken,
    InvalidToken,
    MissingEmail,
    NotAllowed,
    /// The identity backend could not be reached at all.
    Unavailable,
}

impl AccessError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::MissingToken | AccessError::InvalidToken | AccessError::MissingEmail => {
                StatusCode::UNAUTHORIZED
            }
            AccessError::NotAllowed => StatusCode::FORBIDDEN,
            AccessError::Unavailable => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AccessError::MissingToken => "Missing access token.",
            AccessError::InvalidToken => "Invalid access token.",
            AccessError::MissingEmail => "Unable to resolve user email.",
            AccessError::NotAllowed => "Access denied.",
            AccessError::Unavailable => "Unable to verify access token.",
        }
    }

    pub fn into_failure(self) -> JsonFailure {
        json_error(self.status(), self.message())
    }
}

/// Token from `Authorization: Bearer …`, if present and non-blank.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Bearer header first, then the console session cookie.
pub fn request_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    bearer_token(headers)
        .map(str::to_string)
        .or_else(|| session::read_session(jar).map(|session| session.access_token))
}

/// Allow-list decision for an already authenticated email.
pub fn check_allow_list(allow_list: &AllowList, email: &str) -> Result<(), AccessError> {
    if allow_list.permits(email) {
        Ok(())
    } else {
        Err(AccessError::NotAllowed)
    }
}

/// Authenticates `token` against the identity backend, then applies the allow-list.
pub async fn authorize_uploader(
    backend: &BackendClient,
    project: Project<'_>,
    allow_list: &AllowList,
    token: Option<&str>,
) -> Result<Uploader, AccessError> {
    let token = token.ok_or(AccessError::MissingToken)?;

    let user = match backend.fetch_user(project, token).await {
        Ok(user) => user,
        Err(BackendError::Rejected { status, .. }) => {
            warn!(%status, "identity backend rejected access token");
            return Err(AccessError::InvalidToken);
        }
        Err(err @ BackendError::Transport(_)) => {
            error!(?err, "identity backend unreachable");
            return Err(AccessError::Unavailable);
        }
    };

    let email = user.normalized_email().ok_or(AccessError::MissingEmail)?;
    if let Err(err) = check_allow_list(allow_list, &email) {
        warn!(%email, "upload attempt from an address outside the allow-list");
        return Err(err);
    }

    Ok(Uploader { email })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer   ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn request_token_prefers_header_over_cookie() {
        let session = session::ConsoleSession {
            access_token: "from-cookie".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 0,
            email: None,
        };
        let jar = CookieJar::new().add(session::session_cookie(&session, false));

        assert_eq!(
            request_token(&headers_with("Bearer from-header"), &jar).as_deref(),
            Some("from-header")
        );
        assert_eq!(
            request_token(&HeaderMap::new(), &jar).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(request_token(&HeaderMap::new(), &CookieJar::new()), None);
    }

    #[test]
    fn allow_list_enforced_only_when_configured() {
        let list = AllowList::parse("lead@haven.test");
        assert_eq!(check_allow_list(&list, "lead@haven.test"), Ok(()));
        assert_eq!(
            check_allow_list(&list, "intern@haven.test"),
            Err(AccessError::NotAllowed)
        );
        assert_eq!(check_allow_list(&AllowList::default(), "anyone@x.test"), Ok(()));
    }

    #[test]
    fn access_errors_map_to_statuses() {
        assert_eq!(AccessError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccessError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccessError::MissingEmail.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccessError::NotAllowed.status(), StatusCode::FORBIDDEN);
        assert_eq!(AccessError::NotAllowed.message(), "Access denied.");
    }
}
