use anyhow::Context;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::json;

use super::{BackendClient, BackendError, ensure_success};
use crate::config::Project;

/// The subset of the identity backend's user object this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
    #[serde(default)]
    pub email: Option<String>,
}

impl IdentityUser {
    /// Lower-cased email, if the account has a non-blank one.
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
    }
}

/// Token pair issued by the refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl BackendClient {
    /// Resolves the user behind an access token.
    pub async fn fetch_user(
        &self,
        project: Project<'_>,
        access_token: &str,
    ) -> Result<IdentityUser, BackendError> {
        let response = self
            .request(Method::GET, project, "/auth/v1/user")
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Exchanges a refresh token for a new token pair.
    pub async fn refresh_session(
        &self,
        project: Project<'_>,
        refresh_token: &str,
    ) -> Result<TokenGrant, BackendError> {
        let response = self
            .request(
                Method::POST,
                project,
                "/auth/v1/token?grant_type=refresh_token",
            )
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

/// OAuth authorize URL that sends the browser back to `redirect_to` with the
/// token pair in the URL fragment.
pub fn authorize_url(
    project: Project<'_>,
    provider: &str,
    redirect_to: &str,
) -> anyhow::Result<Url> {
    let mut url = Url::parse(&format!("{}/auth/v1/authorize", project.url))
        .context("SUPABASE_URL is not a valid URL")?;
    url.query_pairs_mut()
        .append_pair("provider", provider)
        .append_pair("redirect_to", redirect_to)
        .append_pair("apikey", project.api_key);
    Ok(url)
}
