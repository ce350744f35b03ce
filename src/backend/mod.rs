//! Thin client for the hosted backend: identity (`/auth/v1`), object storage
//! (`/storage/v1`) and the relational data API (`/rest/v1`).
//!
//! Every call takes the [`Project`] it should talk to, so handlers decide which
//! key (service role or anon) a request is made with.

pub mod auth;
pub mod rest;
pub mod storage;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;

use crate::config::Project;

/// Total budget for an API call, body included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest pause between reads; the only bound on streamed object downloads.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with a non-success status.
    #[error("backend rejected request with {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl BackendError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Rejected { status, .. } => Some(*status),
            BackendError::Transport(err) => err.status(),
        }
    }

    /// Upstream response text, when the backend produced one.
    pub fn body(&self) -> Option<&str> {
        match self {
            BackendError::Rejected { body, .. } if !body.trim().is_empty() => Some(body),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
}

impl BackendClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .context("failed to build backend HTTP client")?;
        Ok(Self { http })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Request against `{project.url}{path}` carrying the project key as `apikey`.
    fn request(
        &self,
        method: reqwest::Method,
        project: Project<'_>,
        path: &str,
    ) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", project.url, path))
            .header("apikey", project.api_key)
            .timeout(REQUEST_TIMEOUT)
    }

    /// Same as [`Self::request`] but also authorized as the project key itself.
    fn privileged(
        &self,
        method: reqwest::Method,
        project: Project<'_>,
        path: &str,
    ) -> RequestBuilder {
        self.request(method, project, path).bearer_auth(project.api_key)
    }
}

/// Turns a non-success response into [`BackendError::Rejected`].
async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Rejected { status, body })
}
