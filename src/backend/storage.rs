use reqwest::{Method, RequestBuilder, Response, header};
use serde::Deserialize;
use serde_json::json;

use super::{BackendClient, BackendError, ensure_success};
use crate::config::Project;

#[derive(Debug, Deserialize)]
struct SignedObject {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl BackendClient {
    /// Uploads (or overwrites) an object at `{bucket}/{path}`.
    pub async fn upload_object(
        &self,
        project: Project<'_>,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BackendError> {
        let response = self
            .privileged(
                Method::POST,
                project,
                &format!("/storage/v1/object/{bucket}/{path}"),
            )
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Creates a time-limited download URL for a private object.
    pub async fn sign_object(
        &self,
        project: Project<'_>,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, BackendError> {
        let response = self
            .privileged(
                Method::POST,
                project,
                &format!("/storage/v1/object/sign/{bucket}/{path}"),
            )
            .json(&json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;
        let signed: SignedObject = ensure_success(response).await?.json().await?;
        Ok(absolute_signed_url(project.url, &signed.signed_url))
    }

    /// Opens a download stream for an arbitrary object URL.
    pub async fn fetch_object(&self, url: &str) -> Result<Response, BackendError> {
        let response = self.object_request(url).send().await?;
        ensure_success(response).await
    }

    // No total timeout: the body is streamed to the client and may be large.
    fn object_request(&self, url: &str) -> RequestBuilder {
        self.http()
            .get(url)
            .header(header::CACHE_CONTROL, "no-store")
    }
}

/// Public URL of an object in a public bucket.
pub fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!("{base_url}/storage/v1/object/public/{bucket}/{path}")
}

/// Object path inside `bucket` when `url` is that bucket's public URL.
pub fn object_path_in_bucket<'a>(base_url: &str, bucket: &str, url: &'a str) -> Option<&'a str> {
    let prefix = public_object_url(base_url, bucket, "");
    url.strip_prefix(prefix.as_str())
        .filter(|path| !path.is_empty())
}

// The sign endpoint answers with a path relative to `/storage/v1`.
fn absolute_signed_url(base_url: &str, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        return signed.to_string();
    }
    let signed = signed.trim_start_matches('/');
    let signed = signed.strip_prefix("storage/v1/").unwrap_or(signed);
    format!("{base_url}/storage/v1/{signed}")
}
