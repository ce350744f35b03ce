use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};

use super::{BackendClient, BackendError, ensure_success};
use crate::config::Project;

impl BackendClient {
    /// Inserts one row and returns the stored representation.
    pub async fn insert_row<T, R>(
        &self,
        project: Project<'_>,
        table: &str,
        row: &T,
    ) -> Result<Vec<R>, BackendError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .privileged(Method::POST, project, &format!("/rest/v1/{table}"))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    /// Reads rows using PostgREST-style query pairs (`slug=eq.x`, `order=...`).
    pub async fn select_rows<R>(
        &self,
        project: Project<'_>,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<R>, BackendError>
    where
        R: DeserializeOwned,
    {
        let response = self
            .privileged(Method::GET, project, &format!("/rest/v1/{table}"))
            .query(query)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}
