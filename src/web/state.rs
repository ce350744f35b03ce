use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{backend::BackendClient, config::Settings};

#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    backend: BackendClient,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let backend = BackendClient::new().context("failed to initialize backend client")?;

        Ok(Self {
            settings: Arc::new(settings),
            backend,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }
}
