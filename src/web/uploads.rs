use std::{collections::HashMap, path::Path};

use axum::{extract::Multipart, http::StatusCode};

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or reading uploaded files.
#[derive(Debug)]
pub struct UploadError {
    status: StatusCode,
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Configuration describing the expectations for a single multipart file field.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a [&'a str],
    pub max_files: usize,
    /// Message used when a file with another extension is sent.
    pub rejected_type_message: &'a str,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(field_name: &'a str, allowed_extensions: &'a [&'a str], max_files: usize) -> Self {
        Self {
            field_name,
            allowed_extensions,
            max_files,
            rejected_type_message: "Unsupported file type.",
        }
    }

    pub fn with_rejected_type_message(mut self, message: &'a str) -> Self {
        self.rejected_type_message = message;
        self
    }

    fn accepts(&self, extension: &str) -> bool {
        self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

/// A file part held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    /// Sanitized name, safe to use as the last segment of a storage path.
    pub stored_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Aggregated output of the shared upload reader.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<UploadedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadOutcome {
    pub fn take_first_file(&mut self, field_name: &str) -> Option<UploadedFile> {
        let index = self
            .files
            .iter()
            .position(|file| file.field_name == field_name)?;
        Some(self.files.swap_remove(index))
    }

    pub fn text_values(&self, field_name: &str) -> Option<&[String]> {
        self.text_fields
            .get(field_name)
            .map(|values| values.as_slice())
    }

    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_values(field_name)
            .and_then(|values| values.first().map(|s| s.as_str()))
    }
}

/// Reads a multipart form into memory, validating file parts against `field_configs`.
///
/// File inputs submitted empty (no file name) are skipped. Files sent under a
/// field with no configuration are rejected.
pub async fn read_upload_form(
    mut multipart: Multipart,
    field_configs: &[FileFieldConfig<'_>],
) -> UploadResult<UploadOutcome> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut outcome = UploadOutcome::default();

    while let Some(mut field) = multipart.next_field().await.map_err(|err| {
        UploadError::with_status(err.status(), format!("Unable to read upload form: {err}"))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(|err| {
                UploadError::with_status(
                    err.status(),
                    format!("Unable to read field `{field_name}`: {err}"),
                )
            })?;
            outcome
                .text_fields
                .entry(field_name)
                .or_default()
                .push(value);
            continue;
        };

        if file_name.trim().is_empty() {
            continue;
        }

        let Some(config) = field_configs
            .iter()
            .find(|config| config.field_name == field_name)
        else {
            return Err(UploadError::new(format!(
                "Unexpected file field `{field_name}`."
            )));
        };

        let count = counts.entry(config.field_name).or_default();
        if *count >= config.max_files {
            return Err(UploadError::new(format!(
                "Too many files for `{}` (at most {}).",
                config.field_name, config.max_files
            )));
        }

        let extension = file_extension(&file_name);
        if !config.accepts(&extension) {
            return Err(UploadError::new(config.rejected_type_message));
        }

        let content_type = field.content_type().map(str::to_string);
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|err| {
            UploadError::with_status(err.status(), format!("Unable to read upload data: {err}"))
        })? {
            bytes.extend_from_slice(&chunk);
        }

        outcome.files.push(UploadedFile {
            field_name,
            stored_name: storage_file_name(&file_name, &extension, *count),
            original_name: file_name,
            content_type,
            bytes,
        });
        *count += 1;
    }

    Ok(outcome)
}

fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

// Storage paths are also raw URL segments: only `[A-Za-z0-9._-]` survives,
// every other run of characters becomes a single `-`.
fn storage_file_name(original: &str, extension: &str, index: usize) -> String {
    let mut sanitized = String::new();
    for c in sanitize_filename::sanitize(original).chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '-'
        };
        if c == '-' && sanitized.ends_with('-') {
            continue;
        }
        sanitized.push(c);
    }
    let sanitized = sanitized.trim_matches('-');

    if !sanitized.is_empty() && !sanitized.starts_with('.') {
        return sanitized.to_string();
    }
    if extension.is_empty() {
        format!("file_{index}")
    } else {
        format!("file_{index}.{extension}")
    }
}
