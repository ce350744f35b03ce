use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path as AxumPath, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    backend::{
        BackendError,
        storage::{object_path_in_bucket, public_object_url},
    },
    config::Settings,
    research::{self, REPORTS_TABLE, ReportRow, ResearchReport, parse_report_fields},
    web::{
        AppState,
        auth::{self, AccessError},
        responses::{JsonFailure, json_error},
        uploads::{FileFieldConfig, read_upload_form},
    },
};

const PDF_FIELD: &str = "pdf";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub pdf_url: String,
    pub report: Option<ResearchReport>,
}

/// `POST /api/system/reports`: authenticate, authorize, store the PDF, insert
/// the metadata row.
pub async fn upload_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, JsonFailure> {
    let settings = state.settings();
    let backend = state.backend();

    let config = settings.upload_config().map_err(|message| {
        error!(%message, "report upload is not configured");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, message)
    })?;

    let token = auth::request_token(&headers, &jar);
    let uploader = auth::authorize_uploader(
        backend,
        config.project,
        &settings.allowed_emails,
        token.as_deref(),
    )
    .await
    .map_err(AccessError::into_failure)?;

    let multipart = multipart.map_err(|rejection| {
        warn!(%rejection, "report upload without a multipart body");
        json_error(StatusCode::BAD_REQUEST, "Expected a multipart form upload.")
    })?;

    let pdf_field = FileFieldConfig::new(PDF_FIELD, &["pdf"], 1)
        .with_rejected_type_message("Only PDF files can be uploaded.");
    let mut upload = read_upload_form(multipart, &[pdf_field])
        .await
        .map_err(|err| json_error(err.status(), err.message()))?;

    let Some(file) = upload.take_first_file(PDF_FIELD) else {
        return Err(json_error(StatusCode::BAD_REQUEST, "PDF file is required."));
    };

    let draft = parse_report_fields(|name| upload.first_text(name))
        .map_err(|err| json_error(StatusCode::BAD_REQUEST, err.to_string()))?;

    let slug = draft.slug.clone();
    let storage_path = format!("{slug}/{}", file.stored_name);
    let content_type = file
        .content_type
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| mime::APPLICATION_PDF.to_string());

    backend
        .upload_object(
            config.project,
            config.bucket,
            &storage_path,
            &content_type,
            file.bytes,
        )
        .await
        .map_err(|err| upstream_failure(err, "Upload failed."))?;

    let pdf_url = public_object_url(config.project.url, config.bucket, &storage_path);

    let rows: Vec<ReportRow> = backend
        .insert_row(config.project, REPORTS_TABLE, &draft.into_row(pdf_url.clone()))
        .await
        .map_err(|err| upstream_failure(err, "Insert failed."))?;

    info!(
        %slug,
        uploader = %uploader.email,
        original = %file.original_name,
        path = %storage_path,
        "research report published"
    );

    Ok(Json(UploadResponse {
        pdf_url,
        report: rows.into_iter().next().map(ResearchReport::from),
    }))
}

fn upstream_failure(err: BackendError, fallback: &str) -> JsonFailure {
    error!(?err, "backend call failed during report upload");
    let message = err.body().unwrap_or(fallback).to_string();
    json_error(StatusCode::BAD_GATEWAY, message)
}

/// Where a stored PDF location can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfLocation {
    Direct(String),
    /// Object in the private reports bucket; needs a signed URL first.
    Signed { bucket: String, path: String },
    Unresolvable,
}

/// Classifies a stored `pdf_url`: full URLs are used as-is unless they point
/// into a private reports bucket, bare object paths are resolved against the
/// reports bucket.
pub fn pdf_location(settings: &Settings, stored: &str) -> PdfLocation {
    let stored = stored.trim();
    let is_url = stored.starts_with("http://") || stored.starts_with("https://");
    let bucket = settings.reports_bucket.as_deref();
    let base_url = settings.supabase_url.as_deref();
    let can_sign = settings.service_project().is_some();

    match (is_url, base_url, bucket) {
        (true, Some(base_url), Some(bucket)) if !settings.reports_bucket_public && can_sign => {
            match object_path_in_bucket(base_url, bucket, stored) {
                Some(path) => PdfLocation::Signed {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                },
                None => PdfLocation::Direct(stored.to_string()),
            }
        }
        (true, _, _) => PdfLocation::Direct(stored.to_string()),
        (false, Some(base_url), Some(bucket)) => {
            let path = stored.trim_start_matches('/');
            let path = path
                .strip_prefix(bucket)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(path);
            if path.is_empty() {
                PdfLocation::Unresolvable
            } else if settings.reports_bucket_public {
                PdfLocation::Direct(public_object_url(base_url, bucket, path))
            } else if can_sign {
                PdfLocation::Signed {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                }
            } else {
                PdfLocation::Unresolvable
            }
        }
        (false, _, _) => PdfLocation::Unresolvable,
    }
}

/// `GET /api/research/report-pdf/{slug}`: resolve the report and stream its PDF.
pub async fn report_pdf(
    State(state): State<AppState>,
    AxumPath(slug): AxumPath<String>,
) -> Result<Response, JsonFailure> {
    let settings = state.settings();
    let backend = state.backend();
    let not_found = || json_error(StatusCode::NOT_FOUND, "Report PDF not found.");
    let bad_gateway = || json_error(StatusCode::BAD_GATEWAY, "Unable to load report PDF.");

    let report = research::find_report(backend, settings, &slug)
        .await
        .ok_or_else(not_found)?;
    let stored = report.pdf_url.as_deref().ok_or_else(not_found)?;

    let location = match pdf_location(settings, stored) {
        PdfLocation::Direct(url) => url,
        PdfLocation::Signed { bucket, path } => {
            let project = settings.service_project().ok_or_else(bad_gateway)?;
            backend
                .sign_object(project, &bucket, &path, settings.report_url_ttl_secs)
                .await
                .map_err(|err| {
                    error!(?err, %slug, "failed to sign report PDF URL");
                    bad_gateway()
                })?
        }
        PdfLocation::Unresolvable => {
            warn!(%slug, "report PDF location cannot be resolved");
            return Err(not_found());
        }
    };

    let upstream = backend.fetch_object(&location).await.map_err(|err| {
        error!(?err, %slug, "failed to fetch report PDF");
        bad_gateway()
    })?;

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/pdf"));

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    if let Ok(disposition) = HeaderValue::from_str(&format!("inline; filename=\"{slug}.pdf\"")) {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    let stream_slug = slug.clone();
    let body = Body::from_stream(upstream.bytes_stream().inspect_err(move |err| {
        error!(?err, slug = %stream_slug, "report PDF stream interrupted");
    }));

    Ok((headers, body).into_response())
}
