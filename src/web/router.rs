use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, landing, registrations, reports, session, system};

const ROBOTS_TXT_BODY: &str = "User-agent: *\nDisallow: /system\nDisallow: /api/\n";

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.settings().max_upload_bytes;

    Router::new()
        .route("/", get(landing::landing_page))
        .route("/research", get(landing::research_index))
        .route("/research/:slug", get(landing::report_detail))
        .route("/system", get(system::console_page))
        .route("/system/sign-in", get(session::sign_in))
        .route("/system/callback", get(session::callback_page))
        .route("/system/session", post(session::store_session))
        .route("/system/sign-out", post(session::sign_out))
        .route("/healthz", get(healthz))
        .route("/robots.txt", get(robots_txt))
        .route(
            "/api/delegate-registrations",
            post(registrations::create_registration),
        )
        .route(
            "/api/research/report-pdf/:slug",
            get(reports::report_pdf),
        )
        .route(
            "/api/system/reports",
            post(reports::upload_report).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

async fn robots_txt() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        ROBOTS_TXT_BODY,
    )
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
