//! Loopback stand-ins for the hosted backend and for the site itself, used by
//! handler tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::{config::Settings, web::AppState};

pub const SERVICE_KEY: &str = "service-key";
pub const ANON_KEY: &str = "anon-key";
pub const BUCKET: &str = "reports";

#[derive(Default)]
struct FakeState {
    /// Access token → email on the identity record.
    users: Mutex<HashMap<String, Option<String>>>,
    /// Refresh token → access token handed out on refresh.
    refresh_tokens: Mutex<HashMap<String, String>>,
    /// `{bucket}/{path}` → (content type, bytes).
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    tables: Mutex<HashMap<String, Vec<Value>>>,
    storage_down: Mutex<bool>,
    signing_down: Mutex<bool>,
    /// Status and body every row insert answers with while set.
    insert_failure: Mutex<Option<(StatusCode, String)>>,
    /// `expires_in` handed out with refreshed tokens.
    grant_lifetime: Mutex<Option<i64>>,
    next_id: Mutex<i64>,
}

/// Handle on a running fake backend.
#[derive(Clone)]
pub struct FakeBackend {
    pub url: String,
    state: Arc<FakeState>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let router = Router::new()
            .route("/auth/v1/user", get(fake_user))
            .route("/auth/v1/token", post(fake_token))
            .route(
                "/storage/v1/object/*rest",
                get(fake_get_object).post(fake_post_object),
            )
            .route("/rest/v1/:table", get(fake_select).post(fake_insert))
            .with_state(state.clone());

        let url = serve(router).await;
        Self { url, state }
    }

    pub fn add_user(&self, token: &str, email: Option<&str>) {
        lock(&self.state.users).insert(token.to_string(), email.map(str::to_string));
    }

    pub fn add_refresh_token(&self, refresh_token: &str, access_token: &str) {
        lock(&self.state.refresh_tokens)
            .insert(refresh_token.to_string(), access_token.to_string());
    }

    pub fn put_object(&self, path: &str, content_type: &str, bytes: &[u8]) {
        lock(&self.state.objects).insert(
            path.to_string(),
            (content_type.to_string(), bytes.to_vec()),
        );
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.state.objects)
            .get(path)
            .map(|(_, bytes)| bytes.clone())
    }

    pub fn seed_row(&self, table: &str, row: Value) {
        lock(&self.state.tables)
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.state.tables)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_storage_down(&self, down: bool) {
        *lock(&self.state.storage_down) = down;
    }

    pub fn set_signing_down(&self, down: bool) {
        *lock(&self.state.signing_down) = down;
    }

    pub fn fail_inserts(&self, status: StatusCode, body: &str) {
        *lock(&self.state.insert_failure) = Some((status, body.to_string()));
    }

    pub fn set_grant_lifetime(&self, expires_in: i64) {
        *lock(&self.state.grant_lifetime) = Some(expires_in);
    }

    /// Site settings pointing at this backend, with `overrides` applied on top.
    pub fn settings(&self, overrides: &[(&str, Option<&str>)]) -> Settings {
        let mut env: HashMap<String, String> = HashMap::from([
            ("SUPABASE_URL".to_string(), self.url.clone()),
            ("SUPABASE_SERVICE_ROLE_KEY".to_string(), SERVICE_KEY.to_string()),
            ("SUPABASE_ANON_KEY".to_string(), ANON_KEY.to_string()),
            ("REPORTS_BUCKET".to_string(), BUCKET.to_string()),
        ]);
        for (key, value) in overrides {
            match value {
                Some(value) => env.insert(key.to_string(), value.to_string()),
                None => env.remove(*key),
            };
        }
        Settings::from_lookup(|key| env.get(key).cloned())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

/// Base URL of a loopback port nothing listens on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);
    format!("http://{addr}")
}

/// Starts the site with `settings` and returns its base URL.
pub async fn spawn_app(settings: Settings) -> String {
    let state = AppState::new(settings).expect("app state");
    serve(crate::web::router::build_router(state)).await
}

/// HTTP client that leaves redirects for the test to inspect.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("test client")
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn fake_user(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    let token = bearer(&headers).unwrap_or_default();
    match lock(&state.users).get(&token) {
        Some(email) => Json(json!({ "id": "user-1", "email": email })).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "msg": "invalid JWT" })),
        )
            .into_response(),
    }
}

async fn fake_token(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let refresh_token = body
        .get("refresh_token")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let granted = lock(&state.refresh_tokens).get(refresh_token).cloned();
    let expires_in = lock(&state.grant_lifetime).unwrap_or(3600);

    match (query.get("grant_type").map(String::as_str), granted) {
        (Some("refresh_token"), Some(access_token)) => Json(json!({
            "access_token": access_token,
            "refresh_token": format!("{refresh_token}-next"),
            "expires_in": expires_in,
            "token_type": "bearer",
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

async fn fake_post_object(
    State(state): State<Arc<FakeState>>,
    AxumPath(rest): AxumPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if bearer(&headers).as_deref() != Some(SERVICE_KEY) {
        return (StatusCode::FORBIDDEN, "service key required").into_response();
    }

    if let Some(path) = rest.strip_prefix("sign/") {
        if *lock(&state.signing_down) {
            return (StatusCode::INTERNAL_SERVER_ERROR, "signing unavailable").into_response();
        }
        if !lock(&state.objects).contains_key(path) {
            return (StatusCode::NOT_FOUND, "Object not found").into_response();
        }
        return Json(json!({ "signedURL": format!("/object/sign/{path}?token=signed") }))
            .into_response();
    }

    if *lock(&state.storage_down) {
        return (StatusCode::SERVICE_UNAVAILABLE, "storage offline").into_response();
    }
    let upsert = headers
        .get("x-upsert")
        .and_then(|value| value.to_str().ok())
        == Some("true");
    if !upsert && lock(&state.objects).contains_key(&rest) {
        return (StatusCode::CONFLICT, "The resource already exists").into_response();
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    lock(&state.objects).insert(rest.clone(), (content_type, body.to_vec()));
    Json(json!({ "Key": rest })).into_response()
}

async fn fake_get_object(
    State(state): State<Arc<FakeState>>,
    AxumPath(rest): AxumPath<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let key = if let Some(path) = rest.strip_prefix("public/") {
        path
    } else if let Some(path) = rest.strip_prefix("sign/") {
        if query.get("token").map(String::as_str) != Some("signed") {
            return (StatusCode::BAD_REQUEST, "missing token").into_response();
        }
        path
    } else {
        return (StatusCode::BAD_REQUEST, "unsupported path").into_response();
    };

    match lock(&state.objects).get(key) {
        Some((content_type, bytes)) => (
            [(header::CONTENT_TYPE, content_type.clone())],
            bytes.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Object not found").into_response(),
    }
}

async fn fake_select(
    State(state): State<Arc<FakeState>>,
    AxumPath(table): AxumPath<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let rows = lock(&state.tables).get(&table).cloned().unwrap_or_default();
    let rows = match query.get("slug").and_then(|filter| filter.strip_prefix("eq.")) {
        Some(slug) => rows
            .into_iter()
            .filter(|row| row.get("slug").and_then(Value::as_str) == Some(slug))
            .collect::<Vec<_>>(),
        None => rows,
    };
    Json(rows).into_response()
}

async fn fake_insert(
    State(state): State<Arc<FakeState>>,
    AxumPath(table): AxumPath<String>,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> Response {
    if bearer(&headers).as_deref() != Some(SERVICE_KEY) {
        return (StatusCode::UNAUTHORIZED, "service key required").into_response();
    }
    if let Some((status, body)) = lock(&state.insert_failure).clone() {
        return (status, body).into_response();
    }

    let mut tables = lock(&state.tables);
    let rows = tables.entry(table).or_default();
    let email = row.get("email").cloned();
    if email.is_some() && rows.iter().any(|existing| existing.get("email") == email.as_ref()) {
        return (
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
        )
            .into_response();
    }

    let id = {
        let mut next_id = lock(&state.next_id);
        *next_id += 1;
        *next_id
    };
    if let Some(fields) = row.as_object_mut() {
        fields.insert("id".to_string(), json!(id));
    }
    rows.push(row.clone());

    let wants_row = headers
        .get("prefer")
        .and_then(|value| value.to_str().ok())
        == Some("return=representation");
    if wants_row {
        (StatusCode::CREATED, Json(json!([row]))).into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}
