//! Upload console session: the token pair issued by the identity backend's
//! OAuth redirect, kept in an HttpOnly cookie and refreshed when it expires.

use axum::{
    extract::{Form, State},
    http::{HeaderMap, header},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use cookie::time::Duration as CookieDuration;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    backend::{BackendClient, auth::authorize_url},
    config::Project,
    web::{
        AppState,
        templates::{PageLayout, render_page},
    },
};

pub const SESSION_COOKIE: &str = "haven_admin_session";
pub const SESSION_TTL_DAYS: i64 = 30;
const OAUTH_PROVIDER: &str = "google";
/// Longest token lifetime accepted from a callback or refresh grant.
const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ConsoleSession {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn encode(&self) -> String {
        // Serializing plain strings and integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Fragment parameters of the OAuth redirect, posted back by the callback page.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<String>,
}

/// Expiry instant for a token that lives `lifetime_secs` from `now`.
///
/// Non-positive lifetimes and lifetimes beyond a year are rejected.
pub fn expiry_after(now: i64, lifetime_secs: i64) -> Option<i64> {
    if lifetime_secs <= 0 || lifetime_secs > MAX_TOKEN_LIFETIME_SECS {
        return None;
    }
    now.checked_add(lifetime_secs)
}

/// Builds a session from the redirect parameters.
///
/// When `expires_in` is missing or unusable, the access token's own `exp`
/// claim decides the expiry.
pub fn session_from_callback(params: &CallbackParams, now: i64) -> Option<ConsoleSession> {
    let access_token = params.access_token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let refresh_token = params.refresh_token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;

    let expires_at = params
        .expires_in
        .as_deref()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|secs| {
            secs.is_finite() && *secs > 0.0 && *secs <= MAX_TOKEN_LIFETIME_SECS as f64
        })
        .and_then(|secs| expiry_after(now, secs as i64))
        .or_else(|| decode_jwt_expiry(access_token))?;

    Some(ConsoleSession {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at,
        email: None,
    })
}

/// Reads the `exp` claim of a JWT without verifying its signature.
pub fn decode_jwt_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let payload = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    claims.get("exp")?.as_i64()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSync {
    /// Nothing changed; the cookie can stay as it is.
    Current(ConsoleSession),
    /// Tokens were refreshed or the email was resolved; rewrite the cookie.
    Updated(ConsoleSession),
    /// The refresh failed; drop the cookie.
    Ended,
}

/// Refreshes an expired session and resolves the signed-in email.
///
/// A known email survives a refresh. Without an anon project nothing can be
/// refreshed, so an expired session simply ends.
pub async fn sync_session(
    backend: &BackendClient,
    project: Option<Project<'_>>,
    session: ConsoleSession,
    now: i64,
) -> SessionSync {
    let mut session = session;
    let mut changed = false;

    if session.is_expired(now) {
        let Some(project) = project else {
            return SessionSync::Ended;
        };
        match backend.refresh_session(project, &session.refresh_token).await {
            Ok(grant) => {
                let Some(expires_at) = expiry_after(now, grant.expires_in)
                    .or_else(|| decode_jwt_expiry(&grant.access_token))
                else {
                    warn!(expires_in = grant.expires_in, "refresh grant carried no usable expiry");
                    return SessionSync::Ended;
                };
                session = ConsoleSession {
                    access_token: grant.access_token,
                    refresh_token: grant.refresh_token,
                    expires_at,
                    email: session.email,
                };
                changed = true;
            }
            Err(err) => {
                warn!(?err, "console session refresh failed");
                return SessionSync::Ended;
            }
        }
    }

    if session.email.is_none() {
        if let Some(project) = project {
            match backend.fetch_user(project, &session.access_token).await {
                Ok(user) => {
                    if let Some(email) = user.normalized_email() {
                        session.email = Some(email);
                        changed = true;
                    }
                }
                Err(err) => warn!(?err, "failed to resolve console session email"),
            }
        }
    }

    if changed {
        SessionSync::Updated(session)
    } else {
        SessionSync::Current(session)
    }
}

pub fn read_session(jar: &CookieJar) -> Option<ConsoleSession> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| ConsoleSession::decode(cookie.value()))
}

pub fn session_cookie(session: &ConsoleSession, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, session.encode());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));
    cookie
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    removal
}

pub async fn sign_in(State(state): State<AppState>) -> Redirect {
    let settings = state.settings();
    let Some(project) = settings.anon_project() else {
        warn!("sign-in requested without SUPABASE_URL / SUPABASE_ANON_KEY");
        return Redirect::to("/system?error=config");
    };

    let redirect_to = format!("{}/system/callback", settings.site_url);
    match authorize_url(project, OAUTH_PROVIDER, &redirect_to) {
        Ok(url) => Redirect::to(url.as_str()),
        Err(err) => {
            error!(?err, "failed to build authorize URL");
            Redirect::to("/system?error=config")
        }
    }
}

const CALLBACK_SCRIPT: &str = r#"const params = new URLSearchParams(window.location.hash.replace(/^#/, ''));
const form = document.getElementById('session-form');
const statusBox = document.getElementById('callback-status');
if (params.get('access_token') && params.get('refresh_token')) {
    form.elements.access_token.value = params.get('access_token');
    form.elements.refresh_token.value = params.get('refresh_token');
    form.elements.expires_in.value = params.get('expires_in') || '';
    window.history.replaceState(null, '', window.location.pathname);
    form.submit();
} else {
    const reason = params.get('error_description') || 'No session was returned by the sign-in provider.';
    statusBox.textContent = reason;
    statusBox.className = 'flash error';
}"#;

pub async fn callback_page() -> Html<String> {
    let body = r#"        <section class="panel">
            <p id="callback-status" class="note">Completing sign-in…</p>
            <form id="session-form" method="post" action="/system/session">
                <input type="hidden" name="access_token">
                <input type="hidden" name="refresh_token">
                <input type="hidden" name="expires_in">
            </form>
            <p><a href="/system">Back to the console</a></p>
        </section>"#;

    Html(render_page(
        PageLayout::new("Signing in | HAVEN Equities", "Signing in", body)
            .with_script(CALLBACK_SCRIPT)
            .not_indexable(),
    ))
}

/// True when the browser marks the request as coming from another site.
///
/// `Sec-Fetch-Site` wins when present; otherwise a present `Origin` must match
/// the request's `Host` or the configured site URL.
/// True when the browser says the form was posted from another site.
pub fn is_cross_site(headers: &HeaderMap, site_url: &str) -> bool {
    if let Some(fetch_site) = headers.get("sec-fetch-site") {
        return !matches!(fetch_site.to_str(), Ok("same-origin" | "none"));
    }

    let Some(origin) = headers.get(header::ORIGIN) else {
        return false;
    };
    let Ok(origin) = origin.to_str() else {
        return true;
    };
    let origin = origin.trim_end_matches('/');
    if origin == site_url {
        return false;
    }
    let origin_host = origin.split_once("://").map(|(_, host)| host);
    let host = headers.get(header::HOST).and_then(|value| value.to_str().ok());
    origin_host.is_none() || origin_host != host
}

pub async fn store_session(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(params): Form<CallbackParams>,
) -> (CookieJar, Redirect) {
    if is_cross_site(&headers, &state.settings().site_url) {
        warn!("rejecting cross-site session callback");
        return (jar, Redirect::to("/system?error=session"));
    }

    let Some(session) = session_from_callback(&params, Utc::now().timestamp()) else {
        warn!("discarding unusable sign-in callback");
        return (jar, Redirect::to("/system?error=session"));
    };

    info!("console session established");
    let jar = jar.add(session_cookie(&session, state.settings().secure_cookies()));
    (jar, Redirect::to("/system"))
}

pub async fn sign_out(jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(removal_cookie());
    (jar, Redirect::to("/system?status=signed_out"))
}
