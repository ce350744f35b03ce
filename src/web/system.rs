use axum::{
    extract::{Query, State},
    response::Html,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    research::Sector,
    web::{
        AppState,
        session::{self, ConsoleSession, SessionSync},
        templates::{PageLayout, escape_html, render_page},
    },
};

const CONSOLE_STYLES: &str = r#"
        .console-grid { display: grid; grid-template-columns: repeat(2, minmax(0, 1fr)); gap: 1rem 1.5rem; }
        .console-grid .wide { grid-column: 1 / -1; }
        .session-bar { display: flex; justify-content: space-between; align-items: center; gap: 1rem; flex-wrap: wrap; }
        .session-bar form { margin: 0; }
        #upload-result { margin-top: 1rem; }
        @media (max-width: 768px) { .console-grid { grid-template-columns: 1fr; } }
"#;

const UPLOAD_SCRIPT: &str = r#"const form = document.getElementById('upload-form');
const result = document.getElementById('upload-result');
if (form) {
    form.addEventListener('submit', async (event) => {
        event.preventDefault();
        const button = form.querySelector('button[type="submit"]');
        button.disabled = true;
        result.className = 'flash';
        result.textContent = 'Uploading…';
        try {
            const response = await fetch('/api/system/reports', {
                method: 'POST',
                body: new FormData(form),
                credentials: 'same-origin',
            });
            const payload = await response.json().catch(() => ({}));
            if (!response.ok) {
                throw new Error(payload.error || `Upload failed (${response.status}).`);
            }
            result.className = 'flash success';
            result.innerHTML = '';
            const link = document.createElement('a');
            link.href = payload.pdfUrl;
            link.textContent = payload.pdfUrl;
            result.append('Published. PDF stored at ', link);
            form.reset();
        } catch (err) {
            result.className = 'flash error';
            result.textContent = err.message;
        } finally {
            button.disabled = false;
        }
    });
}"#;

#[derive(Debug, Default, Deserialize)]
pub struct ConsoleQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

fn flash_message(query: &ConsoleQuery) -> Option<(&'static str, &'static str)> {
    if let Some(error) = query.error.as_deref() {
        return Some(match error {
            "config" => ("error", "Sign-in is not configured on this deployment."),
            "session" => ("error", "Sign-in did not complete. Please try again."),
            _ => ("error", "Something went wrong. Please try again."),
        });
    }
    match query.status.as_deref() {
        Some("signed_out") => Some(("success", "You have been signed out.")),
        _ => None,
    }
}

/// `GET /system`: the upload console.
pub async fn console_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ConsoleQuery>,
) -> (CookieJar, Html<String>) {
    let settings = state.settings();
    let mut jar = jar;

    let session = match session::read_session(&jar) {
        Some(current) => match session::sync_session(
            state.backend(),
            settings.anon_project(),
            current,
            Utc::now().timestamp(),
        )
        .await
        {
            SessionSync::Current(current) => Some(current),
            SessionSync::Updated(updated) => {
                jar = jar.add(session::session_cookie(&updated, settings.secure_cookies()));
                Some(updated)
            }
            SessionSync::Ended => {
                jar = jar.remove(session::removal_cookie());
                None
            }
        },
        None => None,
    };

    let allowed = session
        .as_ref()
        .and_then(|s| s.email.as_deref())
        .map(|email| settings.allowed_emails.permits(email));

    let html = render_console(session.as_ref(), allowed, &query);
    (jar, Html(html))
}

fn render_console(
    session: Option<&ConsoleSession>,
    allowed: Option<bool>,
    query: &ConsoleQuery,
) -> String {
    let flash = flash_message(query)
        .map(|(kind, message)| format!(r#"<div class="flash {kind}">{message}</div>"#))
        .unwrap_or_default();

    let body = match session {
        None => format!(
            r#"        {flash}
        <section class="panel">
            <h2>Sign in</h2>
            <p class="note">The console is limited to HAVEN analysts. Sign in with your Google account to publish research.</p>
            <p><a class="button" href="/system/sign-in">Sign in with Google</a></p>
        </section>"#
        ),
        Some(session) => {
            let email = session.email.as_deref().unwrap_or("unknown account");
            let notice = match allowed {
                Some(false) => r#"<div class="flash error">This account is not on the upload allow-list. Uploads will be refused.</div>"#,
                _ => "",
            };
            format!(
                r#"        {flash}
        <section class="panel session-bar">
            <span>Signed in as <strong>{email}</strong></span>
            <form method="post" action="/system/sign-out">
                <button type="submit" class="secondary">Sign out</button>
            </form>
        </section>
        {notice}
        <section class="panel">
            <h2>Publish a report</h2>
            {form}
            <div id="upload-result" role="status"></div>
        </section>"#,
                email = escape_html(email),
                form = render_upload_form(),
            )
        }
    };

    let mut layout = PageLayout::new("System | HAVEN Equities", "Research console", body)
        .with_intro("Publish research reports to the public catalogue.")
        .with_styles(CONSOLE_STYLES)
        .not_indexable();
    if session.is_some() {
        layout = layout.with_script(UPLOAD_SCRIPT);
    }
    render_page(layout)
}

fn render_upload_form() -> String {
    let sector_options = Sector::ALL
        .iter()
        .map(|sector| {
            format!(
                r#"<option value="{value}">{value}</option>"#,
                value = escape_html(sector.as_str())
            )
        })
        .collect::<String>();

    format!(
        r#"<form id="upload-form" class="console-grid" enctype="multipart/form-data">
                <div><label for="slug">Slug</label><input id="slug" name="slug" required pattern="[a-z0-9]+(-[a-z0-9]+)*" placeholder="acme-cycle-3"></div>
                <div><label for="company">Company</label><input id="company" name="company" required></div>
                <div><label for="ticker">Ticker</label><input id="ticker" name="ticker" required></div>
                <div><label for="sector">Sector</label><select id="sector" name="sector" required>{sector_options}</select></div>
                <div><label for="cycle">Cycle</label><input id="cycle" name="cycle" type="number" min="1" required></div>
                <div><label for="analyst">Analyst</label><input id="analyst" name="analyst" required></div>
                <div><label for="publish_date">Publish date</label><input id="publish_date" name="publish_date" type="date" required></div>
                <div><label for="pdf">PDF</label><input id="pdf" name="pdf" type="file" accept="application/pdf,.pdf" required></div>
                <div class="wide"><label for="summary">Summary</label><textarea id="summary" name="summary" rows="3" required></textarea></div>
                <div class="wide"><label for="thesis">Thesis</label><textarea id="thesis" name="thesis" rows="5" required></textarea></div>
                <div class="wide"><label for="key_risks">Key risks (one per line)</label><textarea id="key_risks" name="key_risks" rows="4"></textarea></div>
                <div class="wide"><label for="sources">Sources (one per line)</label><textarea id="sources" name="sources" rows="4"></textarea></div>
                <div class="wide"><button type="submit">Publish report</button></div>
            </form>"#
    )
}
