use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_URL_TTL_SECS: u64 = 300;
const DEFAULT_MAX_UPLOAD_MB: usize = 25;

/// Runtime configuration, read once from the environment at startup.
///
/// Backend credentials are optional here: a missing value never stops the
/// server, the endpoints that need it answer with a 500 instead.
#[derive(Clone, Debug)]
pub struct Settings {
    pub port: u16,
    pub supabase_url: Option<String>,
    pub service_role_key: Option<String>,
    pub anon_key: Option<String>,
    pub reports_bucket: Option<String>,
    pub reports_bucket_public: bool,
    pub report_url_ttl_secs: u64,
    pub allowed_emails: AllowList,
    pub site_url: String,
    pub max_upload_bytes: usize,
}

/// Backend project coordinates: base URL plus the key sent as `apikey`.
#[derive(Clone, Copy, Debug)]
pub struct Project<'a> {
    pub url: &'a str,
    pub api_key: &'a str,
}

/// Everything the report upload endpoint needs, all present.
#[derive(Clone, Copy, Debug)]
pub struct UploadConfig<'a> {
    pub project: Project<'a>,
    pub bucket: &'a str,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|key| get(key));

        let port = parse_or(&get, "PORT", DEFAULT_PORT);
        let supabase_url = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"])
            .map(|url| url.trim_end_matches('/').to_string());
        let anon_key = first(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]);
        let allowed_emails = AllowList::parse(
            first(&["SYSTEM_ALLOWED_EMAILS", "SYSTEM_GOOGLE_ALLOWLIST"])
                .as_deref()
                .unwrap_or_default(),
        );
        let site_url = get("SITE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{port}"));
        let max_upload_mb: usize = parse_or(&get, "MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB);

        if supabase_url.is_none() {
            warn!("SUPABASE_URL not set, backend-backed endpoints will answer 500");
        }
        if allowed_emails.is_empty() {
            info!("upload allow-list is empty, any signed-in user may upload");
        }

        Self {
            port,
            supabase_url,
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            anon_key,
            reports_bucket: get("REPORTS_BUCKET"),
            reports_bucket_public: parse_flag(get("REPORTS_BUCKET_PUBLIC").as_deref(), true),
            report_url_ttl_secs: parse_or(&get, "REPORT_URL_TTL_SECS", DEFAULT_URL_TTL_SECS),
            allowed_emails,
            site_url,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        }
    }

    /// Project authenticated with the service role key.
    pub fn service_project(&self) -> Option<Project<'_>> {
        Some(Project {
            url: self.supabase_url.as_deref()?,
            api_key: self.service_role_key.as_deref()?,
        })
    }

    /// Project authenticated with the public anon key (console session flow).
    pub fn anon_project(&self) -> Option<Project<'_>> {
        Some(Project {
            url: self.supabase_url.as_deref()?,
            api_key: self.anon_key.as_deref()?,
        })
    }

    /// Project used for public reads: service key when present, anon key otherwise.
    pub fn read_project(&self) -> Option<Project<'_>> {
        self.service_project().or_else(|| self.anon_project())
    }

    /// Resolves the upload configuration, or an error naming every missing variable.
    pub fn upload_config(&self) -> Result<UploadConfig<'_>, String> {
        let mut missing = Vec::new();
        if self.supabase_url.is_none() {
            missing.push("SUPABASE_URL");
        }
        if self.service_role_key.is_none() {
            missing.push("SUPABASE_SERVICE_ROLE_KEY");
        }
        if self.reports_bucket.is_none() {
            missing.push("REPORTS_BUCKET");
        }

        match (self.service_project(), self.reports_bucket.as_deref()) {
            (Some(project), Some(bucket)) if missing.is_empty() => {
                Ok(UploadConfig { project, bucket })
            }
            _ => Err(format!(
                "Missing required env var(s): {}",
                missing.join(", ")
            )),
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.site_url.starts_with("https://")
    }
}

/// Lower-cased set of email addresses allowed to publish reports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowList(Vec<String>);

impl AllowList {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An empty list admits everyone.
    pub fn permits(&self, email: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|allowed| allowed == email)
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> T
where
    G: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|err| {
            warn!("Invalid {key} value `{raw}`: {err}, using default {default}");
            default
        }),
        None => default,
    }
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
