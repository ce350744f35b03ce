//! Research reports: the domain model, the fixed sector list and read access
//! to the `research_reports` table.

pub mod form;

use std::borrow::Cow;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::{backend::BackendClient, config::Settings};

pub use form::parse_report_fields;

pub const REPORTS_TABLE: &str = "research_reports";
pub const ALL_SECTORS: &str = "All Sectors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sector {
    Technology,
    Healthcare,
    Financials,
    ConsumerDiscretionary,
    ConsumerStaples,
    Industrials,
    Energy,
    Materials,
    Utilities,
    RealEstate,
    CommunicationServices,
    /// Stored rows may carry a sector this build does not know about.
    Other(Cow<'static, str>),
}

impl Sector {
    pub const ALL: [Sector; 11] = [
        Sector::Technology,
        Sector::Healthcare,
        Sector::Financials,
        Sector::ConsumerDiscretionary,
        Sector::ConsumerStaples,
        Sector::Industrials,
        Sector::Energy,
        Sector::Materials,
        Sector::Utilities,
        Sector::RealEstate,
        Sector::CommunicationServices,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Sector::Technology => "Technology",
            Sector::Healthcare => "Healthcare",
            Sector::Financials => "Financials",
            Sector::ConsumerDiscretionary => "Consumer Discretionary",
            Sector::ConsumerStaples => "Consumer Staples",
            Sector::Industrials => "Industrials",
            Sector::Energy => "Energy",
            Sector::Materials => "Materials",
            Sector::Utilities => "Utilities",
            Sector::RealEstate => "Real Estate",
            Sector::CommunicationServices => "Communication Services",
            Sector::Other(value) => value.as_ref(),
        }
    }

    /// Strict lookup used when accepting new reports.
    pub fn parse_known(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sector| sector.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Lenient lookup used when reading stored rows.
    pub fn from_stored(value: &str) -> Self {
        Self::parse_known(value).unwrap_or_else(|| Sector::Other(Cow::Owned(value.to_string())))
    }
}

impl Serialize for Sector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A published research report, as served by this site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub slug: String,
    pub company: String,
    pub ticker: String,
    pub sector: Sector,
    pub cycle: u32,
    pub analyst: String,
    pub publish_date: String,
    pub summary: String,
    pub thesis: String,
    pub key_risks: Vec<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl ResearchReport {
    fn published_on(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.publish_date, "%Y-%m-%d").ok()
    }
}

/// Row shape of the `research_reports` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub slug: String,
    pub company: String,
    pub ticker: String,
    pub sector: String,
    pub cycle: u32,
    pub analyst: String,
    pub publish_date: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub thesis: String,
    #[serde(default)]
    pub key_risks: Option<Vec<String>>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl From<ReportRow> for ResearchReport {
    fn from(row: ReportRow) -> Self {
        Self {
            sector: Sector::from_stored(&row.sector),
            slug: row.slug,
            company: row.company,
            ticker: row.ticker,
            cycle: row.cycle,
            analyst: row.analyst,
            publish_date: row.publish_date,
            summary: row.summary,
            thesis: row.thesis,
            key_risks: row.key_risks.unwrap_or_default(),
            sources: row.sources.unwrap_or_default(),
            pdf_url: row.pdf_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

/// Built-in catalogue served when the data API is unavailable.
pub fn sample_reports() -> Vec<ResearchReport> {
    vec![ResearchReport {
        slug: "sample-report-technology-cycle-1".to_string(),
        company: "Sample Company".to_string(),
        ticker: "SMPL".to_string(),
        sector: Sector::Technology,
        cycle: 1,
        analyst: "Research Team".to_string(),
        publish_date: "2026-01-16".to_string(),
        summary: "This is a sample report demonstrating the report format and structure for educational purposes.".to_string(),
        thesis: "This sample report demonstrates how research reports are structured within HAVEN Equities. It showcases the format, metadata fields, and educational framing used across all published research.".to_string(),
        key_risks: vec![
            "This is a sample risk factor for demonstration purposes".to_string(),
            "Reports would include company-specific and market risks".to_string(),
            "All risks are presented for educational context only".to_string(),
        ],
        sources: vec![
            "Company SEC Filings".to_string(),
            "Industry Reports".to_string(),
            "Management Presentations".to_string(),
        ],
        pdf_url: None,
    }]
}

/// Applies the listing filters and orders reports newest first.
///
/// `sector` is ignored when absent or [`ALL_SECTORS`]; `query` matches company,
/// ticker or analyst case-insensitively.
pub fn filter_reports(
    mut reports: Vec<ResearchReport>,
    sector: Option<&str>,
    query: Option<&str>,
) -> Vec<ResearchReport> {
    if let Some(sector) = sector.map(str::trim).filter(|s| !s.is_empty() && *s != ALL_SECTORS) {
        reports.retain(|report| report.sector.as_str() == sector);
    }

    if let Some(query) = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty()) {
        reports.retain(|report| {
            report.company.to_lowercase().contains(&query)
                || report.ticker.to_lowercase().contains(&query)
                || report.analyst.to_lowercase().contains(&query)
        });
    }

    reports.sort_by(|a, b| b.published_on().cmp(&a.published_on()));
    reports
}

/// Every published report, falling back to the sample catalogue.
pub async fn list_reports(backend: &BackendClient, settings: &Settings) -> Vec<ResearchReport> {
    let Some(project) = settings.read_project() else {
        return sample_reports();
    };

    let query = [
        ("select", "*".to_string()),
        ("order", "publish_date.desc".to_string()),
    ];
    match backend
        .select_rows::<ReportRow>(project, REPORTS_TABLE, &query)
        .await
    {
        Ok(rows) => rows.into_iter().map(ResearchReport::from).collect(),
        Err(err) => {
            warn!(?err, "failed to list research reports, serving sample catalogue");
            sample_reports()
        }
    }
}

/// Looks a report up by slug in the data API.
///
/// The sample catalogue answers only when the data API is unconfigured or
/// unreachable; a reachable API without the slug means the report does not
/// exist.
pub async fn find_report(
    backend: &BackendClient,
    settings: &Settings,
    slug: &str,
) -> Option<ResearchReport> {
    let Some(project) = settings.read_project() else {
        return find_sample(slug);
    };

    let query = [
        ("select", "*".to_string()),
        ("slug", format!("eq.{slug}")),
        ("limit", "1".to_string()),
    ];
    match backend
        .select_rows::<ReportRow>(project, REPORTS_TABLE, &query)
        .await
    {
        Ok(rows) => rows.into_iter().next().map(ResearchReport::from),
        Err(err) => {
            warn!(?err, %slug, "failed to load research report, checking sample catalogue");
            find_sample(slug)
        }
    }
}

fn find_sample(slug: &str) -> Option<ResearchReport> {
    sample_reports().into_iter().find(|report| report.slug == slug)
}
