use chrono::NaiveDate;
use thiserror::Error;

use super::{ReportRow, Sector};

/// Validation failures for the report upload form. The display text is what
/// the API returns to the console.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Missing required fields.")]
    MissingFields,

    #[error("Slug may only contain lower-case letters, digits and hyphens.")]
    InvalidSlug,

    #[error("Unknown sector `{0}`.")]
    UnknownSector(String),

    #[error("Cycle must be a positive whole number.")]
    InvalidCycle,

    #[error("Publish date must use the YYYY-MM-DD format.")]
    InvalidPublishDate,
}

/// Validated metadata for a report about to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    pub slug: String,
    pub company: String,
    pub ticker: String,
    pub sector: Sector,
    pub cycle: u32,
    pub analyst: String,
    pub publish_date: NaiveDate,
    pub summary: String,
    pub thesis: String,
    pub key_risks: Vec<String>,
    pub sources: Vec<String>,
}

impl ReportDraft {
    /// Row to insert once the PDF has been stored at `pdf_url`.
    pub fn into_row(self, pdf_url: String) -> ReportRow {
        ReportRow {
            slug: self.slug,
            company: self.company,
            ticker: self.ticker,
            sector: self.sector.as_str().to_string(),
            cycle: self.cycle,
            analyst: self.analyst,
            publish_date: self.publish_date.format("%Y-%m-%d").to_string(),
            summary: self.summary,
            thesis: self.thesis,
            key_risks: non_empty(self.key_risks),
            sources: non_empty(self.sources),
            pdf_url: Some(pdf_url),
        }
    }
}

/// Splits a free-text list on line breaks, `|` or `,`.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(['\n', '|', ','])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates the upload form's text fields.
///
/// `field` returns the raw value of a named form field, if it was sent.
pub fn parse_report_fields<'a, F>(field: F) -> Result<ReportDraft, FormError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let required = |name: &str| {
        field(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let (
        Some(slug),
        Some(company),
        Some(ticker),
        Some(sector),
        Some(cycle),
        Some(analyst),
        Some(publish_date),
        Some(summary),
        Some(thesis),
    ) = (
        required("slug"),
        required("company"),
        required("ticker"),
        required("sector"),
        required("cycle"),
        required("analyst"),
        required("publish_date"),
        required("summary"),
        required("thesis"),
    )
    else {
        return Err(FormError::MissingFields);
    };

    if !is_valid_slug(slug) {
        return Err(FormError::InvalidSlug);
    }
    let sector =
        Sector::parse_known(sector).ok_or_else(|| FormError::UnknownSector(sector.to_string()))?;
    let cycle = cycle
        .parse::<u32>()
        .ok()
        .filter(|cycle| *cycle > 0)
        .ok_or(FormError::InvalidCycle)?;
    let publish_date = NaiveDate::parse_from_str(publish_date, "%Y-%m-%d")
        .map_err(|_| FormError::InvalidPublishDate)?;

    Ok(ReportDraft {
        slug: slug.to_string(),
        company: company.to_string(),
        ticker: ticker.to_string(),
        sector,
        cycle,
        analyst: analyst.to_string(),
        publish_date,
        summary: summary.to_string(),
        thesis: thesis.to_string(),
        key_risks: split_list(field("key_risks").unwrap_or_default()),
        sources: split_list(field("sources").unwrap_or_default()),
    })
}

// Slugs become storage path segments and URL segments.
fn is_valid_slug(slug: &str) -> bool {
    !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    if items.is_empty() { None } else { Some(items) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete_form() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("slug", "acme-q4-2025"),
            ("company", " Acme Corp "),
            ("ticker", "ACME"),
            ("sector", "Industrials"),
            ("cycle", "3"),
            ("analyst", "Jane Doe"),
            ("publish_date", "2025-11-02"),
            ("summary", "Summary."),
            ("thesis", "Thesis."),
            ("key_risks", "Supply chain\r\nFX | Rates"),
            ("sources", "10-K, Earnings call"),
        ])
    }

    fn parse(form: &HashMap<&'static str, &'static str>) -> Result<ReportDraft, FormError> {
        parse_report_fields(|name| form.get(name).copied())
    }

    #[test]
    fn split_list_accepts_all_separators() {
        assert_eq!(
            split_list("a\r\nb|c, d\n\n ,e"),
            vec!["a", "b", "c", "d", "e"]
        );
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn parses_complete_form() {
        let draft = parse(&complete_form()).expect("valid form");
        assert_eq!(draft.company, "Acme Corp");
        assert_eq!(draft.sector, Sector::Industrials);
        assert_eq!(draft.cycle, 3);
        assert_eq!(draft.key_risks, vec!["Supply chain", "FX", "Rates"]);
        assert_eq!(draft.sources, vec!["10-K", "Earnings call"]);
    }

    #[test]
    fn blank_required_field_is_missing() {
        for name in ["slug", "company", "ticker", "sector", "cycle", "analyst", "publish_date", "summary", "thesis"] {
            let mut form = complete_form();
            form.insert(name, "   ");
            assert_eq!(parse(&form), Err(FormError::MissingFields), "field {name}");
            form.remove(name);
            assert_eq!(parse(&form), Err(FormError::MissingFields), "field {name}");
        }
    }

    #[test]
    fn optional_lists_may_be_absent() {
        let mut form = complete_form();
        form.remove("key_risks");
        form.remove("sources");
        let draft = parse(&form).expect("valid form");
        let row = draft.into_row("https://x.test/a.pdf".to_string());
        assert_eq!(row.key_risks, None);
        assert_eq!(row.sources, None);
        assert_eq!(row.publish_date, "2025-11-02");
    }

    #[test]
    fn rejects_malformed_values() {
        let cases = [
            ("slug", "../etc", FormError::InvalidSlug),
            ("slug", "Acme", FormError::InvalidSlug),
            ("sector", "All Sectors", FormError::UnknownSector("All Sectors".to_string())),
            ("cycle", "0", FormError::InvalidCycle),
            ("cycle", "two", FormError::InvalidCycle),
            ("publish_date", "11/02/2025", FormError::InvalidPublishDate),
        ];
        for (name, value, expected) in cases {
            let mut form = complete_form();
            form.insert(name, value);
            assert_eq!(parse(&form), Err(expected));
        }
    }
}
