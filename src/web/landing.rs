use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Html,
};
use serde::Deserialize;

use crate::{
    research::{self, ALL_SECTORS, ResearchReport, Sector},
    web::{
        AppState,
        templates::{PageLayout, escape_html, render_not_found, render_page},
    },
};

const RESEARCH_STYLES: &str = r#"
        .filters { display: grid; grid-template-columns: 1fr 2fr auto; gap: 1rem; align-items: end; margin-bottom: 2rem; }
        .report-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 1.25rem; }
        .report-card { display: block; color: inherit; text-decoration: none; }
        .report-card:hover { border-color: #94a3b8; }
        .report-meta { color: #64748b; font-size: 0.85rem; text-transform: uppercase; letter-spacing: 0.04em; }
        .report-card h3 { margin: 0.5rem 0; font-family: "Playfair Display", Georgia, serif; }
        .pill { display: inline-block; padding: 0.2rem 0.65rem; border-radius: 999px; background: #e2e8f0; font-size: 0.8rem; font-weight: 600; }
        .detail dl { display: grid; grid-template-columns: max-content 1fr; gap: 0.4rem 1.5rem; }
        .detail dt { font-weight: 600; color: #475569; }
        .detail dd { margin: 0; }
        @media (max-width: 768px) { .filters { grid-template-columns: 1fr; } }
"#;

pub async fn landing_page(State(state): State<AppState>) -> Html<String> {
    let reports = research::filter_reports(
        research::list_reports(state.backend(), state.settings()).await,
        None,
        None,
    );

    let latest = reports
        .iter()
        .take(3)
        .map(render_report_card)
        .collect::<String>();
    let latest = if latest.is_empty() {
        r#"<p class="note">No research has been published yet.</p>"#.to_string()
    } else {
        format!(r#"<div class="report-grid">{latest}</div>"#)
    };

    let body = format!(
        r#"        <section class="panel">
            <h2>What we do</h2>
            <p class="note">Student analysts publish equity research on a fixed cycle, using founder-owned capital as an educational case study. Every report lays out a thesis, its key risks and the sources behind it.</p>
            <p><a class="button" href="/research">Browse research</a></p>
        </section>
        <section>
            <h2>Latest research</h2>
            {latest}
        </section>"#
    );

    Html(render_page(
        PageLayout::new(
            "HAVEN Equities | Student-Led Equity Research Collective",
            "Student-led equity research",
            body,
        )
        .with_intro("A student-led equity research collective using founder-owned capital as an educational case study.")
        .with_styles(RESEARCH_STYLES),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResearchQuery {
    pub sector: Option<String>,
    pub q: Option<String>,
}

pub async fn research_index(
    State(state): State<AppState>,
    Query(params): Query<ResearchQuery>,
) -> Html<String> {
    let reports = research::filter_reports(
        research::list_reports(state.backend(), state.settings()).await,
        params.sector.as_deref(),
        params.q.as_deref(),
    );

    Html(render_research_index(&reports, &params))
}

fn render_research_index(reports: &[ResearchReport], params: &ResearchQuery) -> String {
    let selected = params.sector.as_deref().unwrap_or(ALL_SECTORS);
    let sector_options = std::iter::once(ALL_SECTORS)
        .chain(Sector::ALL.iter().map(Sector::as_str))
        .map(|sector| {
            let marker = if sector == selected { " selected" } else { "" };
            format!(
                r#"<option value="{value}"{marker}>{value}</option>"#,
                value = escape_html(sector),
            )
        })
        .collect::<String>();

    let cards = reports.iter().map(render_report_card).collect::<String>();
    let results = if cards.is_empty() {
        r#"<p class="note">No reports match these filters.</p>"#.to_string()
    } else {
        format!(r#"<div class="report-grid">{cards}</div>"#)
    };

    let body = format!(
        r#"        <form class="filters" method="get" action="/research">
            <div>
                <label for="sector">Sector</label>
                <select id="sector" name="sector">{sector_options}</select>
            </div>
            <div>
                <label for="q">Search</label>
                <input id="q" name="q" value="{query}" placeholder="Company, ticker or analyst">
            </div>
            <button type="submit">Filter</button>
        </form>
        {results}"#,
        query = escape_html(params.q.as_deref().unwrap_or_default()),
    );

    render_page(
        PageLayout::new("Research | HAVEN Equities", "Research", body)
            .with_intro("Published reports from every research cycle.")
            .with_styles(RESEARCH_STYLES),
    )
}

fn render_report_card(report: &ResearchReport) -> String {
    format!(
        r#"<a class="panel report-card" href="/research/{slug}">
                <span class="report-meta">{ticker} · Cycle {cycle} · {date}</span>
                <h3>{company}</h3>
                <span class="pill">{sector}</span>
                <p class="note">{summary}</p>
            </a>"#,
        slug = escape_html(&report.slug),
        ticker = escape_html(&report.ticker),
        cycle = report.cycle,
        date = escape_html(&report.publish_date),
        company = escape_html(&report.company),
        sector = escape_html(report.sector.as_str()),
        summary = escape_html(&report.summary),
    )
}

pub async fn report_detail(
    State(state): State<AppState>,
    AxumPath(slug): AxumPath<String>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let Some(report) = research::find_report(state.backend(), state.settings(), &slug).await else {
        return Err((
            StatusCode::NOT_FOUND,
            Html(render_not_found("We could not find that report.")),
        ));
    };

    Ok(Html(render_report_detail(&report)))
}

fn render_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!(r#"<p class="note">{}</p>"#, escape_html(empty));
    }
    let items = items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect::<String>();
    format!("<ul>{items}</ul>")
}

fn render_report_detail(report: &ResearchReport) -> String {
    let download = if report.pdf_url.is_some() {
        format!(
            r#"<p><a class="button" href="/api/research/report-pdf/{}">Download PDF</a></p>"#,
            escape_html(&report.slug)
        )
    } else {
        r#"<p class="note">The PDF for this report is not available yet.</p>"#.to_string()
    };

    let body = format!(
        r#"        <section class="panel detail">
            <dl>
                <dt>Ticker</dt><dd>{ticker}</dd>
                <dt>Sector</dt><dd>{sector}</dd>
                <dt>Cycle</dt><dd>{cycle}</dd>
                <dt>Analyst</dt><dd>{analyst}</dd>
                <dt>Published</dt><dd>{date}</dd>
            </dl>
            {download}
        </section>
        <section class="panel">
            <h2>Summary</h2>
            <p>{summary}</p>
            <h2>Thesis</h2>
            <p>{thesis}</p>
            <h2>Key risks</h2>
            {risks}
            <h2>Sources</h2>
            {sources}
        </section>"#,
        ticker = escape_html(&report.ticker),
        sector = escape_html(report.sector.as_str()),
        cycle = report.cycle,
        analyst = escape_html(&report.analyst),
        date = escape_html(&report.publish_date),
        summary = escape_html(&report.summary),
        thesis = escape_html(&report.thesis),
        risks = render_list(&report.key_risks, "No key risks listed."),
        sources = render_list(&report.sources, "No sources listed."),
    );

    let title = format!("{} | HAVEN Equities", report.company);
    render_page(
        PageLayout::new(&title, &report.company, body)
            .with_intro("For educational purposes only. Not investment advice.")
            .with_styles(RESEARCH_STYLES),
    )
}
