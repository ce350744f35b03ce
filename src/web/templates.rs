use std::borrow::Cow;

use chrono::{Datelike, Utc};

pub const SITE_NAME: &str = "HAVEN Equities";

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Inter", "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; min-height: 100vh; display: flex; flex-direction: column; }
        header { background: #ffffff; padding: 1.25rem 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; max-width: 1040px; margin: 0 auto; }
        .brand { font-family: "Playfair Display", Georgia, serif; font-size: 1.4rem; font-weight: 600; color: #0f172a; text-decoration: none; }
        nav a { color: #334155; text-decoration: none; font-weight: 600; margin-left: 1.25rem; }
        nav a:hover { color: #1d4ed8; }
        .hero { background: #f1f5f9; border-bottom: 1px solid #e2e8f0; padding: 3rem 1.5rem; text-align: center; }
        .hero h1 { font-family: "Playfair Display", Georgia, serif; margin: 0; font-size: clamp(1.8rem, 3vw, 2.6rem); }
        .hero p { margin: 0.75rem auto 0; color: #475569; max-width: 640px; }
        main { flex: 1; padding: 2rem 1.5rem; max-width: 1040px; margin: 0 auto; width: 100%; box-sizing: border-box; }
        section { margin-bottom: 2.5rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.06); }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-bottom: 0.4rem; font-weight: 600; }
        input, select, textarea { width: 100%; padding: 0.7rem; border-radius: 8px; border: 1px solid #cbd5e1; background: #f8fafc; color: #0f172a; box-sizing: border-box; font: inherit; }
        button, .button { display: inline-block; padding: 0.75rem 1.2rem; border: none; border-radius: 8px; background: #0f172a; color: #ffffff; font-weight: 600; cursor: pointer; text-decoration: none; }
        button.secondary { background: #ffffff; color: #0f172a; border: 1px solid #cbd5e1; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .flash { padding: 0.9rem 1.1rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .app-footer { padding: 2rem 1.5rem; text-align: center; font-size: 0.85rem; color: #94a3b8; border-top: 1px solid #e2e8f0; }
        @media (max-width: 768px) {
            .header-bar { flex-direction: column; align-items: flex-start; }
            nav a { margin: 0 1rem 0 0; }
            main { padding: 1.5rem 1rem; }
        }
"#;

pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub heading: &'a str,
    pub intro_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
    pub extra_style_blocks: Vec<Cow<'a, str>>,
    pub body_scripts: Vec<Cow<'a, str>>,
    /// Internal pages ask crawlers to stay away.
    pub indexable: bool,
}

impl<'a> PageLayout<'a> {
    pub fn new(meta_title: &'a str, heading: &'a str, body_html: impl Into<Cow<'a, str>>) -> Self {
        Self {
            meta_title,
            heading,
            intro_html: Cow::Borrowed(""),
            body_html: body_html.into(),
            extra_style_blocks: Vec::new(),
            body_scripts: Vec::new(),
            indexable: true,
        }
    }

    pub fn with_intro(mut self, intro_html: impl Into<Cow<'a, str>>) -> Self {
        self.intro_html = intro_html.into();
        self
    }

    pub fn with_styles(mut self, styles: impl Into<Cow<'a, str>>) -> Self {
        self.extra_style_blocks.push(styles.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<Cow<'a, str>>) -> Self {
        self.body_scripts.push(script.into());
        self
    }

    pub fn not_indexable(mut self) -> Self {
        self.indexable = false;
        self
    }
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        heading,
        intro_html,
        body_html,
        extra_style_blocks,
        body_scripts,
        indexable,
    } = layout;

    let styles = std::iter::once(Cow::Borrowed(PAGE_BASE_STYLES))
        .chain(extra_style_blocks)
        .map(Cow::into_owned)
        .collect::<Vec<_>>()
        .join("\n");

    let scripts = body_scripts
        .into_iter()
        .map(|script| format!("<script>\n{script}\n</script>"))
        .collect::<Vec<_>>()
        .join("\n");

    let robots = if indexable {
        ""
    } else {
        r#"<meta name="robots" content="noindex,nofollow">"#
    };
    let intro = if intro_html.is_empty() {
        String::new()
    } else {
        format!("<p>{intro_html}</p>")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="A student-led equity research collective using founder-owned capital as an educational case study.">
    {robots}
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <a class="brand" href="/">{site}</a>
            <nav>
                <a href="/">Home</a>
                <a href="/research">Research</a>
                <a href="/system">System</a>
            </nav>
        </div>
    </header>
    <section class="hero">
        <h1>{heading}</h1>
        {intro}
    </section>
    <main>
{body_html}
    </main>
    {footer}
{scripts}
</body>
</html>"#,
        meta_title = escape_html(meta_title),
        heading = escape_html(heading),
        site = SITE_NAME,
        footer = render_footer(),
    )
}

pub fn render_not_found(message: &str) -> String {
    render_page(
        PageLayout::new(
            "Not found | HAVEN Equities",
            "Page not found",
            format!(
                r#"<section class="panel"><p class="note">{}</p><p><a class="button" href="/research">Browse research</a></p></section>"#,
                escape_html(message)
            ),
        )
        .not_indexable(),
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} {site}. Student-led research for educational purposes only. Nothing on this site is investment advice.</footer>"#,
        year = current_year,
        site = SITE_NAME,
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
