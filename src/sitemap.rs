//! `sitemap.xml` and `robots.txt`.
//!
//! Static pages come from [`STATIC_PATHS`]; blog posts and case studies are
//! read from the store on every request. All URLs are absolute, built from
//! `[server] base_url`.

use anyhow::Result;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use chrono::DateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::error::SiteResult;
use crate::models::CaseStudySort;
use crate::pages::STATIC_PATHS;
use crate::server::AppState;
use crate::store::{SiteStore, StoreResult};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: &'static str,
    pub priority: f32,
}

fn absolute(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn date_of(ts: i64) -> Option<String> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Every URL the sitemap lists, in output order.
pub async fn collect_entries(store: &SiteStore, base_url: &str) -> StoreResult<Vec<SitemapEntry>> {
    let mut entries: Vec<SitemapEntry> = STATIC_PATHS
        .iter()
        .map(|path| SitemapEntry {
            loc: absolute(base_url, path),
            lastmod: None,
            changefreq: "monthly",
            priority: 1.0,
        })
        .collect();

    for post in store.published_posts().await? {
        entries.push(SitemapEntry {
            loc: absolute(base_url, &post.url()),
            lastmod: date_of(post.updated_at),
            changefreq: "weekly",
            priority: 0.8,
        });
    }

    for study in store.list_case_studies(None, CaseStudySort::Manual).await? {
        entries.push(SitemapEntry {
            loc: absolute(base_url, &study.url()),
            lastmod: date_of(study.created_at),
            changefreq: "monthly",
            priority: 0.7,
        });
    }

    Ok(entries)
}

fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;

    for entry in entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        write_text_element(&mut writer, "loc", &entry.loc)?;
        if let Some(lastmod) = &entry.lastmod {
            write_text_element(&mut writer, "lastmod", lastmod)?;
        }
        write_text_element(&mut writer, "changefreq", entry.changefreq)?;
        write_text_element(&mut writer, "priority", &format!("{:.1}", entry.priority))?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;
    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

pub fn robots_txt(base_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /admin/\n\nSitemap: {}\n",
        absolute(base_url, "/sitemap.xml")
    )
}

pub async fn handle_sitemap(State(state): State<AppState>) -> SiteResult<impl IntoResponse> {
    let entries = collect_entries(&state.store, &state.config.server.base_url).await?;
    let xml = render_sitemap(&entries)?;
    Ok(([(CONTENT_TYPE, "application/xml; charset=utf-8")], xml))
}

pub async fn handle_robots(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        robots_txt(&state.config.server.base_url),
    )
}
