//! Chatbot context extraction.
//!
//! Builds one bounded text blob from the site's page templates and
//! documentation files, for use as LLM prompt context. Each page template is
//! read from disk, stripped of template directives and non-content markup,
//! whitespace-collapsed, and cut to a per-section character budget.
//!
//! # Assembly
//!
//! ```text
//! <metadata block>
//!
//! === TECHLYNX PRO - COMPANY OVERVIEW ===
//! <about.html, about budget>
//!
//! === SERVICES OVERVIEW ===
//! ...
//! === CAREERS & OPPORTUNITIES ===
//! <careers.html, careers budget>
//!
//! === DOCUMENTATION ===
//! <first N chars of each doc file>
//! ```
//!
//! # Caching
//!
//! [`ContextCache`] computes the blob lazily on first access and holds it
//! until [`ContextCache::invalidate`] or [`ContextCache::refresh`] is
//! called. Content edits do not invalidate it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::{Config, ContextBudgets};

/// Hand-authored company facts placed ahead of the extracted sections.
pub const METADATA_BLOCK: &str = "
WEBSITE: Techlynx Pro - Professional IT Services
LOCATION: United States
EMAIL: hello@techlynxpro.com
PHONE: +1 (520) 666-4699
BUSINESS HOURS: Monday-Friday, 9am-6pm EST

SERVICES OFFERED:
1. AI Solutions (Chatbots, Machine Learning, Computer Vision)
2. Web Development (Custom websites, E-commerce, Web Apps)
3. Digital Marketing (SEO, PPC, Social Media, Content Marketing)
4. App Development (iOS, Android, Cross-platform)
5. SEO Audit (Technical SEO, On-page, Backlink Analysis)
6. Project Management (Agile, Waterfall, Hybrid)
7. Finance & Accounting (Bookkeeping, Tax Prep, Virtual CFO)
8. Content Production (Blog Writing, Video, Graphics, Social Media)
9. Virtual Assistance (Administrative support)

PRICING RANGES:
- Small Projects: $5,000 - $10,000
- Medium Projects: $10,000 - $25,000
- Large Projects: $25,000 - $50,000
- Enterprise: $50,000+

";

/// Service detail pages summarized into the context, in output order.
pub const SERVICE_PAGES: &[(&str, &str)] = &[
    ("AI Solutions", "ai-solutions.html"),
    ("Web Development", "web-development.html"),
    ("Digital Marketing", "digital-marketing.html"),
    ("App Development", "app-development.html"),
    ("SEO Audit", "seo-audit.html"),
    ("Project Management", "project-management.html"),
    ("Finance & Accounting", "finance-accounting.html"),
    ("Content Production", "content-production.html"),
];

// Line-bounded so an unclosed tag cannot swallow the lines after it.
static TEMPLATE_DIRECTIVES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\{%.*?%\}", r"\{\{.*?\}\}", r"\{#.*?#\}"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static NON_CONTENT_ELEMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "nav", "footer", "header"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect()
});

static HTML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Removes template directives, then non-content elements and all tags,
/// then collapses whitespace.
pub fn strip_markup(source: &str) -> String {
    let mut text = source.to_string();
    for re in TEMPLATE_DIRECTIVES.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    text = HTML_COMMENT.replace_all(&text, " ").into_owned();
    for re in NON_CONTENT_ELEMENTS.iter() {
        text = re.replace_all(&text, " ").into_owned();
    }
    text = HTML_TAG.replace_all(&text, " ").into_owned();
    let text = decode_entities(&text);
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&rsquo;", "'")
        .replace("&mdash;", "-")
        .replace("&copy;", "(c)")
        .replace("&amp;", "&")
}

/// First `max_chars` characters of `text` (characters, not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// One labeled section of the context blob.
#[derive(Debug, Clone)]
pub struct ContextSection {
    pub header: String,
    pub body: String,
    pub budget: usize,
}

/// Reads templates and docs from disk and assembles the context blob.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    templates_dir: PathBuf,
    docs: Vec<PathBuf>,
    budgets: ContextBudgets,
}

impl ContextBuilder {
    pub fn new(templates_dir: PathBuf, docs: Vec<PathBuf>, budgets: ContextBudgets) -> Self {
        Self {
            templates_dir,
            docs,
            budgets,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.site.templates_dir.join("website"),
            config.site.docs.clone(),
            config.chatbot.budgets.clone(),
        )
    }

    /// Stripped text of one page template; empty when missing or unreadable.
    pub fn extract_template(&self, name: &str) -> String {
        let path = self.templates_dir.join(name);
        if !path.exists() {
            tracing::debug!(template = %path.display(), "context template missing");
            return String::new();
        }
        match std::fs::read_to_string(&path) {
            Ok(source) => strip_markup(&source),
            Err(e) => {
                tracing::warn!(template = %path.display(), error = %e, "failed to read context template");
                String::new()
            }
        }
    }

    fn extract_docs(&self) -> String {
        let mut excerpts = Vec::new();
        for path in &self.docs {
            if !path.exists() {
                continue;
            }
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    excerpts.push(truncate_chars(&content, self.budgets.docs).to_string())
                }
                Err(e) => {
                    tracing::warn!(doc = %path.display(), error = %e, "failed to read context doc")
                }
            }
        }
        excerpts.join("\n\n")
    }

    fn section(&self, header: String, template: &str, budget: usize) -> ContextSection {
        let text = self.extract_template(template);
        ContextSection {
            header,
            body: truncate_chars(&text, budget).to_string(),
            budget,
        }
    }

    /// Every section in output order, already truncated.
    pub fn sections(&self) -> Vec<ContextSection> {
        let b = &self.budgets;
        let mut sections = vec![
            self.section(
                "=== TECHLYNX PRO - COMPANY OVERVIEW ===".into(),
                "about.html",
                b.about,
            ),
            self.section(
                "\n\n=== SERVICES OVERVIEW ===".into(),
                "services.html",
                b.services,
            ),
        ];

        for (name, template) in SERVICE_PAGES {
            sections.push(self.section(
                format!("\n\n=== SERVICE: {} ===", name.to_uppercase()),
                template,
                b.service_page,
            ));
        }

        sections.push(self.section(
            "\n\n=== INDUSTRIES WE SERVE ===".into(),
            "industries.html",
            b.industries,
        ));
        sections.push(self.section(
            "\n\n=== CASE STUDIES & SUCCESS STORIES ===".into(),
            "case-studies.html",
            b.case_studies,
        ));
        sections.push(self.section(
            "\n\n=== CONTACT INFORMATION ===".into(),
            "contact.html",
            b.contact,
        ));
        sections.push(self.section(
            "\n\n=== CAREERS & OPPORTUNITIES ===".into(),
            "careers.html",
            b.careers,
        ));

        let docs = self.extract_docs();
        if !docs.is_empty() {
            sections.push(ContextSection {
                header: "\n\n=== DOCUMENTATION ===".into(),
                body: docs,
                budget: b.docs,
            });
        }

        sections
    }

    /// Assembles the full blob: metadata, then headers and non-empty bodies
    /// joined by newlines.
    pub fn build(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for section in self.sections() {
            parts.push(section.header);
            if !section.body.is_empty() {
                parts.push(section.body);
            }
        }
        format!("{}\n\n{}", METADATA_BLOCK, parts.join("\n"))
    }
}

/// Process-wide context holder: compute once, keep until invalidated.
pub struct ContextCache {
    builder: ContextBuilder,
    cached: RwLock<Option<Arc<String>>>,
    builds: AtomicUsize,
}

impl ContextCache {
    pub fn new(builder: ContextBuilder) -> Self {
        Self {
            builder,
            cached: RwLock::new(None),
            builds: AtomicUsize::new(0),
        }
    }

    /// Returns the cached blob, building it first if the cache is empty.
    pub fn get(&self) -> Arc<String> {
        {
            let guard = self.cached.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ctx) = guard.as_ref() {
                return Arc::clone(ctx);
            }
        }

        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        // another request may have filled it while we waited
        if let Some(ctx) = guard.as_ref() {
            return Arc::clone(ctx);
        }

        tracing::info!("extracting site context for chatbot");
        let ctx = Arc::new(self.builder.build());
        self.builds.fetch_add(1, Ordering::SeqCst);
        tracing::info!(chars = ctx.chars().count(), "context extracted");
        *guard = Some(Arc::clone(&ctx));
        ctx
    }

    pub fn invalidate(&self) {
        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Drops the cached blob and rebuilds it immediately.
    pub fn refresh(&self) -> Arc<String> {
        self.invalidate();
        self.get()
    }

    pub fn is_cached(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Number of times the blob has been computed in this process.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn builder(&self) -> &ContextBuilder {
        &self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn builder_with(dir: &TempDir, files: &[(&str, &str)]) -> ContextBuilder {
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        ContextBuilder::new(dir.path().to_path_buf(), vec![], ContextBudgets::default())
    }

    #[test]
    fn strips_non_content_markup_and_directives() {
        let html = r#"
            {% extends "website/base.html" %}
            <header><h1>HEADER TEXT</h1></header>
            <nav><a href="/">NAV LINK</a></nav>
            <script>var SCRIPT = 1;</script>
            <style>.STYLE { color: red }</style>
            <main>
              <h2>We build   software</h2>
              <p>{{ hero.headline }} for {% if x %}growing{% endif %} teams &amp; founders</p>
            </main>
            <footer>FOOTER TEXT</footer>
        "#;
        let text = strip_markup(html);
        assert_eq!(text, "We build software for growing teams & founders");
        for gone in ["HEADER", "NAV", "SCRIPT", "STYLE", "FOOTER", "hero", "extends"] {
            assert!(!text.contains(gone), "{} leaked into {:?}", gone, text);
        }
    }

    #[test]
    fn unclosed_directive_keeps_following_lines() {
        let text = strip_markup("<p>{% if broken\nWe ship weekly.</p>\n<p>{{ a }}Fixed prices.</p>");
        assert!(text.contains("We ship weekly."));
        assert!(text.contains("Fixed prices."));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn head_element_is_not_mistaken_for_header() {
        let text = strip_markup("<head><title>Title</title></head><p>Body</p>");
        assert_eq!(text, "Title Body");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn sections_respect_budgets() {
        let dir = TempDir::new().unwrap();
        let long = format!("<p>{}</p>", "word ".repeat(2000));
        let builder = builder_with(
            &dir,
            &[("about.html", long.as_str()), ("careers.html", long.as_str())],
        );
        let sections = builder.sections();
        for s in &sections {
            assert!(s.body.chars().count() <= s.budget, "{} over budget", s.header);
        }
        assert_eq!(sections[0].body.chars().count(), 1500);
        let careers = sections
            .iter()
            .find(|s| s.header.contains("CAREERS"))
            .unwrap();
        assert_eq!(careers.body.chars().count(), 600);
    }

    #[test]
    fn missing_templates_yield_headers_only() {
        let dir = TempDir::new().unwrap();
        let builder = builder_with(&dir, &[]);
        let ctx = builder.build();
        assert!(ctx.starts_with(METADATA_BLOCK));
        assert!(ctx.contains("=== TECHLYNX PRO - COMPANY OVERVIEW ===\n\n\n=== SERVICES OVERVIEW ==="));
        assert!(ctx.contains("=== SERVICE: FINANCE & ACCOUNTING ==="));
        assert!(ctx.ends_with("=== CAREERS & OPPORTUNITIES ==="));
    }

    #[test]
    fn docs_are_excerpted_last() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("README.md");
        fs::write(&doc, "x".repeat(900)).unwrap();
        let mut budgets = ContextBudgets::default();
        budgets.docs = 100;
        let builder = ContextBuilder::new(dir.path().to_path_buf(), vec![doc], budgets);
        let ctx = builder.build();
        assert!(ctx.ends_with(&format!("=== DOCUMENTATION ===\n{}", "x".repeat(100))));
    }

    #[test]
    fn cache_hits_until_refresh() {
        let dir = TempDir::new().unwrap();
        let builder = builder_with(&dir, &[("about.html", "<p>About us</p>")]);
        let cache = ContextCache::new(builder);
        assert!(!cache.is_cached());

        let first = cache.get();
        let second = cache.get();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.build_count(), 1);

        // edits are not picked up until an explicit refresh
        fs::write(dir.path().join("about.html"), "<p>Changed</p>").unwrap();
        assert!(!cache.get().contains("Changed"));

        cache.invalidate();
        for _ in 0..5 {
            assert!(cache.get().contains("Changed"));
        }
        assert_eq!(cache.build_count(), 2);

        let refreshed = cache.refresh();
        assert_eq!(cache.build_count(), 3);
        assert_eq!(*refreshed, *first.replace("About us", "Changed"));
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let dir = TempDir::new().unwrap();
        let builder = builder_with(&dir, &[("about.html", "<p>About</p>")]);
        let cache = Arc::new(ContextCache::new(builder));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get().len())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.build_count(), 1);
    }
}
