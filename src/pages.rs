//! Public page handlers.
//!
//! Each handler gathers the singleton blocks and ordered collections its
//! template needs from the [`SiteStore`](crate::store::SiteStore) and
//! renders `templates/website/<page>.html`. Content keys follow the
//! `<page>.<name>` convention: the `hero` block of the SEO audit page is
//! section `seo-audit.hero` and reaches the template as `hero`.
//!
//! Service detail pages are described by the [`SERVICE_PAGES`] table rather
//! than one handler each.

use axum::extract::{Path, Query, State};
use axum::response::Html;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SiteError, SiteResult};
use crate::models::CaseStudySort;
use crate::server::AppState;
use crate::store::SiteStore;

/// Content layout of one `/services/{slug}/` page.
#[derive(Debug, Clone, Copy)]
pub struct ServicePage {
    pub slug: &'static str,
    pub name: &'static str,
    pub blocks: &'static [&'static str],
    pub collections: &'static [&'static str],
}

impl ServicePage {
    pub fn template(&self) -> String {
        format!("{}.html", self.slug)
    }

    pub fn has_testimonials(&self) -> bool {
        self.collections.contains(&"testimonials")
    }
}

pub const SERVICE_PAGES: &[ServicePage] = &[
    ServicePage {
        slug: "ai-solutions",
        name: "AI Solutions",
        blocks: &["seo", "hero", "cta"],
        collections: &[
            "services",
            "technologies",
            "tech_details",
            "implementation_steps",
            "roi_metrics",
            "performance_metrics",
            "testimonials",
        ],
    },
    ServicePage {
        slug: "web-development",
        name: "Web Development",
        blocks: &["seo", "hero", "cta"],
        collections: &[
            "services",
            "stack_features",
            "technologies",
            "process_steps",
            "seo_benefits",
            "seo_metrics",
        ],
    },
    ServicePage {
        slug: "digital-marketing",
        name: "Digital Marketing",
        blocks: &["seo", "hero", "cta"],
        collections: &["services", "strategy_steps", "testimonials", "metrics"],
    },
    ServicePage {
        slug: "app-development",
        name: "App Development",
        blocks: &["seo", "hero", "cta"],
        collections: &[
            "services",
            "stack_features",
            "technologies",
            "process_steps",
            "features",
            "performance_metrics",
            "testimonials",
        ],
    },
    ServicePage {
        slug: "seo-audit",
        name: "SEO Audit",
        blocks: &["seo", "hero", "results", "cta"],
        collections: &[
            "services",
            "tools",
            "tool_logos",
            "process_steps",
            "benefits",
            "health_metrics",
            "testimonials",
        ],
    },
    ServicePage {
        slug: "project-management",
        name: "Project Management",
        blocks: &["seo", "hero", "cta"],
        collections: &[
            "services",
            "tools",
            "tool_logos",
            "process_steps",
            "benefits",
            "metrics",
            "testimonials",
        ],
    },
    ServicePage {
        slug: "finance-accounting",
        name: "Finance & Accounting",
        blocks: &["seo", "hero", "cta"],
        collections: &["services", "tools", "process_steps", "benefits", "testimonials"],
    },
    ServicePage {
        slug: "content-production",
        name: "Content Production",
        blocks: &["seo", "hero", "cta"],
        collections: &[
            "services",
            "tools",
            "technologies",
            "benefits",
            "process_steps",
            "metrics",
            "testimonials",
        ],
    },
    ServicePage {
        slug: "virtual-assistance",
        name: "Virtual Assistance",
        blocks: &["seo", "hero", "cta"],
        collections: &["services", "benefits"],
    },
];

pub fn find_service_page(slug: &str) -> Option<&'static ServicePage> {
    SERVICE_PAGES.iter().find(|p| p.slug == slug)
}

/// Testimonials shown per service on `/testimonials/`.
pub const TESTIMONIALS_PER_SERVICE: i64 = 10;

/// Paths listed in the sitemap alongside blog posts and case studies.
pub const STATIC_PATHS: &[&str] = &[
    "/",
    "/about/",
    "/services/",
    "/services/ai-solutions/",
    "/services/web-development/",
    "/services/digital-marketing/",
    "/services/app-development/",
    "/services/seo-audit/",
    "/services/project-management/",
    "/services/finance-accounting/",
    "/services/content-production/",
    "/services/virtual-assistance/",
    "/industries/",
    "/case-studies/",
    "/blog/",
    "/careers/",
    "/testimonials/",
    "/contact/",
    "/privacy-policy/",
    "/terms-of-service/",
];

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Outcome of a form POST that redirected here.
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaseStudyQuery {
    pub category: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CareersQuery {
    pub status: Option<String>,
    pub job: Option<String>,
}

/// Template context under construction.
struct PageData {
    store: SiteStore,
    values: Map<String, Value>,
}

fn to_json<T: Serialize>(value: &T) -> SiteResult<Value> {
    serde_json::to_value(value).map_err(|e| SiteError::Internal(e.into()))
}

impl PageData {
    fn new(state: &AppState, path: &str, status: Option<String>) -> Self {
        let mut values = Map::new();
        values.insert("site_name".into(), Value::String(state.config.site.name.clone()));
        values.insert("request_path".into(), Value::String(path.to_string()));
        values.insert(
            "form_status".into(),
            status.map(Value::String).unwrap_or(Value::Null),
        );
        values.insert("service_pages".into(), service_nav());
        Self {
            store: state.store.clone(),
            values,
        }
    }

    fn set<T: Serialize>(&mut self, key: &str, value: &T) -> SiteResult<()> {
        self.values.insert(key.to_string(), to_json(value)?);
        Ok(())
    }

    /// Loads `<prefix>.<name>` blocks into `name`, `null` when absent.
    async fn blocks(&mut self, prefix: &str, names: &[&str]) -> SiteResult<()> {
        for name in names {
            let block = self.store.get_block(&format!("{}.{}", prefix, name)).await?;
            self.set(name, &block)?;
        }
        Ok(())
    }

    /// Loads `<prefix>.<name>` collections (with children) into `name`.
    async fn collections(&mut self, prefix: &str, names: &[&str]) -> SiteResult<()> {
        for name in names {
            let items = self
                .store
                .list_items_with_children(&format!("{}.{}", prefix, name))
                .await?;
            self.set(name, &items)?;
        }
        Ok(())
    }

    fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

fn service_nav() -> Value {
    Value::Array(
        SERVICE_PAGES
            .iter()
            .map(|p| {
                serde_json::json!({
                    "slug": p.slug,
                    "name": p.name,
                    "url": format!("/services/{}/", p.slug),
                })
            })
            .collect(),
    )
}

pub async fn home(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> SiteResult<Html<String>> {
    let mut page = PageData::new(&state, "/", q.status);
    page.blocks("home", &["seo", "hero", "cta"]).await?;
    page.collections(
        "home",
        &[
            "hero_benefits",
            "stats",
            "services",
            "benefits",
            "guarantees",
            "testimonials",
            "partners",
        ],
    )
    .await?;
    let featured = state.store.featured_case_study().await?;
    page.set("featured_case_study", &featured)?;
    state.renderer.page("index.html", page.into_value())
}

pub async fn about(State(state): State<AppState>) -> SiteResult<Html<String>> {
    let mut page = PageData::new(&state, "/about/", None);
    page.blocks("about", &["seo"]).await?;
    state.renderer.page("about.html", page.into_value())
}

pub async fn industries(State(state): State<AppState>) -> SiteResult<Html<String>> {
    let mut page = PageData::new(&state, "/industries/", None);
    page.blocks("industries", &["seo"]).await?;
    state.renderer.page("industries.html", page.into_value())
}

pub async fn services(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> SiteResult<Html<String>> {
    let mut page = PageData::new(&state, "/services/", q.status);
    page.blocks("services", &["seo", "hero", "cta"]).await?;
    page.collections(
        "services",
        &["details", "why_choose_items", "why_choose_images", "cta_checklist"],
    )
    .await?;
    state.renderer.page("services.html", page.into_value())
}

pub async fn service_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> SiteResult<Html<String>> {
    let service = find_service_page(&slug)
        .ok_or_else(|| SiteError::NotFound(format!("service page '{}'", slug)))?;

    let mut page = PageData::new(&state, &format!("/services/{}/", service.slug), None);
    page.set("service_name", &service.name)?;
    page.blocks(service.slug, service.blocks).await?;
    page.collections(service.slug, service.collections).await?;
    state.renderer.page(&service.template(), page.into_value())
}

pub async fn case_studies(
    State(state): State<AppState>,
    Query(q): Query<CaseStudyQuery>,
) -> SiteResult<Html<String>> {
    let category = q.category.unwrap_or_else(|| "all".to_string());
    let sort = q.sort.unwrap_or_else(|| "latest".to_string());

    let mut page = PageData::new(&state, "/case-studies/", None);
    let studies = state
        .store
        .list_case_studies(Some(&category), CaseStudySort::parse(&sort))
        .await?;
    page.set("case_studies", &studies)?;
    page.set("categories", &state.store.case_study_categories().await?)?;
    page.set("active_category", &category)?;
    page.set("active_sort", &sort)?;
    page.blocks("case-studies", &["seo", "hero", "cta"]).await?;
    state.renderer.page("case-studies.html", page.into_value())
}

pub async fn case_study_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> SiteResult<Html<String>> {
    let study = state
        .store
        .case_study_by_slug(&slug)
        .await?
        .ok_or_else(|| SiteError::NotFound(format!("case study '{}'", slug)))?;
    let related = state.store.related_case_studies(&study).await?;

    let mut page = PageData::new(&state, &study.url(), None);
    page.set("case_study", &study)?;
    page.set("related_case_studies", &related)?;
    page.blocks("case-studies", &["cta"]).await?;
    state.renderer.page("case-study-detail.html", page.into_value())
}

async fn render_blog(state: &AppState, show_all: bool) -> SiteResult<Html<String>> {
    let index = state.store.blog_index(show_all).await?;
    let path = if show_all { "/blog/all/" } else { "/blog/" };
    let mut page = PageData::new(state, path, None);
    page.set("categories", &index.categories)?;
    page.set("featured_post", &index.featured_post)?;
    page.set("trending_posts", &index.trending_posts)?;
    page.set("posts", &index.posts)?;
    page.set("has_more_posts", &index.has_more_posts)?;
    page.set("show_all", &show_all)?;
    if show_all {
        page.set(
            "page_title",
            &format!(
                "All Blog Articles & Insights ({}+) | Tech Trends & Expert Tips",
                index.total_posts
            ),
        )?;
        page.set(
            "meta_description",
            &format!(
                "Browse all {}+ articles on web development, AI automation, digital marketing, SEO, and technology trends.",
                index.total_posts
            ),
        )?;
    }
    state.renderer.page("blog.html", page.into_value())
}

pub async fn blog(State(state): State<AppState>) -> SiteResult<Html<String>> {
    render_blog(&state, false).await
}

pub async fn blog_all(State(state): State<AppState>) -> SiteResult<Html<String>> {
    render_blog(&state, true).await
}

pub async fn blog_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> SiteResult<Html<String>> {
    let post = state
        .store
        .blog_post_by_slug(&slug)
        .await?
        .ok_or_else(|| SiteError::NotFound(format!("blog post '{}'", slug)))?;
    let related = state.store.related_blog_posts(&post).await?;

    let mut page = PageData::new(&state, &post.url(), None);
    page.set("post", &post)?;
    page.set("related_posts", &related)?;
    state.renderer.page("blog_detail.html", page.into_value())
}

pub async fn careers(
    State(state): State<AppState>,
    Query(q): Query<CareersQuery>,
) -> SiteResult<Html<String>> {
    let selected_job = match q.job.as_deref().and_then(|j| j.parse::<i64>().ok()) {
        Some(id) => state.store.job_by_id(id).await?,
        None => None,
    };

    let mut page = PageData::new(&state, "/careers/", q.status);
    page.blocks("careers", &["seo", "hero", "talent_management"]).await?;
    page.collections("careers", &["stats", "talent_features"]).await?;
    page.set(
        "departments",
        &state.store.list_facets(crate::store::FacetKind::Department).await?,
    )?;
    page.set(
        "locations",
        &state.store.list_facets(crate::store::FacetKind::Location).await?,
    )?;
    page.set("job_openings", &state.store.list_jobs().await?)?;
    page.set("selected_job", &selected_job)?;
    state.renderer.page("careers.html", page.into_value())
}

#[derive(Debug, Serialize)]
struct TestimonialGroup {
    slug: &'static str,
    name: &'static str,
    testimonials: Vec<crate::models::ContentItem>,
}

pub async fn testimonials(State(state): State<AppState>) -> SiteResult<Html<String>> {
    let mut groups = Vec::new();
    let mut total = 0usize;
    for service in SERVICE_PAGES.iter().filter(|p| p.has_testimonials()) {
        let items = state
            .store
            .list_items_limited(
                &format!("{}.testimonials", service.slug),
                TESTIMONIALS_PER_SERVICE,
            )
            .await?;
        total += items.len();
        groups.push(TestimonialGroup {
            slug: service.slug,
            name: service.name,
            testimonials: items,
        });
    }

    let mut page = PageData::new(&state, "/testimonials/", None);
    page.blocks("testimonials", &["seo", "hero", "why_choose", "cta"]).await?;
    page.collections("testimonials", &["why_choose_reasons"]).await?;
    page.set("testimonial_groups", &groups)?;
    page.set("total_testimonials", &total)?;
    state.renderer.page("testimonials.html", page.into_value())
}

pub async fn contact(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> SiteResult<Html<String>> {
    let mut page = PageData::new(&state, "/contact/", q.status);
    page.blocks("contact", &["seo"]).await?;
    state.renderer.page("contact.html", page.into_value())
}

async fn legal_page(
    state: &AppState,
    section: &str,
    path: &str,
    template: &str,
) -> SiteResult<Html<String>> {
    let mut page = PageData::new(state, path, None);
    let block = state.store.get_block(section).await?;
    page.set("policy", &block)?;
    let sections = state
        .store
        .list_items_with_children(&format!("{}.sections", section))
        .await?;
    page.set("sections", &sections)?;
    state.renderer.page(template, page.into_value())
}

pub async fn privacy_policy(State(state): State<AppState>) -> SiteResult<Html<String>> {
    legal_page(&state, "privacy_policy", "/privacy-policy/", "privacy-policy.html").await
}

pub async fn terms_of_service(State(state): State<AppState>) -> SiteResult<Html<String>> {
    legal_page(
        &state,
        "terms_of_service",
        "/terms-of-service/",
        "terms-of-service.html",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_service_pages_with_unique_slugs() {
        assert_eq!(SERVICE_PAGES.len(), 9);
        let mut slugs: Vec<&str> = SERVICE_PAGES.iter().map(|p| p.slug).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), 9);
        for p in SERVICE_PAGES {
            assert!(STATIC_PATHS.contains(&format!("/services/{}/", p.slug).as_str()));
        }
    }

    #[test]
    fn unknown_service_is_not_found() {
        assert!(find_service_page("blockchain").is_none());
        assert_eq!(find_service_page("seo-audit").unwrap().name, "SEO Audit");
    }

    #[test]
    fn seven_services_feed_the_testimonials_page() {
        let with: Vec<&str> = SERVICE_PAGES
            .iter()
            .filter(|p| p.has_testimonials())
            .map(|p| p.slug)
            .collect();
        assert_eq!(
            with,
            vec![
                "ai-solutions",
                "digital-marketing",
                "app-development",
                "seo-audit",
                "project-management",
                "finance-accounting",
                "content-production",
            ]
        );
    }

    #[test]
    fn context_service_pages_have_templates_here() {
        for (_, template) in crate::context::SERVICE_PAGES {
            let slug = template.trim_end_matches(".html");
            assert!(find_service_page(slug).is_some(), "{}", slug);
        }
    }
}
