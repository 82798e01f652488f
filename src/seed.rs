//! Declarative content fixtures.
//!
//! `techlynx seed` loads a TOML file (default `fixtures/seed.toml`) and
//! inserts whatever is missing. Running it twice changes nothing:
//!
//! - a block whose section already has a row is skipped;
//! - items of a collection that already had rows before the run are skipped;
//! - case studies, blog posts, and job openings whose slug exists are skipped;
//! - blog categories, departments, and locations that collide on name or
//!   slug are skipped.
//!
//! Images are plain paths under `static/`; seeding never touches the network.
//!
//! ```toml
//! [[blocks]]
//! section = "home.hero"
//! fields = { headline = "Grow faster", cta_text = "Book a call" }
//!
//! [[items]]
//! collection = "home.services"
//! title = "Web Development"
//! children = [{ title = "Responsive design" }]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::models::{BlogCategory, JobFacet, NewBlogPost, NewCaseStudy, NewContentItem, NewJobOpening};
use crate::slug::slugify;
use crate::store::{FacetKind, SiteStore, StoreError};

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub blocks: Vec<SeedBlock>,
    #[serde(default)]
    pub items: Vec<SeedItem>,
    #[serde(default)]
    pub case_studies: Vec<NewCaseStudy>,
    #[serde(default)]
    pub blog_categories: Vec<BlogCategory>,
    #[serde(default)]
    pub blog_posts: Vec<NewBlogPost>,
    #[serde(default)]
    pub departments: Vec<JobFacet>,
    #[serde(default)]
    pub locations: Vec<JobFacet>,
    #[serde(default)]
    pub jobs: Vec<NewJobOpening>,
}

#[derive(Debug, Deserialize)]
pub struct SeedBlock {
    pub section: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SeedItem {
    #[serde(flatten)]
    pub item: NewContentItem,
    #[serde(default)]
    pub children: Vec<NewContentItem>,
}

/// Created and skipped counts per fixture kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: BTreeMap<&'static str, usize>,
    pub skipped: BTreeMap<&'static str, usize>,
}

impl SeedReport {
    fn created(&mut self, kind: &'static str) {
        *self.created.entry(kind).or_default() += 1;
    }

    fn skipped(&mut self, kind: &'static str) {
        *self.skipped.entry(kind).or_default() += 1;
    }

    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }
}

pub fn load_seed_file(path: &Path) -> Result<SeedFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    parse_seed(&content).with_context(|| format!("Failed to parse seed file: {}", path.display()))
}

pub fn parse_seed(content: &str) -> Result<SeedFile> {
    Ok(toml::from_str(content)?)
}

/// Inserts every fixture that is not already present.
pub async fn apply_seed(store: &SiteStore, seed: &SeedFile) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for block in &seed.blocks {
        match store.create_block(&block.section, &block.fields, block.is_active).await {
            Ok(_) => report.created("blocks"),
            Err(StoreError::SingletonExists(_)) => report.skipped("blocks"),
            Err(e) => return Err(e).with_context(|| format!("block '{}'", block.section)),
        }
    }

    // decided once so a collection spread across several entries still seeds fully
    let mut populated = HashSet::new();
    for entry in &seed.items {
        let collection = entry.item.collection.as_str();
        if !populated.contains(collection) && store.count_items(collection).await? > 0 {
            populated.insert(collection.to_string());
        }
    }

    for entry in &seed.items {
        if populated.contains(entry.item.collection.as_str()) {
            report.skipped("items");
            continue;
        }
        let parent_id = store
            .create_item(&entry.item)
            .await
            .with_context(|| format!("item '{}' in {}", entry.item.title, entry.item.collection))?;
        report.created("items");

        for (position, child) in entry.children.iter().enumerate() {
            let mut child = child.clone();
            child.parent_id = Some(parent_id);
            if child.collection.is_empty() {
                child.collection = entry.item.collection.clone();
            }
            if child.sort_order == 0 {
                child.sort_order = position as i64;
            }
            store.create_item(&child).await?;
            report.created("children");
        }
    }

    for category in &seed.blog_categories {
        match store.create_blog_category(category).await {
            Ok(_) => report.created("blog_categories"),
            Err(StoreError::Duplicate(_)) => report.skipped("blog_categories"),
            Err(e) => return Err(e.into()),
        }
    }

    for (kind, facets, label) in [
        (FacetKind::Department, &seed.departments, "departments"),
        (FacetKind::Location, &seed.locations, "locations"),
    ] {
        for facet in facets {
            match store.create_facet(kind, facet).await {
                Ok(_) => report.created(label),
                Err(StoreError::Duplicate(_)) => report.skipped(label),
                Err(e) => return Err(e.into()),
            }
        }
    }

    for study in &seed.case_studies {
        let slug = slug_for(study.slug.as_deref(), &study.title);
        if store.case_study_slug_exists(&slug).await? {
            report.skipped("case_studies");
            continue;
        }
        store
            .create_case_study(study)
            .await
            .with_context(|| format!("case study '{}'", study.title))?;
        report.created("case_studies");
    }

    for post in &seed.blog_posts {
        let slug = slug_for(post.slug.as_deref(), &post.title);
        if store.blog_slug_exists(&slug).await? {
            report.skipped("blog_posts");
            continue;
        }
        store
            .create_blog_post(post)
            .await
            .with_context(|| format!("blog post '{}'", post.title))?;
        report.created("blog_posts");
    }

    for job in &seed.jobs {
        let slug = slug_for(job.slug.as_deref(), &job.title);
        if store.job_slug_exists(&slug).await? {
            report.skipped("jobs");
            continue;
        }
        store
            .create_job(job)
            .await
            .with_context(|| format!("job '{}'", job.title))?;
        report.created("jobs");
    }

    tracing::info!(
        created = report.total_created(),
        skipped = report.skipped.values().sum::<usize>(),
        "seed applied"
    );
    Ok(report)
}

fn slug_for(explicit: Option<&str>, title: &str) -> String {
    match explicit {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => slugify(title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::memory_store;

    const FIXTURE: &str = r#"
[[blocks]]
section = "home.hero"
fields = { headline = "Grow faster", cta_text = "Book a call" }

[[items]]
collection = "home.services"
title = "Web Development"
sort_order = 1
children = [{ title = "Responsive design" }, { title = "CMS builds" }]

[[items]]
collection = "home.services"
title = "SEO"
sort_order = 2

[[blog_categories]]
name = "Marketing"

[[blog_posts]]
title = "Ten SEO Wins"
excerpt = "Quick wins"
content = "<p>Body</p>"
category = "marketing"
published_date = "2024-03-01"

[[case_studies]]
title = "Retail Growth"
category = "E-commerce"
description = "Doubled revenue"
metrics = [{ label = "Revenue", value = "+120%" }]

[[departments]]
name = "Engineering"

[[locations]]
name = "Remote"

[[jobs]]
title = "Rust Developer"
department = "engineering"
location = "remote"
"#;

    #[tokio::test]
    async fn seeds_every_kind() {
        let store = memory_store().await;
        let seed = parse_seed(FIXTURE).unwrap();
        let report = apply_seed(&store, &seed).await.unwrap();

        assert_eq!(report.created["blocks"], 1);
        assert_eq!(report.created["items"], 2);
        assert_eq!(report.created["children"], 2);
        assert_eq!(report.created["jobs"], 1);
        assert!(report.skipped.is_empty());

        let hero = store.get_block("home.hero").await.unwrap().unwrap();
        assert_eq!(hero.field("headline"), Some("Grow faster"));

        let services = store.list_items_with_children("home.services").await.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].children.len(), 2);
        assert_eq!(services[0].children[1].title, "CMS builds");

        let post = store.blog_post_by_slug("ten-seo-wins").await.unwrap().unwrap();
        assert_eq!(post.category_slug.as_deref(), Some("marketing"));

        let study = store.case_study_by_slug("retail-growth").await.unwrap().unwrap();
        assert_eq!(study.metrics.len(), 1);

        let jobs = store.list_jobs().await.unwrap();
        assert_eq!(jobs[0].department_name.as_deref(), Some("Engineering"));
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let store = memory_store().await;
        let seed = parse_seed(FIXTURE).unwrap();
        apply_seed(&store, &seed).await.unwrap();

        let again = apply_seed(&store, &seed).await.unwrap();
        assert_eq!(again.total_created(), 0);
        assert_eq!(again.skipped["blocks"], 1);
        assert_eq!(again.skipped["items"], 2);
        assert_eq!(again.skipped["case_studies"], 1);
        assert_eq!(store.count_items("home.services").await.unwrap(), 4);
    }

    #[test]
    fn repo_fixtures_reference_existing_assets() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let path = root.join("fixtures/seed.toml");
        let seed = load_seed_file(&path).unwrap();
        assert!(!seed.blocks.is_empty() && !seed.case_studies.is_empty());

        let raw = std::fs::read_to_string(&path).unwrap();
        let assets = regex::Regex::new(r#"/static/([^"\s]+)"#).unwrap();
        let mut found = 0;
        for cap in assets.captures_iter(&raw) {
            let file = root.join("static").join(&cap[1]);
            assert!(file.is_file(), "missing asset {}", file.display());
            found += 1;
        }
        assert!(found > 0);
    }

    #[test]
    fn empty_file_is_valid() {
        let seed = parse_seed("").unwrap();
        assert!(seed.blocks.is_empty() && seed.jobs.is_empty());
    }
}
