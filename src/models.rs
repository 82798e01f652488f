//! Core data models for the content store and the lead logs.
//!
//! Page sections collapse into two generic shapes: [`ContentBlock`]
//! (singleton, keyed by section) and [`ContentItem`] (ordered collection
//! member with a visibility flag). Entities with their own routes or
//! relationships keep dedicated types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A singleton page section such as `home.hero` or `privacy_policy`.
///
/// The editable fields are free-form; templates address them directly
/// (`hero.headline`) because they are flattened on serialization.
#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    pub id: i64,
    pub section: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub is_active: bool,
    pub updated_at: i64,
}

impl ContentBlock {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }
}

/// A member of an ordered collection (`home.services`, `seo-audit.tools`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    pub id: i64,
    pub collection: String,
    pub parent_id: Option<i64>,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub icon: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub value: String,
    pub extra: Map<String, Value>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentItem>,
}

/// Input for creating a [`ContentItem`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContentItem {
    /// Seeded children inherit their parent's collection when blank.
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseStudy {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub description: String,
    pub detailed_description: String,
    pub client_name: String,
    pub challenge: String,
    pub solution: String,
    pub results: String,
    pub image_url: Option<String>,
    pub image_alt_text: String,
    pub key_result_label: String,
    pub key_result_value: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i64,
    pub created_at: i64,
    pub metrics: Vec<CaseStudyMetric>,
}

impl CaseStudy {
    pub fn url(&self) -> String {
        format!("/case-studies/{}/", self.slug)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStudyMetric {
    #[serde(default)]
    pub id: i64,
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCaseStudy {
    pub title: String,
    /// Generated from the title when absent.
    #[serde(default)]
    pub slug: Option<String>,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub detailed_description: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub results: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_alt_text: String,
    #[serde(default = "default_key_result_label")]
    pub key_result_label: String,
    #[serde(default = "default_key_result_value")]
    pub key_result_value: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub metrics: Vec<CaseStudyMetric>,
}

fn default_key_result_label() -> String {
    "Key Result".to_string()
}
fn default_key_result_value() -> String {
    "+100%".to_string()
}

/// Case-study listing order selected by `?sort=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStudySort {
    Latest,
    Impact,
    Industry,
    Manual,
}

impl CaseStudySort {
    pub fn parse(value: &str) -> Self {
        match value {
            "latest" => CaseStudySort::Latest,
            "impact" => CaseStudySort::Impact,
            "industry" => CaseStudySort::Industry,
            _ => CaseStudySort::Manual,
        }
    }

    pub fn order_by(self) -> &'static str {
        match self {
            CaseStudySort::Latest => "created_at DESC, id DESC",
            // lower sort_order means higher impact
            CaseStudySort::Impact | CaseStudySort::Manual => "sort_order ASC, id ASC",
            CaseStudySort::Industry => "category ASC, created_at DESC, id DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogCategory {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub image_url: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub author: String,
    pub read_time: i64,
    pub is_featured: bool,
    pub is_trending: bool,
    pub trending_order: i64,
    pub is_published: bool,
    pub published_date: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BlogPost {
    pub fn url(&self) -> String {
        format!("/blog/{}/", self.slug)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBlogPost {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Slug of the owning [`BlogCategory`].
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_read_time")]
    pub read_time: i64,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_trending: bool,
    #[serde(default)]
    pub trending_order: i64,
    #[serde(default = "default_true")]
    pub is_published: bool,
    /// `YYYY-MM-DD`
    pub published_date: String,
}

fn default_author() -> String {
    "Techlynx Team".to_string()
}
fn default_read_time() -> i64 {
    5
}

/// Blog index data: featured hero, trending sidebar, and the post list.
#[derive(Debug, Clone, Serialize)]
pub struct BlogIndex {
    pub categories: Vec<BlogCategory>,
    pub featured_post: Option<BlogPost>,
    pub trending_posts: Vec<BlogPost>,
    pub posts: Vec<BlogPost>,
    pub has_more_posts: bool,
    pub total_posts: i64,
}

/// A job department or location; both share the same filter shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFacet {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOpening {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub department_id: Option<i64>,
    pub department_name: Option<String>,
    pub department_slug: Option<String>,
    pub location_id: Option<i64>,
    pub location_name: Option<String>,
    pub location_slug: Option<String>,
    pub job_type: String,
    pub salary_range: String,
    pub description: String,
    pub requirements: String,
    pub application_url: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewJobOpening {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    /// Department slug.
    #[serde(default)]
    pub department: Option<String>,
    /// Location slug.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_job_type")]
    pub job_type: String,
    #[serde(default)]
    pub salary_range: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_job_type() -> String {
    "full-time".to_string()
}

pub const JOB_TYPES: &[&str] = &["full-time", "part-time", "contract", "internship"];

/// A contact-form or service-inquiry lead with the request metadata
/// captured alongside it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactInquiry {
    pub full_name: String,
    pub email: String,
    pub service_interest: String,
    pub budget_range: String,
    pub project_details: String,
    pub inquiry_type: String,
    pub referrer: Option<String>,
    pub utm: UtmTags,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmTags {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

impl UtmTags {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.medium.is_none()
            && self.campaign.is_none()
            && self.term.is_none()
            && self.content.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    Reactivated,
    AlreadySubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    Job,
    Talent,
}

impl ApplicationType {
    /// Parses the careers form's `interest` field, ignoring case and
    /// surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "job" => Some(ApplicationType::Job),
            "talent" => Some(ApplicationType::Talent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationType::Job => "job",
            ApplicationType::Talent => "talent",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CareerApplication {
    pub full_name: String,
    pub email: String,
    pub application_type: ApplicationType,
    pub job_opening_id: Option<i64>,
    pub links: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_fields_flatten_for_templates() {
        let mut fields = Map::new();
        fields.insert("headline".into(), Value::String("Grow faster".into()));
        let block = ContentBlock {
            id: 1,
            section: "home.hero".into(),
            fields,
            is_active: true,
            updated_at: 0,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["headline"], "Grow faster");
        assert_eq!(block.field("headline"), Some("Grow faster"));
    }

    #[test]
    fn unknown_sort_falls_back_to_manual_order() {
        assert_eq!(CaseStudySort::parse("bogus"), CaseStudySort::Manual);
        assert_eq!(CaseStudySort::parse("latest"), CaseStudySort::Latest);
    }

    #[test]
    fn application_interest_is_normalized() {
        assert_eq!(ApplicationType::parse(" Talent "), Some(ApplicationType::Talent));
        assert_eq!(ApplicationType::parse("JOB"), Some(ApplicationType::Job));
        assert_eq!(ApplicationType::parse("intern"), None);
        assert_eq!(ApplicationType::parse(""), None);
    }
}
