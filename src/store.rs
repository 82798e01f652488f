//! SQLite-backed content store.
//!
//! Wraps a [`SqlitePool`] and maps every content, listing, and lead
//! operation used by the page handlers, the admin scaffold, and the seed
//! loader onto the schema created in [`crate::migrate`].
//!
//! Public listings always apply the visibility flag and sort ascending by
//! `sort_order` (row id breaks ties). Singleton blocks are guarded by an
//! explicit existence check in [`SiteStore::create_block`].

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{
    BlogCategory, BlogIndex, BlogPost, CareerApplication, CaseStudy,
    CaseStudyMetric, CaseStudySort, ContactInquiry, ContentBlock, ContentItem, JobFacet,
    JobOpening, NewBlogPost, NewCaseStudy, NewContentItem, NewJobOpening, SubscribeOutcome,
    JOB_TYPES,
};
use crate::slug::slugify;

/// Regular blog posts shown on the index before "load more".
pub const BLOG_PAGE_SIZE: i64 = 8;
const TRENDING_LIMIT: i64 = 3;
const RELATED_LIMIT: i64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("section '{0}' already exists")]
    SingletonExists(String),
    #[error("{table} row {id} not found")]
    NotFound { table: String, id: String },
    #[error("invalid value: {0}")]
    Invalid(String),
    #[error("duplicate value: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which job filter table a [`JobFacet`] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    Department,
    Location,
}

impl FacetKind {
    fn table(self) -> &'static str {
        match self {
            FacetKind::Department => "job_departments",
            FacetKind::Location => "job_locations",
        }
    }
}

#[derive(Clone)]
pub struct SiteStore {
    pool: SqlitePool,
}

pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

fn parse_json_map(raw: &str) -> Map<String, Value> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn block_from_row(row: &SqliteRow) -> ContentBlock {
    let fields_json: String = row.get("fields_json");
    ContentBlock {
        id: row.get("id"),
        section: row.get("section"),
        fields: parse_json_map(&fields_json),
        is_active: row.get("is_active"),
        updated_at: row.get("updated_at"),
    }
}

fn item_from_row(row: &SqliteRow) -> ContentItem {
    let extra_json: String = row.get("extra_json");
    ContentItem {
        id: row.get("id"),
        collection: row.get("collection"),
        parent_id: row.get("parent_id"),
        title: row.get("title"),
        subtitle: row.get("subtitle"),
        description: row.get("description"),
        icon: row.get("icon"),
        image_url: row.get("image_url"),
        link_url: row.get("link_url"),
        value: row.get("value"),
        extra: parse_json_map(&extra_json),
        sort_order: row.get("sort_order"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        children: Vec::new(),
    }
}

fn case_study_from_row(row: &SqliteRow) -> CaseStudy {
    CaseStudy {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        category: row.get("category"),
        description: row.get("description"),
        detailed_description: row.get("detailed_description"),
        client_name: row.get("client_name"),
        challenge: row.get("challenge"),
        solution: row.get("solution"),
        results: row.get("results"),
        image_url: row.get("image_url"),
        image_alt_text: row.get("image_alt_text"),
        key_result_label: row.get("key_result_label"),
        key_result_value: row.get("key_result_value"),
        is_active: row.get("is_active"),
        is_featured: row.get("is_featured"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        metrics: Vec::new(),
    }
}

fn blog_post_from_row(row: &SqliteRow) -> BlogPost {
    BlogPost {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        image_url: row.get("image_url"),
        category_id: row.get("category_id"),
        category_name: row.get("category_name"),
        category_slug: row.get("category_slug"),
        author: row.get("author"),
        read_time: row.get("read_time"),
        is_featured: row.get("is_featured"),
        is_trending: row.get("is_trending"),
        trending_order: row.get("trending_order"),
        is_published: row.get("is_published"),
        published_date: row.get("published_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn facet_from_row(row: &SqliteRow) -> JobFacet {
    JobFacet {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        sort_order: row.get("sort_order"),
        is_active: row.get("is_active"),
    }
}

fn job_from_row(row: &SqliteRow) -> JobOpening {
    JobOpening {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        department_id: row.get("department_id"),
        department_name: row.get("department_name"),
        department_slug: row.get("department_slug"),
        location_id: row.get("location_id"),
        location_name: row.get("location_name"),
        location_slug: row.get("location_slug"),
        job_type: row.get("job_type"),
        salary_range: row.get("salary_range"),
        description: row.get("description"),
        requirements: row.get("requirements"),
        application_url: row.get("application_url"),
        sort_order: row.get("sort_order"),
        is_active: row.get("is_active"),
    }
}

const BLOG_SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.excerpt, p.content, p.image_url, p.category_id,
           c.name AS category_name, c.slug AS category_slug,
           p.author, p.read_time, p.is_featured, p.is_trending, p.trending_order,
           p.is_published, p.published_date, p.created_at, p.updated_at
    FROM blog_posts p
    LEFT JOIN blog_categories c ON c.id = p.category_id
"#;

const JOB_SELECT: &str = r#"
    SELECT j.id, j.title, j.slug, j.department_id, d.name AS department_name,
           d.slug AS department_slug, j.location_id, l.name AS location_name,
           l.slug AS location_slug, j.job_type, j.salary_range, j.description,
           j.requirements, j.application_url, j.sort_order, j.is_active
    FROM job_openings j
    LEFT JOIN job_departments d ON d.id = j.department_id
    LEFT JOIN job_locations l ON l.id = j.location_id
"#;

impl SiteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ============ Singleton blocks ============

    /// Returns the active block for `section`, if any.
    pub async fn get_block(&self, section: &str) -> StoreResult<Option<ContentBlock>> {
        let row = sqlx::query(
            "SELECT id, section, fields_json, is_active, updated_at FROM content_blocks WHERE section = ? AND is_active = 1",
        )
        .bind(section)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(block_from_row))
    }

    pub async fn block_exists(&self, section: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM content_blocks WHERE section = ?")
                .bind(section)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Creates the single row for `section`.
    ///
    /// Refuses with [`StoreError::SingletonExists`] when any row, active or
    /// not, already exists for the section.
    pub async fn create_block(
        &self,
        section: &str,
        fields: &Map<String, Value>,
        is_active: bool,
    ) -> StoreResult<i64> {
        if section.trim().is_empty() {
            return Err(StoreError::Invalid("section must not be empty".into()));
        }
        if self.block_exists(section).await? {
            return Err(StoreError::SingletonExists(section.to_string()));
        }

        let fields_json = Value::Object(fields.clone()).to_string();
        let result = sqlx::query(
            "INSERT INTO content_blocks (section, fields_json, is_active, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(section)
        .bind(&fields_json)
        .bind(is_active)
        .bind(now_ts())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // a concurrent insert won the race
            if is_unique_violation(&e) {
                StoreError::SingletonExists(section.to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Merges `fields` into the block's existing fields.
    pub async fn update_block(&self, section: &str, fields: &Map<String, Value>) -> StoreResult<()> {
        let row = sqlx::query("SELECT fields_json FROM content_blocks WHERE section = ?")
            .bind(section)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                table: "content_blocks".into(),
                id: section.to_string(),
            })?;

        let current: String = row.get("fields_json");
        let mut merged = parse_json_map(&current);
        for (k, v) in fields {
            merged.insert(k.clone(), v.clone());
        }

        sqlx::query("UPDATE content_blocks SET fields_json = ?, updated_at = ? WHERE section = ?")
            .bind(Value::Object(merged).to_string())
            .bind(now_ts())
            .bind(section)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ============ Ordered collections ============

    /// Active items of `collection`, ascending by `sort_order`.
    pub async fn list_items(&self, collection: &str) -> StoreResult<Vec<ContentItem>> {
        self.list_items_limited(collection, -1).await
    }

    /// Like [`list_items`](Self::list_items) but capped at `limit` rows
    /// (negative means unlimited).
    pub async fn list_items_limited(
        &self,
        collection: &str,
        limit: i64,
    ) -> StoreResult<Vec<ContentItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM content_items
            WHERE collection = ? AND is_active = 1 AND parent_id IS NULL
            ORDER BY sort_order ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(collection)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    /// Active children of `parent_id`, ascending by `sort_order`.
    pub async fn list_children(&self, parent_id: i64) -> StoreResult<Vec<ContentItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM content_items
            WHERE parent_id = ? AND is_active = 1
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    /// Active items of `collection` with their active children attached.
    pub async fn list_items_with_children(
        &self,
        collection: &str,
    ) -> StoreResult<Vec<ContentItem>> {
        let mut items = self.list_items(collection).await?;
        for item in &mut items {
            item.children = self.list_children(item.id).await?;
        }
        Ok(items)
    }

    pub async fn count_items(&self, collection: &str) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM content_items WHERE collection = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn create_item(&self, item: &NewContentItem) -> StoreResult<i64> {
        if item.collection.trim().is_empty() {
            return Err(StoreError::Invalid("collection must not be empty".into()));
        }
        let ts = now_ts();
        let result = sqlx::query(
            r#"
            INSERT INTO content_items (collection, parent_id, title, subtitle, description, icon,
                                       image_url, link_url, value, extra_json, sort_order,
                                       is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.collection)
        .bind(item.parent_id)
        .bind(&item.title)
        .bind(&item.subtitle)
        .bind(&item.description)
        .bind(&item.icon)
        .bind(&item.image_url)
        .bind(&item.link_url)
        .bind(&item.value)
        .bind(Value::Object(item.extra.clone()).to_string())
        .bind(item.sort_order)
        .bind(item.is_active)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn set_item_active(&self, id: i64, is_active: bool) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE content_items SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(is_active)
                .bind(now_ts())
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                table: "content_items".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // ============ Case studies ============

    pub async fn create_case_study(&self, study: &NewCaseStudy) -> StoreResult<i64> {
        let slug = match &study.slug {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => slugify(&study.title),
        };
        if slug.is_empty() {
            return Err(StoreError::Invalid(format!(
                "cannot derive a slug from title '{}'",
                study.title
            )));
        }

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO case_studies (title, slug, category, description, detailed_description,
                                      client_name, challenge, solution, results, image_url,
                                      image_alt_text, key_result_label, key_result_value,
                                      is_active, is_featured, sort_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&study.title)
        .bind(&slug)
        .bind(&study.category)
        .bind(&study.description)
        .bind(&study.detailed_description)
        .bind(&study.client_name)
        .bind(&study.challenge)
        .bind(&study.solution)
        .bind(&study.results)
        .bind(&study.image_url)
        .bind(&study.image_alt_text)
        .bind(&study.key_result_label)
        .bind(&study.key_result_value)
        .bind(study.is_active)
        .bind(study.is_featured)
        .bind(study.sort_order)
        .bind(now_ts())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("case study slug '{}'", slug))
            } else {
                StoreError::Database(e)
            }
        })?;
        let id = result.last_insert_rowid();

        for metric in &study.metrics {
            sqlx::query(
                "INSERT INTO case_study_metrics (case_study_id, label, value, sort_order) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&metric.label)
            .bind(&metric.value)
            .bind(metric.sort_order)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn attach_metrics(&self, study: &mut CaseStudy) -> StoreResult<()> {
        let rows = sqlx::query(
            "SELECT id, label, value, sort_order FROM case_study_metrics WHERE case_study_id = ? ORDER BY sort_order ASC, id ASC",
        )
        .bind(study.id)
        .fetch_all(&self.pool)
        .await?;
        study.metrics = rows
            .iter()
            .map(|row| CaseStudyMetric {
                id: row.get("id"),
                label: row.get("label"),
                value: row.get("value"),
                sort_order: row.get("sort_order"),
            })
            .collect();
        Ok(())
    }

    /// Active case studies, optionally filtered by category (`"all"` or
    /// empty means no filter).
    pub async fn list_case_studies(
        &self,
        category: Option<&str>,
        sort: CaseStudySort,
    ) -> StoreResult<Vec<CaseStudy>> {
        let category = category.filter(|c| !c.is_empty() && *c != "all");
        let sql = format!(
            "SELECT * FROM case_studies WHERE is_active = 1 {} ORDER BY {}",
            if category.is_some() {
                "AND category = ?"
            } else {
                ""
            },
            sort.order_by()
        );

        let mut query = sqlx::query(&sql);
        if let Some(c) = category {
            query = query.bind(c);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut studies: Vec<CaseStudy> = rows.iter().map(case_study_from_row).collect();
        for study in &mut studies {
            self.attach_metrics(study).await?;
        }
        Ok(studies)
    }

    /// Distinct categories of active case studies, sorted.
    pub async fn case_study_categories(&self) -> StoreResult<Vec<String>> {
        let cats: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM case_studies WHERE is_active = 1 ORDER BY category ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(cats)
    }

    pub async fn case_study_by_slug(&self, slug: &str) -> StoreResult<Option<CaseStudy>> {
        let row = sqlx::query("SELECT * FROM case_studies WHERE slug = ? AND is_active = 1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let mut study = case_study_from_row(&row);
                self.attach_metrics(&mut study).await?;
                Ok(Some(study))
            }
            None => Ok(None),
        }
    }

    pub async fn case_study_slug_exists(&self, slug: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM case_studies WHERE slug = ?")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Up to three other active case studies in the same category.
    pub async fn related_case_studies(&self, study: &CaseStudy) -> StoreResult<Vec<CaseStudy>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM case_studies
            WHERE category = ? AND is_active = 1 AND id != ?
            ORDER BY sort_order ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(&study.category)
        .bind(study.id)
        .bind(RELATED_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(case_study_from_row).collect())
    }

    pub async fn featured_case_study(&self) -> StoreResult<Option<CaseStudy>> {
        let row = sqlx::query(
            "SELECT * FROM case_studies WHERE is_featured = 1 AND is_active = 1 ORDER BY sort_order ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let mut study = case_study_from_row(&row);
                self.attach_metrics(&mut study).await?;
                Ok(Some(study))
            }
            None => Ok(None),
        }
    }

    // ============ Blog ============

    pub async fn create_blog_category(&self, category: &BlogCategory) -> StoreResult<i64> {
        let slug = if category.slug.trim().is_empty() {
            slugify(&category.name)
        } else {
            category.slug.trim().to_string()
        };
        let result = sqlx::query(
            "INSERT INTO blog_categories (name, slug, sort_order, is_active) VALUES (?, ?, ?, ?)",
        )
        .bind(&category.name)
        .bind(&slug)
        .bind(category.sort_order)
        .bind(category.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("blog category '{}'", category.name))
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(result.last_insert_rowid())
    }

    pub async fn blog_categories(&self) -> StoreResult<Vec<BlogCategory>> {
        let rows = sqlx::query(
            "SELECT id, name, slug, sort_order, is_active FROM blog_categories WHERE is_active = 1 ORDER BY sort_order ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| BlogCategory {
                id: row.get("id"),
                name: row.get("name"),
                slug: row.get("slug"),
                sort_order: row.get("sort_order"),
                is_active: row.get("is_active"),
            })
            .collect())
    }

    async fn category_id_by_slug(&self, slug: &str) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT id FROM blog_categories WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                table: "blog_categories".into(),
                id: slug.to_string(),
            })
    }

    pub async fn create_blog_post(&self, post: &NewBlogPost) -> StoreResult<i64> {
        let slug = match &post.slug {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => slugify(&post.title),
        };
        if slug.is_empty() {
            return Err(StoreError::Invalid(format!(
                "cannot derive a slug from title '{}'",
                post.title
            )));
        }
        if chrono::NaiveDate::parse_from_str(&post.published_date, "%Y-%m-%d").is_err() {
            return Err(StoreError::Invalid(format!(
                "published_date must be YYYY-MM-DD, got '{}'",
                post.published_date
            )));
        }
        let category_id = match &post.category {
            Some(c) => Some(self.category_id_by_slug(c).await?),
            None => None,
        };

        let ts = now_ts();
        let result = sqlx::query(
            r#"
            INSERT INTO blog_posts (title, slug, excerpt, content, image_url, category_id, author,
                                    read_time, is_featured, is_trending, trending_order,
                                    is_published, published_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.title)
        .bind(&slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(category_id)
        .bind(&post.author)
        .bind(post.read_time)
        .bind(post.is_featured)
        .bind(post.is_trending)
        .bind(post.trending_order)
        .bind(post.is_published)
        .bind(&post.published_date)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("blog post slug '{}'", slug))
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(result.last_insert_rowid())
    }

    pub async fn blog_slug_exists(&self, slug: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM blog_posts WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn fetch_posts(&self, filter: &str, limit: i64) -> StoreResult<Vec<BlogPost>> {
        let sql = format!("{} WHERE {} LIMIT ?", BLOG_SELECT, filter);
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(blog_post_from_row).collect())
    }

    /// Blog index data. With `show_all`, every published post (featured
    /// included) is listed; otherwise the newest non-featured page.
    pub async fn blog_index(&self, show_all: bool) -> StoreResult<BlogIndex> {
        let categories = self.blog_categories().await?;

        let featured_post = self
            .fetch_posts(
                "p.is_featured = 1 AND p.is_published = 1 ORDER BY p.published_date DESC, p.id DESC",
                1,
            )
            .await?
            .into_iter()
            .next();

        let trending_posts = self
            .fetch_posts(
                "p.is_trending = 1 AND p.is_published = 1 ORDER BY p.trending_order ASC, p.id ASC",
                TRENDING_LIMIT,
            )
            .await?;

        let (posts, total_posts, has_more_posts) = if show_all {
            let posts = self
                .fetch_posts(
                    "p.is_published = 1 ORDER BY p.published_date DESC, p.created_at DESC, p.id DESC",
                    -1,
                )
                .await?;
            let total = posts.len() as i64;
            (posts, total, false)
        } else {
            let posts = self
                .fetch_posts(
                    "p.is_published = 1 AND p.is_featured = 0 ORDER BY p.published_date DESC, p.created_at DESC, p.id DESC",
                    BLOG_PAGE_SIZE,
                )
                .await?;
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM blog_posts WHERE is_published = 1 AND is_featured = 0",
            )
            .fetch_one(&self.pool)
            .await?;
            (posts, total, total > BLOG_PAGE_SIZE)
        };

        Ok(BlogIndex {
            categories,
            featured_post,
            trending_posts,
            posts,
            has_more_posts,
            total_posts,
        })
    }

    /// All published posts, newest first.
    pub async fn published_posts(&self) -> StoreResult<Vec<BlogPost>> {
        self.fetch_posts(
            "p.is_published = 1 ORDER BY p.published_date DESC, p.id DESC",
            -1,
        )
        .await
    }

    pub async fn blog_post_by_slug(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        let sql = format!("{} WHERE p.slug = ? AND p.is_published = 1", BLOG_SELECT);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(blog_post_from_row))
    }

    /// Up to three other published posts in the same category.
    pub async fn related_blog_posts(&self, post: &BlogPost) -> StoreResult<Vec<BlogPost>> {
        let Some(category_id) = post.category_id else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "{} WHERE p.category_id = ? AND p.is_published = 1 AND p.id != ? ORDER BY p.published_date DESC, p.id DESC LIMIT ?",
            BLOG_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(category_id)
            .bind(post.id)
            .bind(RELATED_LIMIT)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(blog_post_from_row).collect())
    }

    // ============ Careers ============

    pub async fn create_facet(&self, kind: FacetKind, facet: &JobFacet) -> StoreResult<i64> {
        let slug = if facet.slug.trim().is_empty() {
            slugify(&facet.name)
        } else {
            facet.slug.trim().to_string()
        };
        let sql = format!(
            "INSERT INTO {} (name, slug, sort_order, is_active) VALUES (?, ?, ?, ?)",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(&facet.name)
            .bind(&slug)
            .bind(facet.sort_order)
            .bind(facet.is_active)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate(format!("{} '{}'", kind.table(), facet.name))
                } else {
                    StoreError::Database(e)
                }
            })?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list_facets(&self, kind: FacetKind) -> StoreResult<Vec<JobFacet>> {
        let sql = format!(
            "SELECT id, name, slug, sort_order, is_active FROM {} WHERE is_active = 1 ORDER BY sort_order ASC, id ASC",
            kind.table()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(facet_from_row).collect())
    }

    async fn facet_id_by_slug(&self, kind: FacetKind, slug: &str) -> StoreResult<i64> {
        let sql = format!("SELECT id FROM {} WHERE slug = ?", kind.table());
        sqlx::query_scalar(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                table: kind.table().into(),
                id: slug.to_string(),
            })
    }

    pub async fn create_job(&self, job: &NewJobOpening) -> StoreResult<i64> {
        if !JOB_TYPES.contains(&job.job_type.as_str()) {
            return Err(StoreError::Invalid(format!(
                "job_type must be one of {}, got '{}'",
                JOB_TYPES.join(", "),
                job.job_type
            )));
        }
        let slug = match &job.slug {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => slugify(&job.title),
        };
        let department_id = match &job.department {
            Some(d) => Some(self.facet_id_by_slug(FacetKind::Department, d).await?),
            None => None,
        };
        let location_id = match &job.location {
            Some(l) => Some(self.facet_id_by_slug(FacetKind::Location, l).await?),
            None => None,
        };

        let ts = now_ts();
        let result = sqlx::query(
            r#"
            INSERT INTO job_openings (title, slug, department_id, location_id, job_type,
                                      salary_range, description, requirements, application_url,
                                      sort_order, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.title)
        .bind(&slug)
        .bind(department_id)
        .bind(location_id)
        .bind(&job.job_type)
        .bind(&job.salary_range)
        .bind(&job.description)
        .bind(&job.requirements)
        .bind(&job.application_url)
        .bind(job.sort_order)
        .bind(job.is_active)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("job slug '{}'", slug))
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list_jobs(&self) -> StoreResult<Vec<JobOpening>> {
        let sql = format!(
            "{} WHERE j.is_active = 1 ORDER BY j.sort_order ASC, j.created_at DESC, j.id ASC",
            JOB_SELECT
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    pub async fn job_by_id(&self, id: i64) -> StoreResult<Option<JobOpening>> {
        let sql = format!("{} WHERE j.id = ? AND j.is_active = 1", JOB_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(job_from_row))
    }

    pub async fn job_slug_exists(&self, slug: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM job_openings WHERE slug = ?")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    // ============ Leads ============

    pub async fn insert_contact_inquiry(&self, inquiry: &ContactInquiry) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO contact_inquiries (full_name, email, service_interest, budget_range,
                                           project_details, inquiry_type, referrer, utm_source,
                                           utm_medium, utm_campaign, utm_term, utm_content,
                                           ip_address, user_agent, country, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&inquiry.full_name)
        .bind(&inquiry.email)
        .bind(&inquiry.service_interest)
        .bind(&inquiry.budget_range)
        .bind(&inquiry.project_details)
        .bind(&inquiry.inquiry_type)
        .bind(&inquiry.referrer)
        .bind(&inquiry.utm.source)
        .bind(&inquiry.utm.medium)
        .bind(&inquiry.utm.campaign)
        .bind(&inquiry.utm.term)
        .bind(&inquiry.utm.content)
        .bind(&inquiry.ip_address)
        .bind(&inquiry.user_agent)
        .bind(&inquiry.country)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Adds `email` to the newsletter. An inactive subscription is
    /// reactivated; an active one is reported as already subscribed.
    pub async fn subscribe_newsletter(&self, email: &str) -> StoreResult<SubscribeOutcome> {
        let email = email.trim().to_lowercase();
        let existing: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM newsletter_subscribers WHERE email = ?")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(true) => Ok(SubscribeOutcome::AlreadySubscribed),
            Some(false) => {
                sqlx::query("UPDATE newsletter_subscribers SET is_active = 1 WHERE email = ?")
                    .bind(&email)
                    .execute(&self.pool)
                    .await?;
                Ok(SubscribeOutcome::Reactivated)
            }
            None => {
                let inserted = sqlx::query(
                    "INSERT INTO newsletter_subscribers (email, is_active, subscribed_at) VALUES (?, 1, ?)",
                )
                .bind(&email)
                .bind(now_ts())
                .execute(&self.pool)
                .await;
                match inserted {
                    Ok(_) => Ok(SubscribeOutcome::Subscribed),
                    Err(e) if is_unique_violation(&e) => Ok(SubscribeOutcome::AlreadySubscribed),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    pub async fn insert_career_application(&self, app: &CareerApplication) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO career_applications (full_name, email, application_type, job_opening_id,
                                             links, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&app.full_name)
        .bind(&app.email)
        .bind(app.application_type.as_str())
        .bind(app.job_opening_id)
        .bind(&app.links)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Row count of an arbitrary table known to the schema.
    pub async fn count_rows(&self, table: &str) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
