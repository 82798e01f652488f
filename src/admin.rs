//! Schema-driven admin surface.
//!
//! Every editable table is described once by a [`TableSchema`]; a single
//! set of handlers lists, creates, updates, and toggles rows of any of them.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/admin/` | Tables with row counts (HTML) |
//! | `GET`  | `/admin/{table}/` | Row list with image thumbnails (HTML) |
//! | `GET`  | `/admin/{table}/rows` | Rows as JSON (`?group=` filters grouped tables) |
//! | `POST` | `/admin/{table}/` | Create a row from a JSON object |
//! | `POST` | `/admin/{table}/{id}` | Update editable columns from a JSON object |
//! | `POST` | `/admin/{table}/{id}/toggle` | Flip the visibility column |
//! | `POST` | `/admin/chatbot/refresh` | Rebuild the chatbot context |
//!
//! All routes require `Authorization: Bearer <[admin] token>`. Without a
//! configured token the whole surface answers 404.
//!
//! Log tables are append-only: create and update are refused, and only the
//! newsletter table has a visibility toggle.

use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{SiteError, SiteResult};
use crate::server::AppState;
use crate::slug::slugify;
use crate::store::now_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// One row per key; creation refuses a second row.
    Singleton,
    /// Ordered rows with a visibility flag.
    Collection,
    /// Append-only submissions.
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "references")]
pub enum ColumnKind {
    Text,
    LongText,
    Int,
    Bool,
    Image,
    Url,
    Slug,
    Email,
    Timestamp,
    ForeignKey(&'static str),
    Json,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub editable: bool,
    pub required: bool,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        editable: true,
        required: false,
    }
}

const fn req(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        editable: true,
        required: true,
    }
}

const fn auto(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        editable: false,
        required: false,
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TableSchema {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: TableKind,
    pub columns: &'static [Column],
    #[serde(skip)]
    pub order_by: &'static str,
    /// Column flipped by the toggle endpoint.
    pub visibility: Option<&'static str>,
    /// Column used by `?group=` on the rows endpoint.
    pub group_by: Option<&'static str>,
    /// Column a missing slug is derived from.
    #[serde(skip)]
    pub slug_source: Option<&'static str>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn select_list(&self) -> String {
        let mut names = vec!["id"];
        names.extend(self.columns.iter().map(|c| c.name));
        names.join(", ")
    }
}

use ColumnKind::*;

pub static TABLES: &[TableSchema] = &[
    TableSchema {
        name: "content_blocks",
        label: "Page sections",
        kind: TableKind::Singleton,
        columns: &[
            req("section", Text),
            col("fields_json", ColumnKind::Json),
            col("is_active", Bool),
            auto("updated_at", Timestamp),
        ],
        order_by: "section ASC",
        visibility: Some("is_active"),
        group_by: None,
        slug_source: None,
    },
    TableSchema {
        name: "content_items",
        label: "Section items",
        kind: TableKind::Collection,
        columns: &[
            req("collection", Text),
            col("parent_id", ForeignKey("content_items")),
            col("title", Text),
            col("subtitle", Text),
            col("description", LongText),
            col("icon", Text),
            col("image_url", Image),
            col("link_url", Url),
            col("value", Text),
            col("extra_json", ColumnKind::Json),
            col("sort_order", Int),
            col("is_active", Bool),
            auto("created_at", Timestamp),
            auto("updated_at", Timestamp),
        ],
        order_by: "collection ASC, sort_order ASC, id ASC",
        visibility: Some("is_active"),
        group_by: Some("collection"),
        slug_source: None,
    },
    TableSchema {
        name: "case_studies",
        label: "Case studies",
        kind: TableKind::Collection,
        columns: &[
            req("title", Text),
            col("slug", Slug),
            req("category", Text),
            req("description", LongText),
            col("detailed_description", LongText),
            col("client_name", Text),
            col("challenge", LongText),
            col("solution", LongText),
            col("results", LongText),
            col("image_url", Image),
            col("image_alt_text", Text),
            col("key_result_label", Text),
            col("key_result_value", Text),
            col("is_active", Bool),
            col("is_featured", Bool),
            col("sort_order", Int),
            auto("created_at", Timestamp),
        ],
        order_by: "sort_order ASC, id ASC",
        visibility: Some("is_active"),
        group_by: Some("category"),
        slug_source: Some("title"),
    },
    TableSchema {
        name: "case_study_metrics",
        label: "Case study metrics",
        kind: TableKind::Collection,
        columns: &[
            req("case_study_id", ForeignKey("case_studies")),
            req("label", Text),
            req("value", Text),
            col("sort_order", Int),
        ],
        order_by: "case_study_id ASC, sort_order ASC, id ASC",
        visibility: None,
        group_by: Some("case_study_id"),
        slug_source: None,
    },
    TableSchema {
        name: "blog_categories",
        label: "Blog categories",
        kind: TableKind::Collection,
        columns: &[
            req("name", Text),
            col("slug", Slug),
            col("sort_order", Int),
            col("is_active", Bool),
        ],
        order_by: "sort_order ASC, id ASC",
        visibility: Some("is_active"),
        group_by: None,
        slug_source: Some("name"),
    },
    TableSchema {
        name: "blog_posts",
        label: "Blog posts",
        kind: TableKind::Collection,
        columns: &[
            req("title", Text),
            col("slug", Slug),
            req("excerpt", LongText),
            req("content", LongText),
            col("image_url", Image),
            col("category_id", ForeignKey("blog_categories")),
            col("author", Text),
            col("read_time", Int),
            col("is_featured", Bool),
            col("is_trending", Bool),
            col("trending_order", Int),
            col("is_published", Bool),
            req("published_date", Text),
            auto("created_at", Timestamp),
            auto("updated_at", Timestamp),
        ],
        order_by: "published_date DESC, id DESC",
        visibility: Some("is_published"),
        group_by: Some("category_id"),
        slug_source: Some("title"),
    },
    TableSchema {
        name: "job_departments",
        label: "Job departments",
        kind: TableKind::Collection,
        columns: &[
            req("name", Text),
            col("slug", Slug),
            col("sort_order", Int),
            col("is_active", Bool),
        ],
        order_by: "sort_order ASC, id ASC",
        visibility: Some("is_active"),
        group_by: None,
        slug_source: Some("name"),
    },
    TableSchema {
        name: "job_locations",
        label: "Job locations",
        kind: TableKind::Collection,
        columns: &[
            req("name", Text),
            col("slug", Slug),
            col("sort_order", Int),
            col("is_active", Bool),
        ],
        order_by: "sort_order ASC, id ASC",
        visibility: Some("is_active"),
        group_by: None,
        slug_source: Some("name"),
    },
    TableSchema {
        name: "job_openings",
        label: "Job openings",
        kind: TableKind::Collection,
        columns: &[
            req("title", Text),
            col("slug", Slug),
            col("department_id", ForeignKey("job_departments")),
            col("location_id", ForeignKey("job_locations")),
            col("job_type", Text),
            col("salary_range", Text),
            col("description", LongText),
            col("requirements", LongText),
            col("application_url", Url),
            col("sort_order", Int),
            col("is_active", Bool),
            auto("created_at", Timestamp),
            auto("updated_at", Timestamp),
        ],
        order_by: "sort_order ASC, id ASC",
        visibility: Some("is_active"),
        group_by: Some("department_id"),
        slug_source: Some("title"),
    },
    TableSchema {
        name: "contact_inquiries",
        label: "Contact inquiries",
        kind: TableKind::Log,
        columns: &[
            auto("full_name", Text),
            auto("email", Email),
            auto("service_interest", Text),
            auto("budget_range", Text),
            auto("project_details", LongText),
            auto("inquiry_type", Text),
            auto("referrer", Url),
            auto("utm_source", Text),
            auto("utm_medium", Text),
            auto("utm_campaign", Text),
            auto("utm_term", Text),
            auto("utm_content", Text),
            auto("ip_address", Text),
            auto("user_agent", Text),
            auto("country", Text),
            auto("created_at", Timestamp),
        ],
        order_by: "created_at DESC, id DESC",
        visibility: None,
        group_by: Some("inquiry_type"),
        slug_source: None,
    },
    TableSchema {
        name: "newsletter_subscribers",
        label: "Newsletter subscribers",
        kind: TableKind::Log,
        columns: &[
            auto("email", Email),
            auto("is_active", Bool),
            auto("subscribed_at", Timestamp),
        ],
        order_by: "subscribed_at DESC, id DESC",
        visibility: Some("is_active"),
        group_by: None,
        slug_source: None,
    },
    TableSchema {
        name: "career_applications",
        label: "Career applications",
        kind: TableKind::Log,
        columns: &[
            auto("full_name", Text),
            auto("email", Email),
            auto("application_type", Text),
            auto("job_opening_id", ForeignKey("job_openings")),
            auto("links", LongText),
            auto("created_at", Timestamp),
        ],
        order_by: "created_at DESC, id DESC",
        visibility: None,
        group_by: Some("application_type"),
        slug_source: None,
    },
];

pub fn find_table(name: &str) -> Option<&'static TableSchema> {
    TABLES.iter().find(|t| t.name == name)
}

fn table_or_404(name: &str) -> SiteResult<&'static TableSchema> {
    find_table(name).ok_or_else(|| SiteError::NotFound(format!("admin table '{}'", name)))
}

// ============ Authentication ============

/// Token from an `Authorization: Bearer <token>` header. The scheme is
/// case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Compares tokens through their HMAC tags so the check runs in constant
/// time regardless of where the first differing byte is.
fn token_matches(presented: &str, expected: &str) -> bool {
    let tag = |token: &str| {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"techlynx-admin-token")
            .expect("HMAC can take key of any size");
        mac.update(token.as_bytes());
        mac
    };
    let expected_tag = tag(expected).finalize().into_bytes();
    tag(presented).verify_slice(&expected_tag).is_ok()
}

/// Rejects requests without the configured bearer token.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.admin.token.as_deref().filter(|t| !t.is_empty()) else {
        return SiteError::NotFound("admin disabled".into()).into_response();
    };

    match bearer_token(req.headers()) {
        Some(token) if token_matches(token, expected) => next.run(req).await,
        _ => {
            tracing::warn!(path = %req.uri().path(), "admin request rejected");
            SiteError::Unauthorized.into_response()
        }
    }
}

// ============ Value conversion ============

/// A typed value ready to bind into a statement.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(Option<bool>),
}

fn cell_from_json(column: &Column, value: &Value) -> SiteResult<Cell> {
    let bad = || {
        SiteError::BadRequest(format!(
            "column '{}' expects {:?}, got {}",
            column.name, column.kind, value
        ))
    };

    match column.kind {
        Int | Timestamp | ForeignKey(_) => match value {
            Value::Null => Ok(Cell::Int(None)),
            Value::Number(n) => n.as_i64().map(|i| Cell::Int(Some(i))).ok_or_else(bad),
            Value::String(s) if s.trim().is_empty() => Ok(Cell::Int(None)),
            Value::String(s) => s.trim().parse().map(|i| Cell::Int(Some(i))).map_err(|_| bad()),
            _ => Err(bad()),
        },
        // flag columns are NOT NULL
        Bool => match value {
            Value::Bool(b) => Ok(Cell::Bool(Some(*b))),
            Value::Number(n) => Ok(Cell::Bool(Some(n.as_i64() != Some(0)))),
            Value::String(s) => match s.trim() {
                "true" | "on" | "1" | "yes" => Ok(Cell::Bool(Some(true))),
                "false" | "off" | "0" | "no" | "" => Ok(Cell::Bool(Some(false))),
                _ => Err(bad()),
            },
            _ => Err(bad()),
        },
        ColumnKind::Json => match value {
            Value::Null => Ok(Cell::Text(Some("{}".into()))),
            Value::Object(_) => Ok(Cell::Text(Some(value.to_string()))),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(_)) => Ok(Cell::Text(Some(s.clone()))),
                _ => Err(bad()),
            },
            _ => Err(bad()),
        },
        Email => match value {
            Value::String(s) if crate::leads::looks_like_email(s) => {
                Ok(Cell::Text(Some(s.trim().to_string())))
            }
            Value::Null => Ok(Cell::Text(None)),
            _ => Err(bad()),
        },
        Slug => match value {
            Value::Null => Ok(Cell::Text(None)),
            Value::String(s) => {
                let slug = slugify(s);
                if slug.is_empty() {
                    Ok(Cell::Text(None))
                } else {
                    Ok(Cell::Text(Some(slug)))
                }
            }
            _ => Err(bad()),
        },
        Text | LongText | Image | Url => match value {
            Value::Null => Ok(Cell::Text(None)),
            Value::String(s) => Ok(Cell::Text(Some(s.clone()))),
            Value::Number(n) => Ok(Cell::Text(Some(n.to_string()))),
            _ => Err(bad()),
        },
    }
}

fn cell_to_json(row: &SqliteRow, column: &Column) -> Value {
    match column.kind {
        Int | Timestamp | ForeignKey(_) => row
            .try_get::<Option<i64>, _>(column.name)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        Bool => row
            .try_get::<Option<bool>, _>(column.name)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        ColumnKind::Json => row
            .try_get::<Option<String>, _>(column.name)
            .ok()
            .flatten()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(column.name)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn row_to_json(schema: &TableSchema, row: &SqliteRow) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".into(), Value::from(row.get::<i64, _>("id")));
    for column in schema.columns {
        out.insert(column.name.to_string(), cell_to_json(row, column));
    }
    out
}

fn bind_cells<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    cells: Vec<Cell>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for cell in cells {
        query = match cell {
            Cell::Text(v) => query.bind(v),
            Cell::Int(v) => query.bind(v),
            Cell::Bool(v) => query.bind(v),
        };
    }
    query
}

fn body_object(body: Value) -> SiteResult<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(SiteError::BadRequest("body must be a JSON object".into())),
    }
}

// ============ Generic operations ============

pub async fn list_rows(
    state: &AppState,
    schema: &TableSchema,
    group: Option<&str>,
) -> SiteResult<Vec<Map<String, Value>>> {
    let filter = match (schema.group_by, group) {
        (Some(column), Some(_)) => format!("WHERE {} = ?", column),
        _ => String::new(),
    };
    let sql = format!(
        "SELECT {} FROM {} {} ORDER BY {}",
        schema.select_list(),
        schema.name,
        filter,
        schema.order_by
    );

    let mut query = sqlx::query(&sql);
    if let (Some(_), Some(value)) = (schema.group_by, group) {
        query = query.bind(value);
    }
    let rows = query
        .fetch_all(state.store.pool())
        .await
        .map_err(|e| SiteError::Internal(e.into()))?;
    Ok(rows.iter().map(|r| row_to_json(schema, r)).collect())
}

pub async fn create_row(
    state: &AppState,
    schema: &TableSchema,
    mut body: Map<String, Value>,
) -> SiteResult<i64> {
    if schema.kind == TableKind::Log {
        return Err(SiteError::Conflict(format!(
            "{} is append-only",
            schema.name
        )));
    }

    // singleton blocks go through the store's explicit existence check
    if schema.kind == TableKind::Singleton {
        let section = body
            .get("section")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SiteError::BadRequest("section is required".into()))?
            .to_string();
        let fields = match body.remove("fields_json") {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(_) => return Err(SiteError::BadRequest("fields_json must be an object".into())),
        };
        let is_active = body.get("is_active").and_then(|v| v.as_bool()).unwrap_or(true);
        return Ok(state.store.create_block(&section, &fields, is_active).await?);
    }

    if let Some(source) = schema.slug_source {
        let has_slug = body
            .get("slug")
            .and_then(|v| v.as_str())
            .is_some_and(|s| !slugify(s).is_empty());
        if !has_slug {
            if let Some(Value::String(text)) = body.get(source) {
                let derived = slugify(text);
                body.insert("slug".into(), Value::String(derived));
            }
        }
    }

    let mut names = Vec::new();
    let mut cells = Vec::new();
    for column in schema.columns.iter().filter(|c| c.editable) {
        match body.get(column.name) {
            Some(value) => {
                let cell = cell_from_json(column, value)?;
                if column.required && matches!(cell, Cell::Text(None) | Cell::Int(None)) {
                    return Err(SiteError::BadRequest(format!("{} is required", column.name)));
                }
                // unset optional values keep the column default
                if matches!(cell, Cell::Text(None) | Cell::Int(None) | Cell::Bool(None)) {
                    continue;
                }
                names.push(column.name);
                cells.push(cell);
            }
            None if column.required => {
                return Err(SiteError::BadRequest(format!("{} is required", column.name)));
            }
            None => {}
        }
    }
    if schema.column("slug").is_some() && !names.contains(&"slug") {
        return Err(SiteError::BadRequest("slug could not be derived".into()));
    }

    let ts = now_ts();
    for column in schema.columns.iter().filter(|c| c.kind == Timestamp && !c.editable) {
        names.push(column.name);
        cells.push(Cell::Int(Some(ts)));
    }

    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.name,
        names.join(", "),
        placeholders
    );
    let result = bind_cells(sqlx::query(&sql), cells)
        .execute(state.store.pool())
        .await
        .map_err(|e| map_write_error(schema, e))?;
    Ok(result.last_insert_rowid())
}

pub async fn update_row(
    state: &AppState,
    schema: &TableSchema,
    id: i64,
    body: Map<String, Value>,
) -> SiteResult<()> {
    if schema.kind == TableKind::Log {
        return Err(SiteError::Conflict(format!(
            "{} is append-only",
            schema.name
        )));
    }

    let mut assignments = Vec::new();
    let mut cells = Vec::new();
    for (key, value) in &body {
        let column = schema
            .column(key)
            .filter(|c| c.editable)
            .ok_or_else(|| SiteError::BadRequest(format!("'{}' is not editable", key)))?;
        let cell = cell_from_json(column, value)?;
        if column.required && matches!(cell, Cell::Text(None) | Cell::Int(None)) {
            return Err(SiteError::BadRequest(format!("{} is required", column.name)));
        }
        assignments.push(format!("{} = ?", column.name));
        cells.push(cell);
    }
    if assignments.is_empty() {
        return Err(SiteError::BadRequest("nothing to update".into()));
    }
    if schema.column("updated_at").is_some() {
        assignments.push("updated_at = ?".into());
        cells.push(Cell::Int(Some(now_ts())));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?",
        schema.name,
        assignments.join(", ")
    );
    cells.push(Cell::Int(Some(id)));
    let result = bind_cells(sqlx::query(&sql), cells)
        .execute(state.store.pool())
        .await
        .map_err(|e| map_write_error(schema, e))?;
    if result.rows_affected() == 0 {
        return Err(SiteError::NotFound(format!("{} row {}", schema.name, id)));
    }
    Ok(())
}

/// Flips the visibility column and returns the new value.
pub async fn toggle_row(state: &AppState, schema: &TableSchema, id: i64) -> SiteResult<bool> {
    let column = schema.visibility.ok_or_else(|| {
        SiteError::Conflict(format!("{} has no visibility flag", schema.name))
    })?;
    let sql = format!(
        "UPDATE {table} SET {column} = NOT {column} WHERE id = ? RETURNING {column}",
        table = schema.name,
        column = column
    );
    let value: Option<bool> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(state.store.pool())
        .await
        .map_err(|e| SiteError::Internal(e.into()))?;
    value.ok_or_else(|| SiteError::NotFound(format!("{} row {}", schema.name, id)))
}

fn map_write_error(schema: &TableSchema, err: sqlx::Error) -> SiteError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return SiteError::Conflict(format!("duplicate value in {}", schema.name));
        }
        if db.is_foreign_key_violation() {
            return SiteError::BadRequest(format!("unknown reference in {}", schema.name));
        }
    }
    SiteError::Internal(err.into())
}

// ============ Handlers ============

#[derive(Debug, Serialize)]
struct TableSummary {
    #[serde(flatten)]
    schema: &'static TableSchema,
    rows: i64,
}

pub async fn handle_index(State(state): State<AppState>) -> SiteResult<Html<String>> {
    let mut tables = Vec::new();
    for schema in TABLES {
        let rows = state.store.count_rows(schema.name).await?;
        tables.push(TableSummary { schema, rows });
    }
    let html = state.renderer.render(
        "admin/index.html",
        minijinja::context! { tables => tables, site_name => state.config.site.name.clone() },
    )?;
    Ok(Html(html))
}

#[derive(Debug, Default, Deserialize)]
pub struct RowsQuery {
    pub group: Option<String>,
}

pub async fn handle_table_page(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(q): Query<RowsQuery>,
) -> SiteResult<Html<String>> {
    let schema = table_or_404(&table)?;
    let rows = list_rows(&state, schema, q.group.as_deref()).await?;
    let html = state.renderer.render(
        "admin/table.html",
        minijinja::context! {
            table => schema,
            rows => rows,
            group => q.group,
            site_name => state.config.site.name.clone(),
        },
    )?;
    Ok(Html(html))
}

pub async fn handle_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(q): Query<RowsQuery>,
) -> SiteResult<Json<Value>> {
    let schema = table_or_404(&table)?;
    let rows = list_rows(&state, schema, q.group.as_deref()).await?;
    Ok(Json(serde_json::json!({ "table": schema.name, "rows": rows })))
}

pub async fn handle_create(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> SiteResult<Json<Value>> {
    let schema = table_or_404(&table)?;
    let id = create_row(&state, schema, body_object(body)?).await?;
    tracing::info!(table = schema.name, id, "admin row created");
    Ok(Json(serde_json::json!({ "id": id })))
}

pub async fn handle_update(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> SiteResult<Json<Value>> {
    let schema = table_or_404(&table)?;
    update_row(&state, schema, id, body_object(body)?).await?;
    tracing::info!(table = schema.name, id, "admin row updated");
    Ok(Json(serde_json::json!({ "id": id, "updated": true })))
}

pub async fn handle_toggle(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
) -> SiteResult<Json<Value>> {
    let schema = table_or_404(&table)?;
    let visible = toggle_row(&state, schema, id).await?;
    tracing::info!(table = schema.name, id, visible, "admin row toggled");
    Ok(Json(serde_json::json!({ "id": id, "visible": visible })))
}

pub async fn handle_refresh_context(State(state): State<AppState>) -> Json<Value> {
    let ctx = state.context.refresh();
    Json(serde_json::json!({
        "chars": ctx.chars().count(),
        "builds": state.context.build_count(),
    }))
}
