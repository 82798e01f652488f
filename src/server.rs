//! HTTP server.
//!
//! Serves the public pages, the lead forms, the chat API, and the admin
//! surface from one [`Router`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` ... `/terms-of-service/` | Public pages, see [`crate::pages`] |
//! | `POST` | `/contact/`, `/services/` | Lead forms, see [`crate::leads`] |
//! | `POST` | `/careers/` | Career application |
//! | `POST` | `/newsletter/subscribe/` | Newsletter signup |
//! | `POST` | `/api/chat/` | Chatbot, see [`crate::chat`] |
//! | `GET`  | `/sitemap.xml`, `/robots.txt` | Crawler files |
//! | `GET`  | `/static/...` | Files under `[site] static_dir` |
//! | `GET`  | `/health` | Health check (returns version) |
//! | *      | `/admin/...` | Admin surface, see [`crate::admin`] |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the chat widget can be
//! embedded from other origins.

use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::chat;
use crate::config::Config;
use crate::context::{ContextBuilder, ContextCache};
use crate::db;
use crate::geo::GeoLocator;
use crate::leads;
use crate::llm::{ChatModel, GeminiModel};
use crate::pages;
use crate::ratelimit::RateLimiter;
use crate::render::Renderer;
use crate::session::SessionStore;
use crate::sitemap;
use crate::store::SiteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SiteStore,
    pub renderer: Arc<Renderer>,
    /// Chatbot context, built on first use.
    pub context: Arc<ContextCache>,
    pub sessions: Arc<SessionStore>,
    pub limiter: RateLimiter,
    /// `None` when no API key is configured; chat then answers 503.
    pub model: Option<Arc<dyn ChatModel>>,
    pub geo: Arc<GeoLocator>,
}

impl AppState {
    /// Assembles state around an existing store. The chat model is taken
    /// as given so tests can substitute their own.
    pub fn new(
        config: Config,
        store: SiteStore,
        model: Option<Arc<dyn ChatModel>>,
        geo: GeoLocator,
    ) -> Self {
        let renderer = Renderer::new(&config.site.templates_dir);
        let context = ContextCache::new(ContextBuilder::from_config(&config));
        let sessions = SessionStore::new(&config.session);
        let limiter = RateLimiter::new(
            config.chatbot.rate_limit_max,
            Duration::from_secs(config.chatbot.rate_limit_window_secs),
        );
        Self {
            config: Arc::new(config),
            store,
            renderer: Arc::new(renderer),
            context: Arc::new(context),
            sessions: Arc::new(sessions),
            limiter,
            model,
            geo: Arc::new(geo),
        }
    }
}

/// Opens the database and builds the chat model and geolocation chain from
/// configuration.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let pool = db::connect(config).await?;
    let store = SiteStore::new(pool);

    let model: Option<Arc<dyn ChatModel>> = match config.chatbot.resolve_api_key() {
        Some(key) => Some(Arc::new(GeminiModel::new(&config.chatbot, key)?)),
        None => {
            tracing::warn!("no chatbot API key configured; /api/chat/ will answer 503");
            None
        }
    };
    let geo = GeoLocator::from_config(&config.geo)?;

    if config.session.uses_default_secret() {
        tracing::warn!("session.secret is the built-in placeholder; set [session] secret before deploying");
    }

    Ok(AppState::new(config.clone(), store, model, geo))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/", get(admin::handle_index))
        .route("/admin/chatbot/refresh", post(admin::handle_refresh_context))
        .route(
            "/admin/{table}/",
            get(admin::handle_table_page).post(admin::handle_create),
        )
        .route("/admin/{table}/rows", get(admin::handle_rows))
        .route("/admin/{table}/{id}", post(admin::handle_update))
        .route("/admin/{table}/{id}/toggle", post(admin::handle_toggle))
        .route_layer(middleware::from_fn_with_state(state, admin::require_admin))
}

/// Builds the full router with tracing and CORS layers applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(pages::home))
        .route("/about/", get(pages::about))
        .route(
            "/services/",
            get(pages::services).post(leads::submit_service_inquiry),
        )
        .route("/services/{name}/", get(pages::service_detail))
        .route("/industries/", get(pages::industries))
        .route("/case-studies/", get(pages::case_studies))
        .route("/case-studies/{slug}/", get(pages::case_study_detail))
        .route("/blog/", get(pages::blog))
        .route("/blog/all/", get(pages::blog_all))
        .route("/blog/{slug}/", get(pages::blog_detail))
        .route(
            "/careers/",
            get(pages::careers).post(leads::submit_application),
        )
        .route("/testimonials/", get(pages::testimonials))
        .route(
            "/contact/",
            get(pages::contact).post(leads::submit_contact),
        )
        .route("/privacy-policy/", get(pages::privacy_policy))
        .route("/terms-of-service/", get(pages::terms_of_service))
        .route("/newsletter/subscribe/", post(leads::subscribe_newsletter))
        .route("/api/chat/", post(chat::handle_chat))
        .route("/sitemap.xml", get(sitemap::handle_sitemap))
        .route("/robots.txt", get(sitemap::handle_robots))
        .route("/health", get(handle_health))
        .nest_service("/static", ServeDir::new(&state.config.site.static_dir))
        .merge(admin_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the site server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> Result<()> {
    let state = build_state(config).await?;
    let app = build_router(state);

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "site listening on http://{}", bind_addr);

    // peer addresses feed lead capture when no proxy headers are present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
