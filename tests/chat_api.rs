//! In-process tests for the chat API, the admin surface, and lead capture.
//!
//! Each test serves the real router on an ephemeral port with an in-memory
//! database and a stub language model.

use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use techlynx_site::config::Config;
use techlynx_site::db;
use techlynx_site::geo::GeoLocator;
use techlynx_site::llm::ChatModel;
use techlynx_site::migrate;
use techlynx_site::server::{build_router, AppState};
use techlynx_site::session::SessionStore;
use techlynx_site::store::SiteStore;

const ADMIN_TOKEN: &str = "test-admin-token";

struct StubModel {
    calls: AtomicUsize,
    fail: bool,
}

impl StubModel {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl ChatModel for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("upstream exploded");
        }
        assert!(prompt.contains("COMPANY CONTEXT:"));
        Ok("We build websites.".to_string())
    }
}

struct TestSite {
    base: String,
    store: SiteStore,
    sessions: Arc<SessionStore>,
    client: reqwest::Client,
}

async fn start_site(model: Option<Arc<dyn ChatModel>>, admin_token: Option<&str>) -> TestSite {
    let mut config = Config::minimal();
    config.site.templates_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
    config.site.docs = vec![];
    config.admin.token = admin_token.map(str::to_string);

    let pool = db::connect_memory().await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let store = SiteStore::new(pool);

    let state = AppState::new(config, store.clone(), model, GeoLocator::new(vec![]));
    let sessions = state.sessions.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestSite {
        base: format!("http://{}", addr),
        store,
        sessions,
        client,
    }
}

impl TestSite {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn chat(&self, cookie: Option<&str>, body: &str) -> reqwest::Response {
        let mut req = self
            .client
            .post(self.url("/api/chat/"))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(cookie) = cookie {
            req = req.header("cookie", cookie);
        }
        req.send().await.unwrap()
    }

    fn admin_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
    }
}

/// `name=value` from a `Set-Cookie` header.
fn session_cookie(resp: &reqwest::Response) -> String {
    let header = resp
        .headers()
        .get("set-cookie")
        .expect("new session sets a cookie")
        .to_str()
        .unwrap();
    header.split(';').next().unwrap().to_string()
}

const HELLO: &str = r#"{"message": "What services do you offer?"}"#;

// ─── Chat ───────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_answers_until_the_session_is_rate_limited() {
    let model = StubModel::new(false);
    let site = start_site(Some(model.clone()), None).await;

    let first = site.chat(None, HELLO).await;
    assert_eq!(first.status(), 200);
    let cookie = session_cookie(&first);
    let body: serde_json::Value = first.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["response"], "We build websites.");

    for _ in 1..10 {
        let resp = site.chat(Some(&cookie), HELLO).await;
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get("set-cookie").is_none());
    }

    let limited = site.chat(Some(&cookie), HELLO).await;
    assert_eq!(limited.status(), 429);
    let retry_after: u64 = limited.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 3600);
    let body: serde_json::Value = limited.json().await.unwrap();
    assert_eq!(body["status"], "rate_limited");
    assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");
    assert_eq!(model.calls.load(Ordering::SeqCst), 10);

    // a visitor without the cookie has a fresh allowance
    let other = site.chat(None, HELLO).await;
    assert_eq!(other.status(), 200);
}

#[tokio::test]
async fn chat_rejects_bad_input_without_counting_it() {
    let model = StubModel::new(false);
    let site = start_site(Some(model.clone()), None).await;

    let cases = [
        ("not json", "Invalid JSON"),
        (r#"{"message": "   "}"#, "Message is required"),
        ("{}", "Message is required"),
    ];
    for (body, expected) in cases {
        let resp = site.chat(None, body).await;
        assert_eq!(resp.status(), 400, "body {:?}", body);
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["error"], expected);
        assert_eq!(json["status"], "error");
    }

    let too_long = serde_json::json!({ "message": "a".repeat(501) }).to_string();
    let resp = site.chat(None, &too_long).await;
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Message too long (max 500 characters)");

    let exact = serde_json::json!({ "message": "a".repeat(500) }).to_string();
    assert_eq!(site.chat(None, &exact).await.status(), 200);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_chat_requests_leave_no_session_behind() {
    let site = start_site(Some(StubModel::new(false)), None).await;

    for _ in 0..200 {
        let resp = site.chat(None, "not json").await;
        assert_eq!(resp.status(), 400);
    }
    assert!(site.sessions.is_empty());

    assert_eq!(site.chat(None, HELLO).await.status(), 200);
    assert_eq!(site.sessions.len(), 1);
}

#[tokio::test]
async fn chat_without_model_is_unavailable() {
    let site = start_site(None, None).await;

    let resp = site.chat(None, HELLO).await;
    assert_eq!(resp.status(), 503);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Chatbot is temporarily unavailable");
}

#[tokio::test]
async fn chat_model_failure_is_generic_500() {
    let site = start_site(Some(StubModel::new(true)), None).await;

    let resp = site.chat(None, HELLO).await;
    assert_eq!(resp.status(), 500);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Sorry, I encountered an error. Please try again.");
    assert!(!json.to_string().contains("exploded"));
}

// ─── Admin ──────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_requires_bearer_token() {
    let site = start_site(None, Some(ADMIN_TOKEN)).await;

    let resp = site.client.get(site.url("/admin/")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = site
        .client
        .get(site.url("/admin/"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = site
        .client
        .get(site.url("/admin/"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("content_blocks"));

    let resp = site
        .client
        .get(site.url("/admin/"))
        .header("authorization", format!("bearer {}", ADMIN_TOKEN))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = site
        .client
        .get(site.url("/admin/"))
        .bearer_auth(format!("{}x", ADMIN_TOKEN))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = site
        .client
        .get(site.url("/admin/no_such_table/rows"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn admin_blocks_are_singletons() {
    let site = start_site(None, Some(ADMIN_TOKEN)).await;
    let block = serde_json::json!({
        "section": "home.hero",
        "fields_json": { "headline": "Hello" },
    });

    let resp = site
        .admin_post("/admin/content_blocks/")
        .json(&block)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = site
        .admin_post("/admin/content_blocks/")
        .json(&block)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let hero = site.store.get_block("home.hero").await.unwrap().unwrap();
    assert_eq!(hero.field("headline"), Some("Hello"));
}

#[tokio::test]
async fn admin_creates_updates_and_toggles_items() {
    let site = start_site(None, Some(ADMIN_TOKEN)).await;

    let resp = site
        .admin_post("/admin/content_items/")
        .json(&serde_json::json!({
            "collection": "home.services",
            "title": "Web Development",
            "sort_order": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let id = resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let resp = site
        .admin_post(&format!("/admin/content_items/{}", id))
        .json(&serde_json::json!({ "title": "Web & App Development" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = site
        .admin_post(&format!("/admin/content_items/{}/toggle", id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["visible"], false);

    // hidden items drop out of the public listing
    let items = site.store.list_items("home.services").await.unwrap();
    assert!(items.is_empty());

    let rows: serde_json::Value = site
        .client
        .get(site.url("/admin/content_items/rows?group=home.services"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rows["table"], "content_items");
    assert_eq!(rows["rows"].as_array().unwrap().len(), 1);
    assert_eq!(rows["rows"][0]["title"], "Web & App Development");

    let resp = site
        .admin_post(&format!("/admin/content_items/{}", id))
        .json(&serde_json::json!({ "is_active": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = site
        .admin_post("/admin/content_items/9999")
        .json(&serde_json::json!({ "title": "Ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn admin_logs_are_read_only() {
    let site = start_site(None, Some(ADMIN_TOKEN)).await;

    let resp = site
        .admin_post("/admin/contact_inquiries/")
        .json(&serde_json::json!({ "full_name": "Forged", "email": "x@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    assert_eq!(site.store.count_rows("contact_inquiries").await.unwrap(), 0);
}

#[tokio::test]
async fn admin_refresh_rebuilds_context() {
    let site = start_site(None, Some(ADMIN_TOKEN)).await;

    let first: serde_json::Value = site
        .admin_post("/admin/chatbot/refresh")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: serde_json::Value = site
        .admin_post("/admin/chatbot/refresh")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first["chars"].as_u64().unwrap() > 0);
    assert_eq!(
        second["builds"].as_u64().unwrap(),
        first["builds"].as_u64().unwrap() + 1
    );
}

// ─── Leads ──────────────────────────────────────────────────────────

#[tokio::test]
async fn contact_form_records_lead_with_request_metadata() {
    let site = start_site(None, Some(ADMIN_TOKEN)).await;

    let resp = site
        .client
        .post(site.url("/contact/"))
        .header("referer", "https://google.com/?utm_source=google&utm_medium=cpc")
        .header("user-agent", "test-agent")
        .form(&[
            ("full_name", "Ada Lovelace"),
            ("email", "ada@example.com"),
            ("service_interest", "AI Solutions"),
            ("utm_medium", "email"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers()["location"], "/contact/?status=success");

    let rows: serde_json::Value = site
        .client
        .get(site.url("/admin/contact_inquiries/rows"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let lead = &rows["rows"][0];
    assert_eq!(lead["inquiry_type"], "Contact Form");
    assert_eq!(lead["utm_source"], "google");
    assert_eq!(lead["utm_medium"], "email");
    assert_eq!(lead["user_agent"], "test-agent");
    assert_eq!(lead["ip_address"], "127.0.0.1");
    assert_eq!(lead["country"], "Unknown");
}

#[tokio::test]
async fn invalid_leads_are_not_stored() {
    let site = start_site(None, None).await;

    let resp = site
        .client
        .post(site.url("/contact/"))
        .form(&[("full_name", "No Email"), ("service_interest", "SEO Audit")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["location"], "/contact/?status=error");

    let resp = site
        .client
        .post(site.url("/services/"))
        .form(&[
            ("full_name", "Bad Email"),
            ("email", "not-an-email"),
            ("service_interest", "SEO Audit"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["location"], "/services/?status=error");

    let resp = site
        .client
        .post(site.url("/careers/"))
        .form(&[("full_name", "Grace"), ("email", "grace@example.com")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["location"], "/careers/?status=error");

    assert_eq!(site.store.count_rows("contact_inquiries").await.unwrap(), 0);
    assert_eq!(site.store.count_rows("career_applications").await.unwrap(), 0);
}

#[tokio::test]
async fn talent_pool_application_is_accepted() {
    let site = start_site(None, None).await;

    let resp = site
        .client
        .post(site.url("/careers/"))
        .form(&[
            ("full_name", "Grace Hopper"),
            ("email", "grace@example.com"),
            ("interest", "talent"),
            ("job_position", "12345"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["location"], "/careers/?status=success");
    assert_eq!(site.store.count_rows("career_applications").await.unwrap(), 1);
}
