use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub chatbot: ChatbotConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Absolute origin used for sitemap and robots links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://techlynxpro.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_site_name")]
    pub name: String,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    /// Served under `/static/`; seed fixtures reference images here.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Documentation files summarized into the chatbot context.
    #[serde(default = "default_docs")]
    pub docs: Vec<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            templates_dir: default_templates_dir(),
            static_dir: default_static_dir(),
            docs: default_docs(),
        }
    }
}

fn default_site_name() -> String {
    "Techlynx Pro".to_string()
}
fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}
fn default_docs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("README.md"),
        PathBuf::from("PROJECT_SUMMARY.md"),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatbotConfig {
    /// Falls back to the `GEMINI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: usize,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
    #[serde(default)]
    pub budgets: ContextBudgets,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_base: default_api_base(),
            timeout_secs: default_chat_timeout(),
            max_message_chars: default_max_message_chars(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window(),
            budgets: ContextBudgets::default(),
        }
    }
}

impl ChatbotConfig {
    /// Configured key, else `GEMINI_API_KEY`. Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_chat_timeout() -> u64 {
    30
}
fn default_max_message_chars() -> usize {
    500
}
fn default_rate_limit_max() -> usize {
    10
}
fn default_rate_limit_window() -> u64 {
    3600
}

/// Character budgets for each section of the chatbot context.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ContextBudgets {
    #[serde(default = "budget_about")]
    pub about: usize,
    #[serde(default = "budget_services")]
    pub services: usize,
    #[serde(default = "budget_service_page")]
    pub service_page: usize,
    #[serde(default = "budget_industries")]
    pub industries: usize,
    #[serde(default = "budget_case_studies")]
    pub case_studies: usize,
    #[serde(default = "budget_contact")]
    pub contact: usize,
    #[serde(default = "budget_careers")]
    pub careers: usize,
    #[serde(default = "budget_docs")]
    pub docs: usize,
}

impl Default for ContextBudgets {
    fn default() -> Self {
        Self {
            about: budget_about(),
            services: budget_services(),
            service_page: budget_service_page(),
            industries: budget_industries(),
            case_studies: budget_case_studies(),
            contact: budget_contact(),
            careers: budget_careers(),
            docs: budget_docs(),
        }
    }
}

fn budget_about() -> usize {
    1500
}
fn budget_services() -> usize {
    2000
}
fn budget_service_page() -> usize {
    1200
}
fn budget_industries() -> usize {
    800
}
fn budget_case_studies() -> usize {
    800
}
fn budget_contact() -> usize {
    1000
}
fn budget_careers() -> usize {
    600
}
fn budget_docs() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeoConfig {
    #[serde(default = "default_geo_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_geo_providers")]
    pub providers: Vec<GeoProviderConfig>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_geo_timeout(),
            providers: default_geo_providers(),
        }
    }
}

/// One IP-geolocation endpoint. `url` contains an `{ip}` placeholder.
#[derive(Debug, Deserialize, Clone)]
pub struct GeoProviderConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_geo_format")]
    pub format: String,
    /// JSON field holding the country, required when `format = "json"`.
    #[serde(default)]
    pub field: Option<String>,
}

fn default_geo_timeout() -> u64 {
    3
}
fn default_geo_format() -> String {
    "text".to_string()
}
fn default_geo_providers() -> Vec<GeoProviderConfig> {
    vec![
        GeoProviderConfig {
            name: "ipapi".to_string(),
            url: "https://ipapi.co/{ip}/country_name/".to_string(),
            format: "text".to_string(),
            field: None,
        },
        GeoProviderConfig {
            name: "ip-api".to_string(),
            url: "http://ip-api.com/json/{ip}?fields=country".to_string(),
            format: "json".to_string(),
            field: Some("country".to_string()),
        },
        GeoProviderConfig {
            name: "ipinfo".to_string(),
            url: "https://ipinfo.io/{ip}/json".to_string(),
            format: "json".to_string(),
            field: Some("country".to_string()),
        },
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_secret")]
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_max_age")]
    pub max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: default_session_secret(),
            cookie_name: default_cookie_name(),
            max_age_secs: default_session_max_age(),
        }
    }
}

/// Placeholder secret; `serve` warns when it is still in use.
pub const DEFAULT_SESSION_SECRET: &str = "change-me";

impl SessionConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SESSION_SECRET
    }
}

fn default_session_secret() -> String {
    DEFAULT_SESSION_SECRET.to_string()
}
fn default_cookie_name() -> String {
    "techlynx_session".to_string()
}
fn default_session_max_age() -> u64 {
    14 * 24 * 3600
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    /// Bearer token for `/admin/`. Unset disables the admin surface.
    #[serde(default)]
    pub token: Option<String>,
}

impl Config {
    /// Minimal in-memory config used by tests and by commands that only
    /// need defaults.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/site.sqlite"),
            },
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
                base_url: default_base_url(),
            },
            site: SiteConfig::default(),
            chatbot: ChatbotConfig::default(),
            geo: GeoConfig::default(),
            session: SessionConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let chat = &config.chatbot;
    if chat.max_message_chars == 0 {
        anyhow::bail!("chatbot.max_message_chars must be > 0");
    }
    if chat.rate_limit_max == 0 {
        anyhow::bail!("chatbot.rate_limit_max must be > 0");
    }
    if chat.rate_limit_window_secs == 0 {
        anyhow::bail!("chatbot.rate_limit_window_secs must be > 0");
    }

    let b = &chat.budgets;
    for (name, value) in [
        ("about", b.about),
        ("services", b.services),
        ("service_page", b.service_page),
        ("industries", b.industries),
        ("case_studies", b.case_studies),
        ("contact", b.contact),
        ("careers", b.careers),
        ("docs", b.docs),
    ] {
        if value == 0 {
            anyhow::bail!("chatbot.budgets.{} must be > 0", name);
        }
    }

    for provider in &config.geo.providers {
        if !provider.url.contains("{ip}") {
            anyhow::bail!("geo provider '{}' url must contain {{ip}}", provider.name);
        }
        match provider.format.as_str() {
            "text" => {}
            "json" if provider.field.is_some() => {}
            "json" => anyhow::bail!(
                "geo provider '{}' uses format json but has no field",
                provider.name
            ),
            other => anyhow::bail!(
                "Unknown geo provider format: '{}'. Must be text or json.",
                other
            ),
        }
    }

    if config.session.secret.is_empty() {
        anyhow::bail!("session.secret must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    const BASE: &str = r#"
[db]
path = "data/site.sqlite"

[server]
bind = "127.0.0.1:8000"
"#;

    #[test]
    fn default_budgets() {
        let config = parse(BASE).unwrap();
        let b = &config.chatbot.budgets;
        assert_eq!(b.about, 1500);
        assert_eq!(b.services, 2000);
        assert_eq!(b.service_page, 1200);
        assert_eq!(b.careers, 600);
        assert_eq!(config.chatbot.max_message_chars, 500);
        assert_eq!(config.chatbot.rate_limit_max, 10);
        assert_eq!(config.chatbot.rate_limit_window_secs, 3600);
        assert_eq!(config.geo.providers.len(), 3);
    }

    #[test]
    fn budget_override() {
        let src = format!("{}\n[chatbot.budgets]\nabout = 42\n", BASE);
        let config = parse(&src).unwrap();
        assert_eq!(config.chatbot.budgets.about, 42);
        assert_eq!(config.chatbot.budgets.services, 2000);
    }

    #[test]
    fn zero_budget_rejected() {
        let src = format!("{}\n[chatbot.budgets]\ncontact = 0\n", BASE);
        let err = parse(&src).unwrap_err();
        assert!(err.to_string().contains("contact"));
    }

    #[test]
    fn json_provider_requires_field() {
        let src = format!(
            "{}\n[[geo.providers]]\nname = \"x\"\nurl = \"http://x/{{ip}}\"\nformat = \"json\"\n",
            BASE
        );
        assert!(parse(&src).is_err());
    }

    #[test]
    fn placeholder_session_secret_is_detected() {
        let config = parse(BASE).unwrap();
        assert!(config.session.uses_default_secret());

        let src = format!("{}\n[session]\nsecret = \"a-real-secret\"\n", BASE);
        let config = parse(&src).unwrap();
        assert!(!config.session.uses_default_secret());
        assert_eq!(config.session.cookie_name, "techlynx_session");
    }

    #[test]
    fn blank_api_key_is_absent() {
        let mut chat = ChatbotConfig::default();
        chat.api_key = Some("   ".to_string());
        assert!(chat.resolve_api_key().is_none());
    }
}
