//! Best-effort IP geolocation for leads.
//!
//! [`GeoLocator`] walks a fixed chain of [`GeoProvider`]s and returns the
//! first country name any of them produces. Each provider gets one attempt
//! with the configured timeout; when all of them fail the answer is
//! [`UNKNOWN_COUNTRY`]. Addresses that cannot be geolocated (private,
//! loopback, link-local, unparseable) short-circuit to `"Unknown"` with no
//! network call.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

use crate::config::{GeoConfig, GeoProviderConfig};

pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// One geolocation backend.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Country name for `ip`, or an error if this provider cannot answer.
    async fn country(&self, ip: IpAddr) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResponseFormat {
    /// Body is the country name.
    Text,
    /// Body is a JSON object; the country is under this key.
    Json(String),
}

/// A provider reached over HTTP GET with the IP substituted into the URL.
pub struct HttpGeoProvider {
    name: String,
    url_template: String,
    format: ResponseFormat,
    client: reqwest::Client,
}

impl HttpGeoProvider {
    pub fn from_config(config: &GeoProviderConfig, timeout: Duration) -> Result<Self> {
        let format = match (config.format.as_str(), &config.field) {
            ("text", _) => ResponseFormat::Text,
            ("json", Some(field)) => ResponseFormat::Json(field.clone()),
            ("json", None) => bail!("geo provider '{}' needs a json field", config.name),
            (other, _) => bail!("Unknown geo provider format: '{}'", other),
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("techlynx-site/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            name: config.name.clone(),
            url_template: config.url.clone(),
            format,
            client,
        })
    }

    fn url_for(&self, ip: IpAddr) -> String {
        self.url_template.replace("{ip}", &ip.to_string())
    }
}

/// Extracts a country name from a provider response body.
fn parse_country(format: &ResponseFormat, body: &str) -> Result<String> {
    let country = match format {
        ResponseFormat::Text => body.trim().to_string(),
        ResponseFormat::Json(field) => {
            let json: serde_json::Value = serde_json::from_str(body)?;
            json.get(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .trim()
                .to_string()
        }
    };

    // error pages and rate-limit notices are not country names
    if country.is_empty()
        || country.len() > 64
        || country.eq_ignore_ascii_case("undefined")
        || country.contains(['{', '<', '\n'])
    {
        bail!("no country in response");
    }
    Ok(country)
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn country(&self, ip: IpAddr) -> Result<String> {
        let response = self.client.get(self.url_for(ip)).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("{} returned {}", self.name, status);
        }
        let body = response.text().await?;
        parse_country(&self.format, &body)
    }
}

/// Returns true when `ip` is routable on the public internet.
pub fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                // unique local fc00::/7
                || (first & 0xfe00) == 0xfc00
                // link local fe80::/10
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

pub struct GeoLocator {
    providers: Vec<Box<dyn GeoProvider>>,
}

impl GeoLocator {
    pub fn new(providers: Vec<Box<dyn GeoProvider>>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &GeoConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut providers: Vec<Box<dyn GeoProvider>> = Vec::new();
        for p in &config.providers {
            providers.push(Box::new(HttpGeoProvider::from_config(p, timeout)?));
        }
        Ok(Self::new(providers))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Country for `ip`, trying providers in order. Never fails.
    pub async fn locate(&self, ip: &str) -> String {
        let addr: IpAddr = match ip.trim().parse() {
            Ok(addr) => addr,
            Err(_) => return UNKNOWN_COUNTRY.to_string(),
        };
        if !is_public_ip(&addr) {
            return UNKNOWN_COUNTRY.to_string();
        }

        for provider in &self.providers {
            match provider.country(addr).await {
                Ok(country) => {
                    tracing::debug!(provider = provider.name(), %addr, %country, "geolocated");
                    return country;
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), %addr, error = %e, "geolocation provider failed");
                }
            }
        }
        UNKNOWN_COUNTRY.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        name: &'static str,
        answer: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GeoProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn country(&self, _ip: IpAddr) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(c) => Ok(c.to_string()),
                None => bail!("{} is down", self.name),
            }
        }
    }

    fn stub(name: &'static str, answer: Option<&'static str>) -> (Box<dyn GeoProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(StubProvider {
                name,
                answer,
                calls: Arc::clone(&calls),
            }),
            calls,
        )
    }

    #[tokio::test]
    async fn falls_through_to_next_provider() {
        let (primary, primary_calls) = stub("primary", None);
        let (secondary, secondary_calls) = stub("secondary", Some("Germany"));
        let (tertiary, tertiary_calls) = stub("tertiary", Some("France"));
        let locator = GeoLocator::new(vec![primary, secondary, tertiary]);

        assert_eq!(locator.locate("8.8.8.8").await, "Germany");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(tertiary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_failures_yield_unknown() {
        let (a, _) = stub("a", None);
        let (b, _) = stub("b", None);
        let locator = GeoLocator::new(vec![a, b]);
        assert_eq!(locator.locate("8.8.8.8").await, UNKNOWN_COUNTRY);
    }

    #[tokio::test]
    async fn private_addresses_skip_the_network() {
        let (a, calls) = stub("a", Some("Nowhere"));
        let locator = GeoLocator::new(vec![a]);
        for ip in ["127.0.0.1", "10.1.2.3", "192.168.0.10", "::1", "fd00::1", "not-an-ip", ""] {
            assert_eq!(locator.locate(ip).await, UNKNOWN_COUNTRY, "{}", ip);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parses_text_and_json_bodies() {
        assert_eq!(
            parse_country(&ResponseFormat::Text, "United States\n").unwrap(),
            "United States"
        );
        assert!(parse_country(&ResponseFormat::Text, "Undefined").is_err());
        assert!(parse_country(&ResponseFormat::Text, "<html>rate limited</html>").is_err());

        let json = ResponseFormat::Json("country".into());
        assert_eq!(
            parse_country(&json, r#"{"country":"Canada"}"#).unwrap(),
            "Canada"
        );
        assert!(parse_country(&json, r#"{"status":"fail"}"#).is_err());
        assert!(parse_country(&json, "not json").is_err());
    }

    #[test]
    fn default_chain_order() {
        let locator = GeoLocator::from_config(&GeoConfig::default()).unwrap();
        assert_eq!(locator.provider_names(), vec!["ipapi", "ip-api", "ipinfo"]);
    }

    #[test]
    fn url_substitutes_ip() {
        let provider = HttpGeoProvider::from_config(
            &GeoProviderConfig {
                name: "x".into(),
                url: "https://geo.example/{ip}/country".into(),
                format: "text".into(),
                field: None,
            },
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            provider.url_for("1.2.3.4".parse().unwrap()),
            "https://geo.example/1.2.3.4/country"
        );
    }
}
