//! Lead capture: contact form, service inquiries, newsletter signups, and
//! career applications.
//!
//! Every form POST answers with a `303 See Other` back to its page carrying
//! `?status=success` or `?status=error`; no row is written when a required
//! field is missing. Contact and service leads are stored with the request
//! metadata from [`RequestMeta`] and a best-effort country from
//! [`GeoLocator`](crate::geo::GeoLocator).

use axum::extract::{ConnectInfo, State};
use axum::http::{header, Extensions, HeaderMap};
use axum::response::Redirect;
use axum::Form;
use serde::Deserialize;
use std::net::SocketAddr;

use crate::geo::UNKNOWN_COUNTRY;
use crate::models::{ApplicationType, CareerApplication, ContactInquiry, SubscribeOutcome, UtmTags};
use crate::server::AppState;

/// Passive request metadata recorded with a lead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub referrer: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// UTM tags found in the referring URL.
    pub utm: UtmTags,
}

fn header_str(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Client IP: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    header_str(headers, "x-real-ip").or_else(|| peer.map(|p| p.ip().to_string()))
}

/// UTM tags from the query string of `url`.
pub fn utm_from_url(url: &str) -> UtmTags {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return UtmTags::default();
    };
    let mut utm = UtmTags::default();
    for (key, value) in parsed.query_pairs() {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "utm_source" => utm.source = Some(value),
            "utm_medium" => utm.medium = Some(value),
            "utm_campaign" => utm.campaign = Some(value),
            "utm_term" => utm.term = Some(value),
            "utm_content" => utm.content = Some(value),
            _ => {}
        }
    }
    utm
}

impl RequestMeta {
    pub fn from_request(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let peer = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let referrer = header_str(headers, header::REFERER);
        let utm = referrer.as_deref().map(utm_from_url).unwrap_or_default();
        Self {
            ip_address: client_ip(headers, peer),
            user_agent: header_str(headers, header::USER_AGENT),
            referrer,
            utm,
        }
    }
}

/// UTM fields posted as hidden form inputs.
#[derive(Debug, Default)]
pub struct UtmFields {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl UtmFields {
    /// Form values win; blanks fall back to the referrer's tags.
    fn merge_over(self, fallback: UtmTags) -> UtmTags {
        UtmTags {
            source: non_blank(self.utm_source).or(fallback.source),
            medium: non_blank(self.utm_medium).or(fallback.medium),
            campaign: non_blank(self.utm_campaign).or(fallback.campaign),
            term: non_blank(self.utm_term).or(fallback.term),
            content: non_blank(self.utm_content).or(fallback.content),
        }
    }
}

/// Loose shape check: one `@`, something before it, a dot after it.
pub fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    if value.contains(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn redirect_with(path: &str, status: &str) -> Redirect {
    Redirect::to(&format!("{}?status={}", path, status))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub service_interest: Option<String>,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub project_details: Option<String>,
    /// Free-text message from the services page form.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
}

impl ContactForm {
    fn take_utm(&mut self) -> UtmFields {
        UtmFields {
            utm_source: self.utm_source.take(),
            utm_medium: self.utm_medium.take(),
            utm_campaign: self.utm_campaign.take(),
            utm_term: self.utm_term.take(),
            utm_content: self.utm_content.take(),
        }
    }
}

/// Required lead fields, trimmed; `None` when any is missing.
fn required_lead_fields(form: &ContactForm) -> Option<(String, String, String)> {
    let full_name = non_blank(form.full_name.clone())?;
    let email = non_blank(form.email.clone())?;
    let service_interest = non_blank(form.service_interest.clone())?;
    if !looks_like_email(&email) {
        return None;
    }
    Some((full_name, email, service_interest))
}

async fn save_lead(
    state: &AppState,
    mut form: ContactForm,
    meta: RequestMeta,
    inquiry_type: &str,
) -> bool {
    let Some((full_name, email, service_interest)) = required_lead_fields(&form) else {
        return false;
    };
    let utm = form.take_utm().merge_over(meta.utm);

    let country = match meta.ip_address.as_deref() {
        Some(ip) => state.geo.locate(ip).await,
        None => UNKNOWN_COUNTRY.to_string(),
    };

    let project_details = non_blank(form.project_details)
        .or(non_blank(form.message))
        .unwrap_or_else(|| {
            if inquiry_type == SERVICE_INQUIRY {
                format!("Service inquiry for: {}", service_interest)
            } else {
                String::new()
            }
        });

    let inquiry = ContactInquiry {
        full_name,
        email,
        service_interest,
        budget_range: non_blank(form.budget_range).unwrap_or_default(),
        project_details,
        inquiry_type: inquiry_type.to_string(),
        referrer: meta.referrer,
        utm,
        ip_address: meta.ip_address,
        user_agent: meta.user_agent,
        country,
    };

    match state.store.insert_contact_inquiry(&inquiry).await {
        Ok(id) => {
            tracing::info!(
                id,
                inquiry_type,
                country = %inquiry.country,
                service = %inquiry.service_interest,
                "lead captured"
            );
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to store lead");
            false
        }
    }
}

const CONTACT_FORM: &str = "Contact Form";
const SERVICE_INQUIRY: &str = "Service Inquiry";

pub async fn submit_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    Form(form): Form<ContactForm>,
) -> Redirect {
    let meta = RequestMeta::from_request(&headers, &extensions);
    if save_lead(&state, form, meta, CONTACT_FORM).await {
        redirect_with("/contact/", "success")
    } else {
        redirect_with("/contact/", "error")
    }
}

pub async fn submit_service_inquiry(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    Form(form): Form<ContactForm>,
) -> Redirect {
    let meta = RequestMeta::from_request(&headers, &extensions);
    if save_lead(&state, form, meta, SERVICE_INQUIRY).await {
        redirect_with("/services/", "success")
    } else {
        redirect_with("/services/", "error")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsletterForm {
    #[serde(default)]
    pub email: Option<String>,
}

/// Redirects home with `success`, `exists` (already subscribed), or `error`.
pub async fn subscribe_newsletter(
    State(state): State<AppState>,
    Form(form): Form<NewsletterForm>,
) -> Redirect {
    let Some(email) = non_blank(form.email).filter(|e| looks_like_email(e)) else {
        return redirect_with("/", "error");
    };

    match state.store.subscribe_newsletter(&email).await {
        Ok(SubscribeOutcome::Subscribed) | Ok(SubscribeOutcome::Reactivated) => {
            tracing::info!("newsletter subscription recorded");
            redirect_with("/", "success")
        }
        Ok(SubscribeOutcome::AlreadySubscribed) => redirect_with("/", "exists"),
        Err(e) => {
            tracing::error!(error = %e, "newsletter subscription failed");
            redirect_with("/", "error")
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CareerForm {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// `job` or `talent`.
    #[serde(default)]
    pub interest: Option<String>,
    #[serde(default)]
    pub job_position: Option<String>,
    #[serde(default)]
    pub links: Option<String>,
}

pub async fn submit_application(
    State(state): State<AppState>,
    Form(form): Form<CareerForm>,
) -> Redirect {
    let full_name = non_blank(form.full_name);
    let email = non_blank(form.email).filter(|e| looks_like_email(e));
    let kind = form
        .interest
        .as_deref()
        .and_then(ApplicationType::parse);
    let (Some(full_name), Some(email), Some(application_type)) = (full_name, email, kind) else {
        return redirect_with("/careers/", "error");
    };

    // an unknown or inactive opening is dropped, not rejected
    let job_opening_id = match form.job_position.as_deref().and_then(|j| j.trim().parse::<i64>().ok()) {
        Some(id) => match state.store.job_by_id(id).await {
            Ok(job) => job.map(|j| j.id),
            Err(e) => {
                tracing::error!(error = %e, "job lookup failed");
                return redirect_with("/careers/", "error");
            }
        },
        None => None,
    };

    let application = CareerApplication {
        full_name,
        email,
        application_type,
        job_opening_id,
        links: non_blank(form.links).unwrap_or_default(),
    };

    match state.store.insert_career_application(&application).await {
        Ok(id) => {
            tracing::info!(id, kind = application_type.as_str(), "career application received");
            redirect_with("/careers/", "success")
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to store career application");
            redirect_with("/careers/", "error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn forwarded_for_wins_over_real_ip_and_peer() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.9, 10.0.0.2"),
            ("x-real-ip", "198.51.100.7"),
        ]);
        assert_eq!(client_ip(&h, Some(peer)).as_deref(), Some("203.0.113.9"));

        let h = headers(&[("x-real-ip", "198.51.100.7")]);
        assert_eq!(client_ip(&h, Some(peer)).as_deref(), Some("198.51.100.7"));

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn utm_tags_come_from_referrer_query() {
        let utm = utm_from_url(
            "https://techlynxpro.com/contact/?utm_source=google&utm_medium=cpc&utm_campaign=spring%20sale&x=1",
        );
        assert_eq!(utm.source.as_deref(), Some("google"));
        assert_eq!(utm.medium.as_deref(), Some("cpc"));
        assert_eq!(utm.campaign.as_deref(), Some("spring sale"));
        assert!(utm.term.is_none());
        assert!(utm_from_url("not a url").is_empty());
    }

    #[test]
    fn form_utm_overrides_referrer() {
        let fields = UtmFields {
            utm_source: Some("newsletter".into()),
            utm_medium: Some("  ".into()),
            ..Default::default()
        };
        let merged = fields.merge_over(UtmTags {
            source: Some("google".into()),
            medium: Some("cpc".into()),
            ..Default::default()
        });
        assert_eq!(merged.source.as_deref(), Some("newsletter"));
        assert_eq!(merged.medium.as_deref(), Some("cpc"));
    }

    #[test]
    fn request_meta_reads_headers_and_peer() {
        let h = headers(&[
            ("referer", "https://example.com/?utm_source=x"),
            ("user-agent", "Mozilla/5.0"),
        ]);
        let mut ext = Extensions::new();
        ext.insert(ConnectInfo("93.184.216.34:443".parse::<SocketAddr>().unwrap()));
        let meta = RequestMeta::from_request(&h, &ext);
        assert_eq!(meta.ip_address.as_deref(), Some("93.184.216.34"));
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(meta.utm.source.as_deref(), Some("x"));
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("ana@example.com"));
        assert!(!looks_like_email("ana@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ana example@x.com"));
        assert!(!looks_like_email("a@b@c.com"));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let form = ContactForm {
            full_name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            service_interest: Some("   ".into()),
            ..Default::default()
        };
        assert!(required_lead_fields(&form).is_none());

        let form = ContactForm {
            full_name: Some(" Ana ".into()),
            email: Some("ana@example.com".into()),
            service_interest: Some("SEO".into()),
            ..Default::default()
        };
        assert_eq!(
            required_lead_fields(&form),
            Some(("Ana".into(), "ana@example.com".into(), "SEO".into()))
        );
    }
}
