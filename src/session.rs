//! Visitor sessions.
//!
//! A session is identified by a random UUID carried in a signed cookie
//! (`<id>.<hex hmac-sha256(id)>`). Session data lives in process memory;
//! a restart or a tampered cookie simply starts a fresh session.
//!
//! Resolving a request never stores anything. An entry is created the
//! first time [`SessionStore::with_session`] records data for an id, and
//! the store holds at most [`MAX_SESSIONS`] entries.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::SessionConfig;
use crate::ratelimit::epoch_secs;

type HmacSha256 = Hmac<Sha256>;

/// Entry cap; the least recently seen sessions are evicted beyond it.
pub const MAX_SESSIONS: usize = 10_000;

/// Per-visitor state.
#[derive(Debug, Default, Clone)]
pub struct SessionData {
    /// Epoch seconds of recent chat requests.
    pub chat_timestamps: Vec<f64>,
    pub last_seen: f64,
}

/// A resolved session for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: String,
    /// True when the request carried no valid cookie; the response must
    /// then set one.
    pub is_new: bool,
}

pub struct SessionStore {
    secret: Vec<u8>,
    cookie_name: String,
    max_age_secs: u64,
    max_entries: usize,
    sessions: Mutex<HashMap<String, SessionData>>,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
            cookie_name: config.cookie_name.clone(),
            max_age_secs: config.max_age_secs,
            max_entries: MAX_SESSIONS,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Cookie value for a session id.
    pub fn sign(&self, id: &str) -> String {
        let sig = hmac_sha256(&self.secret, id.as_bytes())
            .finalize()
            .into_bytes();
        format!("{}.{}", id, hex::encode(sig))
    }

    /// Returns the session id if `value` carries a valid signature.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, sig_hex) = value.rsplit_once('.')?;
        let sig = hex::decode(sig_hex).ok()?;
        hmac_sha256(&self.secret, id.as_bytes())
            .verify_slice(&sig)
            .ok()?;
        Some(id.to_string())
    }

    fn cookie_value<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value)
    }

    /// Resolves the request's session. A missing or forged cookie gets a
    /// fresh id; a valid signature keeps its id even if this process has
    /// no data for it (e.g. after a restart).
    pub fn resolve(&self, headers: &HeaderMap) -> SessionHandle {
        match self.cookie_value(headers).and_then(|v| self.verify(v)) {
            Some(id) => SessionHandle { id, is_new: false },
            None => SessionHandle {
                id: uuid::Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }

    /// Runs `f` against the session's data under the store lock, creating
    /// the entry on first use.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let now = epoch_secs();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if !sessions.contains_key(id) {
            self.make_room(&mut sessions, now);
        }
        let data = sessions.entry(id.to_string()).or_default();
        data.last_seen = now;
        f(data)
    }

    /// Drops expired sessions, then the least recently seen ones until a
    /// new entry fits under the cap.
    fn make_room(&self, sessions: &mut HashMap<String, SessionData>, now: f64) {
        let max_age = self.max_age_secs as f64;
        sessions.retain(|_, data| now - data.last_seen < max_age);

        while !sessions.is_empty() && sessions.len() >= self.max_entries {
            let oldest = sessions
                .iter()
                .min_by(|a, b| a.1.last_seen.total_cmp(&b.1.last_seen))
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }

    /// `Set-Cookie` header value for `handle`.
    pub fn set_cookie(&self, handle: &SessionHandle) -> Option<HeaderValue> {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            self.sign(&handle.id),
            self.max_age_secs
        );
        HeaderValue::from_str(&cookie).ok()
    }

    /// Appends the session cookie to `headers` when the session is new.
    pub fn attach(&self, handle: &SessionHandle, headers: &mut HeaderMap) {
        if handle.is_new {
            if let Some(value) = self.set_cookie(handle) {
                headers.append(SET_COOKIE, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig {
            secret: "test-secret".into(),
            cookie_name: "sid".into(),
            max_age_secs: 3600,
        })
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn signed_value_round_trips() {
        let s = store();
        let signed = s.sign("abc");
        assert_eq!(s.verify(&signed).as_deref(), Some("abc"));
    }

    #[test]
    fn tampered_cookie_starts_new_session() {
        let s = store();
        let first = s.resolve(&HeaderMap::new());
        assert!(first.is_new);

        let mut forged = s.sign(&first.id);
        forged.replace_range(0..1, if forged.starts_with('0') { "1" } else { "0" });
        let handle = s.resolve(&cookie_headers(&format!("sid={}", forged)));
        assert!(handle.is_new);
        assert_ne!(handle.id, first.id);
    }

    #[test]
    fn valid_cookie_resumes_session() {
        let s = store();
        let first = s.resolve(&HeaderMap::new());
        s.with_session(&first.id, |data| data.chat_timestamps.push(1.0));

        let header = format!("theme=dark; sid={}", s.sign(&first.id));
        let again = s.resolve(&cookie_headers(&header));
        assert_eq!(again, SessionHandle { id: first.id.clone(), is_new: false });
        assert_eq!(s.with_session(&again.id, |d| d.chat_timestamps.len()), 1);
    }

    #[test]
    fn secret_change_invalidates_cookie() {
        let signed = store().sign("abc");
        let other = SessionStore::new(&SessionConfig {
            secret: "rotated".into(),
            cookie_name: "sid".into(),
            max_age_secs: 3600,
        });
        assert!(other.verify(&signed).is_none());
    }

    #[test]
    fn resolving_stores_nothing() {
        let s = store();
        for _ in 0..500 {
            let handle = s.resolve(&HeaderMap::new());
            assert!(handle.is_new);
        }
        assert!(s.is_empty());
    }

    #[test]
    fn entry_count_is_capped() {
        let mut s = store();
        s.max_entries = 3;
        let now = epoch_secs();
        for i in 0..5 {
            s.with_session(&format!("s{}", i), |d| d.last_seen = now - 10.0 + i as f64);
        }
        assert_eq!(s.len(), 3);
        let sessions = s.sessions.lock().unwrap();
        assert!(!sessions.contains_key("s0") && !sessions.contains_key("s1"));
        assert!(sessions.contains_key("s4"));
    }

    #[test]
    fn expired_sessions_are_pruned_on_insert() {
        let s = store();
        s.with_session("stale", |d| d.last_seen = epoch_secs() - 7200.0);
        s.with_session("fresh", |_| ());
        assert_eq!(s.len(), 1);
        assert_eq!(s.with_session("fresh", |d| d.chat_timestamps.len()), 0);
    }

    #[test]
    fn new_sessions_get_a_cookie() {
        let s = store();
        let handle = s.resolve(&HeaderMap::new());
        let mut headers = HeaderMap::new();
        s.attach(&handle, &mut headers);
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("sid={}.", handle.id)));
        assert!(cookie.contains("HttpOnly"));
    }
}
