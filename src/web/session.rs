//! Cookie-backed session store.
//!
//! Sessions live in memory only; a restart logs everyone out. The cookie carries a
//! random session id and nothing else.
//!
//! Only sessions that carry state (a login or a failed attempt) are kept. Anonymous
//! visitors get an id and a token but no entry. Kept sessions expire after
//! [`SESSION_IDLE_TIMEOUT`] without use, and the store never holds more than
//! [`MAX_SESSIONS`]; the least recently used entry makes room for a new one.

use crate::core::auth::Session;
use crate::errors::{Error, Result};
use axum::http::{HeaderMap, header};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "queue_session";

/// Header carrying the anti-forgery token on mutating admin calls
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Unused sessions are dropped after this long
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Upper bound on stored sessions
pub const MAX_SESSIONS: usize = 10_000;

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

/// Shared map of session id to session state
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    idle_timeout: Duration,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(SESSION_IDLE_TIMEOUT, MAX_SESSIONS)
    }
}

impl SessionStore {
    /// Creates an empty store with the default limits
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that expires sessions after `idle_timeout` and keeps
    /// at most `capacity` of them (at least one).
    #[must_use]
    pub fn with_limits(idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            sessions: Arc::default(),
            idle_timeout,
            capacity: capacity.max(1),
        }
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is stored
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Returns a copy of the session, if it exists and has not expired, and marks
    /// it as used.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if self.is_expired(sessions.get(&id)?, now) {
            sessions.remove(&id);
            return None;
        }
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    /// Runs `f` on the session named by `id`, starting a fresh session when `id` is
    /// absent, unknown or expired. Returns the id actually used alongside `f`'s
    /// result.
    ///
    /// The session is stored afterwards only if it is no longer anonymous.
    pub async fn with_session<F, T>(&self, id: Option<Uuid>, f: F) -> (Uuid, T)
    where
        F: FnOnce(&mut Session) -> T,
    {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        let existing = id.and_then(|id| {
            let entry = sessions.remove(&id)?;
            (!self.is_expired(&entry, now)).then_some((id, entry.session))
        });
        let (id, mut session) = existing.unwrap_or_else(|| (Uuid::new_v4(), Session::new()));

        let result = f(&mut session);

        if !session.is_anonymous() {
            self.make_room(&mut sessions, now);
            sessions.insert(
                id,
                Entry {
                    session,
                    last_seen: now,
                },
            );
        }
        (id, result)
    }

    /// Drops a session. Unknown ids are ignored.
    pub async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    /// Checks the request's session is logged in and presented the right token.
    ///
    /// # Errors
    /// [`Error::Unauthorized`] without a logged-in session, [`Error::Forbidden`] on
    /// a missing or wrong anti-forgery token.
    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<()> {
        let session = match session_id(headers) {
            Some(id) => self.get(id).await.ok_or(Error::Unauthorized)?,
            None => return Err(Error::Unauthorized),
        };
        session.authorize(csrf_token(headers))
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.last_seen) >= self.idle_timeout
    }

    /// Drops expired sessions, then evicts least recently used ones until one
    /// more fits.
    fn make_room(&self, sessions: &mut HashMap<Uuid, Entry>, now: Instant) {
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
        }
    }
}

/// Extracts the session id from the `Cookie` header(s).
#[must_use]
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

/// Reads the anti-forgery token header.
#[must_use]
pub fn csrf_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(CSRF_HEADER).and_then(|value| value.to_str().ok())
}

/// `Set-Cookie` value binding the client to `id`.
#[must_use]
pub fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Strict")
}

/// `Set-Cookie` value that clears the session cookie.
#[must_use]
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie_header() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}; lang=en")).unwrap(),
        );

        assert_eq!(session_id(&headers), Some(id));
    }

    #[test]
    fn test_session_id_ignores_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("queue_session=not-a-uuid"),
        );
        assert_eq!(session_id(&headers), None);
    }

    #[tokio::test]
    async fn test_with_session_creates_then_reuses() {
        let store = SessionStore::new();

        let (id, ()) = store.with_session(None, |s| s.failed_logins += 1).await;
        let (same, count) = store
            .with_session(Some(id), |s| {
                s.failed_logins += 1;
                s.failed_logins
            })
            .await;

        assert_eq!(id, same);
        assert_eq!(count, 2);
        assert_eq!(store.get(id).await.unwrap().failed_logins, 2);
    }

    #[tokio::test]
    async fn test_unknown_id_gets_fresh_session() {
        let store = SessionStore::new();
        let stale = Uuid::new_v4();

        let (id, failed) = store.with_session(Some(stale), |s| s.failed_logins).await;

        assert_ne!(id, stale);
        assert_eq!(failed, 0);
    }

    #[tokio::test]
    async fn test_anonymous_sessions_are_not_stored() {
        let store = SessionStore::new();

        for _ in 0..1_000 {
            let (id, _) = store.with_session(None, |s| s.csrf_token.clone()).await;
            assert!(store.get(id).await.is_none());
        }

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_size_is_bounded() {
        let store = SessionStore::with_limits(SESSION_IDLE_TIMEOUT, 10);

        let mut ids = Vec::new();
        for _ in 0..50 {
            let (id, ()) = store.with_session(None, |s| s.failed_logins += 1).await;
            ids.push(id);
        }

        assert_eq!(store.len().await, 10);
        // The newest sessions survive, the oldest were evicted
        assert!(store.get(ids[49]).await.is_some());
        assert!(store.get(ids[0]).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::with_limits(Duration::from_millis(20), MAX_SESSIONS);
        let (idle, ()) = store.with_session(None, |s| s.failed_logins += 1).await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get(idle).await.is_none());
        let (id, failed) = store.with_session(Some(idle), |s| s.failed_logins).await;
        assert_ne!(id, idle);
        assert_eq!(failed, 0);

        // Writing a new session also sweeps out other expired ones
        let (other, ()) = store.with_session(None, |s| s.failed_logins += 1).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.with_session(None, |s| s.failed_logins += 1).await;
        assert_eq!(store.len().await, 1);
        assert!(store.get(other).await.is_none());
    }

    #[tokio::test]
    async fn test_require_admin_without_cookie() {
        let store = SessionStore::new();
        let result = store.require_admin(&HeaderMap::new()).await;
        assert!(matches!(result, Err(Error::Unauthorized)));
    }
}
