//! Session lookup.

use profrag_core::config::AuthSettings;
use std::collections::HashMap;

/// User id of the terminal session.
pub const LOCAL_USER: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn local() -> Self {
        Self::new(LOCAL_USER)
    }
}

/// Source of the current user session.
pub trait SessionProvider: Send + Sync {
    fn current_session(&self) -> Option<Session>;
}

/// A session resolved ahead of time (or its absence).
impl SessionProvider for Option<Session> {
    fn current_session(&self) -> Option<Session> {
        self.clone()
    }
}

/// Always the local user.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSession;

impl SessionProvider for LocalSession {
    fn current_session(&self) -> Option<Session> {
        Some(Session::local())
    }
}

/// Bearer token to user mapping from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuth {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.tokens.clone())
    }

    /// Resolve an `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>) -> Option<Session> {
        let token = header?.trim().strip_prefix("Bearer ")?.trim();
        self.tokens.get(token).map(Session::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> StaticTokenAuth {
        let mut tokens = HashMap::new();
        tokens.insert("secret-1".to_string(), "alice".to_string());
        StaticTokenAuth::new(tokens)
    }

    #[test]
    fn test_bearer_token_resolves_user() {
        let session = auth().authenticate(Some("Bearer secret-1")).unwrap();
        assert_eq!(session.user_id, "alice");
    }

    #[test]
    fn test_unknown_or_missing_token() {
        assert!(auth().authenticate(Some("Bearer nope")).is_none());
        assert!(auth().authenticate(Some("secret-1")).is_none());
        assert!(auth().authenticate(None).is_none());
    }

    #[test]
    fn test_providers() {
        assert_eq!(LocalSession.current_session(), Some(Session::local()));
        let none: Option<Session> = None;
        assert!(none.current_session().is_none());
    }
}
