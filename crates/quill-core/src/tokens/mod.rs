//! Access/refresh token persistence.
//!
//! Every front end supplies its own [`TokenStore`] (OS keyring on desktop and
//! CLI, platform secure storage on mobile); the HTTP stack only talks to the
//! trait. Implementations must keep the pair consistent: either both tokens
//! are stored or neither is.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Secure-storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Secure-storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenName {
    Access,
    Refresh,
}

impl TokenName {
    /// Fixed storage key for this token.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Access => ACCESS_TOKEN_KEY,
            Self::Refresh => REFRESH_TOKEN_KEY,
        }
    }
}

impl fmt::Display for TokenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Durable storage for the two bearer credentials.
///
/// Calls are synchronous; secure-storage backends (keychain, keystore) expose
/// blocking APIs and answer quickly.
pub trait TokenStore: Send + Sync + 'static {
    /// Persist both tokens. No reader may observe only one of them updated.
    fn save(&self, access: &str, refresh: &str) -> Result<()>;

    /// Read one token, `None` when it was never set or has been cleared.
    fn get(&self, name: TokenName) -> Result<Option<String>>;

    /// Remove both tokens. Removing absent tokens succeeds.
    fn clear(&self) -> Result<()>;

    /// Both tokens, or `None` unless both are present.
    fn load_pair(&self) -> Result<Option<TokenPair>> {
        let access = self.get(TokenName::Access)?;
        let refresh = self.get(TokenName::Refresh)?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
            _ => None,
        })
    }
}

/// In-process token store. Used by tests and by front ends that keep the
/// session for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            tokens: Mutex::new(Some(TokenPair::new(access, refresh))),
        }
    }

    pub fn snapshot(&self) -> Option<TokenPair> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for MemoryTokenStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MemoryTokenStore")
            .field("tokens", &self.snapshot())
            .finish()
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, access: &str, refresh: &str) -> Result<()> {
        validate_token(TokenName::Access, access)?;
        validate_token(TokenName::Refresh, refresh)?;
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(TokenPair::new(access, refresh));
        Ok(())
    }

    fn get(&self, name: TokenName) -> Result<Option<String>> {
        let guard = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.as_ref().map(|pair| match name {
            TokenName::Access => pair.access.clone(),
            TokenName::Refresh => pair.refresh.clone(),
        }))
    }

    fn clear(&self) -> Result<()> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn load_pair(&self) -> Result<Option<TokenPair>> {
        Ok(self.snapshot())
    }
}

/// Reject blank tokens before they reach storage.
pub fn validate_token(name: TokenName, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Storage(format!("{name} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn memory_store_saves_and_reads_both_tokens() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(TokenName::Access).unwrap(), None);

        store.save("access-1", "refresh-1").unwrap();
        assert_eq!(
            store.get(TokenName::Access).unwrap().as_deref(),
            Some("access-1")
        );
        assert_eq!(
            store.get(TokenName::Refresh).unwrap().as_deref(),
            Some("refresh-1")
        );
        assert_eq!(
            store.load_pair().unwrap(),
            Some(TokenPair::new("access-1", "refresh-1"))
        );
    }

    #[test]
    fn memory_store_clear_removes_both_tokens() {
        let store = MemoryTokenStore::with_tokens("access", "refresh");
        store.clear().unwrap();
        assert_eq!(store.load_pair().unwrap(), None);
        assert_eq!(store.get(TokenName::Refresh).unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn blank_tokens_are_rejected_without_touching_state() {
        let store = MemoryTokenStore::with_tokens("access", "refresh");
        let error = store.save("  ", "refresh-2").unwrap_err();
        assert!(error.to_string().contains("access_token must not be empty"));
        assert_eq!(
            store.snapshot(),
            Some(TokenPair::new("access", "refresh"))
        );
    }

    #[test]
    fn token_pair_debug_redacts_values() {
        let pair = TokenPair::new("secret-access-token", "secret-refresh-token");
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn token_names_map_to_fixed_keys() {
        assert_eq!(TokenName::Access.key(), "access_token");
        assert_eq!(TokenName::Refresh.key(), "refresh_token");
    }
}
