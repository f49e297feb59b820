//! Token persistence in the OS keychain.
//!
//! Each token lives in its own keychain entry under the `quill` service. An
//! in-process lock serializes access so no reader sees a half-written pair.

#[cfg(test)]
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use keyring::Entry;
use quill_core::error::{ApiError, Result};
use quill_core::tokens::{validate_token, TokenName, TokenPair, TokenStore};

pub const KEYRING_SERVICE_NAME: &str = "quill";

enum Backend {
    Keychain,
    #[cfg(test)]
    Memory {
        entries: Mutex<HashMap<TokenName, String>>,
        failing_write: Option<TokenName>,
    },
}

pub struct KeyringTokenStore {
    service: String,
    lock: Mutex<()>,
    backend: Backend,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE_NAME)
    }
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            lock: Mutex::new(()),
            backend: Backend::Keychain,
        }
    }

    #[cfg(test)]
    fn in_memory(failing_write: Option<TokenName>) -> Self {
        Self {
            service: KEYRING_SERVICE_NAME.to_string(),
            lock: Mutex::new(()),
            backend: Backend::Memory {
                entries: Mutex::new(HashMap::new()),
                failing_write,
            },
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, name: TokenName) -> Result<Entry> {
        Entry::new(&self.service, name.key()).map_err(|error| storage_error(name, &error))
    }

    fn read(&self, name: TokenName) -> Result<Option<String>> {
        match &self.backend {
            Backend::Keychain => match self.entry(name)?.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(error) => Err(storage_error(name, &error)),
            },
            #[cfg(test)]
            Backend::Memory { entries, .. } => Ok(lock_entries(entries).get(&name).cloned()),
        }
    }

    fn write(&self, name: TokenName, value: &str) -> Result<()> {
        match &self.backend {
            Backend::Keychain => self
                .entry(name)?
                .set_password(value)
                .map_err(|error| storage_error(name, &error)),
            #[cfg(test)]
            Backend::Memory {
                entries,
                failing_write,
            } => {
                if *failing_write == Some(name) {
                    return Err(storage_error(name, &"keychain locked"));
                }
                lock_entries(entries).insert(name, value.to_string());
                Ok(())
            }
        }
    }

    fn delete(&self, name: TokenName) -> Result<()> {
        match &self.backend {
            Backend::Keychain => match self.entry(name)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(error) => Err(storage_error(name, &error)),
            },
            #[cfg(test)]
            Backend::Memory { entries, .. } => {
                lock_entries(entries).remove(&name);
                Ok(())
            }
        }
    }

    fn clear_locked(&self) -> Result<()> {
        let access = self.delete(TokenName::Access);
        let refresh = self.delete(TokenName::Refresh);
        access.and(refresh)
    }
}

impl TokenStore for KeyringTokenStore {
    fn save(&self, access: &str, refresh: &str) -> Result<()> {
        validate_token(TokenName::Access, access)?;
        validate_token(TokenName::Refresh, refresh)?;

        let _guard = self.guard();
        // A failed first write leaves the previous pair intact.
        self.write(TokenName::Refresh, refresh)?;
        if let Err(error) = self.write(TokenName::Access, access) {
            if let Err(clear_error) = self.clear_locked() {
                tracing::warn!("Failed to roll back partial token save: {}", clear_error);
            }
            return Err(error);
        }
        Ok(())
    }

    fn get(&self, name: TokenName) -> Result<Option<String>> {
        let _guard = self.guard();
        self.read(name)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        self.clear_locked()
    }

    fn load_pair(&self) -> Result<Option<TokenPair>> {
        let _guard = self.guard();
        let access = self.read(TokenName::Access)?;
        let refresh = self.read(TokenName::Refresh)?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
            _ => None,
        })
    }
}

impl std::fmt::Debug for KeyringTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringTokenStore")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
fn lock_entries(
    entries: &Mutex<HashMap<TokenName, String>>,
) -> MutexGuard<'_, HashMap<TokenName, String>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn storage_error(name: TokenName, error: &dyn std::fmt::Display) -> ApiError {
    ApiError::Storage(format!("Keychain access for {name} failed: {error}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn seeded(failing_write: Option<TokenName>) -> KeyringTokenStore {
        let store = KeyringTokenStore::in_memory(failing_write);
        if let Backend::Memory { entries, .. } = &store.backend {
            let mut entries = lock_entries(entries);
            entries.insert(TokenName::Access, "old-access".to_string());
            entries.insert(TokenName::Refresh, "old-refresh".to_string());
        }
        store
    }

    #[test]
    fn saves_and_clears_both_entries() {
        let store = KeyringTokenStore::in_memory(None);
        store.save("access-1", "refresh-1").unwrap();
        assert_eq!(
            store.load_pair().unwrap(),
            Some(TokenPair::new("access-1", "refresh-1"))
        );
        assert_eq!(
            store.get(TokenName::Refresh).unwrap().as_deref(),
            Some("refresh-1")
        );

        store.clear().unwrap();
        assert_eq!(store.load_pair().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn failed_access_write_rolls_back_the_pair() {
        let store = seeded(Some(TokenName::Access));

        let error = store.save("new-access", "new-refresh").unwrap_err();

        assert!(matches!(error, ApiError::Storage(_)));
        assert_eq!(store.get(TokenName::Access).unwrap(), None);
        assert_eq!(store.get(TokenName::Refresh).unwrap(), None);
    }

    #[test]
    fn failed_refresh_write_keeps_previous_pair() {
        let store = seeded(Some(TokenName::Refresh));

        assert!(store.save("new-access", "new-refresh").is_err());
        assert_eq!(
            store.load_pair().unwrap(),
            Some(TokenPair::new("old-access", "old-refresh"))
        );
    }

    #[test]
    fn blank_tokens_are_rejected() {
        let store = KeyringTokenStore::in_memory(None);
        assert!(store.save(" ", "refresh").is_err());
        assert_eq!(store.load_pair().unwrap(), None);
    }

    /// Needs an unlocked OS keychain (Keychain, Credential Manager or the
    /// kernel keyutils session keyring).
    #[test]
    #[ignore = "writes to the OS keychain"]
    fn keychain_pair_is_visible_to_a_fresh_store() {
        let service = format!("quill-test-{}", std::process::id());
        let writer = KeyringTokenStore::new(service.as_str());
        writer.save("access-1", "refresh-1").unwrap();

        let reader = KeyringTokenStore::new(service.as_str());
        let loaded = reader.load_pair();
        reader.clear().unwrap();

        assert_eq!(
            loaded.unwrap(),
            Some(TokenPair::new("access-1", "refresh-1"))
        );
        assert_eq!(writer.load_pair().unwrap(), None);
    }
}
