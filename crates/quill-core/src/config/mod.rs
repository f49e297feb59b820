//! Client configuration.
//!
//! `ClientConfig` describes where the backend lives and how the HTTP stack
//! behaves (timeouts, refresh queue bound, endpoint paths). Values come from
//! built-in defaults, then an optional JSON file, then environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::util::{is_http_url, normalize_path, normalize_text_option};

const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 64;

pub const ENV_API_URL: &str = "QUILL_API_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "QUILL_REQUEST_TIMEOUT_SECS";
pub const ENV_REFRESH_TIMEOUT_SECS: &str = "QUILL_REFRESH_TIMEOUT_SECS";
pub const ENV_MAX_PENDING_REQUESTS: &str = "QUILL_MAX_PENDING_REQUESTS";

/// Paths of the endpoints the auth layer treats specially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointPaths {
    pub login: String,
    pub register: String,
    pub google: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            login: "/api/login".to_string(),
            register: "/api/register".to_string(),
            google: "/api/google".to_string(),
            refresh: "/api/refresh".to_string(),
            logout: "/api/logout".to_string(),
        }
    }
}

impl EndpointPaths {
    /// Endpoints reachable without a bearer token.
    pub fn public_paths(&self) -> Vec<String> {
        [&self.login, &self.register, &self.google, &self.refresh]
            .into_iter()
            .map(|path| normalize_path(path))
            .collect()
    }

    fn normalize(&mut self) {
        for path in [
            &mut self.login,
            &mut self.register,
            &mut self.google,
            &mut self.refresh,
            &mut self.logout,
        ] {
            *path = normalize_path(path);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub max_pending_requests: usize,
    pub endpoints: EndpointPaths,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            endpoints: EndpointPaths::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut config = Self {
            base_url: base_url.into(),
            ..Self::default()
        };
        config.normalize()?;
        Ok(config)
    }

    /// Defaults, then the config file at `path` (if it exists), then the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(default_config_path, Path::to_path_buf);
        let mut config = Self::load_from_path(&path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.normalize()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No client config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            ApiError::Configuration(format!(
                "Failed to read config at {}: {}",
                path.display(),
                error
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            ApiError::Configuration(format!(
                "Failed to parse config at {}: {}",
                path.display(),
                error
            ))
        })?;
        config.normalize()?;
        Ok(config)
    }

    /// Override fields from environment-style lookups.
    ///
    /// Takes a lookup function so tests do not have to mutate the process
    /// environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.base_url = url;
        }
        if let Some(secs) = parse_env_number(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = parse_env_number(&lookup, ENV_REFRESH_TIMEOUT_SECS)? {
            self.refresh_timeout_secs = secs;
        }
        if let Some(limit) = parse_env_number(&lookup, ENV_MAX_PENDING_REQUESTS)? {
            self.max_pending_requests = limit;
        }
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn normalize(&mut self) -> Result<()> {
        self.base_url = normalize_base_url(&self.base_url)?;
        if self.request_timeout_secs == 0 {
            return Err(ApiError::Configuration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(ApiError::Configuration(
                "refresh_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_pending_requests == 0 {
            return Err(ApiError::Configuration(
                "max_pending_requests must be greater than zero".to_string(),
            ));
        }
        self.endpoints.normalize();
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(ApiError::Configuration(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(&base) {
        return Err(ApiError::Configuration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}

fn parse_env_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ApiError::Configuration(format!("{name} must be a number, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("api.example.com").is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url(" https://api.example.com/ ").unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn public_paths_cover_auth_endpoints() {
        let paths = EndpointPaths::default().public_paths();
        assert_eq!(
            paths,
            vec!["/api/login", "/api/register", "/api/google", "/api/refresh"]
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let env = HashMap::from([
            (ENV_API_URL, "https://notes.example.com/"),
            (ENV_REFRESH_TIMEOUT_SECS, "5"),
            (ENV_MAX_PENDING_REQUESTS, "8"),
        ]);
        let mut config = ClientConfig::default();
        config
            .apply_env(|name| env.get(name).map(ToString::to_string))
            .unwrap();
        config.normalize().unwrap();

        assert_eq!(config.base_url, "https://notes.example.com");
        assert_eq!(config.refresh_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_pending_requests, 8);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn env_rejects_non_numeric_timeouts() {
        let mut config = ClientConfig::default();
        let error = config
            .apply_env(|name| (name == ENV_REQUEST_TIMEOUT_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(error.to_string().contains(ENV_REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn load_from_path_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "base_url": " https://api.example.com/ ",
                "endpoints": { "refresh": "api/token/refresh/" }
            }"#,
        )
        .unwrap();

        let loaded = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.base_url, "https://api.example.com");
        assert_eq!(loaded.endpoints.refresh, "/api/token/refresh");
        assert_eq!(loaded.endpoints.login, "/api/login");
    }

    #[test]
    fn zero_pending_limit_is_rejected() {
        let mut config = ClientConfig {
            max_pending_requests: 0,
            ..ClientConfig::default()
        };
        let error = config.normalize().unwrap_err();
        assert!(error.to_string().contains("max_pending_requests"));

        let env = HashMap::from([(ENV_MAX_PENDING_REQUESTS, "0")]);
        let mut config = ClientConfig::default();
        config
            .apply_env(|name| env.get(name).map(ToString::to_string))
            .unwrap();
        assert!(config.normalize().is_err());
    }

    #[test]
    fn load_from_missing_path_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ClientConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, ClientConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "base_url": "https://a.example", "extra": 1 }"#).unwrap();
        let error = ClientConfig::load_from_path(&path).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }
}
