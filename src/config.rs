use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub refresh: RefreshConfig,
    pub routes: RouteConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the U:NEAR API for this deployment environment
    pub base_url: String,
    /// Per-request timeout applied by the HTTP client
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Access tokens expiring within this window are refreshed before use
    pub expiry_threshold_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Path unauthenticated navigations are redirected to
    pub login_path: String,
    /// First-run entry point (first-run routing is disabled when unset)
    pub onboarding_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the persisted token database
    pub data_dir: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.unear.app".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            expiry_threshold_secs: 300, // 5 minutes
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            onboarding_path: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var("UNEAR_API_URL").unwrap_or_else(|_| ApiConfig::default().base_url);

        let request_timeout_secs = std::env::var("UNEAR_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let expiry_threshold_secs = std::env::var("UNEAR_REFRESH_THRESHOLD_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let data_dir = std::env::var("UNEAR_DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let login_path =
            std::env::var("UNEAR_LOGIN_PATH").unwrap_or_else(|_| "/login".to_string());

        let onboarding_path = std::env::var("UNEAR_ONBOARDING_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let config = Config {
            api: ApiConfig {
                base_url,
                request_timeout_secs,
            },
            refresh: RefreshConfig {
                expiry_threshold_secs,
            },
            routes: RouteConfig {
                login_path,
                onboarding_path,
            },
            storage: StorageConfig { data_dir },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "UNEAR_API_URL cannot be empty".to_string(),
            ));
        }

        if let Err(e) = reqwest::Url::parse(&self.api.base_url) {
            return Err(ConfigError::ValidationError(format!(
                "UNEAR_API_URL is not a valid URL ({}): {e}",
                self.api.base_url
            )));
        }

        if !self.routes.login_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "UNEAR_LOGIN_PATH must be an absolute path, got '{}'",
                self.routes.login_path
            )));
        }

        if self.refresh.expiry_threshold_secs == 0 {
            tracing::warn!(
                "Refresh threshold is 0 seconds. Tokens will only be renewed after they \
                 have already expired, so protected calls may race token expiry."
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            api: ApiConfig::default(),
            refresh: RefreshConfig::default(),
            routes: RouteConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_base_url() {
        let mut config = base_config();
        config.api.base_url = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_base_url() {
        let mut config = base_config();
        config.api.base_url = "api.unear.app/v1".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_login_path() {
        let mut config = base_config();
        config.routes.login_path = "login".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_zero_threshold() {
        let mut config = base_config();
        config.refresh.expiry_threshold_secs = 0;

        assert!(config.validate().is_ok());
    }
}
