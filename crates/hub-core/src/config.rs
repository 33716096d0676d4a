use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HUB_NAME: &str = "default";
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 3_600_000;
pub const DEFAULT_SECURE_TIMEOUT_MS: u64 = 600_000;

/// Connection settings for one OPC UA endpoint. Timeouts are milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    pub url: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,
    #[serde(default = "default_secure_timeout")]
    pub secure_timeout: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub security_string: Option<String>,
    #[serde(default)]
    pub application_uri: Option<String>,
}

fn default_name() -> String {
    DEFAULT_HUB_NAME.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_session_timeout() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_secure_timeout() -> u64 {
    DEFAULT_SECURE_TIMEOUT_MS
}

impl HubConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: default_name(),
            timeout: DEFAULT_TIMEOUT_MS,
            session_timeout: DEFAULT_SESSION_TIMEOUT_MS,
            secure_timeout: DEFAULT_SECURE_TIMEOUT_MS,
            username: None,
            password: None,
            security_string: None,
            application_uri: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl {
                name: self.name.clone(),
            });
        }
        for (field, value) in [
            ("timeout", self.timeout),
            ("session_timeout", self.session_timeout),
            ("secure_timeout", self.secure_timeout),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidTimeout {
                    name: self.name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("session_timeout", &self.session_timeout)
            .field("secure_timeout", &self.secure_timeout)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("security_string", &self.security_string)
            .field("application_uri", &self.application_uri)
            .finish()
    }
}
