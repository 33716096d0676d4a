use crate::config::HubConfig;
use crate::error::ClientError;
use crate::value::UaValue;
use std::time::Duration;

/// Everything a hub hands to its client during setup.
///
/// Each optional field is independent: `None` leaves that aspect of the
/// client at the library default.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub session_timeout: Duration,
    pub secure_timeout: Duration,
    pub application_uri: Option<String>,
    pub security: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ClientOptions {
    pub fn from_config(config: &HubConfig) -> Self {
        fn set(value: &Option<String>) -> Option<String> {
            value.as_ref().filter(|s| !s.is_empty()).cloned()
        }
        Self {
            timeout: Duration::from_millis(config.timeout),
            session_timeout: Duration::from_millis(config.session_timeout),
            secure_timeout: Duration::from_millis(config.secure_timeout),
            application_uri: set(&config.application_uri),
            security: set(&config.security_string),
            username: set(&config.username),
            password: set(&config.password),
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timeout", &self.timeout)
            .field("session_timeout", &self.session_timeout)
            .field("secure_timeout", &self.secure_timeout)
            .field("application_uri", &self.application_uri)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One protocol client bound to one endpoint.
///
/// Calls block for at most the timeouts given in [`ClientOptions`].
/// Implementations need not be internally synchronized; the owning hub
/// serializes access.
pub trait UaClient: Send {
    fn apply_options(&mut self, options: &ClientOptions) -> Result<(), ClientError>;
    fn connect(&mut self) -> Result<(), ClientError>;
    fn disconnect(&mut self) -> Result<(), ClientError>;
    fn is_connected(&self) -> bool;
    /// Current value of the node, carrying the server's variant type.
    fn read(&mut self, node_id: &str) -> Result<UaValue, ClientError>;
    fn write(&mut self, node_id: &str, value: UaValue) -> Result<(), ClientError>;
}

/// Builds unconfigured clients for an endpoint url.
pub trait ClientFactory: Send + Sync {
    fn create(&self, url: &str) -> Result<Box<dyn UaClient>, ClientError>;
}
