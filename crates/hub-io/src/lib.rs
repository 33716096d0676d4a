pub mod metrics;
#[cfg(feature = "opcua")]
pub mod opcua_client;
pub mod protocol;
pub mod security;
pub mod service;

pub use metrics::{init_metrics, record_hub, record_sensor, serve_metrics};
#[cfg(feature = "opcua")]
pub use opcua_client::{OpcuaClient, OpcuaClientFactory};
pub use protocol::{HubStatus, ServiceRequest, ServiceResponse};
pub use security::{SecurityMode, SecurityPolicy, SecurityString, SecurityStringError};
pub use service::{handle_request, run_service, ServiceConfig};
