pub mod accessor;
pub mod client;
pub mod coerce;
mod coerce_proptest;
pub mod config;
pub mod error;
pub mod hub;
pub mod registry;
pub mod sensor;
#[cfg(feature = "simulation")]
pub mod sim;
pub mod value;

pub use accessor::NodeValueAccessor;
pub use client::{ClientFactory, ClientOptions, UaClient};
pub use coerce::coerce;
pub use config::{HubConfig, DEFAULT_HUB_NAME};
pub use error::{ClientError, CoercionError, ConfigError, HubError, WriteError};
pub use hub::{HubStats, SessionHub};
pub use registry::{BulkOutcome, HubRegistry};
pub use sensor::{SensorConfig, TagSensor};
#[cfg(feature = "simulation")]
pub use sim::{SimulatedClient, SimulatedFactory, SimulatedServer};
pub use value::{InputValue, UaValue, VariantType};
