use crate::config::DEFAULT_HUB_NAME;
use crate::hub::SessionHub;
use crate::value::UaValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 10_000;

/// One polled tag as declared in the hub file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub nodeid: String,
    #[serde(default = "default_hub")]
    pub hub: String,
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    /// Free-form classification for consumers, e.g. "temperature".
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_ms: u64,
}

fn default_hub() -> String {
    DEFAULT_HUB_NAME.to_string()
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_MS
}

/// Cached reading of one node, refreshed by polling its hub.
///
/// A failed read clears the cached value and marks the sensor unavailable;
/// the next good read restores it.
#[derive(Debug, Clone)]
pub struct TagSensor {
    config: SensorConfig,
    value: Option<UaValue>,
    available: bool,
}

impl TagSensor {
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            value: None,
            available: false,
        }
    }

    pub fn unique_id(&self) -> String {
        format!("opcua-{}", self.config.name)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn hub(&self) -> &str {
        &self.config.hub
    }

    pub fn node_id(&self) -> &str {
        &self.config.nodeid
    }

    pub fn unit(&self) -> Option<&str> {
        self.config.unit_of_measurement.as_deref()
    }

    pub fn device_class(&self) -> Option<&str> {
        self.config.device_class.as_deref()
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.config.scan_interval_ms.max(1))
    }

    pub fn value(&self) -> Option<&UaValue> {
        self.value.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Poll once. Returns whether the sensor is available afterwards.
    pub fn update(&mut self, hub: &SessionHub) -> bool {
        let was_available = self.available;
        match hub.read_value(&self.config.nodeid) {
            Ok(value) => {
                debug!(sensor = %self.config.name, value = %value, "Sensor updated");
                self.value = Some(value);
                self.available = true;
            }
            Err(_) => {
                self.value = None;
                self.available = false;
            }
        }
        if was_available != self.available {
            info!(
                sensor = %self.config.name,
                hub = %self.config.hub,
                available = self.available,
                "Sensor availability changed"
            );
        }
        self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_defaults() {
        let cfg: SensorConfig =
            serde_json::from_str(r#"{"name": "oven_temp", "nodeid": "ns=2;i=5"}"#).unwrap();
        assert_eq!(cfg.hub, "default");
        assert_eq!(cfg.scan_interval_ms, 10_000);
        assert!(cfg.unit_of_measurement.is_none());
        assert!(cfg.device_class.is_none());

        let sensor = TagSensor::new(cfg);
        assert_eq!(sensor.unique_id(), "opcua-oven_temp");
        assert_eq!(sensor.scan_interval(), Duration::from_secs(10));
        assert!(!sensor.is_available());
    }

    #[test]
    fn carries_unit_and_device_class() {
        let cfg: SensorConfig = serde_json::from_str(
            r#"{"name": "oven_temp", "nodeid": "ns=2;i=5",
                "unit_of_measurement": "°C", "device_class": "temperature"}"#,
        )
        .unwrap();
        let sensor = TagSensor::new(cfg);
        assert_eq!(sensor.unit(), Some("°C"));
        assert_eq!(sensor.device_class(), Some("temperature"));
    }

    #[cfg(feature = "simulation")]
    #[test]
    fn availability_follows_reads() {
        use crate::config::HubConfig;
        use crate::sim::SimulatedFactory;
        use std::sync::Arc;

        let factory = Arc::new(SimulatedFactory::new());
        let server = factory.server("opc.tcp://plc:4840");
        server.insert_node("ns=2;i=5", UaValue::Double(21.5));
        let hub = SessionHub::new(HubConfig::new("opc.tcp://plc:4840"), factory);
        hub.setup().unwrap();

        let mut sensor = TagSensor::new(SensorConfig {
            name: "oven_temp".into(),
            nodeid: "ns=2;i=5".into(),
            hub: "default".into(),
            unit_of_measurement: Some("°C".into()),
            device_class: None,
            scan_interval_ms: 500,
        });

        assert!(!sensor.update(&hub));
        assert!(sensor.value().is_none());

        hub.connect().unwrap();
        assert!(sensor.update(&hub));
        assert_eq!(sensor.value(), Some(&UaValue::Double(21.5)));

        server.set_reachable(false);
        assert!(!sensor.update(&hub));
        assert!(sensor.value().is_none());
        assert_eq!(sensor.unit(), Some("°C"));
    }
}
