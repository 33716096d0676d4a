use hub_core::{
    ClientError, ConfigError, HubConfig, SensorConfig, SimulatedFactory, UaValue,
};
use hub_io::SecurityString;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Contents of the `--config` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubFile {
    #[serde(default)]
    pub opcua: Vec<HubConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    /// Initial address space per hub name, used with `--simulate`.
    #[serde(default)]
    pub simulation: BTreeMap<String, BTreeMap<String, UaValue>>,
}

impl HubFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let file = Self::parse(&text)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        file.validate()?;
        Ok(file)
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Checks that need the whole file: security strings are well formed
    /// and every sensor points at a configured hub.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for hub in &self.opcua {
            hub.validate()?;
            if let Some(security) = hub.security_string.as_deref().filter(|s| !s.is_empty()) {
                security
                    .parse::<SecurityString>()
                    .map_err(|e| ConfigError::InvalidOptions {
                        name: hub.name.clone(),
                        source: ClientError::InvalidOption(format!("security_string: {e}")),
                    })?;
            }
        }

        let names: HashSet<&str> = self.opcua.iter().map(|h| h.name.as_str()).collect();
        for sensor in &self.sensors {
            if !names.contains(sensor.hub.as_str()) {
                return Err(ConfigError::UnknownHub {
                    sensor: sensor.name.clone(),
                    hub: sensor.hub.clone(),
                });
            }
        }
        Ok(())
    }

    /// Load the `simulation` section into the simulated servers of `factory`.
    pub fn seed(&self, factory: &SimulatedFactory) {
        for (hub_name, nodes) in &self.simulation {
            let Some(hub) = self.opcua.iter().find(|h| &h.name == hub_name) else {
                warn!(hub = %hub_name, "Simulation data for unknown hub ignored");
                continue;
            };
            let server = factory.server(&hub.url);
            for (node_id, value) in nodes {
                server.insert_node(node_id.clone(), value.clone());
            }
            debug!(hub = %hub_name, nodes = nodes.len(), "Simulated address space seeded");
        }
    }
}
