use crate::client::ClientFactory;
use crate::config::{HubConfig, DEFAULT_HUB_NAME};
use crate::error::{ConfigError, HubError};
use crate::hub::SessionHub;
use crate::value::{InputValue, UaValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a bulk lifecycle action, one entry per hub in registration order.
pub type BulkOutcome = Vec<(String, Result<(), HubError>)>;

/// Named hubs, populated once at startup and read-only afterwards.
///
/// Share it as `Arc<HubRegistry>`; lookups need no lock.
#[derive(Debug, Default)]
pub struct HubRegistry {
    hubs: Vec<Arc<SessionHub>>,
    by_name: HashMap<String, usize>,
}

impl HubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register one hub per config, all sharing `factory`.
    pub fn from_configs(
        configs: impl IntoIterator<Item = HubConfig>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for config in configs {
            config.validate()?;
            registry.register(SessionHub::new(config, Arc::clone(&factory)))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, hub: SessionHub) -> Result<Arc<SessionHub>, ConfigError> {
        let name = hub.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(ConfigError::DuplicateName(name));
        }
        let hub = Arc::new(hub);
        info!(hub = %name, url = %hub.config().url, "Hub registered");
        self.by_name.insert(name, self.hubs.len());
        self.hubs.push(Arc::clone(&hub));
        Ok(hub)
    }

    pub fn get(&self, name: &str) -> Result<&Arc<SessionHub>, HubError> {
        self.by_name
            .get(name)
            .map(|&index| &self.hubs[index])
            .ok_or_else(|| HubError::HubNotFound(name.to_string()))
    }

    /// Routing lookup: an omitted name means the "default" hub.
    pub fn resolve(&self, name: Option<&str>) -> Result<&Arc<SessionHub>, HubError> {
        let result = self.get(name.unwrap_or(DEFAULT_HUB_NAME));
        if let Err(e) = &result {
            warn!(error = %e, "Request for unknown hub");
        }
        result
    }

    pub fn set_value(
        &self,
        hub: Option<&str>,
        node_id: &str,
        value: &InputValue,
    ) -> Result<UaValue, HubError> {
        self.resolve(hub)?.write_value(node_id, value)
    }

    pub fn read_value(&self, hub: Option<&str>, node_id: &str) -> Result<UaValue, HubError> {
        self.resolve(hub)?.read_value(node_id)
    }

    pub fn connect(&self, hub: Option<&str>) -> Result<(), HubError> {
        self.resolve(hub)?.connect()
    }

    pub fn close(&self, hub: Option<&str>) -> Result<(), HubError> {
        self.resolve(hub)?.close()
    }

    pub fn for_each<F: FnMut(&SessionHub)>(&self, mut action: F) {
        for hub in &self.hubs {
            action(hub);
        }
    }

    fn bulk<F>(&self, action: F) -> BulkOutcome
    where
        F: Fn(&SessionHub) -> Result<(), HubError>,
    {
        let mut outcome = Vec::with_capacity(self.hubs.len());
        self.for_each(|hub| outcome.push((hub.name().to_string(), action(hub))));
        outcome
    }

    pub fn setup_all(&self) -> BulkOutcome {
        self.bulk(SessionHub::setup)
    }

    pub fn connect_all(&self) -> BulkOutcome {
        self.bulk(SessionHub::connect)
    }

    pub fn close_all(&self) -> BulkOutcome {
        self.bulk(SessionHub::close)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hubs.iter().map(|hub| hub.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SessionHub>> {
        self.hubs.iter()
    }

    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}
