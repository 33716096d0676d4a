use crate::infra::audit::{AuditEventType, AuditLogger};
use hub_core::HubRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const STOP_CHECK: Duration = Duration::from_millis(100);

/// Reconnect every hub that has lost its session. Returns the names of
/// the hubs that came back.
pub fn reconnect_dropped(registry: &HubRegistry, audit: Option<&AuditLogger>) -> Vec<String> {
    let mut restored = Vec::new();
    for hub in registry.iter().filter(|hub| !hub.is_connected()) {
        debug!(hub = %hub.name(), "Attempting reconnect");
        let (event, details) = match hub.connect() {
            Ok(()) => {
                info!(hub = %hub.name(), "Hub reconnected");
                restored.push(hub.name().to_string());
                (
                    AuditEventType::HubReconnected,
                    serde_json::json!({ "hub": hub.name() }),
                )
            }
            Err(e) => (
                AuditEventType::HubReconnectFailed,
                serde_json::json!({ "hub": hub.name(), "error": e.to_string() }),
            ),
        };
        if let Some(logger) = audit {
            let _ = logger.log_event(event, details);
        }
    }
    restored
}

/// Opt-in reconnect loop. Hubs never retry on their own.
pub fn start_supervisor(
    registry: Arc<HubRegistry>,
    interval: Duration,
    audit: Option<Arc<AuditLogger>>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting reconnect supervisor");
    thread::spawn(move || {
        let mut next = Instant::now() + interval;
        while !stop.load(Ordering::Relaxed) {
            if Instant::now() >= next {
                reconnect_dropped(&registry, audit.as_deref());
                next = Instant::now() + interval;
            }
            thread::sleep(STOP_CHECK);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{HubConfig, SimulatedFactory};

    #[test]
    fn only_dropped_hubs_are_reconnected() {
        let factory = Arc::new(SimulatedFactory::new());
        let line_a = factory.server("opc.tcp://line-a:4840");
        let line_b = factory.server("opc.tcp://line-b:4840");
        let registry = HubRegistry::from_configs(
            [
                HubConfig::new("opc.tcp://line-a:4840").with_name("lineA"),
                HubConfig::new("opc.tcp://line-b:4840").with_name("lineB"),
            ],
            factory,
        )
        .unwrap();
        registry.setup_all();
        registry.connect_all();

        line_a.set_reachable(false);
        assert!(reconnect_dropped(&registry, None).is_empty());

        line_a.set_reachable(true);
        assert_eq!(reconnect_dropped(&registry, None), ["lineA"]);
        assert_eq!(line_b.connect_attempts(), 1);
        assert!(registry.iter().all(|hub| hub.is_connected()));
    }
}
