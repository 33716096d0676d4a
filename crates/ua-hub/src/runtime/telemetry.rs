use hub_core::HubRegistry;
use hub_io::metrics::{init_metrics, record_hub, serve_metrics, HUBS_CONNECTED};
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;
use std::time::Duration;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Copy hub state into the metrics registry once.
pub fn publish(registry: &HubRegistry) {
    let mut connected = 0;
    for hub in registry.iter() {
        let is_connected = hub.is_connected();
        connected += i64::from(is_connected);
        record_hub(hub.name(), is_connected, &hub.stats());
    }
    HUBS_CONNECTED.set(connected);
}

pub fn start_metrics_updater(
    registry: Arc<HubRegistry>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(std::sync::atomic::Ordering::Relaxed) {
            publish(&registry);
            thread::sleep(Duration::from_millis(500));
        }
        publish(&registry);
    })
}
