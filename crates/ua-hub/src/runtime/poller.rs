use hub_core::{HubRegistry, SensorConfig, TagSensor};
use hub_io::record_sensor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const IDLE_TICK: Duration = Duration::from_millis(100);

struct Scheduled {
    sensor: TagSensor,
    due: Instant,
}

/// Poll one sensor and publish the outcome. Sensors on unknown hubs are skipped.
fn poll(registry: &HubRegistry, sensor: &mut TagSensor) {
    let Ok(hub) = registry.get(sensor.hub()) else {
        warn!(sensor = %sensor.name(), hub = %sensor.hub(), "Sensor hub is not registered");
        return;
    };
    let available = sensor.update(hub);
    record_sensor(
        sensor.name(),
        sensor.hub(),
        available,
        sensor.value().and_then(|v| v.as_f64()),
    );
}

/// Poll each sensor on its own scan interval until `stop` is set.
pub fn start_sensor_poller(
    registry: Arc<HubRegistry>,
    sensors: Vec<SensorConfig>,
    stop: Arc<AtomicBool>,
) -> Option<thread::JoinHandle<()>> {
    if sensors.is_empty() {
        return None;
    }
    info!(sensors = sensors.len(), "Starting sensor poller");
    Some(thread::spawn(move || {
        let now = Instant::now();
        let mut schedule: Vec<Scheduled> = sensors
            .into_iter()
            .map(|cfg| Scheduled {
                sensor: TagSensor::new(cfg),
                due: now,
            })
            .collect();

        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            for entry in schedule.iter_mut().filter(|e| e.due <= now) {
                poll(&registry, &mut entry.sensor);
                entry.due = now + entry.sensor.scan_interval();
            }
            let next = schedule.iter().map(|e| e.due).min().unwrap_or(now);
            thread::sleep(next.saturating_duration_since(Instant::now()).min(IDLE_TICK));
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{HubConfig, SimulatedFactory, UaValue};

    #[test]
    fn marks_sensors_by_read_outcome() {
        let factory = Arc::new(SimulatedFactory::new());
        factory
            .server("opc.tcp://line-a:4840")
            .insert_node("ns=2;i=5", UaValue::Double(21.5));
        let registry = HubRegistry::from_configs(
            [HubConfig::new("opc.tcp://line-a:4840").with_name("lineA")],
            factory,
        )
        .unwrap();
        registry.setup_all();
        registry.connect_all();

        let mut sensors: Vec<TagSensor> = [("oven_temp", "ns=2;i=5"), ("ghost", "ns=2;i=404")]
            .into_iter()
            .map(|(name, nodeid)| {
                TagSensor::new(SensorConfig {
                    name: name.into(),
                    nodeid: nodeid.into(),
                    hub: "lineA".into(),
                    unit_of_measurement: None,
                    device_class: None,
                    scan_interval_ms: 1000,
                })
            })
            .collect();

        for sensor in &mut sensors {
            poll(&registry, sensor);
        }
        assert!(sensors[0].is_available());
        assert_eq!(sensors[0].value(), Some(&UaValue::Double(21.5)));
        assert!(!sensors[1].is_available());
    }
}
