use crate::infra::audit::{outcome_details, AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::hubfile::HubFile;
use crate::runtime::logging::init_tracing;
use crate::runtime::{poller, supervisor, telemetry};
use hub_core::{BulkOutcome, ClientFactory, ConfigError, HubRegistry, SimulatedFactory};
use hub_io::service::{bind, run_service, ServiceConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

const STOP_CHECK: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("audit log {path}: {source}")]
    Audit {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn run_from_args() {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return;
    }
    if let Err(e) = run(config) {
        error!(error = %e, "ua-hub failed to start");
        eprintln!("ua-hub: {e}");
        std::process::exit(1);
    }
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    let _log_guard = init_tracing(config.json_logs, config.log_dir.as_deref());

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let audit_logger = init_audit_logger(config.audit_path.as_deref())?;

    let hub_file = match &config.config_path {
        Some(path) => {
            let file = HubFile::load(path)?;
            info!(
                path = %path.display(),
                hubs = file.opcua.len(),
                sensors = file.sensors.len(),
                "Hub file loaded"
            );
            file
        }
        None => HubFile::default(),
    };
    if hub_file.opcua.is_empty() {
        warn!("No hubs configured; the service will answer every request with an error");
    }

    let factory = build_factory(&config, &hub_file);
    let registry = Arc::new(HubRegistry::from_configs(hub_file.opcua.clone(), factory)?);

    log_failures("setup", &registry.setup_all());
    let connected = registry.connect_all();
    log_failures("connect", &connected);

    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            AuditEventType::SystemStart,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "hubs": registry.len(),
                "simulate": config.simulate,
                "service_enabled": config.service_enabled,
                "metrics_enabled": config.metrics_addr.is_some(),
            }),
        );
        let _ = logger.log_event(AuditEventType::HubsConnected, outcome_details(&connected));
    }

    let stop = Arc::new(AtomicBool::new(false));
    install_signal_handler(&stop);
    let mut handles = Vec::new();

    if config.service_enabled {
        let service_config = ServiceConfig {
            bind_addr: config.bind_addr.clone(),
            ..Default::default()
        };
        match bind(&service_config) {
            Ok(listener) => {
                let registry = Arc::clone(&registry);
                let stop = Arc::clone(&stop);
                handles.push(thread::spawn(move || {
                    run_service(listener, registry, service_config, stop);
                }));
            }
            Err(e) => {
                error!(addr = %service_config.bind_addr, error = %e, "Failed to bind service endpoint");
            }
        }
    } else {
        info!("Service endpoint disabled");
    }

    handles.extend(poller::start_sensor_poller(
        Arc::clone(&registry),
        hub_file.sensors.clone(),
        Arc::clone(&stop),
    ));

    if let Some(interval) = config.reconnect_interval {
        handles.push(supervisor::start_supervisor(
            Arc::clone(&registry),
            interval,
            audit_logger.clone(),
            Arc::clone(&stop),
        ));
    }

    handles.push(telemetry::start_metrics_updater(
        Arc::clone(&registry),
        Arc::clone(&stop),
    ));

    info!(hubs = registry.len(), "ua-hub running");

    let run_for = config.run_seconds.map(Duration::from_secs);
    if let Some(limit) = run_for {
        info!(seconds = limit.as_secs(), "Running for limited duration");
    }
    wait_for_stop(&stop, run_for);
    info!("Shutting down");

    stop.store(true, Ordering::Relaxed);
    for handle in handles {
        let _ = handle.join();
    }

    let closed = registry.close_all();
    log_failures("close", &closed);
    info!(hubs = registry.len(), "Run complete");

    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(AuditEventType::HubsClosed, outcome_details(&closed));
        let _ = logger.log_event(
            AuditEventType::SystemShutdown,
            serde_json::json!({ "hubs": registry.len() }),
        );
    }
    Ok(())
}

/// SIGINT and SIGTERM raise `stop` so the normal shutdown path runs.
fn install_signal_handler(stop: &Arc<AtomicBool>) {
    let stop = Arc::clone(stop);
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, Ordering::Relaxed);
    }) {
        warn!(error = %e, "Failed to install signal handler; hubs will not close on SIGTERM");
    }
}

/// Block until `stop` is raised or `run_for` has elapsed.
fn wait_for_stop(stop: &AtomicBool, run_for: Option<Duration>) {
    let deadline = run_for.map(|limit| Instant::now() + limit);
    while !stop.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return;
        }
        thread::sleep(STOP_CHECK);
    }
}

fn build_factory(config: &RuntimeConfig, hub_file: &HubFile) -> Arc<dyn ClientFactory> {
    #[cfg(feature = "opcua")]
    if !config.simulate {
        return Arc::new(hub_io::OpcuaClientFactory);
    }
    #[cfg(not(feature = "opcua"))]
    if !config.simulate {
        warn!("Built without the opcua feature; falling back to simulated servers");
    }
    let factory = SimulatedFactory::new();
    hub_file.seed(&factory);
    info!("Using simulated servers");
    Arc::new(factory)
}

fn log_failures(action: &str, outcome: &BulkOutcome) {
    for (hub, result) in outcome {
        if let Err(e) = result {
            warn!(hub = %hub, action, error = %e, "Hub action failed");
        }
    }
}

fn init_audit_logger(path: Option<&Path>) -> Result<Option<Arc<AuditLogger>>, AppError> {
    path.map(|path| {
        AuditLogger::new(path)
            .map(|logger| {
                info!(path = %path.display(), "Audit logging enabled");
                Arc::new(logger)
            })
            .map_err(|source| AppError::Audit {
                path: path.to_path_buf(),
                source,
            })
    })
    .transpose()
}
