use crate::accessor::NodeValueAccessor;
use crate::client::{ClientFactory, ClientOptions, UaClient};
use crate::config::HubConfig;
use crate::error::{ClientError, ConfigError, HubError};
use crate::value::{InputValue, UaValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct HubCounters {
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    reads: AtomicU64,
    read_failures: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time copy of a hub's operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub reads: u64,
    pub read_failures: u64,
    pub writes: u64,
    pub write_failures: u64,
}

/// One managed client session to one OPC UA endpoint.
///
/// The client sits behind a mutex owned by the hub, so at most one
/// operation is in flight per hub. Every public operation logs its own
/// failures and returns them as values.
pub struct SessionHub {
    config: HubConfig,
    factory: Arc<dyn ClientFactory>,
    client: Mutex<Option<Box<dyn UaClient>>>,
    counters: HubCounters,
}

impl SessionHub {
    pub fn new(config: HubConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            factory,
            client: Mutex::new(None),
            counters: HubCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn client(&self) -> MutexGuard<'_, Option<Box<dyn UaClient>>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a fresh client for the configured url and apply timeouts,
    /// security and credentials. Does not connect.
    pub fn setup(&self) -> Result<(), HubError> {
        info!(hub = %self.name(), url = %self.config.url, "Setting up client parameters");
        let options = ClientOptions::from_config(&self.config);
        let invalid = |source: ClientError| {
            error!(hub = %self.name(), error = %source, "Client setup rejected");
            HubError::from(ConfigError::InvalidOptions {
                name: self.name().to_string(),
                source,
            })
        };

        let mut slot = self.client();
        if let Some(mut previous) = slot.take() {
            if let Err(e) = previous.disconnect() {
                warn!(hub = %self.name(), error = %e, "Previous client did not close cleanly");
            }
        }

        let mut client = self.factory.create(&self.config.url).map_err(invalid)?;
        client.apply_options(&options).map_err(invalid)?;
        debug!(hub = %self.name(), ?options, "Client options applied");
        *slot = Some(client);
        Ok(())
    }

    /// Open the session. A no-op when already connected; never retries.
    pub fn connect(&self) -> Result<(), HubError> {
        let mut slot = self.client();
        let Some(client) = slot.as_mut() else {
            error!(hub = %self.name(), "Connection Error: client has not been set up");
            return Err(HubError::NotSetUp(self.name().to_string()));
        };
        if client.is_connected() {
            debug!(hub = %self.name(), "Already connected");
            return Ok(());
        }

        self.counters.connect_attempts.fetch_add(1, Ordering::Relaxed);
        match client.connect() {
            Ok(()) => {
                info!(hub = %self.name(), url = %self.config.url, "Connected");
                Ok(())
            }
            Err(source) => {
                self.counters.connect_failures.fetch_add(1, Ordering::Relaxed);
                error!(hub = %self.name(), error = %source, "Connection Error");
                Err(HubError::Connection {
                    hub: self.name().to_string(),
                    source,
                })
            }
        }
    }

    /// Close the session. Closing an idle or never set up hub is a no-op.
    /// A failed disconnect still leaves the hub closed.
    pub fn close(&self) -> Result<(), HubError> {
        let mut slot = self.client();
        let Some(client) = slot.as_mut() else {
            debug!(hub = %self.name(), "Close requested before setup");
            return Ok(());
        };
        match client.disconnect() {
            Ok(()) => {
                info!(hub = %self.name(), "Closed");
                Ok(())
            }
            Err(source) => {
                error!(hub = %self.name(), error = %source, "Channel Close Error");
                Err(HubError::Teardown {
                    hub: self.name().to_string(),
                    source,
                })
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client().as_ref().is_some_and(|c| c.is_connected())
    }

    pub fn read_value(&self, node_id: &str) -> Result<UaValue, HubError> {
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.client();
        let result = match slot.as_mut() {
            Some(client) => NodeValueAccessor::new(&mut **client, node_id).read(),
            None => Err(ClientError::NotConnected),
        };
        result.map_err(|source| {
            self.counters.read_failures.fetch_add(1, Ordering::Relaxed);
            error!(hub = %self.name(), node_id, error = %source, "Read Value Error");
            HubError::Read {
                hub: self.name().to_string(),
                node_id: node_id.to_string(),
                source,
            }
        })
    }

    /// Write `value` coerced to the node's current type. Returns the value
    /// as it was sent.
    pub fn write_value(&self, node_id: &str, value: &InputValue) -> Result<UaValue, HubError> {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.client();
        let result = match slot.as_mut() {
            Some(client) => NodeValueAccessor::new(&mut **client, node_id).write(value),
            None => Err(crate::error::WriteError::TypeLookup(ClientError::NotConnected)),
        };
        match result {
            Ok(written) => {
                debug!(hub = %self.name(), node_id, value = %written, "Value written");
                Ok(written)
            }
            Err(source) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    hub = %self.name(),
                    node_id,
                    value = %value,
                    error = %source,
                    "Error encountered when attempting to write a value"
                );
                Err(HubError::Write {
                    hub: self.name().to_string(),
                    node_id: node_id.to_string(),
                    value: value.to_string(),
                    source,
                })
            }
        }
    }

    pub fn stats(&self) -> HubStats {
        let c = &self.counters;
        HubStats {
            connect_attempts: c.connect_attempts.load(Ordering::Relaxed),
            connect_failures: c.connect_failures.load(Ordering::Relaxed),
            reads: c.reads.load(Ordering::Relaxed),
            read_failures: c.read_failures.load(Ordering::Relaxed),
            writes: c.writes.load(Ordering::Relaxed),
            write_failures: c.write_failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHub")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "simulation"))]
pub(crate) mod tests {
    use super::*;
    use crate::error::WriteError;
    use crate::sim::{SimulatedFactory, SimulatedServer};
    use std::io::Write;
    use std::thread;

    #[derive(Clone, Default)]
    pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    pub(crate) fn capture_logs<F: FnOnce()>(f: F) -> String {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn hub_with_server(name: &str) -> (SessionHub, SimulatedServer) {
        let factory = Arc::new(SimulatedFactory::new());
        let url = format!("opc.tcp://{name}:4840");
        let server = factory.server(&url);
        let hub = SessionHub::new(HubConfig::new(url).with_name(name), factory);
        (hub, server)
    }

    #[test]
    fn close_before_setup_is_benign() {
        let (hub, _server) = hub_with_server("idle");
        assert!(hub.close().is_ok());
        hub.setup().unwrap();
        assert!(hub.close().is_ok());
        assert!(!hub.is_connected());
    }

    #[test]
    fn connect_before_setup_is_reported() {
        let (hub, server) = hub_with_server("early");
        assert!(matches!(hub.connect(), Err(HubError::NotSetUp(name)) if name == "early"));
        assert_eq!(server.connect_attempts(), 0);
    }

    #[test]
    fn repeated_connect_failures_are_logged_each_time() {
        let (hub, server) = hub_with_server("lineA");
        server.set_reachable(false);
        hub.setup().unwrap();

        let logs = capture_logs(|| {
            assert!(matches!(hub.connect(), Err(HubError::Connection { .. })));
            assert!(!hub.is_connected());
            assert!(matches!(hub.connect(), Err(HubError::Connection { .. })));
            assert!(!hub.is_connected());
        });

        assert_eq!(logs.matches("Connection Error").count(), 2);
        assert!(logs.contains("lineA"));
        assert_eq!(server.connect_attempts(), 2);
        assert_eq!(hub.stats().connect_failures, 2);
    }

    #[test]
    fn connect_is_idempotent_once_connected() {
        let (hub, server) = hub_with_server("lineA");
        hub.setup().unwrap();
        hub.connect().unwrap();
        hub.connect().unwrap();
        assert_eq!(server.connect_attempts(), 1);
        assert_eq!(server.active_sessions(), 1);
    }

    #[test]
    fn reconnects_after_peer_drop() {
        let (hub, server) = hub_with_server("lineA");
        server.insert_node("ns=2;i=5", UaValue::Double(1.0));
        hub.setup().unwrap();
        hub.connect().unwrap();

        server.set_reachable(false);
        assert!(!hub.is_connected());
        assert!(hub.read_value("ns=2;i=5").is_err());

        server.set_reachable(true);
        hub.connect().unwrap();
        assert_eq!(hub.read_value("ns=2;i=5").unwrap(), UaValue::Double(1.0));
    }

    #[test]
    fn setup_applies_options_and_replaces_client() {
        let factory = Arc::new(SimulatedFactory::new());
        let server = factory.server("opc.tcp://plc:4840");
        let mut cfg = HubConfig::new("opc.tcp://plc:4840");
        cfg.timeout = 5_000;
        cfg.username = Some("operator".into());
        cfg.password = Some("secret".into());
        cfg.application_uri = Some("urn:ua-hub:test".into());
        let hub = SessionHub::new(cfg, factory);

        hub.setup().unwrap();
        let options = server.last_options().unwrap();
        assert_eq!(options.timeout.as_millis(), 5_000);
        assert_eq!(options.username.as_deref(), Some("operator"));
        assert_eq!(options.application_uri.as_deref(), Some("urn:ua-hub:test"));
        assert!(options.security.is_none());

        hub.connect().unwrap();
        assert_eq!(server.active_sessions(), 1);
        hub.setup().unwrap();
        assert_eq!(server.active_sessions(), 0);
        assert!(!hub.is_connected());
    }

    #[test]
    fn read_on_disconnected_hub_is_a_value_not_a_panic() {
        let (hub, server) = hub_with_server("lineA");
        server.insert_node("ns=2;i=5", UaValue::Double(1.0));
        hub.setup().unwrap();

        let logs = capture_logs(|| {
            let err = hub.read_value("ns=2;i=5").unwrap_err();
            assert!(matches!(
                err,
                HubError::Read {
                    source: ClientError::NotConnected,
                    ..
                }
            ));
        });
        assert!(logs.contains("ns=2;i=5"));
        assert!(logs.contains("Read Value Error"));
        assert_eq!(hub.stats().read_failures, 1);
    }

    #[test]
    fn string_numeral_written_as_integer() {
        let (hub, server) = hub_with_server("lineA");
        server.insert_node("ns=2;i=7", UaValue::Int32(0));
        hub.setup().unwrap();
        hub.connect().unwrap();

        let written = hub.write_value("ns=2;i=7", &InputValue::from("42")).unwrap();
        assert_eq!(written, UaValue::Int32(42));
        assert_eq!(server.node_value("ns=2;i=7"), Some(UaValue::Int32(42)));
    }

    #[test]
    fn write_to_missing_node_fails_cleanly() {
        let (hub, server) = hub_with_server("lineA");
        hub.setup().unwrap();
        hub.connect().unwrap();

        let err = hub
            .write_value("ns=2;i=404", &InputValue::Float(1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Write {
                source: WriteError::TypeLookup(ClientError::NodeNotFound(_)),
                ..
            }
        ));
        assert_eq!(server.write_count(), 0);
        assert_eq!(hub.stats().write_failures, 1);
    }

    #[test]
    fn close_after_peer_reset_is_a_teardown_error() {
        let (hub, server) = hub_with_server("lineA");
        hub.setup().unwrap();
        hub.connect().unwrap();
        server.set_reset_on_disconnect(true);

        assert!(matches!(hub.close(), Err(HubError::Teardown { .. })));
        assert!(!hub.is_connected());
        assert!(hub.close().is_ok());
    }

    #[test]
    fn concurrent_callers_are_serialized() {
        let (hub, server) = hub_with_server("lineA");
        server.insert_node("ns=2;i=1", UaValue::Int64(0));
        hub.setup().unwrap();
        hub.connect().unwrap();
        let hub = Arc::new(hub);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let hub = Arc::clone(&hub);
                thread::spawn(move || {
                    for j in 0..25 {
                        hub.write_value("ns=2;i=1", &InputValue::Integer(i * 100 + j))
                            .unwrap();
                        hub.read_value("ns=2;i=1").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(server.write_count(), 200);
        let stats = hub.stats();
        assert_eq!(stats.writes, 200);
        assert_eq!(stats.reads, 200);
        assert_eq!(stats.write_failures + stats.read_failures, 0);
    }
}
