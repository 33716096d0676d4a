use crate::metrics::{SERVICE_CLIENTS, SERVICE_REQUESTS};
use crate::protocol::{salvage_id, HubStatus, ServiceRequest, ServiceResponse};
use hub_core::HubRegistry;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct ServiceConfig {
    pub bind_addr: String,
    /// How often idle sockets wake up to check the stop flag.
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7100".to_string(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

pub fn bind(config: &ServiceConfig) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(&config.bind_addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Route one request to its hub. Failures become `ok:false` responses.
pub fn handle_request(registry: &HubRegistry, request: ServiceRequest) -> ServiceResponse {
    SERVICE_REQUESTS
        .with_label_values(&[request.kind()])
        .inc();
    let id = request.id();
    let outcome = match request {
        ServiceRequest::SetValue {
            hub, nodeid, value, ..
        } => registry.set_value(hub.as_deref(), &nodeid, &value).map(Some),
        ServiceRequest::ReadValue { hub, nodeid, .. } => {
            registry.read_value(hub.as_deref(), &nodeid).map(Some)
        }
        ServiceRequest::Connect { hub, .. } => registry.connect(hub.as_deref()).map(|()| None),
        ServiceRequest::Close { hub, .. } => registry.close(hub.as_deref()).map(|()| None),
        ServiceRequest::Status { .. } => {
            let hubs = registry
                .iter()
                .map(|hub| HubStatus {
                    name: hub.name().to_string(),
                    url: hub.config().url.clone(),
                    connected: hub.is_connected(),
                })
                .collect();
            return ServiceResponse::Status { id, hubs };
        }
    };
    match outcome {
        Ok(value) => ServiceResponse::ok(id, value),
        Err(e) => ServiceResponse::failed(id, e),
    }
}

fn handle_line(registry: &HubRegistry, line: &str) -> ServiceResponse {
    match ServiceRequest::parse(line) {
        Ok(request) => handle_request(registry, request),
        Err(e) => {
            SERVICE_REQUESTS.with_label_values(&["malformed"]).inc();
            warn!(error = %e, "Malformed service request");
            ServiceResponse::failed(salvage_id(line), format!("malformed request: {e}"))
        }
    }
}

/// Accept clients until `stop` is set, one thread per client.
pub fn run_service(
    listener: TcpListener,
    registry: Arc<HubRegistry>,
    config: ServiceConfig,
    stop: Arc<AtomicBool>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, hubs = registry.len(), "Service endpoint listening");
    }

    let mut clients = Vec::new();
    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                let registry = Arc::clone(&registry);
                let stop = Arc::clone(&stop);
                let poll = config.poll_interval;
                clients.push(thread::spawn(move || {
                    SERVICE_CLIENTS.inc();
                    if let Err(e) = serve_client(stream, addr, &registry, poll, &stop) {
                        warn!(client_addr = %addr, error = %e, "Service client error");
                    }
                    SERVICE_CLIENTS.dec();
                }));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(config.poll_interval);
            }
            Err(err) => {
                warn!(error = %err, "Service accept error");
                thread::sleep(config.poll_interval);
            }
        }
        clients.retain(|handle| !handle.is_finished());
    }

    for handle in clients {
        let _ = handle.join();
    }
    info!("Service endpoint stopped");
}

#[instrument(skip(stream, addr, registry, poll, stop), fields(client_addr = %addr))]
fn serve_client(
    stream: TcpStream,
    addr: SocketAddr,
    registry: &HubRegistry,
    poll: Duration,
    stop: &AtomicBool,
) -> io::Result<()> {
    info!("Service client connected");
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(poll))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    // Survives read timeouts so a line split across them is kept whole.
    let mut pending = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        match reader.read_until(b'\n', &mut pending) {
            Ok(0) => {
                // Peer half-closed; an unterminated last line is still a request.
                respond(&mut writer, registry, &pending)?;
                break;
            }
            Ok(_) if !pending.ends_with(b"\n") => {
                respond(&mut writer, registry, &pending)?;
                break;
            }
            Ok(_) => {
                respond(&mut writer, registry, &pending)?;
                pending.clear();
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(err) => return Err(err),
        }
    }
    info!("Service client disconnected");
    Ok(())
}

fn respond(writer: &mut impl Write, registry: &HubRegistry, raw: &[u8]) -> io::Result<()> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    let response = handle_line(registry, line);
    debug!(ok = response.is_ok(), "Service request handled");
    writer.write_all(response.to_line().as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{HubConfig, SimulatedFactory, UaValue};

    fn registry() -> (Arc<HubRegistry>, Arc<SimulatedFactory>) {
        let factory = Arc::new(SimulatedFactory::new());
        factory
            .server("opc.tcp://line-a:4840")
            .insert_node("ns=2;i=5", UaValue::Double(0.0));
        factory
            .server("opc.tcp://plc:4840")
            .insert_node("ns=2;i=7", UaValue::Int32(0));
        let registry = HubRegistry::from_configs(
            [
                HubConfig::new("opc.tcp://line-a:4840").with_name("lineA"),
                HubConfig::new("opc.tcp://plc:4840"),
            ],
            factory.clone(),
        )
        .unwrap();
        registry.setup_all();
        registry.connect_all();
        (Arc::new(registry), factory)
    }

    #[test]
    fn routes_requests_by_hub() {
        let (registry, factory) = registry();

        let response = handle_line(
            &registry,
            r#"{"type":"set_value","id":1,"hub":"lineA","nodeid":"ns=2;i=5","value":12.5}"#,
        );
        assert_eq!(response, ServiceResponse::ok(Some(1), Some(UaValue::Double(12.5))));
        assert_eq!(
            factory.server("opc.tcp://line-a:4840").node_value("ns=2;i=5"),
            Some(UaValue::Double(12.5))
        );

        let response = handle_line(&registry, r#"{"type":"set_value","nodeid":"ns=2;i=7","value":"42"}"#);
        assert_eq!(response, ServiceResponse::ok(None, Some(UaValue::Int32(42))));
    }

    #[test]
    fn failures_become_results() {
        let (registry, _) = registry();

        let unknown = handle_line(&registry, r#"{"type":"read_value","id":3,"hub":"lineC","nodeid":"x"}"#);
        assert!(!unknown.is_ok());

        let malformed = handle_line(&registry, r#"{"type":"launch","id":4}"#);
        match malformed {
            ServiceResponse::Result { id, ok, error, .. } => {
                assert_eq!(id, Some(4));
                assert!(!ok);
                assert!(error.unwrap().contains("malformed"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn status_lists_hubs() {
        let (registry, _) = registry();
        registry.close(Some("lineA")).unwrap();

        match handle_line(&registry, r#"{"type":"status"}"#) {
            ServiceResponse::Status { hubs, .. } => {
                assert_eq!(hubs.len(), 2);
                assert_eq!(hubs[0].name, "lineA");
                assert!(!hubs[0].connected);
                assert!(hubs[1].connected);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn serves_clients_over_tcp() {
        let (registry, _) = registry();
        let config = ServiceConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            poll_interval: Duration::from_millis(20),
        };
        let listener = bind(&config).unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let server = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || run_service(listener, registry, config, stop))
        };

        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);

        writer.write_all(b"not json\n").unwrap();
        writer
            .write_all(b"{\"type\":\"read_value\",\"id\":2,\"hub\":\"lineA\",\"nodeid\":\"ns=2;i=5\"}\n")
            .unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let first: ServiceResponse = serde_json::from_str(&line).unwrap();
        assert!(!first.is_ok());

        line.clear();
        reader.read_line(&mut line).unwrap();
        let second: ServiceResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(second, ServiceResponse::ok(Some(2), Some(UaValue::Double(0.0))));

        stop.store(true, Ordering::Relaxed);
        server.join().unwrap();
    }

    #[test]
    fn answers_unterminated_last_request_on_half_close() {
        let (registry, _) = registry();
        let config = ServiceConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            poll_interval: Duration::from_millis(20),
        };
        let listener = bind(&config).unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let server = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || run_service(listener, registry, config, stop))
        };

        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut writer = stream.try_clone().unwrap();
        writer
            .write_all(b"{\"type\":\"read_value\",\"id\":9,\"hub\":\"lineA\",\"nodeid\":\"ns=2;i=5\"}")
            .unwrap();
        writer.shutdown(std::net::Shutdown::Write).unwrap();

        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        let response: ServiceResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response, ServiceResponse::ok(Some(9), Some(UaValue::Double(0.0))));

        stop.store(true, Ordering::Relaxed);
        server.join().unwrap();
    }
}
