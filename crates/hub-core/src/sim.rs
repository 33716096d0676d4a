//! In-process OPC UA endpoint used for `--simulate` runs and tests.
//!
//! A [`SimulatedServer`] holds a flat, typed address space and enforces the
//! same rules a real server does: reads and writes need a live session,
//! unknown nodes are rejected, and writes must match the node's type.

use crate::client::{ClientFactory, ClientOptions, UaClient};
use crate::error::ClientError;
use crate::value::UaValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct ServerState {
    url: String,
    nodes: HashMap<String, UaValue>,
    reachable: bool,
    reset_on_disconnect: bool,
    credentials: Option<(String, String)>,
    // Bumped when the server drops every session.
    generation: u64,
    sessions: usize,
    connect_attempts: u64,
    write_count: u64,
    last_options: Option<ClientOptions>,
}

/// Shared handle to one simulated endpoint. Clones see the same state.
#[derive(Debug, Clone)]
pub struct SimulatedServer {
    state: Arc<Mutex<ServerState>>,
}

impl SimulatedServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                url: url.into(),
                nodes: HashMap::new(),
                reachable: true,
                reset_on_disconnect: false,
                credentials: None,
                generation: 0,
                sessions: 0,
                connect_attempts: 0,
                write_count: 0,
                last_options: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn url(&self) -> String {
        self.state().url.clone()
    }

    pub fn insert_node(&self, node_id: impl Into<String>, value: UaValue) {
        self.state().nodes.insert(node_id.into(), value);
    }

    pub fn node_value(&self, node_id: &str) -> Option<UaValue> {
        self.state().nodes.get(node_id).cloned()
    }

    /// An unreachable server refuses new sessions and drops live ones.
    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.state();
        state.reachable = reachable;
        if !reachable {
            state.generation += 1;
            state.sessions = 0;
        }
    }

    /// Make the next disconnects fail the way a peer-reset socket does.
    pub fn set_reset_on_disconnect(&self, reset: bool) {
        self.state().reset_on_disconnect = reset;
    }

    pub fn require_credentials(&self, username: &str, password: &str) {
        self.state().credentials = Some((username.to_string(), password.to_string()));
    }

    pub fn active_sessions(&self) -> usize {
        self.state().sessions
    }

    pub fn connect_attempts(&self) -> u64 {
        self.state().connect_attempts
    }

    pub fn write_count(&self) -> u64 {
        self.state().write_count
    }

    /// Options most recently applied by any client of this server.
    pub fn last_options(&self) -> Option<ClientOptions> {
        self.state().last_options.clone()
    }

    pub fn client(&self) -> SimulatedClient {
        SimulatedClient {
            server: self.clone(),
            session: None,
            options: None,
        }
    }
}

#[derive(Debug)]
pub struct SimulatedClient {
    server: SimulatedServer,
    // Generation of the server at connect time.
    session: Option<u64>,
    options: Option<ClientOptions>,
}

impl SimulatedClient {
    fn live_session(&self) -> Result<(), ClientError> {
        match self.session {
            Some(generation) if generation == self.server.state().generation => Ok(()),
            _ => Err(ClientError::NotConnected),
        }
    }
}

impl UaClient for SimulatedClient {
    fn apply_options(&mut self, options: &ClientOptions) -> Result<(), ClientError> {
        self.server.state().last_options = Some(options.clone());
        self.options = Some(options.clone());
        Ok(())
    }

    fn connect(&mut self) -> Result<(), ClientError> {
        let mut state = self.server.state();
        state.connect_attempts += 1;
        if !state.reachable {
            return Err(ClientError::Transport(format!(
                "connection refused by {}",
                state.url
            )));
        }
        if let Some((user, pass)) = &state.credentials {
            let given = self
                .options
                .as_ref()
                .map(|o| (o.username.as_deref(), o.password.as_deref()));
            if given != Some((Some(user.as_str()), Some(pass.as_str()))) {
                return Err(ClientError::BadStatus("BadUserAccessDenied".into()));
            }
        }
        state.sessions += 1;
        self.session = Some(state.generation);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ClientError> {
        let Some(generation) = self.session.take() else {
            return Ok(());
        };
        let mut state = self.server.state();
        if generation == state.generation {
            state.sessions = state.sessions.saturating_sub(1);
        }
        if state.reset_on_disconnect {
            return Err(ClientError::Transport("connection reset by peer".into()));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.live_session().is_ok()
    }

    fn read(&mut self, node_id: &str) -> Result<UaValue, ClientError> {
        self.live_session()?;
        self.server
            .state()
            .nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| ClientError::NodeNotFound(node_id.to_string()))
    }

    fn write(&mut self, node_id: &str, value: UaValue) -> Result<(), ClientError> {
        self.live_session()?;
        let mut state = self.server.state();
        let slot = state
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ClientError::NodeNotFound(node_id.to_string()))?;
        if slot.variant_type() != value.variant_type() {
            return Err(ClientError::BadStatus("BadTypeMismatch".into()));
        }
        *slot = value;
        state.write_count += 1;
        Ok(())
    }
}

/// Hands out clients for simulated servers, creating an empty reachable
/// server the first time an url is seen.
#[derive(Debug, Default)]
pub struct SimulatedFactory {
    servers: Mutex<HashMap<String, SimulatedServer>>,
}

impl SimulatedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(&self, url: &str) -> SimulatedServer {
        self.servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_string())
            .or_insert_with(|| SimulatedServer::new(url))
            .clone()
    }
}

impl ClientFactory for SimulatedFactory {
    fn create(&self, url: &str) -> Result<Box<dyn UaClient>, ClientError> {
        Ok(Box::new(self.server(url).client()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_type_mismatch() {
        let server = SimulatedServer::new("opc.tcp://plc:4840");
        server.insert_node("ns=2;i=5", UaValue::Int32(1));
        let mut client = server.client();
        client.connect().unwrap();

        assert_eq!(
            client.write("ns=2;i=5", UaValue::Double(1.0)),
            Err(ClientError::BadStatus("BadTypeMismatch".into()))
        );
        assert_eq!(server.node_value("ns=2;i=5"), Some(UaValue::Int32(1)));
    }

    #[test]
    fn unreachable_server_drops_sessions() {
        let server = SimulatedServer::new("opc.tcp://plc:4840");
        server.insert_node("ns=2;i=5", UaValue::Int32(1));
        let mut client = server.client();
        client.connect().unwrap();
        assert!(client.is_connected());

        server.set_reachable(false);
        assert!(!client.is_connected());
        assert_eq!(client.read("ns=2;i=5"), Err(ClientError::NotConnected));
        assert!(matches!(client.connect(), Err(ClientError::Transport(_))));

        server.set_reachable(true);
        client.connect().unwrap();
        assert_eq!(client.read("ns=2;i=5"), Ok(UaValue::Int32(1)));
    }

    #[test]
    fn credentials_are_checked() {
        let server = SimulatedServer::new("opc.tcp://plc:4840");
        server.require_credentials("operator", "secret");
        let mut client = server.client();
        assert!(client.connect().is_err());

        let mut cfg = crate::config::HubConfig::new("opc.tcp://plc:4840");
        cfg.username = Some("operator".into());
        cfg.password = Some("secret".into());
        client
            .apply_options(&ClientOptions::from_config(&cfg))
            .unwrap();
        client.connect().unwrap();
        assert_eq!(server.active_sessions(), 1);
    }

    #[test]
    fn factory_reuses_server_per_url() {
        let factory = SimulatedFactory::new();
        factory.server("opc.tcp://a:4840").insert_node("x", UaValue::Boolean(true));

        let mut client = factory.create("opc.tcp://a:4840").unwrap();
        client.connect().unwrap();
        assert_eq!(client.read("x"), Ok(UaValue::Boolean(true)));
    }
}
