//! `UaClient` backed by the synchronous `opcua` 0.12 client.

use crate::security::{SecurityMode, SecurityString};
use hub_core::{ClientError, ClientFactory, ClientOptions, UaClient, UaValue};
use opcua::client::prelude::*;
use opcua::sync::RwLock;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

const APPLICATION_NAME: &str = "ua-hub";
const DEFAULT_APPLICATION_URI: &str = "urn:ua-hub";
const PKI_DIR: &str = "pki";

pub struct OpcuaClient {
    url: String,
    security: SecurityString,
    identity: Option<(String, String)>,
    client: Option<Client>,
    session: Option<Arc<RwLock<Session>>>,
}

impl OpcuaClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            security: SecurityString::default(),
            identity: None,
            client: None,
            session: None,
        }
    }

    fn session(&self) -> Result<&Arc<RwLock<Session>>, ClientError> {
        self.session
            .as_ref()
            .filter(|s| s.read().is_connected())
            .ok_or(ClientError::NotConnected)
    }

    fn identity_token(&self) -> IdentityToken {
        match &self.identity {
            Some((user, pass)) => IdentityToken::UserName(user.clone(), pass.clone()),
            None => IdentityToken::Anonymous,
        }
    }
}

fn node_id(text: &str) -> Result<NodeId, ClientError> {
    NodeId::from_str(text).map_err(|_| ClientError::InvalidNodeId(text.to_string()))
}

fn status_error(node: &str, status: StatusCode) -> ClientError {
    if status == StatusCode::BadNodeIdUnknown {
        ClientError::NodeNotFound(node.to_string())
    } else {
        ClientError::BadStatus(status.to_string())
    }
}

fn message_security_mode(mode: SecurityMode) -> MessageSecurityMode {
    match mode {
        SecurityMode::None => MessageSecurityMode::None,
        SecurityMode::Sign => MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
    }
}

pub(crate) fn from_variant(variant: &Variant) -> Result<UaValue, ClientError> {
    Ok(match variant {
        Variant::Empty => UaValue::Empty,
        Variant::Boolean(v) => UaValue::Boolean(*v),
        Variant::SByte(v) => UaValue::SByte(*v),
        Variant::Byte(v) => UaValue::Byte(*v),
        Variant::Int16(v) => UaValue::Int16(*v),
        Variant::UInt16(v) => UaValue::UInt16(*v),
        Variant::Int32(v) => UaValue::Int32(*v),
        Variant::UInt32(v) => UaValue::UInt32(*v),
        Variant::Int64(v) => UaValue::Int64(*v),
        Variant::UInt64(v) => UaValue::UInt64(*v),
        Variant::Float(v) => UaValue::Float(*v),
        Variant::Double(v) => UaValue::Double(*v),
        Variant::String(v) => UaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => UaValue::DateTime(v.as_chrono()),
        Variant::ByteString(v) => UaValue::ByteString(v.value.clone().unwrap_or_default()),
        other => {
            return Err(ClientError::BadStatus(format!(
                "unsupported variant {:?}",
                other.type_id()
            )))
        }
    })
}

pub(crate) fn to_variant(value: &UaValue) -> Variant {
    match value {
        UaValue::Empty => Variant::Empty,
        UaValue::Boolean(v) => Variant::Boolean(*v),
        UaValue::SByte(v) => Variant::SByte(*v),
        UaValue::Byte(v) => Variant::Byte(*v),
        UaValue::Int16(v) => Variant::Int16(*v),
        UaValue::UInt16(v) => Variant::UInt16(*v),
        UaValue::Int32(v) => Variant::Int32(*v),
        UaValue::UInt32(v) => Variant::UInt32(*v),
        UaValue::Int64(v) => Variant::Int64(*v),
        UaValue::UInt64(v) => Variant::UInt64(*v),
        UaValue::Float(v) => Variant::Float(*v),
        UaValue::Double(v) => Variant::Double(*v),
        UaValue::String(v) => Variant::String(UAString::from(v.as_str())),
        UaValue::DateTime(v) => Variant::DateTime(Box::new(opcua::types::DateTime::from(*v))),
        UaValue::ByteString(v) => Variant::ByteString(ByteString::from(v.as_slice())),
    }
}

impl UaClient for OpcuaClient {
    fn apply_options(&mut self, options: &ClientOptions) -> Result<(), ClientError> {
        self.security = match options.security.as_deref() {
            Some(s) => s
                .parse()
                .map_err(|e| ClientError::InvalidOption(format!("security_string: {e}")))?,
            None => SecurityString::default(),
        };
        self.identity = options.username.clone().map(|user| {
            let pass = options.password.clone().unwrap_or_default();
            (user, pass)
        });

        let session_timeout = u32::try_from(options.session_timeout.as_millis()).unwrap_or(u32::MAX);
        let mut builder = ClientBuilder::new()
            .application_name(APPLICATION_NAME)
            .application_uri(
                options
                    .application_uri
                    .as_deref()
                    .unwrap_or(DEFAULT_APPLICATION_URI),
            )
            .session_timeout(session_timeout)
            .session_retry_limit(0)
            .pki_dir(PKI_DIR)
            .trust_server_certs(true);
        builder = match &self.security.keypair {
            Some((cert, key)) => builder.certificate_path(cert).private_key_path(key),
            None => builder.create_sample_keypair(self.security.is_secure()),
        };

        let client = builder
            .client()
            .ok_or_else(|| ClientError::InvalidOption("client configuration rejected".into()))?;
        debug!(
            url = %self.url,
            policy = %self.security.policy,
            mode = %self.security.mode,
            request_timeout_ms = options.timeout.as_millis() as u64,
            secure_timeout_ms = options.secure_timeout.as_millis() as u64,
            "OPC UA client built"
        );
        self.session = None;
        self.client = Some(client);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), ClientError> {
        let identity = self.identity_token();
        let endpoint: EndpointDescription = (
            self.url.as_str(),
            self.security.policy.as_str(),
            message_security_mode(self.security.mode),
            UserTokenPolicy::anonymous(),
        )
            .into();
        let client = self.client.as_mut().ok_or_else(|| {
            ClientError::InvalidOption("client options have not been applied".into())
        })?;
        let session = client
            .connect_to_endpoint(endpoint, identity)
            .map_err(|status| ClientError::Transport(status.to_string()))?;
        info!(url = %self.url, "OPC UA session established");
        self.session = Some(session);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ClientError> {
        if let Some(session) = self.session.take() {
            let session = session.read();
            if session.is_connected() {
                session.disconnect();
            } else {
                return Err(ClientError::Transport("session already torn down".into()));
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session().is_ok()
    }

    fn read(&mut self, node: &str) -> Result<UaValue, ClientError> {
        let request = ReadValueId {
            node_id: node_id(node)?,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            data_encoding: QualifiedName::null(),
        };
        let results = self
            .session()?
            .read()
            .read(&[request], TimestampsToReturn::Both, 0.0)
            .map_err(|status| status_error(node, status))?;
        let data_value = results
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::BadStatus("empty read response".into()))?;
        if let Some(status) = data_value.status {
            if status.is_bad() {
                return Err(status_error(node, status));
            }
        }
        data_value
            .value
            .as_ref()
            .map_or(Ok(UaValue::Empty), from_variant)
    }

    fn write(&mut self, node: &str, value: UaValue) -> Result<(), ClientError> {
        let request = WriteValue {
            node_id: node_id(node)?,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            value: DataValue::new_now(to_variant(&value)),
        };
        let results = self
            .session()?
            .read()
            .write(&[request])
            .map_err(|status| status_error(node, status))?;
        match results.first() {
            Some(status) if status.is_good() => Ok(()),
            Some(status) => Err(status_error(node, *status)),
            None => Err(ClientError::BadStatus("empty write response".into())),
        }
    }
}

#[derive(Debug, Default)]
pub struct OpcuaClientFactory;

impl ClientFactory for OpcuaClientFactory {
    fn create(&self, url: &str) -> Result<Box<dyn UaClient>, ClientError> {
        if !url.starts_with("opc.tcp://") {
            return Err(ClientError::InvalidOption(format!(
                "endpoint url must start with opc.tcp://, got '{url}'"
            )));
        }
        Ok(Box::new(OpcuaClient::new(url)))
    }
}
