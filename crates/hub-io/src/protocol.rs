//! Newline-delimited JSON messages spoken by the service endpoint.

use hub_core::{InputValue, UaValue};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceRequest {
    SetValue {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        hub: Option<String>,
        nodeid: String,
        value: InputValue,
    },
    ReadValue {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        hub: Option<String>,
        nodeid: String,
    },
    Connect {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        hub: Option<String>,
    },
    Close {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        hub: Option<String>,
    },
    Status {
        #[serde(default)]
        id: Option<u64>,
    },
}

impl ServiceRequest {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Self::SetValue { id, .. }
            | Self::ReadValue { id, .. }
            | Self::Connect { id, .. }
            | Self::Close { id, .. }
            | Self::Status { id } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetValue { .. } => "set_value",
            Self::ReadValue { .. } => "read_value",
            Self::Connect { .. } => "connect",
            Self::Close { .. } => "close",
            Self::Status { .. } => "status",
        }
    }
}

/// Best-effort request id from a line that failed to parse as a request.
pub fn salvage_id(line: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()?
        .get("id")?
        .as_u64()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HubStatus {
    pub name: String,
    pub url: String,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceResponse {
    Result {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<UaValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Status {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        hubs: Vec<HubStatus>,
    },
}

impl ServiceResponse {
    pub fn ok(id: Option<u64>, value: Option<UaValue>) -> Self {
        Self::Result {
            id,
            ok: true,
            value,
            error: None,
        }
    }

    pub fn failed(id: Option<u64>, error: impl fmt::Display) -> Self {
        Self::Result {
            id,
            ok: false,
            value: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Self::Result { ok, .. } => *ok,
            Self::Status { .. } => true,
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "type": "result",
                "ok": false,
                "error": format!("encode failed: {e}"),
            })
            .to_string()
        });
        line.push('\n');
        line
    }
}
