//! The TCP/HTTP wire envelope. One
//! request/response shape is shared by the TCP command server and the
//! thin HTTP `/rpc`-style surface, so a single routing function can feed
//! both transports without either caring which one is in play.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HubError;

#[derive(Debug, Clone, Deserialize)]
pub struct WireRequest {
    pub command: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireErrorBody {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireErrorBody>,
}

impl WireResponse {
    pub fn ok(data: Value) -> Self {
        WireResponse { success: true, data: Some(data), error: None }
    }

    pub fn ok_empty() -> Self {
        WireResponse { success: true, data: None, error: None }
    }

    pub fn err(error: &HubError) -> Self {
        WireResponse {
            success: false,
            data: None,
            error: Some(WireErrorBody { name: error.name().to_string(), message: error.to_string() }),
        }
    }
}

/// The environment a request targets: the explicit `environment` field
/// wins, falling back to an `environment` key nested in `data` for
/// clients that only have one place to put fields.
pub fn resolve_environment(req: &WireRequest) -> Option<String> {
    req.environment.clone().or_else(|| {
        req.data
            .get("environment")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_environment_field_wins_over_nested_data() {
        let req = WireRequest {
            command: "list_tasks".into(),
            data: serde_json::json!({ "environment": "from-data" }),
            environment: Some("from-field".into()),
        };
        assert_eq!(resolve_environment(&req).as_deref(), Some("from-field"));
    }

    #[test]
    fn falls_back_to_nested_data_environment() {
        let req = WireRequest {
            command: "list_tasks".into(),
            data: serde_json::json!({ "environment": "from-data" }),
            environment: None,
        };
        assert_eq!(resolve_environment(&req).as_deref(), Some("from-data"));
    }

    #[test]
    fn no_environment_anywhere_resolves_to_none() {
        let req = WireRequest { command: "list_tasks".into(), data: serde_json::json!({}), environment: None };
        assert_eq!(resolve_environment(&req), None);
    }
}
