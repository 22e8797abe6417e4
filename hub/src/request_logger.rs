//! Structured request logging middleware for the HTTP `/rpc` surface
//!, grounded on the
//! teacher's single-line timed request logger but emitting through
//! `tracing` instead of `println!` to match the rest of the workspace's
//! ambient logging.

use std::time::Instant;

use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use http_body_util::BodyExt;
use serde_json::Value;
use tracing::info;

const MAX_PARAM_LENGTH: usize = 30;
const TRUNCATION_SUFFIX: &str = "...";

/// Logs every `/rpc` call as one line: command name, elapsed time, and a
/// truncated, secret-redacted summary of `data`. Any other path is passed
/// through untouched.
pub async fn rpc_logging_middleware(request: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let start = Instant::now();
    let path = request.uri().path().to_string();
    if path != "/rpc" {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => {
            let response = next.run(Request::from_parts(parts, Body::empty())).await;
            info!(elapsed_ms = start.elapsed().as_millis(), "rpc call with unreadable body");
            return Ok(response);
        }
    };

    let (command, data_summary) = match serde_json::from_slice::<Value>(&body_bytes) {
        Ok(json) => {
            let command = json.get("command").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
            let summary = json.get("data").map(format_params_summary).unwrap_or_default();
            (command, summary)
        }
        Err(_) => ("invalid_json".to_string(), String::new()),
    };

    let new_request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(new_request).await;

    info!(
        command = %command,
        elapsed_ms = start.elapsed().as_millis(),
        data = %data_summary,
        "rpc call"
    );
    Ok(response)
}

fn format_params_summary(params: &Value) -> String {
    match params {
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, value)| {
                if is_sensitive_parameter(key) {
                    return Some(format!("{key}=\"[REDACTED]\""));
                }
                let formatted = format_parameter_value(value);
                (!formatted.is_empty()).then(|| format!("{key}=\"{formatted}\""))
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        _ => format_parameter_value(params),
    }
}

fn format_parameter_value(value: &Value) -> String {
    let value_str = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{...{} fields}}", obj.len()),
        Value::Null => "null".to_string(),
    };
    truncate_string(&value_str, MAX_PARAM_LENGTH)
}

fn truncate_string(input: &str, max_length: usize) -> String {
    if input.len() <= max_length {
        input.to_string()
    } else {
        let truncated = max_length.saturating_sub(TRUNCATION_SUFFIX.len());
        format!("{}{}", &input[..truncated], TRUNCATION_SUFFIX)
    }
}

fn is_sensitive_parameter(key: &str) -> bool {
    let sensitive_keys = ["password", "token", "secret", "key", "auth", "authorization", "credential", "api_key", "access_token", "refresh_token"];
    let key_lower = key.to_lowercase();
    sensitive_keys.iter().any(|&s| key_lower.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncates_long_values() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("this is a very long string", 10), "this is...");
    }

    #[test]
    fn redacts_sensitive_keys() {
        let params = json!({ "username": "user123", "password": "secret123", "api_key": "xyz" });
        let summary = format_params_summary(&params);
        assert!(summary.contains("username=\"user123\""));
        assert!(summary.contains("password=\"[REDACTED]\""));
        assert!(summary.contains("api_key=\"[REDACTED]\""));
    }
}
