//! Provider response normalization
//!
//! Update APIs answer in one of a few shapes; all of them are normalized
//! into a list of [`HostResult`]s:
//!
//! ```text
//! {"success": true, "results": [{"hostname": "a", "success": true, "message": "good"}]}
//! {"hostname": "a", "success": true, "message": "good 1.2.3.4"}
//! {"success": false, "error": "Failed to update DNS services", "details": "..."}
//! good 1.2.3.4            (dyndns2 plain text)
//! ```

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::report::HostResult;

/// dyndns2 return codes meaning the update was applied or not needed
const DYNDNS_SUCCESS_CODES: &[&str] = &["good", "nochg"];

/// dyndns2 return codes meaning the update was refused
const DYNDNS_ERROR_CODES: &[&str] = &[
    "nohost", "badauth", "badagent", "!donator", "abuse", "notfqdn", "numhost", "dnserr", "911",
    "!yours", "badsys",
];

/// Normalized provider reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProviderReply {
    /// Top-level status text, if the provider sent one
    pub status_text: Option<String>,
    /// Per-host results
    pub hosts: Vec<HostResult>,
}

/// Interpret a 2xx response body for the endpoint `hostname`
///
/// # Errors
///
/// - [`Error::MalformedResponse`] if the body has none of the known shapes
/// - [`Error::Application`] if the provider reports a failure without any
///   per-host results
pub(crate) fn interpret(hostname: &str, body: &str) -> Result<ProviderReply> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::malformed("empty response body"));
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed("JSON response is not an object"))?;
        return interpret_json(hostname, object);
    }

    interpret_dyndns(hostname, trimmed)
}

fn interpret_json(hostname: &str, object: &Map<String, Value>) -> Result<ProviderReply> {
    let status_text = text_field(object, "message").or_else(|| text_field(object, "status"));

    if let Some(results) = object.get("results") {
        let entries = results
            .as_array()
            .ok_or_else(|| Error::malformed("`results` is not a list"))?;
        let hosts = entries
            .iter()
            .map(|entry| host_entry(hostname, entry))
            .collect::<Result<Vec<_>>>()?;
        return Ok(ProviderReply { status_text, hosts });
    }

    match object.get("success") {
        Some(Value::Bool(true)) => {
            let host = host_entry(hostname, &Value::Object(object.clone()))?;
            Ok(ProviderReply {
                status_text,
                hosts: vec![host],
            })
        }
        Some(Value::Bool(false)) => {
            if object.contains_key("hostname") {
                let host = host_entry(hostname, &Value::Object(object.clone()))?;
                return Ok(ProviderReply {
                    status_text,
                    hosts: vec![host],
                });
            }
            Err(Error::application(failure_text(object)))
        }
        Some(other) => Err(Error::malformed(format!(
            "`success` is not a boolean: {other}"
        ))),
        None => Err(Error::malformed(
            "JSON response has neither `results` nor `success`",
        )),
    }
}

/// Normalize one `{hostname, success, message, ipUsed}` entry
fn host_entry(default_hostname: &str, entry: &Value) -> Result<HostResult> {
    let object = entry
        .as_object()
        .ok_or_else(|| Error::malformed("result entry is not an object"))?;

    let hostname = match object.get("hostname") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        Some(Value::String(_)) | None | Some(Value::Null) => default_hostname.to_string(),
        Some(other) => {
            return Err(Error::malformed(format!(
                "result hostname is not a string: {other}"
            )));
        }
    };

    let success = match object.get("success") {
        Some(Value::Bool(success)) => *success,
        None | Some(Value::Null) => false,
        Some(other) => {
            return Err(Error::malformed(format!(
                "result success flag is not a boolean: {other}"
            )));
        }
    };

    let message = match object.get("message") {
        Some(Value::String(message)) => message.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };

    let mut host = HostResult::new(hostname, success, message);
    if let Some(ip) = text_field(object, "ipUsed").or_else(|| text_field(object, "ip_used")) {
        host = host.with_ip_used(ip);
    }
    Ok(host)
}

fn interpret_dyndns(hostname: &str, body: &str) -> Result<ProviderReply> {
    let line = body.lines().next().unwrap_or_default().trim();
    let code = line.split_whitespace().next().unwrap_or_default();

    if DYNDNS_SUCCESS_CODES.contains(&code) {
        let mut host = HostResult::new(hostname, true, line);
        if let Some(ip) = line.split_whitespace().nth(1) {
            host = host.with_ip_used(ip);
        }
        return Ok(ProviderReply {
            status_text: Some(line.to_string()),
            hosts: vec![host],
        });
    }

    if DYNDNS_ERROR_CODES.contains(&code) {
        return Ok(ProviderReply {
            status_text: Some(line.to_string()),
            hosts: vec![HostResult::new(hostname, false, line)],
        });
    }

    let snippet: String = line.chars().take(80).collect();
    Err(Error::malformed(format!("unrecognised response: {snippet}")))
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn failure_text(object: &Map<String, Value>) -> String {
    let headline = text_field(object, "error")
        .or_else(|| text_field(object, "message"))
        .unwrap_or_else(|| "provider reported failure".to_string());
    match text_field(object, "details") {
        Some(details) => format!("{headline}: {details}"),
        None => headline,
    }
}
