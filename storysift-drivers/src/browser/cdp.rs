//! Chromedriver vendor endpoints for network instrumentation.
//!
//! The WebDriver standard has no way to read the traffic a page generates,
//! but chromedriver exposes two vendor extensions that cover it: the log
//! endpoint (`/se/log`) which drains buffered DevTools performance events,
//! and `goog/cdp/execute` which relays an arbitrary DevTools command,
//! notably `Network.getResponseBody`, the only way to read a response body
//! that never materialises in the rendered DOM. Both are issued through
//! fantoccini's [`WebDriverCompatibleCommand`] extension point.

use fantoccini::wd::WebDriverCompatibleCommand;
use serde::Deserialize;

/// Drain a chromedriver log buffer (`POST /session/{id}/se/log`).
///
/// With `goog:loggingPrefs: {performance: ALL}` in the session capabilities,
/// the `performance` log type yields one entry per buffered DevTools event.
/// Draining is destructive: a second call returns only events recorded since
/// the first.
#[derive(Debug, Clone)]
pub struct GetLogCommand {
    pub log_type: String,
}

impl GetLogCommand {
    pub fn performance() -> Self {
        Self {
            log_type: "performance".to_string(),
        }
    }
}

impl WebDriverCompatibleCommand for GetLogCommand {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!("session/{}/se/log", session_id.unwrap_or_default()))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        (
            http::Method::POST,
            Some(serde_json::json!({ "type": self.log_type }).to_string()),
        )
    }
}

/// Relay one DevTools command (`POST /session/{id}/goog/cdp/execute`).
#[derive(Debug, Clone)]
pub struct CdpCommand {
    pub cmd: String,
    pub params: serde_json::Value,
}

impl CdpCommand {
    pub fn new(cmd: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            cmd: cmd.into(),
            params,
        }
    }
}

impl WebDriverCompatibleCommand for CdpCommand {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!(
            "session/{}/goog/cdp/execute",
            session_id.unwrap_or_default()
        ))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        (
            http::Method::POST,
            Some(serde_json::json!({ "cmd": self.cmd, "params": self.params }).to_string()),
        )
    }
}

/// One raw entry from the performance log.
///
/// `message` is itself a JSON document (the DevTools envelope); entries that
/// fail to parse are skipped by callers rather than aborting a scan, since a
/// busy page produces thousands of events and a single mangled one is noise.
#[derive(Debug, Clone, Deserialize)]
pub struct PerfLogEntry {
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl PerfLogEntry {
    /// Parse the embedded DevTools envelope, if well-formed.
    pub fn devtools(&self) -> Option<DevtoolsMessage> {
        serde_json::from_str::<DevtoolsEnvelope>(&self.message)
            .ok()
            .map(|env| env.message)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DevtoolsEnvelope {
    message: DevtoolsMessage,
}

/// The method/params pair inside a performance-log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DevtoolsMessage {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The subset of `Network.responseReceived` the capture pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseReceived {
    pub request_id: String,
    pub url: String,
}

impl DevtoolsMessage {
    /// Project this event as a `Network.responseReceived`, or `None` for any
    /// other method or a malformed payload.
    pub fn as_response_received(&self) -> Option<ResponseReceived> {
        if self.method != "Network.responseReceived" {
            return None;
        }
        let request_id = self.params.get("requestId")?.as_str()?.to_string();
        let url = self
            .params
            .get("response")?
            .get("url")?
            .as_str()?
            .to_string();
        Some(ResponseReceived { request_id, url })
    }
}

/// Result shape of `Network.getResponseBody`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseBody {
    pub body: String,
    #[serde(default, rename = "base64Encoded")]
    pub base64_encoded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_with(method: &str, params: serde_json::Value) -> PerfLogEntry {
        PerfLogEntry {
            level: Some("INFO".into()),
            message: json!({ "message": { "method": method, "params": params }, "webview": "w1" })
                .to_string(),
            timestamp: Some(1.0),
        }
    }

    #[test]
    fn parses_response_received_envelope() {
        let entry = entry_with(
            "Network.responseReceived",
            json!({
                "requestId": "1000.7",
                "response": { "url": "https://www.instagram.com/stories/ana/?r=1", "status": 200 }
            }),
        );
        let msg = entry.devtools().expect("envelope parses");
        let rr = msg.as_response_received().expect("is responseReceived");
        assert_eq!(rr.request_id, "1000.7");
        assert!(rr.url.contains("ana/?r="));
    }

    #[test]
    fn other_methods_do_not_project() {
        let entry = entry_with("Network.requestWillBeSent", json!({ "requestId": "1" }));
        let msg = entry.devtools().unwrap();
        assert!(msg.as_response_received().is_none());
    }

    #[test]
    fn mangled_message_yields_none() {
        let entry = PerfLogEntry {
            level: None,
            message: "{not json".to_string(),
            timestamp: None,
        };
        assert!(entry.devtools().is_none());
    }

    #[test]
    fn response_body_flags_transport_encoding() {
        let body: ResponseBody =
            serde_json::from_value(json!({ "body": "aGk=", "base64Encoded": true })).unwrap();
        assert!(body.base64_encoded);
        let plain: ResponseBody = serde_json::from_value(json!({ "body": "<html>" })).unwrap();
        assert!(!plain.base64_encoded);
    }

    #[test]
    fn log_command_targets_vendor_endpoint() {
        let base = url::Url::parse("http://localhost:9515/").unwrap();
        let cmd = GetLogCommand::performance();
        let endpoint = cmd.endpoint(&base, Some("abc123")).unwrap();
        assert_eq!(endpoint.path(), "/session/abc123/se/log");
        let (method, body) = cmd.method_and_body(&endpoint);
        assert_eq!(method, http::Method::POST);
        assert!(body.unwrap().contains("performance"));
    }

    #[test]
    fn cdp_command_carries_method_and_params() {
        let base = url::Url::parse("http://localhost:9515/").unwrap();
        let cmd = CdpCommand::new("Network.getResponseBody", json!({ "requestId": "9" }));
        let endpoint = cmd.endpoint(&base, Some("abc123")).unwrap();
        assert_eq!(endpoint.path(), "/session/abc123/goog/cdp/execute");
        let (_, body) = cmd.method_and_body(&endpoint);
        let body: serde_json::Value = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(body["cmd"], "Network.getResponseBody");
        assert_eq!(body["params"]["requestId"], "9");
    }
}
