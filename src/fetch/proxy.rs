//! Relay endpoint model — where chapter pages are fetched *through*.
//!
//! The source site rejects direct cross-origin reads, so every page request
//! is routed through a public relay. Relays differ in how they hand back the
//! upstream document: some wrap it in a JSON envelope, some stream the raw
//! bytes. [`ProxyKind`] captures that difference so the pipeline can stay
//! agnostic about which relay served a page.

use serde::{Deserialize, Serialize};

/// How a relay returns the upstream document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProxyKind {
    /// The relay wraps the document in a JSON envelope; `field` names the
    /// string member holding the HTML (AllOrigins uses `contents`).
    JsonWrapped { field: String },
    /// The relay returns the upstream body verbatim.
    Raw,
}

/// A single relay endpoint the pipeline can route a fetch through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    /// Short name used in logs, progress events, and cache entries.
    pub name: String,
    /// URL prefix the percent-encoded target URL is appended to.
    pub prefix: String,
    #[serde(flatten)]
    pub kind: ProxyKind,
}

/// Failure to recover the upstream document from a relay response.
#[derive(Debug, thiserror::Error)]
pub enum UnwrapError {
    #[error("relay envelope is not valid JSON: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("relay envelope has no string `{field}` member")]
    MissingField { field: String },
}

impl ProxyEndpoint {
    /// Build the URL to request from this relay for the given target page.
    ///
    /// The whole target URL is percent-encoded into the relay's query
    /// parameter, scheme and slashes included.
    pub fn request_url(&self, target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!("{}{}", self.prefix, encoded)
    }

    /// Recover the upstream HTML document from a relay response body.
    pub fn unwrap_body(&self, raw: &str) -> Result<String, UnwrapError> {
        match &self.kind {
            ProxyKind::Raw => Ok(raw.to_string()),
            ProxyKind::JsonWrapped { field } => {
                let envelope: serde_json::Value = serde_json::from_str(raw)?;
                envelope
                    .get(field)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| UnwrapError::MissingField {
                        field: field.clone(),
                    })
            }
        }
    }
}

/// The built-in relay list, tried in order.
///
/// AllOrigins first (JSON envelope, reliable but slower), CodeTabs as the
/// raw-passthrough fallback.
pub fn default_endpoints() -> Vec<ProxyEndpoint> {
    vec![
        ProxyEndpoint {
            name: "AllOrigins".to_string(),
            prefix: "https://api.allorigins.win/get?url=".to_string(),
            kind: ProxyKind::JsonWrapped {
                field: "contents".to_string(),
            },
        },
        ProxyEndpoint {
            name: "CodeTabs".to_string(),
            prefix: "https://api.codetabs.com/v1/proxy?quest=".to_string(),
            kind: ProxyKind::Raw,
        },
    ]
}
