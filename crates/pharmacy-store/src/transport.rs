//! # Backend Transport
//!
//! The async HTTP seam between the store and the REST backend.
//!
//! ## Request Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Store action                 Transport call                            │
//! │  ────────────                 ──────────────                            │
//! │  load_products()        ───►  get("/products")                          │
//! │  create_product(draft)  ───►  post("/products", record)                 │
//! │  update_product(id, p)  ───►  patch("/products/{id}", patch)            │
//! │  update_stock(id, ..)   ───►  patch("/products/{id}", {currentStock})   │
//! │  delete_product(id)     ───►  delete("/products/{id}")                  │
//! │                                                                         │
//! │  No transport configured: load settles on the rehydrated snapshot and   │
//! │  writes apply locally only.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tests substitute their own [`Transport`] to avoid sockets and timers.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{TransportError, TransportResult};

/// JSON-over-HTTP client abstraction injected into the store.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> TransportResult<Value>;

    async fn post(&self, path: &str, body: Value) -> TransportResult<Value>;

    async fn patch(&self, path: &str, body: Value) -> TransportResult<Value>;

    async fn delete(&self, path: &str) -> TransportResult<Value>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url` (`http://` or `https://`).
    pub fn new(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let base_url = normalize_base(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpTransport { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a store path (`/users/42`) against the base URL, keeping any
    /// path prefix the base carries (`https://host/api/v1/`).
    pub fn endpoint(&self, path: &str) -> TransportResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> TransportResult<Value> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "Backend request");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(%method, %url, status = status.as_u16(), "Backend rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> TransportResult<Value> {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> TransportResult<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> TransportResult<Value> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> TransportResult<Value> {
        self.send(Method::DELETE, path, None).await
    }
}

/// Parses the base URL and guarantees a trailing slash so `join` appends.
fn normalize_base(raw: &str) -> TransportResult<Url> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(TransportError::InvalidUrl(format!(
            "API URL must start with http:// or https://, got: {}",
            trimmed
        )));
    }

    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    Ok(Url::parse(&with_slash)?)
}

/// Extracts a record list from a collection response.
///
/// Accepts a bare array or an envelope object carrying the array under
/// `data` or `items`.
pub fn unwrap_collection(body: Value) -> TransportResult<Value> {
    match body {
        Value::Array(_) => Ok(body),
        Value::Object(mut map) => ["data", "items"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(list @ Value::Array(_)) => Some(list),
                _ => None,
            })
            .ok_or_else(|| TransportError::Decode("expected a list of records".into())),
        Value::Null => Ok(Value::Array(Vec::new())),
        _ => Err(TransportError::Decode("expected a list of records".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let transport =
            HttpTransport::new("https://api.pharmacy.example/v1", Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.endpoint("/products/p-1").unwrap().as_str(),
            "https://api.pharmacy.example/v1/products/p-1"
        );
        assert_eq!(
            transport.endpoint("users").unwrap().as_str(),
            "https://api.pharmacy.example/v1/users"
        );
    }

    #[test]
    fn test_rejects_non_http_base() {
        let err = HttpTransport::new("ftp://files.example", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[test]
    fn test_unwrap_collection_shapes() {
        assert_eq!(unwrap_collection(json!([1, 2])).unwrap(), json!([1, 2]));
        assert_eq!(unwrap_collection(json!({"data": [3]})).unwrap(), json!([3]));
        assert_eq!(unwrap_collection(json!({"items": []})).unwrap(), json!([]));
        assert_eq!(unwrap_collection(Value::Null).unwrap(), json!([]));
        assert!(unwrap_collection(json!({"total": 0})).is_err());
        assert!(unwrap_collection(json!("nope")).is_err());
    }
}
