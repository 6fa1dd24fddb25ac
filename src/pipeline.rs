//!
//! Request pipeline. Policies see every outgoing request just before it is sent.
//!
use crate::Result;
use bytes::Bytes;
use std::sync::{Arc, Mutex};

/// Query parameter carrying the protocol version
pub const API_VERSION_PARAM: &str = "api-version";

/// Hook run on an outgoing request
pub trait Policy: Send + Sync {
    /// Inspect or rewrite `request`
    fn on_request(&self, request: &mut reqwest::Request) -> Result<()>;
}

/// Ordered policies: client-wide ones first, then the per-call ones
#[derive(Clone, Default)]
pub struct Pipeline {
    per_client: Vec<Arc<dyn Policy>>,
    per_call: Vec<Arc<dyn Policy>>,
}

impl Pipeline {
    pub(crate) fn new(per_client: Vec<Arc<dyn Policy>>) -> Self {
        Self {
            per_client,
            per_call: Vec::new(),
        }
    }

    /// A copy of this pipeline with `policy` appended to the per-call policies.
    /// `self` is left untouched.
    #[must_use]
    pub fn with_per_call(&self, policy: Arc<dyn Policy>) -> Self {
        let mut per_call = self.per_call.clone();
        per_call.push(policy);
        Self {
            per_client: self.per_client.clone(),
            per_call,
        }
    }

    /// Number of client-wide policies
    #[must_use]
    pub fn per_client_len(&self) -> usize {
        self.per_client.len()
    }

    /// Number of per-call policies
    #[must_use]
    pub fn per_call_len(&self) -> usize {
        self.per_call.len()
    }

    pub(crate) fn apply(&self, request: &mut reqwest::Request) -> Result<()> {
        for policy in self.per_client.iter().chain(self.per_call.iter()) {
            policy.on_request(request)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("per_client", &self.per_client.len())
            .field("per_call", &self.per_call.len())
            .finish()
    }
}

/// Sends a request at a different api-version, with a body the typed resource
/// models can't express. While a body is held, every request passing through has
/// its `api-version` replaced and its body swapped for the held one. Clear the body
/// once the initial request is sent, otherwise operation polling would be rewritten too.
#[derive(Debug)]
pub struct ApiVersionOverride {
    api_version: String,
    body: Mutex<Option<Bytes>>,
}

impl ApiVersionOverride {
    /// New override, inactive until a body is set
    #[must_use]
    pub fn new(api_version: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            body: Mutex::new(None),
        }
    }

    /// The api-version requests are rewritten to
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Start rewriting requests with `body`
    pub fn set_body(&self, body: impl Into<Bytes>) {
        *self.lock() = Some(body.into());
    }

    /// Stop rewriting requests
    pub fn clear_body(&self) {
        *self.lock() = None;
    }

    /// True while requests are being rewritten
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Bytes>> {
        self.body
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Policy for ApiVersionOverride {
    fn on_request(&self, request: &mut reqwest::Request) -> Result<()> {
        let Some(body) = self.lock().clone() else {
            return Ok(());
        };

        set_query_param(request.url_mut(), API_VERSION_PARAM, &self.api_version);

        tracing::debug!("setting body to {}", String::from_utf8_lossy(&body));

        let headers = request.headers_mut();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.remove(reqwest::header::CONTENT_LENGTH);
        *request.body_mut() = Some(reqwest::Body::from(body));
        Ok(())
    }
}

/// Set `key` to `value`, dropping any previous values of `key`
pub(crate) fn set_query_param(url: &mut url::Url, key: &str, value: &str) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear();
    for (k, v) in &pairs {
        query.append_pair(k, v);
    }
    query.append_pair(key, value);
}
