//!
//! Library for rolling out container app revisions and waiting for them to become ready.
//!
//! ## Client
//! All calls go through a [`Client`], which holds the endpoint, the HTTP client and a
//! [`credentials::CredentialProvider`] used to authenticate per subscription.
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), containerapps_client::Error> {
//!     use containerapps_client::{credentials::StaticCredential, ClientBuilder};
//!
//!     let client = ClientBuilder::new()
//!         .endpoint("https://management.azure.com")?
//!         .build(StaticCredential::new("bearer token"))?;
//!     # let _ = client;
//!     Ok(())
//! }
//! ```
//!
//! ## Rolling out a new image
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), containerapps_client::Error> {
//!     use containerapps_client::config::Config;
//!     use containerapps_client::credentials::StaticCredential;
//!     use containerapps_client::service::ContainerAppService;
//!     use containerapps_client::ClientBuilder;
//!     use tokio_util::sync::CancellationToken;
//!
//!     let config = Config::from_env()?;
//!     let client = ClientBuilder::from_config(&config).build(StaticCredential::new("token"))?;
//!     let service = ContainerAppService::new(client, &config);
//!
//!     let cancel = CancellationToken::new();
//!     service
//!         .add_revision(&cancel, "sub-id", "my-rg", "api", "registry.io/api:v2", &|msg| {
//!             println!("{msg}");
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub mod arm;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod factory;
pub mod manifest;
pub mod operation;
pub mod pipeline;
pub mod service;
pub mod types;

#[cfg(feature = "login-helper")]
pub mod login_helper;

/// Error body returned by the control plane
#[derive(Debug, Deserialize)]
pub struct ArmError {
    /// Error details
    pub error: ArmErrorDetail,
}

/// Code and message of a control plane error
#[derive(Debug, Deserialize)]
pub struct ArmErrorDetail {
    /// Machine readable error code
    #[serde(default)]
    pub code: String,
    /// Human readable message
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ArmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error.code, self.error.message)
    }
}

/// Error returned by client functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A credential could not be obtained
    #[error("Credential error: {0}")]
    Credential(String),

    /// Failed returned by the HTTP server
    #[error("HTTP failed {0}, {1}")]
    WebServer(u16, String),

    /// JSON serialization/deserialization error
    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing error
    #[error("URL: {0}")]
    URL(#[from] url::ParseError),

    /// HTTP client error
    #[error("Reqwest: {0}")]
    HTTPClient(#[from] reqwest::Error),

    /// This error is returned from the REST API, this typically means the client did something
    /// wrong.
    #[error("REST error {0}")]
    REST(ArmError),

    /// The deployment manifest has a shape we can't use
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// This error is returned if we get data from the API we can't parse/understand
    #[error("API Error {0:?}")]
    API(String),

    /// A long running operation ended in a failed or canceled state
    #[error("operation {status}: {message}")]
    Operation {
        /// Final operation status
        status: String,
        /// Error message reported by the operation, if any
        message: String,
    },

    /// The revision exists but no longer receives traffic
    #[error("revision '{0}' is not active")]
    RevisionNotActive(String),

    /// The revision reached a state it will not recover from on its own
    #[error("revision '{revision}' is in a {state} state{details}")]
    RevisionState {
        /// Revision name
        revision: String,
        /// Observed running state
        state: types::RevisionRunningState,
        /// `", <details>"` when the control plane reported them, otherwise empty
        details: String,
        /// Steps for finding out what went wrong
        suggestion: String,
    },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Error with a description of the step that failed
    #[error("{context}: {source}")]
    Context {
        /// The step that failed
        context: String,
        /// Underlying error
        source: Box<Error>,
    },

    /// Configuration could not be loaded from the environment
    #[error("Config error: {0}")]
    Config(#[from] envconfig::Error),
}

impl Error {
    /// Wrap the error with a description of the failing step. Cancellation is never wrapped.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Cancelled => Self::Cancelled,
            err => Self::Context {
                context: context.into(),
                source: Box::new(err),
            },
        }
    }

    /// Remediation steps attached to a terminal revision failure
    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::RevisionState { suggestion, .. } => Some(suggestion),
            Self::Context { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// True if the error is, or wraps, a cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Context { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }
}

/// Builder for a [`Client`]
#[derive(Clone)]
pub struct ClientBuilder {
    endpoint: url::Url,
    api_version: String,
    user_agent: String,
    reqwest_ca: Vec<reqwest::Certificate>,
    disable_cert_verification: bool,
    policies: Vec<Arc<dyn pipeline::Policy>>,
    operation_poll_interval: Duration,
}

impl ClientBuilder {
    /// Create a new builder instance with the public cloud defaults
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&config::Config::default())
    }

    /// Create a builder from a loaded [`config::Config`]
    #[must_use]
    pub fn from_config(config: &config::Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_version: config.api_version.clone(),
            user_agent: config.user_agent.clone(),
            reqwest_ca: Vec::new(),
            disable_cert_verification: false,
            policies: Vec::new(),
            operation_poll_interval: config.operation_poll_interval,
        }
    }

    /// Resource manager endpoint
    pub fn endpoint(self, endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)?;
        Ok(Self { endpoint, ..self })
    }

    /// api-version sent with every request unless a per-call policy replaces it
    #[must_use]
    pub fn api_version(self, api_version: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            ..self
        }
    }

    /// User agent sent with every request
    #[must_use]
    pub fn user_agent(self, user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            ..self
        }
    }

    /// Add a root certificate for API certificate verification
    pub fn add_root_certificate(mut self, cert: &[u8]) -> Result<Self> {
        let r_ca = reqwest::Certificate::from_pem(cert)?;
        self.reqwest_ca.push(r_ca);
        Ok(self)
    }

    /// Disable certificate verification
    #[must_use]
    pub fn danger_accept_invalid_certs(self) -> Self {
        Self {
            disable_cert_verification: true,
            ..self
        }
    }

    /// Install a policy on every request made by the built client
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn pipeline::Policy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Delay between long running operation polls when the server does not send `Retry-After`
    #[must_use]
    pub fn operation_poll_interval(self, operation_poll_interval: Duration) -> Self {
        Self {
            operation_poll_interval,
            ..self
        }
    }

    /// Build the client
    pub fn build(
        self,
        credentials: impl credentials::CredentialProvider + 'static,
    ) -> Result<Client> {
        let client = reqwest::Client::builder().user_agent(self.user_agent.clone());

        // Add CA certificates
        let client = self
            .reqwest_ca
            .iter()
            .fold(client, |client, ca| client.add_root_certificate(ca.clone()));

        let client = client
            .danger_accept_invalid_certs(self.disable_cert_verification)
            .build()?;

        Ok(Client {
            endpoint: self.endpoint,
            api_version: self.api_version,
            client,
            credentials: Arc::new(credentials),
            policies: self.policies,
            operation_poll_interval: self.operation_poll_interval,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The `Client` is the entry point for talking to the control plane. It hands out
/// subscription scoped clients, see the [`factory`] module.
#[derive(Clone)]
pub struct Client {
    endpoint: url::Url,
    api_version: String,
    client: reqwest::Client,
    credentials: Arc<dyn credentials::CredentialProvider>,
    policies: Vec<Arc<dyn pipeline::Policy>>,
    operation_poll_interval: Duration,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("client", &self.client)
            .field("policies", &self.policies.len())
            .field("operation_poll_interval", &self.operation_poll_interval)
            .finish()
    }
}

impl Client {
    /// Create a Client builder
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Default api-version
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Authenticate against a subscription and return a client for raw requests
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn arm_client(&self, subscription_id: &str) -> Result<arm::ArmClient> {
        let token = self
            .credentials
            .credential_for_subscription(subscription_id)
            .await?;

        Ok(arm::ArmClient::new(
            self.client.clone(),
            self.endpoint.clone(),
            self.api_version.clone(),
            token,
            pipeline::Pipeline::new(self.policies.clone()),
            self.operation_poll_interval,
        ))
    }
}
