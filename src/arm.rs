//!
//! Subscription scoped, authenticated access to the resource manager
//!
use crate::clock::or_cancel;
use crate::credentials::AccessToken;
use crate::operation::Operation;
use crate::pipeline::{Pipeline, Policy, API_VERSION_PARAM};
use crate::{ArmError, Error, Result};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sends authenticated requests through the policy [`Pipeline`]
#[derive(Clone)]
pub struct ArmClient {
    client: reqwest::Client,
    endpoint: url::Url,
    api_version: String,
    token: AccessToken,
    pipeline: Pipeline,
    operation_poll_interval: Duration,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("token", &self.token)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl ArmClient {
    pub(crate) fn new(
        client: reqwest::Client,
        endpoint: url::Url,
        api_version: String,
        token: AccessToken,
        pipeline: Pipeline,
        operation_poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_version,
            token,
            pipeline,
            operation_poll_interval,
        }
    }

    /// A copy of this client with `policy` run on each of its requests. Other
    /// clients, including `self`, are not affected.
    #[must_use]
    pub fn with_per_call_policy(&self, policy: Arc<dyn Policy>) -> Self {
        Self {
            pipeline: self.pipeline.with_per_call(policy),
            ..self.clone()
        }
    }

    /// The policies requests pass through
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub(crate) fn operation_poll_interval(&self) -> Duration {
        self.operation_poll_interval
    }

    /// URL of a resource below the endpoint, with the default api-version.
    /// Segments are percent-encoded.
    pub fn resource_url(&self, segments: &[&str]) -> Result<url::Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| Error::URL(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair(API_VERSION_PARAM, &self.api_version);
        Ok(url)
    }

    /// Send a request, returning the response if the status is a success.
    /// A request still in flight when `cancel` fires is dropped.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: url::Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        tracing::debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.token.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let mut request = builder.build()?;
        self.pipeline.apply(&mut request)?;

        let result = or_cancel(cancel, self.client.execute(request)).await??;

        if result.status().is_success() {
            Ok(result)
        } else {
            let status = result.status();
            tracing::error!("request to {} failed: {}", result.url().path(), status);
            let text = or_cancel(cancel, result.text()).await?.unwrap_or_default();
            match serde_json::from_str::<ArmError>(&text) {
                Ok(err) => Err(Error::REST(err)),
                Err(_) => Err(Error::WebServer(status.as_u16(), status.to_string())),
            }
        }
    }

    /// GET a json payload
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        url: url::Url,
    ) -> Result<T> {
        let result = self.send::<()>(cancel, Method::GET, url, None).await?;
        Ok(or_cancel(cancel, result.json()).await??)
    }

    /// POST without a body and decode the response
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        url: url::Url,
    ) -> Result<T> {
        let result = self.send::<()>(cancel, Method::POST, url, None).await?;
        Ok(or_cancel(cancel, result.json()).await??)
    }

    /// Start a long running operation
    pub async fn begin<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: url::Url,
        body: &B,
    ) -> Result<Operation<T>> {
        let result = self.send(cancel, method, url.clone(), Some(body)).await?;
        Operation::from_response(cancel, self.clone(), url, result).await
    }
}
