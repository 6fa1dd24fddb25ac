//!
//! Long running operations.
//!
//! A create or update returns before the change is applied. The response says how to
//! follow it: an `Azure-AsyncOperation` status URL, a `Location` URL answered with
//! `202` until done, or, for changes applied synchronously, the final resource.
use crate::arm::ArmClient;
use crate::clock::{or_cancel, sleep_or_cancel, Clock};
use crate::{Error, Result};
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::marker::PhantomData;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

#[derive(Debug)]
enum PollState {
    Done(Option<serde_json::Value>),
    AsyncOperation(url::Url),
    Location(url::Url),
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<crate::ArmErrorDetail>,
}

/// A started long running operation producing a `T`
#[derive(Debug)]
pub struct Operation<T> {
    client: ArmClient,
    resource_url: url::Url,
    state: PollState,
    retry_after: Option<Duration>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Operation<T> {
    pub(crate) async fn from_response(
        cancel: &CancellationToken,
        client: ArmClient,
        resource_url: url::Url,
        response: reqwest::Response,
    ) -> Result<Self> {
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let async_operation =
            header_url(&resource_url, response.headers(), ASYNC_OPERATION_HEADER)?;
        let location = header_url(
            &resource_url,
            response.headers(),
            reqwest::header::LOCATION.as_str(),
        )?;

        let state = match (async_operation, location) {
            (Some(url), _) => PollState::AsyncOperation(url),
            (None, Some(url)) if status == StatusCode::ACCEPTED => PollState::Location(url),
            _ => PollState::Done(json_body(cancel, response).await?),
        };

        tracing::debug!(?state, "started operation on {}", resource_url);

        Ok(Self {
            client,
            resource_url,
            state,
            retry_after,
            _marker: PhantomData,
        })
    }

    /// Poll until the operation reaches a final state and return the resulting resource
    pub async fn poll_until_done(
        self,
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<T> {
        let default_delay = self.client.operation_poll_interval();
        let mut delay = self.retry_after.unwrap_or(default_delay);

        match self.state {
            PollState::Done(Some(body)) => return Ok(serde_json::from_value(body)?),
            PollState::Done(None) => {}
            PollState::AsyncOperation(url) => loop {
                let response = self
                    .client
                    .send::<()>(cancel, Method::GET, url.clone(), None)
                    .await?;
                let next_delay = retry_after(response.headers()).unwrap_or(default_delay);
                let status: OperationStatus = or_cancel(cancel, response.json()).await??;
                tracing::debug!("operation status {}", status.status);

                match status.status.as_str() {
                    "Succeeded" => break,
                    "Failed" | "Canceled" | "Cancelled" => {
                        return Err(Error::Operation {
                            message: status.error.map(|e| e.message).unwrap_or_default(),
                            status: status.status,
                        })
                    }
                    _ => {}
                }

                sleep_or_cancel(clock, cancel, delay).await?;
                delay = next_delay;
            },
            PollState::Location(url) => loop {
                let response = self
                    .client
                    .send::<()>(cancel, Method::GET, url.clone(), None)
                    .await?;
                if response.status() != StatusCode::ACCEPTED {
                    if let Some(body) = json_body(cancel, response).await? {
                        return Ok(serde_json::from_value(body)?);
                    }
                    break;
                }
                let next_delay = retry_after(response.headers()).unwrap_or(default_delay);

                sleep_or_cancel(clock, cancel, delay).await?;
                delay = next_delay;
            },
        }

        self.client.get_json(cancel, self.resource_url).await
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn header_url(base: &url::Url, headers: &HeaderMap, name: &str) -> Result<Option<url::Url>> {
    match headers.get(name).and_then(|v| v.to_str().ok()) {
        Some(v) if !v.is_empty() => Ok(Some(base.join(v)?)),
        _ => Ok(None),
    }
}

async fn json_body(
    cancel: &CancellationToken,
    response: reqwest::Response,
) -> Result<Option<serde_json::Value>> {
    let bytes = or_cancel(cancel, response.bytes()).await??;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&bytes)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn relative_location_resolves_against_resource() {
        let base = url::Url::parse("https://host/subscriptions/s/apps/a?api-version=1").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("location", "/operations/42".parse().unwrap());
        let url = header_url(&base, &headers, "location").unwrap().unwrap();
        assert_eq!(url.as_str(), "https://host/operations/42");
    }
}
