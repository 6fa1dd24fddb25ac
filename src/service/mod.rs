//!
//! Revision rollouts for a container app: apply a manifest or a new image, keep the
//! secrets, move traffic and wait until the revision is running.
//!
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::factory::AppScope;
use crate::types::{ContainerApp, ContainerAppSecret};
use crate::{Client, Result, ResultExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod deploy;
pub mod readiness;
pub mod revision;
pub mod secrets;
pub mod traffic;

pub use readiness::Remediation;

/// Receives human readable progress messages
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Public host names of an app
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngressConfiguration {
    /// Empty when the app has no public ingress
    pub host_names: Vec<String>,
}

/// Manages the revisions of container apps
#[derive(Clone)]
pub struct ContainerAppService {
    client: Client,
    clock: Arc<dyn Clock>,
    remediation: Remediation,
}

impl std::fmt::Debug for ContainerAppService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerAppService")
            .field("client", &self.client)
            .field("remediation", &self.remediation)
            .finish()
    }
}

impl ContainerAppService {
    /// Create a service using the real clock
    #[must_use]
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            remediation: Remediation::new(&config.portal_url, config.demo_mode),
        }
    }

    /// Replace the clock used for revision suffixes and poll delays
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// The client requests are made with
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Public host names of the app
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_ingress_configuration(
        &self,
        subscription_id: &str,
        resource_group: &str,
        app_name: &str,
    ) -> Result<IngressConfiguration> {
        let scope = AppScope::new(subscription_id, resource_group, app_name);
        let app = self
            .get_container_app(&CancellationToken::new(), &scope)
            .await
            .context("failed retrieving container app properties")?;

        let host_names = app
            .ingress()
            .and_then(|ingress| ingress.fqdn.clone())
            .into_iter()
            .collect();

        Ok(IngressConfiguration { host_names })
    }

    /// The app's secrets, values included
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_secrets(
        &self,
        subscription_id: &str,
        resource_group: &str,
        app_name: &str,
    ) -> Result<Vec<ContainerAppSecret>> {
        let scope = AppScope::new(subscription_id, resource_group, app_name);
        self.fetch_secrets(&CancellationToken::new(), &scope).await
    }

    async fn fetch_secrets(
        &self,
        cancel: &CancellationToken,
        scope: &AppScope,
    ) -> Result<Vec<ContainerAppSecret>> {
        self.client
            .container_apps(scope)
            .await?
            .list_secrets(cancel)
            .await
            .context("listing secrets")
    }

    async fn get_container_app(
        &self,
        cancel: &CancellationToken,
        scope: &AppScope,
    ) -> Result<ContainerApp> {
        self.client
            .container_apps(scope)
            .await?
            .get(cancel)
            .await
            .context("getting container app")
    }

    async fn update_container_app(
        &self,
        cancel: &CancellationToken,
        scope: &AppScope,
        app: &ContainerApp,
    ) -> Result<()> {
        let operation = self
            .client
            .container_apps(scope)
            .await?
            .begin_update(cancel, app)
            .await
            .context("begin updating container app")?;

        operation
            .poll_until_done(cancel, self.clock.as_ref())
            .await
            .context("polling for container app update completion")?;
        Ok(())
    }
}
