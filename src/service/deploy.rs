//!
//! Applying a deployment manifest
//!
use super::{ContainerAppService, Progress};
use crate::factory::AppScope;
use crate::manifest::Manifest;
use crate::pipeline::ApiVersionOverride;
use crate::types::ContainerApp;
use crate::{Error, Result, ResultExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

impl ContainerAppService {
    /// Create or replace the app from a YAML manifest and wait for the resulting revision
    /// to run.
    ///
    /// A top level `api-version` in the manifest sends the definition as-is at that
    /// api-version, bypassing the typed models.
    #[tracing::instrument(skip(self, cancel, manifest_yaml, progress))]
    pub async fn deploy_yaml(
        &self,
        cancel: &CancellationToken,
        subscription_id: &str,
        resource_group: &str,
        app_name: &str,
        manifest_yaml: &[u8],
        progress: Progress<'_>,
    ) -> Result<()> {
        let scope = AppScope::new(subscription_id, resource_group, app_name);
        let mut manifest = Manifest::from_slice(manifest_yaml)?;
        let apps = self.client.container_apps(&scope).await?;

        let operation = if let Some(api_version) = manifest.take_api_version()? {
            tracing::info!("applying manifest at api-version {}", api_version);

            let body = manifest.to_json()?;
            let policy = Arc::new(ApiVersionOverride::new(&api_version));
            let apps = apps.with_per_call_policy(policy.clone());

            // The typed body is replaced on the wire by the policy
            policy.set_body(body);
            let operation = apps
                .begin_create_or_update(cancel, &ContainerApp::default())
                .await
                .context("applying manifest");
            policy.clear_body();
            operation?
        } else {
            let app = manifest
                .into_container_app()
                .context("converting to container app type")?;
            apps.begin_create_or_update(cancel, &app)
                .await
                .context("applying manifest")?
        };

        let app = operation
            .poll_until_done(cancel, self.clock.as_ref())
            .await
            .context("polling for container app update completion")?;

        let revision_name = app
            .latest_revision_name()
            .ok_or_else(|| {
                Error::API(format!("container app '{app_name}' has no latest revision"))
            })?;

        self.wait_for_revision_ready(cancel, &scope, revision_name, progress)
            .await
    }
}
