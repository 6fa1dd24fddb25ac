//!
//! Secret values for app updates.
//!
//! Reading an app returns its secrets without values, and an update carrying value-less
//! secrets deletes them. Before an update the secrets are re-read with their values.
use super::ContainerAppService;
use crate::factory::AppScope;
use crate::types::{ContainerApp, ContainerAppSecret, Secret};
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Replace the app's secret configuration with `listed`
pub fn apply_secrets(app: &mut ContainerApp, listed: Vec<ContainerAppSecret>) {
    app.configuration_mut().secrets = listed.into_iter().map(Secret::from).collect();
}

fn has_secrets(app: &ContainerApp) -> bool {
    app.properties
        .as_ref()
        .and_then(|p| p.configuration.as_ref())
        .is_some_and(|c| !c.secrets.is_empty())
}

impl ContainerAppService {
    /// Fill in secret values on `app`. Apps without secrets are returned unchanged.
    pub async fn sync_secrets(
        &self,
        cancel: &CancellationToken,
        scope: &AppScope,
        mut app: ContainerApp,
    ) -> Result<ContainerApp> {
        if !has_secrets(&app) {
            return Ok(app);
        }

        let listed = self.fetch_secrets(cancel, scope).await?;
        tracing::debug!("copying {} secrets into the update", listed.len());

        apply_secrets(&mut app, listed);
        Ok(app)
    }
}
