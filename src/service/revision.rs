//!
//! New revisions from an image update
//!
use super::{ContainerAppService, Progress};
use crate::factory::AppScope;
use crate::types::{ActiveRevisionsMode, Template};
use crate::{Error, Result, ResultExt};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Marks revisions created by this crate
pub const REVISION_SUFFIX_PREFIX: &str = "azd";

/// Suffix for a revision created at `now`
#[must_use]
pub fn revision_suffix(now: DateTime<Utc>) -> String {
    format!("{REVISION_SUFFIX_PREFIX}-{}", now.timestamp())
}

/// Full name of the revision `suffix` of `app_name`
#[must_use]
pub fn revision_name(app_name: &str, suffix: &str) -> String {
    format!("{app_name}--{suffix}")
}

/// Point `template` at `image` under a new revision suffix.
///
/// Only the first container is updated, sidecars keep their image.
pub fn retarget_template(template: &mut Template, suffix: &str, image: &str) -> Result<()> {
    let container = template
        .containers
        .first_mut()
        .ok_or_else(|| Error::API("revision template has no containers".into()))?;
    container.image = Some(image.to_string());
    template.revision_suffix = Some(suffix.to_string());
    Ok(())
}

impl ContainerAppService {
    /// Add a revision running `image_name`, based on the latest revision's template, and
    /// wait for it to run. In multiple revision mode all traffic is then moved to it.
    #[tracing::instrument(skip(self, cancel, progress))]
    pub async fn add_revision(
        &self,
        cancel: &CancellationToken,
        subscription_id: &str,
        resource_group: &str,
        app_name: &str,
        image_name: &str,
        progress: Progress<'_>,
    ) -> Result<()> {
        let scope = AppScope::new(subscription_id, resource_group, app_name);
        let mut app = self.get_container_app(cancel, &scope).await?;

        let current_revision_name = app
            .latest_revision_name()
            .ok_or_else(|| Error::API(format!("container app '{app_name}' has no revisions")))?
            .to_string();

        // The app only exposes the template of the latest revision through the revision itself
        let revision = self
            .client
            .revisions(&scope)
            .await?
            .get_revision(cancel, &current_revision_name)
            .await
            .context(format!("getting revision '{current_revision_name}'"))?;

        let suffix = revision_suffix(self.clock.now());
        let new_revision_name = revision_name(app_name, &suffix);

        let mut template = revision
            .properties
            .and_then(|p| p.template)
            .ok_or_else(|| {
                Error::API(format!("revision '{current_revision_name}' has no template"))
            })?;
        retarget_template(&mut template, &suffix, image_name)?;
        tracing::info!(
            "creating revision {} from {} with image {}",
            new_revision_name,
            current_revision_name,
            image_name
        );

        app.properties_mut().template = Some(template);
        let mut app = self
            .sync_secrets(cancel, &scope, app)
            .await
            .context("syncing secrets")?;

        self.update_container_app(cancel, &scope, &app)
            .await
            .context("updating container app revision")?;

        self.wait_for_revision_ready(cancel, &scope, &new_revision_name, progress)
            .await?;

        if app.active_revisions_mode() == Some(ActiveRevisionsMode::Multiple) {
            if app.ingress().is_none() {
                tracing::warn!(
                    "{} has no ingress, leaving traffic weights unchanged",
                    app_name
                );
                return Ok(());
            }
            self.set_traffic_weights(cancel, &scope, &mut app, &new_revision_name)
                .await
                .context("setting traffic weights")?;
        }

        Ok(())
    }
}
