//!
//! Clients for one container app, its revisions and its replicas
//!
use crate::arm::ArmClient;
use crate::operation::Operation;
use crate::pipeline::Policy;
use crate::types::{
    ContainerApp, ContainerAppSecret, Replica, ReplicaCollection, Revision, SecretsCollection,
};
use crate::{Client, Result};
use reqwest::Method;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const PROVIDER: &str = "Microsoft.App";
const CONTAINER_APPS: &str = "containerApps";

/// Identifies a container app
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppScope {
    /// Subscription id
    pub subscription_id: String,
    /// Resource group name
    pub resource_group: String,
    /// Container app name
    pub app_name: String,
}

impl AppScope {
    /// Create a new scope
    #[must_use]
    pub fn new(subscription_id: &str, resource_group: &str, app_name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            app_name: app_name.to_string(),
        }
    }

    fn segments<'a>(&'a self, rest: &[&'a str]) -> Vec<&'a str> {
        let mut segments = vec![
            "subscriptions",
            self.subscription_id.as_str(),
            "resourceGroups",
            self.resource_group.as_str(),
            "providers",
            PROVIDER,
            CONTAINER_APPS,
            self.app_name.as_str(),
        ];
        segments.extend_from_slice(rest);
        segments
    }
}

impl Client {
    /// Client for the container app resource
    pub async fn container_apps(&self, scope: &AppScope) -> Result<ContainerAppsClient> {
        Ok(ContainerAppsClient {
            arm: self.arm_client(&scope.subscription_id).await?,
            scope: scope.clone(),
        })
    }

    /// Client for the app's revisions
    pub async fn revisions(&self, scope: &AppScope) -> Result<RevisionsClient> {
        Ok(RevisionsClient {
            arm: self.arm_client(&scope.subscription_id).await?,
            scope: scope.clone(),
        })
    }

    /// Client for the replicas of the app's revisions
    pub async fn replicas(&self, scope: &AppScope) -> Result<ReplicasClient> {
        Ok(ReplicasClient {
            arm: self.arm_client(&scope.subscription_id).await?,
            scope: scope.clone(),
        })
    }
}

/// Operations on the container app resource
#[derive(Clone, Debug)]
pub struct ContainerAppsClient {
    arm: ArmClient,
    scope: AppScope,
}

impl ContainerAppsClient {
    /// A copy of this client that runs `policy` on each request it makes
    #[must_use]
    pub fn with_per_call_policy(&self, policy: Arc<dyn Policy>) -> Self {
        Self {
            arm: self.arm.with_per_call_policy(policy),
            scope: self.scope.clone(),
        }
    }

    /// Fetch the app. Secret values are not included.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<ContainerApp> {
        let url = self.arm.resource_url(&self.scope.segments(&[]))?;
        self.arm.get_json(cancel, url).await
    }

    /// Create the app or replace its definition
    pub async fn begin_create_or_update(
        &self,
        cancel: &CancellationToken,
        app: &ContainerApp,
    ) -> Result<Operation<ContainerApp>> {
        let url = self.arm.resource_url(&self.scope.segments(&[]))?;
        self.arm.begin(cancel, Method::PUT, url, app).await
    }

    /// Update the app
    pub async fn begin_update(
        &self,
        cancel: &CancellationToken,
        app: &ContainerApp,
    ) -> Result<Operation<ContainerApp>> {
        let url = self.arm.resource_url(&self.scope.segments(&[]))?;
        self.arm.begin(cancel, Method::PATCH, url, app).await
    }

    /// List the app's secrets with their values
    pub async fn list_secrets(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerAppSecret>> {
        let url = self.arm.resource_url(&self.scope.segments(&["listSecrets"]))?;
        let secrets: SecretsCollection = self.arm.post_json(cancel, url).await?;
        Ok(secrets.value)
    }
}

/// Operations on revisions
#[derive(Clone, Debug)]
pub struct RevisionsClient {
    arm: ArmClient,
    scope: AppScope,
}

impl RevisionsClient {
    /// Fetch one revision, template included
    pub async fn get_revision(
        &self,
        cancel: &CancellationToken,
        revision_name: &str,
    ) -> Result<Revision> {
        let url = self
            .arm
            .resource_url(&self.scope.segments(&["revisions", revision_name]))?;
        self.arm.get_json(cancel, url).await
    }
}

/// Operations on replicas
#[derive(Clone, Debug)]
pub struct ReplicasClient {
    arm: ArmClient,
    scope: AppScope,
}

impl ReplicasClient {
    /// List the replicas of a revision
    pub async fn list_replicas(
        &self,
        cancel: &CancellationToken,
        revision_name: &str,
    ) -> Result<Vec<Replica>> {
        let url = self.arm.resource_url(
            &self
                .scope
                .segments(&["revisions", revision_name, "replicas"]),
        )?;
        let replicas: ReplicaCollection = self.arm.get_json(cancel, url).await?;
        Ok(replicas.value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scope_segments() {
        let scope = AppScope::new("sub", "rg", "api");
        assert_eq!(
            scope.segments(&["revisions", "api--1"]).join("/"),
            "subscriptions/sub/resourceGroups/rg/providers/Microsoft.App/containerApps/api/revisions/api--1"
        );
    }
}
