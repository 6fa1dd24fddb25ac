//!
//! Collection of types sent to and returned from the container app APIs.
//!
//! NOTE: The types only name the fields this crate reads or writes. Everything else
//! is kept in the `extra` maps so a fetched resource can be submitted back unchanged.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A container app
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerApp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ContainerAppProperties>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContainerApp {
    /// Name of the most recently created revision
    #[must_use]
    pub fn latest_revision_name(&self) -> Option<&str> {
        self.properties.as_ref()?.latest_revision_name.as_deref()
    }

    /// Revision mode, if the configuration carries one
    #[must_use]
    pub fn active_revisions_mode(&self) -> Option<ActiveRevisionsMode> {
        self.properties.as_ref()?.configuration.as_ref()?.active_revisions_mode
    }

    /// Ingress settings, if ingress is configured
    #[must_use]
    pub fn ingress(&self) -> Option<&Ingress> {
        self.properties.as_ref()?.configuration.as_ref()?.ingress.as_ref()
    }

    /// Properties, created empty if missing
    pub fn properties_mut(&mut self) -> &mut ContainerAppProperties {
        self.properties.get_or_insert_with(Default::default)
    }

    /// Configuration, created empty if missing
    pub fn configuration_mut(&mut self) -> &mut Configuration {
        self.properties_mut()
            .configuration
            .get_or_insert_with(Default::default)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Configuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_revision_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// App configuration, versioned separately from revisions
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_revisions_mode: Option<ActiveRevisionsMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Ingress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Secret>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How many revisions may be active at once
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ActiveRevisionsMode {
    /// Traffic is split between active revisions by weight
    Multiple,
    /// The latest ready revision takes all traffic
    Single,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    /// Public host name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficWeight>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Share of traffic routed to a revision
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficWeight {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,
    /// Percent, all weights sum to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_revision: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Secret as carried on the app configuration. The app GET leaves `value` empty.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(rename = "keyVaultUrl", skip_serializing_if = "Option::is_none")]
    pub key_vault_url: Option<String>,
}

/// Secret as returned by the list secrets action, value included
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppSecret {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(rename = "keyVaultUrl", skip_serializing_if = "Option::is_none")]
    pub key_vault_url: Option<String>,
}

impl From<ContainerAppSecret> for Secret {
    fn from(secret: ContainerAppSecret) -> Self {
        Self {
            name: secret.name,
            value: secret.value,
            identity: secret.identity,
            key_vault_url: secret.key_vault_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecretsCollection {
    #[serde(default)]
    pub value: Vec<ContainerAppSecret>,
}

/// Runtime template, a change to it creates a new revision
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An immutable snapshot of an app template
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<RevisionProperties>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Revision {
    /// A revision that doesn't report the flag is treated as active
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.properties
            .as_ref()
            .and_then(|p| p.active)
            .unwrap_or(true)
    }

    /// Running state, [`RevisionRunningState::Unknown`] if not reported
    #[must_use]
    pub fn running_state(&self) -> RevisionRunningState {
        self.properties
            .as_ref()
            .and_then(|p| p.running_state)
            .unwrap_or(RevisionRunningState::Unknown)
    }

    /// Free text explanation of the running state
    #[must_use]
    pub fn running_state_details(&self) -> Option<&str> {
        self.properties
            .as_ref()?
            .running_state_details
            .as_deref()
            .filter(|d| !d.is_empty())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_state: Option<RevisionRunningState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_state_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Running state of a revision
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum RevisionRunningState {
    Processing,
    Running,
    Failed,
    Stopped,
    Degraded,
    #[serde(other)]
    Unknown,
}

/// Where a revision is in its lifecycle, from the point of view of a rollout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Convergence {
    /// Keep polling
    Converging,
    /// The revision is serving
    Succeeded,
    /// The revision won't become ready without intervention
    Failed,
}

impl RevisionRunningState {
    /// Classify the state for the readiness poller
    #[must_use]
    pub fn convergence(self) -> Convergence {
        match self {
            Self::Processing | Self::Unknown => Convergence::Converging,
            Self::Running => Convergence::Succeeded,
            Self::Failed | Self::Stopped | Self::Degraded => Convergence::Failed,
        }
    }
}

impl std::fmt::Display for RevisionRunningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Processing => "Processing",
            Self::Running => "Running",
            Self::Failed => "Failed",
            Self::Stopped => "Stopped",
            Self::Degraded => "Degraded",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A running instance of a revision
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Replica {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ReplicaProperties>,
}

impl Replica {
    /// Replica level running state reports running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.properties
            .as_ref()
            .and_then(|p| p.running_state)
            .is_some_and(|s| s == ReplicaRunningState::Running)
    }

    /// Every container reports ready. A container without the flag is not ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.properties.as_ref().map_or(true, |p| {
            p.containers.iter().all(|c| c.ready == Some(true))
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_state: Option<ReplicaRunningState>,
    #[serde(default)]
    pub containers: Vec<ReplicaContainer>,
}

/// Running state of a replica
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ReplicaRunningState {
    Running,
    NotRunning,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaContainer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplicaCollection {
    #[serde(default)]
    pub value: Vec<Replica>,
}
