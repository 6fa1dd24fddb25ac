//!
//! Traffic weights for apps in multiple revision mode
//!
use super::ContainerAppService;
use crate::factory::AppScope;
use crate::types::{ContainerApp, TrafficWeight};
use crate::{Error, Result, ResultExt};
use tokio_util::sync::CancellationToken;

/// Route all traffic to `revision_name`, dropping any existing split
pub fn route_all_traffic(app: &mut ContainerApp, revision_name: &str) -> Result<()> {
    let ingress = app
        .properties
        .as_mut()
        .and_then(|p| p.configuration.as_mut())
        .and_then(|c| c.ingress.as_mut())
        .ok_or_else(|| Error::API("container app has no ingress configuration".into()))?;

    ingress.traffic = vec![TrafficWeight {
        revision_name: Some(revision_name.to_string()),
        weight: Some(100),
        ..Default::default()
    }];
    Ok(())
}

impl ContainerAppService {
    /// Send all traffic of `app` to `revision_name` and wait for the update to apply
    #[tracing::instrument(level = "debug", skip(self, cancel, app))]
    pub async fn set_traffic_weights(
        &self,
        cancel: &CancellationToken,
        scope: &AppScope,
        app: &mut ContainerApp,
        revision_name: &str,
    ) -> Result<()> {
        route_all_traffic(app, revision_name)?;
        tracing::info!("routing all traffic to {}", revision_name);

        self.update_container_app(cancel, scope, app)
            .await
            .context("updating traffic weights")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_existing_split() {
        let mut app: ContainerApp = serde_json::from_value(json!({
            "properties": { "configuration": {
                "activeRevisionsMode": "Multiple",
                "ingress": {
                    "fqdn": "api.example.io",
                    "traffic": [
                        { "revisionName": "api--a", "weight": 20 },
                        { "revisionName": "api--b", "weight": 30, "label": "canary" },
                        { "latestRevision": true, "weight": 50 }
                    ]
                }
            }}
        }))
        .unwrap();

        route_all_traffic(&mut app, "api--azd-1700000000").unwrap();

        let ingress = app.ingress().unwrap();
        assert_eq!(
            ingress.traffic,
            vec![TrafficWeight {
                revision_name: Some("api--azd-1700000000".into()),
                weight: Some(100),
                ..Default::default()
            }]
        );
        assert_eq!(ingress.fqdn.as_deref(), Some("api.example.io"));
    }

    #[test]
    fn works_without_previous_weights() {
        let mut app: ContainerApp = serde_json::from_value(json!({
            "properties": { "configuration": { "ingress": { "external": true } } }
        }))
        .unwrap();
        route_all_traffic(&mut app, "api--2").unwrap();
        assert_eq!(app.ingress().unwrap().traffic.len(), 1);
    }

    #[test]
    fn requires_ingress() {
        let mut app = ContainerApp::default();
        assert!(matches!(
            route_all_traffic(&mut app, "api--2"),
            Err(Error::API(_))
        ));
    }
}
