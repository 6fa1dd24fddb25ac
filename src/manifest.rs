//!
//! Deployment manifests.
//!
//! A manifest is a YAML mapping holding a container app definition. It is kept as an
//! untyped document so fields the typed models don't know about reach the control plane
//! unchanged. The top level `api-version` key is reserved: it is not part of the
//! resource but selects the api-version the definition is written against.
use crate::types::ContainerApp;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Reserved top level key selecting the api-version
pub const API_VERSION_KEY: &str = "api-version";

/// A parsed deployment manifest
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    document: Map<String, Value>,
}

impl Manifest {
    /// Parse a YAML manifest. The top level must be a mapping with string keys.
    /// Merge keys (`<<: *anchor`) are expanded.
    pub fn from_slice(yaml: &[u8]) -> Result<Self> {
        let mut yaml: serde_yaml::Value = serde_yaml::from_slice(yaml)?;
        yaml.apply_merge()?;
        let value: Value = serde_yaml::from_value(yaml)?;
        match value {
            Value::Object(document) => Ok(Self { document }),
            other => Err(Error::Manifest(format!(
                "expected a mapping at the top level, found {}",
                kind(&other)
            ))),
        }
    }

    /// The pinned api-version, if any
    pub fn api_version(&self) -> Result<Option<&str>> {
        match self.document.get(API_VERSION_KEY) {
            None => Ok(None),
            Some(Value::String(v)) => Ok(Some(v)),
            Some(other) => Err(Error::Manifest(format!(
                "'{API_VERSION_KEY}' must be a string, found {}",
                kind(other)
            ))),
        }
    }

    /// Remove and return the pinned api-version
    pub fn take_api_version(&mut self) -> Result<Option<String>> {
        self.api_version()?;
        match self.document.remove(API_VERSION_KEY) {
            Some(Value::String(v)) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// The document as a JSON request body
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.document)?)
    }

    /// Convert to the typed model
    pub fn into_container_app(self) -> Result<ContainerApp> {
        Ok(serde_json::from_value(Value::Object(self.document))?)
    }

    /// The underlying document
    #[must_use]
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    const MANIFEST: &str = r#"
api-version: "2022-01-01"
location: westus
properties:
  configuration:
    activeRevisionsMode: Single
    ingress:
      external: true
      targetPort: 8080
  template:
    containers:
      - name: api
        image: registry.io/api:v1
"#;

    #[test]
    fn takes_api_version() {
        let mut manifest = Manifest::from_slice(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.api_version().unwrap(), Some("2022-01-01"));
        assert_eq!(
            manifest.take_api_version().unwrap().as_deref(),
            Some("2022-01-01")
        );
        assert_eq!(manifest.api_version().unwrap(), None);

        let body: Value = serde_json::from_slice(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(body["location"], "westus");
        assert_eq!(body["properties"]["configuration"]["ingress"]["targetPort"], 8080);
        assert!(body.get(API_VERSION_KEY).is_none());
    }

    #[test]
    fn merge_keys_are_expanded() {
        let manifest = Manifest::from_slice(
            br#"
defaults: &defaults
  image: registry.io/api:v1
  env:
    - name: MODE
      value: prod
properties:
  template:
    containers:
      - <<: *defaults
        name: api
      - <<: *defaults
        name: worker
        image: registry.io/worker:v1
"#,
        )
        .unwrap();

        let body = String::from_utf8(manifest.to_json().unwrap()).unwrap();
        assert!(!body.contains("<<"), "{body}");

        let app = manifest.into_container_app().unwrap();
        let containers = app.properties.unwrap().template.unwrap().containers;
        assert_eq!(containers[0].name.as_deref(), Some("api"));
        assert_eq!(containers[0].image.as_deref(), Some("registry.io/api:v1"));
        assert_eq!(
            containers[0].extra["env"],
            json!([{ "name": "MODE", "value": "prod" }])
        );
        // Keys set next to the merge win over merged ones
        assert_eq!(containers[1].image.as_deref(), Some("registry.io/worker:v1"));
    }

    #[test]
    fn keeps_document_order() {
        let manifest = Manifest::from_slice(b"zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<_> = manifest.document().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn unquoted_date_is_a_string() {
        let manifest = Manifest::from_slice(b"api-version: 2022-01-01\n").unwrap();
        assert_eq!(manifest.api_version().unwrap(), Some("2022-01-01"));
    }

    #[test]
    fn rejects_non_mapping() {
        let err = Manifest::from_slice(b"- a\n- b\n").unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
        assert!(Manifest::from_slice(b"").is_err());
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = Manifest::from_slice(b"properties: [unclosed").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn non_string_api_version() {
        let mut manifest = Manifest::from_slice(b"api-version: 3\n").unwrap();
        assert!(matches!(manifest.take_api_version(), Err(Error::Manifest(_))));
        // The key is left in place on error
        assert_eq!(manifest.document().get(API_VERSION_KEY), Some(&json!(3)));
    }

    #[test]
    fn converts_to_container_app() {
        let mut manifest = Manifest::from_slice(MANIFEST.as_bytes()).unwrap();
        manifest.take_api_version().unwrap();
        let app = manifest.into_container_app().unwrap();
        assert_eq!(app.location.as_deref(), Some("westus"));
        let template = app.properties.unwrap().template.unwrap();
        assert_eq!(
            template.containers[0].image.as_deref(),
            Some("registry.io/api:v1")
        );
    }
}
