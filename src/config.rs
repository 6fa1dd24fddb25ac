//!
//! Client and service configuration
//!
use envconfig::Envconfig;
use std::collections::HashMap;
use std::time::Duration;

/// Default resource manager endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
/// Default portal, used for links in error suggestions
pub const DEFAULT_PORTAL_URL: &str = "https://portal.azure.com";
/// api-version the resource types in this crate are modelled on
pub const DEFAULT_API_VERSION: &str = "2023-05-01";

/// Settings shared by the [`crate::Client`] and the [`crate::service::ContainerAppService`]
#[derive(Clone, Debug)]
pub struct Config {
    /// Resource manager endpoint
    pub endpoint: url::Url,
    /// Portal base URL
    pub portal_url: String,
    /// Default api-version
    pub api_version: String,
    /// Delay between long running operation polls when the server sends no `Retry-After`
    pub operation_poll_interval: Duration,
    /// User agent sent with every request
    pub user_agent: String,
    /// Replace portal links with plain text in error suggestions
    pub demo_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: url::Url::parse(DEFAULT_ENDPOINT).expect("valid default endpoint"),
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            operation_poll_interval: Duration::from_secs(5),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            demo_mode: false,
        }
    }
}

/// The environment variables [`Config::from_env`] reads
#[derive(Envconfig, Clone, Debug)]
pub struct EnvConfig {
    /// Resource manager endpoint
    #[envconfig(from = "CONTAINERAPPS_ENDPOINT", default = "https://management.azure.com")]
    pub endpoint: url::Url,
    /// Portal base URL
    #[envconfig(from = "CONTAINERAPPS_PORTAL_URL", default = "https://portal.azure.com")]
    pub portal_url: String,
    /// Default api-version
    #[envconfig(from = "CONTAINERAPPS_API_VERSION", default = "2023-05-01")]
    pub api_version: String,
    /// Hide portal links
    #[envconfig(from = "CONTAINERAPPS_DEMO_MODE")]
    pub demo_mode: Option<EnvBool>,
}

impl From<EnvConfig> for Config {
    fn from(env: EnvConfig) -> Self {
        Self {
            endpoint: env.endpoint,
            portal_url: env.portal_url,
            api_version: env.api_version,
            demo_mode: env.demo_mode.is_some_and(|EnvBool(v)| v),
            ..Self::default()
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to the defaults
    /// * `CONTAINERAPPS_ENDPOINT` - resource manager endpoint
    /// * `CONTAINERAPPS_PORTAL_URL` - portal base URL
    /// * `CONTAINERAPPS_API_VERSION` - default api-version
    /// * `CONTAINERAPPS_DEMO_MODE` - boolean, hides portal links
    pub fn from_env() -> crate::Result<Self> {
        let config: Self = EnvConfig::init_from_env()?.into();
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Same as [`Config::from_env`], reading from `vars` instead of the process environment
    pub fn from_vars(vars: &HashMap<String, String>) -> crate::Result<Self> {
        Ok(EnvConfig::init_from_hashmap(vars)?.into())
    }
}

/// Environment boolean. `1 t T TRUE true True` are true, anything else is false.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvBool(pub bool);

impl std::str::FromStr for EnvBool {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(matches!(s, "1" | "t" | "T" | "TRUE" | "true" | "True")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn bool_spellings() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(s.parse::<EnvBool>(), Ok(EnvBool(true)), "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False", "yes", ""] {
            assert_eq!(s.parse::<EnvBool>(), Ok(EnvBool(false)), "{s}");
        }
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint.as_str(), "https://management.azure.com/");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert!(!config.demo_mode);
    }

    #[test]
    fn empty_environment_matches_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.endpoint, defaults.endpoint);
        assert_eq!(config.portal_url, defaults.portal_url);
        assert_eq!(config.api_version, defaults.api_version);
        assert!(!config.demo_mode);
    }

    #[test]
    fn overrides() {
        let config = Config::from_vars(&vars(&[
            ("CONTAINERAPPS_ENDPOINT", "http://127.0.0.1:8080"),
            ("CONTAINERAPPS_PORTAL_URL", "https://portal.example.com"),
            ("CONTAINERAPPS_API_VERSION", "2022-01-01"),
            ("CONTAINERAPPS_DEMO_MODE", "T"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.portal_url, "https://portal.example.com");
        assert_eq!(config.api_version, "2022-01-01");
        assert!(config.demo_mode);
        assert_eq!(config.operation_poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn unrecognised_demo_flag_is_off() {
        let config = Config::from_vars(&vars(&[("CONTAINERAPPS_DEMO_MODE", "yes")])).unwrap();
        assert!(!config.demo_mode);
    }

    #[test]
    fn bad_endpoint_is_an_error() {
        let err = Config::from_vars(&vars(&[("CONTAINERAPPS_ENDPOINT", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
