//!
//! Optional module for building a service from the environment

/// Build a [`crate::service::ContainerAppService`] from environment variables
/// * `CONTAINERAPPS_ACCESS_TOKEN` - bearer token, read on every request
/// * `CONTAINERAPPS_ENDPOINT`, `CONTAINERAPPS_PORTAL_URL`, `CONTAINERAPPS_API_VERSION`,
///   `CONTAINERAPPS_DEMO_MODE` - see [`crate::config::Config::from_env`]
///
/// Fails early if no token is set.
pub async fn login() -> crate::Result<crate::service::ContainerAppService> {
    use crate::credentials::CredentialProvider;

    let config = crate::config::Config::from_env()?;
    tracing::info!("Using resource manager at {}", config.endpoint);

    let credentials = crate::credentials::EnvironmentCredential;
    credentials.credential_for_subscription("").await?;

    let client = crate::ClientBuilder::from_config(&config).build(credentials)?;
    Ok(crate::service::ContainerAppService::new(client, &config))
}
