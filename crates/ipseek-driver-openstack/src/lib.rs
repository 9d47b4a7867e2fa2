// # OpenStack IPsec Site Connection Driver
//
// Points the peer of a Neutron VPNaaS IPsec site connection at a new address.
//
// One reconciliation is a single pass of at most three requests:
//
// 1. POST `<authURL>` (Identity v3 password grant), expecting 201 and a token
//    in the `X-Subject-Token` response header
// 2. GET `<url>/<id>` with `X-Auth-Token`, reading `peer_address`/`peer_id`
// 3. PUT `<url>/<id>` with both fields set to the new address, expecting 200,
//    only when step 2 shows they differ
//
// The driver never retries and never spawns tasks. Retrying a failed pass is
// up to the dispatcher's retry controller.
//
// ## Object settings
//
// | key        | meaning                                              |
// |------------|------------------------------------------------------|
// | `user`     | Identity user name                                   |
// | `domain`   | Identity domain name of the user                     |
// | `password` | Identity password                                    |
// | `authURL`  | Full token endpoint, e.g. `https://keystone/v3/auth/tokens` |
// | `url`      | Site connection collection, e.g. `https://neutron/v2.0/vpn/ipsec-site-connections` |
// | `id`       | Site connection identifier                           |
//
// ## Security
//
// Neither the password nor the issued token ever appears in logs or errors.

mod wire;

use async_trait::async_trait;
use ipseek_core::registry::DriverRegistry;
use ipseek_core::traits::{BackendDriver, Settings};
use ipseek_core::{Error, Result};
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

pub use wire::{AuthRequest, SiteConnection, SiteConnectionBody};

/// Object type served by this driver
pub const DRIVER_TYPE: &str = "openstack_ipsec_site_connection";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Response header carrying a freshly issued token
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Request header presenting a token
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Setting keys every object of this type must carry
const REQUIRED_SETTINGS: [&str; 6] = ["user", "domain", "password", "authURL", "url", "id"];

/// Result of one successful reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The connection already pointed at the address; nothing was written
    Unchanged,
    /// The connection was rewritten to point at the address
    Updated,
}

/// Settings of one site connection object, borrowed from its configuration
#[derive(Clone, Copy)]
pub struct ConnectionSettings<'a> {
    pub user: &'a str,
    pub domain: &'a str,
    password: &'a str,
    pub auth_url: &'a str,
    pub url: &'a str,
    pub id: &'a str,
}

impl<'a> ConnectionSettings<'a> {
    /// Pick the required keys out of an object's settings
    ///
    /// An absent or empty key is reported as [`Error::MissingSetting`].
    pub fn from_settings(settings: &'a Settings) -> Result<Self> {
        if let Some(missing) = REQUIRED_SETTINGS
            .iter()
            .find(|key| settings.get(**key).is_none_or(|value| value.is_empty()))
        {
            return Err(Error::missing_setting(*missing));
        }

        let get = |key: &str| settings.get(key).map(String::as_str).unwrap_or_default();

        Ok(Self {
            user: get("user"),
            domain: get("domain"),
            password: get("password"),
            auth_url: get("authURL"),
            url: get("url"),
            id: get("id"),
        })
    }

    /// Location of the site connection resource: `url` joined with `id`
    pub fn resource_url(&self) -> Result<Url> {
        resource_url(self.url, self.id)
    }
}

impl std::fmt::Debug for ConnectionSettings<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("user", &self.user)
            .field("domain", &self.domain)
            .field("password", &"<REDACTED>")
            .field("auth_url", &self.auth_url)
            .field("url", &self.url)
            .field("id", &self.id)
            .finish()
    }
}

/// Join a collection URL and a resource identifier with exactly one `/`
fn resource_url(base: &str, id: &str) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| Error::invalid_url(format!("{}: {}", base, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::invalid_url(format!("{}: not a hierarchical URL", base)));
    }

    let id = id.trim_matches('/');
    if id.is_empty() {
        return Err(Error::missing_setting("id"));
    }

    let path = format!("{}/{}", url.path().trim_end_matches('/'), id);
    url.set_path(&path);
    Ok(url)
}

/// Token issued by the Identity service, valid for one reconciliation pass
struct AuthSession {
    token: String,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// OpenStack IPsec site connection driver
///
/// Stateless apart from its HTTP client: no token or connection state is
/// kept between calls, so one instance serves every object of the type
/// concurrently.
#[derive(Debug, Clone)]
pub struct OpenStackIpsecDriver {
    client: reqwest::Client,
}

impl OpenStackIpsecDriver {
    /// Create a driver whose requests each time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Run one reconciliation pass, reporting why it failed
    ///
    /// Stops at the first failing step: a failed authentication issues no
    /// resource request, and a failed read issues no write.
    pub async fn try_reconcile(
        &self,
        settings: &Settings,
        desired_address: &str,
    ) -> Result<Reconciliation> {
        let settings = ConnectionSettings::from_settings(settings)?;
        let resource = settings.resource_url()?;

        let session = self.authenticate(&settings).await?;
        let current = self.fetch_connection(&session, &resource).await?;

        if current.points_at(desired_address) {
            tracing::debug!(
                "{}: {} already points at {}",
                DRIVER_TYPE,
                settings.id,
                desired_address
            );
            return Ok(Reconciliation::Unchanged);
        }

        tracing::info!(
            "{}: Updating {} peer {:?} -> {}",
            DRIVER_TYPE,
            settings.id,
            current.ipsec_site_connection.peer_address,
            desired_address
        );

        self.update_connection(&session, &resource, desired_address)
            .await?;
        Ok(Reconciliation::Updated)
    }

    /// Obtain a token with the password grant
    async fn authenticate(&self, settings: &ConnectionSettings<'_>) -> Result<AuthSession> {
        tracing::debug!(
            "{}: Authenticating as {}@{} against {}",
            DRIVER_TYPE,
            settings.user,
            settings.domain,
            settings.auth_url
        );

        let request = AuthRequest::password(settings.user, settings.domain, settings.password);

        let response = self
            .client
            .post(settings.auth_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::http(format!("Authentication request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(Error::auth(format!(
                "Identity service answered {} for user {}@{}",
                status, settings.user, settings.domain
            )));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::auth(format!("No {} header in response", SUBJECT_TOKEN_HEADER)))?;

        Ok(AuthSession {
            token: token.to_string(),
        })
    }

    /// Read the current peer fields of the connection
    async fn fetch_connection(
        &self,
        session: &AuthSession,
        resource: &Url,
    ) -> Result<SiteConnectionBody> {
        let response = self
            .client
            .get(resource.clone())
            .header(AUTH_TOKEN_HEADER, &session.token)
            .send()
            .await
            .map_err(|e| Error::http(format!("GET {} failed: {}", resource, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!("GET {} rejected the token: {}", resource, status)),
                404 => Error::driver(
                    DRIVER_TYPE,
                    format!("Site connection not found: {}", resource),
                ),
                _ => Error::http(format!("GET {}: {} - {}", resource, status, error_text)),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("Failed to read {}: {}", resource, e)))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Point both peer fields of the connection at `address`
    async fn update_connection(
        &self,
        session: &AuthSession,
        resource: &Url,
        address: &str,
    ) -> Result<()> {
        let response = self
            .client
            .put(resource.clone())
            .header(AUTH_TOKEN_HEADER, &session.token)
            .json(&SiteConnectionBody::pointing_at(address))
            .send()
            .await
            .map_err(|e| Error::http(format!("PUT {} failed: {}", resource, e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::http(format!(
                "PUT {}: {} - {}",
                resource, status, error_text
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl BackendDriver for OpenStackIpsecDriver {
    async fn reconcile(&self, settings: &Settings, desired_address: &str) -> bool {
        match self.try_reconcile(settings, desired_address).await {
            Ok(Reconciliation::Unchanged) => {
                tracing::debug!("{}: No update is needed", DRIVER_TYPE);
                true
            }
            Ok(Reconciliation::Updated) => true,
            Err(e) => {
                tracing::error!("{}: {}", DRIVER_TYPE, e);
                false
            }
        }
    }

    fn driver_name(&self) -> &'static str {
        DRIVER_TYPE
    }
}

/// Register the driver under [`DRIVER_TYPE`]
///
/// # Example
///
/// ```rust
/// use ipseek_core::DriverRegistry;
/// use std::time::Duration;
///
/// let mut registry = DriverRegistry::new();
/// ipseek_driver_openstack::register(&mut registry, Duration::from_secs(30)).unwrap();
/// assert!(registry.has_driver("openstack_ipsec_site_connection"));
/// ```
pub fn register(registry: &mut DriverRegistry, timeout: Duration) -> Result<()> {
    let driver = OpenStackIpsecDriver::new(timeout)?;
    registry.register(DRIVER_TYPE, Arc::new(driver));
    Ok(())
}
