//! Keystone password authentication (Identity v2.0 and v3)
//!
//! Produces a [`Session`]: the token, the tenant (project) it is scoped to and
//! the normalized service catalog.

use crate::catalog::{CatalogEntry, Endpoint, ServiceCatalog};
use crate::common::classify;
use crate::error::OpenStackError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

/// Response header carrying the v3 token
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Credentials and scope used to obtain a token
#[derive(Clone, Default)]
pub struct AuthOptions {
    pub auth_url: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub password: String,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
}

impl std::fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOptions")
            .field("auth_url", &self.auth_url)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("tenant_name", &self.tenant_name)
            .field("domain_id", &self.domain_id)
            .field("domain_name", &self.domain_name)
            .finish()
    }
}

/// Keystone API version, chosen from the auth URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityVersion {
    V2,
    V3,
}

impl IdentityVersion {
    /// `/v3` suffix selects v3; everything else is treated as v2.0.
    #[must_use]
    pub fn detect(auth_url: &str) -> Self {
        if auth_url.trim_end_matches('/').ends_with("/v3") {
            IdentityVersion::V3
        } else {
            IdentityVersion::V2
        }
    }
}

/// An authenticated, tenant-scoped Keystone session
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub tenant_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub catalog: ServiceCatalog,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("expires_at", &self.expires_at)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl Session {
    /// Whether the token has passed its expiry time.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Authenticate against Keystone with the password method.
///
/// # Errors
///
/// `Authentication` when Keystone rejects the credentials, `InvalidRequest`
/// when the options cannot form a valid request for the detected version.
pub async fn authenticate(client: &Client, opts: &AuthOptions) -> Result<Session, OpenStackError> {
    let base = opts.auth_url.trim_end_matches('/');
    let version = IdentityVersion::detect(base);
    let (url, body) = match version {
        IdentityVersion::V2 => (format!("{base}/tokens"), v2_request(opts)?),
        IdentityVersion::V3 => (format!("{base}/auth/tokens"), v3_request(opts)?),
    };

    debug!("Authenticating against {} ({:?})", url, version);

    let response = client
        .post(&url)
        .header("Accept", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(match classify(status, "POST", &url, &text) {
            OpenStackError::Api { status, message } => {
                OpenStackError::Authentication(format!("{status}: {message}"))
            }
            other => other,
        });
    }

    let subject_token = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let payload: Value = response.json().await?;

    let session = match version {
        IdentityVersion::V2 => parse_v2(payload)?,
        IdentityVersion::V3 => {
            let token = subject_token.ok_or_else(|| {
                OpenStackError::Authentication(format!("{SUBJECT_TOKEN_HEADER} header missing"))
            })?;
            parse_v3(token, payload)?
        }
    };

    info!(
        "Authenticated as {} in tenant {}",
        opts.username.as_deref().or(opts.user_id.as_deref()).unwrap_or("<unknown>"),
        session.tenant_id
    );
    Ok(session)
}

pub(crate) fn v2_request(opts: &AuthOptions) -> Result<Value, OpenStackError> {
    let username = opts.username.as_deref().ok_or_else(|| {
        OpenStackError::InvalidRequest("Identity v2.0 requires a username; user_id is v3 only".to_string())
    })?;

    let mut auth = json!({
        "passwordCredentials": {
            "username": username,
            "password": opts.password,
        }
    });
    if let Some(tenant_id) = &opts.tenant_id {
        auth["tenantId"] = json!(tenant_id);
    } else if let Some(tenant_name) = &opts.tenant_name {
        auth["tenantName"] = json!(tenant_name);
    }

    Ok(json!({ "auth": auth }))
}

fn domain(opts: &AuthOptions) -> Option<Value> {
    if let Some(id) = &opts.domain_id {
        Some(json!({ "id": id }))
    } else {
        opts.domain_name.as_ref().map(|name| json!({ "name": name }))
    }
}

pub(crate) fn v3_request(opts: &AuthOptions) -> Result<Value, OpenStackError> {
    let user = if let Some(user_id) = &opts.user_id {
        json!({ "id": user_id, "password": opts.password })
    } else if let Some(username) = &opts.username {
        let domain = domain(opts).ok_or_else(|| {
            OpenStackError::InvalidRequest(
                "Identity v3 requires domain_id or domain_name with username".to_string(),
            )
        })?;
        json!({ "name": username, "domain": domain, "password": opts.password })
    } else {
        return Err(OpenStackError::InvalidRequest(
            "one of user_id or username is required".to_string(),
        ));
    };

    let mut auth = json!({
        "identity": {
            "methods": ["password"],
            "password": { "user": user },
        }
    });

    if let Some(tenant_id) = &opts.tenant_id {
        auth["scope"] = json!({ "project": { "id": tenant_id } });
    } else if let Some(tenant_name) = &opts.tenant_name {
        let domain = domain(opts).ok_or_else(|| {
            OpenStackError::InvalidRequest(
                "Identity v3 requires domain_id or domain_name with tenant_name".to_string(),
            )
        })?;
        auth["scope"] = json!({ "project": { "name": tenant_name, "domain": domain } });
    }

    Ok(json!({ "auth": auth }))
}

#[derive(Deserialize)]
struct V2Response {
    access: V2Access,
}

#[derive(Deserialize)]
struct V2Access {
    token: V2Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<V2Service>,
}

#[derive(Deserialize)]
struct V2Token {
    id: String,
    expires: Option<DateTime<Utc>>,
    tenant: Option<IdOnly>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct V2Service {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<V2Endpoint>,
}

#[derive(Deserialize)]
struct V2Endpoint {
    #[serde(default)]
    region: String,
    #[serde(rename = "publicURL")]
    public_url: String,
}

pub(crate) fn parse_v2(payload: Value) -> Result<Session, OpenStackError> {
    let resp: V2Response = serde_json::from_value(payload)?;
    let tenant_id = resp
        .access
        .token
        .tenant
        .map(|t| t.id)
        .ok_or_else(|| OpenStackError::Authentication("token is not scoped to a tenant".to_string()))?;

    let entries = resp
        .access
        .service_catalog
        .into_iter()
        .map(|svc| CatalogEntry {
            service_type: svc.service_type,
            endpoints: svc
                .endpoints
                .into_iter()
                .map(|ep| Endpoint {
                    region: ep.region,
                    url: ep.public_url,
                })
                .collect(),
        })
        .collect();

    Ok(Session {
        token: resp.access.token.id,
        tenant_id,
        expires_at: resp.access.token.expires,
        catalog: ServiceCatalog { entries },
    })
}

#[derive(Deserialize)]
struct V3Response {
    token: V3Token,
}

#[derive(Deserialize)]
struct V3Token {
    expires_at: Option<DateTime<Utc>>,
    project: Option<IdOnly>,
    #[serde(default)]
    catalog: Vec<V3Service>,
}

#[derive(Deserialize)]
struct V3Service {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<V3Endpoint>,
}

#[derive(Deserialize)]
struct V3Endpoint {
    interface: String,
    region: Option<String>,
    region_id: Option<String>,
    url: String,
}

pub(crate) fn parse_v3(token: String, payload: Value) -> Result<Session, OpenStackError> {
    let resp: V3Response = serde_json::from_value(payload)?;
    let tenant_id = resp
        .token
        .project
        .map(|p| p.id)
        .ok_or_else(|| OpenStackError::Authentication("token is not scoped to a project".to_string()))?;

    let entries = resp
        .token
        .catalog
        .into_iter()
        .map(|svc| CatalogEntry {
            service_type: svc.service_type,
            endpoints: svc
                .endpoints
                .into_iter()
                .filter(|ep| ep.interface == "public")
                .map(|ep| Endpoint {
                    region: ep.region_id.or(ep.region).unwrap_or_default(),
                    url: ep.url,
                })
                .collect(),
        })
        .collect();

    Ok(Session {
        token,
        tenant_id,
        expires_at: resp.token.expires_at,
        catalog: ServiceCatalog { entries },
    })
}
