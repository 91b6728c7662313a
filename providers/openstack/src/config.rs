//! Provider configuration
//!
//! Credentials come from the usual `OS_*` environment variables. A resource
//! document may carry a `provider` block whose values take precedence.

use crate::error::ProviderError;
use openstack_client::AuthOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated provider configuration
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub auth_url: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub password: String,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
    pub region: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("auth_url", &self.auth_url)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("tenant_name", &self.tenant_name)
            .field("domain_id", &self.domain_id)
            .field("domain_name", &self.domain_name)
            .field("region", &self.region)
            .finish()
    }
}

/// The optional `provider` block of a resource document
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderOverrides {
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl fmt::Debug for ProviderOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOverrides")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tenant_id", &self.tenant_id)
            .field("tenant_name", &self.tenant_name)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl ProviderConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
        };

        Self {
            auth_url: var(&["OS_AUTH_URL"]).unwrap_or_default(),
            user_id: var(&["OS_USER_ID", "OS_USERID"]),
            username: var(&["OS_USERNAME"]),
            password: var(&["OS_PASSWORD"]).unwrap_or_default(),
            tenant_id: var(&["OS_TENANT_ID"]),
            tenant_name: var(&["OS_TENANT_NAME"]),
            domain_id: var(&["OS_DOMAIN_ID"]),
            domain_name: var(&["OS_DOMAIN_NAME"]),
            region: var(&["OS_REGION_NAME"]),
        }
    }

    /// Apply document-level overrides on top of the environment values
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ProviderOverrides) -> Self {
        fn set(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
                *target = Some(v.clone());
            }
        }

        if let Some(auth_url) = overrides.auth_url.as_ref().filter(|v| !v.is_empty()) {
            self.auth_url = auth_url.clone();
        }
        if let Some(password) = overrides.password.as_ref().filter(|v| !v.is_empty()) {
            self.password = password.clone();
        }
        set(&mut self.user_id, &overrides.user_id);
        set(&mut self.username, &overrides.username);
        set(&mut self.tenant_id, &overrides.tenant_id);
        set(&mut self.tenant_name, &overrides.tenant_name);
        set(&mut self.domain_id, &overrides.domain_id);
        set(&mut self.domain_name, &overrides.domain_name);
        set(&mut self.region, &overrides.region);
        self
    }

    /// Check that enough credentials are present to authenticate
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::InvalidConfig` naming the first missing value.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.auth_url.is_empty() {
            return Err(ProviderError::InvalidConfig("OS_AUTH_URL is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(ProviderError::InvalidConfig("OS_PASSWORD is required".to_string()));
        }
        if self.user_id.is_none() && self.username.is_none() {
            return Err(ProviderError::InvalidConfig(
                "one of OS_USER_ID or OS_USERNAME is required".to_string(),
            ));
        }
        if self.tenant_id.is_none() && self.tenant_name.is_none() {
            return Err(ProviderError::InvalidConfig(
                "one of OS_TENANT_ID or OS_TENANT_NAME is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Keystone credentials for this configuration
    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            auth_url: self.auth_url.clone(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            tenant_id: self.tenant_id.clone(),
            tenant_name: self.tenant_name.clone(),
            domain_id: self.domain_id.clone(),
            domain_name: self.domain_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> ProviderConfig {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ProviderConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn complete() -> ProviderConfig {
        env(&[
            ("OS_AUTH_URL", "https://keystone:5000/v2.0"),
            ("OS_USERNAME", "demo"),
            ("OS_PASSWORD", "secret"),
            ("OS_TENANT_NAME", "demo"),
        ])
    }

    #[test]
    fn test_complete_env_validates() {
        let config = complete();
        assert!(config.validate().is_ok());
        assert_eq!(config.region, None);
    }

    #[test]
    fn test_userid_alias() {
        let config = env(&[("OS_USERID", "u-1")]);
        assert_eq!(config.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_missing_password() {
        let config = env(&[
            ("OS_AUTH_URL", "https://keystone:5000/v2.0"),
            ("OS_USERNAME", "demo"),
            ("OS_TENANT_NAME", "demo"),
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OS_PASSWORD"));
    }

    #[test]
    fn test_missing_user() {
        let config = env(&[
            ("OS_AUTH_URL", "https://keystone:5000/v2.0"),
            ("OS_PASSWORD", "secret"),
            ("OS_TENANT_ID", "t-1"),
        ]);
        assert!(matches!(config.validate(), Err(ProviderError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_tenant() {
        let config = env(&[
            ("OS_AUTH_URL", "https://keystone:5000/v2.0"),
            ("OS_USERNAME", "demo"),
            ("OS_PASSWORD", "secret"),
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OS_TENANT_ID"));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = env(&[("OS_REGION_NAME", ""), ("OS_USERNAME", "")]);
        assert_eq!(config.region, None);
        assert_eq!(config.username, None);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = ProviderOverrides {
            region: Some("RegionTwo".to_string()),
            password: Some("other".to_string()),
            tenant_name: Some(String::new()),
            ..Default::default()
        };
        let config = complete().with_overrides(&overrides);
        assert_eq!(config.region.as_deref(), Some("RegionTwo"));
        assert_eq!(config.password, "other");
        assert_eq!(config.tenant_name.as_deref(), Some("demo"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("secret"));
    }
}
