//! Common utilities for the OpenStack service clients
//!
//! Provides the token-authenticated HTTP wrapper shared by the compute, block
//! storage and network APIs.

use crate::error::OpenStackError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Header carrying the Keystone token on every service request
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// HTTP client wrapper bound to one service endpoint
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    #[must_use]
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.build_url(path);
        debug!("{} {}", method, url);
        self.client
            .request(method, &url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .header("Accept", "application/json")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, OpenStackError> {
        let response = self.request(Method::GET, path).send().await?;
        let response = check_status(response, "GET", path).await?;
        decode(response).await
    }

    /// Make a POST request and decode the response body
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, OpenStackError> {
        debug!("POST {} body: {}", path, redact(body));
        let response = self.request(Method::POST, path).json(body).send().await?;
        let response = check_status(response, "POST", path).await?;
        decode(response).await
    }

    /// Make a POST request whose response has no meaningful body (server actions)
    pub async fn post_action(&self, path: &str, body: &serde_json::Value) -> Result<(), OpenStackError> {
        debug!("POST {} action: {}", path, redact(body));
        let response = self.request(Method::POST, path).json(body).send().await?;
        check_status(response, "POST", path).await?;
        Ok(())
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, OpenStackError> {
        debug!("PUT {} body: {}", path, redact(body));
        let response = self.request(Method::PUT, path).json(body).send().await?;
        let response = check_status(response, "PUT", path).await?;
        decode(response).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), OpenStackError> {
        let response = self.request(Method::DELETE, path).send().await?;
        check_status(response, "DELETE", path).await?;
        Ok(())
    }

    /// Build query string from filters
    #[must_use]
    pub fn build_query_string(filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Map a response status onto the client error kinds.
///
/// 404 is `NotFound`, 401/403 are `Authentication`, anything else outside
/// 2xx is `Api` with the response body as the message.
pub(crate) async fn check_status(
    response: Response,
    method: &str,
    path: &str,
) -> Result<Response, OpenStackError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify(status, method, path, &body))
}

pub(crate) fn classify(status: StatusCode, method: &str, path: &str, body: &str) -> OpenStackError {
    match status {
        StatusCode::NOT_FOUND => OpenStackError::NotFound(format!("{path} - {body}")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            OpenStackError::Authentication(format!("{method} {path} failed: {status} - {body}"))
        }
        _ => OpenStackError::Api {
            status: status.as_u16(),
            message: format!("{method} {path} failed: {body}"),
        },
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, OpenStackError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| OpenStackError::Api {
        status: 200,
        message: format!(
            "error decoding response body: {} - Response (first 500 chars): {}",
            e,
            text.chars().take(500).collect::<String>()
        ),
    })
}

/// Request bodies may carry admin passwords and user data; log only their shape.
fn redact(body: &serde_json::Value) -> String {
    match body {
        serde_json::Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("{{{}}}", keys.join(", "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_joins_paths() {
        let http = HttpClient::new(Client::new(), "https://nova:8774/v2/abc/", "tok");
        assert_eq!(http.base_url(), "https://nova:8774/v2/abc");
        assert_eq!(http.build_url("servers/1"), "https://nova:8774/v2/abc/servers/1");
        assert_eq!(http.build_url("/servers/1"), "https://nova:8774/v2/abc/servers/1");
        assert_eq!(http.build_url("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_classify_status_codes() {
        assert!(classify(StatusCode::NOT_FOUND, "GET", "servers/1", "").is_not_found());
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED, "GET", "servers/1", ""),
            OpenStackError::Authentication(_)
        ));
        assert!(matches!(
            classify(StatusCode::CONFLICT, "DELETE", "volumes/1", "in use"),
            OpenStackError::Api { status: 409, .. }
        ));
    }

    #[test]
    fn test_query_string_is_encoded() {
        let q = HttpClient::build_query_string(&[("name", "m1 small"), ("router:external", "true")]);
        assert_eq!(q, "name=m1%20small&router%3Aexternal=true");
    }

    #[test]
    fn test_redact_only_shows_keys() {
        let body = serde_json::json!({"server": {"adminPass": "secret"}});
        assert_eq!(redact(&body), "{server}");
    }
}
