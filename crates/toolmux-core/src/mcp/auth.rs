//! Authentication modes for network transports

use super::error::{McpError, McpResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

/// Authentication applied to every connect and call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// `Authorization: Basic base64(user:pass)`
    Basic { username: String, password: String },
    /// Key sent in a custom header
    ApiKey {
        #[serde(default = "default_api_key_header")]
        header: String,
        key: String,
    },
}

impl AuthConfig {
    /// Create bearer auth
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Create basic auth
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create API-key auth with the default header
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey {
            header: default_api_key_header(),
            key: key.into(),
        }
    }

    /// Reject missing credentials before any I/O happens
    pub fn validate(&self) -> McpResult<()> {
        match self {
            Self::None => Ok(()),
            Self::Bearer { token } if token.trim().is_empty() => {
                Err(McpError::auth("bearer token is empty"))
            }
            Self::Basic { username, .. } if username.trim().is_empty() => {
                Err(McpError::auth("basic auth username is empty"))
            }
            Self::ApiKey { key, .. } if key.trim().is_empty() => {
                Err(McpError::auth("api key is empty"))
            }
            Self::ApiKey { header, .. } if header.trim().is_empty() => {
                Err(McpError::auth("api key header name is empty"))
            }
            _ => Ok(()),
        }
    }

    /// Header name and value this mode adds, if any
    pub fn header(&self) -> McpResult<Option<(String, String)>> {
        self.validate()?;
        Ok(match self {
            Self::None => None,
            Self::Bearer { token } => Some(("Authorization".to_string(), format!("Bearer {}", token))),
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                Some(("Authorization".to_string(), format!("Basic {}", encoded)))
            }
            Self::ApiKey { header, key } => Some((header.clone(), key.clone())),
        })
    }
}

/// Build the header map for a request: configured headers, then auth
pub fn build_headers(
    headers: &HashMap<String, String>,
    auth: &AuthConfig,
) -> McpResult<HeaderMap> {
    let mut map = HeaderMap::new();
    let auth_header = auth.header()?;
    for (name, value) in headers.iter().chain(auth_header.as_ref().map(|(n, v)| (n, v))) {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| McpError::invalid_request(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| McpError::invalid_request(format!("invalid header value: {}", e)))?;
        map.insert(name, value);
    }
    Ok(map)
}
