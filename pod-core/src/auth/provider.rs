// pod-core/src/auth/provider.rs
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::AuthError;
use crate::config::ClientConfig;

/// Token endpoint auth method of a public client
pub const AUTH_METHOD_NONE: &str = "none";
const AUTH_METHOD_SECRET_BASIC: &str = "client_secret_basic";
const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

/// Provider URL with a trailing slash, used as cache key and discovery base
pub fn normalize_provider_url(provider_url: &str) -> Result<Url, AuthError> {
    let mut url = Url::parse(provider_url.trim()).map_err(|e| AuthError::InvalidProviderMetadata {
        url: provider_url.to_string(),
        reason: e.to_string(),
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: Option<String>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    registration_endpoint: Option<String>,
    token_endpoint_auth_methods_supported: Option<Vec<String>>,
}

/// Validated subset of an OpenID provider configuration
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub registration_endpoint: Option<Url>,
    pub token_endpoint_auth_methods: Vec<String>,
}

impl ProviderMetadata {
    pub async fn discover(http: &Client, provider_url: &str) -> Result<Self, AuthError> {
        let base = normalize_provider_url(provider_url)?;
        let discovery_url = base
            .join(DISCOVERY_PATH)
            .map_err(|e| AuthError::InvalidProviderMetadata {
                url: provider_url.to_string(),
                reason: e.to_string(),
            })?;

        let unavailable = |reason: String| AuthError::ProviderUnavailable {
            url: discovery_url.to_string(),
            reason,
        };
        let response = http
            .get(discovery_url.clone())
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("status {}", response.status())));
        }
        let body = response.text().await.map_err(|e| unavailable(e.to_string()))?;

        tracing::debug!("Discovered provider configuration at {}", discovery_url);
        Self::from_json(base.as_str(), &body)
    }

    /// Fails fast on a document without the endpoints the login flow needs
    pub fn from_json(provider_url: &str, body: &str) -> Result<Self, AuthError> {
        let invalid = |reason: String| AuthError::InvalidProviderMetadata {
            url: provider_url.to_string(),
            reason,
        };
        let document: DiscoveryDocument =
            serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?;

        let endpoint = |name: &str, value: Option<String>| -> Result<Url, AuthError> {
            let value = value.ok_or_else(|| invalid(format!("missing {}", name)))?;
            Url::parse(&value).map_err(|e| invalid(format!("{}: {}", name, e)))
        };
        let authorization_endpoint =
            endpoint("authorization_endpoint", document.authorization_endpoint)?;
        let token_endpoint = endpoint("token_endpoint", document.token_endpoint)?;
        let registration_endpoint = match document.registration_endpoint {
            Some(value) => Some(endpoint("registration_endpoint", Some(value))?),
            None => None,
        };

        Ok(Self {
            issuer: document.issuer.unwrap_or_else(|| provider_url.to_string()),
            authorization_endpoint,
            token_endpoint,
            registration_endpoint,
            // The OpenID Connect default when the field is absent
            token_endpoint_auth_methods: document
                .token_endpoint_auth_methods_supported
                .unwrap_or_else(|| vec![AUTH_METHOD_SECRET_BASIC.to_string()]),
        })
    }

    /// Whether a client without a secret may call the token endpoint
    pub fn supports_public_clients(&self) -> bool {
        self.token_endpoint_auth_methods
            .iter()
            .any(|m| m == AUTH_METHOD_NONE)
    }
}

/// Client metadata document sent to a registration endpoint
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientMetadata {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scope: String,
    pub token_endpoint_auth_method: String,
}

impl ClientMetadata {
    /// Declared metadata with the current callback and post-logout URIs added
    pub fn for_registration(
        client: &ClientConfig,
        callback_uri: &str,
        post_logout_redirect_uri: &str,
        public_client: bool,
    ) -> Self {
        let mut redirect_uris = client.redirect_uris.clone();
        if !redirect_uris.iter().any(|u| u == callback_uri) {
            redirect_uris.push(callback_uri.to_string());
        }
        let mut post_logout_redirect_uris = client.post_logout_redirect_uris.clone();
        if !post_logout_redirect_uris
            .iter()
            .any(|u| u == post_logout_redirect_uri)
        {
            post_logout_redirect_uris.push(post_logout_redirect_uri.to_string());
        }

        Self {
            client_name: client.client_name.clone(),
            redirect_uris,
            post_logout_redirect_uris,
            grant_types: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            response_types: vec!["code".to_string()],
            scope: client.scope.clone(),
            token_endpoint_auth_method: if public_client {
                AUTH_METHOD_NONE
            } else {
                AUTH_METHOD_SECRET_BASIC
            }
            .to_string(),
        }
    }
}

/// Whether the static client-id document already covers these URIs
pub fn declares_uris(client: &ClientConfig, callback_uri: &str, post_logout_redirect_uri: &str) -> bool {
    client.redirect_uris.iter().any(|u| u == callback_uri)
        && client
            .post_logout_redirect_uris
            .iter()
            .any(|u| u == post_logout_redirect_uri)
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    client_id: String,
    client_secret: Option<String>,
}

/// Client identity used with one provider
#[derive(Clone)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub registered_at: DateTime<Utc>,
    /// `false` when the static client-id document is used as the client id
    pub dynamic: bool,
}

impl ClientRegistration {
    pub fn client_id_document(client: &ClientConfig) -> Self {
        Self {
            client_id: client.client_id_document.clone(),
            client_secret: None,
            redirect_uris: client.redirect_uris.clone(),
            post_logout_redirect_uris: client.post_logout_redirect_uris.clone(),
            registered_at: Utc::now(),
            dynamic: false,
        }
    }

    pub async fn register(
        http: &Client,
        endpoint: &Url,
        metadata: &ClientMetadata,
    ) -> Result<Self, AuthError> {
        let response = http
            .post(endpoint.clone())
            .json(metadata)
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable {
                url: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AuthError::RegistrationRejected {
                status: status.as_u16(),
                body,
            });
        }
        let registered: RegistrationResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::RegistrationRejected {
                status: status.as_u16(),
                body: format!("unreadable registration response: {}", e),
            })?;

        Ok(Self {
            client_id: registered.client_id,
            client_secret: registered.client_secret,
            redirect_uris: metadata.redirect_uris.clone(),
            post_logout_redirect_uris: metadata.post_logout_redirect_uris.clone(),
            registered_at: Utc::now(),
            dynamic: true,
        })
    }

    /// Registered for the URIs this deployment redirects to
    pub fn covers(&self, callback_uri: &str, post_logout_redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == callback_uri)
            && self
                .post_logout_redirect_uris
                .iter()
                .any(|u| u == post_logout_redirect_uri)
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now().signed_duration_since(self.registered_at) > ttl
    }
}

impl fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("redirect_uris", &self.redirect_uris)
            .field("registered_at", &self.registered_at)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

/// Dynamic registrations per provider, so a client is not registered again on
/// every login.
///
/// An entry is dropped when it is older than the TTL, when it no longer covers
/// the configured redirect URIs, when the token endpoint answers
/// `invalid_client`, or on request.
pub struct RegistrationCache {
    entries: DashMap<String, ClientRegistration>,
    ttl: Duration,
}

impl RegistrationCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn get(
        &self,
        provider: &str,
        callback_uri: &str,
        post_logout_redirect_uri: &str,
    ) -> Option<ClientRegistration> {
        let usable = self.entries.get(provider).and_then(|entry| {
            let registration = entry.value();
            if registration.is_expired(self.ttl) {
                tracing::debug!("Registration for {} expired", provider);
                None
            } else if !registration.covers(callback_uri, post_logout_redirect_uri) {
                tracing::debug!("Registration for {} has stale redirect URIs", provider);
                None
            } else {
                Some(registration.clone())
            }
        });

        if usable.is_none() {
            self.entries.remove(provider);
        }
        usable
    }

    pub fn insert(&self, provider: &str, registration: ClientRegistration) {
        self.entries.insert(provider.to_string(), registration);
    }

    pub fn invalidate(&self, provider: &str) -> bool {
        self.entries.remove(provider).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
