// pod-core/src/auth/authenticator.rs
use chrono::{Duration, Utc};
use dashmap::DashMap;
use reqwest::{redirect, Client};
use serde::Deserialize;
use url::Url;

use super::pkce::{PkcePair, CHALLENGE_METHOD};
use super::provider::{
    declares_uris, normalize_provider_url, ClientMetadata, ClientRegistration, ProviderMetadata,
    RegistrationCache,
};
use super::{webid_from_tokens, AuthError, SessionCredential};
use crate::config::{ClientConfig, Config};
use crate::dpop::{self, ProofKey};
use crate::models::PendingLogin;
use crate::utils::generate_secure_token;

const STATE_LENGTH: usize = 32;
const DPOP_NONCE_HEADER: &str = "DPoP-Nonce";

/// Where to send the user, and the state that will come back on the callback
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub url: String,
    pub state: String,
}

/// Query parameters of the redirect back from the provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// Drives the Authorization Code + PKCE handshake and yields DPoP-bound credentials
pub struct IdentityAuthenticator {
    http: Client,
    client: ClientConfig,
    callback_uri: String,
    post_logout_redirect_uri: String,
    registrations: RegistrationCache,
    pending: DashMap<String, PendingLogin>,
    state_ttl_secs: i64,
}

impl IdentityAuthenticator {
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(config.pod.request_timeout_secs))
            .build()
            .map_err(|e| AuthError::ProviderUnavailable {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: Client, config: &Config) -> Self {
        Self {
            http,
            client: config.client.clone(),
            callback_uri: config.callback_uri(),
            post_logout_redirect_uri: config.post_logout_redirect_uri(),
            registrations: RegistrationCache::new(config.login.registration_ttl_secs),
            pending: DashMap::new(),
            state_ttl_secs: config.login.state_ttl_secs,
        }
    }

    /// Discover the provider, register if needed, and build the authorization URL
    pub async fn begin_login(&self, provider_url: &str) -> Result<LoginRequest, AuthError> {
        self.purge_expired();

        let provider = normalize_provider_url(provider_url)?.to_string();
        let metadata = ProviderMetadata::discover(&self.http, &provider).await?;
        let registration = self.registration_for(&provider, &metadata).await?;

        let pkce = PkcePair::generate();
        let state = generate_secure_token(STATE_LENGTH);

        let mut url = metadata.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", CHALLENGE_METHOD)
            .append_pair("state", &state)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.callback_uri)
            .append_pair("client_id", &registration.client_id)
            .append_pair("scope", &self.client.scope);

        self.pending.insert(
            state.clone(),
            PendingLogin::new(
                provider.clone(),
                metadata,
                registration,
                pkce.verifier,
                self.callback_uri.clone(),
            ),
        );
        tracing::info!("Started login with {}", provider);

        Ok(LoginRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Validate the callback and exchange its code for a DPoP-bound credential.
    /// The pending login is consumed whatever the outcome.
    pub async fn complete_login(&self, params: CallbackParams) -> Result<SessionCredential, AuthError> {
        let state = params.state.as_deref().ok_or(AuthError::StateMismatch)?;
        let (_, pending) = self.pending.remove(state).ok_or_else(|| {
            tracing::warn!("Rejected callback with unknown state");
            AuthError::StateMismatch
        })?;
        if pending.is_expired(self.state_ttl_secs) {
            tracing::warn!("Rejected callback for expired login with {}", pending.provider);
            return Err(AuthError::StateMismatch);
        }

        if let Some(error) = params.error {
            return Err(AuthError::Provider {
                error,
                description: params.error_description.unwrap_or_default(),
            });
        }
        let code = params.code.ok_or(AuthError::MissingCode)?;

        let proof_key = ProofKey::generate()?;
        let tokens = self.exchange_code(&pending, &code, &proof_key).await?;

        let token_type = tokens.token_type.unwrap_or_default();
        if !token_type.eq_ignore_ascii_case("dpop") {
            return Err(AuthError::NotDpopBound(token_type));
        }
        let webid = webid_from_tokens(&tokens.access_token, tokens.id_token.as_deref())
            .ok_or(AuthError::MissingWebId)?;
        let expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        tracing::info!("Logged in {} via {}", webid, pending.provider);
        Ok(SessionCredential::new(
            tokens.access_token,
            proof_key,
            webid,
            pending.metadata.issuer,
            expires_at,
        ))
    }

    /// Drop any cached registration for a provider
    pub fn forget_provider(&self, provider_url: &str) -> bool {
        match normalize_provider_url(provider_url) {
            Ok(provider) => self.registrations.invalidate(provider.as_str()),
            Err(_) => false,
        }
    }

    pub fn pending_logins(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_registrations(&self) -> usize {
        self.registrations.len()
    }

    async fn registration_for(
        &self,
        provider: &str,
        metadata: &ProviderMetadata,
    ) -> Result<ClientRegistration, AuthError> {
        let public_client = metadata.supports_public_clients();
        if public_client
            && declares_uris(&self.client, &self.callback_uri, &self.post_logout_redirect_uri)
        {
            return Ok(ClientRegistration::client_id_document(&self.client));
        }

        if let Some(registration) =
            self.registrations
                .get(provider, &self.callback_uri, &self.post_logout_redirect_uri)
        {
            tracing::debug!("Reusing client {} for {}", registration.client_id, provider);
            return Ok(registration);
        }

        let endpoint = metadata
            .registration_endpoint
            .as_ref()
            .ok_or_else(|| AuthError::RegistrationUnsupported(provider.to_string()))?;
        let client_metadata = ClientMetadata::for_registration(
            &self.client,
            &self.callback_uri,
            &self.post_logout_redirect_uri,
            public_client,
        );
        let registration = ClientRegistration::register(&self.http, endpoint, &client_metadata).await?;

        tracing::info!("Registered client {} with {}", registration.client_id, provider);
        self.registrations.insert(provider, registration.clone());
        Ok(registration)
    }

    async fn exchange_code(
        &self,
        pending: &PendingLogin,
        code: &str,
        proof_key: &ProofKey,
    ) -> Result<TokenResponse, AuthError> {
        let token_endpoint: &Url = &pending.metadata.token_endpoint;
        let registration = &pending.registration;
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", registration.client_id.as_str()),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", pending.code_verifier.as_str()),
        ];

        let mut nonce: Option<String> = None;
        loop {
            let proof = dpop::sign_with_nonce(
                proof_key,
                "POST",
                token_endpoint.as_str(),
                None,
                nonce.as_deref(),
            )?;
            let mut request = self
                .http
                .post(token_endpoint.clone())
                .header("DPoP", proof)
                .form(&form);
            if let Some(secret) = &registration.client_secret {
                request = request.basic_auth(&registration.client_id, Some(secret));
            }

            let response = request
                .send()
                .await
                .map_err(|e| AuthError::ProviderUnavailable {
                    url: token_endpoint.to_string(),
                    reason: e.to_string(),
                })?;
            let status = response.status();
            let server_nonce = response
                .headers()
                .get(DPOP_NONCE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();

            if status.is_success() {
                return serde_json::from_str(&body).map_err(|e| AuthError::TokenRejected {
                    status: status.as_u16(),
                    body: format!("unreadable token response: {}", e),
                });
            }

            let error = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_default();
            match error.as_str() {
                "use_dpop_nonce" if nonce.is_none() && server_nonce.is_some() => {
                    tracing::debug!("Retrying token request with server nonce");
                    nonce = server_nonce;
                    continue;
                }
                "invalid_client" => {
                    tracing::warn!("Client rejected by {}, dropping registration", pending.provider);
                    self.registrations.invalidate(&pending.provider);
                }
                _ => {}
            }
            return Err(AuthError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }
    }

    fn purge_expired(&self) {
        let ttl = self.state_ttl_secs;
        let before = self.pending.len();
        self.pending.retain(|_, login| !login.is_expired(ttl));
        let purged = before.saturating_sub(self.pending.len());
        if purged > 0 {
            tracing::debug!("Purged {} expired login attempts", purged);
        }
    }
}
