// pod-core/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::{ClientRegistration, ProviderMetadata, SessionCredential};

/// A login that was started but whose callback has not arrived yet
#[derive(Clone)]
pub struct PendingLogin {
    /// Normalized provider URL
    pub provider: String,
    pub metadata: ProviderMetadata,
    pub registration: ClientRegistration,
    /// PKCE code verifier for this attempt
    pub code_verifier: String,
    pub redirect_uri: String,
    /// Timestamp when the login was started
    pub created_at: DateTime<Utc>,
}

impl PendingLogin {
    pub fn new(
        provider: String,
        metadata: ProviderMetadata,
        registration: ClientRegistration,
        code_verifier: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            provider,
            metadata,
            registration,
            code_verifier,
            redirect_uri,
            created_at: Utc::now(),
        }
    }

    /// Check if the login attempt has expired based on TTL
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.num_seconds() > ttl_seconds
    }
}

impl fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLogin")
            .field("provider", &self.provider)
            .field("client_id", &self.registration.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Response structure for session API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub webid: String,
    pub issuer: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub workspace: Option<String>,
    // Omit the access token and proof key
}

impl From<&SessionCredential> for SessionSummary {
    fn from(credential: &SessionCredential) -> Self {
        Self {
            webid: credential.webid().to_string(),
            issuer: credential.issuer().to_string(),
            expires_at: credential.expires_at(),
            workspace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::dpop::ProofKey;

    #[test]
    fn test_pending_login_expiry() {
        let metadata = ProviderMetadata::from_json(
            "https://idp.example/",
            r#"{"authorization_endpoint":"https://idp.example/auth","token_endpoint":"https://idp.example/token"}"#,
        )
        .unwrap();
        let mut pending = PendingLogin::new(
            "https://idp.example/".to_string(),
            metadata,
            ClientRegistration::client_id_document(&ClientConfig::default()),
            "verifier".to_string(),
            "http://localhost:8501/callback".to_string(),
        );
        assert!(!pending.is_expired(300));

        pending.created_at = Utc::now() - chrono::Duration::seconds(301);
        assert!(pending.is_expired(300));
        assert!(!format!("{:?}", pending).contains("\"verifier\""));
    }

    #[test]
    fn test_summary_omits_secrets() {
        let credential = SessionCredential::new(
            "secret-token".to_string(),
            ProofKey::generate().unwrap(),
            "https://alice.example/profile/card#me".to_string(),
            "https://idp.example/".to_string(),
            None,
        );
        let summary = SessionSummary::from(&credential);
        let rendered = serde_json::to_string(&summary).unwrap();

        assert_eq!(summary.webid, "https://alice.example/profile/card#me");
        assert!(!rendered.contains("secret-token"));
    }
}
