// pod-core/src/auth/credential.rs
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::AuthError;
use crate::dpop::{self, DpopError, ProofKey};
use crate::utils::{base64url, base64url_decode};

/// Header carrying the user's WebID to retrieval/LLM collaborators
pub const WEBID_HEADER: &str = "webid";

/// A DPoP-bound access token together with the key it is bound to.
///
/// This is the only thing the pod layer needs from a login. It can be turned
/// into an opaque string and back, so application session state can hold it.
#[derive(Clone)]
pub struct SessionCredential {
    access_token: String,
    proof_key: ProofKey,
    webid: String,
    issuer: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    access_token: String,
    proof_key: String,
    webid: String,
    issuer: String,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionCredential {
    pub fn new(
        access_token: String,
        proof_key: ProofKey,
        webid: String,
        issuer: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            proof_key,
            webid,
            issuer,
            expires_at,
        }
    }

    pub fn webid(&self) -> &str {
        &self.webid
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn proof_key(&self) -> &ProofKey {
        &self.proof_key
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Tokens are not refreshed; an expired credential means logging in again
    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| at <= Utc::now())
    }

    /// `Authorization` and a freshly minted `DPoP` header for one request
    pub fn auth_headers(
        &self,
        method: &str,
        url: &str,
    ) -> Result<Vec<(&'static str, String)>, DpopError> {
        let ath = dpop::access_token_hash(&self.access_token);
        let proof = dpop::sign(&self.proof_key, method, url, Some(&ath))?;
        Ok(vec![
            ("Authorization", format!("DPoP {}", self.access_token)),
            ("DPoP", proof),
        ])
    }

    /// Auth headers plus the caller's WebID, for services that attest identity
    pub fn collaborator_headers(
        &self,
        method: &str,
        url: &str,
    ) -> Result<Vec<(&'static str, String)>, DpopError> {
        let mut headers = self.auth_headers(method, url)?;
        headers.push((WEBID_HEADER, self.webid.clone()));
        Ok(headers)
    }

    pub fn serialize(&self) -> String {
        let stored = StoredCredential {
            access_token: self.access_token.clone(),
            proof_key: base64url(self.proof_key.pkcs8()),
            webid: self.webid.clone(),
            issuer: self.issuer.clone(),
            expires_at: self.expires_at,
        };
        // Serializing plain strings and an optional timestamp cannot fail
        base64url(serde_json::to_vec(&stored).unwrap_or_default())
    }

    pub fn deserialize(serialized: &str) -> Result<Self, AuthError> {
        let bytes = base64url_decode(serialized)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;
        let stored: StoredCredential = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;
        let der = base64url_decode(&stored.proof_key)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;
        let proof_key =
            ProofKey::from_pkcs8(&der).map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        Ok(Self {
            access_token: stored.access_token,
            proof_key,
            webid: stored.webid,
            issuer: stored.issuer,
            expires_at: stored.expires_at,
        })
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("webid", &self.webid)
            .field("issuer", &self.issuer)
            .field("expires_at", &self.expires_at)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    webid: Option<String>,
    sub: Option<String>,
}

/// Read claims without verifying the signature. The pod verifies tokens; the
/// client only needs to know whose they are.
fn read_identity_claims(token: &str) -> Option<IdentityClaims> {
    let header = decode_header(token).ok()?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<IdentityClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}

/// WebID from the access token's `webid` claim, else the ID token's `webid` or `sub`
pub fn webid_from_tokens(access_token: &str, id_token: Option<&str>) -> Option<String> {
    if let Some(webid) = read_identity_claims(access_token).and_then(|c| c.webid) {
        return Some(webid);
    }
    let claims = read_identity_claims(id_token?)?;
    claims
        .webid
        .or_else(|| claims.sub.filter(|sub| sub.starts_with("http")))
}
