// pod-core/src/dpop.rs
//! DPoP proofs (RFC 9449): short-lived ES256 JWTs binding each request, and the
//! access token it carries, to a key pair held by this client.

use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::utils::{base64url, sha256_base64url, unix_now};

#[derive(Debug, Error)]
pub enum DpopError {
    #[error("failed to generate a proof key")]
    KeyGeneration,
    #[error("invalid proof key: {0}")]
    InvalidKey(String),
    #[error("failed to sign proof")]
    Signing,
    #[error("cannot bind a proof to {0}")]
    InvalidUrl(String),
}

/// P-256 key pair generated once per login session
#[derive(Clone)]
pub struct ProofKey {
    pkcs8: Arc<Vec<u8>>,
    key_pair: Arc<EcdsaKeyPair>,
}

impl ProofKey {
    pub fn generate() -> Result<Self, DpopError> {
        let rng = SystemRandom::new();
        let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|_| DpopError::KeyGeneration)?;
        Self::from_pkcs8(document.as_ref())
    }

    pub fn from_pkcs8(der: &[u8]) -> Result<Self, DpopError> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, der, &rng)
            .map_err(|e| DpopError::InvalidKey(e.to_string()))?;
        Ok(Self {
            pkcs8: Arc::new(der.to_vec()),
            key_pair: Arc::new(key_pair),
        })
    }

    pub fn pkcs8(&self) -> &[u8] {
        &self.pkcs8
    }

    /// Uncompressed SEC1 point: 0x04 || x || y
    pub fn public_key_bytes(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    /// Public half as a JWK, embedded in every proof header
    pub fn public_jwk(&self) -> serde_json::Value {
        let point = self.public_key_bytes();
        json!({
            "kty": "EC",
            "crv": "P-256",
            "x": base64url(&point[1..33]),
            "y": base64url(&point[33..65]),
        })
    }

    fn sign_bytes(&self, message: &[u8]) -> Result<Vec<u8>, DpopError> {
        let rng = SystemRandom::new();
        let signature = self
            .key_pair
            .sign(&rng, message)
            .map_err(|_| DpopError::Signing)?;
        Ok(signature.as_ref().to_vec())
    }
}

impl fmt::Debug for ProofKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofKey")
            .field("jwk", &self.public_jwk())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ProofClaims<'a> {
    htm: &'a str,
    htu: String,
    jti: String,
    iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    ath: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<&'a str>,
}

/// Hash of an access token for the `ath` claim of resource requests
pub fn access_token_hash(access_token: &str) -> String {
    sha256_base64url(access_token)
}

/// Mint a proof for exactly one request. Every call yields a fresh `jti` and `iat`.
pub fn sign(
    key: &ProofKey,
    method: &str,
    url: &str,
    access_token_hash: Option<&str>,
) -> Result<String, DpopError> {
    sign_with_nonce(key, method, url, access_token_hash, None)
}

/// Like [`sign`], echoing a `DPoP-Nonce` previously issued by the server
pub fn sign_with_nonce(
    key: &ProofKey,
    method: &str,
    url: &str,
    access_token_hash: Option<&str>,
    nonce: Option<&str>,
) -> Result<String, DpopError> {
    let header = json!({
        "typ": "dpop+jwt",
        "alg": "ES256",
        "jwk": key.public_jwk(),
    });
    let claims = ProofClaims {
        htm: method,
        htu: target_uri(url)?,
        jti: Uuid::new_v4().to_string(),
        iat: unix_now(),
        ath: access_token_hash,
        nonce,
    };

    let header_json = serde_json::to_vec(&header).map_err(|_| DpopError::Signing)?;
    let claims_json = serde_json::to_vec(&claims).map_err(|_| DpopError::Signing)?;
    let signing_input = format!("{}.{}", base64url(header_json), base64url(claims_json));
    let signature = key.sign_bytes(signing_input.as_bytes())?;

    Ok(format!("{}.{}", signing_input, base64url(signature)))
}

/// The `htu` claim: the request URI without query and fragment
fn target_uri(url: &str) -> Result<String, DpopError> {
    let mut parsed = Url::parse(url).map_err(|_| DpopError::InvalidUrl(url.to_string()))?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::base64url_decode;
    use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_FIXED};
    use serde_json::Value;

    fn decode_segment(segment: &str) -> Value {
        serde_json::from_slice(&base64url_decode(segment).unwrap()).unwrap()
    }

    #[test]
    fn test_proof_structure_and_signature() {
        let key = ProofKey::generate().unwrap();
        let proof = sign(&key, "GET", "https://alice.example/private/genpod/", None).unwrap();

        let parts: Vec<&str> = proof.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_segment(parts[0]);
        assert_eq!(header["typ"], "dpop+jwt");
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["jwk"], key.public_jwk());

        let claims = decode_segment(parts[1]);
        assert_eq!(claims["htm"], "GET");
        assert_eq!(claims["htu"], "https://alice.example/private/genpod/");
        assert!(claims.get("ath").is_none());
        assert!(claims["iat"].as_i64().unwrap() > 0);

        let message = format!("{}.{}", parts[0], parts[1]);
        let signature = base64url_decode(parts[2]).unwrap();
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, key.public_key_bytes())
            .verify(message.as_bytes(), &signature)
            .expect("proof signature must verify with the embedded key");
    }

    #[test]
    fn test_proofs_are_never_reused() {
        let key = ProofKey::generate().unwrap();
        let a = sign(&key, "PATCH", "https://alice.example/t.ttl", None).unwrap();
        let b = sign(&key, "PATCH", "https://alice.example/t.ttl", None).unwrap();
        assert_ne!(a, b);

        let jti_a = decode_segment(a.split('.').nth(1).unwrap())["jti"].clone();
        let jti_b = decode_segment(b.split('.').nth(1).unwrap())["jti"].clone();
        assert_ne!(jti_a, jti_b);
    }

    #[test]
    fn test_resource_proof_carries_ath_and_strips_query() {
        let key = ProofKey::generate().unwrap();
        let ath = access_token_hash("token-123");
        let proof = sign_with_nonce(
            &key,
            "HEAD",
            "https://alice.example/t.ttl?x=1#frag",
            Some(&ath),
            Some("server-nonce"),
        )
        .unwrap();

        let claims = decode_segment(proof.split('.').nth(1).unwrap());
        assert_eq!(claims["htu"], "https://alice.example/t.ttl");
        assert_eq!(claims["ath"], ath.as_str());
        assert_eq!(claims["nonce"], "server-nonce");
    }

    #[test]
    fn test_key_round_trips_through_pkcs8() {
        let key = ProofKey::generate().unwrap();
        let restored = ProofKey::from_pkcs8(key.pkcs8()).unwrap();
        assert_eq!(restored.public_jwk(), key.public_jwk());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            ProofKey::from_pkcs8(b"not a key"),
            Err(DpopError::InvalidKey(_))
        ));
        let key = ProofKey::generate().unwrap();
        assert!(matches!(
            sign(&key, "GET", "not a url", None),
            Err(DpopError::InvalidUrl(_))
        ));
    }
}
