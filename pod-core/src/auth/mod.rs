// pod-core/src/auth/mod.rs
//! Solid-OIDC login: Authorization Code with PKCE, dynamic client
//! registration and DPoP-bound tokens.

pub mod authenticator;
pub mod credential;
pub mod pkce;
pub mod provider;

pub use authenticator::{CallbackParams, IdentityAuthenticator, LoginRequest};
pub use credential::{webid_from_tokens, SessionCredential, WEBID_HEADER};
pub use pkce::PkcePair;
pub use provider::{ClientMetadata, ClientRegistration, ProviderMetadata, RegistrationCache};

use thiserror::Error;

use crate::dpop::DpopError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity provider {url} is unavailable: {reason}")]
    ProviderUnavailable { url: String, reason: String },

    #[error("invalid provider metadata from {url}: {reason}")]
    InvalidProviderMetadata { url: String, reason: String },

    #[error("provider {0} requires client registration but has no registration endpoint")]
    RegistrationUnsupported(String),

    #[error("client registration rejected with status {status}: {body}")]
    RegistrationRejected { status: u16, body: String },

    /// Anti-CSRF: the callback's state was never issued, already used, or expired
    #[error("login state does not match a pending login")]
    StateMismatch,

    #[error("provider refused authorization: {error} ({description})")]
    Provider { error: String, description: String },

    #[error("callback carries no authorization code")]
    MissingCode,

    #[error("token exchange rejected with status {status}: {body}")]
    TokenRejected { status: u16, body: String },

    #[error("token type {0} is not DPoP-bound")]
    NotDpopBound(String),

    #[error("issued tokens do not identify a WebID")]
    MissingWebId,

    #[error("invalid session credential: {0}")]
    InvalidCredential(String),

    #[error(transparent)]
    Dpop(#[from] DpopError),
}
