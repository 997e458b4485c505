pub mod auth;
pub mod config;
pub mod dpop;
pub mod error;
pub mod models;
pub mod pod;
pub mod rdf;
pub mod settings;
pub mod thread;
pub mod utils;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthError, CallbackParams, IdentityAuthenticator, LoginRequest, SessionCredential};
pub use config::*;
pub use dpop::ProofKey;
pub use error::{Error, ProvisionStep, Result};
pub use models::{ChatMessage, Role};
pub use pod::{MemoryPod, PodError, PodResourceClient, PodStore};
pub use settings::{AppSettings, SettingsStore};
pub use thread::{list_threads, ThreadStore, ThreadSummary};
pub use utils::*;
pub use workspace::{Workspace, WorkspaceResolver};
