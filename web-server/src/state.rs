// web-server/src/state.rs
use pod_core::auth::AuthError;
use pod_core::models::SessionSummary;
use pod_core::{
    Config, IdentityAuthenticator, PodStore, SessionCredential, ThreadStore, Workspace,
    WorkspaceResolver,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApiError;

/// The logged-in user's pod access and open threads
pub struct ActiveSession {
    pub credential: Arc<SessionCredential>,
    pub pod: Arc<dyn PodStore>,
    pub workspace: Workspace,
    pub threads: HashMap<String, ThreadStore>,
    name_words: usize,
}

impl ActiveSession {
    /// An open thread, or the existing thread `uri` of the workspace
    pub fn thread(&mut self, uri: &str) -> pod_core::Result<&mut ThreadStore> {
        match self.threads.entry(uri.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let store =
                    ThreadStore::open(self.pod.clone(), &self.workspace.container_uri, uri)?
                        .with_name_words(self.name_words);
                Ok(entry.insert(store))
            }
        }
    }

    /// A thread that gets its resource with its first message
    pub fn new_thread(&self) -> ThreadStore {
        ThreadStore::new(self.pod.clone(), &self.workspace.container_uri)
            .with_name_words(self.name_words)
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary::from(self.credential.as_ref());
        summary.workspace = Some(self.workspace.container_uri.clone());
        summary
    }
}

/// Shared state of the web server: one local user, one session at a time
pub struct AppState {
    pub config: Config,
    pub authenticator: IdentityAuthenticator,
    pub session: Mutex<Option<ActiveSession>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AuthError> {
        let authenticator = IdentityAuthenticator::new(&config)?;
        Ok(Self {
            config,
            authenticator,
            session: Mutex::new(None),
        })
    }

    /// Resolve the workspace for a fresh credential and make it the active session
    pub async fn start_session(
        &self,
        credential: Arc<SessionCredential>,
        pod: Arc<dyn PodStore>,
    ) -> pod_core::Result<SessionSummary> {
        let resolver =
            WorkspaceResolver::new(pod.clone(), credential.webid(), &self.config.pod.app_id);
        let workspace = resolver.resolve().await?.clone();

        let session = ActiveSession {
            credential,
            pod,
            workspace,
            threads: HashMap::new(),
            name_words: self.config.pod.thread_name_words,
        };
        let summary = session.summary();
        tracing::info!("Session started for {}", summary.webid);

        *self.session.lock().await = Some(session);
        Ok(summary)
    }

    pub async fn end_session(&self) -> bool {
        match self.session.lock().await.take() {
            Some(session) => {
                tracing::info!("Session ended for {}", session.credential.webid());
                true
            }
            None => false,
        }
    }
}

/// The active session, dropping it first if its token has expired
pub fn active(slot: &mut Option<ActiveSession>) -> Result<&mut ActiveSession, ApiError> {
    let expired = slot
        .as_ref()
        .map_or(false, |session| session.credential.is_expired());
    if expired {
        tracing::info!("Access token expired, logging out");
        *slot = None;
    }
    slot.as_mut().ok_or(ApiError::NotLoggedIn)
}
