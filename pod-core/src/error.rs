// pod-core/src/error.rs
use thiserror::Error;

use crate::auth::AuthError;
use crate::pod::PodError;

/// Step of the workspace chain that could not be provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    PreferencesLink,
    PreferencesDocument,
    TypeIndexLink,
    TypeIndexDocument,
    WorkspaceRegistration,
    WorkspaceContainer,
    ThreadResource,
    SettingsDocument,
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisionStep::PreferencesLink => "preferences link",
            ProvisionStep::PreferencesDocument => "preferences document",
            ProvisionStep::TypeIndexLink => "type index link",
            ProvisionStep::TypeIndexDocument => "type index document",
            ProvisionStep::WorkspaceRegistration => "workspace registration",
            ProvisionStep::WorkspaceContainer => "workspace container",
            ProvisionStep::ThreadResource => "thread resource",
            ProvisionStep::SettingsDocument => "settings document",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A create or link step failed; nothing depending on it was attempted
    #[error("failed to provision {step} at {uri}: {source}")]
    Provisioning {
        step: ProvisionStep,
        uri: String,
        #[source]
        source: PodError,
    },

    /// A conditional patch did not apply; re-read and retry
    #[error("write conflict on {uri}: {source}")]
    WriteConflict {
        uri: String,
        #[source]
        source: PodError,
    },

    #[error(transparent)]
    Pod(#[from] PodError),

    #[error("invalid uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn provisioning(step: ProvisionStep, uri: &str, source: PodError) -> Self {
        Error::Provisioning {
            step,
            uri: uri.to_string(),
            source,
        }
    }

    pub(crate) fn invalid_uri(uri: &str, reason: impl ToString) -> Self {
        Error::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}
