// pod-core/src/pod/mod.rs
//! Linked Data Platform resources in a Solid pod.

pub mod client;
pub mod memory;

pub use client::PodResourceClient;
pub use memory::{MemoryPod, PodCall};

use async_trait::async_trait;
use thiserror::Error;

use crate::rdf::vocab::ldp;
use crate::rdf::{Graph, Patch, Term};

/// Trailing delimiter that marks a container URI
pub const CONTAINER_DELIMITER: char = '/';

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PodError {
    #[error("{uri} is unreachable: {reason}")]
    Unavailable { uri: String, reason: String },
    /// 409 or 412: the request's preconditions no longer hold
    #[error("{method} {uri} conflicted (status {status})")]
    Conflict {
        method: &'static str,
        uri: String,
        status: u16,
    },
    #[error("{method} {uri} failed with status {status}")]
    Status {
        method: &'static str,
        uri: String,
        status: u16,
    },
    #[error("cannot sign request to {uri}: {reason}")]
    Proof { uri: String, reason: String },
    /// A write was accepted but reading the resource back does not show it
    #[error("{uri} does not contain {expected}")]
    Unconfirmed { uri: String, expected: String },
    #[error("failed to build http client: {0}")]
    Client(String),
}

impl PodError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, PodError::Conflict { .. })
    }

    pub(crate) fn from_status(method: &'static str, uri: &str, status: u16) -> Self {
        match status {
            409 | 412 => PodError::Conflict {
                method,
                uri: uri.to_string(),
                status,
            },
            _ => PodError::Status {
                method,
                uri: uri.to_string(),
                status,
            },
        }
    }
}

/// The five resource operations everything above the transport is written against.
///
/// Absence is not an error: `available` answers `false` and `read` answers an
/// empty graph, which is what drives lazy provisioning.
#[async_trait]
pub trait PodStore: Send + Sync {
    /// HEAD: `true` only for a 2xx answer
    async fn available(&self, uri: &str) -> bool;

    /// Create-only PUT of an empty resource or container; never overwrites
    async fn create(&self, uri: &str) -> Result<(), PodError>;

    /// GET as Turtle. Missing or unparsable content yields an empty graph.
    async fn read(&self, uri: &str) -> Graph;

    /// PATCH with a SPARQL Update body
    async fn update(&self, uri: &str, patch: &Patch) -> Result<(), PodError>;

    async fn delete(&self, uri: &str) -> Result<(), PodError>;
}

pub fn is_container(uri: &str) -> bool {
    uri.ends_with(CONTAINER_DELIMITER)
}

/// Last path segment of a resource, used as the `Slug` on creation.
/// The root of a pod has no item name.
pub fn item_name(uri: &str) -> &str {
    let trimmed = uri.strip_suffix(CONTAINER_DELIMITER).unwrap_or(uri);
    if trimmed.matches('/').count() == 2 {
        return "";
    }
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => "",
    }
}

/// Members of a container, in a stable order
pub async fn list_container(pod: &dyn PodStore, container_uri: &str) -> Vec<String> {
    let graph = pod.read(container_uri).await;
    let container = Term::iri(container_uri);
    let mut members: Vec<String> = graph
        .objects(&container, ldp::CONTAINS)
        .filter_map(|t| t.as_iri().map(str::to_string))
        .collect();
    members.sort();
    members
}
