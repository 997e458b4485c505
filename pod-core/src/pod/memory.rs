// pod-core/src/pod/memory.rs
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{is_container, PodError, PodStore, CONTAINER_DELIMITER};
use crate::rdf::vocab::ldp;
use crate::rdf::{parse_turtle, Graph, Patch, RdfError, Term, Triple};

/// A request as the pod received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodCall {
    Head(String),
    Get(String),
    Put(String),
    Patch { uri: String, sparql: String },
    Delete(String),
}

impl PodCall {
    pub fn uri(&self) -> &str {
        match self {
            PodCall::Head(uri)
            | PodCall::Get(uri)
            | PodCall::Put(uri)
            | PodCall::Delete(uri)
            | PodCall::Patch { uri, .. } => uri,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            PodCall::Put(_) | PodCall::Patch { .. } | PodCall::Delete(_)
        )
    }
}

#[derive(Default)]
struct MemoryState {
    resources: BTreeMap<String, Graph>,
    calls: Vec<PodCall>,
    offline: bool,
}

/// In-process pod with the server-side semantics the store relies on:
/// create-only PUT, conditional PATCH that fails when its `WHERE` matches
/// nothing, and containers that list their direct members.
#[derive(Default)]
pub struct MemoryPod {
    state: Mutex<MemoryState>,
}

impl MemoryPod {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a Turtle document as-is, bypassing the call log
    pub fn seed(&self, uri: &str, turtle: &str) -> Result<(), RdfError> {
        let graph = parse_turtle(turtle, uri)?;
        self.insert_graph(uri, graph);
        Ok(())
    }

    pub fn insert_graph(&self, uri: &str, graph: Graph) {
        let mut state = self.state();
        ensure_parents(&mut state.resources, uri);
        state.resources.insert(uri.to_string(), graph);
    }

    /// Stored content, without synthesized container membership
    pub fn graph(&self, uri: &str) -> Option<Graph> {
        self.state().resources.get(uri).cloned()
    }

    pub fn exists(&self, uri: &str) -> bool {
        self.state().resources.contains_key(uri)
    }

    pub fn resources(&self) -> Vec<String> {
        self.state().resources.keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<PodCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// While offline every request behaves like a connection failure
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }
}

fn unavailable(uri: &str) -> PodError {
    PodError::Unavailable {
        uri: uri.to_string(),
        reason: "pod is offline".to_string(),
    }
}

fn direct_members<'a>(
    resources: &'a BTreeMap<String, Graph>,
    container: &'a str,
) -> impl Iterator<Item = &'a String> + 'a {
    resources.keys().filter(move |uri| {
        uri.strip_prefix(container)
            .map(|rest| {
                let rest = rest.strip_suffix(CONTAINER_DELIMITER).unwrap_or(rest);
                !rest.is_empty() && !rest.contains(CONTAINER_DELIMITER)
            })
            .unwrap_or(false)
    })
}

/// Intermediate containers come into existence with their first member
fn ensure_parents(resources: &mut BTreeMap<String, Graph>, uri: &str) {
    let trimmed = uri.strip_suffix(CONTAINER_DELIMITER).unwrap_or(uri);
    let mut end = trimmed.len();
    while let Some(i) = trimmed[..end].rfind(CONTAINER_DELIMITER) {
        let parent = &trimmed[..=i];
        if parent.ends_with("//") {
            break;
        }
        resources.entry(parent.to_string()).or_default();
        end = i;
    }
}

#[async_trait]
impl PodStore for MemoryPod {
    async fn available(&self, uri: &str) -> bool {
        let mut state = self.state();
        state.calls.push(PodCall::Head(uri.to_string()));
        !state.offline && state.resources.contains_key(uri)
    }

    async fn create(&self, uri: &str) -> Result<(), PodError> {
        let mut state = self.state();
        state.calls.push(PodCall::Put(uri.to_string()));
        if state.offline {
            return Err(unavailable(uri));
        }
        if state.resources.contains_key(uri) {
            return Err(PodError::from_status("PUT", uri, 412));
        }
        ensure_parents(&mut state.resources, uri);
        state.resources.insert(uri.to_string(), Graph::new());
        Ok(())
    }

    async fn read(&self, uri: &str) -> Graph {
        let mut state = self.state();
        state.calls.push(PodCall::Get(uri.to_string()));
        if state.offline {
            return Graph::new();
        }
        let Some(stored) = state.resources.get(uri) else {
            return Graph::new();
        };

        let mut graph = stored.clone();
        if is_container(uri) {
            let container = Term::iri(uri);
            let members: Vec<Triple> = direct_members(&state.resources, uri)
                .map(|member| Triple::new(container.clone(), ldp::CONTAINS, Term::iri(member)))
                .collect();
            graph.extend(members);
        }
        graph
    }

    async fn update(&self, uri: &str, patch: &Patch) -> Result<(), PodError> {
        let mut state = self.state();
        state.calls.push(PodCall::Patch {
            uri: uri.to_string(),
            sparql: patch.to_sparql(),
        });
        if state.offline {
            return Err(unavailable(uri));
        }

        let mut graph = state.resources.get(uri).cloned().unwrap_or_default();
        if patch.apply(&mut graph) == 0 {
            return Err(PodError::from_status("PATCH", uri, 409));
        }
        ensure_parents(&mut state.resources, uri);
        state.resources.insert(uri.to_string(), graph);
        Ok(())
    }

    async fn delete(&self, uri: &str) -> Result<(), PodError> {
        let mut state = self.state();
        state.calls.push(PodCall::Delete(uri.to_string()));
        if state.offline {
            return Err(unavailable(uri));
        }
        if is_container(uri) && direct_members(&state.resources, uri).next().is_some() {
            return Err(PodError::from_status("DELETE", uri, 409));
        }
        state.resources.remove(uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::list_container;
    use crate::rdf::vocab::rdf;
    use crate::rdf::{PatternTerm, TriplePattern};

    const BASE: &str = "https://alice.example/private/genpod/";

    #[tokio::test]
    async fn test_create_is_create_only() {
        let pod = MemoryPod::new();
        let uri = format!("{}t.ttl", BASE);

        assert!(!pod.available(&uri).await);
        pod.create(&uri).await.unwrap();
        assert!(pod.available(&uri).await);
        assert!(pod.create(&uri).await.unwrap_err().is_conflict());

        // parents were created implicitly
        assert!(pod.exists(BASE));
        assert!(pod.exists("https://alice.example/private/"));
        assert!(pod.exists("https://alice.example/"));
    }

    #[tokio::test]
    async fn test_container_lists_direct_members() {
        let pod = MemoryPod::new();
        pod.create(&format!("{}a.ttl", BASE)).await.unwrap();
        pod.create(&format!("{}nested/b.ttl", BASE)).await.unwrap();

        assert_eq!(
            list_container(&pod, BASE).await,
            vec![format!("{}a.ttl", BASE), format!("{}nested/", BASE)]
        );
        assert!(pod.delete(BASE).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_unmatched_conditional_patch_conflicts() {
        let pod = MemoryPod::new();
        let uri = format!("{}t.ttl", BASE);
        pod.create(&uri).await.unwrap();

        let end = PatternTerm::var("end");
        let nil = Term::iri(rdf::NIL);
        let patch = Patch::conditional(
            vec![TriplePattern::new(end.clone(), rdf::REST, nil.clone())],
            vec![TriplePattern::new(end.clone(), rdf::REST, Term::iri(rdf::NIL))],
            vec![TriplePattern::new(end, rdf::REST, nil)],
        );

        let err = pod.update(&uri, &patch).await.unwrap_err();
        assert!(matches!(err, PodError::Conflict { status: 409, .. }));
        assert!(pod.graph(&uri).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_pod() {
        let pod = MemoryPod::new();
        pod.seed(&format!("{}t.ttl", BASE), "<#a> <#b> <#c> .").unwrap();
        pod.set_offline(true);

        assert!(!pod.available(&format!("{}t.ttl", BASE)).await);
        assert!(pod.read(&format!("{}t.ttl", BASE)).await.is_empty());
        assert!(matches!(
            pod.create(&format!("{}u.ttl", BASE)).await,
            Err(PodError::Unavailable { .. })
        ));
        assert_eq!(pod.calls().len(), 3);
    }
}
