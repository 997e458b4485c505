// pod-core/src/settings.rs
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::error::{Error, ProvisionStep, Result};
use crate::pod::PodStore;
use crate::rdf::vocab::{foaf, ldp};
use crate::rdf::{Graph, Patch, Term, Triple};

/// Settings document inside the workspace container
pub const SETTINGS_DOCUMENT: &str = "config.ttl";

/// Collaborator locations the user chose for this application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub retrieval_service: Option<String>,
    pub llm_service: Option<String>,
    pub docs_location: Option<String>,
}

impl AppSettings {
    /// Stored values take precedence over `defaults`
    pub fn or(self, defaults: AppSettings) -> AppSettings {
        AppSettings {
            retrieval_service: self.retrieval_service.or(defaults.retrieval_service),
            llm_service: self.llm_service.or(defaults.llm_service),
            docs_location: self.docs_location.or(defaults.docs_location),
        }
    }

    fn fields(&self) -> [(&'static str, &'static str, Option<&str>); 3] {
        [
            ("retrieval_service", foaf::ACCOUNT_SERVICE_HOMEPAGE, self.retrieval_service.as_deref()),
            ("llm_service", foaf::ACCOUNT_SERVICE_HOMEPAGE, self.llm_service.as_deref()),
            ("docs_location", ldp::RESOURCE, self.docs_location.as_deref()),
        ]
    }
}

pub struct SettingsStore {
    pod: Arc<dyn PodStore>,
    uri: String,
}

impl SettingsStore {
    pub fn new(pod: Arc<dyn PodStore>, container_uri: &str) -> Self {
        Self {
            pod,
            uri: format!("{}{}", container_uri, SETTINGS_DOCUMENT),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn node(&self, fragment: &str) -> Term {
        Term::iri(format!("{}#{}", self.uri, fragment))
    }

    /// Values stored in the pod; a missing document means nothing is set
    pub async fn load(&self) -> AppSettings {
        let graph = self.pod.read(&self.uri).await;
        let lookup = |fragment: &str, predicate: &str| {
            graph
                .value(&self.node(fragment), predicate)
                .and_then(Term::as_iri)
                .map(str::to_string)
        };

        AppSettings {
            retrieval_service: lookup("retrieval_service", foaf::ACCOUNT_SERVICE_HOMEPAGE),
            llm_service: lookup("llm_service", foaf::ACCOUNT_SERVICE_HOMEPAGE),
            docs_location: lookup("docs_location", ldp::RESOURCE),
        }
    }

    /// Replace the values that are set in `settings`, leaving the others alone
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let mut inserts = Vec::new();
        for (fragment, predicate, value) in settings.fields() {
            let Some(value) = value else { continue };
            let url = Url::parse(value).map_err(|e| Error::invalid_uri(value, e))?;
            inserts.push(Triple::new(self.node(fragment), predicate, Term::iri(url.as_str())));
        }
        if inserts.is_empty() {
            return Ok(());
        }

        if !self.pod.available(&self.uri).await {
            match self.pod.create(&self.uri).await {
                Ok(()) => tracing::info!("Created settings document {}", self.uri),
                Err(e) if e.is_conflict() => {}
                Err(e) => {
                    return Err(Error::provisioning(
                        ProvisionStep::SettingsDocument,
                        &self.uri,
                        e,
                    ))
                }
            }
        }

        let current = self.pod.read(&self.uri).await;
        let deletes = stale_values(&current, &inserts);
        self.pod
            .update(&self.uri, &Patch::replace_data(deletes, inserts))
            .await?;

        tracing::info!("Saved settings to {}", self.uri);
        Ok(())
    }
}

/// Stored triples with the same subject and predicate as a new value
fn stale_values(current: &Graph, inserts: &[Triple]) -> Vec<Triple> {
    current
        .iter()
        .filter(|stored| {
            inserts.iter().any(|new| {
                new.subject == stored.subject
                    && new.predicate == stored.predicate
                    && new.object != stored.object
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::{MemoryPod, PodCall};

    const CONTAINER: &str = "https://alice.example/private/genpod/";

    #[tokio::test]
    async fn test_missing_document_loads_empty() {
        let pod = Arc::new(MemoryPod::new());
        let store = SettingsStore::new(pod.clone(), CONTAINER);

        assert_eq!(store.uri(), "https://alice.example/private/genpod/config.ttl");
        assert_eq!(store.load().await, AppSettings::default());
    }

    #[tokio::test]
    async fn test_save_creates_then_replaces_only_given_values() {
        let pod = Arc::new(MemoryPod::new());
        let store = SettingsStore::new(pod.clone(), CONTAINER);

        store
            .save(&AppSettings {
                retrieval_service: Some("http://localhost:5000/".to_string()),
                llm_service: Some("http://localhost:5001/".to_string()),
                docs_location: None,
            })
            .await
            .unwrap();
        assert!(pod.calls().contains(&PodCall::Put(store.uri().to_string())));

        store
            .save(&AppSettings {
                llm_service: Some("https://llm.example/".to_string()),
                docs_location: Some("https://alice.example/docs/".to_string()),
                ..AppSettings::default()
            })
            .await
            .unwrap();

        assert_eq!(
            store.load().await,
            AppSettings {
                retrieval_service: Some("http://localhost:5000/".to_string()),
                llm_service: Some("https://llm.example/".to_string()),
                docs_location: Some("https://alice.example/docs/".to_string()),
            }
        );
        let llm_values = pod
            .graph(store.uri())
            .unwrap()
            .objects(&store.node("llm_service"), foaf::ACCOUNT_SERVICE_HOMEPAGE)
            .count();
        assert_eq!(llm_values, 1);
    }

    #[tokio::test]
    async fn test_save_rejects_non_uris() {
        let pod = Arc::new(MemoryPod::new());
        let store = SettingsStore::new(pod.clone(), CONTAINER);

        let err = store
            .save(&AppSettings {
                retrieval_service: Some("not a url".to_string()),
                ..AppSettings::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUri { .. }));
        assert!(pod.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_stores_normalized_url() {
        let pod = Arc::new(MemoryPod::new());
        let store = SettingsStore::new(pod.clone(), CONTAINER);

        store
            .save(&AppSettings {
                llm_service: Some("http://x.example/a> <urn:injected:p> <urn:injected:o".to_string()),
                ..AppSettings::default()
            })
            .await
            .unwrap();

        let sparql = pod
            .calls()
            .into_iter()
            .find_map(|call| match call {
                PodCall::Patch { sparql, .. } => Some(sparql),
                _ => None,
            })
            .unwrap();
        assert!(!sparql.contains("<urn:injected:p>"));

        let graph = pod.graph(store.uri()).unwrap();
        assert_eq!(graph.iter().count(), 1);
        assert_eq!(
            store.load().await.llm_service.as_deref(),
            Some("http://x.example/a%3E%20%3Curn:injected:p%3E%20%3Curn:injected:o")
        );
    }

    #[test]
    fn test_defaults_fill_gaps() {
        let stored = AppSettings {
            llm_service: Some("https://llm.example/".to_string()),
            ..AppSettings::default()
        };
        let merged = stored.or(AppSettings {
            retrieval_service: Some("http://localhost:5000/".to_string()),
            llm_service: Some("http://localhost:5001/".to_string()),
            docs_location: None,
        });
        assert_eq!(merged.llm_service.as_deref(), Some("https://llm.example/"));
        assert_eq!(merged.retrieval_service.as_deref(), Some("http://localhost:5000/"));
    }
}
