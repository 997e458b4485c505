// pod-core/src/workspace.rs
//! Locating this application's private workspace inside a pod.
//!
//! The chain is profile → `pim:preferencesFile` → `solid:privateTypeIndex` →
//! type registration → workspace container. Every missing link is created at a
//! conventional location relative to the profile document, so independent
//! clients converge on the same workspace.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use url::Url;

use crate::error::{Error, ProvisionStep, Result};
use crate::pod::{PodError, PodStore, CONTAINER_DELIMITER};
use crate::rdf::vocab::{pim, rdf, solid};
use crate::rdf::{Patch, Term, Triple};

pub const PREFERENCES_PATH: &str = "preferences.ttl";
pub const TYPE_INDEX_PATH: &str = "../settings/privateTypeIndex.ttl";
pub const WORKSPACE_PATH: &str = "../private/genpod/";

/// Resolved locations for one WebID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub webid: String,
    pub profile_uri: String,
    pub preferences_uri: String,
    pub type_index_uri: String,
    pub container_uri: String,
}

/// The profile document a WebID dereferences to
pub fn profile_document(webid: &str) -> Result<String> {
    let mut url = Url::parse(webid).map_err(|e| Error::invalid_uri(webid, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid_uri(webid, "WebID must be an http(s) URI"));
    }
    url.set_fragment(None);
    Ok(url.to_string())
}

fn conventional(profile_uri: &str, path: &str) -> Result<String> {
    Url::parse(profile_uri)
        .and_then(|base| base.join(path))
        .map(|url| url.to_string())
        .map_err(|e| Error::invalid_uri(profile_uri, e))
}

/// Resolves, and provisions where absent, the workspace of one session
pub struct WorkspaceResolver {
    pod: Arc<dyn PodStore>,
    webid: String,
    app_id: String,
    resolved: OnceCell<Workspace>,
}

impl WorkspaceResolver {
    pub fn new(pod: Arc<dyn PodStore>, webid: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            pod,
            webid: webid.into(),
            app_id: app_id.into(),
            resolved: OnceCell::new(),
        }
    }

    pub fn webid(&self) -> &str {
        &self.webid
    }

    /// Walk the chain once; later calls return the cached result
    pub async fn resolve(&self) -> Result<&Workspace> {
        self.resolved.get_or_try_init(|| self.provision()).await
    }

    pub async fn container_uri(&self) -> Result<String> {
        Ok(self.resolve().await?.container_uri.clone())
    }

    pub fn cached(&self) -> Option<&Workspace> {
        self.resolved.get()
    }

    async fn provision(&self) -> Result<Workspace> {
        let profile_uri = profile_document(&self.webid)?;
        let person = Term::iri(&self.webid);

        let preferences_uri = self
            .follow_or_link(
                &profile_uri,
                &person,
                &[pim::PREFERENCES_FILE],
                conventional(&profile_uri, PREFERENCES_PATH)?,
                ProvisionStep::PreferencesLink,
            )
            .await?;
        self.ensure_document(
            &preferences_uri,
            &[pim::CONFIGURATION_FILE],
            ProvisionStep::PreferencesDocument,
        )
        .await?;

        let type_index_uri = self
            .follow_or_link(
                &preferences_uri,
                &person,
                &[solid::PRIVATE_TYPE_INDEX],
                conventional(&profile_uri, TYPE_INDEX_PATH)?,
                ProvisionStep::TypeIndexLink,
            )
            .await?;
        self.ensure_document(
            &type_index_uri,
            &[solid::TYPE_INDEX, solid::UNLISTED_DOCUMENT],
            ProvisionStep::TypeIndexDocument,
        )
        .await?;

        let container_uri = self
            .registered_container(&type_index_uri, conventional(&profile_uri, WORKSPACE_PATH)?)
            .await?;
        self.ensure_document(&container_uri, &[], ProvisionStep::WorkspaceContainer)
            .await?;

        tracing::info!("Resolved workspace for {}: {}", self.webid, container_uri);
        Ok(Workspace {
            webid: self.webid.clone(),
            profile_uri,
            preferences_uri,
            type_index_uri,
            container_uri,
        })
    }

    /// Read `subject predicate ?o` from a document, or link `fallback` with an
    /// append-only insert and confirm it by reading the document back.
    async fn follow_or_link(
        &self,
        document_uri: &str,
        subject: &Term,
        predicates: &[&str],
        fallback: String,
        step: ProvisionStep,
    ) -> Result<String> {
        let graph = self.pod.read(document_uri).await;
        let existing = predicates
            .iter()
            .find_map(|p| graph.value(subject, p).and_then(Term::as_iri));
        if let Some(uri) = existing {
            tracing::debug!("Found {} in {}: {}", step, document_uri, uri);
            return Ok(uri.to_string());
        }

        tracing::info!("Linking {} {} from {}", step, fallback, document_uri);
        let link = Triple::new(subject.clone(), predicates[0], Term::iri(&fallback));
        self.link(document_uri, vec![link], step).await?;
        Ok(fallback)
    }

    async fn link(&self, document_uri: &str, triples: Vec<Triple>, step: ProvisionStep) -> Result<()> {
        self.pod
            .update(document_uri, &Patch::insert_data(triples.clone()))
            .await
            .map_err(|e| Error::provisioning(step, document_uri, e))?;

        let confirmed = self.pod.read(document_uri).await;
        match triples.iter().find(|t| !confirmed.contains(t)) {
            None => Ok(()),
            Some(missing) => Err(Error::provisioning(
                step,
                document_uri,
                PodError::Unconfirmed {
                    uri: document_uri.to_string(),
                    expected: missing.to_string(),
                },
            )),
        }
    }

    /// Create a missing document or container and type it
    async fn ensure_document(&self, uri: &str, types: &[&str], step: ProvisionStep) -> Result<()> {
        if self.pod.available(uri).await {
            return Ok(());
        }

        match self.pod.create(uri).await {
            Ok(()) => tracing::info!("Created {} {}", step, uri),
            // Someone else created it since the check
            Err(e) if e.is_conflict() => {
                tracing::debug!("{} {} already exists", step, uri);
                return Ok(());
            }
            Err(e) => return Err(Error::provisioning(step, uri, e)),
        }

        if types.is_empty() {
            return Ok(());
        }
        let subject = Term::iri(uri);
        let type_triples = types
            .iter()
            .map(|t| Triple::new(subject.clone(), rdf::TYPE, Term::iri(*t)));
        self.pod
            .update(uri, &Patch::insert_data(type_triples))
            .await
            .map_err(|e| Error::provisioning(step, uri, e))
    }

    /// The container registered for this application, registering the
    /// conventional one when there is none
    async fn registered_container(&self, type_index_uri: &str, fallback: String) -> Result<String> {
        let app = Term::iri(&self.app_id);
        let graph = self.pod.read(type_index_uri).await;

        // Earlier revisions registered the workspace with solid:instance
        let existing = [solid::INSTANCE_CONTAINER, solid::INSTANCE]
            .iter()
            .find_map(|p| graph.value(&app, p).and_then(Term::as_iri));
        if let Some(uri) = existing {
            tracing::debug!("Found workspace registration for {}: {}", self.app_id, uri);
            return Ok(as_container(uri));
        }

        tracing::info!("Registering workspace {} for {}", fallback, self.app_id);
        let bundle = vec![
            Triple::new(app.clone(), rdf::TYPE, Term::iri(solid::TYPE_REGISTRATION)),
            Triple::new(app.clone(), solid::FOR_CLASS, Term::iri(pim::SHARED_WORKSPACE)),
            Triple::new(app, solid::INSTANCE_CONTAINER, Term::iri(&fallback)),
        ];
        self.link(type_index_uri, bundle, ProvisionStep::WorkspaceRegistration)
            .await?;
        Ok(fallback)
    }
}

fn as_container(uri: &str) -> String {
    if uri.ends_with(CONTAINER_DELIMITER) {
        uri.to_string()
    } else {
        format!("{}{}", uri, CONTAINER_DELIMITER)
    }
}
