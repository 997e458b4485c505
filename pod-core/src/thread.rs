// pod-core/src/thread.rs
//! Conversation threads stored as one pod document each.
//!
//! A thread document holds a `schema:Conversation` whose `schema:hasPart` is
//! the head of an `rdf:List`. Each cell's `rdf:first` is a
//! `prof:ResourceDescriptor` carrying the message text (`prof:hasResource`)
//! and its author (`prof:hasRole`). Appending relinks whichever cell currently
//! ends in `rdf:nil`, so the remote update has the same size however long the
//! thread is.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, ProvisionStep, Result};
use crate::models::{ChatMessage, Role};
use crate::pod::{item_name, list_container, PodError, PodStore};
use crate::rdf::vocab::{prof, rdf, schema};
use crate::rdf::{Graph, Patch, PatternTerm, Term, Triple, TriplePattern};
use crate::settings::SETTINGS_DOCUMENT;

pub const THREAD_EXTENSION: &str = ".ttl";
pub const DEFAULT_NAME_WORDS: usize = 3;
const FALLBACK_NAME: &str = "conversation";
const MAX_NAME_ATTEMPTS: usize = 100;

/// Everything but RFC 3986 unreserved characters is escaped
const NAME_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Resource name for a thread, from the first words of its first message
pub fn thread_name(content: &str, words: usize) -> String {
    let head: Vec<&str> = content.split_whitespace().take(words).collect();
    if head.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    utf8_percent_encode(&head.join(" "), NAME_ESCAPES).to_string()
}

/// Human-readable label of a thread resource
pub fn thread_label(uri: &str) -> String {
    let name = item_name(uri);
    let name = name.strip_suffix(THREAD_EXTENSION).unwrap_or(name);
    percent_decode_str(name).decode_utf8_lossy().into_owned()
}

/// Whether `uri` names a thread document directly inside `container_uri`
pub fn is_thread_in(container_uri: &str, uri: &str) -> bool {
    match uri.strip_prefix(container_uri) {
        Some(name) => {
            name.len() > THREAD_EXTENSION.len()
                && name.ends_with(THREAD_EXTENSION)
                && is_plain_segment(name)
                && name != SETTINGS_DOCUMENT
        }
        None => false,
    }
}

/// Only unreserved characters and percent escapes, so the name stays one path segment
fn is_plain_segment(name: &str) -> bool {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escape = bytes.get(i + 1..i + 3);
                if !escape.map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                    return false;
                }
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') => i += 1,
            _ => return false,
        }
    }
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub uri: String,
    pub label: String,
}

/// Threads stored in a workspace container
pub async fn list_threads(pod: &dyn PodStore, container_uri: &str) -> Vec<ThreadSummary> {
    list_container(pod, container_uri)
        .await
        .into_iter()
        .filter(|uri| is_thread_in(container_uri, uri))
        .map(|uri| ThreadSummary {
            label: thread_label(&uri),
            uri,
        })
        .collect()
}

fn candidate_uri(container_uri: &str, name: &str, attempt: usize) -> String {
    if attempt < 2 {
        format!("{}{}{}", container_uri, name, THREAD_EXTENSION)
    } else {
        format!("{}{}-{}{}", container_uri, name, attempt, THREAD_EXTENSION)
    }
}

/// Where the list hangs off the document
#[derive(Debug, Clone)]
struct ListRoot {
    head: Term,
}

fn find_root(graph: &Graph) -> Option<ListRoot> {
    let conversation_type = Term::iri(schema::CONVERSATION);
    if let Some(conversation) = graph.subject_of(rdf::TYPE, &conversation_type) {
        if let Some(head) = graph.value(conversation, schema::HAS_PART) {
            return Some(ListRoot { head: head.clone() });
        }
    }

    // Older documents have no conversation node: the head is the list cell
    // that no other cell points to
    let list_type = Term::iri(rdf::LIST);
    let mut cells = graph.subjects(rdf::TYPE, &list_type);
    cells
        .find(|cell| graph.subject_of(rdf::REST, cell).is_none())
        .map(|head| ListRoot { head: head.clone() })
}

fn decode_messages(graph: &Graph, root: &ListRoot) -> Vec<ChatMessage> {
    let nil = Term::iri(rdf::NIL);
    let mut messages = Vec::new();
    let mut visited = HashSet::new();
    let mut cell = Some(root.head.clone());

    while let Some(current) = cell {
        if current == nil {
            break;
        }
        if !visited.insert(current.clone()) {
            tracing::warn!("Thread list loops back to {}", current);
            break;
        }

        match graph
            .value(&current, rdf::FIRST)
            .and_then(|node| decode_message(graph, node))
        {
            Some(message) => messages.push(message),
            None => tracing::warn!("Skipping malformed message cell {}", current),
        }
        cell = graph.value(&current, rdf::REST).cloned();
    }
    messages
}

fn decode_message(graph: &Graph, node: &Term) -> Option<ChatMessage> {
    let content = graph.value(node, prof::HAS_RESOURCE)?.as_literal()?;
    let role: Role = graph.value(node, prof::HAS_ROLE)?.as_literal()?.parse().ok()?;
    Some(ChatMessage::new(role, content))
}

fn message_triples(node: &Term, content: &str, role: Role) -> Vec<Triple> {
    vec![
        Triple::new(node.clone(), rdf::TYPE, Term::iri(prof::RESOURCE_DESCRIPTOR)),
        Triple::new(node.clone(), prof::HAS_RESOURCE, Term::string(content)),
        Triple::new(node.clone(), prof::HAS_ROLE, Term::string(role.as_str())),
    ]
}

/// The first message: conversation node, a single cell and the message, as plain data
fn first_message_patch(thread_uri: &str, content: &str, role: Role) -> Patch {
    let conversation = Term::iri(format!("{}#messages", thread_uri));
    let cell = Term::fresh_blank();
    let message = Term::fresh_blank();

    let mut triples = vec![
        Triple::new(conversation.clone(), rdf::TYPE, Term::iri(schema::CONVERSATION)),
        Triple::new(conversation.clone(), schema::HAS_PART, cell.clone()),
        Triple::new(cell.clone(), rdf::TYPE, Term::iri(rdf::LIST)),
        Triple::new(cell.clone(), rdf::FIRST, message.clone()),
        Triple::new(cell.clone(), rdf::REST, Term::iri(rdf::NIL)),
        Triple::new(cell, schema::IS_PART_OF, conversation),
    ];
    triples.extend(message_triples(&message, content, role));
    Patch::insert_data(triples)
}

/// Later messages: move the `rdf:nil` tail of whichever cell holds it onto a new cell
fn append_patch(content: &str, role: Role) -> Patch {
    let end = PatternTerm::var("end");
    let nil = Term::iri(rdf::NIL);
    let cell = Term::fresh_blank();
    let message = Term::fresh_blank();

    let mut insert = vec![
        TriplePattern::new(end.clone(), rdf::REST, cell.clone()),
        TriplePattern::new(cell.clone(), rdf::TYPE, Term::iri(rdf::LIST)),
        TriplePattern::new(cell.clone(), rdf::FIRST, message.clone()),
        TriplePattern::new(cell, rdf::REST, nil.clone()),
    ];
    insert.extend(
        message_triples(&message, content, role)
            .into_iter()
            .map(TriplePattern::from),
    );

    Patch::conditional(
        vec![TriplePattern::new(end.clone(), rdf::REST, nil.clone())],
        insert,
        vec![TriplePattern::new(end, rdf::REST, nil)],
    )
}

/// One conversation thread and its local mirror.
///
/// Appends must be issued one at a time. Two writers appending to the same
/// thread can both target the same tail; the loser's patch no longer matches
/// and is reported as [`Error::WriteConflict`] for the caller to retry.
pub struct ThreadStore {
    pod: Arc<dyn PodStore>,
    container_uri: String,
    name_words: usize,
    uri: Option<String>,
    mirror: Graph,
    /// Whether `mirror` reflects the remote document
    synced: bool,
}

impl ThreadStore {
    /// A thread with no resource yet; one is named by the first message
    pub fn new(pod: Arc<dyn PodStore>, container_uri: impl Into<String>) -> Self {
        Self {
            pod,
            container_uri: container_uri.into(),
            name_words: DEFAULT_NAME_WORDS,
            uri: None,
            mirror: Graph::new(),
            synced: false,
        }
    }

    /// An existing thread of the workspace
    pub fn open(
        pod: Arc<dyn PodStore>,
        container_uri: impl Into<String>,
        thread_uri: impl Into<String>,
    ) -> Result<Self> {
        let container_uri = container_uri.into();
        let thread_uri = thread_uri.into();
        if !is_thread_in(&container_uri, &thread_uri) {
            return Err(Error::invalid_uri(
                &thread_uri,
                format!("not a thread of {}", container_uri),
            ));
        }

        let mut store = Self::new(pod, container_uri);
        store.uri = Some(thread_uri);
        Ok(store)
    }

    pub fn with_name_words(mut self, words: usize) -> Self {
        self.name_words = words.max(1);
        self
    }

    pub fn thread_uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn container_uri(&self) -> &str {
        &self.container_uri
    }

    pub fn is_bound(&self) -> bool {
        self.uri.is_some()
    }

    /// Messages in the order they were sent
    pub async fn list_messages(&mut self) -> Result<Vec<ChatMessage>> {
        let Some(uri) = self.uri.clone() else {
            return Ok(Vec::new());
        };

        if !self.pod.available(&uri).await {
            match self.pod.create(&uri).await {
                Ok(()) => tracing::info!("Created thread {}", uri),
                Err(e) if e.is_conflict() => {}
                Err(e) => return Err(Error::provisioning(ProvisionStep::ThreadResource, &uri, e)),
            }
        }
        self.sync(&uri).await;

        Ok(match find_root(&self.mirror) {
            Some(root) => decode_messages(&self.mirror, &root),
            None => Vec::new(),
        })
    }

    /// Append one message with a single remote patch
    pub async fn append_message(&mut self, content: &str, role: Role) -> Result<()> {
        let uri = match self.uri.clone() {
            Some(uri) => uri,
            None => self.bind(content).await?,
        };
        if !self.synced {
            self.sync(&uri).await;
        }

        let patch = match find_root(&self.mirror) {
            None => first_message_patch(&uri, content, role),
            Some(_) => append_patch(content, role),
        };

        if let Err(e) = self.pod.update(&uri, &patch).await {
            self.synced = false;
            return Err(if e.is_conflict() {
                tracing::warn!("Append to {} lost a race: {}", uri, e);
                Error::WriteConflict { uri, source: e }
            } else {
                Error::Pod(e)
            });
        }

        if patch.apply(&mut self.mirror) == 0 {
            tracing::warn!("Local copy of {} is stale, will re-read", uri);
            self.synced = false;
        }
        tracing::debug!("Appended {} message to {}", role, uri);
        Ok(())
    }

    /// Delete the thread document and forget it locally.
    /// Local state is reset even when the remote delete fails.
    pub async fn clear(&mut self) -> Result<()> {
        let uri = self.uri.take();
        self.mirror = Graph::new();
        self.synced = false;

        let Some(uri) = uri else {
            return Ok(());
        };
        self.pod.delete(&uri).await?;
        tracing::info!("Deleted thread {}", uri);
        Ok(())
    }

    async fn sync(&mut self, uri: &str) {
        self.mirror = self.pod.read(uri).await;
        self.synced = true;
    }

    /// Name and create the resource for a new thread
    async fn bind(&mut self, first_content: &str) -> Result<String> {
        let name = thread_name(first_content, self.name_words);

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let candidate = candidate_uri(&self.container_uri, &name, attempt);
            if self.pod.available(&candidate).await {
                continue;
            }
            match self.pod.create(&candidate).await {
                Ok(()) => {
                    tracing::info!("Created thread {}", candidate);
                    self.uri = Some(candidate.clone());
                    self.mirror = Graph::new();
                    self.synced = true;
                    return Ok(candidate);
                }
                Err(e) if e.is_conflict() => continue,
                Err(e) => {
                    return Err(Error::provisioning(ProvisionStep::ThreadResource, &candidate, e))
                }
            }
        }

        let last = candidate_uri(&self.container_uri, &name, MAX_NAME_ATTEMPTS);
        Err(Error::provisioning(
            ProvisionStep::ThreadResource,
            &last,
            PodError::from_status("PUT", &last, 412),
        ))
    }
}
