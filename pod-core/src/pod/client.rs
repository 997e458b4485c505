// pod-core/src/pod/client.rs
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, IF_NONE_MATCH, LINK};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use super::{is_container, item_name, PodError, PodStore};
use crate::auth::SessionCredential;
use crate::config::PodConfig;
use crate::rdf::vocab::ldp;
use crate::rdf::{parse_turtle, Graph, Patch};

const TURTLE: &str = "text/turtle";
const SPARQL_UPDATE: &str = "application/sparql-update";

/// Authenticated LDP client. Every request carries the access token and a
/// proof minted for that request alone.
pub struct PodResourceClient {
    http: Client,
    credential: Arc<SessionCredential>,
}

impl PodResourceClient {
    pub fn new(credential: Arc<SessionCredential>, config: &PodConfig) -> Result<Self, PodError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PodError::Client(e.to_string()))?;
        Ok(Self::with_client(http, credential))
    }

    pub fn with_client(http: Client, credential: Arc<SessionCredential>) -> Self {
        Self { http, credential }
    }

    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    fn request(&self, method: Method, uri: &str) -> Result<RequestBuilder, PodError> {
        let headers = self
            .credential
            .auth_headers(method.as_str(), uri)
            .map_err(|e| PodError::Proof {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let mut builder = self.http.request(method, uri);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder, uri: &str) -> Result<Response, PodError> {
        builder.send().await.map_err(|e| PodError::Unavailable {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
    }
}

fn check(method: &'static str, uri: &str, response: &Response) -> Result<(), PodError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(PodError::from_status(method, uri, status.as_u16()))
    }
}

fn type_link(uri: &str) -> String {
    let interaction_model = if is_container(uri) {
        ldp::BASIC_CONTAINER
    } else {
        ldp::RESOURCE
    };
    format!("<{}>; rel=\"type\"", interaction_model)
}

#[async_trait]
impl PodStore for PodResourceClient {
    async fn available(&self, uri: &str) -> bool {
        let builder = match self.request(Method::HEAD, uri) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!("Cannot check {}: {}", uri, e);
                return false;
            }
        };

        match self.send(builder, uri).await {
            Ok(response) => {
                tracing::debug!("HEAD {} -> {}", uri, response.status());
                response.status().is_success()
            }
            Err(e) => {
                tracing::debug!("HEAD {} unavailable: {}", uri, e);
                false
            }
        }
    }

    async fn create(&self, uri: &str) -> Result<(), PodError> {
        let builder = self
            .request(Method::PUT, uri)?
            .header(IF_NONE_MATCH, "*")
            .header(LINK, type_link(uri))
            .header("Slug", item_name(uri))
            .header(CONTENT_TYPE, TURTLE)
            .body(Vec::new());

        let response = self.send(builder, uri).await?;
        tracing::debug!("PUT {} -> {}", uri, response.status());
        check("PUT", uri, &response)
    }

    async fn read(&self, uri: &str) -> Graph {
        let builder = match self.request(Method::GET, uri) {
            Ok(builder) => builder.header(ACCEPT, TURTLE),
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", uri, e);
                return Graph::new();
            }
        };

        let response = match self.send(builder, uri).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("GET {} unavailable: {}", uri, e);
                return Graph::new();
            }
        };
        if !response.status().is_success() {
            tracing::debug!("GET {} -> {}", uri, response.status());
            return Graph::new();
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read body of {}: {}", uri, e);
                return Graph::new();
            }
        };
        match parse_turtle(&body, uri) {
            Ok(graph) => graph,
            Err(e) => {
                tracing::warn!("Ignoring unparsable content at {}: {}", uri, e);
                Graph::new()
            }
        }
    }

    async fn update(&self, uri: &str, patch: &Patch) -> Result<(), PodError> {
        let builder = self
            .request(Method::PATCH, uri)?
            .header(CONTENT_TYPE, SPARQL_UPDATE)
            .body(patch.to_sparql());

        let response = self.send(builder, uri).await?;
        tracing::debug!("PATCH {} -> {}", uri, response.status());
        check("PATCH", uri, &response)
    }

    async fn delete(&self, uri: &str) -> Result<(), PodError> {
        let builder = self.request(Method::DELETE, uri)?;
        let response = self.send(builder, uri).await?;
        tracing::debug!("DELETE {} -> {}", uri, response.status());

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check("DELETE", uri, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpop::{self, ProofKey};
    use crate::rdf::vocab::pim;
    use crate::rdf::{Term, Triple};
    use crate::test_support::{closed_url, serve};
    use crate::utils::base64url_decode;
    use actix_web::{web, HttpRequest, HttpResponse};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Seen {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: String,
    }

    type Log = Arc<Mutex<Vec<Seen>>>;

    async fn fake_pod(req: HttpRequest, body: web::Bytes, log: web::Data<Log>) -> HttpResponse {
        let headers = req
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        log.lock().unwrap().push(Seen {
            method: req.method().to_string(),
            path: req.path().to_string(),
            headers,
            body: String::from_utf8_lossy(&body).to_string(),
        });

        match (req.method().as_str(), req.path()) {
            ("HEAD", "/exists.ttl") => HttpResponse::Ok().finish(),
            ("PUT", "/private/genpod/") | ("PUT", "/private/genpod/new.ttl") => {
                HttpResponse::Created().finish()
            }
            ("PUT", "/private/genpod/taken.ttl") => HttpResponse::PreconditionFailed().finish(),
            ("GET", "/profile/card") => HttpResponse::Ok()
                .content_type("text/turtle")
                .body("<#me> <http://www.w3.org/ns/pim/space#preferencesFile> <../settings/prefs.ttl> ."),
            ("GET", "/broken.ttl") => HttpResponse::Ok()
                .content_type("text/turtle")
                .body("this is { not turtle"),
            ("PATCH", "/private/genpod/t.ttl") => HttpResponse::Ok().finish(),
            ("PATCH", "/private/genpod/raced.ttl") => HttpResponse::Conflict().finish(),
            ("DELETE", "/private/genpod/t.ttl") => HttpResponse::NoContent().finish(),
            ("DELETE", "/private/genpod/locked.ttl") => HttpResponse::Forbidden().finish(),
            _ => HttpResponse::NotFound().finish(),
        }
    }

    fn start() -> (String, Log, PodResourceClient) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let data = web::Data::new(log.clone());
        let base = serve(move |cfg| {
            cfg.app_data(data.clone())
                .default_service(web::to(fake_pod));
        });
        let credential = SessionCredential::new(
            "pod-token".to_string(),
            ProofKey::generate().unwrap(),
            format!("{}/profile/card#me", base),
            "https://idp.example/".to_string(),
            None,
        );
        let client = PodResourceClient::new(Arc::new(credential), &PodConfig::default()).unwrap();
        (base, log, client)
    }

    fn proof_claims(seen: &Seen) -> Value {
        let proof = &seen.headers["dpop"];
        serde_json::from_slice(&base64url_decode(proof.split('.').nth(1).unwrap()).unwrap())
            .unwrap()
    }

    #[actix_web::test]
    async fn test_every_request_carries_token_and_fresh_proof() {
        let (base, log, client) = start();
        let uri = format!("{}/exists.ttl", base);

        assert!(client.available(&uri).await);
        assert!(client.available(&uri).await);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        for seen in log.iter() {
            assert_eq!(seen.headers["authorization"], "DPoP pod-token");
            let claims = proof_claims(seen);
            assert_eq!(claims["htm"], "HEAD");
            assert_eq!(claims["htu"], uri.as_str());
            assert_eq!(claims["ath"], dpop::access_token_hash("pod-token").as_str());
        }
        assert_ne!(proof_claims(&log[0])["jti"], proof_claims(&log[1])["jti"]);
    }

    #[actix_web::test]
    async fn test_available_is_soft() {
        let (base, _log, client) = start();
        assert!(!client.available(&format!("{}/missing.ttl", base)).await);
        assert!(!client.available(&format!("{}/anything", closed_url())).await);
    }

    #[actix_web::test]
    async fn test_create_is_create_only() {
        let (base, log, client) = start();

        client
            .create(&format!("{}/private/genpod/", base))
            .await
            .unwrap();
        client
            .create(&format!("{}/private/genpod/new.ttl", base))
            .await
            .unwrap();
        let err = client
            .create(&format!("{}/private/genpod/taken.ttl", base))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let log = log.lock().unwrap();
        let container = &log[0];
        assert_eq!(container.method, "PUT");
        assert_eq!(container.headers["if-none-match"], "*");
        assert_eq!(
            container.headers["link"],
            format!("<{}>; rel=\"type\"", ldp::BASIC_CONTAINER)
        );
        assert_eq!(container.headers["slug"], "genpod");
        assert!(container.body.is_empty());

        let resource = &log[1];
        assert_eq!(
            resource.headers["link"],
            format!("<{}>; rel=\"type\"", ldp::RESOURCE)
        );
        assert_eq!(resource.headers["slug"], "new.ttl");
        assert_eq!(resource.headers["content-type"], TURTLE);
    }

    #[actix_web::test]
    async fn test_read_parses_relative_to_resource() {
        let (base, log, client) = start();
        let graph = client.read(&format!("{}/profile/card", base)).await;

        assert_eq!(
            graph.value(
                &Term::iri(format!("{}/profile/card#me", base)),
                pim::PREFERENCES_FILE
            ),
            Some(&Term::iri(format!("{}/settings/prefs.ttl", base)))
        );
        assert_eq!(log.lock().unwrap()[0].headers["accept"], TURTLE);
    }

    #[actix_web::test]
    async fn test_read_never_fails() {
        let (base, _log, client) = start();
        assert!(client.read(&format!("{}/missing.ttl", base)).await.is_empty());
        assert!(client.read(&format!("{}/broken.ttl", base)).await.is_empty());
        assert!(client.read(&format!("{}/x", closed_url())).await.is_empty());
    }

    #[actix_web::test]
    async fn test_update_sends_sparql() {
        let (base, log, client) = start();
        let uri = format!("{}/private/genpod/t.ttl", base);
        let patch = Patch::insert_data(vec![Triple::new(
            Term::iri(&uri),
            pim::PREFERENCES_FILE,
            Term::iri(format!("{}/settings/prefs.ttl", base)),
        )]);

        client.update(&uri, &patch).await.unwrap();
        let err = client
            .update(&format!("{}/private/genpod/raced.ttl", base), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, PodError::Conflict { status: 409, .. }));

        let log = log.lock().unwrap();
        assert_eq!(log[0].headers["content-type"], SPARQL_UPDATE);
        assert_eq!(log[0].body, patch.to_sparql());
    }

    #[actix_web::test]
    async fn test_delete_status_mapping() {
        let (base, _log, client) = start();
        client
            .delete(&format!("{}/private/genpod/t.ttl", base))
            .await
            .unwrap();
        client
            .delete(&format!("{}/private/genpod/gone.ttl", base))
            .await
            .unwrap();

        let err = client
            .delete(&format!("{}/private/genpod/locked.ttl", base))
            .await
            .unwrap_err();
        assert!(matches!(err, PodError::Status { status: 403, .. }));

        let err = client
            .delete(&format!("{}/t.ttl", closed_url()))
            .await
            .unwrap_err();
        assert!(matches!(err, PodError::Unavailable { .. }));
    }
}
