// web-server/src/api/threads.rs
use actix_web::{delete, get, post, web, HttpResponse};
use pod_core::{list_threads, Role};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::{active, AppState};

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub thread: String,
}

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    /// Omitted to start a new thread
    pub thread: Option<String>,
    pub role: Role,
    pub content: String,
}

#[get("/threads")]
pub async fn list(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut slot = state.session.lock().await;
    let session = active(&mut slot)?;

    let threads = list_threads(session.pod.as_ref(), &session.workspace.container_uri).await;
    Ok(HttpResponse::Ok().json(threads))
}

#[get("/messages")]
pub async fn messages(
    state: web::Data<AppState>,
    query: web::Query<ThreadQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut slot = state.session.lock().await;
    let session = active(&mut slot)?;

    let history = session.thread(&query.thread)?.list_messages().await?;
    Ok(HttpResponse::Ok().json(history))
}

#[post("/messages")]
pub async fn post_message(
    state: web::Data<AppState>,
    body: web::Json<NewMessage>,
) -> Result<HttpResponse, ApiError> {
    let NewMessage {
        thread,
        role,
        content,
    } = body.into_inner();
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("message content is empty".to_string()));
    }

    let mut slot = state.session.lock().await;
    let session = active(&mut slot)?;

    let uri = match thread {
        Some(uri) => {
            session.thread(&uri)?.append_message(&content, role).await?;
            uri
        }
        None => {
            let mut store = session.new_thread();
            store.append_message(&content, role).await?;
            let uri = store
                .thread_uri()
                .map(str::to_string)
                .ok_or_else(|| ApiError::BadRequest("thread was not created".to_string()))?;
            tracing::info!("Started thread {}", uri);
            session.threads.insert(uri.clone(), store);
            uri
        }
    };

    Ok(HttpResponse::Ok().json(json!({ "thread": uri })))
}

#[delete("/threads")]
pub async fn delete_thread(
    state: web::Data<AppState>,
    query: web::Query<ThreadQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut slot = state.session.lock().await;
    let session = active(&mut slot)?;

    let result = session.thread(&query.thread)?.clear().await;
    session.threads.remove(&query.thread);
    result?;

    tracing::info!("Deleted thread {}", query.thread);
    Ok(HttpResponse::Ok().json(json!({ "deleted": query.thread })))
}
