// web-server/src/api/auth.rs
use actix_web::http::header;
use actix_web::{get, post, web, HttpResponse, Responder};
use pod_core::{CallbackParams, PodResourceClient, PodStore};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::{active, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub provider: Option<String>,
}

// Send the browser to the provider's authorization endpoint
#[get("/login")]
pub async fn login(
    state: web::Data<AppState>,
    query: web::Query<LoginQuery>,
) -> Result<HttpResponse, ApiError> {
    let provider = query
        .provider
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing provider".to_string()))?;

    let request = state.authenticator.begin_login(provider).await?;
    tracing::info!("Redirecting to {} for login", provider);

    Ok(HttpResponse::Found()
        .append_header((header::LOCATION, request.url))
        .finish())
}

#[get("/callback")]
pub async fn callback(
    state: web::Data<AppState>,
    params: web::Query<CallbackParams>,
) -> Result<HttpResponse, ApiError> {
    let credential = Arc::new(
        state
            .authenticator
            .complete_login(params.into_inner())
            .await?,
    );
    let client = PodResourceClient::new(credential.clone(), &state.config.pod)
        .map_err(pod_core::Error::from)?;
    let pod: Arc<dyn PodStore> = Arc::new(client);

    state.start_session(credential, pod).await?;

    Ok(HttpResponse::Found()
        .append_header((header::LOCATION, "/"))
        .finish())
}

#[post("/logout")]
pub async fn logout(state: web::Data<AppState>) -> impl Responder {
    let ended = state.end_session().await;
    HttpResponse::Ok().json(json!({
        "logged_out": ended,
        "redirect": state.config.post_logout_redirect_uri()
    }))
}

#[get("/providers")]
pub async fn providers(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(&state.config.login.providers)
}

#[get("/session")]
pub async fn session_info(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut slot = state.session.lock().await;
    let session = active(&mut slot)?;
    Ok(HttpResponse::Ok().json(session.summary()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{configure, testing};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use pod_core::models::SessionSummary;

    #[actix_web::test]
    async fn test_login_requires_provider() {
        let app = test::init_service(
            App::new()
                .app_data(testing::state())
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/login").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_callback_with_unknown_state_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(testing::state())
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/callback?code=abc&state=never-issued")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_providers_lists_configured() {
        let app = test::init_service(
            App::new()
                .app_data(testing::state())
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/providers").to_request();
        let listed: Vec<String> = test::call_and_read_body_json(&app, req).await;
        assert!(listed.contains(&"https://login.inrupt.com/".to_string()));
    }

    #[actix_web::test]
    async fn test_session_then_logout() {
        let (state, _pod) = testing::logged_in().await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/session").to_request();
        let summary: SessionSummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary.webid, testing::WEBID);
        assert_eq!(summary.workspace.as_deref(), Some(testing::CONTAINER));

        let req = test::TestRequest::post().uri("/logout").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["logged_out"], true);

        let req = test::TestRequest::get().uri("/api/session").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
