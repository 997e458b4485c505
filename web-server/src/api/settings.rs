// web-server/src/api/settings.rs
use actix_web::{get, put, web, HttpResponse};
use pod_core::{AppSettings, SettingsStore};

use crate::error::ApiError;
use crate::state::{active, AppState};

#[get("/settings")]
pub async fn get_settings(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut slot = state.session.lock().await;
    let session = active(&mut slot)?;

    let store = SettingsStore::new(session.pod.clone(), &session.workspace.container_uri);
    Ok(HttpResponse::Ok().json(store.load().await))
}

#[put("/settings")]
pub async fn put_settings(
    state: web::Data<AppState>,
    body: web::Json<AppSettings>,
) -> Result<HttpResponse, ApiError> {
    let mut slot = state.session.lock().await;
    let session = active(&mut slot)?;

    let store = SettingsStore::new(session.pod.clone(), &session.workspace.container_uri);
    store.save(&body).await?;
    Ok(HttpResponse::Ok().json(store.load().await))
}

#[cfg(test)]
mod tests {
    use crate::api::{configure, testing};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use pod_core::AppSettings;
    use serde_json::json;

    #[actix_web::test]
    async fn test_put_then_get() {
        let (state, _pod) = testing::logged_in().await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/settings").to_request();
        let settings: AppSettings = test::call_and_read_body_json(&app, req).await;
        assert_eq!(settings, AppSettings::default());

        let req = test::TestRequest::put()
            .uri("/api/settings")
            .set_json(json!({ "llm_service": "https://llm.example/" }))
            .to_request();
        let saved: AppSettings = test::call_and_read_body_json(&app, req).await;
        assert_eq!(saved.llm_service.as_deref(), Some("https://llm.example/"));

        let req = test::TestRequest::get().uri("/api/settings").to_request();
        let settings: AppSettings = test::call_and_read_body_json(&app, req).await;
        assert_eq!(settings, saved);
    }

    #[actix_web::test]
    async fn test_put_rejects_non_uri() {
        let (state, _pod) = testing::logged_in().await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::put()
            .uri("/api/settings")
            .set_json(json!({ "retrieval_service": "nope" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
