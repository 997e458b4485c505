// web-server/src/api/mod.rs
pub mod auth;
pub mod settings;
pub mod threads;

use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

#[get("/")]
pub async fn api_index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Social Gen Pod API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::login)
        .service(auth::callback)
        .service(auth::logout)
        .service(
            web::scope("/api")
                .service(api_index)
                .service(auth::providers)
                .service(auth::session_info)
                .service(threads::list)
                .service(threads::messages)
                .service(threads::post_message)
                .service(threads::delete_thread)
                .service(settings::get_settings)
                .service(settings::put_settings),
        );
}
