// web-server/src/main.rs
mod api;
mod error;
mod state;

use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use pod_core::{setup_tracing, Config};

use crate::state::AppState;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("Social Gen Pod Web Server")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();

    // Save address before moving config into the shared state
    let server_addr = config.web_server_addr.clone();

    let state = AppState::new(config).map_err(|e| {
        tracing::error!("Failed to set up login: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let state = web::Data::new(state);

    tracing::info!("Starting Web Server on {}", server_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(index)
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
