// pod-core/src/test_support.rs
//! Throw-away HTTP servers standing in for identity providers and pods.

use actix_web::{web, App, HttpServer};

/// Serve `configure` on an ephemeral local port and return its base URL.
/// Must be called from inside an actix system (`#[actix_web::test]`).
pub(crate) fn serve<F>(configure: F) -> String
where
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let server = HttpServer::new(move || {
        let configure = configure.clone();
        App::new().configure(move |cfg| configure(cfg))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind test server");

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

/// Base URL on which nothing is listening
pub(crate) fn closed_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    format!("http://{}", addr)
}
