// auth-server/src/main.rs
use std::path::Path;

use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};

use auth_server::api;
use auth_server::storage::UserStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();

    let server_addr = config.server.addr.clone();

    let store = UserStore::open(Path::new(&config.storage.database_path))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    tracing::info!("Starting auth server on {}", server_addr);

    let auth_config = web::Data::new(config.auth);
    let store_data = web::Data::new(store);

    HttpServer::new(move || {
        App::new()
            .app_data(auth_config.clone())
            .app_data(store_data.clone())
            .service(api::index)
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
