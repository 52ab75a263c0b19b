use actix_web::{web, App, HttpServer};
use log::info;
use log4rs;

use gridstore::api::{delete_object, get_object, list_versions, put_object};
use gridstore::app_state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("server_log.yaml", Default::default()).unwrap();

    let state = AppState::new();
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let workers = state.config.server.workers;
    let max_payload_size = state.config.server.max_payload_size as usize;

    info!("Starting server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            // versions listing must be registered before the bare name route
            .route("/objects/{name}/versions", web::get().to(list_versions))
            .route("/objects/{name}", web::put().to(put_object))
            .route("/objects/{name}", web::get().to(get_object))
            .route("/objects/{id}", web::delete().to(delete_object))
    })
    .workers(workers)
    .bind((host.as_str(), port))?
    .run()
    .await
}
