use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    http::header,
    middleware::{Logger, NormalizePath},
    web, App, HttpServer,
};
use mongodb::Client;

use groupcache::config::{Config, StoreKind};
use groupcache::routes;
use groupcache::store::{GroupStore, InMemoryGroupStore, MongoGroupStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "groupcache=info,actix_web=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn GroupStore> = match (config.store, config.mongodb_uri.as_deref()) {
        (StoreKind::Mongo, Some(uri)) => {
            let client = Client::with_uri_str(uri)
                .await
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
            tracing::info!(database = %config.database, "connected to MongoDB");
            Arc::new(MongoGroupStore::new(&client, &config.database))
        }
        _ => {
            tracing::warn!("using the in-memory store, data is lost on shutdown");
            Arc::new(InMemoryGroupStore::new())
        }
    };
    let store = web::Data::from(store);

    tracing::info!(host = %config.host, port = config.port, "starting server");
    let allowed_origin = config.allowed_origin.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&allowed_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(3600);
        App::new()
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(store.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
