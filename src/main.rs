use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use log::info;

use pdf_vault::auth::JwtSession;
use pdf_vault::auth::google::GoogleOAuthClient;
use pdf_vault::config::Config;
use pdf_vault::handlers::files::UploadLimit;
use pdf_vault::repositories::PgRecordStore;
use pdf_vault::storage::S3ObjectStore;
use pdf_vault::workspace::{self, Backends};
use pdf_vault::{database, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    env_logger::init();

    let config = Config::from_env().map_err(std::io::Error::other)?;

    let pool = database::create_pool(&config.database_url).map_err(std::io::Error::other)?;
    let objects =
        S3ObjectStore::from_env(config.s3_bucket.clone(), config.s3_endpoint.as_deref()).await;
    let backends = Backends::new(Arc::new(objects), Arc::new(PgRecordStore::new(pool.clone())))
        .with_record_delete(config.record_delete);

    actix_web::rt::spawn(workspace::reconcile::run_sweeper(
        backends.clone(),
        config.reconcile_interval,
    ));

    let oauth_client =
        web::Data::new(GoogleOAuthClient::new(&config.google).map_err(std::io::Error::other)?);
    let jwt = web::Data::new(JwtSession::new(&config.jwt_secret, config.jwt_ttl_hours));
    let backends = web::Data::new(backends);
    let upload_limit = web::Data::new(UploadLimit(config.max_upload_bytes));

    info!(
        "Serving PDF vault on {} (bucket {})",
        config.bind_addr, config.s3_bucket
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(backends.clone())
            .app_data(jwt.clone())
            .app_data(oauth_client.clone())
            .app_data(upload_limit.clone())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
