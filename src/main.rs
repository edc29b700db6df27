mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::services::AppServices;
use crate::services::mailer::{LogTransport, Mailer, spawn_mail_worker};
use crate::services::media::LocalMediaStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rideshare_accounts=info,actix_web=info"));

    // LOG_FORMAT=json pour les environnements agrégés
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let settings = Arc::new(Settings::from_env().context("Invalid configuration")?);

    tracing::info!("connecting to database");
    let db = db::establish_connection(&settings.database)
        .await
        .context("Failed to connect to database")?;

    if settings.database.auto_migrate {
        db::sync_schema(&db).await.context("Failed to create schema")?;
    }

    let (mailer, outbox) = Mailer::channel(settings.registration.mail_queue_capacity);
    let _mail_worker = spawn_mail_worker(outbox, Arc::new(LogTransport));
    let media = Arc::new(LocalMediaStore::new(settings.media.media_root.clone()));

    let services = AppServices::new(db, settings.clone(), mailer, media)?;

    if let Some(admin) = &settings.bootstrap_admin {
        services
            .registration
            .ensure_admin(admin)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bootstrap admin account: {}", e))?;
    }

    let blacklist_enabled = settings.security.session_blacklist_enabled;
    let bind = (settings.server.host.clone(), settings.server.port);
    tracing::info!(host = %bind.0, port = bind.1, "starting server");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| services.install(cfg))
            .configure(|cfg| routes::configure_routes(cfg, blacklist_enabled))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
