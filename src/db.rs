// connexion BD + création des tables

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseSettings;
use crate::models::{bank_accounts, driver_details, revoked_tokens, users};

pub async fn establish_connection(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options
        .max_connections(settings.max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    Database::connect(options).await
}

/// Crée les tables manquantes à partir des entités (users en premier, les
/// autres tables la référencent)
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, driver_details::Entity).await?;
    create_table(db, bank_accounts::Entity).await?;
    create_table(db, revoked_tokens::Entity).await?;

    info!("database schema is up to date");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();

    db.execute(backend.build(&statement)).await?;
    Ok(())
}
