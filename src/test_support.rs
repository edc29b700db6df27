// Outils partagés par les tests : base SQLite en mémoire, config de test,
// comptes pré-remplis

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use uuid::Uuid;

use crate::config::Settings;
use crate::db;
use crate::models::users::{self, AccountStatus, Role};
use crate::models::{bank_accounts, driver_details};
use crate::services::AppServices;
use crate::services::mailer::{Mailer, OutboundEmail};
use crate::services::media::LocalMediaStore;
use crate::utils::password::hash_password;

pub const TEST_PASSWORD: &str = "Test!pass123";
pub const TEST_ITERATIONS: u32 = 1_000;

pub async fn test_db() -> DatabaseConnection {
    // Une seule connexion : chaque connexion ":memory:" ouvrirait sa propre base
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    db::sync_schema(&db).await.unwrap();
    db
}

pub fn test_settings(extra: &[(&str, &str)]) -> Settings {
    let mut values: HashMap<String, String> = [
        ("DATABASE_URL", "sqlite::memory:"),
        ("SECRET_KEY", "test-secret-key-test-secret-key-0123"),
        ("PASSWORD_HASH_ITERATIONS", "1000"),
        ("SESSION_BLACKLIST_ENABLED", "true"),
        ("PUBLIC_BASE_URL", "http://testserver"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (key, value) in extra {
        values.insert(key.to_string(), value.to_string());
    }

    let mut settings = Settings::from_lookup(|key| values.get(key).cloned()).unwrap();
    settings.media.media_root = std::env::temp_dir().join(format!("rideshare-media-{}", Uuid::new_v4()));
    settings
}

pub struct TestContext {
    pub services: AppServices,
    pub db: DatabaseConnection,
    pub outbox: Receiver<OutboundEmail>,
    pub media_root: PathBuf,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_settings(&[]).await
    }

    pub async fn with_settings(extra: &[(&str, &str)]) -> Self {
        let settings = test_settings(extra);
        let media_root = settings.media.media_root.clone();
        let db = test_db().await;
        let (mailer, outbox) = Mailer::channel(16);
        let media = Arc::new(LocalMediaStore::new(media_root.clone()));

        let services = AppServices::new(db.clone(), Arc::new(settings), mailer, media).unwrap();

        Self {
            services,
            db,
            outbox,
            media_root,
        }
    }
}

/// Compte non persisté (tests des jetons)
pub fn sample_account(id: i32, role: Role) -> users::Model {
    let now = Utc::now();
    users::Model {
        id,
        email: format!("user{}@example.com", id),
        username: Some(format!("user{}", id)),
        password_hash: format!("pbkdf2_sha256$1000$salt{}$aGFzaA==", id),
        first_name: None,
        last_name: None,
        phone_number: None,
        date_of_birth: None,
        gender: None,
        address: None,
        profile_image: None,
        timezone: "UTC".to_string(),
        role,
        status: AccountStatus::Pending,
        login_type: "email".to_string(),
        is_staff: role == Role::Staff,
        is_superuser: false,
        is_active: false,
        is_online: false,
        fleet_id: None,
        fcm_token: None,
        email_verified_at: None,
        session_secret: Some(format!("secret-{}", id)),
        created_at: now,
        updated_at: now,
    }
}

/// Compte persisté avec TEST_PASSWORD (et ses fiches si driver)
pub async fn insert_account(
    db: &DatabaseConnection,
    email: &str,
    role: Role,
    status: AccountStatus,
) -> users::Model {
    let now = Utc::now();
    let username = email.split('@').next().unwrap_or(email).to_string();
    let verified = status != AccountStatus::Pending;

    let account = users::ActiveModel {
        email: Set(email.to_lowercase()),
        username: Set(Some(username)),
        password_hash: Set(hash_password(TEST_PASSWORD, TEST_ITERATIONS)),
        timezone: Set("UTC".to_string()),
        role: Set(role),
        status: Set(status),
        login_type: Set("email".to_string()),
        is_staff: Set(matches!(role, Role::Staff | Role::Admin)),
        is_superuser: Set(role == Role::Admin),
        is_active: Set(status == AccountStatus::Active),
        is_online: Set(false),
        email_verified_at: Set(verified.then_some(now)),
        session_secret: Set(Some(crate::services::token_service::new_session_secret())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    if role == Role::Driver {
        driver_details::ActiveModel {
            user_id: Set(account.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        bank_accounts::ActiveModel {
            user_id: Set(account.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    account
}
