// ============================================================================
// CONFIGURATION
// ============================================================================
//
// Description:
//   Paramètres de l'application, chargés une seule fois au démarrage depuis
//   les variables d'environnement (et le fichier .env en local).
//   Après init, la config est en lecture seule (partagée via web::Data).
//
// Variables principales:
//   - DATABASE_URL (obligatoire)
//   - SECRET_KEY (obligatoire en release)
//   - PUBLIC_BASE_URL : base des liens d'activation / reset envoyés par email
//   - SESSION_BLACKLIST_ENABLED : active le logout (blacklist des refresh tokens)
//   - REGISTRATION_MIN_AGE : âge minimum à l'inscription (désactivé si absent)
//
// ============================================================================

use anyhow::{Context, Result, bail};
use chrono::Duration;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::models::users::Role;
use crate::utils::password::DEFAULT_ITERATIONS;

const DEV_SECRET_KEY: &str = "dev-insecure-secret-key-change-this-before-deploying";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub security: SecuritySettings,
    pub registration: RegistrationSettings,
    pub pagination: PaginationSettings,
    pub media: MediaSettings,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub secret_key: String,
    pub password_hash_iterations: u32,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub session_blacklist_enabled: bool,
    pub session_cookie_enabled: bool,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    pub public_base_url: String,
    pub password_policy: PasswordPolicy,
    pub min_age: Option<u32>,
    pub expose_activation_url: bool,
    pub mail_queue_capacity: usize,
}

/// Règles de mot de passe. Les longueurs minimales diffèrent selon le rôle
/// (4 pour le staff, 6 pour riders et drivers).
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length_rider: usize,
    pub min_length_driver: usize,
    pub min_length_staff: usize,
    pub require_strong_on_register: bool,
}

impl PasswordPolicy {
    pub fn min_length_for(&self, role: Role) -> usize {
        match role {
            Role::Rider => self.min_length_rider,
            Role::Driver => self.min_length_driver,
            Role::Staff | Role::Admin => self.min_length_staff,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub media_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

impl Settings {
    /// Charge la config depuis l'environnement du process (le .env est lu par main)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Charge la config depuis une source clé/valeur quelconque
    /// (l'environnement en prod, une map dans les tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource { lookup: &lookup };

        let secret_key = match env.get("SECRET_KEY") {
            Some(key) => key,
            None if cfg!(debug_assertions) => {
                warn!("SECRET_KEY not set, using development key (INSECURE)");
                DEV_SECRET_KEY.to_string()
            }
            None => bail!("SECRET_KEY must be set"),
        };
        if secret_key.len() < 32 {
            warn!("SECRET_KEY is shorter than 32 bytes");
        }

        let access_ttl_secs: i64 = env.parse_or("ACCESS_TOKEN_TTL_SECS", 15 * 60)?;
        let refresh_ttl_secs: i64 = env.parse_or("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?;

        let password_hash_iterations: u32 =
            env.parse_or("PASSWORD_HASH_ITERATIONS", DEFAULT_ITERATIONS)?;
        if password_hash_iterations == 0 {
            bail!("PASSWORD_HASH_ITERATIONS must be greater than 0");
        }

        let default_per_page: u64 = env.parse_or("PAGE_SIZE", 10)?;
        let max_per_page: u64 = env.parse_or("MAX_PAGE_SIZE", 100)?;
        if default_per_page == 0 || max_per_page == 0 {
            bail!("PAGE_SIZE and MAX_PAGE_SIZE must be greater than 0");
        }

        let min_age = match env.get("REGISTRATION_MIN_AGE") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .context("Invalid REGISTRATION_MIN_AGE")?,
            ),
            None => None,
        };

        let bootstrap_admin = match (
            env.get("BOOTSTRAP_ADMIN_EMAIL"),
            env.get("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                username: env.get("BOOTSTRAP_ADMIN_USERNAME"),
            }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Settings {
            server: ServerSettings {
                host: env.string_or("HOST", "127.0.0.1"),
                port: env.parse_or("PORT", 8080)?,
            },
            database: DatabaseSettings {
                url: env.get("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: env.parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
                auto_migrate: env.flag_or("AUTO_MIGRATE", false)?,
            },
            security: SecuritySettings {
                secret_key,
                password_hash_iterations,
                access_token_ttl: Duration::seconds(access_ttl_secs),
                refresh_token_ttl: Duration::seconds(refresh_ttl_secs),
                session_blacklist_enabled: env.flag_or("SESSION_BLACKLIST_ENABLED", false)?,
                session_cookie_enabled: env.flag_or("SESSION_COOKIE_ENABLED", false)?,
                cookie_secure: env.flag_or("COOKIE_SECURE", true)?,
            },
            registration: RegistrationSettings {
                public_base_url: env
                    .string_or("PUBLIC_BASE_URL", "http://127.0.0.1:8080")
                    .trim_end_matches('/')
                    .to_string(),
                password_policy: PasswordPolicy {
                    min_length_rider: env.parse_or("PASSWORD_MIN_LENGTH_RIDER", 6)?,
                    min_length_driver: env.parse_or("PASSWORD_MIN_LENGTH_DRIVER", 6)?,
                    min_length_staff: env.parse_or("PASSWORD_MIN_LENGTH_STAFF", 4)?,
                    require_strong_on_register: env.flag_or("REQUIRE_STRONG_PASSWORD", false)?,
                },
                min_age,
                expose_activation_url: env.flag_or("EXPOSE_ACTIVATION_URL", false)?,
                mail_queue_capacity: env.parse_or("MAIL_QUEUE_CAPACITY", 1024)?,
            },
            pagination: PaginationSettings {
                default_per_page,
                max_per_page,
            },
            media: MediaSettings {
                media_root: PathBuf::from(env.string_or("MEDIA_ROOT", "./media")),
            },
            bootstrap_admin,
        })
    }
}

struct EnvSource<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvSource<'_> {
    /// Valeur non vide, sinon None
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw.parse::<T>().with_context(|| format!("Invalid {}", key)),
            None => Ok(default),
        }
    }

    fn flag_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => bail!("Invalid {}: expected a boolean, got {:?}", key, raw),
            },
            None => Ok(default),
        }
    }
}
