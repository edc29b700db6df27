/*
services/
├─ token_service.rs     ← jetons d'activation / reset (HMAC) + sessions (JWT)
├─ lifecycle.rs         ← machine à états du statut des comptes
├─ registration.rs      ← inscription rider / driver / staff, admin de démarrage
├─ auth_service.rs      ← login, refresh, logout, mot de passe, suppression
├─ admin_service.rs     ← listing paginé + changement de statut
├─ profile_service.rs   ← profil, photo, fiches driver
├─ mailer.rs            ← file d'emails sortants (fire-and-forget)
└─ media.rs             ← stockage des images + validation
*/
pub mod admin_service;
pub mod auth_service;
pub mod lifecycle;
pub mod mailer;
pub mod media;
pub mod profile_service;
pub mod registration;
pub mod token_service;

use actix_web::web;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Settings;
use admin_service::AdminService;
use auth_service::AuthService;
use lifecycle::LifecycleManager;
use mailer::Mailer;
use media::MediaStore;
use profile_service::ProfileService;
use registration::RegistrationService;
use token_service::TokenService;

/// Tous les services, construits une fois au démarrage
#[derive(Clone)]
pub struct AppServices {
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    pub tokens: Arc<TokenService>,
    pub lifecycle: LifecycleManager,
    pub registration: RegistrationService,
    pub auth: AuthService,
    pub admin: AdminService,
    pub profile: ProfileService,
}

impl AppServices {
    pub fn new(
        db: DatabaseConnection,
        settings: Arc<Settings>,
        mailer: Mailer,
        media: Arc<dyn MediaStore>,
    ) -> anyhow::Result<Self> {
        let tokens = Arc::new(
            TokenService::from_settings(&settings.security)
                .map_err(|e| anyhow::anyhow!("Invalid SECRET_KEY: {}", e))?,
        );
        let lifecycle = LifecycleManager::new(db.clone(), tokens.clone());

        Ok(Self {
            registration: RegistrationService::new(
                db.clone(),
                tokens.clone(),
                settings.clone(),
                mailer.clone(),
                media.clone(),
            ),
            auth: AuthService::new(db.clone(), tokens.clone(), settings.clone(), mailer),
            admin: AdminService::new(db.clone(), settings.clone(), lifecycle.clone()),
            profile: ProfileService::new(db.clone(), settings.clone(), media),
            db,
            lifecycle,
            tokens,
            settings,
        })
    }

    /// Enregistre chaque service comme web::Data de l'application
    pub fn install(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.db.clone()))
            .app_data(web::Data::from(self.settings.clone()))
            .app_data(web::Data::from(self.tokens.clone()))
            .app_data(web::Data::new(self.lifecycle.clone()))
            .app_data(web::Data::new(self.registration.clone()))
            .app_data(web::Data::new(self.auth.clone()))
            .app_data(web::Data::new(self.admin.clone()))
            .app_data(web::Data::new(self.profile.clone()));
    }
}
