// ============================================================================
// SERVICE : AUTHENTIFICATION
// ============================================================================
//
// Description:
//   Login, refresh / verify / logout des jetons de session, changement et
//   reset du mot de passe, suppression du compte.
//
// Points d'attention:
//   - Login : "Invalid email or password." (401) sans distinguer email
//     inconnu / mauvais mot de passe ; compte non actif => 403
//   - Les refresh tokens portent l'empreinte du session_secret (sfp) :
//     activation, changement et reset du mot de passe les invalident
//   - Blacklist (logout) : seulement si SESSION_BLACKLIST_ENABLED
//
// ============================================================================

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{AppError, Result, is_unique_violation};
use crate::models::dto::{
    ChangePasswordRequest, DeleteAccountRequest, LoginRequest, LoginResponse,
    PasswordResetConfirmRequest,
};
use crate::models::users::{self, AccountStatus, Entity as Users};
use crate::models::{bank_accounts, driver_details, revoked_tokens};
use crate::services::mailer::{Mailer, OutboundEmail};
use crate::services::token_service::{TokenService, new_session_secret};
use crate::utils::jwt::{Claims, SessionError, TokenKind};
use crate::utils::password;
use crate::utils::uid::{decode_uid, encode_uid};
use crate::utils::validators::{normalize_email, validate_password};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const INACTIVE_ACCOUNT: &str = "This account is inactive.";
pub const INVALID_RESET_LINK: &str = "Password reset link is invalid.";
pub const INVALID_LOGOUT_TOKEN: &str = "Invalid token provided.";
pub const PASSWORD_RESET_MESSAGE: &str =
    "If an active account exists for this email, a password reset link has been sent.";

#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    tokens: Arc<TokenService>,
    settings: Arc<Settings>,
    mailer: Mailer,
    /// Hash d'un mot de passe aléatoire : un email inconnu coûte autant qu'un connu
    decoy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        db: DatabaseConnection,
        tokens: Arc<TokenService>,
        settings: Arc<Settings>,
        mailer: Mailer,
    ) -> Self {
        let decoy_hash = password::hash_password(
            &new_session_secret(),
            settings.security.password_hash_iterations,
        )
        .into();

        Self {
            db,
            tokens,
            settings,
            mailer,
            decoy_hash,
        }
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse> {
        let invalid = || AppError::Unauthenticated(INVALID_CREDENTIALS.to_string());

        let account = match normalize_email(&req.email) {
            Ok(email) => {
                Users::find()
                    .filter(users::Column::Email.eq(email))
                    .one(&self.db)
                    .await?
            }
            Err(_) => None,
        };

        let Some(account) = account else {
            password::verify_in_background(req.password, self.decoy_hash.to_string()).await?;
            return Err(invalid());
        };

        let valid =
            password::verify_in_background(req.password, account.password_hash.clone()).await?;
        if !valid {
            warn!(user_id = account.id, "login rejected: wrong password");
            return Err(invalid());
        }

        if !account.can_authenticate() {
            return Err(AppError::Forbidden(INACTIVE_ACCOUNT.to_string()));
        }

        let tokens = self.tokens.issue_session_token(&account)?;
        info!(user_id = account.id, role = %account.role, "user logged in");

        Ok(LoginResponse {
            access: tokens.access,
            refresh: tokens.refresh,
            user: account,
        })
    }

    /// Nouveau access token à partir d'un refresh token encore valable
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self
            .tokens
            .verify_refresh_token(refresh_token)
            .map_err(unauthenticated)?;

        self.ensure_not_revoked(&claims).await?;

        let account = Users::find_by_id(claims.sub)
            .one(&self.db)
            .await?
            .ok_or_else(|| unauthenticated(SessionError::Malformed))?;

        if !self
            .tokens
            .verify_session_fingerprint(&account, claims.sfp.as_deref())
        {
            return Err(unauthenticated(SessionError::Revoked));
        }

        if !account.can_authenticate() {
            return Err(AppError::Unauthenticated(INACTIVE_ACCOUNT.to_string()));
        }

        self.tokens.issue_access_token(&account)
    }

    /// Contrôle sans état d'un jeton (access ou refresh) + blacklist
    pub async fn verify(&self, token: &str) -> Result<Claims> {
        let claims = self.tokens.verify_any(token).map_err(unauthenticated)?;
        self.ensure_not_revoked(&claims).await?;
        Ok(claims)
    }

    /// Ajoute le jti du refresh token à la blacklist
    pub async fn logout(&self, account_id: i32, refresh_token: &str) -> Result<()> {
        let invalid = || AppError::Validation(INVALID_LOGOUT_TOKEN.to_string());

        let claims = self
            .tokens
            .verify_refresh_token(refresh_token)
            .map_err(|_| invalid())?;
        if claims.sub != account_id {
            return Err(invalid());
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

        let revoked = revoked_tokens::ActiveModel {
            jti: Set(claims.jti),
            user_id: Set(account_id),
            expires_at: Set(expires_at),
            revoked_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await;

        match revoked {
            Ok(_) => {}
            // Déjà révoqué : le logout reste un succès
            Err(e) if is_unique_violation(&e) => {}
            Err(e) => return Err(e.into()),
        }

        info!(user_id = account_id, "refresh token revoked");
        Ok(())
    }

    async fn ensure_not_revoked(&self, claims: &Claims) -> Result<()> {
        if !self.settings.security.session_blacklist_enabled
            || claims.token_type != TokenKind::Refresh
        {
            return Ok(());
        }

        let revoked = revoked_tokens::Entity::find()
            .filter(revoked_tokens::Column::Jti.eq(claims.jti.as_str()))
            .count(&self.db)
            .await?;
        if revoked > 0 {
            return Err(unauthenticated(SessionError::Revoked));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mot de passe
    // ------------------------------------------------------------------

    pub async fn change_password(
        &self,
        account_id: i32,
        req: ChangePasswordRequest,
    ) -> Result<users::Model> {
        let account = self.current_account(account_id).await?;

        if let Some(confirm) = &req.confirm_password {
            if *confirm != req.new_password {
                return Err(AppError::field("confirm_password", "Passwords must match."));
            }
        }

        if req.new_password == req.old_password {
            return Err(AppError::field(
                "new_password",
                "New password must be different from the old password.",
            ));
        }

        let valid =
            password::verify_in_background(req.old_password, account.password_hash.clone())
                .await?;
        if !valid {
            return Err(AppError::field("old_password", "Incorrect old password."));
        }

        let policy = &self.settings.registration.password_policy;
        validate_password(
            "new_password",
            &req.new_password,
            policy.min_length_for(account.role),
            true,
        )?;

        let password_hash = password::hash_in_background(
            req.new_password,
            self.settings.security.password_hash_iterations,
        )
        .await?;

        let mut active: users::ActiveModel = account.into();
        active.password_hash = Set(password_hash);
        active.session_secret = Set(Some(new_session_secret()));
        active.updated_at = Set(Utc::now());
        let account = active.update(&self.db).await?;

        info!(user_id = account.id, "password changed");
        Ok(account)
    }

    /// Envoie un lien de reset si le compte existe et est actif.
    /// Réponse identique dans tous les cas.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };

        let account = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        if let Some(account) = account.filter(|a| a.can_authenticate()) {
            let url = format!(
                "{}/api/v1/user/password-reset/{}/{}/",
                self.settings.registration.public_base_url,
                encode_uid(account.id),
                self.tokens.issue_password_reset_token(&account)
            );
            self.mailer
                .enqueue(OutboundEmail::password_reset(&account.email, &url));
            info!(user_id = account.id, "password reset link sent");
        }

        Ok(())
    }

    pub async fn reset_password(
        &self,
        uidb64: &str,
        token: &str,
        req: PasswordResetConfirmRequest,
    ) -> Result<()> {
        let invalid = || AppError::InvalidLink(INVALID_RESET_LINK.to_string());

        let account_id = decode_uid(uidb64).ok_or_else(invalid)?;
        let account = Users::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(invalid)?;

        if account.status != AccountStatus::Active
            || !self.tokens.verify_password_reset_token(&account, token)
        {
            return Err(invalid());
        }

        if req.new_password != req.confirm_password {
            return Err(AppError::field("confirm_password", "Passwords must match."));
        }

        let policy = &self.settings.registration.password_policy;
        validate_password(
            "new_password",
            &req.new_password,
            policy.min_length_for(account.role),
            true,
        )?;

        let password_hash = password::hash_in_background(
            req.new_password,
            self.settings.security.password_hash_iterations,
        )
        .await?;

        // Conditionnel sur l'ancien session_secret : le même lien ne sert qu'une fois
        let secret_unchanged = match &account.session_secret {
            Some(secret) => users::Column::SessionSecret.eq(secret.as_str()),
            None => users::Column::SessionSecret.is_null(),
        };
        let updated = Users::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(users::Column::SessionSecret, Expr::value(new_session_secret()))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(account.id))
            .filter(secret_unchanged)
            .exec(&self.db)
            .await?;

        if updated.rows_affected == 0 {
            return Err(invalid());
        }

        info!(user_id = account.id, "password reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Suppression
    // ------------------------------------------------------------------

    /// Suppression définitive après re-saisie du mot de passe
    pub async fn delete_account(&self, account_id: i32, req: DeleteAccountRequest) -> Result<()> {
        let password = req
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::field("password", "This field is required."))?;

        if let Some(confirm) = &req.password2 {
            if *confirm != password {
                return Err(AppError::field("password2", "Passwords must match."));
            }
        }

        let account = self.current_account(account_id).await?;

        let valid =
            password::verify_in_background(password, account.password_hash.clone()).await?;
        if !valid {
            return Err(AppError::Unauthenticated("Incorrect password.".to_string()));
        }

        let txn = self.db.begin().await?;

        driver_details::Entity::delete_many()
            .filter(driver_details::Column::UserId.eq(account.id))
            .exec(&txn)
            .await?;
        bank_accounts::Entity::delete_many()
            .filter(bank_accounts::Column::UserId.eq(account.id))
            .exec(&txn)
            .await?;
        Users::delete_by_id(account.id).exec(&txn).await?;

        txn.commit().await?;

        info!(user_id = account.id, role = %account.role, "account deleted");
        Ok(())
    }

    async fn current_account(&self, account_id: i32) -> Result<users::Model> {
        Users::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("User not found.".to_string()))
    }
}

fn unauthenticated(err: SessionError) -> AppError {
    AppError::Unauthenticated(err.to_string())
}
