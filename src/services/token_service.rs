use chrono::{Duration, Utc};
use hmac::{Hmac, Mac, digest::InvalidLength};
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::SecuritySettings;
use crate::error::{AppError, Result};
use crate::models::users;
use crate::utils::jwt::{self, Claims, SessionError, TokenKind};

type HmacSha256 = Hmac<Sha256>;

const SESSION_SECRET_LENGTH: usize = 40;

/// Usage d'un jeton lié à l'état du compte. Le tag entre dans le HMAC,
/// donc un jeton d'activation ne vaut jamais comme jeton de reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatePurpose {
    Activation,
    PasswordReset,
}

impl StatePurpose {
    fn tag(&self) -> &'static [u8] {
        match self {
            StatePurpose::Activation => b"account-activation",
            StatePurpose::PasswordReset => b"password-reset",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

/// Émission / vérification des jetons.
///
/// - Activation et reset : HMAC-SHA256(secret, usage | empreinte du compte).
///   Rien n'est stocké ; le jeton est recalculé et devient invalide dès que
///   l'état du compte change (activation, changement de mot de passe, statut).
/// - Session : JWT HS256 (access + refresh), sans état côté serveur.
pub struct TokenService {
    secret: Vec<u8>,
    state_key: HmacSha256,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> std::result::Result<Self, InvalidLength> {
        Ok(Self {
            secret: secret.to_vec(),
            state_key: HmacSha256::new_from_slice(secret)?,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn from_settings(settings: &SecuritySettings) -> std::result::Result<Self, InvalidLength> {
        Self::new(
            settings.secret_key.as_bytes(),
            settings.access_token_ttl,
            settings.refresh_token_ttl,
        )
    }

    // ------------------------------------------------------------------
    // Jetons liés à l'état du compte
    // ------------------------------------------------------------------

    pub fn issue_activation_token(&self, account: &users::Model) -> String {
        self.issue_state_token(StatePurpose::Activation, account)
    }

    pub fn verify_activation_token(&self, account: &users::Model, token: &str) -> bool {
        self.verify_state_token(StatePurpose::Activation, account, token)
    }

    pub fn issue_password_reset_token(&self, account: &users::Model) -> String {
        self.issue_state_token(StatePurpose::PasswordReset, account)
    }

    pub fn verify_password_reset_token(&self, account: &users::Model, token: &str) -> bool {
        self.verify_state_token(StatePurpose::PasswordReset, account, token)
    }

    fn state_mac(&self, purpose: StatePurpose, account: &users::Model) -> HmacSha256 {
        let mut mac = self.state_key.clone();
        mac.update(purpose.tag());
        mac.update(b"|");
        mac.update(state_fingerprint(account).as_bytes());
        mac
    }

    fn issue_state_token(&self, purpose: StatePurpose, account: &users::Model) -> String {
        hex::encode(self.state_mac(purpose, account).finalize().into_bytes())
    }

    fn verify_state_token(&self, purpose: StatePurpose, account: &users::Model, token: &str) -> bool {
        let Ok(candidate) = hex::decode(token) else {
            return false;
        };
        // verify_slice compare en temps constant
        self.state_mac(purpose, account)
            .verify_slice(&candidate)
            .is_ok()
    }

    // ------------------------------------------------------------------
    // Jetons de session
    // ------------------------------------------------------------------

    /// Paire access + refresh pour un compte authentifié
    pub fn issue_session_token(&self, account: &users::Model) -> Result<SessionTokens> {
        Ok(SessionTokens {
            access: self.issue_access_token(account)?,
            refresh: self.sign(
                account,
                TokenKind::Refresh,
                self.refresh_ttl,
                Some(self.session_fingerprint(account)),
            )?,
        })
    }

    pub fn issue_access_token(&self, account: &users::Model) -> Result<String> {
        self.sign(account, TokenKind::Access, self.access_ttl, None)
    }

    /// Vérifie un access token (signature + expiration + type)
    pub fn verify_session_token(&self, token: &str) -> std::result::Result<Claims, SessionError> {
        self.verify_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> std::result::Result<Claims, SessionError> {
        self.verify_kind(token, TokenKind::Refresh)
    }

    /// Vérifie n'importe quel jeton de session (endpoint /token/verify)
    pub fn verify_any(&self, token: &str) -> std::result::Result<Claims, SessionError> {
        jwt::decode_claims(&self.secret, token)
    }

    /// Empreinte courte du session_secret, embarquée dans les refresh tokens.
    /// Une rotation du secret invalide tous les refresh tokens émis avant.
    pub fn session_fingerprint(&self, account: &users::Model) -> String {
        let mut mac = self.state_key.clone();
        mac.update(b"session|");
        mac.update(account.id.to_string().as_bytes());
        mac.update(b"|");
        mac.update(account.session_secret.as_deref().unwrap_or("").as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(&digest[..16])
    }

    /// Compare l'empreinte d'un refresh token à celle du compte, en temps constant
    pub fn verify_session_fingerprint(&self, account: &users::Model, sfp: Option<&str>) -> bool {
        let Some(presented) = sfp else {
            return false;
        };
        let expected = self.session_fingerprint(account);
        presented.as_bytes().ct_eq(expected.as_bytes()).into()
    }

    fn verify_kind(&self, token: &str, kind: TokenKind) -> std::result::Result<Claims, SessionError> {
        let claims = jwt::decode_claims(&self.secret, token)?;
        if claims.token_type != kind {
            return Err(SessionError::Malformed);
        }
        Ok(claims)
    }

    fn sign(
        &self,
        account: &users::Model,
        kind: TokenKind,
        ttl: Duration,
        sfp: Option<String>,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: account.id,
            role: account.role,
            staff: account.is_staff,
            superuser: account.is_superuser,
            token_type: kind,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            sfp,
        };

        jwt::encode_claims(&self.secret, &claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
    }
}

/// Nouveau session_secret aléatoire (rotation à l'activation, au changement
/// et au reset du mot de passe)
pub fn new_session_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Empreinte de l'état du compte couverte par les jetons d'activation / reset
fn state_fingerprint(account: &users::Model) -> String {
    let verified_at = account
        .email_verified_at
        .map(|t| t.timestamp().to_string())
        .unwrap_or_default();

    format!(
        "{}|{}|{}|{}|{}",
        account.id,
        account.email,
        account.status.as_str(),
        verified_at,
        account.password_hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::{AccountStatus, Role};
    use crate::test_support::sample_account;

    fn service() -> TokenService {
        TokenService::new(
            b"token-service-test-secret-0123456789",
            Duration::minutes(15),
            Duration::days(7),
        )
        .unwrap()
    }

    #[test]
    fn test_activation_token_is_deterministic() {
        let tokens = service();
        let account = sample_account(7, Role::Rider);

        let first = tokens.issue_activation_token(&account);
        let second = tokens.issue_activation_token(&account);

        assert_eq!(first, second);
        assert!(tokens.verify_activation_token(&account, &first));
    }

    #[test]
    fn test_activation_token_bound_to_account() {
        let tokens = service();
        let alice = sample_account(1, Role::Rider);
        let mut bob = sample_account(2, Role::Rider);
        bob.password_hash = alice.password_hash.clone();

        let token = tokens.issue_activation_token(&alice);
        assert!(!tokens.verify_activation_token(&bob, &token));
    }

    #[test]
    fn test_activation_token_invalidated_by_state_change() {
        let tokens = service();
        let mut account = sample_account(3, Role::Driver);
        let token = tokens.issue_activation_token(&account);

        account.email_verified_at = Some(Utc::now());
        account.status = AccountStatus::Active;
        assert!(!tokens.verify_activation_token(&account, &token));
    }

    #[test]
    fn test_activation_token_requires_secret() {
        let account = sample_account(4, Role::Rider);
        let token = service().issue_activation_token(&account);
        let other = TokenService::new(b"some-other-secret", Duration::minutes(1), Duration::days(1))
            .unwrap();

        assert!(!other.verify_activation_token(&account, &token));
        assert!(!service().verify_activation_token(&account, "zz-not-hex"));
        assert!(!service().verify_activation_token(&account, ""));
    }

    #[test]
    fn test_reset_and_activation_tokens_differ() {
        let tokens = service();
        let account = sample_account(5, Role::Rider);

        let activation = tokens.issue_activation_token(&account);
        assert!(!tokens.verify_password_reset_token(&account, &activation));

        let reset = tokens.issue_password_reset_token(&account);
        assert!(tokens.verify_password_reset_token(&account, &reset));
    }

    #[test]
    fn test_reset_token_single_use() {
        let tokens = service();
        let mut account = sample_account(6, Role::Rider);
        let reset = tokens.issue_password_reset_token(&account);

        account.password_hash = "pbkdf2_sha256$1000$othersalt$b3RoZXI=".to_string();
        assert!(!tokens.verify_password_reset_token(&account, &reset));
    }

    #[test]
    fn test_session_tokens() {
        let tokens = service();
        let account = sample_account(8, Role::Driver);
        let pair = tokens.issue_session_token(&account).unwrap();

        let claims = tokens.verify_session_token(&pair.access).unwrap();
        assert_eq!(claims.sub, 8);
        assert_eq!(claims.role, Role::Driver);
        assert_eq!(claims.token_type, TokenKind::Access);

        let refresh = tokens.verify_refresh_token(&pair.refresh).unwrap();
        assert_eq!(refresh.sfp, Some(tokens.session_fingerprint(&account)));
        assert_ne!(claims.jti, refresh.jti);
    }

    #[test]
    fn test_session_token_kind_is_enforced() {
        let tokens = service();
        let account = sample_account(9, Role::Rider);
        let pair = tokens.issue_session_token(&account).unwrap();

        assert_eq!(tokens.verify_session_token(&pair.refresh), Err(SessionError::Malformed));
        assert_eq!(tokens.verify_refresh_token(&pair.access), Err(SessionError::Malformed));
        assert!(tokens.verify_any(&pair.refresh).is_ok());
    }

    #[test]
    fn test_expired_session_token() {
        let tokens = TokenService::new(
            b"token-service-test-secret-0123456789",
            Duration::seconds(-30),
            Duration::days(1),
        )
        .unwrap();
        let access = tokens
            .issue_access_token(&sample_account(10, Role::Rider))
            .unwrap();

        assert_eq!(tokens.verify_session_token(&access), Err(SessionError::Expired));
    }

    #[test]
    fn test_session_fingerprint_follows_secret() {
        let tokens = service();
        let mut account = sample_account(11, Role::Rider);
        let before = tokens.session_fingerprint(&account);

        account.session_secret = Some(new_session_secret());
        assert_ne!(before, tokens.session_fingerprint(&account));
    }

    #[test]
    fn test_verify_session_fingerprint() {
        let tokens = service();
        let mut account = sample_account(12, Role::Driver);
        let sfp = tokens.session_fingerprint(&account);

        assert!(tokens.verify_session_fingerprint(&account, Some(&sfp)));
        assert!(!tokens.verify_session_fingerprint(&account, None));
        assert!(!tokens.verify_session_fingerprint(&account, Some("")));
        assert!(!tokens.verify_session_fingerprint(&account, Some(&sfp[..8])));

        account.session_secret = Some(new_session_secret());
        assert!(!tokens.verify_session_fingerprint(&account, Some(&sfp)));
    }
}
