// ============================================================================
// SERVICE : INSCRIPTION
// ============================================================================
//
// Description:
//   Création des comptes rider / driver / staff en statut "pending" puis
//   envoi (asynchrone) du lien d'activation.
//
// Étapes:
//   1. Validation des champs (normalisation email / téléphone, profil, image)
//   2. Pré-contrôle d'unicité email / username
//   3. Hash du mot de passe hors du runtime
//   4. Transaction : compte + fiches driver (fiche véhicule, compte bancaire)
//   5. Lien d'activation => file d'emails (fire-and-forget)
//
// Points d'attention:
//   - Le pré-contrôle ne suffit pas face à deux requêtes simultanées : c'est
//     la contrainte UNIQUE de la base qui tranche (DbErr => Conflict).
//   - Un échec d'envoi d'email n'annule jamais l'inscription.
//
// ============================================================================

use chrono::{NaiveDate, Utc};
use sea_orm::*;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::config::{BootstrapAdmin, Settings};
use crate::error::{AppError, DUPLICATE_ACCOUNT, Result};
use crate::models::dto::{
    DriverRegisterRequest, ImageUpload, ProfileFields, RegistrationData, RiderRegisterRequest,
    StaffRegisterRequest,
};
use crate::models::users::{self, AccountStatus, Entity as Users, Gender, Role};
use crate::models::{bank_accounts, driver_details};
use crate::services::mailer::{Mailer, OutboundEmail};
use crate::services::media::{MediaStore, ValidatedImage, validate_image};
use crate::services::token_service::{TokenService, new_session_secret};
use crate::utils::password;
use crate::utils::uid::encode_uid;
use crate::utils::validators::{
    non_blank, normalize_email, normalize_phone, parse_gender, validate_date_of_birth,
    validate_name, validate_password, validate_timezone, validate_username,
};

pub const PROFILE_IMAGE_FOLDER: &str = "profile_images";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const RESEND_ACTIVATION_MESSAGE: &str =
    "If a pending account exists for this email, a new activation link has been sent.";

/// Champs de profil validés
#[derive(Debug, Clone, Default)]
pub(crate) struct CleanProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
    pub timezone: Option<String>,
}

pub(crate) fn clean_profile(fields: &ProfileFields, min_age: Option<u32>) -> Result<CleanProfile> {
    let today = Utc::now().date_naive();

    Ok(CleanProfile {
        first_name: non_blank(fields.first_name.as_deref())
            .map(|name| validate_name("first_name", name))
            .transpose()?,
        last_name: non_blank(fields.last_name.as_deref())
            .map(|name| validate_name("last_name", name))
            .transpose()?,
        date_of_birth: fields
            .date_of_birth
            .map(|dob| validate_date_of_birth(dob, min_age, today))
            .transpose()?,
        gender: non_blank(fields.gender.as_deref())
            .map(parse_gender)
            .transpose()?,
        address: non_blank(fields.address.as_deref()).map(str::to_string),
        timezone: non_blank(fields.timezone.as_deref())
            .map(validate_timezone)
            .transpose()?,
    })
}

/// Compte prêt à être inséré. Le rôle décide des fiches créées avec lui.
struct AccountDraft {
    role: Role,
    email: String,
    username: Option<String>,
    password: String,
    phone_number: Option<String>,
    profile: CleanProfile,
    profile_image: Option<ValidatedImage>,
}

#[derive(Clone)]
pub struct RegistrationService {
    db: DatabaseConnection,
    tokens: Arc<TokenService>,
    settings: Arc<Settings>,
    mailer: Mailer,
    media: Arc<dyn MediaStore>,
}

impl RegistrationService {
    pub fn new(
        db: DatabaseConnection,
        tokens: Arc<TokenService>,
        settings: Arc<Settings>,
        mailer: Mailer,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            db,
            tokens,
            settings,
            mailer,
            media,
        }
    }

    pub async fn register_rider(&self, req: RiderRegisterRequest) -> Result<RegistrationData> {
        req.validate()?;

        if req.password != req.confirm_password {
            return Err(AppError::field("password", "Passwords must match."));
        }

        let draft = AccountDraft {
            role: Role::Rider,
            email: normalize_email(&req.email)?,
            username: Some(validate_username(&req.username)?),
            password: self.checked_password(Role::Rider, req.password)?,
            phone_number: Some(normalize_phone(&req.phone_number)?),
            profile: clean_profile(&req.profile, self.settings.registration.min_age)?,
            profile_image: checked_image(req.profile_image.as_ref())?,
        };

        self.create_account(draft).await
    }

    pub async fn register_driver(&self, req: DriverRegisterRequest) -> Result<RegistrationData> {
        req.validate()?;

        if let Some(confirm) = &req.confirm_password {
            if *confirm != req.password {
                return Err(AppError::field("password", "Passwords must match."));
            }
        }

        let draft = AccountDraft {
            role: Role::Driver,
            email: normalize_email(&req.email)?,
            username: non_blank(req.username.as_deref())
                .map(validate_username)
                .transpose()?,
            password: self.checked_password(Role::Driver, req.password)?,
            phone_number: non_blank(req.phone_number.as_deref())
                .map(normalize_phone)
                .transpose()?,
            profile: clean_profile(&req.profile, self.settings.registration.min_age)?,
            profile_image: checked_image(req.profile_image.as_ref())?,
        };

        self.create_account(draft).await
    }

    /// Compte manager (is_staff). L'appelant doit être superuser (vérifié par la route).
    pub async fn register_staff(&self, req: StaffRegisterRequest) -> Result<RegistrationData> {
        req.validate()?;

        let draft = AccountDraft {
            role: Role::Staff,
            email: normalize_email(&req.email)?,
            username: Some(validate_username(&req.username)?),
            password: self.checked_password(Role::Staff, req.password)?,
            phone_number: non_blank(req.phone_number.as_deref())
                .map(normalize_phone)
                .transpose()?,
            profile: clean_profile(&req.profile, self.settings.registration.min_age)?,
            profile_image: checked_image(req.profile_image.as_ref())?,
        };

        self.create_account(draft).await
    }

    /// Renvoie le lien d'activation d'un compte encore "pending".
    /// La réponse est la même que le compte existe ou non.
    pub async fn resend_activation(&self, email: &str) -> Result<()> {
        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };

        let account = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        match account {
            Some(account) if account.status == AccountStatus::Pending => {
                let url = self.activation_url(&account);
                self.mailer
                    .enqueue(OutboundEmail::activation(&account.email, &url));
                info!(user_id = account.id, "activation email re-sent");
            }
            _ => {}
        }

        Ok(())
    }

    /// {PUBLIC_BASE_URL}/api/v1/user/activate/{uidb64}/{token}/
    pub fn activation_url(&self, account: &users::Model) -> String {
        format!(
            "{}/api/v1/user/activate/{}/{}/",
            self.settings.registration.public_base_url,
            encode_uid(account.id),
            self.tokens.issue_activation_token(account)
        )
    }

    /// Crée le compte admin de démarrage s'il n'existe pas encore
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> Result<users::Model> {
        let email = normalize_email(&admin.email)?;

        if let Some(existing) = Users::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&self.db)
            .await?
        {
            if !existing.is_superuser {
                warn!(user_id = existing.id, "bootstrap admin email belongs to a non-superuser account");
            }
            return Ok(existing);
        }

        let password_hash = password::hash_in_background(
            admin.password.clone(),
            self.settings.security.password_hash_iterations,
        )
        .await?;

        let now = Utc::now();
        let account = users::ActiveModel {
            email: Set(email),
            username: Set(admin.username.clone()),
            password_hash: Set(password_hash),
            timezone: Set(DEFAULT_TIMEZONE.to_string()),
            role: Set(Role::Admin),
            status: Set(AccountStatus::Active),
            login_type: Set("email".to_string()),
            is_staff: Set(true),
            is_superuser: Set(true),
            is_active: Set(true),
            is_online: Set(false),
            email_verified_at: Set(Some(now)),
            session_secret: Set(Some(new_session_secret())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(user_id = account.id, "bootstrap admin account created");
        Ok(account)
    }

    fn checked_password(&self, role: Role, password: String) -> Result<String> {
        let policy = &self.settings.registration.password_policy;
        validate_password(
            "password",
            &password,
            policy.min_length_for(role),
            policy.require_strong_on_register,
        )?;
        Ok(password)
    }

    async fn ensure_unique(&self, email: &str, username: Option<&str>) -> Result<()> {
        let mut condition = Condition::any().add(users::Column::Email.eq(email));
        if let Some(username) = username {
            condition = condition.add(users::Column::Username.eq(username));
        }

        let taken = Users::find().filter(condition).count(&self.db).await?;
        if taken > 0 {
            return Err(AppError::Conflict(DUPLICATE_ACCOUNT.to_string()));
        }
        Ok(())
    }

    async fn create_account(&self, draft: AccountDraft) -> Result<RegistrationData> {
        self.ensure_unique(&draft.email, draft.username.as_deref())
            .await?;

        let password_hash = password::hash_in_background(
            draft.password,
            self.settings.security.password_hash_iterations,
        )
        .await?;

        let now = Utc::now();
        let role = draft.role;
        let profile = draft.profile;

        let txn = self.db.begin().await?;

        let user = users::ActiveModel {
            email: Set(draft.email),
            username: Set(draft.username),
            password_hash: Set(password_hash),
            first_name: Set(profile.first_name),
            last_name: Set(profile.last_name),
            phone_number: Set(draft.phone_number),
            date_of_birth: Set(profile.date_of_birth),
            gender: Set(profile.gender),
            address: Set(profile.address),
            profile_image: Set(None),
            timezone: Set(profile
                .timezone
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())),
            role: Set(role),
            status: Set(AccountStatus::Pending),
            login_type: Set("email".to_string()),
            is_staff: Set(role == Role::Staff),
            is_superuser: Set(false),
            is_active: Set(false),
            is_online: Set(false),
            fleet_id: Set(None),
            fcm_token: Set(None),
            email_verified_at: Set(None),
            session_secret: Set(Some(new_session_secret())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let (user_detail, bank_account) = if role == Role::Driver {
            let detail = driver_details::ActiveModel {
                user_id: Set(user.id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let bank = bank_accounts::ActiveModel {
                user_id: Set(user.id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            (Some(detail), Some(bank))
        } else {
            (None, None)
        };

        txn.commit().await?;

        info!(user_id = user.id, role = %role, "account registered");

        // Image écrite seulement une fois le compte en base : pas de fichier orphelin
        let user = match draft.profile_image {
            Some(image) => self.attach_profile_image(user, image).await,
            None => user,
        };

        let activation_url = self.activation_url(&user);
        self.mailer
            .enqueue(OutboundEmail::activation(&user.email, &activation_url));

        Ok(RegistrationData {
            user,
            user_detail,
            bank_account,
            activation_url: self
                .settings
                .registration
                .expose_activation_url
                .then_some(activation_url),
        })
    }

    /// Un échec de stockage n'annule pas l'inscription : le compte reste sans image
    async fn attach_profile_image(&self, user: users::Model, image: ValidatedImage) -> users::Model {
        let path = match self
            .media
            .put(PROFILE_IMAGE_FOLDER, image.extension, image.bytes)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "profile image not stored");
                return user;
            }
        };

        let mut active: users::ActiveModel = user.clone().into();
        active.profile_image = Set(Some(path));
        match active.update(&self.db).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "profile image path not saved");
                user
            }
        }
    }
}

fn checked_image(upload: Option<&ImageUpload>) -> Result<Option<ValidatedImage>> {
    upload
        .map(|upload| validate_image("profile_image", upload))
        .transpose()
}
