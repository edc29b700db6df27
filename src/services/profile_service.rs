// ============================================================================
// SERVICE : PROFIL ET FICHES DRIVER
// ============================================================================
//
// Description:
//   Lecture / mise à jour du profil du compte connecté, photo de profil,
//   fiche véhicule et compte bancaire des drivers.
//
// Points d'attention:
//   - Mêmes validateurs qu'à l'inscription (nom, téléphone, date de naissance)
//   - PUT sur les fiches driver = remplacement complet (champ absent => vidé)
//   - Fiches driver réservées au rôle driver (403 sinon)
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::models::dto::{BankAccountRequest, DriverDetailRequest, ImageUpload, UpdateProfileRequest};
use crate::models::users::{self, Entity as Users, Role};
use crate::models::{bank_accounts, driver_details};
use crate::services::media::{MediaStore, validate_image};
use crate::services::registration::{PROFILE_IMAGE_FOLDER, clean_profile};
use crate::utils::validators::{non_blank, normalize_phone};

pub const DRIVERS_ONLY: &str = "Only driver accounts have driver records.";

#[derive(Clone)]
pub struct ProfileService {
    db: DatabaseConnection,
    settings: Arc<Settings>,
    media: Arc<dyn MediaStore>,
}

impl ProfileService {
    pub fn new(db: DatabaseConnection, settings: Arc<Settings>, media: Arc<dyn MediaStore>) -> Self {
        Self { db, settings, media }
    }

    pub async fn get_profile(&self, account_id: i32) -> Result<users::Model> {
        Users::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
    }

    /// Mise à jour partielle : seuls les champs présents sont modifiés
    pub async fn update_profile(
        &self,
        account_id: i32,
        req: UpdateProfileRequest,
    ) -> Result<users::Model> {
        let profile = clean_profile(&req.profile, self.settings.registration.min_age)?;
        let phone_number = non_blank(req.phone_number.as_deref())
            .map(normalize_phone)
            .transpose()?;

        let account = self.get_profile(account_id).await?;
        let mut active: users::ActiveModel = account.into();

        if let Some(first_name) = profile.first_name {
            active.first_name = Set(Some(first_name));
        }
        if let Some(last_name) = profile.last_name {
            active.last_name = Set(Some(last_name));
        }
        if let Some(date_of_birth) = profile.date_of_birth {
            active.date_of_birth = Set(Some(date_of_birth));
        }
        if let Some(gender) = profile.gender {
            active.gender = Set(Some(gender));
        }
        if let Some(address) = profile.address {
            active.address = Set(Some(address));
        }
        if let Some(timezone) = profile.timezone {
            active.timezone = Set(timezone);
        }
        if let Some(phone_number) = phone_number {
            active.phone_number = Set(Some(phone_number));
        }
        if let Some(fcm_token) = req.fcm_token {
            active.fcm_token = Set(non_blank(Some(&fcm_token)).map(str::to_string));
        }
        active.updated_at = Set(Utc::now());

        let account = active.update(&self.db).await?;
        info!(user_id = account.id, "profile updated");
        Ok(account)
    }

    pub async fn set_profile_image(
        &self,
        account_id: i32,
        upload: &ImageUpload,
    ) -> Result<users::Model> {
        let image = validate_image("profile_image", upload)?;
        let account = self.get_profile(account_id).await?;

        let path = self
            .media
            .put(PROFILE_IMAGE_FOLDER, image.extension, image.bytes)
            .await?;

        let mut active: users::ActiveModel = account.into();
        active.profile_image = Set(Some(path));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    // ------------------------------------------------------------------
    // Fiches driver
    // ------------------------------------------------------------------

    pub async fn get_driver_detail(&self, account_id: i32) -> Result<driver_details::Model> {
        self.ensure_driver(account_id).await?;

        driver_details::Entity::find()
            .filter(driver_details::Column::UserId.eq(account_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Driver detail not found.".to_string()))
    }

    pub async fn update_driver_detail(
        &self,
        account_id: i32,
        req: DriverDetailRequest,
    ) -> Result<driver_details::Model> {
        req.validate()?;
        check_coordinates("work", req.work_latitude, req.work_longitude)?;
        check_coordinates("home", req.home_latitude, req.home_longitude)?;
        self.ensure_driver(account_id).await?;

        let now = Utc::now();
        let existing = driver_details::Entity::find()
            .filter(driver_details::Column::UserId.eq(account_id))
            .one(&self.db)
            .await?;

        let mut active = match existing {
            Some(detail) => detail.into(),
            None => driver_details::ActiveModel {
                user_id: Set(account_id),
                created_at: Set(now),
                ..Default::default()
            },
        };

        active.car_model = Set(text(req.car_model));
        active.car_color = Set(text(req.car_color));
        active.car_plate_number = Set(text(req.car_plate_number));
        active.car_production_year = Set(req.car_production_year);
        active.work_address = Set(text(req.work_address));
        active.work_latitude = Set(req.work_latitude);
        active.work_longitude = Set(req.work_longitude);
        active.home_address = Set(text(req.home_address));
        active.home_latitude = Set(req.home_latitude);
        active.home_longitude = Set(req.home_longitude);
        active.updated_at = Set(now);

        let detail = active.save(&self.db).await?.try_into_model()?;
        info!(user_id = account_id, "driver detail updated");
        Ok(detail)
    }

    pub async fn get_bank_account(&self, account_id: i32) -> Result<bank_accounts::Model> {
        self.ensure_driver(account_id).await?;

        bank_accounts::Entity::find()
            .filter(bank_accounts::Column::UserId.eq(account_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Bank account not found.".to_string()))
    }

    pub async fn update_bank_account(
        &self,
        account_id: i32,
        req: BankAccountRequest,
    ) -> Result<bank_accounts::Model> {
        req.validate()?;
        let bank_phone_number = non_blank(req.bank_phone_number.as_deref())
            .map(normalize_phone)
            .transpose()
            .map_err(|_| AppError::field("bank_phone_number", "Invalid phone number format."))?;
        self.ensure_driver(account_id).await?;

        let now = Utc::now();
        let existing = bank_accounts::Entity::find()
            .filter(bank_accounts::Column::UserId.eq(account_id))
            .one(&self.db)
            .await?;

        let mut active = match existing {
            Some(bank) => bank.into(),
            None => bank_accounts::ActiveModel {
                user_id: Set(account_id),
                created_at: Set(now),
                ..Default::default()
            },
        };

        active.bank_name = Set(text(req.bank_name));
        active.bank_code = Set(text(req.bank_code));
        active.bank_address = Set(text(req.bank_address));
        active.bank_phone_number = Set(bank_phone_number);
        active.account_holder_name = Set(text(req.account_holder_name));
        active.account_number = Set(text(req.account_number));
        active.updated_at = Set(now);

        let bank = active.save(&self.db).await?.try_into_model()?;
        info!(user_id = account_id, "bank account updated");
        Ok(bank)
    }

    async fn ensure_driver(&self, account_id: i32) -> Result<()> {
        let account = self.get_profile(account_id).await?;
        if account.role != Role::Driver {
            return Err(AppError::Forbidden(DRIVERS_ONLY.to_string()));
        }
        Ok(())
    }
}

fn text(value: Option<String>) -> Option<String> {
    non_blank(value.as_deref()).map(str::to_string)
}

fn check_coordinates(prefix: &str, latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
    if let Some(latitude) = latitude {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::field(
                &format!("{}_latitude", prefix),
                "Latitude must be between -90 and 90.",
            ));
        }
    }
    if let Some(longitude) = longitude {
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::field(
                &format!("{}_longitude", prefix),
                "Longitude must be between -180 and 180.",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dto::ProfileFields;
    use crate::models::users::AccountStatus;
    use crate::services::media::png_upload;
    use crate::test_support::{TestContext, insert_account};

    #[tokio::test]
    async fn test_update_profile() {
        let ctx = TestContext::new().await;
        let account =
            insert_account(&ctx.db, "p@example.com", Role::Rider, AccountStatus::Active).await;

        let updated = ctx
            .services
            .profile
            .update_profile(
                account.id,
                UpdateProfileRequest {
                    profile: ProfileFields {
                        first_name: Some("Marie".to_string()),
                        timezone: Some("Europe/Paris".to_string()),
                        ..Default::default()
                    },
                    phone_number: Some("555 123 4567".to_string()),
                    fcm_token: Some("fcm-abc".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name.as_deref(), Some("Marie"));
        assert_eq!(updated.phone_number.as_deref(), Some("+1 555-123-4567"));
        assert_eq!(updated.timezone, "Europe/Paris");
        assert_eq!(updated.fcm_token.as_deref(), Some("fcm-abc"));
        assert_eq!(updated.email, account.email);
    }

    #[tokio::test]
    async fn test_update_profile_rejects_bad_input() {
        let ctx = TestContext::new().await;
        let account =
            insert_account(&ctx.db, "bad@example.com", Role::Rider, AccountStatus::Active).await;

        let err = ctx
            .services
            .profile
            .update_profile(
                account.id,
                UpdateProfileRequest {
                    phone_number: Some("abc".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "phone_number: Invalid phone number format.");
    }

    #[tokio::test]
    async fn test_profile_image() {
        let ctx = TestContext::new().await;
        let account =
            insert_account(&ctx.db, "img@example.com", Role::Rider, AccountStatus::Active).await;

        let updated = ctx
            .services
            .profile
            .set_profile_image(account.id, &png_upload(200, 200))
            .await
            .unwrap();
        let path = updated.profile_image.unwrap();
        assert!(ctx.media_root.join(path).exists());

        assert!(
            ctx.services
                .profile
                .set_profile_image(account.id, &png_upload(10, 10))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_driver_records() {
        let ctx = TestContext::new().await;
        let driver =
            insert_account(&ctx.db, "d@example.com", Role::Driver, AccountStatus::Active).await;
        let profile = &ctx.services.profile;

        let detail = profile
            .update_driver_detail(
                driver.id,
                DriverDetailRequest {
                    car_model: Some("Prius".to_string()),
                    car_production_year: Some(2019),
                    work_latitude: Some(48.85),
                    work_longitude: Some(2.35),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(detail.car_model.as_deref(), Some("Prius"));
        assert_eq!(profile.get_driver_detail(driver.id).await.unwrap(), detail);

        let err = profile
            .update_driver_detail(
                driver.id,
                DriverDetailRequest {
                    home_latitude: Some(123.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("home_latitude:"));

        let bank = profile
            .update_bank_account(
                driver.id,
                BankAccountRequest {
                    bank_name: Some("Credit Union".to_string()),
                    account_number: Some("FR7630006000011234567890189".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(bank.user_id, driver.id);
        assert!(
            profile
                .update_bank_account(
                    driver.id,
                    BankAccountRequest {
                        account_number: Some("12".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_driver_records_forbidden_for_riders() {
        let ctx = TestContext::new().await;
        let rider =
            insert_account(&ctx.db, "r@example.com", Role::Rider, AccountStatus::Active).await;

        assert!(matches!(
            ctx.services.profile.get_driver_detail(rider.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ctx.services.profile.get_bank_account(rider.id).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
