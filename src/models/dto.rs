// Requêtes / réponses de l'API (pour la réponse structurée)
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{bank_accounts, driver_details, users};

// ----------------------------------------------------------------------------
// Inscription
// ----------------------------------------------------------------------------

/// Image de profil envoyée en JSON (contenu encodé en base64)
#[derive(Debug, Clone, Deserialize)]
pub struct ImageUpload {
    pub content_type: String,
    pub data: String,
}

/// Champs de profil libres, validés uniquement à l'entrée
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RiderRegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub profile_image: Option<ImageUpload>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DriverRegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    pub username: Option<String>,
    pub password: String,
    pub confirm_password: Option<String>,
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub profile_image: Option<ImageUpload>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StaffRegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,
    pub password: String,
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub profile_image: Option<ImageUpload>,
}

#[derive(Debug, Serialize)]
pub struct RegistrationData {
    pub user: users::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_detail: Option<driver_details::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<bank_accounts::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

// ----------------------------------------------------------------------------
// Authentification / sessions
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: users::Model,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: Option<String>,
    pub password2: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub new_password: String,
    pub confirm_password: String,
}

// ----------------------------------------------------------------------------
// Profil / side records
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub phone_number: Option<String>,
    pub fcm_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DriverDetailRequest {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub car_model: Option<String>,
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub car_color: Option<String>,
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub car_plate_number: Option<String>,
    #[validate(range(min = 1950, max = 2100, message = "Invalid production year."))]
    pub car_production_year: Option<i32>,
    pub work_address: Option<String>,
    pub work_latitude: Option<f64>,
    pub work_longitude: Option<f64>,
    pub home_address: Option<String>,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BankAccountRequest {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub bank_name: Option<String>,
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub bank_code: Option<String>,
    pub bank_address: Option<String>,
    pub bank_phone_number: Option<String>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub account_holder_name: Option<String>,
    #[validate(length(min = 4, max = 34, message = "Account number must be between 4 and 34 characters."))]
    pub account_number: Option<String>,
}

// ----------------------------------------------------------------------------
// Administration
// ----------------------------------------------------------------------------

/// Filtres du listing admin. Tout est lu en texte pour reproduire les
/// replis tolérants (per_page invalide => taille par défaut).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListUsersQuery {
    #[serde(alias = "user_type")]
    pub role: Option<String>,
    pub fleet_id: Option<String>,
    pub is_online: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub total_items: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub results: Vec<T>,
    pub pagination: PaginationMeta,
}
