use actix_web::{HttpResponse, delete, get, patch, post, put, web};
use serde_json::json;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{
    ChangePasswordRequest, DeleteAccountRequest, EmailRequest, ImageUpload, LogoutRequest,
    PasswordResetConfirmRequest, StaffRegisterRequest, UpdateProfileRequest,
};
use crate::routes::registered;
use crate::services::auth_service::{AuthService, PASSWORD_RESET_MESSAGE};
use crate::services::lifecycle::{ActivationOutcome, LifecycleManager};
use crate::services::profile_service::ProfileService;
use crate::services::registration::{RESEND_ACTIVATION_MESSAGE, RegistrationService};

/// POST /api/v1/user/register/manager/ - Compte staff (SUPERUSER)
#[post("/register/manager/")]
pub async fn register_manager(
    auth_user: AuthUser,
    body: web::Json<StaffRegisterRequest>,
    registration: web::Data<RegistrationService>,
) -> Result<HttpResponse, AppError> {
    if !auth_user.is_superuser {
        return Err(AppError::Forbidden(
            "Only administrators can register managers.".to_string(),
        ));
    }

    let data = registration.register_staff(body.into_inner()).await?;
    Ok(registered("User registered successfully.", data))
}

/// GET /api/v1/user/activate/{uidb64}/{token}/ - Lien reçu par email (PUBLIC)
#[get("/activate/{uidb64}/{token}/")]
pub async fn activate(
    path: web::Path<(String, String)>,
    lifecycle: web::Data<LifecycleManager>,
) -> Result<HttpResponse, AppError> {
    let (uidb64, token) = path.into_inner();

    let message = match lifecycle.activate(&uidb64, &token).await? {
        ActivationOutcome::Activated(_) => "Account activated successfully.",
        ActivationOutcome::AlreadyActivated => "Account already activated.",
    };

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": message,
    })))
}

/// POST /api/v1/user/activate/resend/ (PUBLIC)
#[post("/activate/resend/")]
pub async fn resend_activation(
    body: web::Json<EmailRequest>,
    registration: web::Data<RegistrationService>,
) -> Result<HttpResponse, AppError> {
    registration.resend_activation(&body.email).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": RESEND_ACTIVATION_MESSAGE })))
}

/// POST /api/v1/user/change-password/ (PROTÉGÉE)
#[post("/change-password/")]
pub async fn change_password(
    auth_user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let account = auth.change_password(auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(account))
}

/// DELETE /api/v1/user/delete/ - Suppression définitive (PROTÉGÉE)
#[delete("/delete/")]
pub async fn delete_account(
    auth_user: AuthUser,
    body: Option<web::Json<DeleteAccountRequest>>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    auth.delete_account(auth_user.user_id, body).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/v1/user/logout/ - Blacklist du refresh token (PROTÉGÉE)
#[post("/logout/")]
pub async fn logout(
    auth_user: AuthUser,
    body: web::Json<LogoutRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.logout(auth_user.user_id, &body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "User logged out successfully." })))
}

/// POST /api/v1/user/password-reset/ (PUBLIC)
#[post("/password-reset/")]
pub async fn request_password_reset(
    body: web::Json<EmailRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.request_password_reset(&body.email).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": PASSWORD_RESET_MESSAGE })))
}

/// POST /api/v1/user/password-reset/{uidb64}/{token}/ (PUBLIC)
#[post("/password-reset/{uidb64}/{token}/")]
pub async fn confirm_password_reset(
    path: web::Path<(String, String)>,
    body: web::Json<PasswordResetConfirmRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let (uidb64, token) = path.into_inner();
    auth.reset_password(&uidb64, &token, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password has been reset." })))
}

/// GET /api/v1/user/me/ (PROTÉGÉE)
#[get("/me/")]
pub async fn me(
    auth_user: AuthUser,
    profile: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let account = profile.get_profile(auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(account))
}

/// PATCH /api/v1/user/me/ (PROTÉGÉE)
#[patch("/me/")]
pub async fn update_me(
    auth_user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    profile: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let account = profile
        .update_profile(auth_user.user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(account))
}

/// PUT /api/v1/user/me/profile-image/ (PROTÉGÉE)
#[put("/me/profile-image/")]
pub async fn upload_profile_image(
    auth_user: AuthUser,
    body: web::Json<ImageUpload>,
    profile: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let account = profile.set_profile_image(auth_user.user_id, &body).await?;
    Ok(HttpResponse::Ok().json(account))
}

/// Routes /user hors administration. Le logout n'existe que si la
/// blacklist est activée.
pub fn user_routes(cfg: &mut web::ServiceConfig, blacklist_enabled: bool) {
    cfg.service(register_manager)
        .service(activate)
        .service(resend_activation)
        .service(change_password)
        .service(delete_account)
        .service(request_password_reset)
        .service(confirm_password_reset)
        .service(me)
        .service(update_me)
        .service(upload_profile_image);

    if blacklist_enabled {
        cfg.service(logout);
    }
}
