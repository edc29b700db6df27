use actix_web::{HttpResponse, get, post, put, web};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{BankAccountRequest, DriverDetailRequest, DriverRegisterRequest};
use crate::routes::registered;
use crate::services::profile_service::ProfileService;
use crate::services::registration::RegistrationService;

/// POST /api/v1/driver/register/ - Inscription driver + fiches vides (PUBLIC)
#[post("/register/")]
pub async fn register(
    body: web::Json<DriverRegisterRequest>,
    registration: web::Data<RegistrationService>,
) -> Result<HttpResponse, AppError> {
    let data = registration.register_driver(body.into_inner()).await?;
    Ok(registered("User registered successfully.", data))
}

#[get("/detail/")]
pub async fn get_detail(
    auth_user: AuthUser,
    profile: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let detail = profile.get_driver_detail(auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[put("/detail/")]
pub async fn update_detail(
    auth_user: AuthUser,
    body: web::Json<DriverDetailRequest>,
    profile: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let detail = profile
        .update_driver_detail(auth_user.user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[get("/bank-account/")]
pub async fn get_bank_account(
    auth_user: AuthUser,
    profile: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let bank = profile.get_bank_account(auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(bank))
}

#[put("/bank-account/")]
pub async fn update_bank_account(
    auth_user: AuthUser,
    body: web::Json<BankAccountRequest>,
    profile: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let bank = profile
        .update_bank_account(auth_user.user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(bank))
}

pub fn driver_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/driver")
            .service(register)
            .service(get_detail)
            .service(update_detail)
            .service(get_bank_account)
            .service(update_bank_account),
    );
}
