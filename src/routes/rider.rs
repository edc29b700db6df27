use actix_web::{HttpResponse, post, web};

use crate::error::AppError;
use crate::models::dto::RiderRegisterRequest;
use crate::routes::registered;
use crate::services::registration::RegistrationService;

/// POST /api/v1/rider/register/ - Inscription rider (PUBLIC)
#[post("/register/")]
pub async fn register(
    body: web::Json<RiderRegisterRequest>,
    registration: web::Data<RegistrationService>,
) -> Result<HttpResponse, AppError> {
    let data = registration.register_rider(body.into_inner()).await?;
    Ok(registered("User registered successfully.", data))
}

pub fn rider_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/rider").service(register));
}
