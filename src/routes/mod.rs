pub mod admin;
pub mod auth;
pub mod driver;
pub mod health;
pub mod rider;
pub mod user;

use actix_web::{HttpResponse, web};
use serde_json::json;

use crate::error::AppError;
use crate::models::dto::RegistrationData;

pub fn configure_routes(cfg: &mut web::ServiceConfig, blacklist_enabled: bool) {
    cfg.app_data(json_config()).service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::token_routes)
            .service(
                web::scope("/v1")
                    .configure(rider::rider_routes)
                    .configure(driver::driver_routes)
                    .service(
                        web::scope("/user")
                            .configure(|cfg| user::user_routes(cfg, blacklist_enabled))
                            .configure(admin::admin_routes),
                    ),
            ),
    );
}

/// Corps JSON illisible => 400 avec le format d'erreur commun
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(4 * 1024 * 1024)
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

/// Réponse 201 commune aux inscriptions
pub(crate) fn registered(message: &str, data: RegistrationData) -> HttpResponse {
    HttpResponse::Created().json(json!({
        "status": "success",
        "message": message,
        "data": data,
    }))
}
