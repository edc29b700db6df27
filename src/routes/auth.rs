use actix_web::cookie::{Cookie, SameSite, time};
use actix_web::{HttpResponse, post, web};
use serde_json::json;

use crate::config::Settings;
use crate::error::AppError;
use crate::middleware::auth::ACCESS_TOKEN_COOKIE;
use crate::models::dto::{LoginRequest, RefreshRequest, VerifyTokenRequest};
use crate::services::auth_service::AuthService;

/// POST /api/token/ - Se connecter (PUBLIC)
#[post("/")]
pub async fn login(
    body: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, AppError> {
    let session = auth.login(body.into_inner()).await?;

    let mut response = HttpResponse::Ok();
    if settings.security.session_cookie_enabled {
        let cookie = Cookie::build(ACCESS_TOKEN_COOKIE, session.access.clone())
            .path("/")
            .http_only(true)
            .secure(settings.security.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(
                settings.security.access_token_ttl.num_seconds(),
            ))
            .finish();
        response.cookie(cookie);
    }

    Ok(response.json(session))
}

/// POST /api/token/refresh/ - Nouveau access token (PUBLIC)
#[post("/refresh/")]
pub async fn refresh(
    body: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let access = auth.refresh(&body.refresh).await?;
    Ok(HttpResponse::Ok().json(json!({ "access": access })))
}

/// POST /api/token/verify/ - Jeton encore valable ? (PUBLIC)
#[post("/verify/")]
pub async fn verify(
    body: web::Json<VerifyTokenRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.verify(&body.token).await?;
    Ok(HttpResponse::Ok().json(json!({})))
}

pub fn token_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/token")
            .service(login)
            .service(refresh)
            .service(verify),
    );
}
