use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use futures::future::{Ready, ready};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::users::Role;
use crate::services::token_service::TokenService;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Infos de l'utilisateur authentifié (lues dans l'access token)
/// Utilisée comme extracteur dans les routes protégées
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl AuthUser {
    pub fn is_privileged(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Jeton de la requête : header "Authorization: Bearer <token>", sinon cookie
fn extract_token(req: &HttpRequest) -> Result<String, AppError> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AppError::Unauthenticated("Invalid Authorization header".to_string()))?;

        return value
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Unauthenticated(
                    "Invalid Authorization format (expected: Bearer <token>)".to_string(),
                )
            });
    }

    req.cookie(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            AppError::Unauthenticated("Authentication credentials were not provided.".to_string())
        })
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let tokens = req
        .app_data::<web::Data<TokenService>>()
        .ok_or_else(|| AppError::Internal("TokenService is not registered".to_string()))?;

    let token = extract_token(req)?;
    let claims = tokens
        .verify_session_token(&token)
        .map_err(|e| AppError::Unauthenticated(e.to_string()))?;

    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
        is_staff: claims.staff,
        is_superuser: claims.superuser,
    })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

/// Utilisateur authentifié avec is_staff ou is_superuser (403 sinon)
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthUser);

impl FromRequest for StaffUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).and_then(|user| {
            if user.is_privileged() {
                Ok(StaffUser(user))
            } else {
                Err(AppError::Forbidden(
                    "You do not have permission to perform this action.".to_string(),
                ))
            }
        }))
    }
}
