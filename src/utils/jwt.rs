use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::users::Role;

/// Type de jeton de session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,           // user_id
    pub role: Role,
    pub staff: bool,
    pub superuser: bool,
    pub token_type: TokenKind,
    pub jti: String,        // identifiant unique (blacklist)
    pub iat: i64,
    pub exp: i64,           // expiration timestamp
    /// Empreinte du session_secret du compte (refresh tokens uniquement)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sfp: Option<String>,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Token has expired.")]
    Expired,

    #[error("Token is invalid.")]
    Malformed,

    #[error("Token has been revoked.")]
    Revoked,
}

/// Signe des claims en HS256
pub fn encode_claims(secret: &[u8], claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Vérifie la signature et l'expiration, puis décode les claims
pub fn decode_claims(secret: &[u8], token: &str) -> Result<Claims, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Malformed,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const SECRET: &[u8] = b"jwt-test-secret-jwt-test-secret!";

    fn claims(exp_offset: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub: 123,
            role: Role::Rider,
            staff: false,
            superuser: false,
            token_type: TokenKind::Access,
            jti: "abc".to_string(),
            iat: now.timestamp(),
            exp: (now + exp_offset).timestamp(),
            sfp: None,
        }
    }

    #[test]
    fn test_encode_and_decode() {
        let original = claims(Duration::hours(1));
        let token = encode_claims(SECRET, &original).unwrap();
        let decoded = decode_claims(SECRET, &token).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(decode_claims(SECRET, "invalid.token.here"), Err(SessionError::Malformed));
    }

    #[test]
    fn test_wrong_secret() {
        let token = encode_claims(SECRET, &claims(Duration::hours(1))).unwrap();
        assert_eq!(
            decode_claims(b"another-secret-another-secret!!!", &token),
            Err(SessionError::Malformed)
        );
    }

    #[test]
    fn test_expired_token() {
        let token = encode_claims(SECRET, &claims(Duration::minutes(-5))).unwrap();
        assert_eq!(decode_claims(SECRET, &token), Err(SessionError::Expired));
    }
}
