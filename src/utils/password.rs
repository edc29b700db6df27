use base64::{Engine, engine::general_purpose::STANDARD};
use pbkdf2::pbkdf2_hmac;
use rand::{Rng, distributions::Alphanumeric};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

const ALGORITHM: &str = "pbkdf2_sha256";
const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 22;

pub const DEFAULT_ITERATIONS: u32 = 600_000;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PasswordError {
    #[error("unsupported password hash algorithm")]
    UnsupportedAlgorithm,

    #[error("malformed password hash")]
    Malformed,
}

/// Hash un mot de passe au format Django (compatible avec les comptes existants)
/// Format: pbkdf2_sha256$iterations$salt$hash_base64
pub fn hash_password(password: &str, iterations: u32) -> String {
    // Salt alphanumérique de 22 caractères, comme Django
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect();

    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);

    format!("{}${}${}${}", ALGORITHM, iterations, salt, STANDARD.encode(key))
}

/// Vérifie un mot de passe contre un hash stocké
/// Le nombre d'itérations est lu dans le hash (les anciens comptes gardent le leur)
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 4 {
        return Err(PasswordError::Malformed);
    }

    if parts[0] != ALGORITHM {
        return Err(PasswordError::UnsupportedAlgorithm);
    }

    let iterations = parts[1]
        .parse::<u32>()
        .map_err(|_| PasswordError::Malformed)?;
    if iterations == 0 {
        return Err(PasswordError::Malformed);
    }

    let salt = parts[2];
    let expected = STANDARD
        .decode(parts[3])
        .map_err(|_| PasswordError::Malformed)?;
    if expected.is_empty() {
        return Err(PasswordError::Malformed);
    }

    let mut computed = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut computed);

    // Comparaison en temps constant
    Ok(computed.ct_eq(&expected).into())
}

/// Hash hors du runtime async (PBKDF2 est volontairement lent)
pub async fn hash_in_background(
    password: String,
    iterations: u32,
) -> Result<String, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || hash_password(&password, iterations)).await
}

/// Vérification hors du runtime async. Un hash illisible compte comme un échec.
pub async fn verify_in_background(
    password: String,
    stored_hash: String,
) -> Result<bool, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || match verify_password(&password, &stored_hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash could not be parsed");
            false
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret-pass", TEST_ITERATIONS);

        assert!(hash.starts_with("pbkdf2_sha256$1000$"));
        assert_eq!(verify_password("s3cret-pass", &hash), Ok(true));
        assert_eq!(verify_password("wrong-pass", &hash), Ok(false));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same", TEST_ITERATIONS);
        let b = hash_password("same", TEST_ITERATIONS);
        assert_ne!(a, b);
    }

    #[test]
    fn test_iterations_read_from_hash() {
        let hash = hash_password("legacy", 1_500);
        assert_eq!(verify_password("legacy", &hash), Ok(true));
    }

    #[test]
    fn test_malformed_hash() {
        assert_eq!(verify_password("x", "not-a-hash"), Err(PasswordError::Malformed));
        assert_eq!(
            verify_password("x", "pbkdf2_sha256$abc$salt$aGFzaA=="),
            Err(PasswordError::Malformed)
        );
        assert_eq!(
            verify_password("x", "pbkdf2_sha256$1000$salt$***"),
            Err(PasswordError::Malformed)
        );
    }

    #[test]
    fn test_unsupported_algorithm() {
        assert_eq!(
            verify_password("x", "bcrypt$12$salt$aGFzaA=="),
            Err(PasswordError::UnsupportedAlgorithm)
        );
    }

    #[tokio::test]
    async fn test_background_helpers() {
        let hash = hash_in_background("bg-pass".to_string(), TEST_ITERATIONS)
            .await
            .unwrap();
        assert!(verify_in_background("bg-pass".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_in_background("nope".to_string(), hash).await.unwrap());
        assert!(!verify_in_background("x".to_string(), "garbage".to_string()).await.unwrap());
    }
}
