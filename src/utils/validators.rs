//! Validation des champs d'entrée (inscription, profil, mots de passe)
//!
//! Chaque fonction renvoie la valeur normalisée ou une `AppError::Validation`
//! qui nomme le champ fautif.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::users::Gender;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$")
        .expect("hardcoded email regex is invalid")
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.@+-]{3,30}$").expect("hardcoded username regex is invalid")
});

// (+C)? AAA EEE LLLL, séparateurs espace ou tiret optionnels
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\+(\d{1,3}))?[ -]?(\d{3})[ -]?(\d{3})[ -]?(\d{4})$")
        .expect("hardcoded phone regex is invalid")
});

// "UTC", "Europe/Paris", "America/Argentina/Buenos_Aires", "Etc/GMT+3"
static TIMEZONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z_]*(?:/[A-Za-z0-9_+-]+){0,2}$")
        .expect("hardcoded timezone regex is invalid")
});

pub const DEFAULT_COUNTRY_CODE: &str = "1";

/// Email en minuscules, sans espaces autour
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || email.len() > 254 || !EMAIL_REGEX.is_match(&email) {
        return Err(AppError::field("email", "Enter a valid email address."));
    }
    Ok(email)
}

pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if !USERNAME_REGEX.is_match(username) {
        return Err(AppError::field(
            "username",
            "Username must be 3-30 characters: letters, digits and @/./+/-/_ only.",
        ));
    }
    Ok(username.to_string())
}

/// Normalise un numéro au format "+C AAA-EEE-LLLL" (indicatif 1 par défaut)
pub fn normalize_phone(phone: &str) -> Result<String> {
    let captures = PHONE_REGEX
        .captures(phone.trim())
        .ok_or_else(|| AppError::field("phone_number", "Invalid phone number format."))?;

    let country = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_COUNTRY_CODE);

    Ok(format!(
        "+{} {}-{}-{}",
        country, &captures[2], &captures[3], &captures[4]
    ))
}

/// Prénom / nom : au moins 3 lettres, rien d'autre
pub fn validate_name(field: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.chars().count() < 3 {
        return Err(AppError::field(field, "Must be at least 3 characters long."));
    }
    if !name.chars().all(char::is_alphabetic) {
        return Err(AppError::field(
            field,
            "Must only contain alphabetical characters.",
        ));
    }
    Ok(name.to_string())
}

/// Âge révolu à une date donnée
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Année entre 1900 et 2099, pas dans le futur, âge minimum optionnel
pub fn validate_date_of_birth(
    date_of_birth: NaiveDate,
    min_age: Option<u32>,
    today: NaiveDate,
) -> Result<NaiveDate> {
    if !(1900..=2099).contains(&date_of_birth.year()) {
        return Err(AppError::field(
            "date_of_birth",
            "The year in date of birth must start with 19 or 20.",
        ));
    }
    if date_of_birth > today {
        return Err(AppError::field(
            "date_of_birth",
            "Date of birth cannot be in the future.",
        ));
    }
    if let Some(min_age) = min_age {
        if age_on(date_of_birth, today) < min_age as i32 {
            return Err(AppError::field(
                "date_of_birth",
                format!("You must be at least {} years old.", min_age),
            ));
        }
    }
    Ok(date_of_birth)
}

pub fn parse_gender(gender: &str) -> Result<Gender> {
    gender
        .trim()
        .to_lowercase()
        .parse::<Gender>()
        .map_err(|msg| AppError::field("gender", msg))
}

pub fn validate_timezone(timezone: &str) -> Result<String> {
    let timezone = timezone.trim();
    if timezone.len() > 64 || !TIMEZONE_REGEX.is_match(timezone) {
        return Err(AppError::field("timezone", "Invalid timezone choice."));
    }
    Ok(timezone.to_string())
}

/// Au moins une majuscule, une minuscule, un chiffre et un caractère spécial
pub fn is_strong_password(password: &str) -> bool {
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    has_uppercase && has_lowercase && has_digit && has_special
}

/// Politique de mot de passe : longueur minimale + force optionnelle
pub fn validate_password(
    field: &str,
    password: &str,
    min_length: usize,
    require_strong: bool,
) -> Result<()> {
    if password.chars().count() < min_length {
        return Err(AppError::field(
            field,
            format!("Ensure this field has at least {} characters.", min_length),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::field(field, "This password is entirely numeric."));
    }
    if require_strong && !is_strong_password(password) {
        return Err(AppError::field(
            field,
            "Password must contain an uppercase letter, a lowercase letter, a digit and a special character.",
        ));
    }
    Ok(())
}

/// Champ texte optionnel : "" et espaces => None
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  John.Doe@Example.COM ").unwrap(), "john.doe@example.com");
        assert!(normalize_email("invalid").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("user@").is_err());
    }

    #[test]
    fn test_username() {
        assert_eq!(validate_username("john_doe").unwrap(), "john_doe");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("john doe").is_err());
    }

    #[test]
    fn test_phone_default_country() {
        assert_eq!(normalize_phone("123-456-7890").unwrap(), "+1 123-456-7890");
        assert_eq!(normalize_phone("1234567890").unwrap(), "+1 123-456-7890");
        assert_eq!(normalize_phone("123 456 7890").unwrap(), "+1 123-456-7890");
    }

    #[test]
    fn test_phone_with_country_is_idempotent() {
        assert_eq!(normalize_phone("+44 123 456 7890").unwrap(), "+44 123-456-7890");
        assert_eq!(normalize_phone("+1 123-456-7890").unwrap(), "+1 123-456-7890");
    }

    #[test]
    fn test_phone_rejected() {
        let err = normalize_phone("abc").unwrap_err();
        assert_eq!(err.to_string(), "phone_number: Invalid phone number format.");
        assert!(normalize_phone("12-345-6789").is_err());
        assert!(normalize_phone("+12345 123-456-7890").is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(validate_name("first_name", " John ").unwrap(), "John");
        assert_eq!(validate_name("first_name", "Zoé").unwrap(), "Zoé");
        assert!(validate_name("first_name", "Jo").is_err());
        assert!(validate_name("last_name", "D03").is_err());
        assert!(validate_name("last_name", "O'Neil").is_err());
    }

    #[test]
    fn test_date_of_birth_year_range() {
        let today = date(2026, 10, 18);
        assert!(validate_date_of_birth(date(1875, 1, 1), None, today).is_err());
        assert!(validate_date_of_birth(date(1995, 6, 1), None, today).is_ok());
        assert!(validate_date_of_birth(date(2030, 1, 1), None, today).is_err());
    }

    #[test]
    fn test_min_age_is_optional() {
        let today = date(2026, 10, 18);
        let teen = date(2010, 1, 1);

        assert!(validate_date_of_birth(teen, None, today).is_ok());
        assert!(validate_date_of_birth(teen, Some(18), today).is_err());
        assert!(validate_date_of_birth(date(2008, 10, 18), Some(18), today).is_ok());
        assert!(validate_date_of_birth(date(2008, 10, 19), Some(18), today).is_err());
    }

    #[test]
    fn test_age_on() {
        assert_eq!(age_on(date(2000, 6, 15), date(2026, 6, 14)), 25);
        assert_eq!(age_on(date(2000, 6, 15), date(2026, 6, 15)), 26);
    }

    #[test]
    fn test_gender() {
        assert_eq!(parse_gender("Female").unwrap(), Gender::Female);
        assert!(parse_gender("robot").is_err());
    }

    #[test]
    fn test_timezone() {
        assert!(validate_timezone("UTC").is_ok());
        assert!(validate_timezone("America/New_York").is_ok());
        assert!(validate_timezone("Etc/GMT+3").is_ok());
        assert!(validate_timezone("not a zone").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password("password", "abcd", 4, false).is_ok());
        assert!(validate_password("password", "abc", 4, false).is_err());
        assert!(validate_password("password", "12345678", 6, false).is_err());
        assert!(validate_password("password", "simplepass", 6, true).is_err());
        assert!(validate_password("password", "MyP@ssw0rd", 6, true).is_ok());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ")), Some("x"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
