pub mod jwt;
pub mod password;
pub mod uid;
pub mod validators;
