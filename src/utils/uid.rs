use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Encode l'id d'un compte pour les liens envoyés par email (uidb64)
pub fn encode_uid(id: i32) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Décode un uidb64. Toute entrée illisible donne None.
pub fn decode_uid(uidb64: &str) -> Option<i32> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.parse::<i32>().ok().filter(|id| *id > 0)
}
