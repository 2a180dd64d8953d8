//! obs-websocket 4.x challenge response.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

/// `base64(sha256(password + salt))`.
fn secret(password: &str, salt: &str) -> String {
    STANDARD.encode(Sha256::digest(format!("{password}{salt}")))
}

/// Value for the `auth` field of an `Authenticate` request.
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = secret(password, salt);
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_of_empty_input() {
        assert_eq!(
            secret("", ""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn response_depends_on_challenge() {
        let a = auth_response("pw", "salt", "one");
        let b = auth_response("pw", "salt", "two");
        assert_ne!(a, b);
        assert_eq!(a.len(), 44);
        assert_eq!(a, auth_response("pw", "salt", "one"));
    }
}
