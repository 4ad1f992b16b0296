pub mod password;

pub use password::{hash_password, verify_password, Password, PasswordHashString};

use rand::Rng;

/// Opaque access token: 32 bytes of CSPRNG entropy, hex-encoded so the
/// result is URL-safe. Its meaning is the session blob stored against it;
/// nothing about the string itself is verifiable.
pub fn generate_opaque_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_tokens_are_unique_and_url_safe() {
        let first = generate_opaque_token();
        let second = generate_opaque_token();
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
