use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use tower_sessions::cookie::Key;

use crate::auth::Provider;

pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const USER: &str = "user";

/// The signed-in user, as stored in the session by the OAuth callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    /// Stable across providers when the provider tells us an email address.
    pub unique_id: String,
    pub name: String,
    pub email: Option<String>,
    /// Profile picture URL handed to us by the provider.
    pub picture: Option<String>,
    pub provider: Provider,
}

impl ChatUser {
    pub fn new(
        provider: Provider,
        provider_id: &str,
        name: String,
        email: Option<String>,
        picture: Option<String>,
    ) -> ChatUser {
        let email = email.filter(|e| !e.trim().is_empty());
        let unique_id = match &email {
            Some(email) => email_hash(email),
            None => format!("{}-{provider_id}", provider.slug()),
        };

        ChatUser {
            unique_id,
            name,
            email,
            picture: picture.filter(|p| !p.is_empty()),
            provider,
        }
    }
}

/// Lowercase hex SHA-256 of the trimmed, lowercased address.
pub fn email_hash(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!("{digest:x}")
}

/// Cookie signing key derived from the configured security key. Any length of
/// security key works, the digest is always the 64 bytes `Key` wants.
pub fn signing_key(security_key: &str) -> Key {
    Key::from(Sha512::digest(security_key.as_bytes()).as_slice())
}
