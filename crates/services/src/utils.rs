//! Invitation token helpers.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A fresh, unguessable plaintext activation token.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// Hex SHA-256 of a plaintext token. Only this value is ever persisted.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
