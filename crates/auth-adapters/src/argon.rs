//! Argon2id password hashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use domains::{DomainError, PasswordHasher, Result};
use tokio::task;

/// Produces PHC strings (`$argon2id$v=19$...`) with a fresh random salt per
/// hash, so the store never sees a plaintext password.
///
/// Both directions run on the blocking pool.
#[derive(Default)]
pub struct Argon2PasswordHasher {
    argon: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

fn hash_blocking(argon: &Argon2<'_>, plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::internal(format!("password hashing failed: {e}")))
}

/// A malformed stored hash verifies as `false`, never as an error.
fn verify_blocking(argon: &Argon2<'_>, plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => argon.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<String> {
        let argon = self.argon.clone();
        let plaintext = plaintext.to_owned();
        task::spawn_blocking(move || hash_blocking(&argon, &plaintext))
            .await
            .map_err(|e| DomainError::internal(format!("password hashing task failed: {e}")))?
    }

    async fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let argon = self.argon.clone();
        let (plaintext, hash) = (plaintext.to_owned(), hash.to_owned());
        match task::spawn_blocking(move || verify_blocking(&argon, &plaintext, &hash)).await {
            Ok(verified) => verified,
            Err(e) => {
                tracing::error!(error = %e, "password verification task failed");
                false
            }
        }
    }
}
