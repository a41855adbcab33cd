//! Credential hashing, session tokens and invitation delivery.

pub mod argon;
pub mod invitation;
#[cfg(feature = "auth-jwt")]
pub mod jwt;

pub use argon::Argon2PasswordHasher;
pub use invitation::LogInvitationNotifier;
#[cfg(feature = "auth-jwt")]
pub use jwt::{JwtAuthenticator, JwtConfig};
