//! # services
//!
//! Business workflows of rusty-social. Every collaborator is reached through
//! a `domains` port, so these types are backend-agnostic and unit-tested
//! against mockall doubles.

pub mod accounts;
pub mod authorization;
pub mod feed;
pub mod follows;
pub mod posts;
pub mod utils;

#[cfg(test)]
pub(crate) mod fixtures;

pub use accounts::{AccountService, RegisterAccount, Registration};
pub use feed::FeedService;
pub use follows::FollowService;
pub use posts::{PostDetail, PostService};
