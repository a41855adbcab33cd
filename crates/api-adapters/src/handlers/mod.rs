//! Route handlers. Each validates its input, calls one service operation and
//! shapes the result; failures leave as [`ApiError`](crate::error::ApiError).

pub mod accounts;
pub mod health;
pub mod posts;
