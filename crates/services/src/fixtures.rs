//! Sample domain values for unit tests.

use chrono::Utc;
use domains::{Account, AccountId, Post, PostId, Role};

pub fn role(name: &str, level: i32) -> Role {
    Role {
        id: i64::from(level),
        name: name.to_string(),
        level,
        description: String::new(),
    }
}

pub fn account_with_role(id: AccountId, role_name: &str, level: i32) -> Account {
    Account {
        id,
        username: format!("user{id}"),
        email: format!("user{id}@example.com"),
        password_hash: "hash".into(),
        is_active: true,
        role: role(role_name, level),
        created_at: Utc::now(),
    }
}

pub fn account(id: AccountId) -> Account {
    account_with_role(id, Role::USER, 1)
}

pub fn post(id: PostId, author_id: AccountId, version: i64) -> Post {
    let now = Utc::now();
    Post {
        id,
        author_id,
        title: "title".into(),
        content: "content".into(),
        tags: vec!["rust".into()],
        version,
        created_at: now,
        updated_at: now,
    }
}
