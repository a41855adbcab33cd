//! Fills a database with active sample users, posts, comments and follow
//! edges. Every seeded user logs in with the password `password`.

use anyhow::Context;
use auth_adapters::Argon2PasswordHasher;
use chrono::{Duration, Utc};
use configs::Settings;
use domains::{
    AccountRepo, CommentRepo, FollowRepo, NewAccount, NewComment, NewInvitation, NewPost,
    PasswordHasher, PostRepo, Role,
};
use fake::faker::internet::en::Username;
use fake::faker::lorem::en::{Paragraph, Sentence, Words};
use fake::Fake;
use secrecy::ExposeSecret;
use services::utils::{generate_token, hash_token};
use storage_adapters::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USERS: usize = 20;
const POSTS_PER_USER: usize = 5;
const COMMENTS_PER_POST: usize = 3;

fn truncate(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load().context("loading settings")?;
    let store = SqliteStore::connect(
        settings.database.url.expose_secret(),
        settings.database.max_connections,
        settings.database.query_timeout(),
    )
    .await?;
    store.migrate().await?;

    let hasher = Argon2PasswordHasher::new();
    let password_hash = hasher.hash("password").await?;
    let accounts = store.accounts();

    let mut users = Vec::with_capacity(USERS);
    for i in 0..USERS {
        let base: String = Username().fake();
        let username = truncate(format!("{base}{i}"), 100);
        let token = generate_token();
        let role_name = match i {
            0 => Role::ADMIN,
            1 => Role::MODERATOR,
            _ => Role::USER,
        };
        accounts
            .create_and_invite(
                NewAccount {
                    email: format!("{username}@example.com"),
                    username,
                    password_hash: password_hash.clone(),
                    role_name: role_name.to_string(),
                },
                NewInvitation {
                    token_hash: hash_token(&token),
                    expires_at: Utc::now() + Duration::hours(1),
                },
            )
            .await?;
        users.push(accounts.activate(&hash_token(&token), Utc::now()).await?);
    }

    let posts = store.posts();
    let comments = store.comments();
    let mut post_count = 0;
    let mut comment_count = 0;
    for (i, author) in users.iter().enumerate() {
        for _ in 0..POSTS_PER_USER {
            let post = posts
                .create(NewPost {
                    author_id: author.id,
                    title: truncate(Sentence(3..8).fake(), 100),
                    content: truncate(Paragraph(1..4).fake(), 1000),
                    tags: Words(1..4).fake(),
                })
                .await?;
            post_count += 1;

            for c in 0..COMMENTS_PER_POST {
                let commenter = &users[(i + c + 1) % users.len()];
                comments
                    .create(NewComment {
                        post_id: post.id,
                        author_id: commenter.id,
                        content: truncate(Sentence(4..12).fake(), 1000),
                    })
                    .await?;
                comment_count += 1;
            }
        }
    }

    let followers = store.followers();
    let mut follow_count = 0;
    for (i, follower) in users.iter().enumerate() {
        for step in 1..=3 {
            let followed = &users[(i + step) % users.len()];
            followers.follow(follower.id, followed.id).await?;
            follow_count += 1;
        }
    }

    info!(
        users = users.len(),
        posts = post_count,
        comments = comment_count,
        follows = follow_count,
        "seed complete"
    );
    store.close().await;
    Ok(())
}
