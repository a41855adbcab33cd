//! # Post workflows
//!
//! Updates follow the read-modify-write protocol: read the current post,
//! apply the changes, and submit a conditional patch carrying the version
//! that was read. A concurrent writer that got there first turns the patch
//! into a `Conflict`, which is handed back to the caller untouched. Nothing
//! here retries.

use std::sync::Arc;

use domains::{
    Account, Comment, CommentRepo, CommentWithAuthor, DomainError, NewComment, NewPost, Post,
    PostChanges, PostId, PostRepo, Result, Role, RoleRepo,
};
use tracing::{debug, info};

use crate::authorization::require_role;

/// A post together with its comments, newest first.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<CommentWithAuthor>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepo>,
    comments: Arc<dyn CommentRepo>,
    roles: Arc<dyn RoleRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepo>,
        comments: Arc<dyn CommentRepo>,
        roles: Arc<dyn RoleRepo>,
    ) -> Self {
        Self {
            posts,
            comments,
            roles,
        }
    }

    pub async fn create(&self, post: NewPost) -> Result<Post> {
        let post = self.posts.create(post).await?;
        info!(post_id = post.id, author_id = post.author_id, "post created");
        Ok(post)
    }

    pub async fn get(&self, id: PostId) -> Result<PostDetail> {
        let post = self.posts.get_by_id(id).await?;
        let comments = self.comments.list_by_post(id).await?;
        Ok(PostDetail { post, comments })
    }

    /// Authors may edit their own posts; anyone else needs `moderator`.
    pub async fn update(&self, actor: &Account, id: PostId, changes: PostChanges) -> Result<Post> {
        let mut post = self.posts.get_by_id(id).await?;
        self.ensure_allowed(actor, &post, Role::MODERATOR).await?;

        if let Some(expected) = changes.expected_version {
            if expected != post.version {
                return Err(stale(id, expected, post.version));
            }
        }

        changes.apply(&mut post);
        let updated = self.posts.patch(&post).await?;
        debug!(post_id = id, version = updated.version, "post patched");
        Ok(updated)
    }

    /// Authors may delete their own posts; anyone else needs `admin`.
    pub async fn delete(&self, actor: &Account, id: PostId) -> Result<()> {
        let post = self.posts.get_by_id(id).await?;
        self.ensure_allowed(actor, &post, Role::ADMIN).await?;
        self.posts.delete_by_id(id).await?;
        info!(post_id = id, actor_id = actor.id, "post deleted");
        Ok(())
    }

    /// Comments are immutable once written.
    pub async fn add_comment(&self, author: &Account, post_id: PostId, content: String) -> Result<Comment> {
        self.comments
            .create(NewComment {
                post_id,
                author_id: author.id,
                content,
            })
            .await
    }

    async fn ensure_allowed(&self, actor: &Account, post: &Post, role: &str) -> Result<()> {
        if actor.id == post.author_id {
            return Ok(());
        }
        require_role(self.roles.as_ref(), actor, role).await
    }
}

fn stale(id: PostId, expected: i64, current: i64) -> DomainError {
    DomainError::Conflict(format!(
        "post {id} is at version {current}, request was based on version {expected}"
    ))
}
