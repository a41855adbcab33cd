use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use domains::{Comment, CommentWithAuthor, NewPost, Post, PostId};
use serde::Serialize;

use crate::error::{ApiError, Payload};
use crate::middleware::CurrentUser;
use crate::payloads::{
    envelope, CreateCommentPayload, CreatePostPayload, Envelope, UpdatePostPayload,
};
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentWithAuthor>,
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Payload(payload): Payload<CreatePostPayload>,
) -> ApiResult<(StatusCode, Json<Envelope<Post>>)> {
    payload.validate()?;
    let post = state
        .posts
        .create(NewPost {
            author_id: actor.id,
            title: payload.title,
            content: payload.content,
            tags: payload.tags,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(envelope(post))))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> ApiResult<Json<Envelope<PostWithComments>>> {
    let detail = state.posts.get(id).await?;
    Ok(Json(envelope(PostWithComments {
        post: detail.post,
        comments: detail.comments,
    })))
}

/// A stale `version` in the body answers 409 without writing.
pub async fn update_post(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<PostId>,
    Payload(payload): Payload<UpdatePostPayload>,
) -> ApiResult<Json<Envelope<Post>>> {
    payload.validate()?;
    let post = state
        .posts
        .update(&actor, id, payload.into_changes())
        .await?;
    Ok(Json(envelope(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<PostId>,
) -> ApiResult<StatusCode> {
    state.posts.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<PostId>,
    Payload(payload): Payload<CreateCommentPayload>,
) -> ApiResult<(StatusCode, Json<Envelope<Comment>>)> {
    payload.validate()?;
    let comment = state
        .posts
        .add_comment(&actor, id, payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(envelope(comment))))
}
