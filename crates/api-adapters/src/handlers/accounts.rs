use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use domains::{Account, AccountId, FeedItem};
use services::RegisterAccount;
use tracing::info;

use crate::error::{ApiError, Payload};
use crate::middleware::CurrentUser;
use crate::payloads::{
    envelope, CreateTokenPayload, Envelope, FeedParams, RegisterUserPayload, TokenResponse,
};
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// `POST /v1/authentication/user`. The activation token goes to the
/// notifier, never into the response.
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterUserPayload>,
) -> ApiResult<(StatusCode, Json<Envelope<Account>>)> {
    payload.validate()?;
    let registration = state
        .accounts
        .register(RegisterAccount {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;
    state.metrics.registrations.inc();
    Ok((StatusCode::CREATED, Json(envelope(registration.account))))
}

/// `POST /v1/authentication/token`
pub async fn create_token(
    State(state): State<AppState>,
    Payload(payload): Payload<CreateTokenPayload>,
) -> ApiResult<(StatusCode, Json<Envelope<TokenResponse>>)> {
    payload.validate()?;
    let account = state
        .accounts
        .authenticate(&payload.email, &payload.password)
        .await?;
    let token = state.tokens.issue(account.id)?;
    Ok((StatusCode::CREATED, Json(envelope(TokenResponse { token }))))
}

/// `PUT /v1/users/activate/{token}`
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<StatusCode> {
    let account = state.accounts.activate(&token).await?;
    state.metrics.activations.inc();
    info!(account_id = account.id, "account activated");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> ApiResult<Json<Envelope<Account>>> {
    let account = state.accounts.get_account(id).await?;
    Ok(Json(envelope(account)))
}

/// `DELETE /v1/users/{id}`, admins only.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<AccountId>,
) -> ApiResult<StatusCode> {
    state.accounts.delete_account(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v1/users/{id}/follow`
pub async fn follow(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<AccountId>,
) -> ApiResult<StatusCode> {
    state.follows.follow(actor.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v1/users/{id}/unfollow`
pub async fn unfollow(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<AccountId>,
) -> ApiResult<StatusCode> {
    state.follows.unfollow(actor.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/users/feed?limit=&offset=&sort=&search=&tags=`
pub async fn feed(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Query(params): Query<FeedParams>,
) -> ApiResult<Json<Envelope<Vec<FeedItem>>>> {
    let query = params.into_query()?;
    let items = state.feed.feed(actor.id, &query).await?;
    Ok(Json(envelope(items)))
}
