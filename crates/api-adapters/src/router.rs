use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, health, posts};
use crate::middleware::{basic_auth, observe, rate_limit, require_auth};
use crate::state::AppState;

/// Builds the full application router.
///
/// Every `/v1` route passes the rate limiter before authentication, so a
/// flood of unauthenticated calls is answered with 429 rather than 401.
/// `/metrics` is rate limited too and sits behind basic auth; it is absent
/// when no credentials are configured.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/authentication/user", post(accounts::register))
        .route("/authentication/token", post(accounts::create_token))
        .route("/users/activate/{token}", put(accounts::activate));

    let protected = Router::new()
        .route("/users/feed", get(accounts::feed))
        .route(
            "/users/{id}",
            get(accounts::get_user).delete(accounts::delete_user),
        )
        .route("/users/{id}/follow", put(accounts::follow))
        .route("/users/{id}/unfollow", put(accounts::unfollow))
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/{id}/comments", post(posts::create_comment))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let v1 = public
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), rate_limit));

    let mut app = Router::new().nest("/v1", v1);
    if state.metrics_auth.is_some() {
        let metrics = Router::new()
            .route("/metrics", get(health::metrics))
            .route_layer(from_fn_with_state(state.clone(), basic_auth))
            .route_layer(from_fn_with_state(state.clone(), rate_limit));
        app = app.merge(metrics);
    }

    app.layer(from_fn_with_state(state.clone(), observe))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
