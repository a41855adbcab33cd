use axum::http::{Method, StatusCode};
use integration_tests::TestApp;
use serde_json::json;

#[tokio::test]
async fn created_post_starts_at_version_one_and_keeps_tags() {
    let app = TestApp::spawn().await;
    let (author, token) = app.sign_up("author").await;

    let post = app.create_post(&token, "Hello", &["rust", "axum"]).await;
    assert_eq!(post["version"], 1);
    assert_eq!(post["author_id"], author);
    assert_eq!(post["tags"], json!(["rust", "axum"]));
}

#[tokio::test]
async fn post_detail_lists_comments_newest_first() {
    let app = TestApp::spawn().await;
    let (_, author) = app.sign_up("author").await;
    let (_, reader) = app.sign_up("reader").await;
    let post = app.create_post(&author, "Discuss", &[]).await;
    let id = post["id"].as_i64().unwrap();

    for (token, body) in [(&author, "first"), (&reader, "second")] {
        let response = app
            .call(
                Method::POST,
                &format!("/v1/posts/{id}/comments"),
                Some(token),
                Some(json!({ "content": body })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let detail = app
        .call(Method::GET, &format!("/v1/posts/{id}"), Some(&reader), None)
        .await;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.body["data"]["title"], "Discuss");
    let comments = detail.body["data"]["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["content"], "second");
    assert_eq!(comments[0]["author_username"], "reader");
}

#[tokio::test]
async fn commenting_on_a_missing_post_is_not_found() {
    let app = TestApp::spawn().await;
    let (_, token) = app.sign_up("author").await;

    let response = app
        .call(
            Method::POST,
            "/v1/posts/9999/comments",
            Some(&token),
            Some(json!({ "content": "anyone?" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stale_version_is_a_conflict_and_writes_nothing() {
    let app = TestApp::spawn().await;
    let (_, token) = app.sign_up("author").await;
    let post = app.create_post(&token, "v1", &[]).await;
    let uri = format!("/v1/posts/{}", post["id"]);

    let first = app
        .call(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "title": "v2", "version": 1 })),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["data"]["version"], 2);

    let stale = app
        .call(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "title": "lost update", "version": 1 })),
        )
        .await;
    assert_eq!(stale.status, StatusCode::CONFLICT);

    let current = app.call(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(current.body["data"]["title"], "v2");
    assert_eq!(current.body["data"]["version"], 2);
}

#[tokio::test]
async fn concurrent_updates_from_the_same_version_let_exactly_one_win() {
    let app = TestApp::spawn().await;
    let (_, token) = app.sign_up("author").await;
    let post = app.create_post(&token, "base", &[]).await;
    let uri = format!("/v1/posts/{}", post["id"]);

    let (a, b) = tokio::join!(
        app.call(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "content": "from a", "version": 1 })),
        ),
        app.call(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "content": "from b", "version": 1 })),
        ),
    );
    let mut statuses = [a.status.as_u16(), b.status.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 409]);

    let current = app.call(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(current.body["data"]["version"], 2);
}

#[tokio::test]
async fn strangers_need_moderator_to_edit_and_admin_to_delete() {
    let app = TestApp::spawn().await;
    let (_, author) = app.sign_up("author").await;
    let (_, stranger) = app.sign_up("stranger").await;
    let (moderator_id, moderator) = app.sign_up("moderator").await;
    app.set_role(moderator_id, "moderator").await;

    let post = app.create_post(&author, "mine", &[]).await;
    let uri = format!("/v1/posts/{}", post["id"]);
    let edit = Some(json!({ "title": "edited" }));

    assert_eq!(
        app.call(Method::PATCH, &uri, Some(&stranger), edit.clone()).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.call(Method::PATCH, &uri, Some(&moderator), edit).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.call(Method::DELETE, &uri, Some(&moderator), None).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.call(Method::DELETE, &uri, Some(&author), None).await.status,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn deleting_an_unknown_post_is_not_found() {
    let app = TestApp::spawn().await;
    let (_, token) = app.sign_up("author").await;

    let response = app
        .call(Method::DELETE, "/v1/posts/424242", Some(&token), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overlong_titles_are_rejected() {
    let app = TestApp::spawn().await;
    let (_, token) = app.sign_up("author").await;

    let response = app
        .call(
            Method::POST,
            "/v1/posts",
            Some(&token),
            Some(json!({ "title": "t".repeat(101), "content": "body" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
