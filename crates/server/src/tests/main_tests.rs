use super::*;
use axum::{body, body::Body, http::Request};
use chrono::{DateTime, Duration as ChronoDuration};
use serde_json::Value;
use tower::ServiceExt;

const TEST_BODY_LIMIT: usize = 64 * 1024;

async fn test_app() -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext::new(storage.clone());
    let app = build_router(Arc::new(AppState { api }), TEST_BODY_LIMIT);
    (app, storage)
}

fn json_request(method: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(STORIES_ROUTE)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app().await;
    let request = Request::get(HEALTH_ROUTE)
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn healthz_reports_unavailable_after_pool_closes() {
    let (app, storage) = test_app().await;
    storage.pool().close().await;

    let request = Request::get(HEALTH_ROUTE)
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn post_then_get_uses_client_upload_time_for_expiry() {
    let (app, _storage) = test_app().await;
    let uploaded_at = Utc::now() - ChronoDuration::hours(2);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            serde_json::json!({ "image": "x", "uploadedAt": uploaded_at }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Story = serde_json::from_value(read_json(response).await).expect("story");
    assert_eq!(created.image, "x");
    assert_eq!(created.expires_at, created.uploaded_at + ChronoDuration::hours(24));
    assert_eq!(
        created.uploaded_at.timestamp_millis(),
        uploaded_at.timestamp_millis()
    );

    let response = app
        .oneshot(Request::get(STORIES_ROUTE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<Story> = serde_json::from_value(read_json(response).await).expect("list");
    assert_eq!(listed, vec![created]);
}

#[tokio::test]
async fn get_excludes_stories_past_their_window() {
    let (app, storage) = test_app().await;
    let now = Utc::now();
    storage
        .create_story("stale", now - ChronoDuration::hours(24) - ChronoDuration::minutes(1))
        .await
        .expect("stale");
    let live = storage
        .create_story("live", now - ChronoDuration::hours(23) - ChronoDuration::minutes(59))
        .await
        .expect("live");

    let response = app
        .oneshot(Request::get(STORIES_ROUTE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let listed = read_json(response).await;
    let listed = listed.as_array().expect("array");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], live.id.as_str());
    assert!(listed[0].get("expiresAt").is_some());
}

#[tokio::test]
async fn get_orders_newest_first() {
    let (app, storage) = test_app().await;
    let t: DateTime<Utc> = Utc::now() - ChronoDuration::minutes(10);
    for (i, image) in ["t0", "t1", "t2"].into_iter().enumerate() {
        storage
            .create_story(image, t + ChronoDuration::seconds(i as i64))
            .await
            .expect("create");
    }

    let response = app
        .oneshot(Request::get(STORIES_ROUTE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let listed: Vec<Story> = serde_json::from_value(read_json(response).await).expect("list");
    let images: Vec<_> = listed.iter().map(|s| s.image.as_str()).collect();
    assert_eq!(images, vec!["t2", "t1", "t0"]);
}

#[tokio::test]
async fn post_accepts_legacy_img_field() {
    let (app, _storage) = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            serde_json::json!({ "img": "data:image/png;base64,AAAA", "uploadedAt": Utc::now() }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn post_with_missing_or_malformed_fields_is_bad_request() {
    let (app, storage) = test_app().await;

    let missing_image = app
        .clone()
        .oneshot(json_request(
            "POST",
            serde_json::json!({ "uploadedAt": Utc::now() }),
        ))
        .await
        .expect("response");
    assert_eq!(missing_image.status(), StatusCode::BAD_REQUEST);
    assert!(read_json(missing_image).await.get("error").is_some());

    let bad_time = app
        .clone()
        .oneshot(json_request(
            "POST",
            serde_json::json!({ "image": "x", "uploadedAt": "yesterday" }),
        ))
        .await
        .expect("response");
    assert_eq!(bad_time.status(), StatusCode::BAD_REQUEST);

    let not_json = app
        .oneshot(
            Request::post(STORIES_ROUTE)
                .header("content-type", "application/json")
                .body(Body::from("{"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);

    assert_eq!(storage.count_visible(Utc::now()).await.expect("count"), 0);
}

#[tokio::test]
async fn upload_time_at_the_end_of_the_calendar_is_bad_request() {
    let (app, storage) = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            serde_json::json!({ "image": "x", "uploadedAt": "+262142-12-31T12:00:00Z" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "validation");
    assert_eq!(body["error"], "uploadedAt out of range");

    let far_past = Utc::now() - ChronoDuration::days(365 * 100);
    assert_eq!(storage.count_visible(far_past).await.expect("count"), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (app, _storage) = test_app().await;
    let image = "a".repeat(TEST_BODY_LIMIT * 2);
    let response = app
        .oneshot(json_request(
            "POST",
            serde_json::json!({ "image": image, "uploadedAt": Utc::now() }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn delete_without_id_is_bad_request() {
    let (app, _storage) = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request("DELETE", serde_json::json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "Missing story id");

    let no_body = app
        .oneshot(
            Request::delete(STORIES_ROUTE)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(no_body.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_unknown_then_known_story() {
    let (app, storage) = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request("DELETE", serde_json::json!({ "id": "missing" })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["error"], "Story not found");

    let story = storage.create_story("x", Utc::now()).await.expect("create");
    let response = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            serde_json::json!({ "id": story.id.as_str() }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, serde_json::json!({ "success": true }));

    let again = app
        .oneshot(json_request(
            "DELETE",
            serde_json::json!({ "id": story.id.as_str() }),
        ))
        .await
        .expect("response");
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_failure_is_a_server_error_not_an_empty_list() {
    let (app, storage) = test_app().await;
    storage.pool().close().await;

    let response = app
        .oneshot(Request::get(STORIES_ROUTE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(read_json(response).await.get("error").is_some());
}
