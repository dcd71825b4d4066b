mod common;

use actix_web::{test, App};
use common::{cid, config, World};
use dialectica::auth::create_jwt;
use dialectica::backend::ReactionCounts;
use dialectica::models::Principal;
use dialectica::rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use dialectica::sessions::FeedSessions;
use dialectica::{config as routes, AppState};
use serde_json::{json, Value};
use serial_test::serial;
use std::time::Duration;

fn set_secret() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn bearer(principal: &str) -> (&'static str, String) {
    let token = create_jwt(&Principal(principal.into())).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn state(world: World, page_size: usize) -> AppState {
    let h = world.build();
    AppState::new(h.deps(), config(page_size))
}

#[actix_web::test]
#[serial]
async fn feed_lifecycle() {
    set_secret();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state(World::new(5), 2)))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post().uri("/api/v1/feeds").set_json(&json!({})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let feed_id = body["feed_id"].as_str().unwrap().to_string();
    assert_eq!(body["snapshot"]["state"]["state"], "ready");
    assert_eq!(body["snapshot"]["posts"].as_array().unwrap().len(), 2);
    assert_eq!(body["snapshot"]["posts"][0]["token_id"], "4");

    let req = test::TestRequest::post().uri(&format!("/api/v1/feeds/{feed_id}/more")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"]["outcome"], "appended");
    assert_eq!(body["snapshot"]["posts"].as_array().unwrap().len(), 4);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/feeds/{feed_id}/sort"))
        .set_json(&json!({"sort": "oldest"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sort"], "oldest");
    assert_eq!(body["posts"][0]["token_id"], "0");
    assert_eq!(body["posts"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get().uri(&format!("/api/v1/feeds/{feed_id}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::delete().uri(&format!("/api/v1/feeds/{feed_id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    let req = test::TestRequest::get().uri(&format!("/api/v1/feeds/{feed_id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn failed_discovery_is_reported_in_state() {
    set_secret();
    let world = World::new(2);
    world.registry.fail_supply.store(true, std::sync::atomic::Ordering::SeqCst);
    let app = test::init_service(
        App::new().app_data(actix_web::web::Data::new(state(world, 10))).configure(routes),
    )
    .await;
    let req = test::TestRequest::post().uri("/api/v1/feeds").set_json(&json!({"sort": "newest"})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["snapshot"]["state"]["state"], "failed");

    let feed_id = body["feed_id"].as_str().unwrap();
    let req = test::TestRequest::post().uri(&format!("/api/v1/feeds/{feed_id}/refresh")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 502);
}

#[actix_web::test]
#[serial]
async fn reactions_require_the_feed_viewer() {
    set_secret();
    let mut world = World::new(1);
    world.backend.counts = ReactionCounts { likes: 2, dislikes: 0, total_comments: 0 };
    let app = test::init_service(
        App::new().app_data(actix_web::web::Data::new(state(world, 10))).configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/feeds")
        .insert_header(bearer("alice"))
        .set_json(&json!({}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let feed_id = body["feed_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/feeds/{feed_id}/posts/{}/reaction", cid(0));

    // no token
    let req = test::TestRequest::post().uri(&uri).set_json(&json!({"kind": "Like"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // someone else's feed
    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(bearer("mallory"))
        .set_json(&json!({"kind": "Like"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(bearer("alice"))
        .set_json(&json!({"kind": "Like"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["engagement"]["likes"], 3);
    assert_eq!(body["engagement"]["user_liked"], true);
    assert_eq!(body["phase"], "confirmed");
}

#[actix_web::test]
#[serial]
async fn single_post_endpoint() {
    set_secret();
    let app = test::init_service(
        App::new().app_data(actix_web::web::Data::new(state(World::new(3), 10))).configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{}", cid(2))).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["content"], "post 2");
    assert_eq!(body["identifier"], cid(2));

    let req = test::TestRequest::get().uri("/api/v1/posts/not-a-content-id").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri(&format!("/api/v1/posts/{}", cid(77))).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn feed_creation_is_rate_limited() {
    set_secret();
    let mut st = state(World::new(1), 10);
    let cfg = RateLimitConfig {
        feed_limit: 1,
        feed_window: Duration::from_secs(300),
        reaction_limit: 100,
        reaction_window: Duration::from_secs(60),
    };
    st.rate_limiter = Some(RateLimiterFacade::new(InMemoryRateLimiter::new(true), cfg));
    let app = test::init_service(App::new().app_data(actix_web::web::Data::new(st)).configure(routes)).await;

    let req = test::TestRequest::post().uri("/api/v1/feeds").set_json(&json!({})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
    let req = test::TestRequest::post().uri("/api/v1/feeds").set_json(&json!({})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 429);
}

#[actix_web::test]
async fn metrics_endpoint_absent_without_recorder() {
    let app = test::init_service(
        App::new().app_data(actix_web::web::Data::new(state(World::new(0), 10))).configure(routes),
    )
    .await;
    let req = test::TestRequest::get().uri("/metrics").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn idle_feed_sessions_expire() {
    set_secret();
    let mut st = state(World::new(2), 10);
    st.feeds = FeedSessions::new(Duration::from_millis(50));
    let sessions = st.feeds.clone();
    let app = test::init_service(App::new().app_data(actix_web::web::Data::new(st)).configure(routes)).await;

    let req = test::TestRequest::post().uri("/api/v1/feeds").set_json(&json!({})).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let feed_id = body["feed_id"].as_str().unwrap().to_string();
    let req = test::TestRequest::get().uri(&format!("/api/v1/feeds/{feed_id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    tokio::time::sleep(Duration::from_millis(120)).await;
    let req = test::TestRequest::get().uri(&format!("/api/v1/feeds/{feed_id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    assert!(sessions.is_empty());
}

#[actix_web::test]
#[serial]
async fn invalid_bearer_token_is_not_read_as_anonymous() {
    set_secret();
    let app = test::init_service(
        App::new().app_data(actix_web::web::Data::new(state(World::new(1), 10))).configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/feeds")
        .insert_header(("Authorization", "Bearer expired.or.forged"))
        .set_json(&json!({}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}", cid(0)))
        .insert_header(("Authorization", "Bearer expired.or.forged"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post().uri("/api/v1/feeds").set_json(&json!({})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
}

#[actix_web::test]
#[serial]
async fn second_reaction_while_pending_conflicts() {
    set_secret();
    let gate = std::sync::Arc::new(tokio::sync::Notify::new());
    let mut world = World::new(1);
    world.backend.reaction_gate = Some(gate.clone());
    let app = test::init_service(
        App::new().app_data(actix_web::web::Data::new(state(world, 10))).configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/feeds")
        .insert_header(bearer("alice"))
        .set_json(&json!({}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let uri = format!("/api/v1/feeds/{}/posts/{}/reaction", body["feed_id"].as_str().unwrap(), cid(0));
    let react = |kind: &str| {
        test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer("alice"))
            .set_json(&json!({ "kind": kind }))
            .to_request()
    };

    let (first, second, _) = tokio::join!(
        test::call_service(&app, react("Like")),
        async {
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            test::call_service(&app, react("Dislike")).await
        },
        async {
            common::settle().await;
            gate.notify_one();
        },
    );
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 409);
}
