use actix_web::{dev::Payload, test, FromRequest};
use dialectica::auth::{create_jwt, Auth};
use dialectica::models::Principal;
use serial_test::serial;
use std::env;

fn set_secret() {
    env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

#[actix_web::test]
#[serial]
async fn token_carries_the_principal() {
    set_secret();
    let token = create_jwt(&Principal("rrkah-fqaaa-aaaaa-aaaaq-cai".into())).expect("token");
    let req = test::TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(auth.principal(), Principal("rrkah-fqaaa-aaaaa-aaaaq-cai".into()));
}

#[actix_web::test]
#[serial]
async fn extractor_rejects_invalid_token() {
    set_secret();
    let req = test::TestRequest::default()
        .insert_header(("Authorization", "Bearer notatoken"))
        .to_http_request();
    let mut pl = Payload::None;
    assert!(Auth::from_request(&req, &mut pl).await.is_err());
}

#[actix_web::test]
#[serial]
async fn missing_header_is_anonymous_for_optional_auth() {
    set_secret();
    let req = test::TestRequest::default().to_http_request();
    let mut pl = Payload::None;
    assert!(Option::<Auth>::from_request(&req, &mut pl).await.unwrap().is_none());
}

#[actix_web::test]
#[serial]
async fn no_token_without_a_secret() {
    env::remove_var("JWT_SECRET");
    assert!(create_jwt(&Principal("alice".into())).is_err());
    set_secret();
}
