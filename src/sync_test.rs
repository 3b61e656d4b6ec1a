use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::HttpTimeouts;
use crate::testing::sample_user;

fn api_for(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), HttpTimeouts::default()).unwrap()
}

fn backend_user_json(id: u32) -> serde_json::Value {
    serde_json::json!({ "id": id, "email": "ada@example.com", "username": "ada" })
}

#[test]
fn new_user_derives_username_and_uppercases_provider() {
    let record = build_new_user(&sample_user("ada.l@example.com")).unwrap();
    assert_eq!(record.username, "ada.l");
    assert_eq!(record.provider, "GITHUB");
    assert_eq!(record.display_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(record.avatar_url.as_deref(), Some("https://img.example.test/ada.png"));
    assert_eq!(record.provider_id.as_deref(), Some("42"));
}

#[test]
fn new_user_defaults_provider_and_requires_email() {
    let mut user = sample_user("ada@example.com");
    user.app_metadata.provider = None;
    assert_eq!(build_new_user(&user).unwrap().provider, "EMAIL");

    user.email = Some("   ".into());
    assert!(build_new_user(&user).is_none());
}

#[tokio::test]
async fn created_user_is_used_directly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_partial_json(serde_json::json!({ "username": "ada", "provider": "GITHUB" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(backend_user_json(1)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/email/ada%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(backend_user_json(2)))
        .expect(0)
        .mount(&server)
        .await;

    let synced = sync_user(&api_for(&server), &sample_user("ada@example.com")).await.unwrap();
    assert_eq!(synced.id, "1");
}

#[tokio::test]
async fn conflict_falls_back_to_exactly_one_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/email/ada%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(backend_user_json(2)))
        .expect(1)
        .mount(&server)
        .await;

    let synced = sync_user(&api_for(&server), &sample_user("ada@example.com")).await.unwrap();
    assert_eq!(synced.id, "2");
}

#[tokio::test]
async fn best_effort_swallows_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let users = BackendUserDirectory::default();
    let synced = sync_best_effort(&api_for(&server), Some(&users), &sample_user("ada@example.com")).await;
    assert!(synced.is_none());
    assert!(users.cached("ada@example.com").is_none());
}

#[tokio::test]
async fn directory_sync_seeds_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(backend_user_json(1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/email/ada%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(backend_user_json(2)))
        .expect(0)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let users = BackendUserDirectory::default();
    users.sync(&api, &sample_user("ada@example.com")).await.unwrap();

    let found = users.lookup(&api, "ADA@example.com ").await.unwrap();
    assert_eq!(found.id, "1");
}

#[tokio::test]
async fn concurrent_lookups_share_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/email/ada%40example.com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(backend_user_json(2))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let users = BackendUserDirectory::default();
    let (a, b) = tokio::join!(users.lookup(&api, "ada@example.com"), users.lookup(&api, "ada@example.com"));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(users.lookup(&api, "ada@example.com").await.unwrap().id, "2");
}

#[tokio::test]
async fn failed_lookup_is_retried_and_clear_forgets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/email/ada%40example.com"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/email/ada%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(backend_user_json(2)))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let users = BackendUserDirectory::default();
    assert!(users.lookup(&api, "ada@example.com").await.is_err());
    assert!(users.cached("ada@example.com").is_none());

    assert_eq!(users.lookup(&api, "ada@example.com").await.unwrap().id, "2");
    assert!(users.cached("ada@example.com").is_some());

    users.clear();
    assert!(users.cached("ada@example.com").is_none());
}
