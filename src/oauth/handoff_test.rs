use std::sync::Mutex;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::HttpTimeouts;
use crate::session::SessionProvider;
use crate::testing::MockIdentity;

struct ScriptedBrowser {
    outcome: BrowserOutcome,
    opened: Mutex<Vec<(String, String)>>,
}

impl ScriptedBrowser {
    fn new(outcome: BrowserOutcome) -> Arc<Self> {
        Arc::new(Self { outcome, opened: Mutex::new(Vec::new()) })
    }

    fn opened(&self) -> Vec<(String, String)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BrowserSession for ScriptedBrowser {
    async fn open_auth_session(&self, auth_url: &str, redirect_uri: &str) -> BrowserOutcome {
        self.opened.lock().unwrap().push((auth_url.to_owned(), redirect_uri.to_owned()));
        self.outcome.clone()
    }
}

fn success(url: &str) -> BrowserOutcome {
    BrowserOutcome::Success { url: url.to_owned() }
}

#[tokio::test]
async fn success_exchanges_tokens_from_fragment() {
    let identity = Arc::new(MockIdentity::new());
    let browser = ScriptedBrowser::new(success("tunedin://#access_token=AAA&refresh_token=BBB&token_type=bearer"));
    let handoff = OAuthHandoff::new(identity.clone(), browser.clone(), "tunedin://");

    let outcome = handoff.sign_in(OAuthProvider::GitHub).await.unwrap();
    let HandoffOutcome::SignedIn { session, backend_user } = outcome else {
        panic!("expected sign-in, got {outcome:?}");
    };
    assert_eq!(session.access_token, "AAA");
    assert!(backend_user.is_none());

    assert_eq!(identity.oauth_calls(), [(OAuthProvider::GitHub, "tunedin://".to_owned(), true)]);
    assert_eq!(identity.set_session_calls(), [("AAA".to_owned(), "BBB".to_owned())]);
    assert_eq!(browser.opened()[0].1, "tunedin://");
}

#[tokio::test]
async fn cancel_skips_extraction_and_exchange() {
    let identity = Arc::new(MockIdentity::new());
    let handoff = OAuthHandoff::new(identity.clone(), ScriptedBrowser::new(BrowserOutcome::Cancel), "tunedin://");

    assert_eq!(handoff.sign_in(OAuthProvider::Google).await.unwrap(), HandoffOutcome::Cancelled);
    assert!(identity.set_session_calls().is_empty());
    assert!(identity.current_session().is_none());
}

#[tokio::test]
async fn browser_failure_is_reported() {
    let identity = Arc::new(MockIdentity::new());
    let browser = ScriptedBrowser::new(BrowserOutcome::Failure("no browser available".into()));
    let handoff = OAuthHandoff::new(identity.clone(), browser, "tunedin://");

    let err = handoff.sign_in(OAuthProvider::Google).await.unwrap_err();
    assert!(matches!(err, HandoffError::Browser(ref m) if m == "no browser available"));
    assert!(identity.set_session_calls().is_empty());
}

#[tokio::test]
async fn missing_tokens_stop_before_exchange() {
    let identity = Arc::new(MockIdentity::new());
    let handoff = OAuthHandoff::new(identity.clone(), ScriptedBrowser::new(success("tunedin://#foo=bar")), "tunedin://");

    let err = handoff.sign_in(OAuthProvider::Google).await.unwrap_err();
    assert!(matches!(err, HandoffError::TokensMissing));
    assert_eq!(err.to_string(), "authentication tokens missing");
    assert!(identity.set_session_calls().is_empty());
}

#[tokio::test]
async fn exchange_failure_surfaces_backend_message() {
    let identity = Arc::new(MockIdentity::new());
    identity.reject_tokens("Invalid Refresh Token: Already Used");
    let browser = ScriptedBrowser::new(success("tunedin://#access_token=AAA&refresh_token=BBB"));
    let handoff = OAuthHandoff::new(identity.clone(), browser, "tunedin://");

    let err = handoff.sign_in(OAuthProvider::Google).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid Refresh Token: Already Used");
    assert!(identity.current_session().is_none());
}

#[tokio::test]
async fn backend_sync_failure_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let identity = Arc::new(MockIdentity::new());
    let provider = SessionProvider::new(identity.clone());
    provider.initialize().await;
    let mut state = provider.subscribe();

    let browser = ScriptedBrowser::new(success("tunedin://#access_token=AAA&refresh_token=BBB"));
    let api = ApiClient::new(server.uri(), HttpTimeouts::default()).unwrap();
    let handoff = OAuthHandoff::new(identity.clone(), browser, "tunedin://").with_backend_sync(api, None);

    let outcome = handoff.sign_in(OAuthProvider::GitHub).await.unwrap();
    assert!(matches!(outcome, HandoffOutcome::SignedIn { backend_user: None, .. }));

    let resolved = state.wait_for(|s| s.is_authenticated()).await.unwrap().clone();
    assert_eq!(resolved.session().map(|s| s.access_token.as_str()), Some("AAA"));
}

#[tokio::test]
async fn backend_sync_conflict_seeds_directory() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/email/ada%40example.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 7, "email": "ada@example.com" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let identity = Arc::new(MockIdentity::new());
    let users = Arc::new(BackendUserDirectory::default());
    let browser = ScriptedBrowser::new(success("tunedin://#access_token=AAA&refresh_token=BBB"));
    let api = ApiClient::new(server.uri(), HttpTimeouts::default()).unwrap();
    let handoff =
        OAuthHandoff::new(identity, browser, "tunedin://").with_backend_sync(api, Some(Arc::clone(&users)));

    let outcome = handoff.sign_in(OAuthProvider::GitHub).await.unwrap();
    let HandoffOutcome::SignedIn { backend_user: Some(user), .. } = outcome else {
        panic!("expected synced user, got {outcome:?}");
    };
    assert_eq!(user.id, "7");
    assert_eq!(users.cached("ada@example.com"), Some(user));
}
