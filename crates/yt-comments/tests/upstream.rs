use mockito::{Matcher, Server};
use std::time::{SystemTime, UNIX_EPOCH};
use yt_comments::{CredentialSource, Error, ServiceConfig, YouTubeService};
use yt_oauth::{OAuthConfig, OAuthManager, OAuthToken, TokenCache};

const PATH: &str = "/youtube/v3/commentThreads";

fn static_key_service(base_url: &str) -> YouTubeService {
    YouTubeService::new(
        ServiceConfig::new(CredentialSource::StaticKey("test-key".into())).with_base_url(base_url),
    )
    .unwrap()
}

async fn fetch_with_status(status: usize, body: &str) -> Error {
    let mut server = Server::new_async().await;
    server
        .mock("GET", PATH)
        .match_query(Matcher::Any)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    static_key_service(&server.url())
        .fetch_comments("missing", 10)
        .await
        .unwrap_err()
}

#[tokio::test]
async fn not_found_maps_to_not_found() {
    let error = fetch_with_status(
        404,
        r#"{"error": {"code": 404, "message": "The video identified by the videoId parameter could not be found."}}"#,
    )
    .await;
    match error {
        Error::NotFound(message) => assert!(message.contains("could not be found")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn bad_request_maps_to_client_error() {
    let error = fetch_with_status(
        400,
        r#"{"error": {"code": 400, "message": "Invalid value for maxResults"}}"#,
    )
    .await;
    match error {
        Error::UpstreamClient { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid value for maxResults");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn internal_error_maps_to_server_error() {
    let error = fetch_with_status(500, "oops").await;
    match error {
        Error::UpstreamServer { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "oops");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_upstream_is_transport_error() {
    // Nothing listens on the discard port
    let error = static_key_service("http://127.0.0.1:9")
        .fetch_comments("vid", 5)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Transport(_)));
}

#[tokio::test]
async fn token_provider_sends_bearer_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", PATH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("videoId".into(), "vid".into()),
            Matcher::UrlEncoded("part".into(), "snippet".into()),
        ]))
        .match_header("authorization", "Bearer at-live")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items": [{"snippet": {"topLevelComment": {"snippet": {"authorDisplayName": "Alice", "textOriginal": "first!"}}}}]}"#,
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = TokenCache::new(dir.path().join("token.json"));
    let expires_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    cache
        .save(&OAuthToken {
            access_token: "at-live".into(),
            refresh_token: "rt".into(),
            token_type: "Bearer".into(),
            expires_at,
        })
        .unwrap();

    let mut manager = OAuthManager::new(OAuthConfig::new("client".into(), String::new()), cache);
    manager.load_or_authorize().await.unwrap();

    let service = YouTubeService::new(
        ServiceConfig::new(CredentialSource::TokenProvider(manager.into_shared()))
            .with_base_url(server.url()),
    )
    .unwrap();

    let comments = service.fetch_comments("vid", 10).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author_display_name, "Alice");
    assert_eq!(comments[0].text_original, "first!");
    mock.assert_async().await;
}

#[tokio::test]
async fn failed_refresh_is_authorization_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error": "invalid_grant"}"#)
        .create_async()
        .await;
    let api = server
        .mock("GET", PATH)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = TokenCache::new(dir.path().join("token.json"));
    cache
        .save(&OAuthToken {
            access_token: "stale".into(),
            refresh_token: "revoked".into(),
            token_type: "Bearer".into(),
            expires_at: 0,
        })
        .unwrap();

    let config = OAuthConfig::new("client".into(), String::new())
        .with_token_url(format!("{}/token", server.url()));
    let mut manager = OAuthManager::new(config, cache);
    manager.load_or_authorize().await.unwrap();

    let service = YouTubeService::new(
        ServiceConfig::new(CredentialSource::TokenProvider(manager.into_shared()))
            .with_base_url(server.url()),
    )
    .unwrap();

    assert!(matches!(
        service.fetch_comments("vid", 10).await,
        Err(Error::AuthorizationFailed(_))
    ));
    api.assert_async().await;
}
