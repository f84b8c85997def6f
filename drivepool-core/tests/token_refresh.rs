//! Integration tests for token refresh and retrying invocation.
//!
//! These tests run a [`PoolManager`] against a mock token endpoint and verify:
//! - Lazy refresh and cache reuse
//! - Refresh token rotation
//! - The single forced-refresh retry after a token rejection
//! - That removed credentials make a pool unusable

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use drivepool_core::{
    CredentialSet, Error, ManagerConfig, PoolId, PoolManager, TokenError, UpstreamError,
};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to build a manager pointed at the mock server's `/token`.
fn manager_for(server: &MockServer) -> PoolManager {
    let config = ManagerConfig::default()
        .with_auth_endpoint(format!("{}/token", server.uri()))
        .with_sweep_interval(Duration::ZERO);
    PoolManager::new(config).unwrap()
}

fn acct1_credentials() -> CredentialSet {
    CredentialSet::new("c1", "s1", "r1", "rt1")
}

fn token_response(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3599
    }))
}

fn invalid_token_error() -> UpstreamError {
    UpstreamError::Status {
        status: 401,
        body: serde_json::json!({
            "error": {
                "code": "InvalidAuthenticationToken",
                "message": "Lifetime validation failed, the token is expired."
            }
        }),
    }
}

async fn token_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_add_connection_then_resolve_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("client_id=c1"))
        .and(body_string_contains("client_secret=s1"))
        .and(body_string_contains("redirect_uri=r1"))
        .and(body_string_contains("refresh_token=rt1"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response("AT1"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");

    let added = manager.add_connection(&pool, acct1_credentials()).await.unwrap();
    assert!(added);

    let first = manager.resolve_token(&pool).await.unwrap();
    let second = manager.resolve_token(&pool).await.unwrap();

    assert_eq!(first.value.expose(), "AT1");
    assert_eq!(first, second);
    assert_eq!(token_requests(&server).await, 1);
}

#[tokio::test]
async fn test_check_credentials_after_add() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1"))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");

    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    assert_eq!(manager.check_credentials(&pool), Some(acct1_credentials()));
    assert!(manager.check_credentials(&PoolId::new("acct2")).is_none());
}

#[tokio::test]
async fn test_rotated_refresh_token_is_stored_and_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=rt1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT1",
            "refresh_token": "rt2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=rt2"))
        .respond_with(token_response("AT2"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");

    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    let stored = manager.check_credentials(&pool).unwrap();
    assert_eq!(stored, acct1_credentials().with_refresh_token("rt2"));

    let token = manager.refresh_token(&pool).await.unwrap();
    assert_eq!(token.value.expose(), "AT2");
}

#[tokio::test]
async fn test_missing_credentials_make_no_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1"))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("nobody");
    let calls = AtomicUsize::new(0);

    let err = manager.resolve_token(&pool).await.unwrap_err();
    assert!(err.is_missing_credentials());

    let err = manager
        .invoke(&pool, (), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), UpstreamError>(()) }
        })
        .await
        .unwrap_err();
    assert!(err.is_missing_credentials());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_refresh_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "AADSTS70000: The refresh token has expired."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");

    let err = manager
        .add_connection(&pool, acct1_credentials())
        .await
        .unwrap_err();

    match err {
        Error::Connection {
            source: TokenError::TokenRefresh { status, body },
            ..
        } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("Expected Error::Connection with TokenRefresh, got {:?}", other),
    }

    // No rollback: the rejected credentials are still registered.
    assert!(manager.check_credentials(&pool).is_some());
}

#[tokio::test]
async fn test_invoke_retries_once_after_token_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT2"))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");
    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    let calls = AtomicUsize::new(0);
    let result = manager
        .invoke(&pool, "root".to_string(), |req| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                // AT1 is still cached locally but the server already revoked it.
                if req.authorization == "Bearer AT1" {
                    Err(invalid_token_error())
                } else {
                    Ok(format!("{} via {}", req.params, req.authorization))
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result, "root via Bearer AT2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // add_connection + exactly one forced refresh
    assert_eq!(token_requests(&server).await, 2);

    // The forced refresh replaced the cached token.
    let token = manager.resolve_token(&pool).await.unwrap();
    assert_eq!(token.value.expose(), "AT2");
}

#[tokio::test]
async fn test_invoke_propagates_second_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1"))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");
    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    let calls = AtomicUsize::new(0);
    let err = manager
        .invoke(&pool, (), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(invalid_token_error()) }
        })
        .await
        .unwrap_err();

    let upstream = err.as_upstream().expect("upstream error");
    assert_eq!(upstream.status(), Some(401));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(token_requests(&server).await, 2);
}

#[tokio::test]
async fn test_invoke_does_not_retry_other_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1"))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");
    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    let calls = AtomicUsize::new(0);
    let err = manager
        .invoke(&pool, (), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(UpstreamError::Status {
                    status: 404,
                    body: serde_json::json!({ "error": { "code": "itemNotFound" } }),
                })
            }
        })
        .await
        .unwrap_err();

    assert_eq!(err.as_upstream().and_then(|e| e.status()), Some(404));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(token_requests(&server).await, 1);
}

#[tokio::test]
async fn test_abort_connection_makes_pool_unusable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");
    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    manager.abort_connection(&pool);
    manager.abort_connection(&pool);

    assert!(manager.check_credentials(&pool).is_none());
    assert!(manager.resolve_token(&pool).await.unwrap_err().is_missing_credentials());

    let calls = AtomicUsize::new(0);
    let err = manager
        .invoke(&pool, (), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), UpstreamError>(()) }
        })
        .await
        .unwrap_err();
    assert!(err.is_missing_credentials());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pools_refresh_independently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("client_id=c1"))
        .respond_with(token_response("AT-one"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("client_id=c2"))
        .respond_with(token_response("AT-two"))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let one = PoolId::new("one");
    let two = PoolId::new("two");

    manager.add_connection(&one, acct1_credentials()).await.unwrap();
    manager
        .add_connection(&two, CredentialSet::new("c2", "s2", "r2", "rt-two"))
        .await
        .unwrap();

    assert_eq!(manager.resolve_token(&one).await.unwrap().value.expose(), "AT-one");
    assert_eq!(manager.resolve_token(&two).await.unwrap().value.expose(), "AT-two");

    manager.abort_connection(&one);
    assert!(manager.resolve_token(&two).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_refreshes_are_not_coalesced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1").set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");
    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    let (a, b) = tokio::join!(manager.refresh_token(&pool), manager.refresh_token(&pool));
    assert_eq!(a.unwrap().value.expose(), "AT1");
    assert_eq!(b.unwrap().value.expose(), "AT1");

    // Duplicate refreshes are not coalesced.
    assert_eq!(token_requests(&server).await, 3);
}

#[tokio::test]
async fn test_refresh_in_flight_does_not_touch_replacement_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("client_id=c1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "access_token": "AT-old",
                    "refresh_token": "rt1-rotated"
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("client_id=c2"))
        .respond_with(token_response("AT-new"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let pool = PoolId::new("acct1");
    let replacement = CredentialSet::new("c2", "s2", "r2", "rt2");

    let (first, second) = tokio::join!(
        manager.add_connection(&pool, acct1_credentials()),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            manager.add_connection(&pool, replacement.clone()).await
        }
    );
    assert!(first.is_ok());
    assert!(second.is_ok());

    // The slow grant for c1 finished last but must not leak into c2's state.
    assert_eq!(manager.check_credentials(&pool), Some(replacement));
    let token = manager.resolve_token(&pool).await.unwrap();
    assert_eq!(token.value.expose(), "AT-new");
    assert_eq!(token_requests(&server).await, 2);
}

#[tokio::test]
async fn test_huge_credential_ttl_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response("AT1"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ManagerConfig::default()
        .with_auth_endpoint(format!("{}/token", server.uri()))
        .with_credential_ttl(Duration::from_secs(u64::MAX))
        .with_token_ttl(Duration::from_secs(u64::MAX))
        .with_sweep_interval(Duration::ZERO);
    let manager = PoolManager::new(config).unwrap();
    let pool = PoolId::new("acct1");

    manager.add_connection(&pool, acct1_credentials()).await.unwrap();

    assert_eq!(manager.check_credentials(&pool), Some(acct1_credentials()));
    assert_eq!(manager.resolve_token(&pool).await.unwrap().value.expose(), "AT1");
}
