// ABOUTME: Integration tests for preview code issuance and lookup
// ABOUTME: Codes must survive token rotation while lookups always return the latest token

use devbox_sandbox::{IssuePreviewCode, PreviewCodeIssuer, PreviewRoute, SandboxError};

async fn setup_issuer() -> PreviewCodeIssuer {
    let pool = devbox_storage::open_in_memory()
        .await
        .expect("Failed to create in-memory database");
    PreviewCodeIssuer::new(pool)
}

fn request(token: &str) -> IssuePreviewCode {
    IssuePreviewCode {
        provider_sandbox_id: "pvelxc-118".to_string(),
        target_url: "https://pvelxc-118.internal:3000".to_string(),
        token: token.to_string(),
        port: 3000,
        user_id: "user_1".to_string(),
    }
}

#[tokio::test]
async fn test_code_is_stable_across_token_rotation() {
    let issuer = setup_issuer().await;

    let first = issuer.get_or_create(request("token_v1")).await.unwrap();
    let second = issuer.get_or_create(request("token_v2")).await.unwrap();
    assert_eq!(first.code, second.code);
    assert_eq!(second.token, "token_v2");

    let route = issuer.get_by_code(&first.code).await.unwrap();
    assert_eq!(
        route,
        Some(PreviewRoute {
            provider_sandbox_id: "pvelxc-118".to_string(),
            port: 3000,
            target_url: "https://pvelxc-118.internal:3000".to_string(),
            token: "token_v2".to_string(),
        })
    );
}

#[tokio::test]
async fn test_target_url_change_is_patched_in_place() {
    let issuer = setup_issuer().await;

    let first = issuer.get_or_create(request("token")).await.unwrap();

    let mut moved = request("token");
    moved.target_url = "https://pvelxc-118.internal:3001".to_string();
    let second = issuer.get_or_create(moved).await.unwrap();
    assert_eq!(second.code, first.code);
    assert_eq!(second.created_at, first.created_at);

    let route = issuer.get_by_code(&first.code).await.unwrap().unwrap();
    assert_eq!(route.target_url, "https://pvelxc-118.internal:3001");
}

#[tokio::test]
async fn test_unchanged_request_returns_same_row() {
    let issuer = setup_issuer().await;

    let first = issuer.get_or_create(request("token")).await.unwrap();
    let again = issuer.get_or_create(request("token")).await.unwrap();
    assert_eq!(again, first);
}

#[tokio::test]
async fn test_codes_are_url_safe() {
    let issuer = setup_issuer().await;

    let code = issuer.get_or_create(request("token")).await.unwrap().code;
    assert_eq!(code.len(), 12);
    assert!(code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
}

#[tokio::test]
async fn test_unknown_code_and_invalid_input() {
    let issuer = setup_issuer().await;

    assert_eq!(issuer.get_by_code("doesnotexist").await.unwrap(), None);

    let mut bad = request("token");
    bad.port = 0;
    assert!(matches!(
        issuer.get_or_create(bad).await,
        Err(SandboxError::Validation(_))
    ));
}
