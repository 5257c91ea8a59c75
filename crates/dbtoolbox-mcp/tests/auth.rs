//! MCP over HTTP with auth service tokens.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use dbtoolbox_core::ToolsFile;
use dbtoolbox_mcp::create_router;
use dbtoolbox_runtime::Toolbox;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "mcp-auth-secret-mcp-auth-secret-01";

const TOOLS: &str = r#"
sources:
  db:
    kind: sqlite
    database: ":memory:"
authServices:
  corp:
    kind: jwt
    secret: mcp-auth-secret-mcp-auth-secret-01
tools:
  whoami:
    kind: sqlite-sql
    source: db
    description: Echo the caller's verified email.
    statement: SELECT ? AS email
    authRequired: [corp]
    parameters:
      - name: email
        type: string
        description: caller email
        authServices:
          - name: corp
            field: email
"#;

async fn app() -> axum::Router {
    let file = ToolsFile::from_yaml(TOOLS).unwrap();
    create_router(Arc::new(Toolbox::build(&file).await.unwrap()))
}

fn call_request(token: Option<&str>) -> Request<Body> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 9,
        "method": "tools/call",
        "params": {"name": "whoami", "arguments": {}}
    });
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("corp_token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_call_without_token_is_rejected() {
    let response = app().await.oneshot(call_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32600);
}

#[tokio::test]
async fn test_call_with_token_uses_claims() {
    let token = encode(
        &Header::new(Algorithm::HS256),
        &json!({"email": "carol@example.com", "exp": 4102444800u64}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let response = app().await.oneshot(call_request(Some(&token))).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(
        body["result"]["content"],
        json!([{"type": "text", "text": "{\"email\":\"carol@example.com\"}"}])
    );
}

#[tokio::test]
async fn test_list_hides_auth_parameters() {
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
        .unwrap();
    let body = json_body(app().await.oneshot(request).await.unwrap()).await;

    let schema = &body["result"]["tools"][0]["inputSchema"];
    assert_eq!(schema["properties"], json!({}));
    assert_eq!(schema["required"], json!([]));
}
