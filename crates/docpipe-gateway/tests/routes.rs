//! Route tests for the gateway.

use std::io::Write;

use axum::http::StatusCode;
use axum_test::TestServer;
use docpipe_core::{ExecContext, Rejection};
use docpipe_gateway::{build_handler, create_router, AppState, GatewayConfig};
use serde_json::{json, Value};

fn server_with(config: GatewayConfig) -> TestServer {
    let handler = build_handler(&config).unwrap();
    TestServer::new(create_router(AppState::new(handler, config))).unwrap()
}

fn demo_server() -> TestServer {
    server_with(GatewayConfig::default())
}

#[tokio::test]
async fn test_health() {
    let server = demo_server();
    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["entities"], 2);
    assert_eq!(body["default_limit"], 5);
    assert_eq!(body["literal_filters"], false);
}

#[tokio::test]
async fn test_health_reports_configuration() {
    let config = GatewayConfig {
        default_limit: 2,
        filter_mode: docpipe_core::FilterMode::Literal,
        ..GatewayConfig::default()
    };
    let body: Value = server_with(config).get("/health").await.json();

    assert_eq!(body["default_limit"], 2);
    assert_eq!(body["literal_filters"], true);
}

#[tokio::test]
async fn test_collections_listing() {
    let server = demo_server();
    let body: Value = server.get("/collections").await.json();

    let collections = body["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 2);

    let users = collections
        .iter()
        .find(|c| c["collection"] == "users")
        .unwrap();
    assert_eq!(users["entity"], "User");
    assert_eq!(users["identity"], "_id");
    assert_eq!(users["filterable"], json!(["name", "email"]));
    assert_eq!(users["joins"], json!(["usergroups"]));
}

#[tokio::test]
async fn test_fluent_filter_hides_fields() {
    let server = demo_server();
    let response = server
        .get("/fluent/users")
        .add_query_param("filter", "ann")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["meta"]["total"], 2);

    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("password").is_none());
        assert!(user["profile"].get("phone").is_none());
        assert!(user["profile"].get("city").is_some());
        for group in user["usergroups"].as_array().unwrap() {
            assert!(group.get("inviteCode").is_none());
            assert!(group.get("name").is_some());
        }
    }
    assert_eq!(users[0]["usergroups"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_fluent_pagination() {
    let server = demo_server();

    let body: Value = server
        .get("/fluent/users")
        .add_query_param("limit", "2")
        .add_query_param("offset", "1")
        .await
        .json();
    assert_eq!(body["meta"]["total"], 6);
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["name"], "Annika Berg");

    let body: Value = server.get("/fluent/users").await.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 5);

    let body: Value = server
        .get("/fluent/users")
        .add_query_param("limit", "full")
        .await
        .json();
    assert_eq!(body["data"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_fluent_single_id() {
    let server = demo_server();
    let body: Value = server
        .get("/fluent/users")
        .add_query_param("id", format!("{:024x}", 3))
        .await
        .json();

    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"]["name"], "Bob Stone");
}

#[tokio::test]
async fn test_fluent_field_filter_and_excluded() {
    let server = demo_server();
    let excluded = json!([format!("{:024x}", 1)]).to_string();
    let body: Value = server
        .get("/fluent/users")
        .add_query_param("email", "example")
        .add_query_param("excluded", excluded)
        .add_query_param("age", "41")
        .await
        .json();

    // age is not filterable, so only email and excluded apply
    assert_eq!(body["meta"]["total"], 5);
}

#[tokio::test]
async fn test_unknown_collection() {
    let server = demo_server();
    let response = server.get("/fluent/missing").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_route() {
    let server = demo_server();
    let response = server.get("/nowhere").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "no route for /nowhere");
}

#[tokio::test]
async fn test_middleware_status_reaches_client() {
    let config = GatewayConfig::default();
    let gate = |ctx: &mut ExecContext| -> Result<(), Rejection> {
        if ctx.entity.collection() == "usergroups" {
            return Err(Rejection::forbidden("groups are private"));
        }
        Ok(())
    };
    let handler = build_handler(&config).unwrap().with_middleware(gate);
    let server = TestServer::new(create_router(AppState::new(handler, config))).unwrap();

    let response = server.get("/fluent/usergroups").await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({"data": [], "meta": {"total": 0}, "error": "groups are private"})
    );

    server.get("/fluent/users").await.assert_status_ok();
}

#[tokio::test]
async fn test_data_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let data = json!({
        "usergroups": [{"_id": {"$oid": format!("{:024x}", 9)}, "name": "ops", "inviteCode": "x"}],
        "users": [],
    });
    file.write_all(data.to_string().as_bytes()).unwrap();

    let config = GatewayConfig {
        data_path: Some(file.path().to_path_buf()),
        ..GatewayConfig::default()
    };
    let server = server_with(config);

    let body: Value = server.get("/fluent/usergroups").await.json();
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["name"], "ops");
    assert!(body["data"][0].get("inviteCode").is_none());

    let body: Value = server.get("/fluent/users").await.json();
    assert_eq!(body, json!({"data": [], "meta": {"total": 0}}));
}
