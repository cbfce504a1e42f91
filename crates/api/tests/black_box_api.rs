use reqwest::StatusCode;
use serde_json::{json, Value};

use stockroom_api::config::AppConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod, in-memory stores), but bind to an ephemeral port.
        let app = stockroom_api::app::build_app(&AppConfig::default())
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/product-management{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn add_products(client: &reqwest::Client, srv: &TestServer, products: Value) -> (StatusCode, Value) {
    let res = client
        .post(srv.url("/products"))
        .json(&json!({ "products": products, "comment": "restock", "username": "tester" }))
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn order(client: &reqwest::Client, srv: &TestServer, lines: Value) -> (StatusCode, Value) {
    let res = client
        .post(srv.url("/order"))
        .json(&json!({ "productsOrder": lines }))
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_in_memory_stores() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["stores"], "in_memory");
}

#[tokio::test]
async fn intake_order_and_depletion_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = add_products(
        &client,
        &srv,
        json!([{ "name": "apple", "description": "red", "price": 2, "quantity": 10 }]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "addedProducts": { "apple": 10 } }));

    let (_, body) = add_products(
        &client,
        &srv,
        json!([{ "name": "apple", "price": 2, "quantity": 5 }]),
    )
    .await;
    assert_eq!(body, json!({ "addedProducts": { "apple": 15 } }));

    let res = client.get(srv.url("/available-products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed, json!({ "products": [{ "name": "apple", "quantity": 15 }] }));

    let (status, body) = order(&client, &srv, json!({ "apple": 15 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderedProducts"], json!(["apple"]));
    assert!(body["orderId"].as_i64().unwrap() > 0);
    assert!(body.get("unavailableProducts").is_none());

    let res = client.get(srv.url("/available-products")).send().await.unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed, json!({ "products": [] }));

    let (status, body) = order(&client, &srv, json!({ "apple": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "unavailableProducts": ["apple"] }));
}

#[tokio::test]
async fn invalid_intake_lines_are_left_out_of_the_response() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = add_products(
        &client,
        &srv,
        json!([
            { "name": "apple", "price": 0, "quantity": 10 },
            { "name": "pear", "price": 3, "quantity": 0 },
            { "name": "kiwi", "price": 4, "quantity": 6 }
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "addedProducts": { "kiwi": 6 } }));
}

#[tokio::test]
async fn partially_available_order_is_rejected_whole() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    add_products(&client, &srv, json!([{ "name": "apple", "price": 2, "quantity": 10 }])).await;

    let (status, body) = order(&client, &srv, json!({ "apple": 2, "kiwi": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "unavailableProducts": ["kiwi"] }));

    let res = client.get(srv.url("/available-products")).send().await.unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed["products"][0]["quantity"], 10);
}

#[tokio::test]
async fn best_sellers_rank_recent_orders() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/products/best-seller")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let empty: Value = res.json().await.unwrap();
    assert_eq!(empty, json!({ "products": [] }));

    add_products(
        &client,
        &srv,
        json!([
            { "name": "apple", "price": 2, "quantity": 10 },
            { "name": "pear", "price": 3, "quantity": 10 }
        ]),
    )
    .await;
    order(&client, &srv, json!({ "apple": 2, "pear": 1 })).await;
    order(&client, &srv, json!({ "pear": 4 })).await;

    let res = client.get(srv.url("/products/best-seller")).send().await.unwrap();
    let ranked: Value = res.json().await.unwrap();
    assert_eq!(
        ranked,
        json!({ "products": [
            { "name": "pear", "quantity": 5 },
            { "name": "apple", "quantity": 2 }
        ] })
    );
}

#[tokio::test]
async fn malformed_bodies_are_rejected_at_the_boundary() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/products"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let (status, body) = order(&client, &srv, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}
