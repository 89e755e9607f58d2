use pk_shop_api::routes::health::health_check;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.as_ref().expect("health data");
    assert_eq!(data.status, "ok");
}

// Non-list responses omit `meta` from the serialized body.
#[tokio::test]
async fn health_body_serializes_without_meta() {
    let response = health_check().await;
    let body = serde_json::to_value(&response.0).expect("serialize health body");

    assert_eq!(body["data"]["status"], "ok");
    assert!(body.get("meta").is_none());
}
