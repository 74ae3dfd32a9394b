use crate::helpers::{parse_id, TestApp};
use email_campaigns::store::CampaignStore;

#[tokio::test]
async fn create_list_returns_201_with_the_new_list() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post_list(serde_json::json!({ "name": "  Weekly readers " }))
        .await;

    assert_eq!(201, response.status().as_u16());
    let list: serde_json::Value = response.json().await.unwrap();
    assert_eq!(list["name"], "Weekly readers");
    let stored = test_app.store.find_list(parse_id(&list["id"])).await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn create_list_returns_400_for_a_blank_name() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.post_list(serde_json::json!({ "name": "   " })).await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn add_subscriber_normalizes_and_stores_an_active_member() {
    let test_app = TestApp::spawn_app().await;
    let list_id = test_app.create_list_with(&[]).await;

    let response = test_app
        .post_subscriber(
            list_id,
            serde_json::json!({
                "email": " Ana@Example.com ",
                "first_name": "Ana",
                "last_name": "",
            }),
        )
        .await;

    assert_eq!(201, response.status().as_u16());
    let subscriber: serde_json::Value = response.json().await.unwrap();
    assert_eq!(subscriber["email"], "ana@example.com");
    assert_eq!(subscriber["first_name"], "Ana");
    assert!(subscriber["last_name"].is_null());
    assert_eq!(subscriber["status"], "active");

    let active = test_app.store.find_active_subscribers(list_id).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn add_subscriber_returns_400_when_data_is_invalid() {
    let test_app = TestApp::spawn_app().await;
    let list_id = test_app.create_list_with(&[]).await;
    let test_cases = vec![
        (serde_json::json!({ "email": "not-an-email" }), "invalid email"),
        (serde_json::json!({ "email": "" }), "empty email"),
        (
            serde_json::json!({ "email": "ana@example.com", "first_name": "Ana<script>" }),
            "forbidden characters in the name",
        ),
        (serde_json::json!({ "first_name": "Ana" }), "missing email"),
    ];

    for (body, description) in test_cases {
        let response = test_app.post_subscriber(list_id, body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
    }
}

#[tokio::test]
async fn add_subscriber_returns_404_for_an_unknown_list() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post_subscriber(
            uuid::Uuid::new_v4(),
            serde_json::json!({ "email": "ana@example.com" }),
        )
        .await;

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn add_subscriber_returns_409_for_a_duplicate_email() {
    let test_app = TestApp::spawn_app().await;
    let list_id = test_app.create_list_with(&["ana@example.com"]).await;

    let response = test_app
        .post_subscriber(list_id, serde_json::json!({ "email": "ANA@example.com" }))
        .await;

    assert_eq!(409, response.status().as_u16());
}
