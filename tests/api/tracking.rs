use email_campaigns::domain::delivery::DeliveryStatus;
use email_campaigns::store::CampaignStore;

use crate::helpers::TestApp;

const HTML: &str = "<html><body><p>Hello</p></body></html>";

#[tokio::test]
async fn opening_an_email_twice_records_a_single_open() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_provider(200).await;
    let list_id = test_app.create_list_with(&["ana@example.com"]).await;
    let campaign_id = test_app.create_campaign(list_id, HTML).await;
    test_app.send_campaign(campaign_id).await;

    let links = test_app.sent_links().await.remove(0);
    let beacon = links
        .iter()
        .find(|link| link.contains("/track/"))
        .expect("No beacon in the email.");

    let first = test_app.get_link(beacon).await;
    assert_eq!(200, first.status().as_u16());
    assert_eq!(first.headers()["content-type"], "image/gif");
    assert_eq!(
        first.headers()["cache-control"],
        "no-store, no-cache, must-revalidate, proxy-revalidate"
    );
    assert_eq!(first.headers()["pragma"], "no-cache");
    assert_eq!(first.headers()["expires"], "0");
    let first_bytes = first.bytes().await.unwrap();

    let opened_at = test_app.store.find_deliveries(campaign_id).await.unwrap()[0].opened_at;

    let second = test_app.get_link(beacon).await;
    assert_eq!(200, second.status().as_u16());
    assert_eq!(first_bytes, second.bytes().await.unwrap());

    let delivery = test_app.store.find_deliveries(campaign_id).await.unwrap().remove(0);
    assert_eq!(delivery.status, DeliveryStatus::Opened);
    assert!(delivery.opened_at.is_some());
    assert_eq!(delivery.opened_at, opened_at);

    let details: serde_json::Value = test_app.get_campaign(campaign_id).await.json().await.unwrap();
    assert_eq!(details["stats"]["opened"], 1);
}

#[tokio::test]
async fn unknown_tokens_still_get_the_pixel() {
    let test_app = TestApp::spawn_app().await;

    for token in ["doesnotexist", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"] {
        let response = test_app
            .api_client
            .get(format!("{}/track/{}", test_app.address, token))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(200, response.status().as_u16());
        assert_eq!(response.headers()["content-type"], "image/gif");
        assert_eq!(&response.bytes().await.unwrap()[..6], b"GIF89a");
    }
}
