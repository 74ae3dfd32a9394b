use async_trait::async_trait;
use chrono::{DateTime, Utc};
use email_campaigns::{
    config::get_configuration,
    domain::campaign::{Campaign, CampaignStatus},
    domain::delivery::Delivery,
    domain::email_list::EmailList,
    domain::subscriber::Subscriber,
    domain::tracking_token::TrackingToken,
    startup::Application,
    store::{CampaignStore, InMemoryStore, StoreError},
    telemetry::{get_subscriber, init_subscriber},
};
use reqwest::{Response, Url};
use secrecy::Secret;
use std::sync::{Arc, Once};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CRON_SECRET: &str = "test-cron-secret";

static TRACING: Once = Once::new();

/// Logs are only printed when TEST_LOG is set, e.g. `TEST_LOG=true cargo test | bunyan`
fn init_tracing() {
    TRACING.call_once(|| {
        let name = String::from("test");
        let env_filter = String::from("info");

        let outcome = if std::env::var("TEST_LOG").is_ok() {
            init_subscriber(get_subscriber(name, env_filter, std::io::stdout))
        } else {
            init_subscriber(get_subscriber(name, env_filter, std::io::sink))
        };

        outcome.expect("Failed to initialize tracing.");
    });
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub email_server: MockServer,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        let store = Arc::new(InMemoryStore::new());

        Self::spawn_app_with_store(store.clone(), store).await
    }

    /// Serves requests from `app_store` while `store` stays available to the test.
    pub async fn spawn_app_with_store(
        app_store: Arc<dyn CampaignStore>,
        store: Arc<InMemoryStore>,
    ) -> TestApp {
        init_tracing();

        let mut config = get_configuration().expect("Missing configuration file.");
        let email_server = MockServer::start().await;

        // We are using port 0 as way to define a different port per each test. Port 0 is a
        // special case that operating systems take into account: when port is 0, the OS will
        // search for the first available port
        config.set_app_port(0);
        config.set_email_client_base_url(email_server.uri());
        config.application.host = String::from("127.0.0.1");
        config.delivery.batch_size = 2;
        config.delivery.batch_delay_milliseconds = 10;
        config.scheduler.cron_secret = Secret::new(String::from(CRON_SECRET));
        config.scheduler.sweep_interval_seconds = 0;

        let application = Application::build_with_store(config, app_store)
            .await
            .expect("Failed to build application.");

        let address = format!("http://127.0.0.1:{}", application.get_port());

        tokio::spawn(application.run_until_stop());

        TestApp {
            address,
            store,
            email_server,
            api_client: reqwest::Client::new(),
        }
    }

    pub async fn mount_provider(&self, status: u16) {
        Mock::given(path("/mail/send"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.email_server)
            .await;
    }

    pub async fn post_list(&self, body: serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}/lists", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_subscriber(&self, list_id: Uuid, body: serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}/lists/{}/subscribers", self.address, list_id))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_campaign(&self, body: serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}/campaigns", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_campaign(&self, campaign_id: Uuid) -> Response {
        self.api_client
            .get(format!("{}/campaigns/{}", self.address, campaign_id))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn send_campaign(&self, campaign_id: Uuid) -> Response {
        self.api_client
            .post(format!("{}/campaigns/{}/send", self.address, campaign_id))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn trigger_cron(&self, bearer: Option<&str>) -> Response {
        let mut request = self
            .api_client
            .post(format!("{}/cron/send-scheduled", self.address));

        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        request.send().await.expect("Failed to execute request.")
    }

    /// Links in emails point at the configured public URL; only their path is kept.
    pub async fn get_link(&self, link: &str) -> Response {
        let link = Url::parse(link).expect("Invalid link.");

        self.api_client
            .get(format!("{}{}", self.address, link.path()))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Creates a list holding one active subscriber per address.
    pub async fn create_list_with(&self, emails: &[&str]) -> Uuid {
        let response = self
            .post_list(serde_json::json!({ "name": "Readers" }))
            .await;
        let list: serde_json::Value = response.json().await.expect("Invalid list body.");
        let list_id = parse_id(&list["id"]);

        for (index, email) in emails.iter().enumerate() {
            let response = self
                .post_subscriber(
                    list_id,
                    serde_json::json!({
                        "email": email,
                        "first_name": format!("Reader{}", index),
                    }),
                )
                .await;
            assert_eq!(201, response.status().as_u16());
        }

        list_id
    }

    pub async fn create_campaign(&self, list_id: Uuid, html_content: &str) -> Uuid {
        let response = self
            .post_campaign(serde_json::json!({
                "name": "Launch",
                "subject": "We are live",
                "html_content": html_content,
                "list_id": list_id,
            }))
            .await;
        assert_eq!(201, response.status().as_u16());

        let campaign: serde_json::Value = response.json().await.expect("Invalid campaign body.");
        parse_id(&campaign["id"])
    }

    /// Stores a scheduled campaign directly, bypassing the lead time check.
    pub async fn insert_scheduled_campaign(
        &self,
        list_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Uuid {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: String::from("Weekly"),
            subject: String::from("This week"),
            html_content: String::from("<html><body><p>News</p></body></html>"),
            list_id,
            status: CampaignStatus::Scheduled,
            scheduled_at: Some(scheduled_at),
            sent_at: None,
            created_at: Utc::now(),
        };
        self.store
            .insert_campaign(&campaign)
            .await
            .expect("Failed to insert campaign.");

        campaign.id
    }

    /// Links found in the HTML bodies the provider received, in request order.
    pub async fn sent_links(&self) -> Vec<Vec<String>> {
        let requests = self
            .email_server
            .received_requests()
            .await
            .expect("Request recording is disabled.");

        requests
            .iter()
            .map(|request| {
                let body: serde_json::Value =
                    serde_json::from_slice(&request.body).expect("Invalid provider body.");
                let html = body["content"][0]["value"].as_str().unwrap_or_default();

                linkify::LinkFinder::new()
                    .links(html)
                    .filter(|link| *link.kind() == linkify::LinkKind::Url)
                    .map(|link| link.as_str().to_owned())
                    .collect()
            })
            .collect()
    }
}

pub fn parse_id(value: &serde_json::Value) -> Uuid {
    value
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("Missing id.")
}

/// A store whose database is gone.
pub struct UnavailableStore;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl CampaignStore for UnavailableStore {
    async fn insert_list(&self, _: &EmailList) -> Result<(), StoreError> {
        unavailable()
    }

    async fn find_list(&self, _: Uuid) -> Result<Option<EmailList>, StoreError> {
        unavailable()
    }

    async fn insert_subscriber(&self, _: &Subscriber) -> Result<(), StoreError> {
        unavailable()
    }

    async fn find_subscriber(&self, _: Uuid) -> Result<Option<Subscriber>, StoreError> {
        unavailable()
    }

    async fn find_active_subscribers(&self, _: Uuid) -> Result<Vec<Subscriber>, StoreError> {
        unavailable()
    }

    async fn deactivate_subscriber(&self, _: Uuid) -> Result<bool, StoreError> {
        unavailable()
    }

    async fn insert_campaign(&self, _: &Campaign) -> Result<(), StoreError> {
        unavailable()
    }

    async fn find_campaign(&self, _: Uuid) -> Result<Option<Campaign>, StoreError> {
        unavailable()
    }

    async fn find_due_campaigns(&self, _: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        unavailable()
    }

    async fn find_campaigns_by_status(
        &self,
        _: CampaignStatus,
    ) -> Result<Vec<Campaign>, StoreError> {
        unavailable()
    }

    async fn try_begin_sending(&self, _: Uuid) -> Result<bool, StoreError> {
        unavailable()
    }

    async fn mark_campaign_sent(&self, _: Uuid, _: DateTime<Utc>) -> Result<(), StoreError> {
        unavailable()
    }

    async fn mark_campaign_skipped(&self, _: Uuid) -> Result<bool, StoreError> {
        unavailable()
    }

    async fn insert_delivery(&self, _: &Delivery) -> Result<(), StoreError> {
        unavailable()
    }

    async fn mark_delivery_sent(
        &self,
        _: Uuid,
        _: DateTime<Utc>,
        _: Option<&str>,
    ) -> Result<(), StoreError> {
        unavailable()
    }

    async fn mark_delivery_failed(&self, _: Uuid, _: &str) -> Result<(), StoreError> {
        unavailable()
    }

    async fn mark_delivery_opened(
        &self,
        _: &TrackingToken,
        _: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        unavailable()
    }

    async fn find_deliveries(&self, _: Uuid) -> Result<Vec<Delivery>, StoreError> {
        unavailable()
    }
}
