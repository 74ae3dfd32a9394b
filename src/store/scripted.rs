use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use super::{CampaignStore, InMemoryStore, StoreError};
use crate::domain::campaign::{Campaign, CampaignStatus};
use crate::domain::delivery::Delivery;
use crate::domain::email_list::EmailList;
use crate::domain::subscriber::Subscriber;
use crate::domain::tracking_token::TrackingToken;

#[derive(Default)]
struct Script {
    deliveries_before_failure: Option<usize>,
    failing_campaigns: Vec<Uuid>,
    fail_marking_sent: bool,
    fail_due_query: bool,
    sent_elsewhere_during_lookup: bool,
    inserted_deliveries: usize,
}

/// An [`InMemoryStore`] that fails or races on cue.
#[derive(Default)]
pub struct ScriptedStore {
    inner: InMemoryStore,
    script: Mutex<Script>,
}

fn unavailable() -> StoreError {
    StoreError::Unavailable(sqlx::Error::PoolTimedOut)
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery inserts fail once `count` of them have succeeded.
    pub fn fail_deliveries_after(&self, count: usize) {
        self.script.lock().unwrap().deliveries_before_failure = Some(count);
    }

    pub fn fail_deliveries_of(&self, campaign_id: Uuid) {
        self.script.lock().unwrap().failing_campaigns.push(campaign_id);
    }

    pub fn fail_marking_deliveries_sent(&self) {
        self.script.lock().unwrap().fail_marking_sent = true;
    }

    pub fn fail_due_query(&self) {
        self.script.lock().unwrap().fail_due_query = true;
    }

    /// The next subscriber lookup finds the campaign sent by another trigger
    /// and its list emptied.
    pub fn send_elsewhere_during_lookup(&self) {
        self.script.lock().unwrap().sent_elsewhere_during_lookup = true;
    }

    fn take_lookup_race(&self) -> bool {
        std::mem::take(&mut self.script.lock().unwrap().sent_elsewhere_during_lookup)
    }

    fn delivery_insert_fails(&self, delivery: &Delivery) -> bool {
        let mut script = self.script.lock().unwrap();

        if script.failing_campaigns.contains(&delivery.campaign_id) {
            return true;
        }

        let exhausted = script
            .deliveries_before_failure
            .map_or(false, |limit| script.inserted_deliveries >= limit);
        if !exhausted {
            script.inserted_deliveries += 1;
        }

        exhausted
    }
}

#[async_trait]
impl CampaignStore for ScriptedStore {
    async fn insert_list(&self, list: &EmailList) -> Result<(), StoreError> {
        self.inner.insert_list(list).await
    }

    async fn find_list(&self, list_id: Uuid) -> Result<Option<EmailList>, StoreError> {
        self.inner.find_list(list_id).await
    }

    async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        self.inner.insert_subscriber(subscriber).await
    }

    async fn find_subscriber(&self, subscriber_id: Uuid) -> Result<Option<Subscriber>, StoreError> {
        self.inner.find_subscriber(subscriber_id).await
    }

    async fn find_active_subscribers(&self, list_id: Uuid) -> Result<Vec<Subscriber>, StoreError> {
        if !self.take_lookup_race() {
            return self.inner.find_active_subscribers(list_id).await;
        }

        for campaign in self.inner.find_campaigns_by_status(CampaignStatus::Draft).await? {
            if campaign.list_id == list_id && self.inner.try_begin_sending(campaign.id).await? {
                self.inner.mark_campaign_sent(campaign.id, Utc::now()).await?;
            }
        }
        for subscriber in self.inner.find_active_subscribers(list_id).await? {
            self.inner.deactivate_subscriber(subscriber.id).await?;
        }

        Ok(Vec::new())
    }

    async fn deactivate_subscriber(&self, subscriber_id: Uuid) -> Result<bool, StoreError> {
        self.inner.deactivate_subscriber(subscriber_id).await
    }

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        self.inner.insert_campaign(campaign).await
    }

    async fn find_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, StoreError> {
        self.inner.find_campaign(campaign_id).await
    }

    async fn find_due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        if self.script.lock().unwrap().fail_due_query {
            return Err(unavailable());
        }
        self.inner.find_due_campaigns(now).await
    }

    async fn find_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, StoreError> {
        self.inner.find_campaigns_by_status(status).await
    }

    async fn try_begin_sending(&self, campaign_id: Uuid) -> Result<bool, StoreError> {
        self.inner.try_begin_sending(campaign_id).await
    }

    async fn mark_campaign_sent(
        &self,
        campaign_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.mark_campaign_sent(campaign_id, sent_at).await
    }

    async fn mark_campaign_skipped(&self, campaign_id: Uuid) -> Result<bool, StoreError> {
        self.inner.mark_campaign_skipped(campaign_id).await
    }

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        if self.delivery_insert_fails(delivery) {
            return Err(unavailable());
        }
        self.inner.insert_delivery(delivery).await
    }

    async fn mark_delivery_sent(
        &self,
        delivery_id: Uuid,
        sent_at: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> Result<(), StoreError> {
        if self.script.lock().unwrap().fail_marking_sent {
            return Err(unavailable());
        }
        self.inner
            .mark_delivery_sent(delivery_id, sent_at, provider_message_id)
            .await
    }

    async fn mark_delivery_failed(&self, delivery_id: Uuid, error: &str) -> Result<(), StoreError> {
        self.inner.mark_delivery_failed(delivery_id, error).await
    }

    async fn mark_delivery_opened(
        &self,
        token: &TrackingToken,
        opened_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.mark_delivery_opened(token, opened_at).await
    }

    async fn find_deliveries(&self, campaign_id: Uuid) -> Result<Vec<Delivery>, StoreError> {
        self.inner.find_deliveries(campaign_id).await
    }
}
