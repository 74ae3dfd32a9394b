use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CampaignStore, StoreError};
use crate::domain::campaign::{Campaign, CampaignStatus};
use crate::domain::delivery::Delivery;
use crate::domain::email_list::EmailList;
use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::domain::tracking_token::TrackingToken;

#[derive(Default)]
struct Tables {
    lists: Vec<EmailList>,
    subscribers: Vec<Subscriber>,
    campaigns: Vec<Campaign>,
    deliveries: Vec<Delivery>,
}

/// Process-local store with the same semantics as the Postgres one. Records
/// keep insertion order.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn insert_list(&self, list: &EmailList) -> Result<(), StoreError> {
        self.tables.lock().await.lists.push(list.clone());
        Ok(())
    }

    async fn find_list(&self, list_id: Uuid) -> Result<Option<EmailList>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables.lists.iter().find(|list| list.id == list_id).cloned())
    }

    async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let is_duplicate = tables
            .subscribers
            .iter()
            .any(|other| other.list_id == subscriber.list_id && other.email == subscriber.email);

        if is_duplicate {
            return Err(StoreError::DuplicateSubscriber(
                subscriber.email.to_string(),
            ));
        }

        tables.subscribers.push(subscriber.clone());
        Ok(())
    }

    async fn find_subscriber(&self, subscriber_id: Uuid) -> Result<Option<Subscriber>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables
            .subscribers
            .iter()
            .find(|subscriber| subscriber.id == subscriber_id)
            .cloned())
    }

    async fn find_active_subscribers(&self, list_id: Uuid) -> Result<Vec<Subscriber>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.list_id == list_id && subscriber.status.is_active())
            .cloned()
            .collect())
    }

    async fn deactivate_subscriber(&self, subscriber_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        match tables
            .subscribers
            .iter_mut()
            .find(|subscriber| subscriber.id == subscriber_id)
        {
            Some(subscriber) => {
                subscriber.status = SubscriberStatus::Inactive;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        self.tables.lock().await.campaigns.push(campaign.clone());
        Ok(())
    }

    async fn find_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables
            .campaigns
            .iter()
            .find(|campaign| campaign.id == campaign_id)
            .cloned())
    }

    async fn find_due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        let tables = self.tables.lock().await;
        let mut due: Vec<Campaign> = tables
            .campaigns
            .iter()
            .filter(|campaign| campaign.is_due(now))
            .cloned()
            .collect();

        due.sort_by_key(|campaign| campaign.scheduled_at);
        Ok(due)
    }

    async fn find_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables
            .campaigns
            .iter()
            .filter(|campaign| campaign.status == status)
            .cloned()
            .collect())
    }

    async fn try_begin_sending(&self, campaign_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        match tables
            .campaigns
            .iter_mut()
            .find(|campaign| campaign.id == campaign_id)
        {
            Some(campaign) if campaign.status.can_start_sending() => {
                campaign.status = CampaignStatus::Sending;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_campaign_sent(
        &self,
        campaign_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if let Some(campaign) = tables
            .campaigns
            .iter_mut()
            .find(|campaign| campaign.id == campaign_id)
        {
            campaign.status = CampaignStatus::Sent;
            campaign.sent_at = Some(sent_at);
        }

        Ok(())
    }

    async fn mark_campaign_skipped(&self, campaign_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        match tables
            .campaigns
            .iter_mut()
            .find(|campaign| campaign.id == campaign_id)
        {
            Some(campaign) if campaign.status.can_start_sending() => {
                campaign.status = CampaignStatus::Skipped;
                campaign.sent_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        self.tables.lock().await.deliveries.push(delivery.clone());
        Ok(())
    }

    async fn mark_delivery_sent(
        &self,
        delivery_id: Uuid,
        sent_at: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if let Some(delivery) = tables
            .deliveries
            .iter_mut()
            .find(|delivery| delivery.id == delivery_id)
        {
            // Transitions out of anything but pending are dropped, as in the SQL store
            let _ = delivery.mark_sent(sent_at, provider_message_id.map(String::from));
        }

        Ok(())
    }

    async fn mark_delivery_failed(&self, delivery_id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if let Some(delivery) = tables
            .deliveries
            .iter_mut()
            .find(|delivery| delivery.id == delivery_id)
        {
            let _ = delivery.mark_failed(error.to_string());
        }

        Ok(())
    }

    async fn mark_delivery_opened(
        &self,
        token: &TrackingToken,
        opened_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        Ok(tables
            .deliveries
            .iter_mut()
            .find(|delivery| &delivery.tracking_token == token)
            .map_or(false, |delivery| delivery.mark_opened(opened_at).is_ok()))
    }

    async fn find_deliveries(&self, campaign_id: Uuid) -> Result<Vec<Delivery>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables
            .deliveries
            .iter()
            .filter(|delivery| delivery.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}
