//! Storage capability used by the delivery pipeline and the HTTP surface.
//!
//! The pipeline only ever talks to [`CampaignStore`], so the Postgres store and
//! the in-memory store are interchangeable.

mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod scripted;

pub use memory::InMemoryStore;
pub use postgres::PgCampaignStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::campaign::{Campaign, CampaignStatus};
use crate::domain::delivery::Delivery;
use crate::domain::email_list::EmailList;
use crate::domain::subscriber::Subscriber;
use crate::domain::tracking_token::TrackingToken;

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("The datastore is unavailable.")]
    Unavailable(#[from] sqlx::Error),
    #[error("{0} is already subscribed to this list.")]
    DuplicateSubscriber(String),
    #[error("A stored record could not be read: {0}")]
    Corrupted(String),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_list(&self, list: &EmailList) -> Result<(), StoreError>;

    async fn find_list(&self, list_id: Uuid) -> Result<Option<EmailList>, StoreError>;

    /// Fails with [`StoreError::DuplicateSubscriber`] when the email is already on the list.
    async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError>;

    async fn find_subscriber(&self, subscriber_id: Uuid) -> Result<Option<Subscriber>, StoreError>;

    async fn find_active_subscribers(&self, list_id: Uuid) -> Result<Vec<Subscriber>, StoreError>;

    /// Returns `false` when no subscriber has this id.
    async fn deactivate_subscriber(&self, subscriber_id: Uuid) -> Result<bool, StoreError>;

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;

    async fn find_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, StoreError>;

    /// Scheduled campaigns whose `scheduled_at` is at or before `now`, oldest first.
    async fn find_due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError>;

    async fn find_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, StoreError>;

    /// Atomically moves a campaign to `sending` if its status still allows a
    /// send to begin. Returns `false` when another trigger got there first.
    async fn try_begin_sending(&self, campaign_id: Uuid) -> Result<bool, StoreError>;

    async fn mark_campaign_sent(
        &self,
        campaign_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Moves a campaign to `skipped` under the same condition as
    /// `try_begin_sending`. Returns `false` when it is already `sending` or `sent`.
    async fn mark_campaign_skipped(&self, campaign_id: Uuid) -> Result<bool, StoreError>;

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError>;

    async fn mark_delivery_sent(
        &self,
        delivery_id: Uuid,
        sent_at: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn mark_delivery_failed(&self, delivery_id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Records the first open of a `sent` delivery. Returns `false` for unknown
    /// tokens and for deliveries that are not `sent`.
    async fn mark_delivery_opened(
        &self,
        token: &TrackingToken,
        opened_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn find_deliveries(&self, campaign_id: Uuid) -> Result<Vec<Delivery>, StoreError>;
}
