use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::delivery::batcher::{Batcher, Interrupted};
use crate::delivery::template::{render, Personalization};
use crate::domain::campaign::{Campaign, CampaignStatus};
use crate::domain::delivery::{Delivery, DeliveryStatus};
use crate::domain::subscriber::Subscriber;
use crate::domain::tracking_token::TrackingToken;
use crate::email_client::EmailProvider;
use crate::store::{CampaignStore, StoreError};

#[derive(Debug, Clone, serde::Serialize)]
pub struct RecipientOutcome {
    pub delivery_id: Uuid,
    pub subscriber_id: Uuid,
    pub email: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchSummary {
    pub campaign_id: Uuid,
    /// Eligible recipients, including any that were never attempted.
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub outcomes: Vec<RecipientOutcome>,
}

impl DispatchSummary {
    fn new(campaign_id: Uuid, total: usize, outcomes: Vec<RecipientOutcome>) -> DispatchSummary {
        let success = outcomes
            .iter()
            .filter(|outcome| outcome.status == DeliveryStatus::Sent)
            .count();

        DispatchSummary {
            campaign_id,
            total,
            success,
            failure: outcomes.len() - success,
            outcomes,
        }
    }

    pub fn attempted(&self) -> usize {
        self.success + self.failure
    }
}

#[derive(thiserror::Error)]
pub enum DispatchError {
    #[error("Campaign {0} was not found.")]
    CampaignNotFound(Uuid),
    #[error("Campaign {0} has already been sent.")]
    AlreadySent(Uuid),
    #[error("Campaign {0} is already being sent.")]
    AlreadySending(Uuid),
    #[error("Campaign {0} has no active subscribers.")]
    NoEligibleRecipients(Uuid),
    #[error("Failed to prepare the campaign send.")]
    StorageUnavailable(#[from] StoreError),
    #[error(
        "Campaign {} was interrupted after {} of {} deliveries.",
        .partial.campaign_id,
        .partial.attempted(),
        .partial.total
    )]
    Interrupted {
        partial: DispatchSummary,
        #[source]
        source: StoreError,
    },
}

impl std::fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

/// A storage write of `deliver` failed. `outcome` is set once the provider was
/// called, so the attempt still counts.
struct UnrecordedDelivery {
    outcome: Option<RecipientOutcome>,
    source: StoreError,
}

/// Sends one campaign to every active subscriber of its list.
pub struct CampaignDispatcher {
    store: Arc<dyn CampaignStore>,
    email_provider: Arc<dyn EmailProvider>,
    batcher: Batcher,
    base_url: String,
}

impl CampaignDispatcher {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        email_provider: Arc<dyn EmailProvider>,
        batcher: Batcher,
        base_url: String,
    ) -> CampaignDispatcher {
        CampaignDispatcher {
            store,
            email_provider,
            batcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[tracing::instrument(
        name = "Dispatch a campaign",
        skip(self),
        fields(recipients = tracing::field::Empty)
    )]
    pub async fn dispatch(&self, campaign_id: Uuid) -> Result<DispatchSummary, DispatchError> {
        let campaign = self
            .store
            .find_campaign(campaign_id)
            .await?
            .ok_or(DispatchError::CampaignNotFound(campaign_id))?;

        match campaign.status {
            CampaignStatus::Sent => return Err(DispatchError::AlreadySent(campaign_id)),
            CampaignStatus::Sending => return Err(DispatchError::AlreadySending(campaign_id)),
            _ => {}
        }

        let subscribers = self.store.find_active_subscribers(campaign.list_id).await?;

        // Another trigger may have claimed the campaign since it was loaded
        if subscribers.is_empty() {
            if !self.store.mark_campaign_skipped(campaign_id).await? {
                return Err(self.claimed_elsewhere(campaign_id).await);
            }
            tracing::warn!("Campaign skipped, its list has no active subscribers");
            return Err(DispatchError::NoEligibleRecipients(campaign_id));
        }

        if !self.store.try_begin_sending(campaign_id).await? {
            return Err(self.claimed_elsewhere(campaign_id).await);
        }

        let total = subscribers.len();
        tracing::Span::current().record("recipients", total);

        let outcomes = match self
            .batcher
            .run(subscribers, |subscriber| self.deliver(&campaign, subscriber))
            .await
        {
            Ok(outcomes) => outcomes,
            Err(Interrupted {
                mut completed,
                error,
                further_errors,
            }) => {
                completed.extend(error.outcome);
                completed.extend(further_errors.into_iter().filter_map(|other| other.outcome));
                let partial = DispatchSummary::new(campaign_id, total, completed);
                tracing::error!(
                    "Campaign send interrupted, it stays in the sending state: {:?}",
                    error.source
                );
                return Err(DispatchError::Interrupted {
                    partial,
                    source: error.source,
                });
            }
        };

        let summary = DispatchSummary::new(campaign_id, total, outcomes);

        if let Err(error) = self.store.mark_campaign_sent(campaign_id, Utc::now()).await {
            tracing::error!("Failed to mark the campaign as sent: {:?}", error);
            return Err(DispatchError::Interrupted {
                partial: summary,
                source: error,
            });
        }

        tracing::info!(
            success = summary.success,
            failure = summary.failure,
            "Campaign sent"
        );

        Ok(summary)
    }

    /// Status-guarded writes failed: the campaign was sent or claimed elsewhere.
    async fn claimed_elsewhere(&self, campaign_id: Uuid) -> DispatchError {
        match self.store.find_campaign(campaign_id).await {
            Ok(Some(campaign)) if campaign.status == CampaignStatus::Sent => {
                DispatchError::AlreadySent(campaign_id)
            }
            Ok(Some(_)) => DispatchError::AlreadySending(campaign_id),
            Ok(None) => DispatchError::CampaignNotFound(campaign_id),
            Err(error) => DispatchError::StorageUnavailable(error),
        }
    }

    #[tracing::instrument(
        name = "Deliver a campaign to a subscriber",
        skip(self, campaign, subscriber),
        fields(subscriber_id = %subscriber.id)
    )]
    async fn deliver(
        &self,
        campaign: &Campaign,
        subscriber: Subscriber,
    ) -> Result<RecipientOutcome, UnrecordedDelivery> {
        // Recorded before the send so an interrupted run leaves a pending trail
        let delivery = Delivery::pending(campaign.id, &subscriber);
        self.store
            .insert_delivery(&delivery)
            .await
            .map_err(|source| UnrecordedDelivery {
                outcome: None,
                source,
            })?;

        let html_content =
            self.personalized_content(campaign, &subscriber, &delivery.tracking_token);
        let timeout = self.email_provider.timeout();
        let send = self
            .email_provider
            .send_email(&subscriber.email, &campaign.subject, &html_content);

        let send_error = match tokio::time::timeout(timeout, send).await {
            Ok(Ok(receipt)) => {
                let outcome = RecipientOutcome {
                    delivery_id: delivery.id,
                    subscriber_id: subscriber.id,
                    email: subscriber.email.to_string(),
                    status: DeliveryStatus::Sent,
                    error: None,
                };

                return match self
                    .store
                    .mark_delivery_sent(
                        delivery.id,
                        Utc::now(),
                        receipt.provider_message_id.as_deref(),
                    )
                    .await
                {
                    Ok(()) => Ok(outcome),
                    Err(source) => Err(UnrecordedDelivery {
                        outcome: Some(outcome),
                        source,
                    }),
                };
            }
            Ok(Err(error)) => crate::error_chain_message(&error),
            Err(_) => format!("The email provider did not answer within {:?}.", timeout),
        };

        tracing::warn!("Failed to deliver the campaign: {}", send_error);
        let recorded = self.store.mark_delivery_failed(delivery.id, &send_error).await;
        let outcome = RecipientOutcome {
            delivery_id: delivery.id,
            subscriber_id: subscriber.id,
            email: subscriber.email.to_string(),
            status: DeliveryStatus::Failed,
            error: Some(send_error),
        };

        match recorded {
            Ok(()) => Ok(outcome),
            Err(source) => Err(UnrecordedDelivery {
                outcome: Some(outcome),
                source,
            }),
        }
    }

    fn personalized_content(
        &self,
        campaign: &Campaign,
        subscriber: &Subscriber,
        tracking_token: &TrackingToken,
    ) -> String {
        let unsubscribe_url = format!("{}/unsubscribe/{}", self.base_url, subscriber.id);
        let beacon_url = format!("{}/track/{}", self.base_url, tracking_token.as_ref());
        let values = Personalization {
            first_name: subscriber.first_name.as_ref().map(|name| name.as_ref()),
            last_name: subscriber.last_name.as_ref().map(|name| name.as_ref()),
            email: subscriber.email.as_ref(),
            unsubscribe_url: &unsubscribe_url,
        };

        render(&campaign.html_content, &values, &beacon_url)
    }
}
