use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::delivery::dispatcher::{CampaignDispatcher, DispatchError};
use crate::domain::campaign::CampaignStatus;
use crate::store::{CampaignStore, StoreError};

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CampaignOutcome {
    Sent {
        campaign_id: Uuid,
        recipient_count: usize,
        success: usize,
        failure: usize,
    },
    Skipped {
        campaign_id: Uuid,
        reason: String,
    },
    Failed {
        campaign_id: Uuid,
        reason: String,
    },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SweepSummary {
    pub processed: usize,
    pub results: Vec<CampaignOutcome>,
    /// Campaigns already in `sending` when the sweep started.
    pub in_flight: Vec<Uuid>,
}

/// Sends every scheduled campaign that has come due, one after the other.
pub struct SchedulerSweep {
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<CampaignDispatcher>,
}

impl SchedulerSweep {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        dispatcher: Arc<CampaignDispatcher>,
    ) -> SchedulerSweep {
        SchedulerSweep { store, dispatcher }
    }

    #[tracing::instrument(name = "Sweep due campaigns", skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary, StoreError> {
        let in_flight: Vec<Uuid> = self
            .store
            .find_campaigns_by_status(CampaignStatus::Sending)
            .await?
            .into_iter()
            .map(|campaign| campaign.id)
            .collect();

        for campaign_id in &in_flight {
            tracing::warn!(%campaign_id, "Campaign is still in the sending state");
        }

        let due_campaigns = self.store.find_due_campaigns(now).await?;
        let mut results = Vec::with_capacity(due_campaigns.len());

        for campaign in due_campaigns {
            let outcome = match self.dispatcher.dispatch(campaign.id).await {
                Ok(summary) => CampaignOutcome::Sent {
                    campaign_id: campaign.id,
                    recipient_count: summary.total,
                    success: summary.success,
                    failure: summary.failure,
                },
                Err(DispatchError::NoEligibleRecipients(_)) => CampaignOutcome::Skipped {
                    campaign_id: campaign.id,
                    reason: String::from("No active subscribers"),
                },
                Err(error) => {
                    tracing::error!(
                        campaign_id = %campaign.id,
                        "Failed to send a due campaign: {:?}",
                        error
                    );
                    CampaignOutcome::Failed {
                        campaign_id: campaign.id,
                        reason: crate::error_chain_message(&error),
                    }
                }
            };

            results.push(outcome);
        }

        tracing::info!(processed = results.len(), "Sweep finished");

        Ok(SweepSummary {
            processed: results.len(),
            results,
            in_flight,
        })
    }

    /// Sweeps every `period`, forever. Errors are logged and the next tick runs anyway.
    pub async fn run_every(&self, period: Duration) -> Result<(), std::io::Error> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(error) = self.sweep(Utc::now()).await {
                tracing::error!("Scheduled sweep failed: {:?}", error);
            }
        }
    }
}
