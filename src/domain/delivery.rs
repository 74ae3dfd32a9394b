use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::tracking_token::TrackingToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Opened,
}

impl DeliveryStatus {
    pub fn parse(status: String) -> Result<DeliveryStatus, String> {
        match status.as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            "opened" => Ok(DeliveryStatus::Opened),
            _ => Err(format!("{} is not a valid delivery status", status)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Opened => "opened",
        }
    }
}

impl AsRef<str> for DeliveryStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("A {from} delivery cannot become {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// One send attempt of a campaign to one subscriber.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Delivery {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub subscriber_id: Uuid,
    pub email: SubscriberEmail,
    pub tracking_token: TrackingToken,
    pub status: DeliveryStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl Delivery {
    pub fn pending(campaign_id: Uuid, subscriber: &Subscriber) -> Delivery {
        Delivery {
            id: Uuid::new_v4(),
            campaign_id,
            subscriber_id: subscriber.id,
            email: subscriber.email.clone(),
            tracking_token: TrackingToken::generate(),
            status: DeliveryStatus::Pending,
            sent_at: None,
            opened_at: None,
            provider_message_id: None,
            error: None,
        }
    }

    pub fn mark_sent(
        &mut self,
        sent_at: DateTime<Utc>,
        provider_message_id: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.ensure_pending(DeliveryStatus::Sent)?;
        self.status = DeliveryStatus::Sent;
        self.sent_at = Some(sent_at);
        self.provider_message_id = provider_message_id;

        Ok(())
    }

    pub fn mark_failed(&mut self, error: String) -> Result<(), InvalidTransition> {
        self.ensure_pending(DeliveryStatus::Failed)?;
        self.status = DeliveryStatus::Failed;
        self.error = Some(error);

        Ok(())
    }

    /// First open wins: only a `sent` delivery moves, and it moves once.
    pub fn mark_opened(&mut self, opened_at: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if self.status != DeliveryStatus::Sent {
            return Err(InvalidTransition {
                from: self.status.as_str(),
                to: "opened",
            });
        }

        self.status = DeliveryStatus::Opened;
        self.opened_at = Some(opened_at);

        Ok(())
    }

    fn ensure_pending(&self, to: DeliveryStatus) -> Result<(), InvalidTransition> {
        if self.status != DeliveryStatus::Pending {
            return Err(InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }

        Ok(())
    }
}

/// Per-status counts of a campaign's deliveries. Opened deliveries were also
/// sent, so they count towards `sent` as well.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeliveryStats {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
    pub opened: usize,
}

impl DeliveryStats {
    pub fn from_deliveries(deliveries: &[Delivery]) -> DeliveryStats {
        deliveries
            .iter()
            .fold(DeliveryStats::default(), |mut stats, delivery| {
                stats.total += 1;
                match delivery.status {
                    DeliveryStatus::Pending => stats.pending += 1,
                    DeliveryStatus::Sent => stats.sent += 1,
                    DeliveryStatus::Failed => stats.failed += 1,
                    DeliveryStatus::Opened => {
                        stats.sent += 1;
                        stats.opened += 1;
                    }
                }
                stats
            })
    }
}
