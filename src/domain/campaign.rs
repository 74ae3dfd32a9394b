use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    /// The list had no active subscribers when the send was attempted.
    Skipped,
}

impl CampaignStatus {
    /// Statuses from which a send may begin.
    pub fn can_start_sending(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Draft | CampaignStatus::Scheduled | CampaignStatus::Skipped
        )
    }

    pub fn parse(status: String) -> Result<CampaignStatus, String> {
        match status.as_str() {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "sent" => Ok(CampaignStatus::Sent),
            "skipped" => Ok(CampaignStatus::Skipped),
            _ => Err(format!("{} is not a valid campaign status", status)),
        }
    }
}

impl AsRef<str> for CampaignStatus {
    fn as_ref(&self) -> &str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub list_id: Uuid,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Set exactly when `status` is `Sent`.
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Scheduled
            && self.scheduled_at.map_or(false, |scheduled_at| scheduled_at <= now)
    }
}
