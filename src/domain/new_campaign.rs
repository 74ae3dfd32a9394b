use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::campaign::{Campaign, CampaignStatus};

#[derive(Deserialize, Debug)]
pub struct NewCampaignBody {
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub list_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Turns a creation request into a campaign. A schedule must leave at least
/// `lead_time` between `now` and the send.
pub fn parse_new_campaign(
    body: NewCampaignBody,
    now: DateTime<Utc>,
    lead_time: Duration,
) -> Result<Campaign, String> {
    if body.name.trim().is_empty() {
        return Err(String::from("A campaign name cannot be empty"));
    }

    if body.subject.trim().is_empty() {
        return Err(String::from("A campaign subject cannot be empty"));
    }

    if body.html_content.trim().is_empty() {
        return Err(String::from("A campaign needs some HTML content"));
    }

    if let Some(scheduled_at) = body.scheduled_at {
        if scheduled_at < now + lead_time {
            return Err(format!(
                "{} is too early, campaigns must be scheduled at least {} minutes ahead",
                scheduled_at,
                lead_time.num_minutes()
            ));
        }
    }

    let status = match body.scheduled_at {
        Some(_) => CampaignStatus::Scheduled,
        None => CampaignStatus::Draft,
    };

    Ok(Campaign {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        subject: body.subject,
        html_content: body.html_content,
        list_id: body.list_id,
        status,
        scheduled_at: body.scheduled_at,
        sent_at: None,
        created_at: now,
    })
}
