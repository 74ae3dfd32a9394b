use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct EmailList {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct NewEmailListBody {
    pub name: String,
}

impl EmailList {
    pub fn parse(body: NewEmailListBody, now: DateTime<Utc>) -> Result<EmailList, String> {
        let name = body.name.trim();

        if name.is_empty() {
            return Err(String::from("A list name cannot be empty"));
        }

        Ok(EmailList {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
        })
    }
}
