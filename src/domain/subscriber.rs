use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::new_subscriber::NewSubscriber;
use crate::domain::person_name::PersonName;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub list_id: Uuid,
    pub email: SubscriberEmail,
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
    pub status: SubscriberStatus,
    pub subscribed_at: DateTime<Utc>,
}

impl Subscriber {
    /// New subscribers join a list as active members.
    pub fn from_new(list_id: Uuid, new_subscriber: NewSubscriber, now: DateTime<Utc>) -> Self {
        Subscriber {
            id: Uuid::new_v4(),
            list_id,
            email: new_subscriber.email,
            first_name: new_subscriber.first_name,
            last_name: new_subscriber.last_name,
            status: SubscriberStatus::Active,
            subscribed_at: now,
        }
    }
}
