use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use super::{CampaignStore, StoreError};
use crate::domain::campaign::{Campaign, CampaignStatus};
use crate::domain::delivery::{Delivery, DeliveryStatus};
use crate::domain::email_list::EmailList;
use crate::domain::person_name::PersonName;
use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::domain::tracking_token::TrackingToken;

const UNIQUE_VIOLATION: &str = "23505";

const CAMPAIGN_COLUMNS: &str =
    "id, name, subject, html_content, list_id, status, scheduled_at, sent_at, created_at";
const SUBSCRIBER_COLUMNS: &str =
    "id, list_id, email, first_name, last_name, status, subscribed_at";
const DELIVERY_COLUMNS: &str = "id, campaign_id, subscriber_id, email, tracking_token, status, \
     sent_at, opened_at, provider_message_id, error";

pub struct PgCampaignStore {
    db_pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|err| StoreError::Corrupted(err.to_string()))
}

fn list_from_row(row: &PgRow) -> Result<EmailList, StoreError> {
    Ok(EmailList {
        id: column(row, "id")?,
        name: column(row, "name")?,
        created_at: column(row, "created_at")?,
    })
}

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber, StoreError> {
    let first_name: Option<String> = column(row, "first_name")?;
    let last_name: Option<String> = column(row, "last_name")?;

    Ok(Subscriber {
        id: column(row, "id")?,
        list_id: column(row, "list_id")?,
        email: SubscriberEmail::parse(column(row, "email")?).map_err(StoreError::Corrupted)?,
        first_name: PersonName::parse_optional(first_name).map_err(StoreError::Corrupted)?,
        last_name: PersonName::parse_optional(last_name).map_err(StoreError::Corrupted)?,
        status: SubscriberStatus::parse(column(row, "status")?).map_err(StoreError::Corrupted)?,
        subscribed_at: column(row, "subscribed_at")?,
    })
}

fn campaign_from_row(row: &PgRow) -> Result<Campaign, StoreError> {
    Ok(Campaign {
        id: column(row, "id")?,
        name: column(row, "name")?,
        subject: column(row, "subject")?,
        html_content: column(row, "html_content")?,
        list_id: column(row, "list_id")?,
        status: CampaignStatus::parse(column(row, "status")?).map_err(StoreError::Corrupted)?,
        scheduled_at: column(row, "scheduled_at")?,
        sent_at: column(row, "sent_at")?,
        created_at: column(row, "created_at")?,
    })
}

fn delivery_from_row(row: &PgRow) -> Result<Delivery, StoreError> {
    Ok(Delivery {
        id: column(row, "id")?,
        campaign_id: column(row, "campaign_id")?,
        subscriber_id: column(row, "subscriber_id")?,
        email: SubscriberEmail::parse(column(row, "email")?).map_err(StoreError::Corrupted)?,
        tracking_token: TrackingToken::parse(column(row, "tracking_token")?)
            .map_err(StoreError::Corrupted)?,
        status: DeliveryStatus::parse(column(row, "status")?).map_err(StoreError::Corrupted)?,
        sent_at: column(row, "sent_at")?,
        opened_at: column(row, "opened_at")?,
        provider_message_id: column(row, "provider_message_id")?,
        error: column(row, "error")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map_or(false, |code| code == UNIQUE_VIOLATION)
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    #[tracing::instrument(
        name = "Insert a new email list",
        skip(self, list),
        fields(list_id = %list.id)
    )]
    async fn insert_list(&self, list: &EmailList) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO email_lists (id, name, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(list.id)
        .bind(&list.name)
        .bind(list.created_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn find_list(&self, list_id: Uuid) -> Result<Option<EmailList>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM email_lists WHERE id = $1")
            .bind(list_id)
            .fetch_optional(&self.db_pool)
            .await?;

        row.as_ref().map(list_from_row).transpose()
    }

    #[tracing::instrument(
        name = "Insert a new subscriber",
        skip(self, subscriber),
        fields(list_id = %subscriber.list_id, subscriber_email = %subscriber.email)
    )]
    async fn insert_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers
                (id, list_id, email, first_name, last_name, status, subscribed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(subscriber.id)
        .bind(subscriber.list_id)
        .bind(subscriber.email.as_ref())
        .bind(subscriber.first_name.as_ref().map(|name| name.as_ref()))
        .bind(subscriber.last_name.as_ref().map(|name| name.as_ref()))
        .bind(subscriber.status.as_ref())
        .bind(subscriber.subscribed_at)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::DuplicateSubscriber(subscriber.email.to_string())
            } else {
                tracing::error!("Failed to execute query: {:?}", err);
                StoreError::Unavailable(err)
            }
        })?;

        Ok(())
    }

    async fn find_subscriber(&self, subscriber_id: Uuid) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscribers WHERE id = $1",
            SUBSCRIBER_COLUMNS
        ))
        .bind(subscriber_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.as_ref().map(subscriber_from_row).transpose()
    }

    #[tracing::instrument(name = "Fetch active subscribers of a list", skip(self))]
    async fn find_active_subscribers(&self, list_id: Uuid) -> Result<Vec<Subscriber>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM subscribers
            WHERE list_id = $1 AND status = 'active'
            ORDER BY subscribed_at, id
            "#,
            SUBSCRIBER_COLUMNS
        ))
        .bind(list_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter().map(subscriber_from_row).collect()
    }

    #[tracing::instrument(name = "Deactivate a subscriber", skip(self))]
    async fn deactivate_subscriber(&self, subscriber_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE subscribers SET status = 'inactive' WHERE id = $1")
            .bind(subscriber_id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(
        name = "Insert a new campaign",
        skip(self, campaign),
        fields(campaign_id = %campaign.id)
    )]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO campaigns
                (id, name, subject, html_content, list_id, status, scheduled_at, sent_at,
                created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(&campaign.subject)
        .bind(&campaign.html_content)
        .bind(campaign.list_id)
        .bind(campaign.status.as_ref())
        .bind(campaign.scheduled_at)
        .bind(campaign.sent_at)
        .bind(campaign.created_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn find_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(campaign_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.as_ref().map(campaign_from_row).transpose()
    }

    #[tracing::instrument(name = "Fetch due campaigns", skip(self))]
    async fn find_due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM campaigns
            WHERE status = 'scheduled' AND scheduled_at <= $1 AND sent_at IS NULL
            ORDER BY scheduled_at
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter().map(campaign_from_row).collect()
    }

    async fn find_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM campaigns WHERE status = $1 ORDER BY created_at",
            CAMPAIGN_COLUMNS
        ))
        .bind(status.as_ref())
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter().map(campaign_from_row).collect()
    }

    #[tracing::instrument(name = "Mark a campaign as sending", skip(self))]
    async fn try_begin_sending(&self, campaign_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'sending'
            WHERE id = $1 AND status IN ('draft', 'scheduled', 'skipped')
            "#,
        )
        .bind(campaign_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Mark a campaign as sent", skip(self))]
    async fn mark_campaign_sent(
        &self,
        campaign_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE campaigns SET status = 'sent', sent_at = $2 WHERE id = $1")
            .bind(campaign_id)
            .bind(sent_at)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Mark a campaign as skipped", skip(self))]
    async fn mark_campaign_skipped(&self, campaign_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'skipped', sent_at = NULL
            WHERE id = $1 AND status IN ('draft', 'scheduled', 'skipped')
            "#,
        )
        .bind(campaign_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO deliveries (id, campaign_id, subscriber_id, email, tracking_token, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.campaign_id)
        .bind(delivery.subscriber_id)
        .bind(delivery.email.as_ref())
        .bind(delivery.tracking_token.as_ref())
        .bind(delivery.status.as_ref())
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn mark_delivery_sent(
        &self,
        delivery_id: Uuid,
        sent_at: DateTime<Utc>,
        provider_message_id: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'sent', sent_at = $2, provider_message_id = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(delivery_id)
        .bind(sent_at)
        .bind(provider_message_id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn mark_delivery_failed(&self, delivery_id: Uuid, error: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'failed', error = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(delivery_id)
        .bind(error)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Record a delivery open", skip(self, token))]
    async fn mark_delivery_opened(
        &self,
        token: &TrackingToken,
        opened_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'opened', opened_at = $2
            WHERE tracking_token = $1 AND status = 'sent'
            "#,
        )
        .bind(token.as_ref())
        .bind(opened_at)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_deliveries(&self, campaign_id: Uuid) -> Result<Vec<Delivery>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deliveries WHERE campaign_id = $1 ORDER BY email",
            DELIVERY_COLUMNS
        ))
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter().map(delivery_from_row).collect()
    }
}
