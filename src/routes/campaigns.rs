use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;
use uuid::Uuid;

use crate::delivery::{CampaignDispatcher, DispatchError};
use crate::domain::campaign::Campaign;
use crate::domain::delivery::DeliveryStats;
use crate::domain::new_campaign::{parse_new_campaign, NewCampaignBody};
use crate::startup::ScheduleLeadTime;
use crate::store::{CampaignStore, StoreError};

#[derive(serde::Serialize)]
pub struct CampaignDetails {
    pub campaign: Campaign,
    pub stats: DeliveryStats,
}

#[tracing::instrument(
    name = "Creating a new campaign",
    skip(body, store, lead_time),
    fields(campaign_name = %body.name, list_id = %body.list_id)
)]
pub async fn create_campaign(
    body: web::Json<NewCampaignBody>,
    store: web::Data<dyn CampaignStore>,
    lead_time: web::Data<ScheduleLeadTime>,
) -> Result<HttpResponse, CampaignError> {
    let campaign = parse_new_campaign(body.into_inner(), Utc::now(), lead_time.0)
        .map_err(CampaignError::ValidationError)?;

    if store.find_list(campaign.list_id).await?.is_none() {
        return Err(CampaignError::ListNotFound(campaign.list_id));
    }

    store.insert_campaign(&campaign).await?;

    Ok(HttpResponse::Created().json(&campaign))
}

#[tracing::instrument(name = "Fetching a campaign with its delivery stats", skip(store))]
pub async fn get_campaign(
    campaign_id: web::Path<Uuid>,
    store: web::Data<dyn CampaignStore>,
) -> Result<HttpResponse, CampaignError> {
    let campaign_id = campaign_id.into_inner();
    let campaign = store
        .find_campaign(campaign_id)
        .await?
        .ok_or(CampaignError::CampaignNotFound(campaign_id))?;
    let deliveries = store.find_deliveries(campaign_id).await?;

    Ok(HttpResponse::Ok().json(CampaignDetails {
        campaign,
        stats: DeliveryStats::from_deliveries(&deliveries),
    }))
}

#[tracing::instrument(name = "Sending a campaign now", skip(dispatcher))]
pub async fn send_campaign(
    campaign_id: web::Path<Uuid>,
    dispatcher: web::Data<CampaignDispatcher>,
) -> Result<HttpResponse, DispatchError> {
    let summary = dispatcher.dispatch(campaign_id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(&summary))
}

#[derive(thiserror::Error)]
pub enum CampaignError {
    #[error("{0}")]
    ValidationError(String),
    #[error("List {0} was not found.")]
    ListNotFound(Uuid),
    #[error("Campaign {0} was not found.")]
    CampaignNotFound(Uuid),
    #[error("Failed to access the campaign store.")]
    StoreError(#[from] StoreError),
}

impl std::fmt::Debug for CampaignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

impl ResponseError for CampaignError {
    fn status_code(&self) -> StatusCode {
        match self {
            CampaignError::ValidationError(_) => StatusCode::BAD_REQUEST,
            CampaignError::ListNotFound(_) => StatusCode::NOT_FOUND,
            CampaignError::CampaignNotFound(_) => StatusCode::NOT_FOUND,
            CampaignError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

impl ResponseError for DispatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::CampaignNotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::AlreadySent(_) => StatusCode::BAD_REQUEST,
            DispatchError::NoEligibleRecipients(_) => StatusCode::BAD_REQUEST,
            DispatchError::AlreadySending(_) => StatusCode::CONFLICT,
            DispatchError::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Interrupted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// An interrupted send still reports how far it got.
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            DispatchError::Interrupted { partial, .. } => serde_json::json!({
                "error": self.to_string(),
                "partial": partial,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
