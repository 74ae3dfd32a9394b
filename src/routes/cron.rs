use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::Utc;
use secrecy::{ExposeSecret, Secret};

use crate::delivery::SchedulerSweep;
use crate::startup::CronSecret;
use crate::store::StoreError;

#[derive(thiserror::Error)]
pub enum CronError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Failed to process scheduled campaigns.")]
    SweepFailed(#[from] StoreError),
}

impl std::fmt::Debug for CronError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

impl ResponseError for CronError {
    fn status_code(&self) -> StatusCode {
        match self {
            CronError::Unauthorized => StatusCode::UNAUTHORIZED,
            CronError::SweepFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

/// An empty configured secret authorizes nobody.
fn is_authorized(request: &HttpRequest, secret: &Secret<String>) -> bool {
    let expected = secret.expose_secret();

    !expected.is_empty()
        && request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map_or(false, |token| token == expected)
}

#[tracing::instrument(name = "Running the scheduled campaign sweep", skip_all)]
pub async fn send_scheduled_campaigns(
    request: HttpRequest,
    cron_secret: web::Data<CronSecret>,
    sweep: web::Data<SchedulerSweep>,
) -> Result<HttpResponse, CronError> {
    if !is_authorized(&request, &cron_secret.0) {
        tracing::warn!("Rejected a sweep request with a missing or wrong secret");
        return Err(CronError::Unauthorized);
    }

    let summary = sweep.sweep(Utc::now()).await?;

    Ok(HttpResponse::Ok().json(&summary))
}
