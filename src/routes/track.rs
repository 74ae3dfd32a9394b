use actix_web::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use chrono::Utc;

use crate::delivery::{record_open, BEACON_GIF};
use crate::store::CampaignStore;

/// Beacon fetched by email clients. Always answers with the pixel.
#[tracing::instrument(name = "Tracking an email open", skip_all)]
pub async fn track_open(
    token: web::Path<String>,
    store: web::Data<dyn CampaignStore>,
) -> HttpResponse {
    let outcome = record_open(store.get_ref(), token.into_inner(), Utc::now()).await;

    tracing::debug!(?outcome, "Beacon served");

    HttpResponse::Ok()
        .content_type("image/gif")
        .insert_header((
            CACHE_CONTROL,
            "no-store, no-cache, must-revalidate, proxy-revalidate",
        ))
        .insert_header((PRAGMA, "no-cache"))
        .insert_header((EXPIRES, "0"))
        .body(Bytes::from_static(&BEACON_GIF))
}
