use chrono::{DateTime, Utc};

use crate::domain::tracking_token::TrackingToken;
use crate::store::CampaignStore;

/// A 1x1 transparent GIF.
pub static BEACON_GIF: [u8; 42] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Recorded,
    /// Unknown or malformed token, or a delivery that is not `sent`.
    Ignored,
    Unavailable,
}

/// Records the first open behind `token`. Never fails: the caller is an image
/// loader with nowhere to report an error.
#[tracing::instrument(name = "Record an email open", skip(store, token))]
pub async fn record_open(
    store: &dyn CampaignStore,
    token: String,
    opened_at: DateTime<Utc>,
) -> OpenOutcome {
    let token = match TrackingToken::parse(token) {
        Ok(token) => token,
        Err(_) => return OpenOutcome::Ignored,
    };

    match store.mark_delivery_opened(&token, opened_at).await {
        Ok(true) => OpenOutcome::Recorded,
        Ok(false) => OpenOutcome::Ignored,
        Err(error) => {
            tracing::error!("Failed to record an email open: {:?}", error);
            OpenOutcome::Unavailable
        }
    }
}
