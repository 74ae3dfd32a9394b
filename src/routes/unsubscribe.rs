use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::store::CampaignStore;

#[tracing::instrument(name = "Unsubscribing a subscriber", skip(store))]
pub async fn unsubscribe(
    subscriber_id: web::Path<Uuid>,
    store: web::Data<dyn CampaignStore>,
) -> HttpResponse {
    let subscriber_id = subscriber_id.into_inner();

    let subscriber = match store.find_subscriber(subscriber_id).await {
        Ok(Some(subscriber)) => subscriber,
        Ok(None) => return HttpResponse::NotFound().finish(),
        Err(err) => {
            tracing::error!("Failed to fetch the subscriber: {:?}", err);
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(err) = store.deactivate_subscriber(subscriber_id).await {
        tracing::error!("Failed to deactivate the subscriber: {:?}", err);
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(format!(
            r#"
            <div>
                <h1>You have been unsubscribed</h1>
                <p>{} will not receive further emails from this list.</p>
            </div>
            "#,
            subscriber.email
        ))
}
