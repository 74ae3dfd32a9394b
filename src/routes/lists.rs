use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::domain::email_list::{EmailList, NewEmailListBody};
use crate::domain::new_subscriber::{NewSubscriber, NewSubscriberBody};
use crate::domain::subscriber::Subscriber;
use crate::store::{CampaignStore, StoreError};

#[tracing::instrument(
    name = "Creating a new email list",
    skip(body, store),
    fields(list_name = %body.name)
)]
pub async fn create_list(
    body: web::Json<NewEmailListBody>,
    store: web::Data<dyn CampaignStore>,
) -> HttpResponse {
    let list = match EmailList::parse(body.into_inner(), Utc::now()) {
        Ok(list) => list,
        Err(err) => {
            tracing::error!("Validation error: {:?}", err);
            return HttpResponse::BadRequest().finish();
        }
    };

    if let Err(err) = store.insert_list(&list).await {
        tracing::error!("Failed to insert new list: {:?}", err);
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Created().json(&list)
}

#[tracing::instrument(
    name = "Adding a subscriber to a list",
    skip(body, store),
    fields(subscriber_email = %body.email)
)]
pub async fn add_subscriber(
    list_id: web::Path<Uuid>,
    body: web::Json<NewSubscriberBody>,
    store: web::Data<dyn CampaignStore>,
) -> HttpResponse {
    let list_id = list_id.into_inner();
    let new_subscriber: NewSubscriber = match body.try_into() {
        Ok(subscriber) => subscriber,
        Err(err) => {
            tracing::error!("Validation error: {:?}", err);
            return HttpResponse::BadRequest().finish();
        }
    };

    match store.find_list(list_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return HttpResponse::NotFound().finish(),
        Err(err) => {
            tracing::error!("Failed to fetch the list: {:?}", err);
            return HttpResponse::InternalServerError().finish();
        }
    }

    let subscriber = Subscriber::from_new(list_id, new_subscriber, Utc::now());

    match store.insert_subscriber(&subscriber).await {
        Ok(()) => HttpResponse::Created().json(&subscriber),
        Err(StoreError::DuplicateSubscriber(email)) => {
            tracing::warn!("{} is already on the list", email);
            HttpResponse::Conflict().finish()
        }
        Err(err) => {
            tracing::error!("Failed to insert new subscriber: {:?}", err);
            HttpResponse::InternalServerError().finish()
        }
    }
}
