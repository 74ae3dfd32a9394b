use actix_web::web;
use serde::Deserialize;

use crate::domain::person_name::PersonName;
use crate::domain::subscriber_email::SubscriberEmail;

pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
}

#[derive(Deserialize)]
pub struct NewSubscriberBody {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl TryFrom<web::Json<NewSubscriberBody>> for NewSubscriber {
    type Error = String;

    fn try_from(body: web::Json<NewSubscriberBody>) -> Result<Self, Self::Error> {
        let body = body.into_inner();
        let email = SubscriberEmail::parse(body.email)?;
        let first_name = PersonName::parse_optional(body.first_name)?;
        let last_name = PersonName::parse_optional(body.last_name)?;

        Ok(NewSubscriber {
            email,
            first_name,
            last_name,
        })
    }
}
