pub mod campaign;
pub mod delivery;
pub mod email_list;
pub mod new_campaign;
pub mod new_subscriber;
pub mod person_name;
pub mod subscriber;
pub mod subscriber_email;
pub mod subscriber_status;
pub mod tracking_token;
