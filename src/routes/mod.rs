mod campaigns;
mod cron;
mod health_check;
mod lists;
mod track;
mod unsubscribe;

pub use campaigns::{create_campaign, get_campaign, send_campaign, CampaignDetails, CampaignError};
pub use cron::{send_scheduled_campaigns, CronError};
pub use health_check::health_check;
pub use lists::{add_subscriber, create_list};
pub use track::track_open;
pub use unsubscribe::unsubscribe;
