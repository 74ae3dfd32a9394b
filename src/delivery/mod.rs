//! The campaign delivery pipeline.

pub mod batcher;
pub mod dispatcher;
pub mod scheduler;
pub mod template;
pub mod tracking;

pub use batcher::Batcher;
pub use dispatcher::{CampaignDispatcher, DispatchError, DispatchSummary, RecipientOutcome};
pub use scheduler::{CampaignOutcome, SchedulerSweep, SweepSummary};
pub use tracking::{record_open, OpenOutcome, BEACON_GIF};
