//! Campaign Module - Lifecycle management, dispatch, and recurrence

mod dispatcher;
mod manager;
mod recurrence;
mod window;

pub use dispatcher::{CampaignDispatchWorker, DispatchSummary, SweepSummary};
pub use manager::{CampaignError, CampaignManager, NewCampaign, RecurrenceSettings};
pub use recurrence::{next_occurrence, RecurrenceSpawner};
pub use window::{CallWindow, WindowError};
