//! Dialcast Core - Outbound call campaign engine
//!
//! This crate provides the core campaign functionality for Dialcast,
//! including lifecycle management, the dispatch worker, recurrence
//! spawning, and the two-leg conference bridge orchestrator.

pub mod campaigns;
pub mod telephony;

pub use campaigns::{
    next_occurrence, CallWindow, CampaignDispatchWorker, CampaignError, CampaignManager,
    DispatchSummary, NewCampaign, RecurrenceSettings, RecurrenceSpawner, SweepSummary, WindowError,
};
pub use telephony::{
    BridgeConfig, BridgeError, BridgeOrchestrator, BridgeOutcome, CallLeg, LamlClient, LamlConfig,
    TelephonyError,
};
