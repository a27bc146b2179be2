//! Telephony Module - Provider client and the two-leg bridge orchestrator

mod bridge;
mod client;

pub use bridge::{BridgeConfig, BridgeError, BridgeOrchestrator, BridgeOutcome};
pub use client::{CallLeg, LamlClient, LamlConfig, TelephonyError};
