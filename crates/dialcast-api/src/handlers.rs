//! API request handlers

pub mod callbacks;
pub mod campaigns;
pub mod dispatch;
pub mod health;

pub use health::*;
