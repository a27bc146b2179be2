//! Dialcast API - REST control surface
//!
//! This crate provides the HTTP layer for Dialcast: authenticated campaign
//! and dispatch endpoints, plus the unauthenticated callback endpoints the
//! telephony provider posts call events to.

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::AppState;
pub use routes::create_router;
