//! Common types for Dialcast

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Unique identifier for users (campaign owners)
pub type UserId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for campaign recipients
pub type RecipientId = Uuid;

/// Unique identifier for call records
pub type CallRecordId = Uuid;

/// Unique identifier for CRM contacts
pub type ContactId = Uuid;

/// Unique identifier for voice agents
pub type AgentId = Uuid;

/// Unique identifier for message templates
pub type TemplateId = Uuid;

/// Unique identifier for provisioned phone numbers
pub type PhoneNumberId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;
