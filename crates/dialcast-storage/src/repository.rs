//! Repository layer for data access

pub mod api_keys;
pub mod call_records;
pub mod campaigns;
pub mod phone_numbers;
pub mod recipients;

// Re-export concrete repository implementations with simple names
pub use call_records::CallRecordRepository;
pub use campaigns::CampaignRepository;
pub use phone_numbers::PhoneNumberRepository;
pub use recipients::RecipientRepository;

pub use api_keys::DbApiKeyRepository as ApiKeyRepository;

// Re-export repository traits
pub use api_keys::ApiKeyRepository as ApiKeyRepositoryTrait;

// Re-export API key types
pub use api_keys::{ApiKey, ApiKeyId};
