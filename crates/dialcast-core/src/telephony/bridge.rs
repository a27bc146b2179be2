//! Bridge Orchestrator - Two-leg conference dialing
//!
//! Every recipient call is a pair of provider legs joined in a freshly
//! named conference: one leg to the assigned agent over SIP, one to the
//! recipient over the PSTN. Both legs fetch the same conference-join
//! signaling document, so whichever answers first waits in the conference
//! for the other.

use super::client::{LamlClient, TelephonyError};
use chrono::Utc;
use dialcast_common::types::AgentId;
use dialcast_storage::db::DatabasePool;
use dialcast_storage::models::{Campaign, CallStatus, CreateCallRecord, Recipient};
use dialcast_storage::repository::{CallRecordRepository, RecipientRepository};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Bridge orchestrator configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// SIP domain agents are reachable under
    pub agent_sip_domain: String,
    /// Externally reachable base URL for signaling and status callbacks
    pub public_url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            agent_sip_domain: "sip.example.com".to_string(),
            public_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Agent leg failed: {0}")]
    AgentLeg(#[source] TelephonyError),

    #[error("Recipient leg failed: {0}")]
    PstnLeg(#[source] TelephonyError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A successfully started bridge
#[derive(Debug, Clone)]
pub struct BridgeOutcome {
    pub call_record_id: Uuid,
    /// SID of the recipient (PSTN) leg, the leg tracked through callbacks
    pub provider_call_id: String,
    pub conference_name: String,
}

/// Bridge Orchestrator
pub struct BridgeOrchestrator {
    client: LamlClient,
    call_record_repo: CallRecordRepository,
    recipient_repo: RecipientRepository,
    config: BridgeConfig,
}

impl BridgeOrchestrator {
    /// Create a new bridge orchestrator
    pub fn new(db_pool: DatabasePool, client: LamlClient, config: BridgeConfig) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            client,
            call_record_repo: CallRecordRepository::new(pool.clone()),
            recipient_repo: RecipientRepository::new(pool),
            config,
        }
    }

    /// Dial one recipient of a campaign.
    ///
    /// The call record is created before any leg is started so a crash
    /// mid-bridge still leaves an auditable row. Both legs are started
    /// concurrently; if either is rejected the record is marked failed and
    /// the agent failure takes precedence when both are. Status callbacks
    /// are only requested for the recipient leg, which is the one that
    /// resolves the recipient.
    pub async fn dial(
        &self,
        campaign: &Campaign,
        recipient: &Recipient,
    ) -> Result<BridgeOutcome, BridgeError> {
        let conference_name = conference_name();

        let record = self
            .call_record_repo
            .create(CreateCallRecord {
                user_id: campaign.user_id,
                campaign_id: Some(campaign.id),
                recipient_id: Some(recipient.id),
                contact_id: recipient.contact_id,
                to_number: recipient.phone_number.clone(),
                from_number: campaign.caller_number.clone(),
                conference_name: Some(conference_name.clone()),
                call_purpose: campaign.purpose.clone(),
                call_goal: campaign.goal.clone(),
                template_id: campaign.template_id,
            })
            .await?;
        self.recipient_repo
            .set_call_record(recipient.id, record.id)
            .await?;

        let base = self.config.public_url.trim_end_matches('/');
        let join_url = format!("{}/callbacks/conference-join?name={}", base, conference_name);
        let status_url = format!("{}/callbacks/call-status", base);
        let agent_uri = agent_sip_uri(&campaign.agent_id, &self.config.agent_sip_domain);

        debug!(
            "Bridging recipient {} and agent {} in conference {}",
            recipient.phone_number, campaign.agent_id, conference_name
        );

        let (agent_result, pstn_result) = tokio::join!(
            self.client
                .create_leg(&agent_uri, &campaign.caller_number, &join_url, None),
            self.client.create_leg(
                &recipient.phone_number,
                &campaign.caller_number,
                &join_url,
                Some(&status_url),
            ),
        );

        let agent_leg = match agent_result {
            Ok(leg) => leg,
            Err(e) => {
                self.mark_record_failed(record.id).await;
                if let Ok(pstn_leg) = pstn_result {
                    // No agent will ever join; the recipient leg sits in an
                    // empty conference until the provider times it out
                    warn!(
                        "Recipient leg {} started without an agent in conference {}",
                        pstn_leg.sid, conference_name
                    );
                }
                return Err(BridgeError::AgentLeg(e));
            }
        };

        let pstn_leg = match pstn_result {
            Ok(leg) => leg,
            Err(e) => {
                self.mark_record_failed(record.id).await;
                warn!(
                    "Agent leg {} left alone in conference {}",
                    agent_leg.sid, conference_name
                );
                return Err(BridgeError::PstnLeg(e));
            }
        };

        self.call_record_repo
            .set_provider_call_id(record.id, &pstn_leg.sid)
            .await?;

        info!(
            "Bridge started for recipient {} (call record {}, provider sid {})",
            recipient.id, record.id, pstn_leg.sid
        );

        Ok(BridgeOutcome {
            call_record_id: record.id,
            provider_call_id: pstn_leg.sid,
            conference_name,
        })
    }

    async fn mark_record_failed(&self, call_record_id: Uuid) {
        if let Err(e) = self
            .call_record_repo
            .update_status(call_record_id, CallStatus::Failed, None)
            .await
        {
            error!(
                "Failed to mark call record {} as failed: {}",
                call_record_id, e
            );
        }
    }
}

/// Generate a unique conference name for one bridge
fn conference_name() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("bridge_{}_{}", Utc::now().timestamp_millis(), &token[..6])
}

/// SIP URI for an agent, dialed over TLS
fn agent_sip_uri(agent_id: &AgentId, domain: &str) -> String {
    format!("sip:{}@{};transport=tls", agent_id, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conference_name_shape() {
        let name = conference_name();
        let parts: Vec<&str> = name.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "bridge");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn test_conference_names_are_unique() {
        assert_ne!(conference_name(), conference_name());
    }

    #[test]
    fn test_agent_sip_uri() {
        let agent_id = Uuid::parse_str("0a0b0c0d-0000-0000-0000-000000000001").unwrap();
        assert_eq!(
            agent_sip_uri(&agent_id, "space.sip.example.com"),
            "sip:0a0b0c0d-0000-0000-0000-000000000001@space.sip.example.com;transport=tls"
        );
    }
}
