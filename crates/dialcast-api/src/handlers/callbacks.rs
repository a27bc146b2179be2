//! Provider callback handlers
//!
//! The telephony provider posts call lifecycle events and fetches call
//! signaling documents from these endpoints. They are unauthenticated and
//! mounted outside the API key middleware; the provider retries on non-2xx,
//! so the status handler acknowledges everything it can parse.

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    Form,
};
use dialcast_storage::models::{CallStatus, RecipientStatus};
use dialcast_storage::repository::{CallRecordRepository, CampaignRepository, RecipientRepository};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::AppState;

/// Form payload posted by the provider on call status changes
#[derive(Debug, Deserialize)]
pub struct CallStatusCallback {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
}

/// Query parameters for the conference join document
#[derive(Debug, Deserialize)]
pub struct ConferenceJoinQuery {
    pub name: String,
}

/// Receive a call status callback
///
/// POST /callbacks/call-status
pub async fn call_status(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<CallStatusCallback>,
) -> (StatusCode, &'static str) {
    if let Err(e) = apply_call_status(&state, &payload).await {
        error!(
            "Failed to apply status callback for {}: {}",
            payload.call_sid, e
        );
    }

    // Never hand the provider an error; it would retry the same event
    (StatusCode::OK, "OK")
}

/// Apply one status event to the call record and, on terminal statuses,
/// resolve the recipient and re-check the campaign for drain.
async fn apply_call_status(
    state: &Arc<AppState>,
    payload: &CallStatusCallback,
) -> Result<(), sqlx::Error> {
    let status = match CallStatus::from_provider(&payload.call_status) {
        Some(s) => s,
        None => {
            warn!(
                "Ignoring unknown call status '{}' for {}",
                payload.call_status, payload.call_sid
            );
            return Ok(());
        }
    };

    let pool = state.db_pool.pool().clone();
    let call_records = CallRecordRepository::new(pool.clone());

    let record = match call_records.get_by_provider_id(&payload.call_sid).await? {
        Some(r) => r,
        None => {
            warn!("Status callback for unknown call sid {}", payload.call_sid);
            return Ok(());
        }
    };

    let duration = payload
        .call_duration
        .as_deref()
        .and_then(|d| d.parse::<i32>().ok());

    call_records.update_status(record.id, status, duration).await?;

    if !status.is_terminal() {
        return Ok(());
    }

    info!("Call {} finished with status {}", record.id, status);

    let campaign_repo = CampaignRepository::new(pool.clone());
    let recipient_repo = RecipientRepository::new(pool);

    if let Some(recipient_id) = record.recipient_id {
        let (recipient_status, reason) = match status.failure_reason() {
            Some(reason) => (RecipientStatus::Failed, Some(reason)),
            None => (RecipientStatus::Completed, None),
        };

        // resolve is guarded on `calling`, so a duplicate callback counts
        // the recipient at most once
        let resolved = recipient_repo
            .resolve(recipient_id, recipient_status, reason)
            .await?;

        if resolved {
            if let Some(campaign_id) = record.campaign_id {
                match recipient_status {
                    RecipientStatus::Failed => campaign_repo.increment_failed(campaign_id).await?,
                    _ => campaign_repo.increment_completed(campaign_id).await?,
                }
            }
        }
    }

    // A drained campaign completes here instead of waiting for the next
    // sweep; this also nudges the recurrence spawner for child campaigns
    if let Some(campaign_id) = record.campaign_id {
        if let Err(e) = state.worker.handle_completion(campaign_id).await {
            error!("Completion check for campaign {} failed: {}", campaign_id, e);
        }
    }

    Ok(())
}

/// Return the signaling document that joins a call leg to its conference
///
/// GET|POST /callbacks/conference-join?name=...
pub async fn conference_join(
    Query(query): Query<ConferenceJoinQuery>,
) -> ([(HeaderName, &'static str); 1], String) {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        conference_laml(&query.name),
    )
}

/// LaML joining a leg to the named conference. The bridge forms when the
/// second leg joins and tears down when either leg leaves.
fn conference_laml(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Dial>
        <Conference beep="false" startConferenceOnEnter="true" endConferenceOnExit="true">{}</Conference>
    </Dial>
</Response>"#,
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn conference_laml_joins_named_conference() {
        let doc = conference_laml("bridge_1700000000000_a1b2c3");

        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.contains(
            "<Conference beep=\"false\" startConferenceOnEnter=\"true\" endConferenceOnExit=\"true\">bridge_1700000000000_a1b2c3</Conference>"
        ));
        assert!(doc.contains("<Dial>"));
        assert!(doc.ends_with("</Response>"));
    }

    #[test]
    fn callback_payload_uses_provider_field_names() {
        let payload: CallStatusCallback = serde_json::from_value(serde_json::json!({
            "CallSid": "CA7b2f1c9e",
            "CallStatus": "completed",
            "CallDuration": "42",
        }))
        .expect("callback payload should deserialize");

        assert_eq!(payload.call_sid, "CA7b2f1c9e");
        assert_eq!(payload.call_status, "completed");
        assert_eq!(payload.call_duration.as_deref(), Some("42"));
    }

    #[test]
    fn callback_duration_is_optional() {
        let payload: CallStatusCallback = serde_json::from_value(serde_json::json!({
            "CallSid": "CA7b2f1c9e",
            "CallStatus": "ringing",
        }))
        .expect("callback without duration should deserialize");

        assert_eq!(payload.call_duration, None);
    }
}
