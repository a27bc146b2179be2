//! LaML-compatible provider client
//!
//! Starts call legs through the provider's REST API. Requests are
//! form-encoded and authenticated with HTTP basic auth using the project
//! id and API token.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Provider client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LamlConfig {
    /// Provider space, as a bare hostname or a full base URL
    #[serde(default = "default_space_url")]
    pub space_url: String,
    /// Project id, also the basic auth username
    #[serde(default)]
    pub project_id: String,
    /// API token, the basic auth password
    #[serde(default)]
    pub api_token: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_space_url() -> String {
    "example.signalwire.com".to_string()
}

fn default_timeout() -> u64 {
    10_000
}

impl Default for LamlConfig {
    fn default() -> Self {
        Self {
            space_url: default_space_url(),
            project_id: String::new(),
            api_token: String::new(),
            timeout_ms: default_timeout(),
        }
    }
}

/// Telephony provider errors
#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("Provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider rejected call ({status}): {body}")]
    Provider { status: u16, body: String },
}

/// A call leg accepted by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct CallLeg {
    /// Provider-assigned call SID
    pub sid: String,
    /// Initial provider status
    #[serde(default)]
    pub status: String,
}

/// LaML provider HTTP client
pub struct LamlClient {
    config: LamlConfig,
    client: Client,
}

impl LamlClient {
    /// Create a new provider client
    pub fn new(config: LamlConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Start one outbound call leg.
    ///
    /// The provider fetches `signaling_url` when the leg is answered to
    /// learn what to do with it. When `status_callback_url` is given, the
    /// provider posts lifecycle events for the leg there.
    pub async fn create_leg(
        &self,
        to: &str,
        from: &str,
        signaling_url: &str,
        status_callback_url: Option<&str>,
    ) -> Result<CallLeg, TelephonyError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("To", to),
            ("From", from),
            ("Url", signaling_url),
            ("Method", "POST"),
        ];

        if let Some(callback) = status_callback_url {
            form.push(("StatusCallback", callback));
            for event in ["initiated", "ringing", "answered", "completed"] {
                form.push(("StatusCallbackEvent", event));
            }
            form.push(("StatusCallbackMethod", "POST"));
        }

        debug!("Creating provider call leg to {} from {}", to, from);

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.config.project_id, Some(&self.config.api_token))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("Provider rejected call leg to {} ({}): {}", to, status, body);
            return Err(TelephonyError::Provider { status, body });
        }

        let leg: CallLeg = response.json().await?;
        debug!("Provider accepted call leg {} ({})", leg.sid, leg.status);

        Ok(leg)
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/api/laml/2010-04-01/Accounts/{}/Calls.json",
            self.base_url(),
            self.config.project_id
        )
    }

    fn base_url(&self) -> String {
        let space = self.config.space_url.trim_end_matches('/');
        if space.contains("://") {
            space.to_string()
        } else {
            format!("https://{}", space)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_uri: &str) -> LamlClient {
        LamlClient::new(LamlConfig {
            space_url: server_uri.to_string(),
            project_id: "proj-123".to_string(),
            api_token: "secret-token".to_string(),
            timeout_ms: 5000,
        })
    }

    #[test]
    fn test_config_default() {
        let config = LamlConfig::default();
        assert_eq!(config.space_url, "example.signalwire.com");
        assert_eq!(config.timeout_ms, 10_000);
    }

    #[test]
    fn test_bare_hostname_gets_https_scheme() {
        let client = test_client("space.example.com");
        assert_eq!(
            client.calls_url(),
            "https://space.example.com/api/laml/2010-04-01/Accounts/proj-123/Calls.json"
        );
    }

    #[tokio::test]
    async fn test_create_leg_posts_form_encoded_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/laml/2010-04-01/Accounts/proj-123/Calls.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15550002222"))
            .and(body_string_contains("From=%2B15550001111"))
            .and(body_string_contains("Method=POST"))
            .and(body_string_contains("StatusCallbackEvent=ringing"))
            .and(body_string_contains("StatusCallbackEvent=completed"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "CA0123456789",
                "status": "queued",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let leg = client
            .create_leg(
                "+15550002222",
                "+15550001111",
                "https://dialer.example.com/callbacks/conference-join?name=bridge_1_abc",
                Some("https://dialer.example.com/callbacks/call-status"),
            )
            .await
            .unwrap();

        assert_eq!(leg.sid, "CA0123456789");
        assert_eq!(leg.status, "queued");
    }

    #[tokio::test]
    async fn test_create_leg_without_callback_omits_status_fields() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "CA42",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let leg = client
            .create_leg(
                "sip:agent@sip.example.com;transport=tls",
                "+15550001111",
                "https://dialer.example.com/callbacks/conference-join?name=bridge_1_abc",
                None,
            )
            .await
            .unwrap();
        assert_eq!(leg.sid, "CA42");
        assert_eq!(leg.status, "");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(!body.contains("StatusCallback"));
    }

    #[tokio::test]
    async fn test_provider_error_body_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Invalid 'To' phone number"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .create_leg("+1555", "+15550001111", "https://example.com/join", None)
            .await
            .unwrap_err();

        match err {
            TelephonyError::Provider { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid 'To' phone number"));
            }
            other => panic!("Expected provider error, got {:?}", other),
        }
    }
}
