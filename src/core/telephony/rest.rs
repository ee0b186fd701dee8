//! Twilio REST client for placing outbound calls.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{TelephonyError, TelephonyResult};

/// Twilio REST API base URL.
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Created call as reported by Twilio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialResult {
    pub sid: String,
    pub status: String,
    pub to: String,
    pub from: String,
}

/// Minimal Twilio REST client (Calls resource only).
#[derive(Debug, Clone)]
pub struct TwilioRestClient {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioRestClient {
    /// Build a client, failing if either credential is missing.
    pub fn new(account_sid: Option<&str>, auth_token: Option<&str>) -> TelephonyResult<Self> {
        match (account_sid, auth_token) {
            (Some(sid), Some(token)) if !sid.is_empty() && !token.is_empty() => Ok(Self {
                client: Client::new(),
                base_url: TWILIO_API_BASE.to_string(),
                account_sid: sid.to_string(),
                auth_token: token.to_string(),
            }),
            _ => Err(TelephonyError::MissingCredentials),
        }
    }

    /// Point the client at another API host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn calls_endpoint(&self) -> String {
        let mut sid = String::new();
        url::form_urlencoded::byte_serialize(self.account_sid.as_bytes())
            .for_each(|part| sid.push_str(part));
        format!("{}/2010-04-01/Accounts/{}/Calls.json", self.base_url, sid)
    }

    /// Place a call from `from` to `to`; Twilio fetches TwiML from `twiml_url`.
    pub async fn dial(&self, to: &str, from: &str, twiml_url: &str) -> TelephonyResult<DialResult> {
        let response = self
            .client
            .post(self.calls_endpoint())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", from), ("Url", twiml_url)])
            .send()
            .await
            .map_err(|e| TelephonyError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TelephonyError::Request(e.to_string()))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(TelephonyError::Api {
                status: status.as_u16(),
                body: body.to_string(),
            });
        }

        let field = |key: &'static str| -> TelephonyResult<String> {
            body.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(TelephonyError::InvalidResponse(key))
        };

        let result = DialResult {
            sid: field("sid")?,
            status: field("status")?,
            to: field("to")?,
            from: field("from")?,
        };
        info!(call_sid = %result.sid, status = %result.status, "Twilio call created");
        Ok(result)
    }
}

impl Drop for TwilioRestClient {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.auth_token.zeroize();
    }
}
