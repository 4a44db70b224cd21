use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::Credentials;
use crate::error::ApiError;
use crate::types::{CustomerEvent, TransactionalEmail, TransactionalSms};

pub const DEFAULT_API_BASE: &str = "https://api.exponea.com";

pub(crate) const EMAIL_ENDPOINT: &str = "email.sync";
pub(crate) const SMS_ENDPOINT: &str = "sms.sync";
pub(crate) const TRACK_ENDPOINT: &str = "track.events";

const MAX_ERROR_BODY: usize = 512;

/// The three platform operations the adapters depend on.
#[async_trait]
pub trait EngagementApi: Send + Sync {
    /// Sends one transactional email and returns the platform message id.
    async fn send_transactional_email(
        &self,
        project_id: &str,
        email: &TransactionalEmail,
    ) -> Result<String, ApiError>;

    /// Sends one transactional SMS and returns the platform message id.
    async fn send_transactional_sms(
        &self,
        project_id: &str,
        sms: &TransactionalSms,
    ) -> Result<String, ApiError>;

    /// Attaches an event to a customer profile. `Ok` always carries `true`;
    /// a `success: false` answer is reported as [`ApiError::Rejected`].
    async fn add_event(&self, project_id: &str, event: &CustomerEvent) -> Result<bool, ApiError>;
}

#[derive(Debug)]
pub struct BloomreachClient {
    http: Client,
    credentials: Credentials,
    api_base: String,
}

impl BloomreachClient {
    pub fn new(
        http: Client,
        credentials: Credentials,
        api_base: Option<String>,
    ) -> Result<Self, ApiError> {
        let base = api_base
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.into());
        Url::parse(&base).map_err(|err| ApiError::Config(format!("invalid api base {base}: {err}")))?;
        Ok(Self {
            http,
            credentials,
            api_base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn email_url(&self, project_id: &str) -> String {
        format!("{}/email/v2/projects/{}/sync", self.api_base, project_id)
    }

    pub(crate) fn sms_url(&self, project_id: &str) -> String {
        format!("{}/sms/v1/projects/{}/sync", self.api_base, project_id)
    }

    pub(crate) fn track_url(&self, project_id: &str) -> String {
        format!(
            "{}/track/v2/projects/{}/customers/events",
            self.api_base, project_id
        )
    }

    async fn post<B>(
        &self,
        endpoint: &'static str,
        url: String,
        body: &B,
    ) -> Result<(StatusCode, String), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        debug!(endpoint, url = %url, "posting to engagement api");
        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, self.credentials.authorization())
            .json(body)
            .send()
            .await
            .map_err(|source| {
                counter!(
                    "engage_api_requests_total",
                    "endpoint" => endpoint,
                    "outcome" => "transport_error"
                )
                .increment(1);
                ApiError::Transport { endpoint, source }
            })?;

        let status = response.status();
        histogram!(
            "engage_api_roundtrip_seconds",
            "endpoint" => endpoint,
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        let text = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;
        Ok((status, text))
    }
}

#[async_trait]
impl EngagementApi for BloomreachClient {
    async fn send_transactional_email(
        &self,
        project_id: &str,
        email: &TransactionalEmail,
    ) -> Result<String, ApiError> {
        let (status, text) = self
            .post(EMAIL_ENDPOINT, self.email_url(project_id), &email.wire())
            .await?;
        decode_message_id(EMAIL_ENDPOINT, status, &text)
    }

    async fn send_transactional_sms(
        &self,
        project_id: &str,
        sms: &TransactionalSms,
    ) -> Result<String, ApiError> {
        let (status, text) = self
            .post(SMS_ENDPOINT, self.sms_url(project_id), &sms.wire())
            .await?;
        decode_message_id(SMS_ENDPOINT, status, &text)
    }

    async fn add_event(&self, project_id: &str, event: &CustomerEvent) -> Result<bool, ApiError> {
        let (status, text) = self
            .post(TRACK_ENDPOINT, self.track_url(project_id), event)
            .await?;
        decode_track(status, &text)
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

fn decode_message_id(
    endpoint: &'static str,
    status: StatusCode,
    text: &str,
) -> Result<String, ApiError> {
    if !status.is_success() {
        record_outcome(endpoint, "remote_error");
        return Err(ApiError::Remote {
            endpoint,
            status,
            body: truncate(text),
        });
    }
    match serde_json::from_str::<SendResponse>(text) {
        Ok(parsed) => {
            record_outcome(endpoint, "ok");
            Ok(parsed.message_id)
        }
        Err(err) => {
            record_outcome(endpoint, "decode_error");
            Err(ApiError::Decode {
                endpoint,
                message: err.to_string(),
            })
        }
    }
}

// The tracking API answers `{"success": bool, "errors"?: ...}`; the flag wins
// over the HTTP status whenever it is present and is read loosely, so `1` or
// `"yes"` pass and `0`, `""` or `null` reject.
fn decode_track(status: StatusCode, text: &str) -> Result<bool, ApiError> {
    let parsed = serde_json::from_str::<Value>(text).ok();
    let success = parsed.as_ref().and_then(|value| value.get("success"));

    match (success, parsed.as_ref()) {
        (Some(flag), Some(body)) => {
            if truthy(flag) {
                record_outcome(TRACK_ENDPOINT, "ok");
                Ok(true)
            } else {
                record_outcome(TRACK_ENDPOINT, "rejected");
                Err(ApiError::Rejected {
                    body: body.to_string(),
                })
            }
        }
        _ if !status.is_success() => {
            record_outcome(TRACK_ENDPOINT, "remote_error");
            Err(ApiError::Remote {
                endpoint: TRACK_ENDPOINT,
                status,
                body: truncate(text),
            })
        }
        _ => {
            record_outcome(TRACK_ENDPOINT, "decode_error");
            Err(ApiError::Decode {
                endpoint: TRACK_ENDPOINT,
                message: "response has no `success` field".into(),
            })
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn record_outcome(endpoint: &'static str, outcome: &'static str) {
    counter!(
        "engage_api_requests_total",
        "endpoint" => endpoint,
        "outcome" => outcome
    )
    .increment(1);
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut cut = MAX_ERROR_BODY;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body[..cut].to_string()
}
