//! In-memory [`EngagementApi`] double for adapter and handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Mutex;

use crate::client::{EMAIL_ENDPOINT, EngagementApi, SMS_ENDPOINT};
use crate::error::ApiError;
use crate::types::{CustomerEvent, TransactionalEmail, TransactionalSms};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Email {
        project_id: String,
        email: TransactionalEmail,
    },
    Sms {
        project_id: String,
        sms: TransactionalSms,
    },
    Event {
        project_id: String,
        event: CustomerEvent,
    },
}

#[derive(Debug, Clone)]
enum Script {
    Reply,
    RejectEvents(String),
    Remote(StatusCode, String),
}

#[derive(Clone)]
pub struct RecordingApi {
    message_id: String,
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self::with_message_id("msg-recorded")
    }
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message_id(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            script: Arc::new(Mutex::new(Script::Reply)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every tracking call with `success: false` and the given body.
    pub async fn reject_events(&self, body: impl Into<String>) {
        *self.script.lock().await = Script::RejectEvents(body.into());
    }

    /// Answers every call with a non-2xx status.
    pub async fn fail_with_status(&self, status: StatusCode, body: impl Into<String>) {
        *self.script.lock().await = Script::Remote(status, body.into());
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn emails(&self) -> Vec<(String, TransactionalEmail)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Email { project_id, email } => {
                    Some((project_id.clone(), email.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub async fn sms(&self) -> Vec<(String, TransactionalSms)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Sms { project_id, sms } => Some((project_id.clone(), sms.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn events(&self) -> Vec<(String, CustomerEvent)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Event { project_id, event } => {
                    Some((project_id.clone(), event.clone()))
                }
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: RecordedCall) -> Script {
        self.calls.lock().await.push(call);
        self.script.lock().await.clone()
    }
}

#[async_trait]
impl EngagementApi for RecordingApi {
    async fn send_transactional_email(
        &self,
        project_id: &str,
        email: &TransactionalEmail,
    ) -> Result<String, ApiError> {
        let script = self
            .record(RecordedCall::Email {
                project_id: project_id.to_string(),
                email: email.clone(),
            })
            .await;
        match script {
            Script::Remote(status, body) => Err(ApiError::Remote {
                endpoint: EMAIL_ENDPOINT,
                status,
                body,
            }),
            _ => Ok(self.message_id.clone()),
        }
    }

    async fn send_transactional_sms(
        &self,
        project_id: &str,
        sms: &TransactionalSms,
    ) -> Result<String, ApiError> {
        let script = self
            .record(RecordedCall::Sms {
                project_id: project_id.to_string(),
                sms: sms.clone(),
            })
            .await;
        match script {
            Script::Remote(status, body) => Err(ApiError::Remote {
                endpoint: SMS_ENDPOINT,
                status,
                body,
            }),
            _ => Ok(self.message_id.clone()),
        }
    }

    async fn add_event(&self, project_id: &str, event: &CustomerEvent) -> Result<bool, ApiError> {
        let script = self
            .record(RecordedCall::Event {
                project_id: project_id.to_string(),
                event: event.clone(),
            })
            .await;
        match script {
            Script::Reply => Ok(true),
            Script::RejectEvents(body) => Err(ApiError::Rejected { body }),
            Script::Remote(status, body) => Err(ApiError::Remote {
                endpoint: crate::client::TRACK_ENDPOINT,
                status,
                body,
            }),
        }
    }
}
