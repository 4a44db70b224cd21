use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Customer identifier map, e.g. `{"registered": "user@example.com"}`.
pub type CustomerIds = BTreeMap<String, String>;

/// Free-form JSON object used for template params, settings and event properties.
pub type Params = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferIdentity {
    Enabled,
    Disabled,
    FirstClick,
}

impl TransferIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferIdentity::Enabled => "enabled",
            TransferIdentity::Disabled => "disabled",
            TransferIdentity::FirstClick => "first_click",
        }
    }
}

impl fmt::Display for TransferIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferIdentity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(TransferIdentity::Enabled),
            "disabled" => Ok(TransferIdentity::Disabled),
            "first_click" | "first-click" => Ok(TransferIdentity::FirstClick),
            other => Err(format!("unknown transfer_identity mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    pub customer_ids: CustomerIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A single transactional email send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionalEmail {
    pub integration_id: String,
    pub template_id: String,
    pub campaign_name: String,
    pub recipient: EmailRecipient,
    pub params: Option<Params>,
    /// Overrides the template's sender address when set.
    pub sender_address: Option<String>,
    pub sender_name: Option<String>,
    pub transfer_identity: Option<TransferIdentity>,
    pub settings: Option<Params>,
}

impl TransactionalEmail {
    /// JSON body exactly as it is posted to the email endpoint.
    pub fn body(&self) -> Value {
        serde_json::to_value(self.wire()).unwrap_or(Value::Null)
    }

    pub(crate) fn wire(&self) -> EmailBody<'_> {
        EmailBody {
            integration_id: &self.integration_id,
            email_content: EmailContent {
                template_id: &self.template_id,
                sender_address: non_empty(&self.sender_address),
                sender_name: non_empty(&self.sender_name),
                params: self.params.as_ref(),
            },
            campaign_name: &self.campaign_name,
            recipient: &self.recipient,
            transfer_identity: self.transfer_identity,
            settings: self.settings.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmsContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Platform accepts 1..=8 and defaults to 8; passed through unchecked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_message_parts: Option<u8>,
}

impl SmsContent {
    pub fn template(template_id: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            template_id: Some(template_id.into()),
            params,
            ..Self::default()
        }
    }

    pub fn raw(message: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            sender: Some(sender.into()),
            ..Self::default()
        }
    }

    fn wire(&self) -> SmsContentBody<'_> {
        SmsContentBody {
            template_id: non_empty(&self.template_id),
            params: self.params.as_ref(),
            message: non_empty(&self.message),
            sender: non_empty(&self.sender),
            max_message_parts: self.max_message_parts,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmsRecipient {
    /// Taken from the customer profile when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub customer_ids: CustomerIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A single transactional SMS send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionalSms {
    pub campaign_name: String,
    pub content: SmsContent,
    pub recipient: SmsRecipient,
    pub integration_id: Option<String>,
    pub settings: Option<Params>,
}

impl TransactionalSms {
    pub fn body(&self) -> Value {
        serde_json::to_value(self.wire()).unwrap_or(Value::Null)
    }

    pub(crate) fn wire(&self) -> SmsBody<'_> {
        SmsBody {
            integration_id: non_empty(&self.integration_id),
            content: self.content.wire(),
            campaign_name: &self.campaign_name,
            recipient: &self.recipient,
            settings: self.settings.as_ref(),
        }
    }
}

/// Event time as accepted by the tracking API: epoch seconds or a date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    Unix(i64),
    Text(String),
}

impl From<i64> for EventTimestamp {
    fn from(value: i64) -> Self {
        EventTimestamp::Unix(value)
    }
}

impl From<String> for EventTimestamp {
    fn from(value: String) -> Self {
        EventTimestamp::Text(value)
    }
}

/// An event attached to a customer profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerEvent {
    pub customer_ids: CustomerIds,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<EventTimestamp>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailBody<'a> {
    integration_id: &'a str,
    email_content: EmailContent<'a>,
    campaign_name: &'a str,
    recipient: &'a EmailRecipient,
    #[serde(skip_serializing_if = "Option::is_none")]
    transfer_identity: Option<TransferIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a Params>,
}

#[derive(Debug, Serialize)]
struct EmailContent<'a> {
    template_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Params>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SmsBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    integration_id: Option<&'a str>,
    content: SmsContentBody<'a>,
    campaign_name: &'a str,
    recipient: &'a SmsRecipient,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a Params>,
}

#[derive(Debug, Serialize)]
struct SmsContentBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_message_parts: Option<u8>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
