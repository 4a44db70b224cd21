use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use engage_sdk::{
    CustomerIds, EmailRecipient, EngagementApi, Params, SmsContent, SmsRecipient,
    TransactionalEmail, TransactionalSms,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::options::{NotificationOptions, ProviderOptions, validate_options};

pub const CHANNEL_EMAIL: &str = "email";
pub const CHANNEL_SMS: &str = "sms";

/// A host-side "send notification" request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderNotification {
    /// Email address or phone number, depending on the channel.
    #[serde(default)]
    pub to: String,
    pub channel: String,
    /// Abstract template name, translated through the configured mappings.
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Params>,
}

impl ProviderNotification {
    pub fn email(to: impl Into<String>, template: impl Into<String>, data: Option<Params>) -> Self {
        Self {
            to: to.into(),
            channel: CHANNEL_EMAIL.into(),
            template: template.into(),
            data,
        }
    }

    pub fn sms(to: impl Into<String>, template: impl Into<String>, data: Option<Params>) -> Self {
        Self {
            to: to.into(),
            channel: CHANNEL_SMS.into(),
            template: template.into(),
            data,
        }
    }
}

/// `id` is `None` when the send was skipped for lack of a template mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl NotificationResult {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn is_skipped(&self) -> bool {
        self.id.is_none()
    }
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    fn identifier(&self) -> &'static str;

    async fn send(
        &self,
        notification: &ProviderNotification,
    ) -> Result<NotificationResult, ProviderError>;
}

pub struct BloomreachNotificationProvider {
    api: Arc<dyn EngagementApi>,
    options: NotificationOptions,
}

impl fmt::Debug for BloomreachNotificationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomreachNotificationProvider")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BloomreachNotificationProvider {
    pub const IDENTIFIER: &'static str = "bloomreach-notification";

    /// Validates the options up front; a provider that constructs is able to
    /// send email. SMS additionally needs `from_sms`, checked per send.
    pub fn new(api: Arc<dyn EngagementApi>, options: ProviderOptions) -> Result<Self, ProviderError> {
        validate_options(&options)?;
        Ok(Self {
            api,
            options: options.notifications,
        })
    }

    pub fn options(&self) -> &NotificationOptions {
        &self.options
    }

    fn customer_ids(to: &str) -> CustomerIds {
        let mut ids = CustomerIds::new();
        if !to.is_empty() {
            ids.insert("registered".into(), to.to_string());
        }
        ids
    }

    async fn send_email(
        &self,
        notification: &ProviderNotification,
        template_id: &str,
        campaign_name: &str,
    ) -> Result<NotificationResult, ProviderError> {
        let email = TransactionalEmail {
            integration_id: self.options.integration_id.clone(),
            template_id: template_id.to_string(),
            campaign_name: campaign_name.to_string(),
            recipient: EmailRecipient {
                email: notification.to.clone(),
                customer_ids: Self::customer_ids(&notification.to),
                language: self.options.language().map(str::to_string),
            },
            params: notification.data.clone(),
            sender_address: Some(self.options.from_email.clone()),
            sender_name: Some(self.options.from_name.clone()),
            transfer_identity: self.options.transfer_identity,
            settings: None,
        };
        let message_id = self
            .api
            .send_transactional_email(&self.options.project_id, &email)
            .await?;
        debug!(template = %notification.template, %message_id, "transactional email sent");
        Ok(NotificationResult {
            id: Some(message_id),
        })
    }

    async fn send_sms(
        &self,
        notification: &ProviderNotification,
        template_id: &str,
        campaign_name: &str,
    ) -> Result<NotificationResult, ProviderError> {
        if self.options.from_sms().is_none() {
            return Err(ProviderError::invalid_configuration(
                "From SMS is required in the provider's options to send SMS notifications.",
            ));
        }
        let phone = Some(notification.to.clone()).filter(|to| !to.is_empty());
        let sms = TransactionalSms {
            campaign_name: campaign_name.to_string(),
            content: SmsContent::template(template_id, notification.data.clone()),
            recipient: SmsRecipient {
                phone,
                customer_ids: Self::customer_ids(&notification.to),
                language: self.options.language().map(str::to_string),
            },
            integration_id: Some(self.options.integration_id.clone()),
            settings: None,
        };
        let message_id = self
            .api
            .send_transactional_sms(&self.options.project_id, &sms)
            .await?;
        debug!(template = %notification.template, %message_id, "transactional sms sent");
        Ok(NotificationResult {
            id: Some(message_id),
        })
    }
}

#[async_trait]
impl NotificationProvider for BloomreachNotificationProvider {
    fn identifier(&self) -> &'static str {
        Self::IDENTIFIER
    }

    async fn send(
        &self,
        notification: &ProviderNotification,
    ) -> Result<NotificationResult, ProviderError> {
        let Some((template_id, campaign_name)) = self.options.mapping_for(&notification.template)
        else {
            info!(
                template = %notification.template,
                channel = %notification.channel,
                "no template or campaign mapping configured, skipping notification"
            );
            return Ok(NotificationResult::skipped());
        };

        match notification.channel.as_str() {
            CHANNEL_EMAIL => self.send_email(notification, template_id, campaign_name).await,
            CHANNEL_SMS => self.send_sms(notification, template_id, campaign_name).await,
            other => Err(ProviderError::UnsupportedChannel(other.to_string())),
        }
    }
}
