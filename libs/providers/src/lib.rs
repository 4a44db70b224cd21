//! Notification and analytics providers backed by Bloomreach Engagement.
//!
//! Both providers share one [`ProviderOptions`] block and talk to the platform
//! through an [`EngagementApi`], so tests can swap in a recording double.
pub mod analytics;
pub mod error;
pub mod notification;
pub mod options;

use engage_sdk::{BloomreachClient, EngagementApi};

pub use analytics::{ActorRef, AnalyticsProvider, BloomreachAnalyticsProvider, TrackEvent};
pub use error::ProviderError;
pub use notification::{
    BloomreachNotificationProvider, CHANNEL_EMAIL, CHANNEL_SMS, NotificationProvider,
    NotificationResult, ProviderNotification,
};
pub use options::{
    NotificationOptions, ProviderOptions, validate_analytics_options, validate_options,
};

/// Builds the HTTP client for the configured account, honouring `api_base`.
pub fn client_from_options(
    http: reqwest::Client,
    options: &ProviderOptions,
) -> Result<BloomreachClient, ProviderError> {
    let client = BloomreachClient::new(
        http,
        options.notifications.credentials(),
        options.notifications.api_base.clone(),
    )?;
    Ok(client)
}

/// Convenience for hosts that register both providers against one client.
pub fn providers_from_options(
    api: std::sync::Arc<dyn EngagementApi>,
    options: ProviderOptions,
) -> Result<(BloomreachNotificationProvider, BloomreachAnalyticsProvider), ProviderError> {
    let analytics = BloomreachAnalyticsProvider::new(api.clone(), &options)?;
    let notifications = BloomreachNotificationProvider::new(api, options)?;
    Ok((notifications, analytics))
}
