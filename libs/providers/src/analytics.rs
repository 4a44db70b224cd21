use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use engage_sdk::{CustomerEvent, CustomerIds, EngagementApi, EventTimestamp, Params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::options::{ProviderOptions, validate_analytics_options};

/// Actor or group reference: either a bare id or a typed reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActorRef {
    Id(String),
    Reference {
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ActorRef {
    pub fn reference(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ActorRef::Reference {
            kind: Some(kind.into()),
            id: Some(id.into()),
        }
    }

    /// Only a bare empty id is blank; a typed reference is kept even when
    /// its parts are empty.
    pub fn is_blank(&self) -> bool {
        matches!(self, ActorRef::Id(id) if id.is_empty())
    }

    /// Customer identifiers sent with the event. Typed references always
    /// produce both keys, blank when a part is missing.
    pub fn customer_ids(&self) -> CustomerIds {
        let mut ids = CustomerIds::new();
        match self {
            ActorRef::Id(id) => {
                ids.insert("id".into(), id.clone());
            }
            ActorRef::Reference { kind, id } => {
                ids.insert("type".into(), kind.clone().unwrap_or_default());
                ids.insert("id".into(), id.clone().unwrap_or_default());
            }
        }
        ids
    }
}

impl From<&str> for ActorRef {
    fn from(value: &str) -> Self {
        ActorRef::Id(value.to_string())
    }
}

impl From<String> for ActorRef {
    fn from(value: String) -> Self {
        ActorRef::Id(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<ActorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<ActorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Params>,
}

impl TrackEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    pub fn with_actor(mut self, actor: impl Into<ActorRef>) -> Self {
        self.actor_id = Some(actor.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<ActorRef>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_properties(mut self, properties: Params) -> Self {
        self.properties = Some(properties);
        self
    }

    /// The actor wins over the group. A blank id counts as absent.
    pub fn identifier(&self) -> Option<&ActorRef> {
        self.actor_id
            .as_ref()
            .filter(|actor| !actor.is_blank())
            .or_else(|| self.group.as_ref().filter(|group| !group.is_blank()))
    }
}

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    fn identifier(&self) -> &'static str;

    async fn track(&self, event: &TrackEvent) -> Result<(), ProviderError>;
}

pub struct BloomreachAnalyticsProvider {
    api: Arc<dyn EngagementApi>,
    project_id: String,
    clock: fn() -> OffsetDateTime,
}

impl fmt::Debug for BloomreachAnalyticsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomreachAnalyticsProvider")
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl BloomreachAnalyticsProvider {
    pub const IDENTIFIER: &'static str = "bloomreach-analytics";

    pub fn new(api: Arc<dyn EngagementApi>, options: &ProviderOptions) -> Result<Self, ProviderError> {
        validate_analytics_options(options)?;
        Ok(Self {
            api,
            project_id: options.notifications.project_id.clone(),
            clock: OffsetDateTime::now_utc,
        })
    }

    /// Replaces the wall clock used to stamp tracked events.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn timestamp(&self) -> EventTimestamp {
        // IMF-fixdate, e.g. `Tue, 20 Oct 2026 10:00:00 GMT`.
        let http_date = format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        );
        let now = (self.clock)().to_offset(time::UtcOffset::UTC);
        match now.format(http_date) {
            Ok(text) => EventTimestamp::Text(text),
            Err(err) => {
                debug!(error = %err, "falling back to epoch timestamp");
                EventTimestamp::Unix(now.unix_timestamp())
            }
        }
    }
}

#[async_trait]
impl AnalyticsProvider for BloomreachAnalyticsProvider {
    fn identifier(&self) -> &'static str {
        Self::IDENTIFIER
    }

    async fn track(&self, event: &TrackEvent) -> Result<(), ProviderError> {
        let Some(identifier) = event.identifier() else {
            let payload = serde_json::to_string(event).unwrap_or_default();
            warn!(
                event = %event.event,
                payload = %payload,
                "missing actor_id or group, skipping event tracking"
            );
            return Ok(());
        };

        let customer_event = CustomerEvent {
            customer_ids: identifier.customer_ids(),
            event_type: event.event.clone(),
            properties: Some(event.properties.clone().unwrap_or_default()),
            timestamp: Some(self.timestamp()),
        };
        self.api
            .add_event(&self.project_id, &customer_event)
            .await?;
        debug!(event = %event.event, "event tracked");
        Ok(())
    }
}
