use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use engage_providers::{AnalyticsProvider, NotificationProvider, ProviderNotification};
use serde_json::{Map, Value, json};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::entities::{Cart, Customer, Order, User};
use crate::events::CommerceEvent;
use crate::query::EntityQuery;
use crate::workflows::TrackingWorkflows;

/// Result of one side effect of a handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Completed,
    Skipped(String),
    Failed(String),
}

impl BranchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, BranchOutcome::Failed(_))
    }
}

impl fmt::Display for BranchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchOutcome::Completed => f.write_str("completed"),
            BranchOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            BranchOutcome::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub event: CommerceEvent,
    pub entity_id: String,
    pub notification: BranchOutcome,
    pub tracking: BranchOutcome,
}

/// Notification for a cart event, or `None` when the cart has no customer
/// email to write to.
pub fn cart_notification(event: CommerceEvent, cart: &Cart) -> Option<ProviderNotification> {
    let customer = cart.customer.as_ref()?;
    let to = customer.contact_email()?;
    Some(ProviderNotification::email(
        to,
        event.template(),
        data(json!({"cart_id": cart.id, "customer_name": customer.full_name()})),
    ))
}

pub fn customer_notification(
    event: CommerceEvent,
    customer: &Customer,
) -> Option<ProviderNotification> {
    let to = customer.contact_email()?;
    Some(ProviderNotification::email(
        to,
        event.template(),
        data(json!({"customer_id": customer.id, "customer_name": customer.full_name()})),
    ))
}

pub fn order_notification(order: &Order) -> Option<ProviderNotification> {
    let customer = order.customer.as_ref()?;
    let to = customer.contact_email()?;
    let mut payload = json!({"order_id": order.id, "customer_name": customer.full_name()});
    if let Some(number) = order.display_id {
        payload["order_number"] = json!(number);
    }
    Some(ProviderNotification::email(
        to,
        CommerceEvent::OrderPlaced.template(),
        data(payload),
    ))
}

pub fn user_notification(user: &User) -> Option<ProviderNotification> {
    let to = user.contact_email()?;
    Some(ProviderNotification::email(
        to,
        CommerceEvent::UserCreated.template(),
        data(json!({"user_id": user.id, "user_name": user.full_name()})),
    ))
}

fn data(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Reacts to commerce lifecycle events: emails the customer and tracks the
/// event on their profile. Neither side effect can fail the other, and no
/// error reaches the caller.
#[derive(Clone)]
pub struct EventSubscriber {
    query: Arc<dyn EntityQuery>,
    notifications: Arc<dyn NotificationProvider>,
    workflows: TrackingWorkflows,
}

impl EventSubscriber {
    pub fn new(
        query: Arc<dyn EntityQuery>,
        notifications: Arc<dyn NotificationProvider>,
        analytics: Arc<dyn AnalyticsProvider>,
    ) -> Self {
        let workflows = TrackingWorkflows::new(query.clone(), analytics);
        Self {
            query,
            notifications,
            workflows,
        }
    }

    /// Every event the subscriber is registered for.
    pub fn subscribed_events(&self) -> &'static [CommerceEvent] {
        &CommerceEvent::ALL
    }

    pub async fn handle(&self, event: CommerceEvent, id: &str) -> HandlerOutcome {
        let span = info_span!("subscriber.handle", event = %event, entity_id = %id);
        async {
            info!("commerce event received");
            let (notification, tracking) =
                tokio::join!(self.notify(event, id), self.track(event, id));
            info!(%notification, %tracking, "commerce event handled");
            HandlerOutcome {
                event,
                entity_id: id.to_string(),
                notification,
                tracking,
            }
        }
        .instrument(span)
        .await
    }

    /// Routes a raw bus message (`{"id": "..."}`). Events the subscriber is
    /// not registered for are ignored.
    pub async fn dispatch(&self, event_name: &str, data: &Value) -> Option<HandlerOutcome> {
        let Ok(event) = event_name.parse::<CommerceEvent>() else {
            debug!(event = %event_name, "ignoring unsubscribed event");
            return None;
        };
        let Some(id) = data.get("id").and_then(Value::as_str) else {
            warn!(event = %event_name, payload = %data, "event payload has no entity id");
            return None;
        };
        Some(self.handle(event, id).await)
    }

    async fn notify(&self, event: CommerceEvent, id: &str) -> BranchOutcome {
        match self.try_notify(event, id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let message = format!("{err:#}");
                error!(error = %message, template = event.template(), "failed to send notification");
                BranchOutcome::Failed(message)
            }
        }
    }

    async fn try_notify(&self, event: CommerceEvent, id: &str) -> Result<BranchOutcome> {
        let Some(notification) = self.notification_for(event, id).await? else {
            info!("skipping notification, no contact email");
            return Ok(BranchOutcome::Skipped("no contact email".into()));
        };
        info!(to = %notification.to, template = %notification.template, "sending notification");
        let result = self
            .notifications
            .send(&notification)
            .await
            .with_context(|| format!("{} notification", notification.template))?;
        if result.is_skipped() {
            return Ok(BranchOutcome::Skipped("no template mapping".into()));
        }
        Ok(BranchOutcome::Completed)
    }

    async fn notification_for(
        &self,
        event: CommerceEvent,
        id: &str,
    ) -> Result<Option<ProviderNotification>> {
        let missing = |entity: &str| anyhow!("{entity} {id} not found");
        let notification = match event {
            CommerceEvent::CartCreated | CommerceEvent::CartUpdated => {
                let cart = self.query.cart(id).await?.ok_or_else(|| missing("cart"))?;
                cart_notification(event, &cart)
            }
            CommerceEvent::CustomerCreated | CommerceEvent::CustomerUpdated => {
                let customer = self
                    .query
                    .customer(id)
                    .await?
                    .ok_or_else(|| missing("customer"))?;
                customer_notification(event, &customer)
            }
            CommerceEvent::OrderPlaced => {
                let order = self.query.order(id).await?.ok_or_else(|| missing("order"))?;
                order_notification(&order)
            }
            CommerceEvent::UserCreated => {
                let user = self.query.user(id).await?.ok_or_else(|| missing("user"))?;
                user_notification(&user)
            }
        };
        Ok(notification)
    }

    async fn track(&self, event: CommerceEvent, id: &str) -> BranchOutcome {
        match self.workflows.run(event, id).await {
            Ok(()) => BranchOutcome::Completed,
            Err(err) => {
                error!(error = %err, workflow = event.workflow_name(), "failed to track event");
                BranchOutcome::Failed(err.to_string())
            }
        }
    }
}
