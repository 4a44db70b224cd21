//! Tracking workflows: load the entity, then record one event for it.
//!
//! The event builders are pure so the property bags can be checked without a
//! query layer or provider.

use std::sync::Arc;

use engage_providers::{AnalyticsProvider, ProviderError, TrackEvent};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{Instrument, debug, info_span};

use crate::entities::{Cart, Customer, LineItem, Order, User};
use crate::events::CommerceEvent;
use crate::query::EntityQuery;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Query(#[from] anyhow::Error),
    #[error(transparent)]
    Track(#[from] ProviderError),
}

#[derive(Serialize)]
struct CartItemProperties<'a> {
    variant_id: Option<&'a str>,
    product_id: Option<&'a str>,
    quantity: u32,
    unit_price: f64,
}

#[derive(Serialize)]
struct CartProperties<'a> {
    cart_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_email: Option<&'a str>,
    customer_name: String,
    items_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtotal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<CartItemProperties<'a>>>,
}

#[derive(Serialize)]
struct CustomerProperties<'a> {
    customer_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    has_account: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<&'a str>,
}

#[derive(Serialize)]
struct OrderItemProperties<'a> {
    id: &'a str,
    variant_id: Option<&'a str>,
    product_id: Option<&'a str>,
    quantity: u32,
    unit_price: f64,
    total: Option<f64>,
}

#[derive(Serialize)]
struct OrderProperties<'a> {
    order_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_email: Option<&'a str>,
    customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtotal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tax_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shipping_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    items_count: usize,
    items: Vec<OrderItemProperties<'a>>,
}

#[derive(Serialize)]
struct UserProperties<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    user_name: String,
}

fn properties<T: Serialize>(bag: &T) -> Map<String, Value> {
    match serde_json::to_value(bag) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn track_event(event: CommerceEvent, actor: Option<&str>, bag: Map<String, Value>) -> TrackEvent {
    let track = TrackEvent::new(event.tracked_event()).with_properties(bag);
    match actor {
        Some(actor) => track.with_actor(actor),
        None => track,
    }
}

fn cart_items(items: &[LineItem]) -> Vec<CartItemProperties<'_>> {
    items
        .iter()
        .map(|item| CartItemProperties {
            variant_id: item.variant_id.as_deref(),
            product_id: item.product_id.as_deref(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect()
}

fn cart_properties(cart: &Cart, detailed: bool) -> CartProperties<'_> {
    let customer = cart.customer.as_ref();
    CartProperties {
        cart_id: &cart.id,
        customer_email: customer.and_then(|c| c.email.as_deref()),
        customer_name: customer.map(Customer::full_name).unwrap_or_default(),
        items_count: cart.items.len(),
        subtotal: cart.subtotal.filter(|_| detailed),
        total: cart.total.filter(|_| detailed),
        currency: cart.currency_code.as_deref(),
        items: detailed.then(|| cart_items(&cart.items)),
    }
}

pub fn cart_created_event(cart: &Cart) -> TrackEvent {
    track_event(
        CommerceEvent::CartCreated,
        cart.customer.as_ref().map(|c| c.id.as_str()),
        properties(&cart_properties(cart, false)),
    )
}

pub fn cart_updated_event(cart: &Cart) -> TrackEvent {
    track_event(
        CommerceEvent::CartUpdated,
        cart.customer.as_ref().map(|c| c.id.as_str()),
        properties(&cart_properties(cart, true)),
    )
}

fn customer_properties(customer: &Customer) -> CustomerProperties<'_> {
    CustomerProperties {
        customer_id: &customer.id,
        email: customer.email.as_deref(),
        customer_name: customer.full_name(),
        first_name: customer.first_name.as_deref(),
        last_name: customer.last_name.as_deref(),
        has_account: customer.has_account,
        created_at: None,
        updated_at: None,
    }
}

pub fn customer_created_event(customer: &Customer) -> TrackEvent {
    let bag = CustomerProperties {
        created_at: customer.created_at.as_deref(),
        ..customer_properties(customer)
    };
    track_event(
        CommerceEvent::CustomerCreated,
        Some(customer.id.as_str()),
        properties(&bag),
    )
}

pub fn customer_updated_event(customer: &Customer) -> TrackEvent {
    let bag = CustomerProperties {
        updated_at: customer.updated_at.as_deref(),
        ..customer_properties(customer)
    };
    track_event(
        CommerceEvent::CustomerUpdated,
        Some(customer.id.as_str()),
        properties(&bag),
    )
}

pub fn order_placed_event(order: &Order) -> TrackEvent {
    let customer = order.customer.as_ref();
    let bag = OrderProperties {
        order_id: &order.id,
        order_number: order.display_id,
        customer_email: customer.and_then(|c| c.email.as_deref()),
        customer_name: customer.map(Customer::full_name).unwrap_or_default(),
        subtotal: order.subtotal,
        total: order.total,
        tax_total: order.tax_total,
        shipping_total: order.shipping_total,
        currency: order.currency_code.as_deref(),
        status: order.status.as_deref(),
        items_count: order.items.len(),
        items: order
            .items
            .iter()
            .map(|item| OrderItemProperties {
                id: &item.id,
                variant_id: item.variant_id.as_deref(),
                product_id: item.product_id.as_deref(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total,
            })
            .collect(),
    };
    track_event(
        CommerceEvent::OrderPlaced,
        customer.map(|c| c.id.as_str()),
        properties(&bag),
    )
}

pub fn user_created_event(user: &User) -> TrackEvent {
    let bag = UserProperties {
        user_id: &user.id,
        email: user.email.as_deref(),
        user_name: user.full_name(),
    };
    track_event(CommerceEvent::UserCreated, Some(user.id.as_str()), properties(&bag))
}

/// Runs the tracking workflow of each commerce event.
#[derive(Clone)]
pub struct TrackingWorkflows {
    query: Arc<dyn EntityQuery>,
    analytics: Arc<dyn AnalyticsProvider>,
}

impl TrackingWorkflows {
    pub fn new(query: Arc<dyn EntityQuery>, analytics: Arc<dyn AnalyticsProvider>) -> Self {
        Self { query, analytics }
    }

    pub async fn run(&self, event: CommerceEvent, id: &str) -> Result<(), WorkflowError> {
        let span = info_span!(
            "workflow.run",
            workflow = event.workflow_name(),
            entity_id = %id
        );
        async {
            let track = self.load(event, id).await?;
            self.analytics.track(&track).await?;
            debug!("workflow completed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn load(&self, event: CommerceEvent, id: &str) -> Result<TrackEvent, WorkflowError> {
        let not_found = |entity: &'static str| WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        };
        let track = match event {
            CommerceEvent::CartCreated | CommerceEvent::CartUpdated => {
                let cart = self.query.cart(id).await?.ok_or_else(|| not_found("cart"))?;
                if event == CommerceEvent::CartCreated {
                    cart_created_event(&cart)
                } else {
                    cart_updated_event(&cart)
                }
            }
            CommerceEvent::CustomerCreated | CommerceEvent::CustomerUpdated => {
                let customer = self
                    .query
                    .customer(id)
                    .await?
                    .ok_or_else(|| not_found("customer"))?;
                if event == CommerceEvent::CustomerCreated {
                    customer_created_event(&customer)
                } else {
                    customer_updated_event(&customer)
                }
            }
            CommerceEvent::OrderPlaced => {
                let order = self.query.order(id).await?.ok_or_else(|| not_found("order"))?;
                order_placed_event(&order)
            }
            CommerceEvent::UserCreated => {
                let user = self.query.user(id).await?.ok_or_else(|| not_found("user"))?;
                user_created_event(&user)
            }
        };
        Ok(track)
    }
}
