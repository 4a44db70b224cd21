use std::fmt;
use std::str::FromStr;

/// Commerce lifecycle events the subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommerceEvent {
    CartCreated,
    CartUpdated,
    CustomerCreated,
    CustomerUpdated,
    OrderPlaced,
    UserCreated,
}

impl CommerceEvent {
    pub const ALL: [CommerceEvent; 6] = [
        CommerceEvent::CartCreated,
        CommerceEvent::CartUpdated,
        CommerceEvent::CustomerCreated,
        CommerceEvent::CustomerUpdated,
        CommerceEvent::OrderPlaced,
        CommerceEvent::UserCreated,
    ];

    /// Name on the host event bus.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommerceEvent::CartCreated => "cart.created",
            CommerceEvent::CartUpdated => "cart.updated",
            CommerceEvent::CustomerCreated => "customer.created",
            CommerceEvent::CustomerUpdated => "customer.updated",
            CommerceEvent::OrderPlaced => "order.placed",
            CommerceEvent::UserCreated => "user.created",
        }
    }

    /// Abstract notification template, resolved through the provider mappings.
    pub fn template(&self) -> &'static str {
        match self {
            CommerceEvent::CartCreated => "cart-created",
            CommerceEvent::CartUpdated => "cart-updated",
            CommerceEvent::CustomerCreated => "customer-created",
            CommerceEvent::CustomerUpdated => "customer-updated",
            CommerceEvent::OrderPlaced => "order-placed",
            CommerceEvent::UserCreated => "user-created",
        }
    }

    /// Event type recorded on the customer profile.
    pub fn tracked_event(&self) -> &'static str {
        match self {
            CommerceEvent::CartCreated => "cart_created",
            CommerceEvent::CartUpdated => "cart_updated",
            CommerceEvent::CustomerCreated => "customer_created",
            CommerceEvent::CustomerUpdated => "customer_updated",
            CommerceEvent::OrderPlaced => "order_placed",
            CommerceEvent::UserCreated => "user_created",
        }
    }

    pub fn workflow_name(&self) -> &'static str {
        match self {
            CommerceEvent::CartCreated => "track-cart-created-workflow",
            CommerceEvent::CartUpdated => "track-cart-updated-workflow",
            CommerceEvent::CustomerCreated => "track-customer-created-workflow",
            CommerceEvent::CustomerUpdated => "track-customer-updated-workflow",
            CommerceEvent::OrderPlaced => "track-order-placed-workflow",
            CommerceEvent::UserCreated => "track-user-created-workflow",
        }
    }
}

impl fmt::Display for CommerceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommerceEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CommerceEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == value)
            .ok_or_else(|| format!("unsupported commerce event `{value}`"))
    }
}
