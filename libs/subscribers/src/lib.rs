//! Commerce lifecycle subscribers.
//!
//! Each subscribed event loads the changed entity through [`EntityQuery`],
//! emails the customer when an address is known and records a tracking event
//! through the analytics provider.
pub mod entities;
pub mod events;
pub mod handlers;
pub mod query;
pub mod workflows;

pub use entities::{Cart, Customer, LineItem, Order, User, full_name};
pub use events::CommerceEvent;
pub use handlers::{BranchOutcome, EventSubscriber, HandlerOutcome};
pub use query::{EntityQuery, Fixtures, InMemoryEntityQuery};
pub use workflows::{TrackingWorkflows, WorkflowError};
