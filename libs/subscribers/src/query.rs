use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::entities::{Cart, Customer, Order, User};

/// Host query layer. Carts and orders come back with their customer and line
/// items resolved. `Ok(None)` means the entity does not exist.
#[async_trait]
pub trait EntityQuery: Send + Sync {
    async fn cart(&self, id: &str) -> Result<Option<Cart>>;
    async fn customer(&self, id: &str) -> Result<Option<Customer>>;
    async fn order(&self, id: &str) -> Result<Option<Order>>;
    async fn user(&self, id: &str) -> Result<Option<User>>;
}

/// Entities loaded from a JSON or YAML fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub carts: Vec<Cart>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Default)]
struct Store {
    carts: HashMap<String, Cart>,
    customers: HashMap<String, Customer>,
    orders: HashMap<String, Order>,
    users: HashMap<String, User>,
    failure: Option<String>,
}

#[derive(Clone, Default)]
pub struct InMemoryEntityQuery {
    store: Arc<RwLock<Store>>,
}

impl InMemoryEntityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_fixtures(fixtures: Fixtures) -> Self {
        let query = Self::new();
        for cart in fixtures.carts {
            query.insert_cart(cart).await;
        }
        for customer in fixtures.customers {
            query.insert_customer(customer).await;
        }
        for order in fixtures.orders {
            query.insert_order(order).await;
        }
        for user in fixtures.users {
            query.insert_user(user).await;
        }
        query
    }

    pub async fn insert_cart(&self, cart: Cart) {
        self.store.write().await.carts.insert(cart.id.clone(), cart);
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.store
            .write()
            .await
            .customers
            .insert(customer.id.clone(), customer);
    }

    pub async fn insert_order(&self, order: Order) {
        self.store.write().await.orders.insert(order.id.clone(), order);
    }

    pub async fn insert_user(&self, user: User) {
        self.store.write().await.users.insert(user.id.clone(), user);
    }

    /// Makes every subsequent lookup fail with `message`.
    pub async fn fail_with(&self, message: impl Into<String>) {
        self.store.write().await.failure = Some(message.into());
    }

    async fn read(&self) -> Result<tokio::sync::RwLockReadGuard<'_, Store>> {
        let store = self.store.read().await;
        if let Some(message) = &store.failure {
            bail!("{message}");
        }
        Ok(store)
    }
}

#[async_trait]
impl EntityQuery for InMemoryEntityQuery {
    async fn cart(&self, id: &str) -> Result<Option<Cart>> {
        Ok(self.read().await?.carts.get(id).cloned())
    }

    async fn customer(&self, id: &str) -> Result<Option<Customer>> {
        Ok(self.read().await?.customers.get(id).cloned())
    }

    async fn order(&self, id: &str) -> Result<Option<Order>> {
        Ok(self.read().await?.orders.get(id).cloned())
    }

    async fn user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.read().await?.users.get(id).cloned())
    }
}
