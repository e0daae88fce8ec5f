//! In-process tracking store.
//!
//! All state lives behind one [`tokio::sync::RwLock`], so every operation
//! is a single critical section and trivially atomic. Collections are kept
//! in insertion order, which gives the same listing order as the Postgres
//! store's `created_at` ordering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::TrackingStore;
use super::models::{NewProduct, SubscribeOutcome, UnsubscribeOutcome};
use crate::domain::{Product, ProductId, User, UserId};
use crate::error::TrackerError;

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    products: Vec<Product>,
    subscriptions: Vec<(UserId, ProductId)>,
}

impl State {
    fn upsert_product(&mut self, new: &NewProduct) -> Product {
        if let Some(product) = self
            .products
            .iter_mut()
            .find(|p| p.canonical_id == new.canonical_id)
        {
            if new.price.is_some() {
                product.last_known_price.clone_from(&new.price);
            }
            if new.display_name.is_some() {
                product.display_name.clone_from(&new.display_name);
            }
            return product.clone();
        }

        let product = Product {
            id: ProductId::new(),
            canonical_id: new.canonical_id.clone(),
            retailer: new.retailer.clone(),
            source_url: new.source_url.clone(),
            display_name: new.display_name.clone(),
            last_known_price: new.price.clone(),
            last_checked: None,
            created_at: Utc::now(),
        };
        self.products.push(product.clone());
        tracing::debug!(product_id = %product.id, canonical_id = %product.canonical_id, "product created");
        product
    }

    /// Inserts the subscription. The product must exist.
    fn link(&mut self, user: UserId, product: ProductId) -> Result<SubscribeOutcome, TrackerError> {
        if !self.users.iter().any(|u| u.id == user) {
            return Err(TrackerError::UserNotFound(user.to_string()));
        }
        if self.subscriptions.contains(&(user, product)) {
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }
        self.subscriptions.push((user, product));
        Ok(SubscribeOutcome::Subscribed)
    }

    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product, TrackerError> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| TrackerError::ProductNotFound(id.to_string()))
    }
}

/// Tracking store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn get_or_create_user(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, TrackerError> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.external_id == external_id) {
            if let Some(name) = display_name {
                user.display_name = Some(name.to_string());
            }
            return Ok(user.clone());
        }

        let user = User {
            id: UserId::new(),
            external_id: external_id.to_string(),
            display_name: display_name.map(str::to_string),
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        tracing::debug!(user_id = %user.id, external_id, "user created");
        Ok(user)
    }

    async fn find_user(&self, external_id: &str) -> Result<Option<User>, TrackerError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn get_or_create_product(&self, new: &NewProduct) -> Result<Product, TrackerError> {
        Ok(self.state.write().await.upsert_product(new))
    }

    async fn find_product(&self, canonical_id: &str) -> Result<Option<Product>, TrackerError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .find(|p| p.canonical_id == canonical_id)
            .cloned())
    }

    async fn subscribe(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<SubscribeOutcome, TrackerError> {
        let mut state = self.state.write().await;
        if !state.products.iter().any(|p| p.id == product) {
            return Err(TrackerError::ProductNotFound(product.to_string()));
        }
        state.link(user, product)
    }

    async fn track_product(
        &self,
        user: UserId,
        new: &NewProduct,
    ) -> Result<(Product, SubscribeOutcome), TrackerError> {
        let mut state = self.state.write().await;
        if !state.users.iter().any(|u| u.id == user) {
            return Err(TrackerError::UserNotFound(user.to_string()));
        }
        let product = state.upsert_product(new);
        let outcome = state.link(user, product.id)?;
        Ok((product, outcome))
    }

    async fn unsubscribe(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<UnsubscribeOutcome, TrackerError> {
        let mut state = self.state.write().await;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| *s != (user, product));
        if state.subscriptions.len() == before {
            return Ok(UnsubscribeOutcome::NotSubscribed);
        }

        let orphaned = !state.subscriptions.iter().any(|(_, p)| *p == product);
        if orphaned {
            state.products.retain(|p| p.id != product);
            tracing::debug!(product_id = %product, "last subscription removed, product deleted");
        }
        Ok(UnsubscribeOutcome::Unsubscribed {
            product_deleted: orphaned,
        })
    }

    async fn update_price(
        &self,
        product: ProductId,
        price: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.write().await;
        let product = state.product_mut(product)?;
        product.last_known_price = Some(price.to_string());
        product.last_checked = Some(checked_at);
        Ok(())
    }

    async fn mark_checked(
        &self,
        product: ProductId,
        checked_at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.write().await;
        state.product_mut(product)?.last_checked = Some(checked_at);
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, TrackerError> {
        Ok(self.state.read().await.products.clone())
    }

    async fn list_subscriptions(&self, user: UserId) -> Result<Vec<Product>, TrackerError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|(u, _)| *u == user)
            .filter_map(|(_, pid)| state.products.iter().find(|p| p.id == *pid))
            .cloned()
            .collect())
    }

    async fn list_subscribers(&self, product: ProductId) -> Result<Vec<User>, TrackerError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|(_, p)| *p == product)
            .filter_map(|(uid, _)| state.users.iter().find(|u| u.id == *uid))
            .cloned()
            .collect())
    }

    async fn count_users(&self) -> Result<u64, TrackerError> {
        Ok(self.state.read().await.users.len() as u64)
    }

    async fn count_products(&self) -> Result<u64, TrackerError> {
        Ok(self.state.read().await.products.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn new_product(canonical_id: &str, price: Option<&str>) -> NewProduct {
        NewProduct {
            canonical_id: canonical_id.to_string(),
            retailer: "amazon".to_string(),
            source_url: format!("https://www.amazon.in/dp/{canonical_id}"),
            display_name: Some("Acme Phone".to_string()),
            price: price.map(str::to_string),
        }
    }

    async fn user(store: &MemoryStore, external_id: &str) -> User {
        let Ok(user) = store.get_or_create_user(external_id, None).await else {
            panic!("user creation succeeds");
        };
        user
    }

    async fn product(store: &MemoryStore, new: &NewProduct) -> Product {
        let Ok(product) = store.get_or_create_product(new).await else {
            panic!("product creation succeeds");
        };
        product
    }

    #[tokio::test]
    async fn get_or_create_user_is_idempotent_and_refreshes_name() {
        let store = MemoryStore::new();
        let first = user(&store, "42").await;
        let Ok(second) = store.get_or_create_user("42", Some("Asha")).await else {
            panic!("lookup succeeds");
        };
        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name.as_deref(), Some("Asha"));

        let Ok(third) = store.get_or_create_user("42", None).await else {
            panic!("lookup succeeds");
        };
        assert_eq!(third.display_name.as_deref(), Some("Asha"));
        assert!(matches!(store.count_users().await, Ok(1)));
    }

    #[tokio::test]
    async fn same_canonical_id_keeps_one_row_with_latest_price() {
        let store = MemoryStore::new();
        let a = product(&store, &new_product("B0CXYZ1234", Some("₹1,499"))).await;
        let b = product(&store, &new_product("B0CXYZ1234", Some("₹1,299"))).await;

        assert_eq!(a.id, b.id);
        assert!(matches!(store.count_products().await, Ok(1)));
        let Ok(Some(stored)) = store.find_product("B0CXYZ1234").await else {
            panic!("product exists");
        };
        assert_eq!(stored.last_known_price.as_deref(), Some("₹1,299"));
    }

    #[tokio::test]
    async fn null_price_does_not_overwrite() {
        let store = MemoryStore::new();
        product(&store, &new_product("B0CXYZ1234", Some("₹1,499"))).await;
        let again = product(&store, &new_product("B0CXYZ1234", None)).await;
        assert_eq!(again.last_known_price.as_deref(), Some("₹1,499"));
    }

    #[tokio::test]
    async fn subscribe_twice_creates_one_subscription() {
        let store = MemoryStore::new();
        let u = user(&store, "1").await;
        let p = product(&store, &new_product("B0CXYZ1234", Some("₹10"))).await;

        assert!(matches!(
            store.subscribe(u.id, p.id).await,
            Ok(SubscribeOutcome::Subscribed)
        ));
        assert!(matches!(
            store.subscribe(u.id, p.id).await,
            Ok(SubscribeOutcome::AlreadySubscribed)
        ));
        let Ok(subs) = store.list_subscriptions(u.id).await else {
            panic!("listing succeeds");
        };
        assert_eq!(subs.len(), 1);
    }

    #[tokio::test]
    async fn subscribe_to_missing_product_is_not_found() {
        let store = MemoryStore::new();
        let u = user(&store, "1").await;
        assert!(matches!(
            store.subscribe(u.id, ProductId::new()).await,
            Err(TrackerError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn removing_last_subscription_deletes_product() {
        let store = MemoryStore::new();
        let u = user(&store, "1").await;
        let p = product(&store, &new_product("B0CXYZ1234", Some("₹10"))).await;
        let _ = store.subscribe(u.id, p.id).await;

        assert!(matches!(
            store.unsubscribe(u.id, p.id).await,
            Ok(UnsubscribeOutcome::Unsubscribed {
                product_deleted: true
            })
        ));
        assert!(matches!(store.find_product("B0CXYZ1234").await, Ok(None)));
        assert!(matches!(
            store.unsubscribe(u.id, p.id).await,
            Ok(UnsubscribeOutcome::NotSubscribed)
        ));
    }

    #[tokio::test]
    async fn removing_non_last_subscription_keeps_product_and_price() {
        let store = MemoryStore::new();
        let u1 = user(&store, "1").await;
        let u2 = user(&store, "2").await;
        let p = product(&store, &new_product("B0CXYZ1234", Some("₹1,499"))).await;
        let _ = store.subscribe(u1.id, p.id).await;
        let _ = store.subscribe(u2.id, p.id).await;

        assert!(matches!(
            store.unsubscribe(u1.id, p.id).await,
            Ok(UnsubscribeOutcome::Unsubscribed {
                product_deleted: false
            })
        ));
        let Ok(Some(stored)) = store.find_product("B0CXYZ1234").await else {
            panic!("product survives");
        };
        assert_eq!(stored.last_known_price.as_deref(), Some("₹1,499"));
        let Ok(subscribers) = store.list_subscribers(p.id).await else {
            panic!("listing succeeds");
        };
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers.first().map(|u| u.id), Some(u2.id));
    }

    #[tokio::test]
    async fn update_price_leaves_subscriptions_alone() {
        let store = MemoryStore::new();
        let u = user(&store, "1").await;
        let p = product(&store, &new_product("B0CXYZ1234", Some("₹10"))).await;
        let _ = store.subscribe(u.id, p.id).await;

        let now = Utc::now();
        assert!(store.update_price(p.id, "₹9", now).await.is_ok());
        let Ok(Some(stored)) = store.find_product("B0CXYZ1234").await else {
            panic!("product exists");
        };
        assert_eq!(stored.last_known_price.as_deref(), Some("₹9"));
        assert_eq!(stored.last_checked, Some(now));
        assert!(matches!(store.list_subscribers(p.id).await, Ok(v) if v.len() == 1));

        assert!(matches!(
            store.mark_checked(ProductId::new(), now).await,
            Err(TrackerError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn track_product_for_unknown_user_writes_nothing() {
        let store = MemoryStore::new();
        let result = store
            .track_product(UserId::new(), &new_product("B0CXYZ1234", Some("₹10")))
            .await;
        assert!(matches!(result, Err(TrackerError::UserNotFound(_))));
        assert!(matches!(store.count_products().await, Ok(0)));

        let u = user(&store, "1").await;
        let Ok((p, outcome)) = store
            .track_product(u.id, &new_product("B0CXYZ1234", Some("₹10")))
            .await
        else {
            panic!("track succeeds");
        };
        assert_eq!(outcome, SubscribeOutcome::Subscribed);
        assert!(matches!(store.list_subscribers(p.id).await, Ok(v) if v.len() == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_track_and_unsubscribe_keep_products_referenced() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let new = new_product("B0CXYZ1234", Some("₹10"));

        for _ in 0..200 {
            let Ok((p, _)) = store.track_product(a.id, &new).await else {
                panic!("a tracks");
            };

            let tracker = {
                let store = std::sync::Arc::clone(&store);
                let new = new.clone();
                tokio::spawn(async move { store.track_product(b.id, &new).await })
            };
            let leaver = {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move { store.unsubscribe(a.id, p.id).await })
            };
            let (tracked, left) = tokio::join!(tracker, leaver);
            let Ok(Ok((tracked, _))) = tracked else {
                panic!("b tracks");
            };
            assert!(matches!(left, Ok(Ok(_))));

            let Ok(found) = store.find_product("B0CXYZ1234").await else {
                panic!("lookup");
            };
            let Some(found) = found else {
                panic!("product referenced by b must exist");
            };
            assert_eq!(found.id, tracked.id);
            let Ok(subscribers) = store.list_subscribers(found.id).await else {
                panic!("subscribers");
            };
            assert_eq!(subscribers.len(), 1);
            assert!(subscribers.iter().all(|u| u.id == b.id));

            assert!(matches!(
                store.unsubscribe(b.id, found.id).await,
                Ok(UnsubscribeOutcome::Unsubscribed { product_deleted: true })
            ));
            assert!(matches!(store.count_products().await, Ok(0)));
        }
    }
}
