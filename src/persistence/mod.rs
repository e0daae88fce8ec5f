//! Tracking store: users, products, and the subscriptions between them.
//!
//! [`TrackingStore`] is the only owner of persisted state. Two
//! implementations exist: [`PostgresStore`] (sqlx, used when persistence is
//! enabled) and [`MemoryStore`] (in-process, used otherwise and in tests).
//! Both keep the invariant that a product exists iff at least one
//! subscription references it.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Product, ProductId, User, UserId};
use crate::error::TrackerError;

pub use memory::MemoryStore;
pub use models::{NewProduct, SubscribeOutcome, UnsubscribeOutcome};
pub use postgres::PostgresStore;

/// Durable storage for the user/product subscription graph.
///
/// Every mutation is atomic: on failure nothing is written.
#[async_trait]
pub trait TrackingStore: std::fmt::Debug + Send + Sync {
    /// Returns the user with `external_id`, creating it on first contact.
    ///
    /// A supplied `display_name` replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn get_or_create_user(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, TrackerError>;

    /// Looks a user up by external identity.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn find_user(&self, external_id: &str) -> Result<Option<User>, TrackerError>;

    /// Returns the product with `new.canonical_id`, creating it if absent.
    ///
    /// When it already exists, non-null price and title from `new` replace
    /// the stored values.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn get_or_create_product(&self, new: &NewProduct) -> Result<Product, TrackerError>;

    /// Looks a product up by canonical ID.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn find_product(&self, canonical_id: &str) -> Result<Option<Product>, TrackerError>;

    /// Links `user` to `product`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::ProductNotFound`] if the product was deleted
    /// concurrently, or [`TrackerError::StoreError`] on storage failure.
    async fn subscribe(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<SubscribeOutcome, TrackerError>;

    /// Creates or refreshes the product described by `new` and subscribes
    /// `user` to it in one transaction. Either both are written or neither.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UserNotFound`] if the user does not exist, or
    /// [`TrackerError::StoreError`] on storage failure.
    async fn track_product(
        &self,
        user: UserId,
        new: &NewProduct,
    ) -> Result<(Product, SubscribeOutcome), TrackerError>;

    /// Removes the link between `user` and `product`, deleting the product
    /// in the same transaction when no subscription remains.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn unsubscribe(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<UnsubscribeOutcome, TrackerError>;

    /// Records a new price and check time. Subscriptions are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::ProductNotFound`] if the product no longer
    /// exists, or [`TrackerError::StoreError`] on storage failure.
    async fn update_price(
        &self,
        product: ProductId,
        price: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<(), TrackerError>;

    /// Records a check that found no price change.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::ProductNotFound`] if the product no longer
    /// exists, or [`TrackerError::StoreError`] on storage failure.
    async fn mark_checked(
        &self,
        product: ProductId,
        checked_at: DateTime<Utc>,
    ) -> Result<(), TrackerError>;

    /// All tracked products, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn list_products(&self) -> Result<Vec<Product>, TrackerError>;

    /// Products tracked by `user`, in subscription order.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn list_subscriptions(&self, user: UserId) -> Result<Vec<Product>, TrackerError>;

    /// Users tracking `product`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn list_subscribers(&self, product: ProductId) -> Result<Vec<User>, TrackerError>;

    /// Number of known users.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn count_users(&self) -> Result<u64, TrackerError>;

    /// Number of tracked products.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] on storage failure.
    async fn count_products(&self) -> Result<u64, TrackerError>;
}
