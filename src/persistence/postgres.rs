//! PostgreSQL implementation of the tracking store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::TrackingStore;
use super::models::{NewProduct, SubscribeOutcome, UnsubscribeOutcome};
use crate::config::TrackerConfig;
use crate::domain::{Product, ProductId, User, UserId};
use crate::error::TrackerError;

const USER_COLUMNS: &str = "id, external_id, display_name, created_at";
const PRODUCT_COLUMNS: &str =
    "id, canonical_id, retailer, source_url, display_name, last_known_price, last_checked, created_at";

type UserRow = (Uuid, String, Option<String>, DateTime<Utc>);
type ProductRow = (
    Uuid,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

fn user_from_row((id, external_id, display_name, created_at): UserRow) -> User {
    User {
        id: UserId::from_uuid(id),
        external_id,
        display_name,
        created_at,
    }
}

fn product_from_row(
    (id, canonical_id, retailer, source_url, display_name, last_known_price, last_checked, created_at): ProductRow,
) -> Product {
    Product {
        id: ProductId::from_uuid(id),
        canonical_id,
        retailer,
        source_url,
        display_name,
        last_known_price,
        last_checked,
        created_at,
    }
}

fn store_err(err: sqlx::Error) -> TrackerError {
    TrackerError::StoreError(err.to_string())
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or_default()
}

async fn upsert_product<'e, E>(executor: E, new: &NewProduct) -> Result<Product, TrackerError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products (id, canonical_id, retailer, source_url, display_name, last_known_price) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (canonical_id) DO UPDATE SET \
           last_known_price = COALESCE(EXCLUDED.last_known_price, products.last_known_price), \
           display_name = COALESCE(EXCLUDED.display_name, products.display_name) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&new.canonical_id)
    .bind(&new.retailer)
    .bind(&new.source_url)
    .bind(new.display_name.as_deref())
    .bind(new.price.as_deref())
    .fetch_one(executor)
    .await
    .map_err(store_err)?;

    Ok(product_from_row(row))
}

async fn insert_subscription<'e, E>(
    executor: E,
    user: UserId,
    product: ProductId,
) -> Result<SubscribeOutcome, TrackerError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, product_id) VALUES ($1, $2) \
         ON CONFLICT (user_id, product_id) DO NOTHING",
    )
    .bind(*user.as_uuid())
    .bind(*product.as_uuid())
    .execute(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return if db.constraint() == Some("subscriptions_user_id_fkey") {
                    TrackerError::UserNotFound(user.to_string())
                } else {
                    TrackerError::ProductNotFound(product.to_string())
                };
            }
        }
        store_err(e)
    })?;

    Ok(if result.rows_affected() == 0 {
        SubscribeOutcome::AlreadySubscribed
    } else {
        SubscribeOutcome::Subscribed
    })
}

/// PostgreSQL-backed tracking store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the database settings in `config` and applies the
    /// embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::StoreError`] if the connection or a migration
    /// fails.
    pub async fn connect(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(store_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| TrackerError::StoreError(format!("migration failed: {e}")))?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres"
        );
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl TrackingStore for PostgresStore {
    async fn get_or_create_user(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, TrackerError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, external_id, display_name) VALUES ($1, $2, $3) \
             ON CONFLICT (external_id) DO UPDATE \
             SET display_name = COALESCE(EXCLUDED.display_name, users.display_name) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(external_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(user_from_row(row))
    }

    async fn find_user(&self, external_id: &str) -> Result<Option<User>, TrackerError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(user_from_row))
    }

    async fn get_or_create_product(&self, new: &NewProduct) -> Result<Product, TrackerError> {
        upsert_product(&self.pool, new).await
    }

    async fn find_product(&self, canonical_id: &str) -> Result<Option<Product>, TrackerError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE canonical_id = $1"
        ))
        .bind(canonical_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(product_from_row))
    }

    async fn subscribe(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<SubscribeOutcome, TrackerError> {
        insert_subscription(&self.pool, user, product).await
    }

    async fn track_product(
        &self,
        user: UserId,
        new: &NewProduct,
    ) -> Result<(Product, SubscribeOutcome), TrackerError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        // The upsert row-locks the product, so a concurrent unsubscribe
        // cannot delete it before the subscription lands.
        let product = upsert_product(&mut *tx, new).await?;
        let outcome = insert_subscription(&mut *tx, user, product.id).await?;
        tx.commit().await.map_err(store_err)?;
        Ok((product, outcome))
    }

    async fn unsubscribe(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<UnsubscribeOutcome, TrackerError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let removed = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND product_id = $2")
            .bind(*user.as_uuid())
            .bind(*product.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(store_err)?
            .rows_affected();
        if removed == 0 {
            tx.rollback().await.map_err(store_err)?;
            return Ok(UnsubscribeOutcome::NotSubscribed);
        }

        // Row lock blocks concurrent subscribers until this transaction ends.
        sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(*product.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_err)?;

        let remaining = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM subscriptions WHERE product_id = $1",
        )
        .bind(*product.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        let product_deleted = remaining == 0;
        if product_deleted {
            sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(*product.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(UnsubscribeOutcome::Unsubscribed { product_deleted })
    }

    async fn update_price(
        &self,
        product: ProductId,
        price: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let updated = sqlx::query(
            "UPDATE products SET last_known_price = $2, last_checked = $3 WHERE id = $1",
        )
        .bind(*product.as_uuid())
        .bind(price)
        .bind(checked_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?
        .rows_affected();

        if updated == 0 {
            return Err(TrackerError::ProductNotFound(product.to_string()));
        }
        Ok(())
    }

    async fn mark_checked(
        &self,
        product: ProductId,
        checked_at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let updated = sqlx::query("UPDATE products SET last_checked = $2 WHERE id = $1")
            .bind(*product.as_uuid())
            .bind(checked_at)
            .execute(&self.pool)
            .await
            .map_err(store_err)?
            .rows_affected();

        if updated == 0 {
            return Err(TrackerError::ProductNotFound(product.to_string()));
        }
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, TrackerError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(product_from_row).collect())
    }

    async fn list_subscriptions(&self, user: UserId) -> Result<Vec<Product>, TrackerError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT p.id, p.canonical_id, p.retailer, p.source_url, p.display_name, \
                    p.last_known_price, p.last_checked, p.created_at \
             FROM subscriptions s JOIN products p ON p.id = s.product_id \
             WHERE s.user_id = $1 ORDER BY s.created_at ASC",
        )
        .bind(*user.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(product_from_row).collect())
    }

    async fn list_subscribers(&self, product: ProductId) -> Result<Vec<User>, TrackerError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.external_id, u.display_name, u.created_at \
             FROM subscriptions s JOIN users u ON u.id = s.user_id \
             WHERE s.product_id = $1 ORDER BY s.created_at ASC",
        )
        .bind(*product.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(user_from_row).collect())
    }

    async fn count_users(&self) -> Result<u64, TrackerError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count(n))
    }

    async fn count_products(&self) -> Result<u64, TrackerError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count(n))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    /// Connects to `TEST_DATABASE_URL`, or returns `None` to skip.
    async fn test_store() -> Option<PostgresStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let config = TrackerConfig {
            database_url: url,
            database_max_connections: 2,
            database_min_connections: 1,
            ..TrackerConfig::default()
        };
        let Ok(store) = PostgresStore::connect(&config).await else {
            panic!("TEST_DATABASE_URL is set but unreachable");
        };
        Some(store)
    }

    fn new_product(canonical_id: &str, price: &str) -> NewProduct {
        NewProduct {
            canonical_id: canonical_id.to_string(),
            retailer: "amazon".to_string(),
            source_url: format!("https://www.amazon.in/dp/{canonical_id}"),
            display_name: None,
            price: Some(price.to_string()),
        }
    }

    #[tokio::test]
    async fn subscription_lifecycle_against_postgres() {
        let Some(store) = test_store().await else {
            return;
        };
        let canonical = format!("T{}", Uuid::new_v4().simple());
        let external_a = Uuid::new_v4().to_string();
        let external_b = Uuid::new_v4().to_string();

        let Ok(a) = store.get_or_create_user(&external_a, Some("A")).await else {
            panic!("user a");
        };
        let Ok(b) = store.get_or_create_user(&external_b, None).await else {
            panic!("user b");
        };
        let Ok(p1) = store.get_or_create_product(&new_product(&canonical, "₹1,499")).await else {
            panic!("product");
        };
        let Ok(p2) = store.get_or_create_product(&new_product(&canonical, "₹1,299")).await else {
            panic!("product again");
        };
        assert_eq!(p1.id, p2.id);
        assert_eq!(p2.last_known_price.as_deref(), Some("₹1,299"));

        assert!(matches!(store.subscribe(a.id, p1.id).await, Ok(SubscribeOutcome::Subscribed)));
        assert!(matches!(
            store.subscribe(a.id, p1.id).await,
            Ok(SubscribeOutcome::AlreadySubscribed)
        ));
        assert!(matches!(store.subscribe(b.id, p1.id).await, Ok(SubscribeOutcome::Subscribed)));

        assert!(matches!(
            store.unsubscribe(a.id, p1.id).await,
            Ok(UnsubscribeOutcome::Unsubscribed { product_deleted: false })
        ));
        assert!(matches!(
            store.unsubscribe(b.id, p1.id).await,
            Ok(UnsubscribeOutcome::Unsubscribed { product_deleted: true })
        ));
        assert!(matches!(store.find_product(&canonical).await, Ok(None)));
        assert!(matches!(
            store.subscribe(a.id, p1.id).await,
            Err(TrackerError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn track_product_rolls_back_for_unknown_user() {
        let Some(store) = test_store().await else {
            return;
        };
        let canonical = format!("T{}", Uuid::new_v4().simple());

        let result = store
            .track_product(UserId::new(), &new_product(&canonical, "₹999"))
            .await;
        assert!(matches!(result, Err(TrackerError::UserNotFound(_))));
        assert!(matches!(store.find_product(&canonical).await, Ok(None)));

        let Ok(user) = store.get_or_create_user(&Uuid::new_v4().to_string(), None).await else {
            panic!("user");
        };
        let Ok((product, outcome)) = store
            .track_product(user.id, &new_product(&canonical, "₹999"))
            .await
        else {
            panic!("tracked");
        };
        assert_eq!(outcome, SubscribeOutcome::Subscribed);
        let Ok(subscribers) = store.list_subscribers(product.id).await else {
            panic!("subscribers");
        };
        assert_eq!(subscribers.len(), 1);
    }
}
