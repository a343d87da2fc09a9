//! Device-scoped cart and wishlist storage.
//!
//! [`DeviceStorage`] is a small key-value seam over whatever the shopper's
//! device keeps: the server binds it to the tower-sessions session, tests use
//! [`MemoryStorage`]. Values are JSON; anything that fails to parse reads as
//! empty.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

use cartwheel_core::{Cart, CartLine, ProductId, Wishlist};

use crate::models::session_keys;

/// Errors raised by a device storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A value could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value storage scoped to one device.
#[async_trait]
pub trait DeviceStorage: Send + Sync {
    /// Load the value stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` under `key`, replacing what was there.
    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key`.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Stable identifier of the device, if it has been assigned one yet.
    ///
    /// Concurrent requests from one device see separate copies of its data;
    /// this id is what ties them together.
    fn device_id(&self) -> Option<String>;
}

/// Device storage backed by the shopper's tower-sessions session.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    session: Session,
}

impl SessionStorage {
    /// Wrap a request's session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DeviceStorage for SessionStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.session.get::<Value>(key).await?)
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError> {
        Ok(self.session.insert(key, value).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.session.remove::<Value>(key).await?;
        Ok(())
    }

    fn device_id(&self) -> Option<String> {
        self.session.id().map(|id| id.to_string())
    }
}

/// In-memory device storage.
#[derive(Debug)]
pub struct MemoryStorage {
    device_id: String,
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Create an empty store for a new device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            values: Mutex::new(HashMap::new()),
        }
    }

    /// A separate copy of this device's data, as a second concurrent request
    /// would see it.
    pub async fn copy(&self) -> Self {
        Self {
            device_id: self.device_id.clone(),
            values: Mutex::new(self.values.lock().await.clone()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStorage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    fn device_id(&self) -> Option<String> {
        Some(self.device_id.clone())
    }
}

// =============================================================================
// Guest cart
// =============================================================================

/// The guest cart held on the shopper's device.
///
/// Writes are last-writer-wins; merging belongs to the caller.
#[async_trait]
pub trait LocalCartStore: Send + Sync {
    /// Read the cart. Missing or corrupt storage reads as an empty cart.
    async fn read(&self) -> Cart;

    /// Replace the stored cart.
    async fn write(&self, cart: &Cart) -> Result<(), StorageError>;

    /// Remove the stored cart.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// [`LocalCartStore`] over a [`DeviceStorage`] backend.
#[derive(Clone, Copy)]
pub struct DeviceCartStore<'a> {
    storage: &'a dyn DeviceStorage,
}

impl<'a> DeviceCartStore<'a> {
    /// Bind the guest cart to `storage`.
    #[must_use]
    pub const fn new(storage: &'a dyn DeviceStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl LocalCartStore for DeviceCartStore<'_> {
    async fn read(&self) -> Cart {
        match self.storage.load(session_keys::GUEST_CART).await {
            Ok(Some(value)) => parse_cart(value),
            Ok(None) => Cart::new(),
            Err(err) => {
                warn!(error = %err, "Failed to load guest cart, treating as empty");
                Cart::new()
            }
        }
    }

    async fn write(&self, cart: &Cart) -> Result<(), StorageError> {
        self.storage
            .save(session_keys::GUEST_CART, serde_json::to_value(cart)?)
            .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(session_keys::GUEST_CART).await
    }
}

/// Parse a stored cart, skipping entries that are not valid lines.
fn parse_cart(value: Value) -> Cart {
    let Value::Array(entries) = value else {
        warn!("Stored guest cart is not a list, treating as empty");
        return Cart::new();
    };

    let total = entries.len();
    let lines: Vec<CartLine> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if lines.len() < total {
        warn!(
            skipped = total - lines.len(),
            "Skipped corrupt guest cart entries"
        );
    }

    Cart::from_lines(lines)
}

// =============================================================================
// Wishlist
// =============================================================================

/// The wishlist held on the shopper's device.
#[derive(Clone, Copy)]
pub struct WishlistStore<'a> {
    storage: &'a dyn DeviceStorage,
}

impl<'a> WishlistStore<'a> {
    /// Bind the wishlist to `storage`.
    #[must_use]
    pub const fn new(storage: &'a dyn DeviceStorage) -> Self {
        Self { storage }
    }

    /// Read the wishlist. Missing or corrupt storage reads as empty.
    pub async fn read(&self) -> Wishlist {
        match self.storage.load(session_keys::WISHLIST).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(error = %err, "Stored wishlist is corrupt, treating as empty");
                Wishlist::default()
            }),
            Ok(None) => Wishlist::default(),
            Err(err) => {
                warn!(error = %err, "Failed to load wishlist, treating as empty");
                Wishlist::default()
            }
        }
    }

    /// Replace the stored wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot store the value.
    pub async fn write(&self, wishlist: &Wishlist) -> Result<(), StorageError> {
        self.storage
            .save(session_keys::WISHLIST, serde_json::to_value(wishlist)?)
            .await
    }

    /// Add or remove a product and store the result.
    ///
    /// Returns the updated wishlist and whether the product is now saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot store the value.
    pub async fn toggle(&self, id: ProductId) -> Result<(Wishlist, bool), StorageError> {
        let mut wishlist = self.read().await;
        let saved = wishlist.toggle(id);
        self.write(&wishlist).await?;
        Ok((wishlist, saved))
    }
}
