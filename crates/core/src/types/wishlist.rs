//! Device-held wishlist.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// An ordered, de-duplicated list of saved products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ProductId>", into = "Vec<ProductId>")]
pub struct Wishlist {
    items: Vec<ProductId>,
}

impl Wishlist {
    /// Saved product IDs in the order they were added.
    #[must_use]
    pub fn items(&self) -> &[ProductId] {
        &self.items
    }

    /// Whether the product is saved.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.items.contains(id)
    }

    /// Add the product if absent, remove it if present.
    ///
    /// Returns `true` if the product is saved after the call.
    pub fn toggle(&mut self, id: ProductId) -> bool {
        if let Some(position) = self.items.iter().position(|item| *item == id) {
            self.items.remove(position);
            false
        } else {
            self.items.push(id);
            true
        }
    }
}

impl From<Vec<ProductId>> for Wishlist {
    fn from(ids: Vec<ProductId>) -> Self {
        let mut items: Vec<ProductId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !items.contains(&id) {
                items.push(id);
            }
        }
        Self { items }
    }
}

impl From<Wishlist> for Vec<ProductId> {
    fn from(wishlist: Wishlist) -> Self {
        wishlist.items
    }
}
