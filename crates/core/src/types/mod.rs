//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod checkout;
pub mod id;
pub mod price;
pub mod product;
pub mod wishlist;

pub use cart::{
    Cart, CartLine, EnrichedCart, EnrichedCartLine, LineKey, combine_quantities,
};
pub use checkout::{CheckoutIntentRequest, CheckoutIntentResult, CheckoutLine, CheckoutStatus};
pub use id::*;
pub use price::{DiscountPercent, Price, PriceError};
pub use product::Product;
pub use wishlist::Wishlist;
