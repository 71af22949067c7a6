//! HTTP layer: one module per resource, each exposing a `routes()`
//! router that the top-level router nests.

pub mod auth;
pub mod cart;
pub mod categories;
pub mod common;
pub mod discounts;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod ratings;
pub mod users;
