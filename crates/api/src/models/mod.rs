//! Domain models for the API.
//!
//! Row types derive `sqlx::FromRow` and `Serialize` directly: the JSON shape
//! returned to clients is the stored shape, minus secrets marked
//! `#[serde(skip_serializing)]`. Composite views (order with items, cart with
//! products) are assembled in the `db` layer.

pub mod cart;
pub mod category;
pub mod coupon;
pub mod order;
pub mod partner;
pub mod payment;
pub mod product;
pub mod user;

pub use cart::{CartItemView, CartView};
pub use category::{Category, CategoryNode, CategoryRef};
pub use coupon::Coupon;
pub use order::{Order, OrderDetail, OrderItem, OrderWithItems, ShippingAddress};
pub use partner::Partner;
pub use payment::Payment;
pub use product::{Product, ProductView};
pub use user::{AuthUser, User};
