//! Back-office API. Every handler requires an admin bearer token.

pub mod categories;
pub mod coupons;
pub mod orders;
pub mod partners;
pub mod products;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/admin` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/orders", orders::router())
        .nest("/partners", partners::router())
        .nest("/coupons", coupons::router())
}
