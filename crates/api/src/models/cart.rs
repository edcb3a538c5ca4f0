//! Shopping carts.

use rust_decimal::Decimal;
use serde::Serialize;

use ecom_core::{CartId, CartItemId, ProductId, UserId};

use super::product::Product;

/// One cart line with the product it refers to.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub product: Product,
}

impl CartItemView {
    /// Line total at the product's current effective price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.effective_price() * Decimal::from(self.quantity)
    }
}

/// A user's cart with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItemView>,
}

impl CartView {
    /// Sum of all line totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItemView::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::sample_product;

    #[test]
    fn test_cart_total_uses_effective_prices() {
        let cart = CartView {
            id: CartId::new(1),
            user_id: UserId::new(1),
            items: vec![
                CartItemView {
                    id: CartItemId::new(1),
                    product_id: ProductId::new(1),
                    quantity: 2,
                    product: sample_product(1, 100_000, Some(80_000), 10),
                },
                CartItemView {
                    id: CartItemId::new(2),
                    product_id: ProductId::new(2),
                    quantity: 3,
                    product: sample_product(2, 50_000, None, 10),
                },
            ],
        };

        assert_eq!(cart.total(), Decimal::from(310_000));
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let cart = CartView {
            id: CartId::new(1),
            user_id: UserId::new(1),
            items: Vec::new(),
        };
        assert_eq!(cart.total(), Decimal::ZERO);
    }
}
