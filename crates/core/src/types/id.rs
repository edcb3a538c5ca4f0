//! Typed primary keys.
//!
//! Every table uses a `SERIAL` key. Wrapping each one in its own type keeps a
//! `ProductId` from being passed where an `OrderId` is expected.

/// Declare an `i32`-backed id newtype.
///
/// The type serializes as a bare number and, with the `postgres` feature,
/// binds and decodes as `INTEGER`.
///
/// ```rust
/// # use ecom_core::{OrderId, ProductId};
/// let product = ProductId::new(3);
/// assert_eq!(product.to_string(), "3");
/// // let _: OrderId = product; // does not compile
/// ```
macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {$(
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    )+};
}

define_id!(
    UserId,
    CategoryId,
    /// Ordered so checkout can lock product rows in a stable order.
    ProductId,
    CartId,
    CartItemId,
    OrderId,
    OrderItemId,
    PaymentId,
    PartnerId,
    CouponId,
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrips_through_i32() {
        let id = ProductId::new(42);
        assert_eq!(id.as_i32(), 42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(ProductId::from(42), id);
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&OrderId::new(7)).unwrap();
        assert_eq!(json, "7");

        let parsed: OrderId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, OrderId::new(7));
    }

    #[test]
    fn test_ids_sort_numerically() {
        let mut ids = vec![ProductId::new(10), ProductId::new(2), ProductId::new(7)];
        ids.sort();
        assert_eq!(ids, [ProductId::new(2), ProductId::new(7), ProductId::new(10)]);
    }
}
