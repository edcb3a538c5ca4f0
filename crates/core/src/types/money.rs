//! Decimal money amounts and currency rounding.
//!
//! All amounts are `rust_decimal::Decimal` in the currency's standard unit
//! (dong, dollars). Floating point never touches a price.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::text_enum::text_enum;

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    /// Vietnamese dong. No minor unit.
    #[default]
    VND,
    USD,
    EUR,
}

text_enum!(CurrencyCode, "currency code" {
    VND => "VND",
    USD => "USD",
    EUR => "EUR",
});

impl CurrencyCode {
    /// Number of decimal places in the currency's minor unit.
    #[must_use]
    pub const fn minor_unit_digits(self) -> u32 {
        match self {
            Self::VND => 0,
            Self::USD | Self::EUR => 2,
        }
    }

    /// Round an amount to the currency's minor unit, half away from zero.
    #[must_use]
    pub fn round(self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(
            self.minor_unit_digits(),
            RoundingStrategy::MidpointAwayFromZero,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_vnd_rounds_to_whole_dong() {
        assert_eq!(CurrencyCode::VND.round(dec("24999.5")), dec("25000"));
        assert_eq!(CurrencyCode::VND.round(dec("24999.4")), dec("24999"));
    }

    #[test]
    fn test_usd_rounds_to_cents() {
        assert_eq!(CurrencyCode::USD.round(dec("99.999")), dec("100.00"));
        assert_eq!(CurrencyCode::USD.round(dec("0.125")), dec("0.13"));
    }

    #[test]
    fn test_currency_code_text_form() {
        assert_eq!(CurrencyCode::VND.to_string(), "VND");
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("vnd".parse::<CurrencyCode>().is_err());
    }
}
