//! # Currency Types
//!
//! Supported currency codes and conversion to provider minor units.
//! Wallet balances are `rust_decimal::Decimal`; providers (Stripe) take
//! amounts in the smallest currency unit.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TopupError;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
}

impl Currency {
    /// Returns the lowercase ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, the rest have 2)
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert a decimal amount to the smallest currency unit (cents, etc.)
    ///
    /// Fails if the amount carries more precision than the currency allows,
    /// so a caller can never silently lose sub-unit value at the provider
    /// boundary.
    pub fn to_minor_units(&self, amount: Decimal) -> Result<i64, TopupError> {
        let scaled = amount * Decimal::from(10_i64.pow(self.decimal_places()));
        if scaled.fract() != Decimal::ZERO {
            return Err(TopupError::InvalidRequest(format!(
                "amount {} has sub-{} precision",
                amount,
                self.as_str()
            )));
        }
        scaled.to_i64().ok_or_else(|| {
            TopupError::InvalidRequest(format!("amount {} out of range", amount))
        })
    }

    /// Convert from smallest unit back to a decimal amount
    pub fn from_minor_units(&self, amount: i64) -> Decimal {
        Decimal::new(amount, self.decimal_places())
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = TopupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            "jpy" => Ok(Currency::JPY),
            "cad" => Ok(Currency::CAD),
            "aud" => Ok(Currency::AUD),
            other => Err(TopupError::UnsupportedCurrency {
                currency: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_unit_conversion() {
        let usd = Currency::USD;
        assert_eq!(usd.to_minor_units(dec!(10.99)).unwrap(), 1099);
        assert_eq!(usd.from_minor_units(1099), dec!(10.99));

        let jpy = Currency::JPY;
        assert_eq!(jpy.to_minor_units(dec!(1000)).unwrap(), 1000);
        assert_eq!(jpy.from_minor_units(1000), dec!(1000));
    }

    #[test]
    fn test_sub_unit_precision_rejected() {
        assert!(Currency::USD.to_minor_units(dec!(10.999)).is_err());
        assert!(Currency::JPY.to_minor_units(dec!(10.5)).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert_eq!("EUR".parse::<Currency>().unwrap(), Currency::EUR);
        assert!(matches!(
            "xyz".parse::<Currency>(),
            Err(TopupError::UnsupportedCurrency { .. })
        ));
    }
}
