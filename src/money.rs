//! A validated monetary amount with fixed-point decimal semantics.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// The maximum number of integer digits an amount may have.
pub const MAX_INTEGER_DIGITS: usize = 12;

/// The number of decimal places an amount is stored with.
pub const AMOUNT_SCALE: u32 = 2;

/// A positive monetary amount with at most twelve integer digits, stored at
/// scale two.
///
/// Amounts use decimal arithmetic throughout, never floating point, so sums
/// and balances are exact. In the database and in CSV/JSON they are
/// represented as plain (non-scientific) decimal text such as `1500.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Create an amount from a decimal value.
    ///
    /// Values with fewer than two decimal places are rescaled to two.
    ///
    /// # Errors
    /// Returns [Error::InvalidAmount] if `value` is zero or negative, has
    /// more than two decimal places, or has more than
    /// [MAX_INTEGER_DIGITS] integer digits.
    pub fn new(value: Decimal) -> Result<Self, Error> {
        if value <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!("{value} is not positive")));
        }

        if value.scale() > AMOUNT_SCALE {
            return Err(Error::InvalidAmount(format!(
                "{value} has more than {AMOUNT_SCALE} decimal places"
            )));
        }

        if value.trunc().to_string().len() > MAX_INTEGER_DIGITS {
            return Err(Error::InvalidAmount(format!(
                "{value} has more than {MAX_INTEGER_DIGITS} integer digits"
            )));
        }

        let mut value = value;
        value.rescale(AMOUNT_SCALE);

        Ok(Self(value))
    }

    /// The underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(text).map_err(|error| {
            Error::InvalidAmount(format!("could not parse \"{text}\" as a decimal: {error}"))
        })?;

        Self::new(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        let decimal =
            Decimal::from_str(text).map_err(|error| FromSqlError::Other(Box::new(error)))?;

        Ok(Self(decimal))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod amount_tests {
    use rust_decimal::Decimal;

    use crate::{Error, money::Amount};

    #[test]
    fn new_rescales_to_two_decimal_places() {
        let amount = Amount::new(Decimal::new(15, 0)).expect("Could not create amount");

        assert_eq!(amount.to_string(), "15.00");
    }

    #[test]
    fn new_fails_on_zero() {
        let result = Amount::new(Decimal::ZERO);

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn new_fails_on_negative_value() {
        let result = Amount::new(Decimal::new(-100, 2));

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn new_fails_on_three_decimal_places() {
        let result = Amount::new(Decimal::new(12345, 3));

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn new_fails_on_thirteen_integer_digits() {
        let result = "1234567890123.00".parse::<Amount>();

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn twelve_integer_digits_are_accepted() {
        let amount = "123456789012.99"
            .parse::<Amount>()
            .expect("Could not parse amount");

        assert_eq!(amount.to_string(), "123456789012.99");
    }

    #[test]
    fn from_str_fails_on_non_numeric_text() {
        let result = "12.3a".parse::<Amount>();

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn display_is_plain_decimal_text() {
        let amount = "1500.00".parse::<Amount>().expect("Could not parse amount");

        assert_eq!(amount.to_string(), "1500.00");
    }
}
