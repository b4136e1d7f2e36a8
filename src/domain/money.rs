use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Currency codes the ledger accepts for new accounts and queries.
pub const KNOWN_CURRENCIES: &[&str] = &["USD", "EUR", "RUB"];

/// Represents a bare monetary magnitude.
///
/// This is a wrapper around `rust_decimal::Decimal`, so values never pass through binary
/// floating point. No currency is attached; pairing a `Money` with a [`Currency`] is the
/// caller's job.
///
/// Arithmetic is checked only: there are no `+`/`-` operators, so no operation on
/// `Money` can panic on overflow.
///
/// Deserializes from a JSON string or a JSON number. Numbers are read from their source
/// text, so `12345678901234567.89` keeps every digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(transparent)]
pub struct Money(
    #[serde(deserialize_with = "rust_decimal::serde::arbitrary_precision::deserialize")] Decimal,
);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Adds `rhs`, returning `None` if the result leaves the representable range.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Subtracts `rhs`, returning `None` if the result leaves the representable range.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Self)
    }
}

/// Canonical form: trailing fractional zeros are dropped, so `30.00` prints as `30`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A currency code, normalized to upper case when constructed.
///
/// Whether the code is supported is a separate question answered by
/// [`Currency::is_known`], so unknown codes can still be carried around and rejected with
/// a precise error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        KNOWN_CURRENCIES.contains(&self.0.as_str())
    }
}

impl From<String> for Currency {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for Currency {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
