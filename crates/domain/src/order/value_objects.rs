//! Value objects for the order domain.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::OrderError;

/// Identifier of the customer placing an order, owned by the customer context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerId(String);

impl CustomerId {
    /// Accepts any non-blank identifier, trimmed.
    pub fn new(id: impl Into<String>) -> Result<Self, OrderError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(OrderError::CustomerIdRequired);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CustomerId {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CustomerId> for String {
    fn from(id: CustomerId) -> Self {
        id.0
    }
}

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern is valid")
});

/// A syntactically valid email address, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, OrderError> {
        let candidate = raw.as_ref().trim();
        if !EMAIL_PATTERN.is_match(candidate) {
            return Err(OrderError::InvalidEmail(raw.as_ref().to_string()));
        }
        Ok(Self(candidate.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// Errors from money arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Amount cannot be negative: {0}")]
    Negative(Decimal),

    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("Percentage must be between 0 and 1, got {0}")]
    InvalidPercentage(Decimal),

    #[error("Amount has more than {max} decimal places: {0}", max = Money::MAX_SCALE)]
    TooPrecise(Decimal),

    #[error("Amount is too large to represent")]
    Overflow,
}

/// A non-negative amount in a single currency.
///
/// Arithmetic across currencies is refused rather than converted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MoneyRepr")]
pub struct Money {
    amount: Decimal,
    currency: String,
}

#[derive(Deserialize)]
struct MoneyRepr {
    amount: Decimal,
    currency: String,
}

impl TryFrom<MoneyRepr> for Money {
    type Error = MoneyError;

    fn try_from(repr: MoneyRepr) -> Result<Self, Self::Error> {
        Money::new(repr.amount, &repr.currency)
    }
}

impl Money {
    /// Decimal places an amount may carry.
    pub const MAX_SCALE: u32 = 4;

    /// Creates an amount; the currency is an ISO-4217 style three letter code.
    pub fn new(amount: Decimal, currency: &str) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.normalize().scale() > Self::MAX_SCALE {
            return Err(MoneyError::TooPrecise(amount));
        }
        let currency = currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(currency));
        }
        Ok(Self { amount, currency })
    }

    pub fn usd(amount: Decimal) -> Result<Self, MoneyError> {
        Self::new(amount, "USD")
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// The largest representable amount in this currency.
    pub(crate) fn saturated(&self) -> Money {
        Money {
            amount: Decimal::MAX,
            currency: self.currency.clone(),
        }
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Money {
            amount,
            currency: self.currency.clone(),
        })
    }

    pub fn multiply(&self, quantity: u32) -> Result<Money, MoneyError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Money {
            amount,
            currency: self.currency.clone(),
        })
    }

    /// Returns `amount × (1 − percentage)`, rounded to cents.
    pub fn discount(&self, percentage: Decimal) -> Result<Money, MoneyError> {
        if percentage < Decimal::ZERO || percentage > Decimal::ONE {
            return Err(MoneyError::InvalidPercentage(percentage));
        }
        let discounted = (self.amount * (Decimal::ONE - percentage))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Ok(Money {
            amount: discounted,
            currency: self.currency.clone(),
        })
    }

    /// Orders two amounts of the same currency.
    pub fn try_cmp(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

/// A line of an order. Owned by the order, no identity of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    product_id: ProductId,
    product_name: String,
    quantity: u32,
    unit_price: Money,
}

impl OrderItem {
    /// Largest quantity a single line may carry.
    pub const MAX_QUANTITY: u32 = i32::MAX as u32;

    /// Creates an item; the quantity must be between one and [`Self::MAX_QUANTITY`].
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        let product_id = product_id.into();
        if product_id.is_blank() {
            return Err(OrderError::ProductIdRequired);
        }
        if quantity == 0 || quantity > Self::MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity {
                product_id: product_id.to_string(),
            });
        }
        Ok(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
        })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> &Money {
        &self.unit_price
    }

    /// `unit_price × quantity`.
    pub fn subtotal(&self) -> Result<Money, MoneyError> {
        self.unit_price.multiply(self.quantity)
    }
}
