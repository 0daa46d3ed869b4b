//! Token and cost value objects.
//!
//! The engine tracks usage in wide integer types and converts to the wire
//! protocol's `i32`/`f32` only at the boundary, saturating rather than
//! wrapping.

use std::fmt;
use std::ops::{Add, AddAssign};

/// A count of tokens (sent, received, cached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a new TokenCount.
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// Creates a zero TokenCount.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw count.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the count clamped into `i32` range for the wire format.
    pub fn as_i32(&self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Add for TokenCount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl AddAssign for TokenCount {
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl From<u64> for TokenCount {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for TokenCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monetary amount in USD.
///
/// Stored as microdollars (millionths of a dollar) so repeated
/// accumulation stays exact; converted to a float only for display and
/// the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    /// Amount in microdollars (1 USD = 1,000,000 microdollars)
    microdollars: i64,
}

impl Money {
    const MICRODOLLARS_PER_DOLLAR: i64 = 1_000_000;

    /// Creates Money from a USD dollar amount.
    pub fn from_usd(dollars: f64) -> Self {
        let microdollars = (dollars * Self::MICRODOLLARS_PER_DOLLAR as f64).round() as i64;
        Self { microdollars }
    }

    /// Creates Money from microdollars.
    pub const fn from_microdollars(microdollars: i64) -> Self {
        Self { microdollars }
    }

    /// Creates a zero Money value.
    pub const fn zero() -> Self {
        Self { microdollars: 0 }
    }

    /// Returns the amount in USD as a float.
    pub fn as_usd(&self) -> f64 {
        self.microdollars as f64 / Self::MICRODOLLARS_PER_DOLLAR as f64
    }

    /// Returns the amount as the wire format's `f32`.
    pub fn as_f32(&self) -> f32 {
        self.as_usd() as f32
    }

    /// Returns true if the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.microdollars == 0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            microdollars: self.microdollars.saturating_add(other.microdollars),
        }
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.microdollars = self.microdollars.saturating_add(other.microdollars);
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4}", self.as_usd())
    }
}

/// A point-in-time view of the engine's usage counters.
///
/// Token counts and `message_cost` describe the most recent chat turn;
/// `session_cost` accumulates over the whole session. Read after a chat
/// turn finishes to populate the terminal response frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UsageSnapshot {
    pub tokens_sent: TokenCount,
    pub tokens_received: TokenCount,
    pub message_cost: Money,
    pub session_cost: Money,
}

impl UsageSnapshot {
    /// A snapshot with all counters at zero.
    pub fn zero() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_count_saturates_into_i32() {
        assert_eq!(TokenCount::new(123).as_i32(), 123);
        assert_eq!(TokenCount::new(u64::MAX).as_i32(), i32::MAX);
    }

    #[test]
    fn token_count_accumulates() {
        let mut total = TokenCount::zero();
        total += TokenCount::new(10);
        total += TokenCount::new(5);
        assert_eq!(total.as_u64(), 15);
    }

    #[test]
    fn money_roundtrips_through_usd() {
        let cost = Money::from_usd(0.0375);
        assert_eq!(cost.as_usd(), 0.0375);
        assert!(!cost.is_zero());
    }

    #[test]
    fn money_accumulation_is_exact() {
        // 0.1 + 0.2 style drift must not appear in session totals.
        let mut session = Money::zero();
        for _ in 0..10 {
            session += Money::from_usd(0.1);
        }
        assert_eq!(session, Money::from_usd(1.0));
    }

    #[test]
    fn zero_snapshot_has_zero_fields() {
        let snapshot = UsageSnapshot::zero();
        assert_eq!(snapshot.tokens_sent.as_i32(), 0);
        assert_eq!(snapshot.tokens_received.as_i32(), 0);
        assert!(snapshot.message_cost.is_zero());
        assert!(snapshot.session_cost.is_zero());
    }
}
