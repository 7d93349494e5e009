//! Fixed-point money and percentage rate types.
//!
//! # Responsibility
//! - Represent currency amounts as integer cents.
//! - Represent tax/discount rates as basis points.
//! - Parse and format the decimal text used by callers and the settings table.
//!
//! # Invariants
//! - Arithmetic is checked; overflow surfaces as `None`, never wraps.
//! - Rates are within `0..=10000` basis points (0% to 100%).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const CENTS_PER_UNIT: i64 = 100;
const BPS_PER_PERCENT: u32 = 100;
/// 100% expressed in basis points.
pub const MAX_RATE_BPS: u32 = 10_000;

/// Error returned when decimal text cannot be parsed into [`Money`] or [`Rate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    Empty,
    Invalid(String),
    TooManyFractionDigits(String),
    OutOfRange(String),
}

impl Display for MoneyParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "amount must not be empty"),
            Self::Invalid(value) => write!(f, "invalid decimal value `{value}`"),
            Self::TooManyFractionDigits(value) => {
                write!(f, "`{value}` has more than two fraction digits")
            }
            Self::OutOfRange(value) => write!(f, "`{value}` is out of range"),
        }
    }
}

impl Error for MoneyParseError {}

/// Currency amount in cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / CENTS_PER_UNIT as u64;
        let cents = abs % CENTS_PER_UNIT as u64;
        write!(f, "{sign}{units}.{cents:02}")
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_hundredths(value).map(Money)
    }
}

/// Percentage rate in basis points (`1200` = 12%).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct Rate(u32);

impl Rate {
    pub const ZERO: Rate = Rate(0);

    /// Builds a rate from basis points, rejecting values above 100%.
    pub fn from_bps(bps: u32) -> Option<Self> {
        (bps <= MAX_RATE_BPS).then_some(Self(bps))
    }

    pub const fn bps(self) -> u32 {
        self.0
    }

    /// Applies this rate to `amount`, rounding half away from zero to whole cents.
    pub fn apply(self, amount: Money) -> Option<Money> {
        let product = i128::from(amount.cents()) * i128::from(self.0);
        let divisor = i128::from(MAX_RATE_BPS);
        let half = divisor / 2;
        let rounded = if product >= 0 {
            (product + half) / divisor
        } else {
            (product - half) / divisor
        };
        i64::try_from(rounded).ok().map(Money)
    }
}

impl TryFrom<u32> for Rate {
    type Error = MoneyParseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Rate::from_bps(value).ok_or_else(|| MoneyParseError::OutOfRange(value.to_string()))
    }
}

impl From<Rate> for u32 {
    fn from(value: Rate) -> Self {
        value.0
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / BPS_PER_PERCENT;
        let frac = self.0 % BPS_PER_PERCENT;
        if frac == 0 {
            write!(f, "{whole}")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

impl FromStr for Rate {
    type Err = MoneyParseError;

    /// Parses a percentage such as `12`, `12.5` or `0.25`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let hundredths = parse_hundredths(value.trim().trim_end_matches('%'))?;
        u32::try_from(hundredths)
            .ok()
            .and_then(Rate::from_bps)
            .ok_or_else(|| MoneyParseError::OutOfRange(value.to_string()))
    }
}

/// Parses decimal text with at most two fraction digits into hundredths.
fn parse_hundredths(value: &str) -> Result<i64, MoneyParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MoneyParseError::Empty);
    }

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (digits, ""),
    };

    let all_digits = |part: &str| part.chars().all(|ch| ch.is_ascii_digit());
    if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
        return Err(MoneyParseError::Invalid(trimmed.to_string()));
    }
    if digits.contains('.') && frac.is_empty() {
        return Err(MoneyParseError::Invalid(trimmed.to_string()));
    }
    if frac.len() > 2 {
        return Err(MoneyParseError::TooManyFractionDigits(trimmed.to_string()));
    }

    let out_of_range = || MoneyParseError::OutOfRange(trimmed.to_string());
    let whole_value: i64 = whole.parse().map_err(|_| out_of_range())?;
    let frac_value: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| out_of_range())? * 10,
        _ => frac.parse().map_err(|_| out_of_range())?,
    };

    let magnitude = whole_value
        .checked_mul(CENTS_PER_UNIT)
        .and_then(|value| value.checked_add(frac_value))
        .ok_or_else(out_of_range)?;
    Ok(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::{Money, MoneyParseError, Rate};

    #[test]
    fn money_parses_whole_and_fractional_values() {
        assert_eq!("12".parse::<Money>().unwrap().cents(), 1200);
        assert_eq!("12.5".parse::<Money>().unwrap().cents(), 1250);
        assert_eq!(" 0.07 ".parse::<Money>().unwrap().cents(), 7);
        assert_eq!("-3.10".parse::<Money>().unwrap().cents(), -310);
    }

    #[test]
    fn money_rejects_malformed_text() {
        assert_eq!("".parse::<Money>(), Err(MoneyParseError::Empty));
        assert!(matches!(
            "1.234".parse::<Money>(),
            Err(MoneyParseError::TooManyFractionDigits(_))
        ));
        assert!(matches!("1,5".parse::<Money>(), Err(MoneyParseError::Invalid(_))));
        assert!(matches!("12.".parse::<Money>(), Err(MoneyParseError::Invalid(_))));
        assert!(matches!(".5".parse::<Money>(), Err(MoneyParseError::Invalid(_))));
    }

    #[test]
    fn money_display_pads_cents() {
        assert_eq!(Money::from_cents(1205).to_string(), "12.05");
        assert_eq!(Money::from_cents(-7).to_string(), "-0.07");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn rate_parses_percentages_and_enforces_range() {
        assert_eq!("12".parse::<Rate>().unwrap().bps(), 1200);
        assert_eq!("12.5%".parse::<Rate>().unwrap().bps(), 1250);
        assert!(matches!(
            "100.01".parse::<Rate>(),
            Err(MoneyParseError::OutOfRange(_))
        ));
        assert!("-1".parse::<Rate>().is_err());
        assert_eq!(Rate::from_bps(1250).unwrap().to_string(), "12.5");
        assert_eq!(Rate::from_bps(1225).unwrap().to_string(), "12.25");
    }

    #[test]
    fn rate_apply_rounds_half_away_from_zero() {
        let rate = Rate::from_bps(1200).unwrap();
        // 12% of 0.04 = 0.0048 -> 0.00; of 0.21 = 0.0252 -> 0.03
        assert_eq!(rate.apply(Money::from_cents(4)), Some(Money::from_cents(0)));
        assert_eq!(rate.apply(Money::from_cents(21)), Some(Money::from_cents(3)));
        let half = Rate::from_bps(5000).unwrap();
        assert_eq!(half.apply(Money::from_cents(1)), Some(Money::from_cents(1)));
        assert_eq!(half.apply(Money::from_cents(-1)), Some(Money::from_cents(-1)));
    }
}
