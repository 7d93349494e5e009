//! Purchase-order price resolution and totals.
//!
//! # Responsibility
//! - Pick the unit price for a line: explicit, then supplier history, then zero.
//! - Compute subtotal, VAT, shipping, discount and grand total.
//!
//! # Invariants
//! - `subtotal = Σ quantity × unit_price`.
//! - `vat = round(rate × (subtotal − discount))`.
//! - `total = subtotal − discount + vat + shipping`.
//! - Discount never exceeds subtotal; no amount is negative.

use crate::model::purchase_order::{LineInput, PoTotals, PricedLine};
use crate::model::validation::{optional_text, ValidationError};
use crate::money::{Money, Rate};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Where a resolved unit price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Explicit,
    History,
    Default,
}

/// Unit price chosen for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPrice {
    pub unit_price: Money,
    pub source: PriceSource,
}

/// Totals computation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    NegativeUnitPrice { line_no: u32 },
    NegativeShipping,
    NegativeDiscount,
    DiscountExceedsSubtotal { discount: Money, subtotal: Money },
    Validation(ValidationError),
    Overflow,
}

impl Display for PricingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeUnitPrice { line_no } => {
                write!(f, "line {line_no}: unit price must not be negative")
            }
            Self::NegativeShipping => write!(f, "shipping must not be negative"),
            Self::NegativeDiscount => write!(f, "discount must not be negative"),
            Self::DiscountExceedsSubtotal { discount, subtotal } => write!(
                f,
                "discount {discount} exceeds subtotal {subtotal}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl Error for PricingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for PricingError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Chooses the unit price for one line.
///
/// `historical` is the latest recorded price of the item at the PO's supplier.
pub fn resolve_unit_price(explicit: Option<Money>, historical: Option<Money>) -> ResolvedPrice {
    match (explicit, historical) {
        (Some(unit_price), _) => ResolvedPrice {
            unit_price,
            source: PriceSource::Explicit,
        },
        (None, Some(unit_price)) => ResolvedPrice {
            unit_price,
            source: PriceSource::History,
        },
        (None, None) => ResolvedPrice {
            unit_price: Money::ZERO,
            source: PriceSource::Default,
        },
    }
}

/// Resolves prices for every requested line and numbers them from 1.
///
/// `history` is called once per line without an explicit price.
pub fn price_lines<F, E>(lines: &[LineInput], mut history: F) -> Result<Vec<PricedLine>, E>
where
    F: FnMut(&LineInput) -> Result<Option<Money>, E>,
    E: From<PricingError>,
{
    let mut priced = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let line_no = u32::try_from(index + 1).map_err(|_| PricingError::Overflow)?;
        if line.quantity == 0 {
            return Err(PricingError::from(ValidationError::NonPositiveQuantity { line_no }).into());
        }
        let historical = match line.unit_price {
            Some(_) => None,
            None => history(line)?,
        };
        let resolved = resolve_unit_price(line.unit_price, historical);
        if resolved.unit_price.is_negative() {
            return Err(PricingError::NegativeUnitPrice { line_no }.into());
        }
        let amount = resolved
            .unit_price
            .checked_mul(line.quantity)
            .ok_or(PricingError::Overflow)?;
        priced.push(PricedLine {
            line_no,
            item_id: line.item_id,
            description: optional_text(line.description.as_deref()),
            quantity: line.quantity,
            unit_price: resolved.unit_price,
            price_source: resolved.source,
            amount,
        });
    }
    Ok(priced)
}

/// Computes PO totals over already-priced lines.
pub fn compute_totals(
    lines: &[PricedLine],
    vat_rate: Rate,
    shipping: Money,
    discount: Money,
) -> Result<PoTotals, PricingError> {
    if shipping.is_negative() {
        return Err(PricingError::NegativeShipping);
    }
    if discount.is_negative() {
        return Err(PricingError::NegativeDiscount);
    }

    let mut subtotal = Money::ZERO;
    for line in lines {
        if line.quantity == 0 {
            return Err(ValidationError::NonPositiveQuantity {
                line_no: line.line_no,
            }
            .into());
        }
        if line.unit_price.is_negative() {
            return Err(PricingError::NegativeUnitPrice {
                line_no: line.line_no,
            });
        }
        let amount = line
            .unit_price
            .checked_mul(line.quantity)
            .ok_or(PricingError::Overflow)?;
        subtotal = subtotal.checked_add(amount).ok_or(PricingError::Overflow)?;
    }

    if discount > subtotal {
        return Err(PricingError::DiscountExceedsSubtotal { discount, subtotal });
    }

    let taxable = subtotal.checked_sub(discount).ok_or(PricingError::Overflow)?;
    let vat = vat_rate.apply(taxable).ok_or(PricingError::Overflow)?;
    let total = taxable
        .checked_add(vat)
        .and_then(|value| value.checked_add(shipping))
        .ok_or(PricingError::Overflow)?;

    Ok(PoTotals {
        subtotal,
        discount,
        vat,
        shipping,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::{compute_totals, price_lines, resolve_unit_price, PriceSource, PricingError};
    use crate::model::purchase_order::{LineInput, PricedLine};
    use crate::model::validation::ValidationError;
    use crate::money::{Money, Rate};
    use uuid::Uuid;

    fn money(text: &str) -> Money {
        text.parse().unwrap()
    }

    fn line(line_no: u32, quantity: u32, unit_price: &str) -> PricedLine {
        let unit_price = money(unit_price);
        PricedLine {
            line_no,
            item_id: Uuid::new_v4(),
            description: None,
            quantity,
            unit_price,
            price_source: PriceSource::Explicit,
            amount: unit_price.checked_mul(quantity).unwrap(),
        }
    }

    #[test]
    fn explicit_price_wins_over_history() {
        let resolved = resolve_unit_price(Some(money("5.00")), Some(money("4.00")));
        assert_eq!(resolved.unit_price, money("5.00"));
        assert_eq!(resolved.source, PriceSource::Explicit);

        let resolved = resolve_unit_price(None, Some(money("4.00")));
        assert_eq!(resolved.source, PriceSource::History);

        let resolved = resolve_unit_price(None, None);
        assert_eq!(resolved.unit_price, Money::ZERO);
        assert_eq!(resolved.source, PriceSource::Default);
    }

    #[test]
    fn totals_apply_discount_before_vat_and_add_shipping() {
        let lines = vec![line(1, 3, "100.00"), line(2, 2, "25.50")];
        let totals = compute_totals(
            &lines,
            "12".parse::<Rate>().unwrap(),
            money("150.00"),
            money("51.00"),
        )
        .unwrap();

        assert_eq!(totals.subtotal, money("351.00"));
        assert_eq!(totals.discount, money("51.00"));
        assert_eq!(totals.vat, money("36.00"));
        assert_eq!(totals.shipping, money("150.00"));
        assert_eq!(totals.total, money("486.00"));
    }

    #[test]
    fn empty_lines_total_is_shipping_only() {
        let totals = compute_totals(&[], Rate::ZERO, money("10.00"), Money::ZERO).unwrap();
        assert_eq!(totals.subtotal, Money::ZERO);
        assert_eq!(totals.total, money("10.00"));
    }

    #[test]
    fn discount_above_subtotal_is_rejected() {
        let lines = vec![line(1, 1, "10.00")];
        let err = compute_totals(&lines, Rate::ZERO, Money::ZERO, money("10.01")).unwrap_err();
        assert!(matches!(err, PricingError::DiscountExceedsSubtotal { .. }));
    }

    #[test]
    fn negative_charges_are_rejected() {
        let lines = vec![line(1, 1, "10.00")];
        assert_eq!(
            compute_totals(&lines, Rate::ZERO, money("-1"), Money::ZERO),
            Err(PricingError::NegativeShipping)
        );
        assert_eq!(
            compute_totals(&lines, Rate::ZERO, Money::ZERO, money("-1")),
            Err(PricingError::NegativeDiscount)
        );
    }

    #[test]
    fn price_lines_consults_history_only_without_explicit_price() {
        let with_price = LineInput {
            item_id: Uuid::new_v4(),
            quantity: 2,
            unit_price: Some(money("3.00")),
            description: Some("  ".to_string()),
        };
        let without_price = LineInput {
            item_id: Uuid::new_v4(),
            quantity: 4,
            unit_price: None,
            description: Some(" blue ".to_string()),
        };
        let mut lookups = 0;
        let priced = price_lines::<_, PricingError>(&[with_price, without_price], |_| {
            lookups += 1;
            Ok(Some(money("1.25")))
        })
        .unwrap();

        assert_eq!(lookups, 1);
        assert_eq!(priced[0].line_no, 1);
        assert_eq!(priced[0].amount, money("6.00"));
        assert_eq!(priced[0].description, None);
        assert_eq!(priced[0].price_source, PriceSource::Explicit);
        assert_eq!(priced[1].line_no, 2);
        assert_eq!(priced[1].price_source, PriceSource::History);
        assert_eq!(priced[1].amount, money("5.00"));
        assert_eq!(priced[1].description.as_deref(), Some("blue"));
    }

    #[test]
    fn price_lines_rejects_zero_quantity() {
        let input = LineInput {
            item_id: Uuid::new_v4(),
            quantity: 0,
            unit_price: None,
            description: None,
        };
        let err = price_lines::<_, PricingError>(&[input], |_| Ok(None)).unwrap_err();
        assert_eq!(
            err,
            PricingError::Validation(ValidationError::NonPositiveQuantity { line_no: 1 })
        );
    }
}
