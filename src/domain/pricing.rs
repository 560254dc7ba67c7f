use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Subtotals strictly above this (in minor units) ship for free.
pub const FREE_SHIPPING_THRESHOLD: i64 = 100_00;
pub const FLAT_SHIPPING_FEE: i64 = 10_00;
pub const TAX_RATE_PERCENT: i64 = 10;

/// Price breakdown in minor currency units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Pricing {
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
}

impl Pricing {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_subtotal(subtotal: i64) -> AppResult<Self> {
        let shipping = shipping_for(subtotal);
        let tax = tax_for(subtotal)?;
        let total = subtotal
            .checked_add(shipping)
            .and_then(|sum| sum.checked_add(tax))
            .ok_or_else(too_large)?;
        Ok(Self {
            subtotal,
            shipping,
            tax,
            total,
        })
    }

    /// Prices a set of `(unit_price, quantity)` lines. No lines means nothing is
    /// charged, shipping included.
    pub fn for_lines<I>(lines: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (i64, i32)>,
    {
        let mut any = false;
        let mut subtotal: i64 = 0;
        for (price, quantity) in lines {
            any = true;
            subtotal = subtotal
                .checked_add(line_total(price, quantity)?)
                .ok_or_else(too_large)?;
        }
        if any {
            Self::from_subtotal(subtotal)
        } else {
            Ok(Self::zero())
        }
    }
}

fn too_large() -> AppError {
    AppError::invalid("Order total is too large")
}

pub fn line_total(price: i64, quantity: i32) -> AppResult<i64> {
    price.checked_mul(i64::from(quantity)).ok_or_else(too_large)
}

pub fn shipping_for(subtotal: i64) -> i64 {
    if subtotal > FREE_SHIPPING_THRESHOLD {
        0
    } else {
        FLAT_SHIPPING_FEE
    }
}

/// Tax rounded to the nearest cent, halves away from zero.
pub fn tax_for(subtotal: i64) -> AppResult<i64> {
    let scaled = subtotal
        .checked_mul(TAX_RATE_PERCENT)
        .ok_or_else(too_large)?;
    let rounded = if scaled >= 0 {
        scaled.checked_add(50)
    } else {
        scaled.checked_sub(50)
    };
    rounded.map(|cents| cents / 100).ok_or_else(too_large)
}
