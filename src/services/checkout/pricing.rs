use crate::models::{CheckoutItem, Totals};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Simplified flat VAT rate (10%).
const TAX_RATE: Decimal = dec!(0.10);

/// Pure totals computation. All arithmetic is exact decimal; floating point
/// would corrupt currency amounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine;

impl PricingEngine {
    pub fn calculate_totals(
        &self,
        items: &[CheckoutItem],
        shipping_cost: Decimal,
        currency: &str,
    ) -> Totals {
        let items_base_amount: Decimal = items.iter().map(|item| item.total_price).sum();
        // Promotions hook: discounts are a stubbed zero until a promotion
        // engine plugs in here.
        let items_discount = Decimal::ZERO;
        let subtotal = items_base_amount - items_discount;

        let tax = round_to_minor_unit(subtotal * TAX_RATE, currency);
        let total = subtotal + shipping_cost + tax;

        Totals {
            items_base_amount,
            items_discount,
            subtotal,
            tax,
            shipping: shipping_cost,
            total,
        }
    }
}

/// Number of decimal places of the currency's minor unit.
fn minor_unit(currency: &str) -> u32 {
    match currency {
        "KRW" | "JPY" => 0,
        _ => 2,
    }
}

fn round_to_minor_unit(amount: Decimal, currency: &str) -> Decimal {
    amount.round_dp_with_strategy(minor_unit(currency), RoundingStrategy::MidpointAwayFromZero)
}
