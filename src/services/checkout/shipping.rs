use crate::errors::ServiceError;
use crate::models::{Address, CheckoutItem, FulfillmentOption};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Orders at or above this amount ship free with the standard option.
const FREE_SHIPPING_THRESHOLD: Decimal = dec!(50000);
const STANDARD_FEE: Decimal = dec!(3000);
const EXPRESS_FEE: Decimal = dec!(5000);
const SAME_DAY_FEE: Decimal = dec!(10000);

const STANDARD_ID: &str = "standard";
const EXPRESS_ID: &str = "express";
const SAME_DAY_ID: &str = "same_day";

/// Same-day delivery is limited to Seoul Gangnam/Seocho/Songpa and parts of
/// Gyeonggi, identified by the leading two digits of the postal code.
const SAME_DAY_POSTAL_PREFIXES: [&str; 6] = ["06", "07", "08", "13", "14", "15"];
const SAME_DAY_COUNTRY: &str = "KR";

const DEFAULT_CURRENCY: &str = "KRW";

/// Derives fulfillment options and their costs from the order, never from
/// client-supplied amounts. Options are a pure function of
/// (items, address, order amount) and are recomputed on every use.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShippingCalculator;

impl ShippingCalculator {
    /// Options currently available for this order.
    pub fn available_options(
        &self,
        _items: &[CheckoutItem],
        address: Option<&Address>,
        order_amount: Decimal,
    ) -> Vec<FulfillmentOption> {
        let mut options = vec![self.standard_option(order_amount), self.express_option()];

        if is_same_day_available(address) {
            options.push(self.same_day_option());
        }

        options
    }

    /// Cost of the selected option, re-derived by the same rules that
    /// produced it.
    pub fn shipping_cost(
        &self,
        fulfillment_option_id: &str,
        order_amount: Decimal,
        address: Option<&Address>,
    ) -> Result<Decimal, ServiceError> {
        match fulfillment_option_id {
            STANDARD_ID => Ok(standard_fee(order_amount)),
            EXPRESS_ID => Ok(EXPRESS_FEE),
            SAME_DAY_ID => {
                if is_same_day_available(address) {
                    Ok(SAME_DAY_FEE)
                } else {
                    Err(ServiceError::FulfillmentOptionUnavailable(
                        "same-day delivery is not available in this area".to_string(),
                    ))
                }
            }
            other => Err(ServiceError::UnknownFulfillmentOption(other.to_string())),
        }
    }

    fn standard_option(&self, order_amount: Decimal) -> FulfillmentOption {
        FulfillmentOption {
            id: STANDARD_ID.to_string(),
            name: "Standard delivery".to_string(),
            description: format!(
                "Parcel delivery (free on orders of {} or more)",
                FREE_SHIPPING_THRESHOLD
            ),
            estimated_min_days: 3,
            estimated_max_days: 5,
            cost: standard_fee(order_amount),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    fn express_option(&self) -> FulfillmentOption {
        FulfillmentOption {
            id: EXPRESS_ID.to_string(),
            name: "Express delivery".to_string(),
            description: "Next-day or day-after delivery".to_string(),
            estimated_min_days: 1,
            estimated_max_days: 2,
            cost: EXPRESS_FEE,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    fn same_day_option(&self) -> FulfillmentOption {
        FulfillmentOption {
            id: SAME_DAY_ID.to_string(),
            name: "Same-day delivery".to_string(),
            description: "Delivered today for eligible Seoul/Gyeonggi areas".to_string(),
            estimated_min_days: 0,
            estimated_max_days: 1,
            cost: SAME_DAY_FEE,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

fn standard_fee(order_amount: Decimal) -> Decimal {
    if order_amount >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        STANDARD_FEE
    }
}

fn is_same_day_available(address: Option<&Address>) -> bool {
    let Some(address) = address else {
        return false;
    };
    let Some(postal_code) = address.postal_code.as_deref() else {
        return false;
    };
    if address.country_code != SAME_DAY_COUNTRY {
        return false;
    }

    let prefix: String = postal_code.chars().take(2).collect();
    SAME_DAY_POSTAL_PREFIXES.contains(&prefix.as_str())
}
