use crate::errors::ServiceError;
use crate::models::Address;
use once_cell::sync::Lazy;
use regex::Regex;

const SUPPORTED_COUNTRIES: [&str; 3] = ["KR", "US", "JP"];

static KR_POSTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").unwrap());
static US_POSTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());
static JP_POSTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3}-\d{4}$").unwrap());

/// Validates shipping addresses against the supported-country set and each
/// country's postal-code format.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressValidator;

impl AddressValidator {
    pub fn validate(&self, address: &Address) -> Result<(), ServiceError> {
        if !SUPPORTED_COUNTRIES.contains(&address.country_code.as_str()) {
            return Err(ServiceError::InvalidAddress(format!(
                "unsupported country: {}",
                address.country_code
            )));
        }

        // Every supported country requires a postal code.
        let Some(postal_code) = address.postal_code.as_deref() else {
            return Err(ServiceError::InvalidAddress(
                "postal code is required".to_string(),
            ));
        };

        let valid = match address.country_code.as_str() {
            "KR" => KR_POSTAL_CODE.is_match(postal_code),
            "US" => US_POSTAL_CODE.is_match(postal_code),
            "JP" => JP_POSTAL_CODE.is_match(postal_code),
            _ => false,
        };

        if !valid {
            return Err(ServiceError::InvalidAddress(format!(
                "invalid postal code format: {}",
                postal_code
            )));
        }

        Ok(())
    }
}
