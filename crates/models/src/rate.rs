use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::{Currency, RateType};
use crate::errors::ModelError;

/// A billable rate.
///
/// The same shape is used for stored records and for client candidates/patches:
/// on input `id` is expected to be empty and the audit fields are either absent
/// or echo the stored values. `currency` and `type` are optional on input and
/// always filled on stored records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub rate_type: Option<RateType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
}

/// Values filled in when a candidate leaves `currency` or `type` unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateDefaults {
    pub currency: Currency,
    pub rate_type: RateType,
}

impl Rate {
    /// Candidate with the two required fields set; everything else is left to the store.
    pub fn new(title: impl Into<String>, amount: f64) -> Self {
        Self { title: title.into(), amount, ..Self::default() }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_type(mut self, rate_type: RateType) -> Self {
        self.rate_type = Some(rate_type);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the mutable fields shared by create and update.
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_title(&self.title)?;
        validate_amount(self.amount)?;
        Ok(())
    }

    /// Fill `currency` and `type` from `defaults` where unset.
    pub fn apply_defaults(&mut self, defaults: &RateDefaults) {
        self.currency.get_or_insert(defaults.currency);
        self.rate_type.get_or_insert(defaults.rate_type);
    }

    /// Total order used for listings and exports: title (case-insensitive), then id.
    pub fn list_order(a: &Rate, b: &Rate) -> Ordering {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    }
}

pub fn validate_title(title: &str) -> Result<(), ModelError> {
    if title.trim().is_empty() {
        return Err(ModelError::Validation("rate must contain a valid title".into()));
    }
    Ok(())
}

pub fn validate_amount(amount: f64) -> Result<(), ModelError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ModelError::Validation(format!("rate amount <{amount}> must be a non-negative number")));
    }
    Ok(())
}
