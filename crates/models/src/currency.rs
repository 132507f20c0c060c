use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Currency a rate is billed in. `CHF` is the designated default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Chf,
    Eur,
    Usd,
    Gbp,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Chf => "CHF",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CHF" => Ok(Currency::Chf),
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            other => Err(ModelError::Validation(format!("unknown currency <{other}>"))),
        }
    }
}

/// Rate classification. `STANDARD_RATE` is the designated default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateType {
    #[default]
    StandardRate,
    InternalRate,
    ExternalRate,
    OvertimeRate,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateType::StandardRate => "STANDARD_RATE",
            RateType::InternalRate => "INTERNAL_RATE",
            RateType::ExternalRate => "EXTERNAL_RATE",
            RateType::OvertimeRate => "OVERTIME_RATE",
        }
    }
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STANDARD_RATE" => Ok(RateType::StandardRate),
            "INTERNAL_RATE" => Ok(RateType::InternalRate),
            "EXTERNAL_RATE" => Ok(RateType::ExternalRate),
            "OVERTIME_RATE" => Ok(RateType::OvertimeRate),
            other => Err(ModelError::Validation(format!("unknown rate type <{other}>"))),
        }
    }
}
