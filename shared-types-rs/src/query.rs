//! Vehicle query input and validation.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdvisorError;

/// Earliest model year the pipeline accepts.
pub const MIN_MODEL_YEAR: i32 = 1980;

/// Vehicle condition as reported by the seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Salvage,
}

impl Condition {
    /// Parse a condition string, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, AdvisorError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Ok(Condition::Excellent),
            "good" => Ok(Condition::Good),
            "fair" => Ok(Condition::Fair),
            "salvage" => Ok(Condition::Salvage),
            other => Err(AdvisorError::Validation(format!(
                "unknown condition '{}' (expected excellent|good|fair|salvage)",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Excellent => "excellent",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Salvage => "salvage",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw, unvalidated request input as it arrives at the ingress boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuery {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub mileage: i64,
    pub condition: String,
    pub region: String,
}

/// Immutable, validated vehicle query. Created once per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleQuery {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub mileage: u32,
    pub condition: Condition,
    pub region: String,
}

impl VehicleQuery {
    /// Validate and normalize a raw query. Normalization lowercases and trims
    /// the free-text fields; validation rejects implausible years, negative
    /// mileage, and empty identifiers.
    pub fn parse(raw: &RawQuery) -> Result<Self, AdvisorError> {
        let make = normalize(&raw.make);
        let model = normalize(&raw.model);
        let region = normalize(&raw.region);

        if make.is_empty() {
            return Err(AdvisorError::Validation("make must not be empty".into()));
        }
        if model.is_empty() {
            return Err(AdvisorError::Validation("model must not be empty".into()));
        }
        if region.is_empty() {
            return Err(AdvisorError::Validation("region must not be empty".into()));
        }

        let max_year = Utc::now().year() + 1;
        if raw.year < MIN_MODEL_YEAR || raw.year > max_year {
            return Err(AdvisorError::Validation(format!(
                "year {} out of plausible range {}..={}",
                raw.year, MIN_MODEL_YEAR, max_year
            )));
        }

        if raw.mileage < 0 {
            return Err(AdvisorError::Validation(format!(
                "mileage must be non-negative, got {}",
                raw.mileage
            )));
        }
        let mileage = u32::try_from(raw.mileage).map_err(|_| {
            AdvisorError::Validation(format!("mileage {} is implausibly large", raw.mileage))
        })?;

        Ok(Self {
            make,
            model,
            year: raw.year,
            mileage,
            condition: Condition::parse(&raw.condition)?,
            region,
        })
    }

    /// Cache key for the market context of this vehicle.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}:{}", self.make, self.model, self.year, self.region)
    }

    /// Display label, e.g. "2020 honda civic".
    pub fn label(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}
