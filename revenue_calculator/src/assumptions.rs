use crate::models::{Market, ReserveProduct, StorageDuration};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssumptionsError {
    #[error("failed to read assumptions file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse assumptions file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("market allocation weights sum to {0}, expected 1.0")]
    WeightsDoNotSumToOne(f64),

    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{0} availability must not decrease with longer storage duration")]
    AvailabilityNotMonotonic(&'static str),
}

/// Availability factor per storage duration: the share of hours a battery
/// can sustain a reserve commitment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityCurve {
    pub one_hour: f64,
    pub two_hour: f64,
    pub four_hour: f64,
}

impl AvailabilityCurve {
    pub fn get(&self, duration: StorageDuration) -> f64 {
        match duration {
            StorageDuration::OneHour => self.one_hour,
            StorageDuration::TwoHour => self.two_hour,
            StorageDuration::FourHour => self.four_hour,
        }
    }

    fn is_monotonic(&self) -> bool {
        self.one_hour <= self.two_hour && self.two_hour <= self.four_hour
    }
}

/// Share of operating time allocated to each market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationWeights {
    pub afrr: f64,
    pub fcr: f64,
    pub day_ahead: f64,
    pub mfrr: f64,
    pub imbalance: f64,
}

impl AllocationWeights {
    pub fn weight(&self, market: Market) -> f64 {
        match market {
            Market::DayAheadArbitrage => self.day_ahead,
            Market::Afrr => self.afrr,
            Market::Fcr => self.fcr,
            Market::Mfrr => self.mfrr,
            Market::Imbalance => self.imbalance,
        }
    }

    pub fn sum(&self) -> f64 {
        Market::ALL.iter().map(|m| self.weight(*m)).sum()
    }
}

impl Default for AllocationWeights {
    fn default() -> Self {
        Self {
            afrr: 0.40,
            fcr: 0.20,
            day_ahead: 0.25,
            mfrr: 0.05,
            imbalance: 0.10,
        }
    }
}

/// Revenue compression applied to forward years as BESS capacity saturates
/// the balancing markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionAssumptions {
    pub last_year: i32,
    pub balancing_compression: BTreeMap<i32, f64>,
    pub day_ahead_compression: BTreeMap<i32, f64>,
    /// Used for years missing from `balancing_compression`.
    pub balancing_steady_state: f64,
    /// Used for years missing from `day_ahead_compression`.
    pub day_ahead_steady_state: f64,
}

impl ProjectionAssumptions {
    pub fn balancing_factor(&self, year: i32) -> f64 {
        self.balancing_compression
            .get(&year)
            .copied()
            .unwrap_or(self.balancing_steady_state)
    }

    pub fn day_ahead_factor(&self, year: i32) -> f64 {
        self.day_ahead_compression
            .get(&year)
            .copied()
            .unwrap_or(self.day_ahead_steady_state)
    }
}

impl Default for ProjectionAssumptions {
    fn default() -> Self {
        Self {
            last_year: 2030,
            balancing_compression: BTreeMap::from([
                (2024, 1.0),
                (2025, 1.0),
                (2026, 0.65),
                (2027, 0.45),
                (2028, 0.35),
                (2029, 0.30),
                (2030, 0.28),
            ]),
            day_ahead_compression: BTreeMap::from([
                (2024, 1.0),
                (2025, 1.0),
                (2026, 0.85),
                (2027, 0.70),
                (2028, 0.60),
                (2029, 0.55),
                (2030, 0.50),
            ]),
            balancing_steady_state: 0.28,
            day_ahead_steady_state: 0.50,
        }
    }
}

/// Every business constant the revenue model depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueAssumptions {
    pub round_trip_efficiency: f64,
    /// Fraction of the perfect-foresight spread a real dispatcher captures.
    pub capture_rate: f64,
    pub hours_per_year: f64,
    /// Weight of the up-direction price in a reserve clearing price.
    pub reserve_up_share: f64,
    pub afrr_availability: AvailabilityCurve,
    pub mfrr_availability: AvailabilityCurve,
    pub fcr_availability: AvailabilityCurve,
    /// Estimated FCR capacity price by year, EUR/MW/h.
    pub fcr_price_per_mw_h: BTreeMap<i32, f64>,
    pub fcr_default_price_per_mw_h: f64,
    pub fcr_launch_date: NaiveDate,
    /// Estimated FCR requirement used in saturation ratios, MW.
    pub fcr_requirement_mw: f64,
    /// Imbalance columns tried in order.
    pub imbalance_price_columns: Vec<String>,
    pub imbalance_publication_end: NaiveDate,
    pub allocation: AllocationWeights,
    pub projection: ProjectionAssumptions,
}

impl Default for RevenueAssumptions {
    fn default() -> Self {
        Self {
            round_trip_efficiency: 0.88,
            capture_rate: 0.85,
            hours_per_year: 8760.0,
            reserve_up_share: 0.5,
            afrr_availability: AvailabilityCurve {
                one_hour: 0.65,
                two_hour: 0.80,
                four_hour: 0.90,
            },
            mfrr_availability: AvailabilityCurve {
                one_hour: 0.70,
                two_hour: 0.82,
                four_hour: 0.90,
            },
            fcr_availability: AvailabilityCurve {
                one_hour: 0.90,
                two_hour: 0.92,
                four_hour: 0.95,
            },
            fcr_price_per_mw_h: BTreeMap::from([
                (2025, 30.0),
                (2026, 22.0),
                (2027, 18.0),
                (2028, 15.0),
                (2029, 12.0),
                (2030, 10.0),
            ]),
            fcr_default_price_per_mw_h: 15.0,
            fcr_launch_date: NaiveDate::from_ymd_opt(2025, 2, 5).unwrap_or_default(),
            fcr_requirement_mw: 40.0,
            imbalance_price_columns: vec!["short".to_string(), "long".to_string()],
            imbalance_publication_end: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap_or_default(),
            allocation: AllocationWeights::default(),
            projection: ProjectionAssumptions::default(),
        }
    }
}

impl RevenueAssumptions {
    /// Load from a JSON file; fields left out keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, AssumptionsError> {
        let text = std::fs::read_to_string(path).map_err(|source| AssumptionsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let assumptions: Self =
            serde_json::from_str(&text).map_err(|source| AssumptionsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        assumptions.validate()?;
        Ok(assumptions)
    }

    pub fn validate(&self) -> Result<(), AssumptionsError> {
        let sum = self.allocation.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(AssumptionsError::WeightsDoNotSumToOne(sum));
        }

        check_range("round_trip_efficiency", self.round_trip_efficiency, f64::EPSILON, 1.0)?;
        check_range("capture_rate", self.capture_rate, f64::EPSILON, 1.0)?;
        check_range("reserve_up_share", self.reserve_up_share, 0.0, 1.0)?;
        check_range("hours_per_year", self.hours_per_year, 1.0, 8784.0)?;

        for market in Market::ALL {
            check_range("allocation weight", self.allocation.weight(market), 0.0, 1.0)?;
        }

        for (name, curve) in [
            ("aFRR", &self.afrr_availability),
            ("mFRR", &self.mfrr_availability),
            ("FCR", &self.fcr_availability),
        ] {
            for duration in StorageDuration::ALL {
                check_range("availability", curve.get(duration), 0.0, 1.0)?;
            }
            if !curve.is_monotonic() {
                return Err(AssumptionsError::AvailabilityNotMonotonic(name));
            }
        }

        Ok(())
    }

    pub fn availability(&self, product: ReserveProduct, duration: StorageDuration) -> f64 {
        match product {
            ReserveProduct::Afrr => self.afrr_availability.get(duration),
            ReserveProduct::Mfrr => self.mfrr_availability.get(duration),
            ReserveProduct::Fcr => self.fcr_availability.get(duration),
        }
    }

    pub fn fcr_price(&self, year: i32) -> f64 {
        self.fcr_price_per_mw_h
            .get(&year)
            .copied()
            .unwrap_or(self.fcr_default_price_per_mw_h)
    }

    /// Share of `year` during which the FCR market was open, by whole months.
    pub fn fcr_active_fraction(&self, year: i32) -> f64 {
        let launch = self.fcr_launch_date;
        if year < launch.year() {
            0.0
        } else if year == launch.year() {
            f64::from(13 - launch.month()) / 12.0
        } else {
            1.0
        }
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), AssumptionsError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(AssumptionsError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let assumptions = RevenueAssumptions::default();
        assumptions.validate().unwrap();
        approx::assert_relative_eq!(assumptions.allocation.sum(), 1.0);
    }

    #[test]
    fn test_availability_is_non_decreasing_in_duration() {
        let assumptions = RevenueAssumptions::default();
        for product in [ReserveProduct::Afrr, ReserveProduct::Mfrr, ReserveProduct::Fcr] {
            let values: Vec<f64> = StorageDuration::ALL
                .iter()
                .map(|d| assumptions.availability(product, *d))
                .collect();
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "{product:?}: {values:?}");
        }
        assert_eq!(assumptions.afrr_availability.one_hour, 0.65);
        assert_eq!(assumptions.afrr_availability.two_hour, 0.80);
        assert_eq!(assumptions.afrr_availability.four_hour, 0.90);
    }

    #[test]
    fn test_rejects_weights_not_summing_to_one() {
        let mut assumptions = RevenueAssumptions::default();
        assumptions.allocation.afrr = 0.5;
        assert!(matches!(
            assumptions.validate(),
            Err(AssumptionsError::WeightsDoNotSumToOne(_))
        ));
    }

    #[test]
    fn test_rejects_decreasing_availability() {
        let mut assumptions = RevenueAssumptions::default();
        assumptions.mfrr_availability.four_hour = 0.5;
        assert!(matches!(
            assumptions.validate(),
            Err(AssumptionsError::AvailabilityNotMonotonic("mFRR"))
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "capture_rate": 0.9, "hours_per_year": 8784.0 }}"#).unwrap();

        let assumptions = RevenueAssumptions::from_json_file(file.path()).unwrap();
        assert_eq!(assumptions.capture_rate, 0.9);
        assert_eq!(assumptions.hours_per_year, 8784.0);
        assert_eq!(assumptions.round_trip_efficiency, 0.88);
        assert_eq!(assumptions.allocation, AllocationWeights::default());
    }

    #[test]
    fn test_fcr_active_fraction() {
        let assumptions = RevenueAssumptions::default();
        assert_eq!(assumptions.fcr_active_fraction(2024), 0.0);
        approx::assert_relative_eq!(assumptions.fcr_active_fraction(2025), 11.0 / 12.0);
        assert_eq!(assumptions.fcr_active_fraction(2026), 1.0);
        assert_eq!(assumptions.fcr_price(2031), 15.0);
    }
}
