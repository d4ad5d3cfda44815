use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage duration of the modelled battery (energy / power).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageDuration {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHour,
    #[serde(rename = "4h")]
    FourHour,
}

impl StorageDuration {
    pub const ALL: [StorageDuration; 3] = [
        StorageDuration::OneHour,
        StorageDuration::TwoHour,
        StorageDuration::FourHour,
    ];

    pub fn hours(self) -> u32 {
        match self {
            StorageDuration::OneHour => 1,
            StorageDuration::TwoHour => 2,
            StorageDuration::FourHour => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StorageDuration::OneHour => "1h",
            StorageDuration::TwoHour => "2h",
            StorageDuration::FourHour => "4h",
        }
    }
}

impl fmt::Display for StorageDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BESS", self.label())
    }
}

/// Revenue streams a BESS can earn in the Lithuanian market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    DayAheadArbitrage,
    Afrr,
    Fcr,
    Mfrr,
    Imbalance,
}

impl Market {
    pub const ALL: [Market; 5] = [
        Market::DayAheadArbitrage,
        Market::Afrr,
        Market::Fcr,
        Market::Mfrr,
        Market::Imbalance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Market::DayAheadArbitrage => "DA Arbitrage",
            Market::Afrr => "aFRR",
            Market::Fcr => "FCR",
            Market::Mfrr => "mFRR",
            Market::Imbalance => "Imbalance",
        }
    }
}

/// Balancing capacity products paid per MW of contracted reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReserveProduct {
    Fcr,
    Afrr,
    Mfrr,
}

impl ReserveProduct {
    pub fn market(self) -> Market {
        match self {
            ReserveProduct::Fcr => Market::Fcr,
            ReserveProduct::Afrr => Market::Afrr,
            ReserveProduct::Mfrr => Market::Mfrr,
        }
    }
}

/// Conditions under which a market contributes nothing for a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataGap {
    NoDayAheadPrices,
    NoReservePrices(ReserveProduct),
    /// The imbalance series does not overlap the day-ahead series.
    ImbalanceUnavailable,
    /// The year lies after the last published imbalance price.
    ImbalanceUnpublished(NaiveDate),
    FcrMarketNotLaunched,
}

impl fmt::Display for DataGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataGap::NoDayAheadPrices => write!(f, "no day-ahead prices"),
            DataGap::NoReservePrices(product) => {
                write!(f, "no {} reserve prices", product.market().label())
            }
            DataGap::ImbalanceUnavailable => write!(f, "imbalance prices unavailable"),
            DataGap::ImbalanceUnpublished(end) => {
                write!(f, "imbalance prices unpublished after {end}")
            }
            DataGap::FcrMarketNotLaunched => write!(f, "Baltic FCR market not yet launched"),
        }
    }
}

/// Annual revenue per market in EUR per MW of installed power.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketRevenues {
    pub day_ahead: f64,
    pub afrr: f64,
    pub fcr: f64,
    pub mfrr: f64,
    pub imbalance: f64,
}

impl MarketRevenues {
    pub fn get(&self, market: Market) -> f64 {
        match market {
            Market::DayAheadArbitrage => self.day_ahead,
            Market::Afrr => self.afrr,
            Market::Fcr => self.fcr,
            Market::Mfrr => self.mfrr,
            Market::Imbalance => self.imbalance,
        }
    }

    pub fn set(&mut self, market: Market, value: f64) {
        match market {
            Market::DayAheadArbitrage => self.day_ahead = value,
            Market::Afrr => self.afrr = value,
            Market::Fcr => self.fcr = value,
            Market::Mfrr => self.mfrr = value,
            Market::Imbalance => self.imbalance = value,
        }
    }
}

/// One revenue scenario: a year and a storage duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearRevenue {
    pub year: i32,
    pub duration: StorageDuration,
    pub markets: MarketRevenues,
    pub blended: f64,
    pub gaps: Vec<DataGap>,
    /// Calendar days of the year with day-ahead prices.
    #[serde(default)]
    pub day_ahead_days: usize,
}

impl YearRevenue {
    pub fn new(year: i32, duration: StorageDuration) -> Self {
        Self {
            year,
            duration,
            markets: MarketRevenues::default(),
            blended: 0.0,
            gaps: vec![],
            day_ahead_days: 0,
        }
    }

    pub fn revenue(&self, market: Market) -> f64 {
        self.markets.get(market)
    }

    pub fn best_single_market(&self) -> Market {
        Market::ALL
            .into_iter()
            .fold(Market::DayAheadArbitrage, |best, market| {
                if self.markets.get(market) > self.markets.get(best) {
                    market
                } else {
                    best
                }
            })
    }
}

/// The full revenue grid of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevenueTable {
    pub rows: Vec<YearRevenue>,
}

impl RevenueTable {
    pub fn new(mut rows: Vec<YearRevenue>) -> Self {
        rows.sort_by_key(|r| (r.year, r.duration));
        Self { rows }
    }

    pub fn get(&self, year: i32, duration: StorageDuration) -> Option<&YearRevenue> {
        self.rows
            .iter()
            .find(|r| r.year == year && r.duration == duration)
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.rows.iter().map(|r| r.year).collect();
        years.dedup();
        years
    }

    /// Latest year in which `market` earned anything for `duration`.
    pub fn latest_year_with(&self, market: Market, duration: StorageDuration) -> Option<i32> {
        self.rows
            .iter()
            .filter(|r| r.duration == duration && r.revenue(market) > 0.0)
            .map(|r| r.year)
            .max()
    }
}

/// A forward-looking revenue estimate with the compression applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedRevenue {
    pub year: i32,
    pub duration: StorageDuration,
    pub markets: MarketRevenues,
    pub blended: f64,
    pub balancing_compression: f64,
    pub day_ahead_compression: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_single_market() {
        let mut row = YearRevenue::new(2025, StorageDuration::TwoHour);
        row.markets.set(Market::Afrr, 120_000.0);
        row.markets.set(Market::DayAheadArbitrage, 80_000.0);
        row.markets.set(Market::Fcr, 95_000.0);

        assert_eq!(row.best_single_market(), Market::Afrr);
        assert_eq!(row.revenue(Market::Fcr), 95_000.0);
    }

    #[test]
    fn test_table_is_ordered_and_queryable() {
        let mut late = YearRevenue::new(2025, StorageDuration::OneHour);
        late.markets.imbalance = 0.0;
        let mut early = YearRevenue::new(2024, StorageDuration::FourHour);
        early.markets.imbalance = 10.0;

        let table = RevenueTable::new(vec![late, early]);
        assert_eq!(table.years(), vec![2024, 2025]);
        assert!(table.get(2025, StorageDuration::OneHour).is_some());
        assert!(table.get(2025, StorageDuration::TwoHour).is_none());
        assert_eq!(
            table.latest_year_with(Market::Imbalance, StorageDuration::FourHour),
            Some(2024)
        );
    }

    #[test]
    fn test_duration_labels() {
        let labels: Vec<_> = StorageDuration::ALL.iter().map(|d| d.label()).collect();
        assert_eq!(labels, vec!["1h", "2h", "4h"]);
        assert_eq!(StorageDuration::FourHour.to_string(), "4h BESS");
    }
}
