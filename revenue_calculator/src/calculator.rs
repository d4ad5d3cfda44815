use crate::assumptions::RevenueAssumptions;
use crate::blended::blended_revenue;
use crate::data_loader::MarketData;
use crate::models::{DataGap, Market, ReserveProduct, RevenueTable, StorageDuration, YearRevenue};
use crate::series::{dominant_step, Sample, SeriesTable, TimeSeries};
use chrono::{Datelike, Duration};
use log::{debug, warn};
use rayon::prelude::*;

pub const UP_PRICE: &str = "up_price";
pub const DOWN_PRICE: &str = "down_price";
pub const UP_QUANTITY: &str = "up_quantity";
pub const DOWN_QUANTITY: &str = "down_quantity";

const DEFAULT_DA_STEP_MINUTES: i64 = 60;
const DEFAULT_BALANCING_STEP_MINUTES: i64 = 15;

/// Sum of the `n` highest minus the sum of the `n` lowest values.
///
/// `n` is clamped to half the number of values, so an interval never sits in
/// both the buy and the sell leg.
pub fn top_bottom_spread(values: &[f64], n: usize) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let k = n.min(sorted.len() / 2);
    if k == 0 {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let buy: f64 = sorted[..k].iter().sum();
    let sell: f64 = sorted[sorted.len() - k..].iter().sum();
    sell - buy
}

/// Sum of the `n` largest values (all of them when there are fewer).
fn best_n_sum(values: &[f64], n: usize) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted.iter().take(n).sum()
}

/// Number of settlement intervals of length `step` that cover `duration`.
pub fn intervals_for(duration: StorageDuration, step: Duration) -> usize {
    let step_secs = step.num_seconds().max(1);
    let secs = i64::from(duration.hours()) * 3600;
    usize::try_from(secs / step_secs).unwrap_or(0).max(1)
}

/// Dominant sample spacing within one year of `series`.
fn year_step(series: &TimeSeries, year: i32, default_minutes: i64) -> Duration {
    dominant_step(series.in_year(year).map(|s| s.timestamp))
        .unwrap_or_else(|| Duration::minutes(default_minutes))
}

fn step_hours(step: Duration) -> f64 {
    step.num_seconds() as f64 / 3600.0
}

pub struct RevenueCalculator {
    assumptions: RevenueAssumptions,
}

impl RevenueCalculator {
    pub fn new(assumptions: RevenueAssumptions) -> Self {
        Self { assumptions }
    }

    pub fn assumptions(&self) -> &RevenueAssumptions {
        &self.assumptions
    }

    fn dispatch_factor(&self) -> f64 {
        self.assumptions.round_trip_efficiency * self.assumptions.capture_rate
    }

    /// Arbitrage revenue of one day, after efficiency and capture.
    pub fn daily_arbitrage(&self, day: &[Sample], duration: StorageDuration, fallback_step: Duration) -> f64 {
        let step = dominant_step(day.iter().map(|s| s.timestamp)).unwrap_or(fallback_step);
        let values: Vec<f64> = day.iter().map(|s| s.value).collect();
        let n = intervals_for(duration, step);
        top_bottom_spread(&values, n) * step_hours(step) * self.dispatch_factor()
    }

    /// Perfect-foresight day-ahead arbitrage summed over the days of `year`.
    pub fn arbitrage_revenue(&self, series: &TimeSeries, year: i32, duration: StorageDuration) -> f64 {
        let fallback = year_step(series, year, DEFAULT_DA_STEP_MINUTES);
        series
            .days_in_year(year)
            .values()
            .map(|day| self.daily_arbitrage(day, duration, fallback))
            .sum()
    }

    /// Per-interval clearing price: the up and down prices blended with the
    /// configured direction split, or whichever side is present.
    pub fn reserve_clearing_series(&self, table: &SeriesTable, name: &str) -> TimeSeries {
        let up_share = self.assumptions.reserve_up_share;
        table.combine_columns(name, UP_PRICE, DOWN_PRICE, |up, down| match (up, down) {
            (Some(u), Some(d)) => Some(up_share * u + (1.0 - up_share) * d),
            (Some(u), None) => Some(u),
            (None, Some(d)) => Some(d),
            (None, None) => None,
        })
    }

    /// Capacity payment for `product`, or `None` when the year has no
    /// reserve prices.
    pub fn reserve_capacity_revenue(
        &self,
        table: &SeriesTable,
        year: i32,
        duration: StorageDuration,
        product: ReserveProduct,
    ) -> Option<f64> {
        let clearing = self.reserve_clearing_series(table, product.market().label());
        let mean = clearing.mean_in_year(year)?;
        Some(
            mean * self.assumptions.hours_per_year
                * self.assumptions.availability(product, duration),
        )
    }

    /// FCR revenue from the price forecast table, or from a reserve price
    /// series when one exists for the year.
    pub fn fcr_revenue(
        &self,
        fcr: Option<&SeriesTable>,
        year: i32,
        duration: StorageDuration,
    ) -> (f64, Option<DataGap>) {
        if let Some(revenue) =
            fcr.and_then(|t| self.reserve_capacity_revenue(t, year, duration, ReserveProduct::Fcr))
        {
            return (revenue, None);
        }

        let active = self.assumptions.fcr_active_fraction(year);
        if active <= 0.0 {
            return (0.0, Some(DataGap::FcrMarketNotLaunched));
        }
        let revenue = self.assumptions.fcr_price(year)
            * self.assumptions.hours_per_year
            * active
            * self.assumptions.availability(ReserveProduct::Fcr, duration);
        (revenue, None)
    }

    /// Imbalance price column used for `year`: the first configured column
    /// with data in that year.
    pub fn imbalance_series(&self, table: &SeriesTable, year: i32) -> Option<TimeSeries> {
        self.assumptions
            .imbalance_price_columns
            .iter()
            .filter_map(|name| table.column(name))
            .find(|series| series.in_year(year).next().is_some())
    }

    /// Spread trading between the imbalance and day-ahead prices. `None`
    /// when the two series do not overlap in `year`.
    ///
    /// The settlement interval is taken per day from the imbalance samples of
    /// that day, so other years never change the result.
    pub fn imbalance_revenue(
        &self,
        day_ahead: &TimeSeries,
        imbalance: &TimeSeries,
        year: i32,
        duration: StorageDuration,
    ) -> Option<f64> {
        let da_step = year_step(day_ahead, year, DEFAULT_DA_STEP_MINUTES);
        let fallback = year_step(imbalance, year, DEFAULT_BALANCING_STEP_MINUTES);

        let mut total = 0.0;
        let mut overlapping = false;
        for day in imbalance.days_in_year(year).values() {
            let spreads: Vec<f64> = day
                .iter()
                .filter_map(|s| {
                    day_ahead
                        .value_covering(s.timestamp, da_step)
                        .map(|da| (s.value - da).abs())
                })
                .collect();
            if spreads.is_empty() {
                continue;
            }
            overlapping = true;
            let step = dominant_step(day.iter().map(|s| s.timestamp)).unwrap_or(fallback);
            total += best_n_sum(&spreads, intervals_for(duration, step)) * step_hours(step);
        }

        overlapping.then(|| total * self.dispatch_factor())
    }

    /// Gap recorded for a year without imbalance revenue: the publication
    /// stop when the whole year lies after it, plain missing data otherwise.
    pub fn imbalance_gap(&self, year: i32) -> DataGap {
        let end = self.assumptions.imbalance_publication_end;
        if year > end.year() {
            DataGap::ImbalanceUnpublished(end)
        } else {
            DataGap::ImbalanceUnavailable
        }
    }

    /// Every market for one year and duration. Missing inputs become a
    /// recorded gap with zero revenue; the other markets are unaffected.
    pub fn calculate_year(&self, data: &MarketData, year: i32, duration: StorageDuration) -> YearRevenue {
        let mut row = YearRevenue::new(year, duration);

        match &data.day_ahead {
            Some(da) if da.in_year(year).next().is_some() => {
                row.markets.day_ahead = self.arbitrage_revenue(da, year, duration);
                row.day_ahead_days = da.days_in_year(year).len();
            }
            _ => row.gaps.push(DataGap::NoDayAheadPrices),
        }

        for (product, table) in [
            (ReserveProduct::Afrr, &data.afrr),
            (ReserveProduct::Mfrr, &data.mfrr),
        ] {
            match table
                .as_ref()
                .and_then(|t| self.reserve_capacity_revenue(t, year, duration, product))
            {
                Some(revenue) => row.markets.set(product.market(), revenue),
                None => row.gaps.push(DataGap::NoReservePrices(product)),
            }
        }

        let (fcr, fcr_gap) = self.fcr_revenue(data.fcr.as_ref(), year, duration);
        row.markets.fcr = fcr;
        row.gaps.extend(fcr_gap);

        let imbalance = match (&data.day_ahead, &data.imbalance) {
            (Some(da), Some(table)) => self
                .imbalance_series(table, year)
                .and_then(|series| self.imbalance_revenue(da, &series, year, duration)),
            _ => None,
        };
        match imbalance {
            Some(revenue) => row.markets.imbalance = revenue,
            None => row.gaps.push(self.imbalance_gap(year)),
        }

        row.blended = blended_revenue(&row.markets, &self.assumptions.allocation);
        debug!(
            "{} {}: blended {:.0} EUR/MW/yr, gaps {:?}",
            year, duration, row.blended, row.gaps
        );
        row
    }

    /// The full year × duration grid. Rows come back in (year, duration)
    /// order regardless of scheduling.
    pub fn calculate_all(&self, data: &MarketData, years: &[i32]) -> RevenueTable {
        let jobs: Vec<(i32, StorageDuration)> = years
            .iter()
            .flat_map(|year| StorageDuration::ALL.iter().map(move |d| (*year, *d)))
            .collect();

        let rows: Vec<YearRevenue> = jobs
            .par_iter()
            .map(|(year, duration)| self.calculate_year(data, *year, *duration))
            .collect();

        for row in rows.iter().filter(|r| r.duration == StorageDuration::OneHour) {
            for gap in &row.gaps {
                if !matches!(gap, DataGap::FcrMarketNotLaunched) {
                    warn!("{}: {}", row.year, gap);
                }
            }
        }

        RevenueTable::new(rows)
    }

    /// Revenue of the single best market for a row, for comparison with the
    /// blended figure.
    pub fn best_single_market(&self, row: &YearRevenue) -> (Market, f64) {
        let market = row.best_single_market();
        (market, row.revenue(market))
    }
}
