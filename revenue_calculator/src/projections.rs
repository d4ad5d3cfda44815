use crate::blended::blended_revenue;
use crate::calculator::RevenueCalculator;
use crate::models::{Market, MarketRevenues, ProjectedRevenue, RevenueTable, StorageDuration};
use log::{info, warn};

/// Forward revenue years after `base_year`, through the configured last
/// projection year.
///
/// Balancing capacity revenues are compressed with the balancing factor,
/// day-ahead and imbalance with the day-ahead factor. FCR follows the price
/// forecast. Imbalance is taken from the latest year that had any.
pub fn project(
    calculator: &RevenueCalculator,
    table: &RevenueTable,
    base_year: i32,
) -> Vec<ProjectedRevenue> {
    let assumptions = calculator.assumptions();
    let projection = &assumptions.projection;
    let mut projected = Vec::new();

    for duration in StorageDuration::ALL {
        let Some(base) = table.get(base_year, duration) else {
            warn!("No {} revenue row for base year {}", duration, base_year);
            continue;
        };
        let imbalance_base = table
            .latest_year_with(Market::Imbalance, duration)
            .and_then(|year| table.get(year, duration))
            .map(|row| row.markets.imbalance)
            .unwrap_or(0.0);

        for year in (base_year + 1)..=projection.last_year {
            let balancing = projection.balancing_factor(year);
            let day_ahead = projection.day_ahead_factor(year);
            let (fcr, _) = calculator.fcr_revenue(None, year, duration);

            let markets = MarketRevenues {
                day_ahead: base.markets.day_ahead * day_ahead,
                afrr: base.markets.afrr * balancing,
                fcr,
                mfrr: base.markets.mfrr * balancing,
                imbalance: imbalance_base * day_ahead,
            };
            projected.push(ProjectedRevenue {
                year,
                duration,
                blended: blended_revenue(&markets, &assumptions.allocation),
                markets,
                balancing_compression: balancing,
                day_ahead_compression: day_ahead,
            });
        }
    }

    projected.sort_by_key(|p| (p.year, p.duration));
    info!(
        "Projected {} scenarios from base year {} to {}",
        projected.len(),
        base_year,
        projection.last_year
    );
    projected
}

/// Day-ahead coverage a year needs before it can anchor a projection.
pub const MIN_BASE_YEAR_DAYS: usize = 360;

/// Latest year with day-ahead or reserve revenue, preferring years with a
/// full year of day-ahead prices so a partial current year is never scaled
/// forward as if it were annual.
pub fn default_base_year(table: &RevenueTable) -> Option<i32> {
    let earning: Vec<_> = table
        .rows
        .iter()
        .filter(|r| r.markets.day_ahead > 0.0 || r.markets.afrr > 0.0 || r.markets.mfrr > 0.0)
        .collect();
    let latest = earning.iter().map(|r| r.year).max();
    let full = earning
        .iter()
        .filter(|r| r.day_ahead_days >= MIN_BASE_YEAR_DAYS)
        .map(|r| r.year)
        .max();
    if full.is_none() && latest.is_some() {
        warn!("No year with full day-ahead coverage, projecting from a partial year");
    }
    full.or(latest)
}
