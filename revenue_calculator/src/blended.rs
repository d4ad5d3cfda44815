use crate::assumptions::AllocationWeights;
use crate::models::{Market, MarketRevenues};
use serde::Serialize;

/// One market's share of a blended figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketContribution {
    pub market: Market,
    pub weight: f64,
    pub revenue: f64,
    pub contribution: f64,
}

/// Weighted sum of per-market revenues with the allocation vector.
pub fn blended_revenue(revenues: &MarketRevenues, weights: &AllocationWeights) -> f64 {
    Market::ALL
        .iter()
        .map(|m| weights.weight(*m) * revenues.get(*m))
        .sum()
}

/// Per-market breakdown of the blend, largest contribution first.
pub fn contributions(revenues: &MarketRevenues, weights: &AllocationWeights) -> Vec<MarketContribution> {
    let mut parts: Vec<MarketContribution> = Market::ALL
        .iter()
        .map(|m| {
            let weight = weights.weight(*m);
            let revenue = revenues.get(*m);
            MarketContribution {
                market: *m,
                weight,
                revenue,
                contribution: weight * revenue,
            }
        })
        .collect();
    parts.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    parts
}
