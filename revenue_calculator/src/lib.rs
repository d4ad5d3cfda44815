pub mod assumptions;
pub mod blended;
pub mod calculator;
pub mod capacity;
pub mod data_loader;
pub mod models;
pub mod projections;
pub mod series;

pub use assumptions::{AllocationWeights, AssumptionsError, AvailabilityCurve, RevenueAssumptions};
pub use calculator::RevenueCalculator;
pub use capacity::{CapacityTables, ProcurementVolumes, SaturationRow, Scenario};
pub use data_loader::{DataLoader, LoadReport, MarketData};
pub use models::{
    DataGap, Market, MarketRevenues, ProjectedRevenue, ReserveProduct, RevenueTable,
    StorageDuration, YearRevenue,
};
pub use series::{Sample, SeriesTable, TimeSeries};
