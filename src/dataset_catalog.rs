use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

pub const ENTSOE_API_URL: &str = "https://web-api.tp.entsoe.eu/api";

/// Bidding zones and control areas the pipeline requests data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Lithuania,
    Sweden4,
    Poland,
    Latvia,
}

impl Area {
    pub const NEIGHBOURS: [Area; 3] = [Area::Sweden4, Area::Poland, Area::Latvia];

    /// Energy Identification Code used in API queries.
    pub fn eic(self) -> &'static str {
        match self {
            Area::Lithuania => "10YLT-1001A0008Q",
            Area::Sweden4 => "10Y1001A1001A47J",
            Area::Poland => "10YPL-AREA-----S",
            Area::Latvia => "10YLV-1001A00074",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Area::Lithuania => "LT",
            Area::Sweden4 => "SE_4",
            Area::Poland => "PL",
            Area::Latvia => "LV",
        }
    }
}

/// How the value columns of a dataset are named when a document is flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnScheme {
    /// One value per point under a fixed name.
    Single(&'static str),
    /// One column per production type (`wind_onshore`, `solar`, ...).
    PsrType,
    /// `long` / `short` from the imbalance price category.
    ImbalanceCategory,
    /// `up_price`, `down_price`, `up_quantity`, `down_quantity`.
    ReserveDirection,
    /// `up_<suffix>` / `down_<suffix>` from the flow direction.
    Direction(&'static str),
}

/// Request window size. Balancing documents are limited in length by the
/// platform, so they are requested per quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunking {
    Year,
    Quarter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<(&'static str, &'static str)>,
    pub columns: ColumnScheme,
    pub chunking: Chunking,
}

impl DatasetSpec {
    fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<(&'static str, &'static str)>,
        columns: ColumnScheme,
        chunking: Chunking,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            columns,
            chunking,
        }
    }

    /// Query string pairs for one request window, token included.
    pub fn query(&self, api_key: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        query.push(("periodStart".to_string(), period_param(start)));
        query.push(("periodEnd".to_string(), period_param(end)));
        query.push(("securityToken".to_string(), api_key.to_string()));
        query
    }

    /// Split `[start, end)` into request windows aligned to calendar years
    /// or quarters.
    pub fn request_windows(&self, start: NaiveDate, end: NaiveDate) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let mut windows = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let boundary = match self.chunking {
                Chunking::Year => NaiveDate::from_ymd_opt(cursor.year() + 1, 1, 1),
                Chunking::Quarter => {
                    let next_quarter_month = ((cursor.month0() / 3) + 1) * 3 + 1;
                    if next_quarter_month > 12 {
                        NaiveDate::from_ymd_opt(cursor.year() + 1, 1, 1)
                    } else {
                        NaiveDate::from_ymd_opt(cursor.year(), next_quarter_month, 1)
                    }
                }
            };
            let Some(boundary) = boundary else { break };
            let window_end = boundary.min(end);
            windows.push((midnight(cursor), midnight(window_end)));
            cursor = window_end;
        }
        windows
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// `yyyyMMddHHmm` in UTC, the platform's period format.
pub fn period_param(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M").to_string()
}

/// Every dataset the pipeline fetches for `area`.
pub fn catalog(area: Area) -> Vec<DatasetSpec> {
    let eic = area.eic();
    let mut specs = vec![
        DatasetSpec::new(
            "da_prices",
            "Day-ahead prices",
            vec![("documentType", "A44"), ("in_Domain", eic), ("out_Domain", eic)],
            ColumnScheme::Single("price"),
            Chunking::Year,
        ),
        DatasetSpec::new(
            "imbalance_prices",
            "Imbalance prices",
            vec![("documentType", "A85"), ("controlArea_Domain", eic)],
            ColumnScheme::ImbalanceCategory,
            Chunking::Year,
        ),
        DatasetSpec::new(
            "actual_load",
            "Actual total load",
            vec![
                ("documentType", "A65"),
                ("processType", "A16"),
                ("outBiddingZone_Domain", eic),
            ],
            ColumnScheme::Single("load_mw"),
            Chunking::Year,
        ),
        DatasetSpec::new(
            "generation_by_type",
            "Actual generation per production type",
            vec![("documentType", "A75"), ("processType", "A16"), ("in_Domain", eic)],
            ColumnScheme::PsrType,
            Chunking::Year,
        ),
        DatasetSpec::new(
            "installed_capacity",
            "Installed generation capacity per production type",
            vec![("documentType", "A68"), ("processType", "A33"), ("in_Domain", eic)],
            ColumnScheme::PsrType,
            Chunking::Year,
        ),
    ];

    for neighbour in Area::NEIGHBOURS {
        for (from, to) in [(neighbour, area), (area, neighbour)] {
            specs.push(DatasetSpec::new(
                format!("flow_{}_to_{}", from.code(), to.code()),
                format!("Physical flow {} -> {}", from.code(), to.code()),
                vec![
                    ("documentType", "A11"),
                    ("in_Domain", to.eic()),
                    ("out_Domain", from.eic()),
                ],
                ColumnScheme::Single("flow_mw"),
                Chunking::Year,
            ));
        }
    }

    specs.extend([
        DatasetSpec::new(
            "afrr_reserve_prices",
            "aFRR contracted reserve prices and volumes",
            vec![
                ("documentType", "A81"),
                ("businessType", "B95"),
                ("processType", "A47"),
                ("type_MarketAgreement.Type", "A01"),
                ("controlArea_Domain", eic),
            ],
            ColumnScheme::ReserveDirection,
            Chunking::Quarter,
        ),
        DatasetSpec::new(
            "mfrr_reserve_prices",
            "mFRR contracted reserve prices and volumes",
            vec![
                ("documentType", "A81"),
                ("businessType", "B95"),
                ("processType", "A51"),
                ("type_MarketAgreement.Type", "A01"),
                ("controlArea_Domain", eic),
            ],
            ColumnScheme::ReserveDirection,
            Chunking::Quarter,
        ),
        DatasetSpec::new(
            "activated_balancing_prices",
            "Prices of activated balancing energy",
            vec![
                ("documentType", "A84"),
                ("processType", "A16"),
                ("controlArea_Domain", eic),
            ],
            ColumnScheme::Direction("price"),
            Chunking::Quarter,
        ),
        DatasetSpec::new(
            "imbalance_volumes",
            "Total imbalance volumes",
            vec![("documentType", "A86"), ("controlArea_Domain", eic)],
            ColumnScheme::Direction("volume"),
            Chunking::Quarter,
        ),
    ]);

    specs
}

/// Subset of the catalog by dataset name, in catalog order. Unknown names
/// are returned separately.
pub fn select(area: Area, names: &[String]) -> (Vec<DatasetSpec>, Vec<String>) {
    let all = catalog(area);
    if names.is_empty() {
        return (all, Vec::new());
    }
    let unknown = names
        .iter()
        .filter(|n| !all.iter().any(|s| &s.name == *n))
        .cloned()
        .collect();
    let selected = all.into_iter().filter(|s| names.contains(&s.name)).collect();
    (selected, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> DatasetSpec {
        catalog(Area::Lithuania)
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    #[test]
    fn test_catalog_names_are_unique_and_complete() {
        let specs = catalog(Area::Lithuania);
        let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"flow_SE_4_to_LT"));
        assert!(names.contains(&"flow_LT_to_LV"));
        assert_eq!(specs.len(), 5 + 6 + 4);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn test_flow_direction_maps_to_domains() {
        let flow = spec("flow_PL_to_LT");
        assert!(flow.params.contains(&("out_Domain", "10YPL-AREA-----S")));
        assert!(flow.params.contains(&("in_Domain", "10YLT-1001A0008Q")));
    }

    #[test]
    fn test_query_carries_period_and_token() {
        let da = spec("da_prices");
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let query = da.query("secret", start, end);
        assert!(query.contains(&("documentType".to_string(), "A44".to_string())));
        assert!(query.contains(&("periodStart".to_string(), "202401010000".to_string())));
        assert!(query.contains(&("periodEnd".to_string(), "202501010000".to_string())));
        assert!(query.contains(&("securityToken".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_quarter_windows() {
        let afrr = spec("afrr_reserve_prices");
        let windows = afrr.request_windows(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 13).unwrap(),
        );
        let starts: Vec<String> = windows.iter().map(|(s, _)| s.format("%Y-%m-%d").to_string()).collect();
        assert_eq!(starts, vec!["2024-06-01", "2024-07-01", "2024-10-01", "2025-01-01"]);
        assert_eq!(windows.last().unwrap().1.format("%Y-%m-%d").to_string(), "2025-02-13");
    }

    #[test]
    fn test_year_windows() {
        let load = spec("actual_load");
        let windows = load.request_windows(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        );
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_select_reports_unknown_names() {
        let (selected, unknown) = select(
            Area::Lithuania,
            &["imbalance_prices".to_string(), "nope".to_string()],
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(unknown, vec!["nope".to_string()]);
    }
}
