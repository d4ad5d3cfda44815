use crate::dataset_catalog::ColumnScheme;
use chrono::{DateTime, Duration, Months, NaiveDateTime, Utc};
use revenue_calculator::SeriesTable;
use serde::de::IgnoredAny;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("unsupported resolution {0}")]
    Resolution(String),

    #[error("bad time interval {0}")]
    Interval(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// A flattened document: one table plus the points dropped as duplicates.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub table: SeriesTable,
    pub duplicates: usize,
}

#[derive(Debug, Deserialize)]
struct MarketDocument {
    #[serde(rename = "TimeSeries", default)]
    time_series: Vec<XmlTimeSeries>,
}

#[derive(Debug, Deserialize)]
struct Acknowledgement {
    #[serde(rename = "Reason", default)]
    reasons: Vec<Reason>,
}

#[derive(Debug, Deserialize)]
struct Reason {
    #[serde(default)]
    code: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct XmlTimeSeries {
    #[serde(rename = "curveType", default)]
    curve_type: Option<String>,
    #[serde(rename = "MktPSRType", default)]
    psr: Option<MktPsrType>,
    #[serde(rename = "flowDirection.direction", default)]
    flow_direction: Option<String>,
    #[serde(rename = "outBiddingZone_Domain.mRID", default)]
    out_bidding_zone: Option<IgnoredAny>,
    #[serde(rename = "Period", default)]
    periods: Vec<XmlPeriod>,
}

#[derive(Debug, Deserialize)]
struct MktPsrType {
    #[serde(rename = "psrType")]
    psr_type: String,
}

#[derive(Debug, Deserialize)]
struct XmlPeriod {
    #[serde(rename = "timeInterval")]
    interval: TimeInterval,
    resolution: String,
    #[serde(rename = "Point", default)]
    points: Vec<XmlPoint>,
}

#[derive(Debug, Deserialize)]
struct TimeInterval {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct XmlPoint {
    position: u32,
    #[serde(rename = "price.amount", default)]
    price: Option<f64>,
    #[serde(rename = "imbalance_Price.amount", default)]
    imbalance_price: Option<f64>,
    #[serde(rename = "imbalance_Price.category", default)]
    imbalance_category: Option<String>,
    #[serde(rename = "procurement_Price.amount", default)]
    procurement_price: Option<f64>,
    #[serde(rename = "activation_Price.amount", default)]
    activation_price: Option<f64>,
    #[serde(default)]
    quantity: Option<f64>,
}

impl XmlPoint {
    fn amount(&self) -> Option<f64> {
        self.price
            .or(self.imbalance_price)
            .or(self.activation_price)
            .or(self.procurement_price)
            .or(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resolution {
    Fixed(Duration),
    Years(u32),
}

impl Resolution {
    fn parse(raw: &str) -> Result<Self, DocumentError> {
        let resolution = match raw.trim() {
            "PT15M" => Resolution::Fixed(Duration::minutes(15)),
            "PT30M" => Resolution::Fixed(Duration::minutes(30)),
            "PT60M" | "PT1H" => Resolution::Fixed(Duration::hours(1)),
            "P1D" => Resolution::Fixed(Duration::days(1)),
            "P7D" => Resolution::Fixed(Duration::days(7)),
            "P1Y" => Resolution::Years(1),
            other => return Err(DocumentError::Resolution(other.to_string())),
        };
        Ok(resolution)
    }

    /// Start of the slot at zero-based `index`.
    fn slot_start(self, start: DateTime<Utc>, index: u32) -> Option<DateTime<Utc>> {
        match self {
            Resolution::Fixed(step) => Some(start + step * i32::try_from(index).ok()?),
            Resolution::Years(years) => start.checked_add_months(Months::new(12 * years * index)),
        }
    }

    fn slot_count(self, start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
        match self {
            Resolution::Fixed(step) => {
                let secs = step.num_seconds().max(1);
                u32::try_from((end - start).num_seconds() / secs).unwrap_or(0)
            }
            Resolution::Years(_) => 1,
        }
    }
}

fn parse_interval_time(raw: &str) -> Result<DateTime<Utc>, DocumentError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .map(|ts| ts.and_utc())
        .map_err(|_| DocumentError::Interval(raw.to_string()))
}

/// Column-friendly name of a production type code.
pub fn psr_type_name(code: &str) -> String {
    let name = match code {
        "A03" => "mixed",
        "A04" => "generation",
        "A05" => "load",
        "B01" => "biomass",
        "B02" => "fossil_brown_coal",
        "B03" => "fossil_coal_gas",
        "B04" => "fossil_gas",
        "B05" => "fossil_hard_coal",
        "B06" => "fossil_oil",
        "B07" => "fossil_oil_shale",
        "B08" => "fossil_peat",
        "B09" => "geothermal",
        "B10" => "hydro_pumped_storage",
        "B11" => "hydro_run_of_river",
        "B12" => "hydro_water_reservoir",
        "B13" => "marine",
        "B14" => "nuclear",
        "B15" => "other_renewable",
        "B16" => "solar",
        "B17" => "waste",
        "B18" => "wind_offshore",
        "B19" => "wind_onshore",
        "B20" => "other",
        "B25" => "energy_storage",
        other => return other.to_lowercase(),
    };
    name.to_string()
}

fn direction_name(code: Option<&str>) -> &'static str {
    match code {
        Some("A01") => "up",
        Some("A02") => "down",
        Some("A03") => "symmetric",
        _ => "total",
    }
}

/// Target columns of one point.
fn columns_for(scheme: ColumnScheme, series: &XmlTimeSeries, point: &XmlPoint) -> Vec<(String, Option<f64>)> {
    match scheme {
        ColumnScheme::Single(name) => vec![(name.to_string(), point.amount())],
        ColumnScheme::PsrType => {
            let mut name = series
                .psr
                .as_ref()
                .map(|p| psr_type_name(&p.psr_type))
                .unwrap_or_else(|| "total".to_string());
            if series.out_bidding_zone.is_some() {
                name.push_str("_consumption");
            }
            vec![(name, point.amount())]
        }
        ColumnScheme::ImbalanceCategory => {
            let amount = point.imbalance_price.or(point.price);
            match point.imbalance_category.as_deref() {
                Some("A04") => vec![("long".to_string(), amount)],
                Some("A05") => vec![("short".to_string(), amount)],
                // single price for both directions
                _ => vec![("long".to_string(), amount), ("short".to_string(), amount)],
            }
        }
        ColumnScheme::ReserveDirection => {
            let direction = direction_name(series.flow_direction.as_deref());
            vec![
                (format!("{direction}_price"), point.procurement_price.or(point.price)),
                (format!("{direction}_quantity"), point.quantity),
            ]
        }
        ColumnScheme::Direction(suffix) => {
            let direction = direction_name(series.flow_direction.as_deref());
            vec![(format!("{direction}_{suffix}"), point.amount())]
        }
    }
}

fn is_acknowledgement(xml: &str) -> bool {
    xml.contains("Acknowledgement_MarketDocument")
}

/// Flatten an API response into a timestamp-keyed table.
///
/// An acknowledgement reporting that no data matches the query is an empty
/// document; any other acknowledgement is a rejection.
pub fn parse_document(xml: &str, scheme: ColumnScheme) -> Result<ParsedDocument, DocumentError> {
    if is_acknowledgement(xml) {
        let ack: Acknowledgement = quick_xml::de::from_str(xml)?;
        let no_data = ack
            .reasons
            .iter()
            .any(|r| r.code == "999" || r.text.to_lowercase().contains("no matching data"));
        if no_data || ack.reasons.is_empty() {
            return Ok(ParsedDocument::default());
        }
        let reason = ack
            .reasons
            .iter()
            .map(|r| format!("{} {}", r.code, r.text))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DocumentError::Rejected(reason));
    }

    let document: MarketDocument = quick_xml::de::from_str(xml)?;
    let mut parsed = ParsedDocument::default();

    for series in &document.time_series {
        let forward_fill = series.curve_type.as_deref() == Some("A03");
        for period in &series.periods {
            let resolution = Resolution::parse(&period.resolution)?;
            let start = parse_interval_time(&period.interval.start)?;
            let end = parse_interval_time(&period.interval.end)?;

            let mut points: Vec<&XmlPoint> = period.points.iter().filter(|p| p.position > 0).collect();
            points.sort_by_key(|p| p.position);

            for (i, point) in points.iter().enumerate() {
                let last_slot = if forward_fill {
                    points
                        .get(i + 1)
                        .map(|next| next.position - 1)
                        .unwrap_or_else(|| resolution.slot_count(start, end).max(point.position))
                } else {
                    point.position
                };

                for position in point.position..=last_slot {
                    let Some(timestamp) = resolution.slot_start(start, position - 1) else {
                        continue;
                    };
                    for (column, value) in columns_for(scheme, series, point) {
                        if let Some(value) = value.filter(|v| v.is_finite()) {
                            if !parsed.table.insert(timestamp, &column, value) {
                                parsed.duplicates += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DA_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Publication_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-3:publicationdocument:7:3">
  <mRID>abc</mRID>
  <TimeSeries>
    <mRID>1</mRID>
    <businessType>A62</businessType>
    <in_Domain.mRID codingScheme="A01">10YLT-1001A0008Q</in_Domain.mRID>
    <curveType>A03</curveType>
    <Period>
      <timeInterval>
        <start>2024-01-01T00:00Z</start>
        <end>2024-01-01T04:00Z</end>
      </timeInterval>
      <resolution>PT60M</resolution>
      <Point><position>1</position><price.amount>40.5</price.amount></Point>
      <Point><position>3</position><price.amount>70</price.amount></Point>
    </Period>
  </TimeSeries>
</Publication_MarketDocument>"#;

    const RESERVE_DOC: &str = r#"<Balancing_MarketDocument>
  <TimeSeries>
    <flowDirection.direction>A01</flowDirection.direction>
    <Period>
      <timeInterval><start>2025-03-01T00:00Z</start><end>2025-03-01T00:30Z</end></timeInterval>
      <resolution>PT15M</resolution>
      <Point><position>1</position><quantity>120</quantity><procurement_Price.amount>11.2</procurement_Price.amount></Point>
      <Point><position>2</position><quantity>118</quantity><procurement_Price.amount>9.8</procurement_Price.amount></Point>
    </Period>
  </TimeSeries>
  <TimeSeries>
    <flowDirection.direction>A02</flowDirection.direction>
    <Period>
      <timeInterval><start>2025-03-01T00:00Z</start><end>2025-03-01T00:30Z</end></timeInterval>
      <resolution>PT15M</resolution>
      <Point><position>1</position><quantity>90</quantity><procurement_Price.amount>4.1</procurement_Price.amount></Point>
    </Period>
  </TimeSeries>
</Balancing_MarketDocument>"#;

    const IMBALANCE_DOC: &str = r#"<Balancing_MarketDocument>
  <TimeSeries>
    <Period>
      <timeInterval><start>2024-02-01T00:00Z</start><end>2024-02-01T00:15Z</end></timeInterval>
      <resolution>PT15M</resolution>
      <Point>
        <position>1</position>
        <imbalance_Price.amount>120.5</imbalance_Price.amount>
        <imbalance_Price.category>A05</imbalance_Price.category>
      </Point>
    </Period>
  </TimeSeries>
  <TimeSeries>
    <Period>
      <timeInterval><start>2024-02-01T00:00Z</start><end>2024-02-01T00:15Z</end></timeInterval>
      <resolution>PT15M</resolution>
      <Point>
        <position>1</position>
        <imbalance_Price.amount>35</imbalance_Price.amount>
        <imbalance_Price.category>A04</imbalance_Price.category>
      </Point>
    </Period>
  </TimeSeries>
</Balancing_MarketDocument>"#;

    const GENERATION_DOC: &str = r#"<GL_MarketDocument>
  <TimeSeries>
    <inBiddingZone_Domain.mRID codingScheme="A01">10YLT-1001A0008Q</inBiddingZone_Domain.mRID>
    <MktPSRType><psrType>B19</psrType></MktPSRType>
    <Period>
      <timeInterval><start>2024-06-01T00:00Z</start><end>2024-06-01T01:00Z</end></timeInterval>
      <resolution>PT60M</resolution>
      <Point><position>1</position><quantity>350</quantity></Point>
    </Period>
  </TimeSeries>
  <TimeSeries>
    <outBiddingZone_Domain.mRID codingScheme="A01">10YLT-1001A0008Q</outBiddingZone_Domain.mRID>
    <MktPSRType><psrType>B10</psrType></MktPSRType>
    <Period>
      <timeInterval><start>2024-06-01T00:00Z</start><end>2024-06-01T01:00Z</end></timeInterval>
      <resolution>PT60M</resolution>
      <Point><position>1</position><quantity>80</quantity></Point>
    </Period>
  </TimeSeries>
</GL_MarketDocument>"#;

    const NO_DATA_ACK: &str = r#"<Acknowledgement_MarketDocument>
  <mRID>x</mRID>
  <Reason>
    <code>999</code>
    <text>No matching data found for Data item Imbalance Prices [17.1.G]</text>
  </Reason>
</Acknowledgement_MarketDocument>"#;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_a03_curve_forward_fills_omitted_positions() {
        let parsed = parse_document(DA_DOC, ColumnScheme::Single("price")).unwrap();
        let prices = parsed.table.column("price").unwrap();
        let values: Vec<(DateTime<Utc>, f64)> =
            prices.samples().iter().map(|s| (s.timestamp, s.value)).collect();
        assert_eq!(
            values,
            vec![(hour(0), 40.5), (hour(1), 40.5), (hour(2), 70.0), (hour(3), 70.0)]
        );
    }

    #[test]
    fn test_reserve_directions_become_columns() {
        let parsed = parse_document(RESERVE_DOC, ColumnScheme::ReserveDirection).unwrap();
        let table = parsed.table;
        assert!(table.has_column("up_price"));
        assert!(table.has_column("down_quantity"));
        assert_eq!(table.column("up_price").unwrap().len(), 2);
        assert_eq!(table.column("down_price").unwrap().samples()[0].value, 4.1);
    }

    #[test]
    fn test_imbalance_categories() {
        let parsed = parse_document(IMBALANCE_DOC, ColumnScheme::ImbalanceCategory).unwrap();
        assert_eq!(parsed.table.column("short").unwrap().samples()[0].value, 120.5);
        assert_eq!(parsed.table.column("long").unwrap().samples()[0].value, 35.0);
    }

    #[test]
    fn test_generation_psr_types_and_consumption() {
        let parsed = parse_document(GENERATION_DOC, ColumnScheme::PsrType).unwrap();
        assert!(parsed.table.has_column("wind_onshore"));
        assert!(parsed.table.has_column("hydro_pumped_storage_consumption"));
    }

    #[test]
    fn test_no_data_acknowledgement_is_empty() {
        let parsed = parse_document(NO_DATA_ACK, ColumnScheme::ImbalanceCategory).unwrap();
        assert!(parsed.table.is_empty());
    }

    #[test]
    fn test_other_acknowledgement_is_rejected() {
        let ack = r#"<Acknowledgement_MarketDocument><Reason><code>A59</code><text>Invalid query</text></Reason></Acknowledgement_MarketDocument>"#;
        assert!(matches!(
            parse_document(ack, ColumnScheme::Single("price")),
            Err(DocumentError::Rejected(_))
        ));
    }

    #[test]
    fn test_duplicates_keep_first_value() {
        let doubled = DA_DOC.replace(
            "</TimeSeries>\n</Publication",
            "</TimeSeries>\n<TimeSeries><Period><timeInterval><start>2024-01-01T00:00Z</start><end>2024-01-01T01:00Z</end></timeInterval><resolution>PT60M</resolution><Point><position>1</position><price.amount>99</price.amount></Point></Period></TimeSeries>\n</Publication",
        );
        let parsed = parse_document(&doubled, ColumnScheme::Single("price")).unwrap();
        assert_eq!(parsed.duplicates, 1);
        assert_eq!(parsed.table.column("price").unwrap().samples()[0].value, 40.5);
    }

    #[test]
    fn test_unknown_resolution_is_an_error() {
        let odd = DA_DOC.replace("PT60M", "PT5S");
        assert!(matches!(
            parse_document(&odd, ColumnScheme::Single("price")),
            Err(DocumentError::Resolution(_))
        ));
    }
}
