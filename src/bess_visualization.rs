use crate::market_statistics::{Cell, MarketStatistics, StatTable};
use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use revenue_calculator::{
    Market, ProjectedRevenue, RevenueTable, SaturationRow, Scenario, StorageDuration,
};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

const SIZE: (u32, u32) = (960, 480);

/// One rendered chart as an SVG document.
#[derive(Debug, Clone)]
pub struct Chart {
    pub name: String,
    pub title: String,
    pub svg: String,
}

fn market_color(market: Market) -> RGBColor {
    match market {
        Market::DayAheadArbitrage => RGBColor(31, 119, 180),
        Market::Afrr => RGBColor(255, 127, 14),
        Market::Fcr => RGBColor(44, 160, 44),
        Market::Mfrr => RGBColor(214, 39, 40),
        Market::Imbalance => RGBColor(148, 103, 189),
    }
}

fn series_color(i: usize) -> RGBAColor {
    Palette99::pick(i).to_rgba()
}

/// Padded value range that always includes zero.
fn value_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let max = if max <= 0.0 { 1.0 } else { max * 1.1 };
    let min = if min < 0.0 { min * 1.1 } else { 0.0 };
    min..max
}

fn render(draw: impl FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }
    Ok(svg)
}

/// Draw labelled lines over a categorical x axis.
fn category_lines(
    caption: &str,
    y_desc: &str,
    labels: &[String],
    lines: &[(String, Vec<Option<f64>>)],
) -> Result<String> {
    let range = value_range(lines.iter().flat_map(|(_, v)| v.iter().flatten().copied()));
    let x_max = labels.len().max(1) as f64 - 0.5;
    render(|root| {
        let mut chart = ChartBuilder::on(root)
            .caption(caption, ("sans-serif", 24).into_font())
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(-0.5..x_max, range)?;

        chart
            .configure_mesh()
            .y_desc(y_desc)
            .x_labels(labels.len().min(24))
            .x_label_formatter(&|x| {
                let idx = x.round();
                if (x - idx).abs() > 0.01 || idx < 0.0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .draw()?;

        for (i, (name, values)) in lines.iter().enumerate() {
            let color = series_color(i);
            let points: Vec<(f64, f64)> = values
                .iter()
                .enumerate()
                .filter_map(|(x, v)| v.map(|v| (x as f64, v)))
                .collect();
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                .label(name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color.stroke_width(2)));
        }

        if lines.len() > 1 {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }
        Ok(())
    })
}

fn year_label(cell: Option<&Cell>) -> String {
    cell.map(|c| c.to_string()).unwrap_or_default()
}

/// Monthly mean day-ahead price.
pub fn monthly_price_chart(monthly: &StatTable) -> Result<Option<Chart>> {
    if monthly.is_empty() {
        return Ok(None);
    }
    let labels: Vec<String> = monthly
        .rows
        .iter()
        .map(|r| match (r.first(), r.get(1)) {
            (Some(Cell::Int(y)), Some(Cell::Int(m))) => format!("{y}-{m:02}"),
            _ => String::new(),
        })
        .collect();
    let title = "Day-Ahead Price, Monthly Mean".to_string();
    let svg = category_lines(
        &title,
        "EUR/MWh",
        &labels,
        &[("Mean".to_string(), monthly.column("Mean (EUR/MWh)"))],
    )?;
    Ok(Some(Chart {
        name: "da_monthly_price".to_string(),
        title,
        svg,
    }))
}

/// Mean price by hour of day, one line per year.
pub fn hourly_profile_chart(profile: &StatTable) -> Result<Option<Chart>> {
    if profile.is_empty() {
        return Ok(None);
    }
    let labels: Vec<String> = profile.headers.iter().skip(1).cloned().collect();
    let lines: Vec<(String, Vec<Option<f64>>)> = profile
        .rows
        .iter()
        .map(|r| {
            (
                year_label(r.first()),
                r.iter().skip(1).map(Cell::as_f64).collect(),
            )
        })
        .collect();
    let title = "Day-Ahead Hourly Price Profile (UTC)".to_string();
    let svg = category_lines(&title, "EUR/MWh", &labels, &lines)?;
    Ok(Some(Chart {
        name: "da_hourly_profile".to_string(),
        title,
        svg,
    }))
}

/// Stacked market revenues per year for one duration, projections included.
pub fn revenue_stack_chart(
    table: &RevenueTable,
    projected: &[ProjectedRevenue],
    duration: StorageDuration,
) -> Result<Option<Chart>> {
    let columns: Vec<(String, [f64; 5])> = table
        .rows
        .iter()
        .filter(|r| r.duration == duration)
        .map(|r| (r.year.to_string(), Market::ALL.map(|m| r.revenue(m))))
        .chain(
            projected
                .iter()
                .filter(|p| p.duration == duration)
                .map(|p| (format!("{}P", p.year), Market::ALL.map(|m| p.markets.get(m)))),
        )
        .collect();
    if columns.is_empty() {
        return Ok(None);
    }

    let range = value_range(columns.iter().map(|(_, v)| v.iter().sum::<f64>() / 1000.0));
    let labels: Vec<String> = columns.iter().map(|(l, _)| l.clone()).collect();
    let title = format!("Revenue by Market, {duration}");
    let caption = title.clone();

    let svg = render(|root| {
        let mut chart = ChartBuilder::on(root)
            .caption(&caption, ("sans-serif", 24).into_font())
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(-0.5..(labels.len() as f64 - 0.5), range)?;

        chart
            .configure_mesh()
            .y_desc("kEUR/MW/yr")
            .x_labels(labels.len())
            .x_label_formatter(&|x| {
                let idx = x.round();
                if (x - idx).abs() > 0.01 || idx < 0.0 {
                    return String::new();
                }
                labels.get(idx as usize).cloned().unwrap_or_default()
            })
            .draw()?;

        for (m, market) in Market::ALL.into_iter().enumerate() {
            let color = market_color(market);
            chart
                .draw_series(columns.iter().enumerate().map(|(i, (_, values))| {
                    let base: f64 = values[..m].iter().sum::<f64>() / 1000.0;
                    let top = base + values[m] / 1000.0;
                    let x = i as f64;
                    Rectangle::new([(x - 0.35, base), (x + 0.35, top)], color.filled())
                }))?
                .label(market.label())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        Ok(())
    })?;

    Ok(Some(Chart {
        name: format!("revenue_stack_{}", duration.label()),
        title,
        svg,
    }))
}

/// Blended revenue per duration across historical and projected years.
pub fn blended_revenue_chart(table: &RevenueTable, projected: &[ProjectedRevenue]) -> Result<Option<Chart>> {
    let mut years: Vec<i32> = table
        .rows
        .iter()
        .map(|r| r.year)
        .chain(projected.iter().map(|p| p.year))
        .collect();
    years.sort_unstable();
    years.dedup();
    if years.is_empty() {
        return Ok(None);
    }

    let lines: Vec<(String, Vec<Option<f64>>)> = StorageDuration::ALL
        .iter()
        .map(|d| {
            let values = years
                .iter()
                .map(|y| {
                    table
                        .get(*y, *d)
                        .map(|r| r.blended)
                        .or_else(|| {
                            projected
                                .iter()
                                .find(|p| p.year == *y && p.duration == *d)
                                .map(|p| p.blended)
                        })
                        .map(|v| v / 1000.0)
                })
                .collect();
            (d.to_string(), values)
        })
        .collect();
    let labels: Vec<String> = years.iter().map(|y| y.to_string()).collect();
    let title = "Blended Multi-Market Revenue".to_string();
    let svg = category_lines(&title, "kEUR/MW/yr", &labels, &lines)?;
    Ok(Some(Chart {
        name: "blended_revenue".to_string(),
        title,
        svg,
    }))
}

/// Pipeline fleet relative to the total balancing requirement.
pub fn saturation_chart(rows: &[SaturationRow]) -> Result<Option<Chart>> {
    let mut years: Vec<i32> = rows.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();
    if years.is_empty() {
        return Ok(None);
    }
    let mut lines: Vec<(String, Vec<Option<f64>>)> = Scenario::ALL
        .iter()
        .map(|s| {
            let values = years
                .iter()
                .map(|y| {
                    rows.iter()
                        .find(|r| r.year == *y && r.scenario == *s)
                        .and_then(|r| r.vs_balancing_pct)
                })
                .collect();
            (format!("{s} scenario"), values)
        })
        .collect();
    lines.push(("Requirement".to_string(), vec![Some(100.0); years.len()]));

    let labels: Vec<String> = years.iter().map(|y| y.to_string()).collect();
    let title = "BESS Fleet vs Balancing Requirement".to_string();
    let svg = category_lines(&title, "% of requirement", &labels, &lines)?;
    Ok(Some(Chart {
        name: "bess_saturation".to_string(),
        title,
        svg,
    }))
}

/// Monthly mean load.
pub fn load_chart(monthly: &StatTable) -> Result<Option<Chart>> {
    if monthly.is_empty() {
        return Ok(None);
    }
    let labels: Vec<String> = monthly
        .rows
        .iter()
        .map(|r| match (r.first(), r.get(1)) {
            (Some(Cell::Int(y)), Some(Cell::Int(m))) => format!("{y}-{m:02}"),
            _ => String::new(),
        })
        .collect();
    let title = "Electricity Load, Monthly".to_string();
    let svg = category_lines(
        &title,
        "MW",
        &labels,
        &[
            ("Mean".to_string(), monthly.column("Mean (MW)")),
            ("Peak".to_string(), monthly.column("Peak (MW)")),
        ],
    )?;
    Ok(Some(Chart {
        name: "load_monthly".to_string(),
        title,
        svg,
    }))
}

/// Every chart the report embeds, skipping those without data.
pub fn render_charts(
    stats: &MarketStatistics,
    table: &RevenueTable,
    projected: &[ProjectedRevenue],
    saturation: &[SaturationRow],
) -> Result<Vec<Chart>> {
    println!("📊 Generating BESS Revenue Visualizations");
    let mut charts = Vec::new();
    charts.extend(blended_revenue_chart(table, projected)?);
    for duration in StorageDuration::ALL {
        charts.extend(revenue_stack_chart(table, projected, duration)?);
    }
    charts.extend(monthly_price_chart(&stats.da_monthly)?);
    charts.extend(hourly_profile_chart(&stats.hourly_profile)?);
    charts.extend(load_chart(&stats.load_monthly)?);
    charts.extend(saturation_chart(saturation)?);
    println!("  ✅ Rendered {} charts", charts.len());
    Ok(charts)
}

pub fn save_charts(charts: &[Chart], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    charts
        .iter()
        .map(|chart| {
            let path = dir.join(format!("{}.svg", chart.name));
            fs::write(&path, &chart.svg).with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use revenue_calculator::YearRevenue;
    use tempfile::TempDir;

    fn table() -> RevenueTable {
        let rows = [2023, 2024]
            .into_iter()
            .flat_map(|year| {
                StorageDuration::ALL.into_iter().map(move |d| {
                    let mut row = YearRevenue::new(year, d);
                    row.markets.set(Market::Afrr, 100_000.0);
                    row.markets.set(Market::DayAheadArbitrage, 20_000.0 * f64::from(d.hours()));
                    row.blended = 60_000.0;
                    row
                })
            })
            .collect();
        RevenueTable::new(rows)
    }

    #[test]
    fn test_value_range_includes_zero_and_headroom() {
        let r = value_range([5.0, 10.0]);
        assert_eq!(r.start, 0.0);
        assert!((r.end - 11.0).abs() < 1e-9);
        let r = value_range([-10.0, 10.0]);
        assert!(r.start < -10.0);
        let r = value_range(std::iter::empty());
        assert_eq!(r, 0.0..1.0);
    }

    #[test]
    fn test_revenue_stack_renders_svg() {
        let chart = revenue_stack_chart(&table(), &[], StorageDuration::TwoHour)
            .unwrap()
            .unwrap();
        assert!(chart.svg.starts_with("<svg"));
        assert!(chart.svg.contains("aFRR"));
        assert_eq!(chart.name, "revenue_stack_2h");
    }

    #[test]
    fn test_empty_inputs_render_no_chart() {
        assert!(blended_revenue_chart(&RevenueTable::default(), &[]).unwrap().is_none());
        assert!(saturation_chart(&[]).unwrap().is_none());
    }

    #[test]
    fn test_charts_are_saved_as_svg_files() {
        let dir = TempDir::new().unwrap();
        let chart = blended_revenue_chart(&table(), &[]).unwrap().unwrap();
        let paths = save_charts(&[chart], dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("blended_revenue.svg")]);
        assert!(fs::read_to_string(&paths[0]).unwrap().contains("</svg>"));
    }
}
