use crate::bess_visualization::Chart;
use crate::market_statistics::StatTable;
use crate::report::ReportContext;
use anyhow::{Context, Result};
use askama::Template;
use revenue_calculator::{Market, StorageDuration};
use std::fs;
use std::path::Path;

/// A table with every cell already formatted.
#[derive(Debug)]
pub struct HtmlTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl From<&StatTable> for HtmlTable {
    fn from(table: &StatTable) -> Self {
        Self {
            title: table.title.clone(),
            headers: table.headers.clone(),
            rows: table
                .rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct HeadlineCard {
    pub label: String,
    pub blended: String,
    pub best_market: String,
}

#[derive(Debug)]
pub struct Setting {
    pub name: String,
    pub value: String,
}

#[derive(Template)]
#[template(path = "report.html")]
pub struct ReportTemplate<'a> {
    pub title: String,
    pub generated_at: String,
    pub headline_year: String,
    pub headline: Vec<HeadlineCard>,
    pub charts: &'a [Chart],
    pub revenue_tables: Vec<HtmlTable>,
    pub statistics: Vec<HtmlTable>,
    pub gaps: Vec<String>,
    pub settings: Vec<Setting>,
}

fn eur(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn pct(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.0}%")).unwrap_or_else(|| "n/a".to_string())
}

fn revenue_table(ctx: &ReportContext) -> HtmlTable {
    let mut headers = vec!["Year".to_string(), "Duration".to_string()];
    headers.extend(Market::ALL.iter().map(|m| m.label().to_string()));
    headers.push("Blended".to_string());
    HtmlTable {
        title: "Historical Revenue (EUR/MW/yr)".to_string(),
        headers,
        rows: ctx
            .revenues
            .rows
            .iter()
            .map(|r| {
                let mut row = vec![r.year.to_string(), r.duration.label().to_string()];
                row.extend(Market::ALL.iter().map(|m| eur(r.revenue(*m))));
                row.push(eur(r.blended));
                row
            })
            .collect(),
    }
}

fn projection_table(ctx: &ReportContext) -> HtmlTable {
    let mut headers = vec!["Year".to_string(), "Duration".to_string()];
    headers.extend(Market::ALL.iter().map(|m| m.label().to_string()));
    headers.extend(["Blended".to_string(), "Balancing factor".to_string()]);
    HtmlTable {
        title: "Projected Revenue (EUR/MW/yr)".to_string(),
        headers,
        rows: ctx
            .projected
            .iter()
            .map(|p| {
                let mut row = vec![p.year.to_string(), p.duration.label().to_string()];
                row.extend(Market::ALL.iter().map(|m| eur(p.markets.get(*m))));
                row.push(eur(p.blended));
                row.push(format!("{:.2}", p.balancing_compression));
                row
            })
            .collect(),
    }
}

fn saturation_table(ctx: &ReportContext) -> HtmlTable {
    HtmlTable {
        title: "BESS Saturation".to_string(),
        headers: ["Year", "Scenario", "BESS (MW)", "vs aFRR up", "vs balancing", "vs peak load"]
            .map(String::from)
            .to_vec(),
        rows: ctx
            .saturation
            .iter()
            .map(|r| {
                vec![
                    r.year.to_string(),
                    r.scenario.to_string(),
                    eur(r.bess_mw),
                    pct(r.vs_afrr_up_pct),
                    pct(r.vs_balancing_pct),
                    pct(r.vs_peak_load_pct),
                ]
            })
            .collect(),
    }
}

pub fn render_html(ctx: &ReportContext, charts: &[Chart]) -> Result<String> {
    let latest = ctx.revenues.years().into_iter().max();
    let headline: Vec<HeadlineCard> = latest
        .map(|year| {
            StorageDuration::ALL
                .iter()
                .filter_map(|d| ctx.revenues.get(year, *d))
                .map(|r| HeadlineCard {
                    label: r.duration.to_string(),
                    blended: eur(r.blended),
                    best_market: r.best_single_market().label().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut gaps: Vec<String> = ctx
        .revenues
        .rows
        .iter()
        .filter(|r| r.duration == StorageDuration::OneHour)
        .flat_map(|r| r.gaps.iter().map(move |g| format!("{}: {}", r.year, g)))
        .collect();
    gaps.dedup();

    let a = &ctx.assumptions;
    let mut settings = vec![
        Setting {
            name: "Round-trip efficiency".to_string(),
            value: format!("{:.0}%", a.round_trip_efficiency * 100.0),
        },
        Setting {
            name: "Capture rate".to_string(),
            value: format!("{:.0}%", a.capture_rate * 100.0),
        },
    ];
    settings.extend(Market::ALL.iter().map(|m| Setting {
        name: format!("Allocation {}", m.label()),
        value: format!("{:.0}%", a.allocation.weight(*m) * 100.0),
    }));
    if let Some(base) = ctx.base_year {
        settings.push(Setting {
            name: "Projection base year".to_string(),
            value: base.to_string(),
        });
    }

    let template = ReportTemplate {
        title: "Lithuania BESS Revenue Analysis".to_string(),
        generated_at: ctx.generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        headline_year: latest.map(|y| y.to_string()).unwrap_or_default(),
        headline,
        charts,
        revenue_tables: vec![revenue_table(ctx), projection_table(ctx), saturation_table(ctx)],
        statistics: ctx
            .statistics
            .tables()
            .into_iter()
            .filter(|t| !t.is_empty())
            .map(HtmlTable::from)
            .collect(),
        gaps,
        settings,
    };
    Ok(template.render()?)
}

pub fn write_html_report(ctx: &ReportContext, charts: &[Chart], path: &Path) -> Result<()> {
    let html = render_html(ctx, charts)?;
    fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
