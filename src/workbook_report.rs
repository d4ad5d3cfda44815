use crate::market_statistics::{Cell, StatTable};
use crate::report::ReportContext;
use anyhow::{Context, Result};
use revenue_calculator::{Market, ReserveProduct, Scenario, StorageDuration};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet};
use std::path::Path;

/// Sheet names in workbook order.
pub const SHEETS: [&str; 9] = [
    "Installed Capacity",
    "ENTSO-E Raw Data",
    "BESS Revenue Analysis",
    "Balancing Data (API)",
    "Day-Ahead Prices",
    "Electricity Load",
    "Balancing & Ancillary",
    "BESS Saturation Analysis",
    "Market Overview",
];

struct Formats {
    title: Format,
    header: Format,
    integer: Format,
    decimal: Format,
    percent: Format,
    note: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            title: Format::new().set_bold().set_font_size(14),
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0xDCE6F1))
                .set_border(FormatBorder::Thin),
            integer: Format::new().set_num_format("#,##0"),
            decimal: Format::new().set_num_format("#,##0.00"),
            percent: Format::new().set_num_format("0.0%"),
            note: Format::new().set_italic().set_font_color(Color::RGB(0x7F7F7F)),
        }
    }
}

fn write_title(sheet: &mut Worksheet, row: u32, text: &str, f: &Formats) -> Result<u32> {
    sheet.write_string_with_format(row, 0, text, &f.title)?;
    Ok(row + 1)
}

fn write_headers(sheet: &mut Worksheet, row: u32, headers: &[&str], f: &Formats) -> Result<u32> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *header, &f.header)?;
    }
    Ok(row + 1)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell, f: &Formats) -> Result<()> {
    match cell {
        Cell::Int(v) => {
            sheet.write_number(row, col, *v as f64)?;
        }
        Cell::Float(v) => {
            sheet.write_number_with_format(row, col, *v, &f.decimal)?;
        }
        Cell::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
        Cell::Empty => {}
    }
    Ok(())
}

fn write_opt_percent(sheet: &mut Worksheet, row: u32, col: u16, pct: Option<f64>, f: &Formats) -> Result<()> {
    match pct {
        Some(p) => {
            sheet.write_number_with_format(row, col, p / 100.0, &f.percent)?;
        }
        None => {
            sheet.write_string_with_format(row, col, "n/a", &f.note)?;
        }
    }
    Ok(())
}

/// Title, header row and body of a statistics table. Returns the row after
/// a trailing blank line.
fn write_stat_table(sheet: &mut Worksheet, row: u32, table: &StatTable, f: &Formats) -> Result<u32> {
    let mut row = write_title(sheet, row, &table.title, f)?;
    if table.is_empty() {
        sheet.write_string_with_format(row, 0, "No data available", &f.note)?;
        return Ok(row + 2);
    }
    let headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    row = write_headers(sheet, row, &headers, f)?;
    for cells in &table.rows {
        for (col, cell) in cells.iter().enumerate() {
            write_cell(sheet, row, col as u16, cell, f)?;
        }
        row += 1;
    }
    Ok(row + 1)
}

fn installed_capacity_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let mut row = write_title(sheet, 0, "Lithuania Installed Capacity (MW)", f)?;
    row = write_headers(
        sheet,
        row,
        &["Year", "Wind", "Solar", "BESS (MW)", "BESS (MWh)", "BESS duration (h)", "Fossil", "Forecast"],
        f,
    )?;
    for record in &ctx.capacity.installed {
        sheet.write_number(row, 0, f64::from(record.year))?;
        sheet.write_number_with_format(row, 1, record.wind_mw, &f.integer)?;
        sheet.write_number_with_format(row, 2, record.solar_mw, &f.integer)?;
        sheet.write_number_with_format(row, 3, record.bess_mw, &f.integer)?;
        sheet.write_number_with_format(row, 4, record.bess_mwh, &f.integer)?;
        if let Some(hours) = record.bess_duration_hours() {
            sheet.write_number_with_format(row, 5, hours, &f.decimal)?;
        }
        sheet.write_number_with_format(row, 6, record.fossil_mw, &f.integer)?;
        sheet.write_string(row, 7, if record.forecast { "forecast" } else { "actual" })?;
        row += 1;
    }

    row = write_title(sheet, row + 1, "BESS Pipeline by Scenario (MW)", f)?;
    row = write_headers(sheet, row, &["Year", "High", "Base", "Low"], f)?;
    for year in ctx.capacity.pipeline_years() {
        sheet.write_number(row, 0, f64::from(year))?;
        for (i, scenario) in Scenario::ALL.iter().enumerate() {
            if let Some(mw) = ctx.capacity.scenario_mw(*scenario, year) {
                sheet.write_number_with_format(row, 1 + i as u16, mw, &f.integer)?;
            }
        }
        row += 1;
    }
    sheet.set_column_width(0, 12)?;
    sheet.set_column_width(5, 18)?;
    Ok(())
}

fn raw_data_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let mut row = write_title(sheet, 0, "Datasets Loaded", f)?;
    row = write_headers(sheet, row, &["Dataset", "Files", "Rows", "Malformed rows", "Duplicate rows"], f)?;
    for report in &ctx.load_reports {
        sheet.write_string(row, 0, &report.dataset)?;
        sheet.write_number(row, 1, report.files as f64)?;
        sheet.write_number_with_format(row, 2, report.rows as f64, &f.integer)?;
        sheet.write_number(row, 3, report.malformed_rows as f64)?;
        sheet.write_number(row, 4, report.duplicate_rows as f64)?;
        row += 1;
    }
    row += 1;
    write_stat_table(sheet, row, &ctx.statistics.installed_capacity, f)?;
    sheet.set_column_width(0, 32)?;
    Ok(())
}

fn revenue_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let mut headers = vec!["Year", "Duration"];
    headers.extend(Market::ALL.iter().map(|m| m.label()));
    headers.extend(["Blended", "Best single market", "Data gaps"]);

    let mut row = write_title(sheet, 0, "Historical BESS Revenue (EUR/MW/yr)", f)?;
    row = write_headers(sheet, row, &headers, f)?;
    for r in &ctx.revenues.rows {
        sheet.write_number(row, 0, f64::from(r.year))?;
        sheet.write_string(row, 1, r.duration.label())?;
        for (i, market) in Market::ALL.iter().enumerate() {
            sheet.write_number_with_format(row, 2 + i as u16, r.revenue(*market), &f.integer)?;
        }
        sheet.write_number_with_format(row, 7, r.blended, &f.integer)?;
        sheet.write_string(row, 8, r.best_single_market().label())?;
        let gaps: Vec<String> = r.gaps.iter().map(|g| g.to_string()).collect();
        sheet.write_string(row, 9, gaps.join("; "))?;
        row += 1;
    }

    row = write_title(sheet, row + 1, "Projected BESS Revenue (EUR/MW/yr)", f)?;
    let mut projection_headers = vec!["Year", "Duration"];
    projection_headers.extend(Market::ALL.iter().map(|m| m.label()));
    projection_headers.extend(["Blended", "Balancing factor", "DA factor"]);
    row = write_headers(sheet, row, &projection_headers, f)?;
    for p in &ctx.projected {
        sheet.write_number(row, 0, f64::from(p.year))?;
        sheet.write_string(row, 1, p.duration.label())?;
        for (i, market) in Market::ALL.iter().enumerate() {
            sheet.write_number_with_format(row, 2 + i as u16, p.markets.get(*market), &f.integer)?;
        }
        sheet.write_number_with_format(row, 7, p.blended, &f.integer)?;
        sheet.write_number_with_format(row, 8, p.balancing_compression, &f.decimal)?;
        sheet.write_number_with_format(row, 9, p.day_ahead_compression, &f.decimal)?;
        row += 1;
    }

    let a = &ctx.assumptions;
    row = write_title(sheet, row + 1, "Assumptions", f)?;
    let scalars = [
        ("Round-trip efficiency", a.round_trip_efficiency),
        ("Capture rate", a.capture_rate),
        ("Up-direction share of reserve price", a.reserve_up_share),
    ];
    for (name, value) in scalars {
        sheet.write_string(row, 0, name)?;
        sheet.write_number_with_format(row, 1, value, &f.percent)?;
        row += 1;
    }
    for market in Market::ALL {
        sheet.write_string(row, 0, format!("Allocation weight {}", market.label()))?;
        sheet.write_number_with_format(row, 1, a.allocation.weight(market), &f.percent)?;
        row += 1;
    }
    if let Some(base) = ctx.base_year {
        sheet.write_string(row, 0, "Projection base year")?;
        sheet.write_number(row, 1, f64::from(base))?;
    }

    sheet.set_column_width(0, 34)?;
    sheet.set_column_width(9, 60)?;
    sheet.set_freeze_panes(2, 2)?;
    Ok(())
}

fn balancing_data_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let stats = &ctx.statistics;
    let mut row = write_stat_table(sheet, 0, &stats.reserve_annual, f)?;
    row = write_stat_table(sheet, row, &stats.activated_balancing_annual, f)?;
    write_stat_table(sheet, row, &stats.imbalance_volume_annual, f)?;
    sheet.set_column_width(0, 28)?;
    Ok(())
}

fn day_ahead_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let stats = &ctx.statistics;
    let mut row = write_stat_table(sheet, 0, &stats.da_annual, f)?;
    row = write_stat_table(sheet, row, &stats.daily_spread, f)?;
    row = write_stat_table(sheet, row, &stats.da_monthly, f)?;
    write_stat_table(sheet, row, &stats.hourly_profile, f)?;
    sheet.set_column_width(0, 12)?;
    Ok(())
}

fn load_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let row = write_stat_table(sheet, 0, &ctx.statistics.load_annual, f)?;
    write_stat_table(sheet, row, &ctx.statistics.load_monthly, f)?;
    sheet.set_column_width(2, 20)?;
    Ok(())
}

fn ancillary_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let a = &ctx.assumptions;
    let mut row = write_stat_table(sheet, 0, &ctx.statistics.imbalance_annual, f)?;
    sheet.write_string_with_format(
        row - 1,
        0,
        format!(
            "Imbalance prices are unpublished after {}; imbalance revenue is zero where they are missing.",
            a.imbalance_publication_end
        ),
        &f.note,
    )?;
    row += 1;

    row = write_title(sheet, row, "Reserve Availability by Duration", f)?;
    let mut headers = vec!["Product"];
    headers.extend(StorageDuration::ALL.iter().map(|d| d.label()));
    row = write_headers(sheet, row, &headers, f)?;
    for product in [ReserveProduct::Fcr, ReserveProduct::Afrr, ReserveProduct::Mfrr] {
        sheet.write_string(row, 0, product.market().label())?;
        for (i, duration) in StorageDuration::ALL.iter().enumerate() {
            sheet.write_number_with_format(row, 1 + i as u16, a.availability(product, *duration), &f.percent)?;
        }
        row += 1;
    }

    row = write_title(sheet, row + 1, "FCR Capacity Price Forecast", f)?;
    row = write_headers(sheet, row, &["Year", "EUR/MW/h", "Active share of year"], f)?;
    for (year, price) in &a.fcr_price_per_mw_h {
        sheet.write_number(row, 0, f64::from(*year))?;
        sheet.write_number_with_format(row, 1, *price, &f.decimal)?;
        sheet.write_number_with_format(row, 2, a.fcr_active_fraction(*year), &f.percent)?;
        row += 1;
    }
    sheet.write_string_with_format(
        row,
        0,
        format!("Baltic FCR market launch: {}", a.fcr_launch_date),
        &f.note,
    )?;

    if let Some(v) = &ctx.volumes {
        row = write_title(sheet, row + 2, &format!("Procured Balancing Capacity {} (mean MW)", v.year), f)?;
        let volumes = [
            ("aFRR up", v.afrr_up_mw),
            ("aFRR down", v.afrr_down_mw),
            ("mFRR up", v.mfrr_up_mw),
            ("mFRR down", v.mfrr_down_mw),
            ("FCR (estimate)", v.fcr_mw),
            ("Total", v.total_balancing_mw()),
        ];
        for (name, mw) in volumes {
            sheet.write_string(row, 0, name)?;
            sheet.write_number_with_format(row, 1, mw, &f.integer)?;
            row += 1;
        }
    }
    sheet.set_column_width(0, 30)?;
    Ok(())
}

fn saturation_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let mut row = write_title(sheet, 0, "BESS Saturation by Scenario", f)?;
    row = write_headers(
        sheet,
        row,
        &["Year", "Scenario", "BESS (MW)", "vs aFRR up", "vs balancing requirement", "vs peak load"],
        f,
    )?;
    for r in &ctx.saturation {
        sheet.write_number(row, 0, f64::from(r.year))?;
        sheet.write_string(row, 1, r.scenario.to_string())?;
        sheet.write_number_with_format(row, 2, r.bess_mw, &f.integer)?;
        write_opt_percent(sheet, row, 3, r.vs_afrr_up_pct, f)?;
        write_opt_percent(sheet, row, 4, r.vs_balancing_pct, f)?;
        write_opt_percent(sheet, row, 5, r.vs_peak_load_pct, f)?;
        row += 1;
    }
    sheet.write_string_with_format(
        row + 1,
        0,
        format!("Peak load reference: {:.0} MW", ctx.peak_load_mw),
        &f.note,
    )?;
    sheet.set_column_width(4, 24)?;
    Ok(())
}

fn overview_sheet(sheet: &mut Worksheet, ctx: &ReportContext, f: &Formats) -> Result<()> {
    let mut row = write_title(sheet, 0, "Lithuania BESS Market Overview", f)?;
    sheet.write_string_with_format(
        row,
        0,
        format!("Generated {}", ctx.generated_at.format("%Y-%m-%d %H:%M UTC")),
        &f.note,
    )?;
    row += 2;

    if let Some(latest) = ctx.revenues.years().into_iter().max() {
        row = write_headers(sheet, row, &["Duration", "Blended (EUR/MW/yr)", "Best single market"], f)?;
        for duration in StorageDuration::ALL {
            if let Some(r) = ctx.revenues.get(latest, duration) {
                sheet.write_string(row, 0, duration.to_string())?;
                sheet.write_number_with_format(row, 1, r.blended, &f.integer)?;
                sheet.write_string(row, 2, r.best_single_market().label())?;
                row += 1;
            }
        }
        row += 1;
    }

    row = write_stat_table(sheet, row, &ctx.statistics.generation_annual, f)?;
    write_stat_table(sheet, row, &ctx.statistics.flows_annual, f)?;
    sheet.set_column_width(0, 20)?;
    Ok(())
}

type SheetWriter = fn(&mut Worksheet, &ReportContext, &Formats) -> Result<()>;

pub fn write_workbook(ctx: &ReportContext, path: &Path) -> Result<()> {
    let formats = Formats::new();
    let writers: [SheetWriter; 9] = [
        installed_capacity_sheet,
        raw_data_sheet,
        revenue_sheet,
        balancing_data_sheet,
        day_ahead_sheet,
        load_sheet,
        ancillary_sheet,
        saturation_sheet,
        overview_sheet,
    ];

    let mut workbook = Workbook::new();
    for (name, writer) in SHEETS.iter().zip(writers) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name)?;
        writer(sheet, ctx, &formats).with_context(|| format!("Failed to write sheet {name}"))?;
    }
    workbook
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    Ok(())
}
