#![cfg(not(tarpaulin_include))]

use chrono::{Local, NaiveDate};
use clap::Parser;
use std::env;
use std::fs;
use std::path::PathBuf;

use price_dashboard::dashboard::{Dashboard, SeriesSummary, Source, baseline_sources};
use price_dashboard::rates::CurrencyPair;
use price_dashboard::{DashboardConfig, TimeWindow, export};

#[derive(Parser)]
#[command(
    name = "price-dashboard",
    about = "Price trends from Price Series spreadsheet exports"
)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of baseline .xlsx files (overrides the config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Time window such as 4w, 3m, 1y or all (overrides the config)
    #[arg(short, long)]
    window: Option<TimeWindow>,

    /// Reference date for the window, YYYY-MM-DD (default: today)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Write one PNG chart per product plus all.png into this directory
    #[arg(long)]
    charts: Option<PathBuf>,

    /// EUR/USD rate to quote (overrides the config)
    #[arg(long, value_name = "RATE")]
    eur_usd: Option<f64>,

    /// Export the merged series as CSV
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Export the merged series as XLSX in the Price Series layout
    #[arg(long)]
    export_xlsx: Option<PathBuf>,

    /// Additional .xlsx files, read after the baseline directory
    files: Vec<PathBuf>,
}

fn init_logging() {
    let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::new()
        .parse_filters(&level)
        .format_timestamp_secs()
        .format_module_path(true)
        .format_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(window) = args.window {
        config.window = window;
    }
    if let Some(rate) = args.eur_usd {
        config.eur_usd = Some(rate);
    }
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let mut sources = baseline_sources(&config.data_dir);
    log::info!(
        "{} baseline file(s) in {}, {} supplied",
        sources.len(),
        config.data_dir.display(),
        args.files.len()
    );
    sources.extend(args.files.into_iter().map(Source::File));

    let pair = CurrencyPair::eur_usd();
    let quote = config.rate_lookup(&pair).quote(&pair);
    println!("{}", quote.describe(&pair));
    if quote.is_fallback() {
        println!("Could not get an exchange rate. Using the fallback rate.");
    }
    println!();

    let dashboard = Dashboard::new(config.layout());
    let snapshot = dashboard.render(&sources);

    println!("Sources:");
    for report in &snapshot.reports {
        println!("  {}", report);
    }

    if snapshot.series.is_empty() {
        println!("\nNo price series found. Supply one or more Price Series .xlsx files.");
        return Ok(());
    }

    let summaries = snapshot.summaries(config.window, today);
    println!("\nLatest prices (window {}, as of {}):", config.window, today);
    print_summaries(&summaries);

    if let Some(dir) = &args.charts {
        write_charts(dir, &summaries, &config)?;
    }
    if let Some(path) = &args.export_csv {
        fs::write(path, export::to_csv(&snapshot.series))?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &args.export_xlsx {
        fs::write(path, export::to_xlsx(&snapshot.series)?)?;
        log::info!("wrote {}", path.display());
    }

    Ok(())
}

fn print_summaries(summaries: &[SeriesSummary]) {
    let width = summaries
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Product".len());

    println!(
        "  {:<width$}  {:>12}  {:>10}  {:>6}  {:>10}",
        "Product", "Latest", "As of", "Points", "Change"
    );
    for s in summaries {
        let change = match s.change_pct {
            Some(pct) => format!("{:+.2}%", pct),
            None => "-".to_string(),
        };
        println!(
            "  {:<width$}  {:>12.2}  {:>10}  {:>6}  {:>10}",
            s.name,
            s.latest.price,
            s.latest.date.format("%Y-%m-%d"),
            s.window.len(),
            change
        );
        if let Some(warning) = s.warning() {
            println!("  {:<width$}  ({})", "", warning);
        }
    }
}

#[cfg(feature = "charts")]
fn write_charts(
    dir: &std::path::Path,
    summaries: &[SeriesSummary],
    config: &DashboardConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    use price_dashboard::chart::{ChartOptions, ChartSeries, save_line_chart};

    fs::create_dir_all(dir)?;
    let base = ChartOptions {
        width: config.chart.width,
        height: config.chart.height,
        ..ChartOptions::default()
    };

    let lines: Vec<ChartSeries> = summaries
        .iter()
        .filter(|s| !s.window.is_empty())
        .map(|s| ChartSeries {
            name: &s.name,
            points: &s.window,
        })
        .collect();

    for line in &lines {
        let options = ChartOptions {
            title: line.name.to_string(),
            ..base.clone()
        };
        let path = dir.join(format!("{}.png", file_stem(line.name)));
        save_line_chart(std::slice::from_ref(line), &options, &path)?;
        log::info!("wrote {}", path.display());
    }

    if !lines.is_empty() {
        let path = dir.join("all.png");
        save_line_chart(&lines, &base, &path)?;
        log::info!("wrote {}", path.display());
    }

    Ok(())
}

#[cfg(not(feature = "charts"))]
fn write_charts(
    _dir: &std::path::Path,
    _summaries: &[SeriesSummary],
    _config: &DashboardConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("chart output requires the 'charts' feature".into())
}

/// Product name reduced to something safe for a file name.
#[cfg(feature = "charts")]
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let stem = stem.trim_matches('_').to_string();
    if stem.is_empty() { "series".to_string() } else { stem }
}
